mod api_key;
mod booking;
mod payment;
mod processed_event;
mod user;

pub use api_key::*;
pub use booking::*;
pub use payment::*;
pub use processed_event::*;
pub use user::*;
