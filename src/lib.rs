//! tourpay - payment back end for tour and trip bookings
//!
//! Creates gateway orders for bookings, ingests signed gateway webhooks,
//! keeps payments and bookings in lockstep, issues admin refunds and sends
//! booking confirmations.

pub mod config;
pub mod crypto;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod middleware;
pub mod models;
pub mod notifier;
pub mod payments;
pub mod rate_limit;
pub mod util;
