mod from_row;
mod schema;
pub mod queries;

pub use from_row::{FromRow, query_one};
pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::notifier::Notifier;
use crate::payments::GatewayClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// None when gateway credentials are not configured
    pub gateway: Option<GatewayClient>,
    /// Shared secret for webhook signatures
    pub webhook_secret: Option<String>,
    pub notifier: Notifier,
}

const CONNECTION_PRAGMAS: &str = "
    PRAGMA foreign_keys = ON;
    PRAGMA busy_timeout = 5000;
";

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(CONNECTION_PRAGMAS)
    });
    Pool::builder().max_size(10).build(manager)
}

/// Single-connection in-memory pool.
///
/// Every checkout shares one database, so callers must release a connection
/// before asking for another.
pub fn create_memory_pool() -> Result<DbPool, r2d2::Error> {
    let manager =
        SqliteConnectionManager::memory().with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
    Pool::builder()
        .max_size(1)
        .connection_timeout(std::time::Duration::from_secs(5))
        .build(manager)
}
