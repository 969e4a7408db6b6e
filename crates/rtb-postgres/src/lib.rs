//! PostgreSQL adapter (sqlx).
//!
//! Implements the `rtb-core` persistence ports over a connection pool.

pub mod migrations;
pub mod pool;
pub mod tasks;
pub mod users;

pub use pool::create_pool;
pub use tasks::PgTasksStore;
pub use users::PgUsersStore;

pub(crate) fn storage_err(e: sqlx::Error) -> rtb_core::Error {
    rtb_core::Error::Storage(e.to_string())
}
