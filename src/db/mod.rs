pub mod pool;
pub mod store;

#[cfg(test)]
pub mod memory;

pub use pool::{create_pool, run_migrations};
pub use store::{BillStore, BillUpdate, PgBillStore};
