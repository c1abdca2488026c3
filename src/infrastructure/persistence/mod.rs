//! Persistence implementations

pub mod memory;
#[cfg(feature = "postgres")]
pub mod database;
#[cfg(feature = "postgres")]
pub mod booking_repository;

pub use memory::InMemoryBookingStore;
#[cfg(feature = "postgres")]
pub use booking_repository::PgBookingStore;
#[cfg(feature = "postgres")]
pub use database::{create_pool, run_migrations, DatabaseConfig};
