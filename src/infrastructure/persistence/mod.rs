//! Durable store implementations.
//!
//! # Repositories
//!
//! - [`PgUrlRepository`] - URL record storage in PostgreSQL
//! - [`PgClickRepository`] - Click appends and analytics queries in PostgreSQL
//! - [`MemoryStore`] - Both repositories in process memory
//!
//! Queries are built at runtime with SQLx's `query_as`/`query_scalar` and bound
//! parameters. The schema lives in `migrations/`.

pub mod memory_store;
pub mod pg_click_repository;
pub mod pg_url_repository;
pub mod pool;

pub use memory_store::MemoryStore;
pub use pg_click_repository::PgClickRepository;
pub use pg_url_repository::PgUrlRepository;
pub use pool::{connect_pool, connect_pool_with_retry};
