//! Infrastructure layer for external integrations.
//!
//! Implements the contracts defined by the domain layer.
//!
//! # Modules
//!
//! - [`persistence`] - PostgreSQL and in-memory durable stores
//! - [`queue`] - Redis Streams and in-memory event channels
//! - [`startup`] - Bounded connection retry used at process start

pub mod persistence;
pub mod queue;
pub mod startup;
