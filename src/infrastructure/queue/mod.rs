//! Event channel implementations.
//!
//! - [`RedisStreamChannel`] - Redis Streams with a consumer group (production)
//! - [`MemoryChannel`] - In-process queue with visibility timeouts (development and tests)

pub mod memory_channel;
pub mod redis_stream;

pub use memory_channel::{DeadLetter, MemoryChannel};
pub use redis_stream::{QueueStats, RedisStreamChannel, StreamSettings};
