//! Domain layer: entities, repository and channel contracts, and the click pipeline.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Durable store trait definitions
//! - [`event_channel`] - At-least-once message queue contract
//! - [`click_event`] - Click event model carried by the queue
//! - [`click_worker`] - The click consumer loop
//! - [`id_allocator`] - Process-local URL id allocation
//!
//! The domain layer depends on no infrastructure: implementations of the
//! traits live in [`crate::infrastructure`].
//!
//! # Click Processing Flow
//!
//! 1. The redirect handler resolves the short code and answers immediately
//! 2. A [`click_event::ClickEvent`] is submitted to the best-effort publisher
//! 3. The publisher enqueues it on the [`event_channel::EventChannel`]
//! 4. [`click_worker::ClickConsumer`] persists the click, then deletes the message

pub mod click_event;
pub mod click_worker;
pub mod entities;
pub mod event_channel;
pub mod id_allocator;
pub mod repositories;
