//! Core domain entities.
//!
//! - [`UrlRecord`] - A shortened URL mapping (`NewUrlRecord` for creation)
//! - [`Click`] - One recorded visit of a short link
//! - [`UrlAnalytics`] - Per-URL aggregated click count

pub mod click;
pub mod url_record;

pub use click::Click;
pub use url_record::{NewUrlRecord, UrlAnalytics, UrlRecord};
