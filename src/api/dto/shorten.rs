//! DTOs for the link shortening endpoint.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Request to shorten a single URL.
#[derive(Debug, Deserialize, Validate)]
pub struct ShortenRequest {
    /// The original URL to shorten.
    #[validate(
        url(message = "Invalid URL format"),
        custom(function = "validate_web_scheme")
    )]
    pub url: String,
}

/// Only web URLs may become a redirect target; `javascript:` or `data:`
/// values parse as URLs but must never end up in a `Location` header.
fn validate_web_scheme(url: &str) -> Result<(), ValidationError> {
    let scheme = url
        .trim_start()
        .split_once(':')
        .map(|(scheme, _)| scheme.to_ascii_lowercase());

    match scheme.as_deref() {
        Some("http" | "https") => Ok(()),
        _ => Err(ValidationError::new("url_scheme")
            .with_message("Only http and https URLs can be shortened".into())),
    }
}

/// The public short URL for the new link.
#[derive(Debug, Serialize)]
pub struct ShortenResponse {
    pub short_url: String,
}
