//! Async client for the Gemini `generateContent` API, shaped for card generation.
//!
//! A request is one study image plus the profile's prompt and, optionally, a
//! short text summary of the previous page. The response is the model's raw
//! text; parsing it into cards is the caller's job.
//!
//! # Quick Start
//!
//! ```no_run
//! use ankit_gemini::{GeminiClient, GenerateRequest, ImagePart};
//!
//! # async fn example() -> ankit_gemini::Result<()> {
//! let client = GeminiClient::new("AIza...");
//! let bytes = std::fs::read("page-01.png").unwrap();
//!
//! let request = GenerateRequest::new("Subtopic | Question | Choices | Correct | Extra")
//!     .image(ImagePart::new(&bytes, "image/png"));
//! let text = client.generate(request).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
mod request;
pub mod retry;

pub use client::{ClientBuilder, DEFAULT_MODEL, FALLBACK_MODELS, GeminiClient, GenerateRequest, ImagePart};
pub use error::{Error, Result};
pub use retry::RetryPolicy;

/// Check the shape of an API key without touching the network.
///
/// Keys issued by Google AI Studio start with `AIza` and are 39 characters
/// long; anything shorter than 30 is certainly truncated.
pub fn validate_api_key(key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidKey("API key is empty".to_string()));
    }
    if !key.starts_with("AIza") {
        return Err(Error::InvalidKey(
            "API key should start with 'AIza'".to_string(),
        ));
    }
    if key.len() < 30 {
        return Err(Error::InvalidKey(format!(
            "API key is too short ({} characters)",
            key.len()
        )));
    }
    Ok(())
}
