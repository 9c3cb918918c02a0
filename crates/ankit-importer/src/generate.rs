//! The generation seam.

use std::future::Future;

use ankit_gemini::{GeminiClient, GenerateRequest};

/// Something that turns a prompt, an image and optional context into text.
///
/// Implemented by [`GeminiClient`]; tests use scripted generators.
pub trait ContentGenerator {
    fn generate(
        &self,
        request: GenerateRequest<'_>,
    ) -> impl Future<Output = ankit_gemini::Result<String>> + Send;
}

impl ContentGenerator for GeminiClient {
    fn generate(
        &self,
        request: GenerateRequest<'_>,
    ) -> impl Future<Output = ankit_gemini::Result<String>> + Send {
        GeminiClient::generate(self, request)
    }
}
