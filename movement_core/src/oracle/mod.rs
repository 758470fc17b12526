//! Oracle contracts - the language model and the embedding model.
//!
//! Both are blocking round trips. Any failure, whether transport, timeout or an
//! unreadable payload, is an [`OracleError`]; callers treat it as "no usable
//! output" and never let it escape a request.

mod http;
pub mod prompts;

pub use http::*;

use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("oracle timed out")]
    Timeout,

    #[error("oracle transport error: {0}")]
    Transport(String),

    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed oracle output: {0}")]
    Malformed(String),
}

/// One prompt sent to the language oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            max_tokens,
        }
    }
}

/// Text in, plain text out.
pub trait LanguageOracle {
    fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError>;
}

/// Text in, vector out. The width is not guaranteed; callers check it.
pub trait EmbeddingOracle {
    fn embed(&self, text: &str) -> Result<Vec<f32>, OracleError>;
}

impl<T: LanguageOracle + ?Sized> LanguageOracle for &T {
    fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
        (**self).complete(request)
    }
}

impl<T: LanguageOracle + ?Sized> LanguageOracle for Arc<T> {
    fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
        (**self).complete(request)
    }
}

impl<T: EmbeddingOracle + ?Sized> EmbeddingOracle for &T {
    fn embed(&self, text: &str) -> Result<Vec<f32>, OracleError> {
        (**self).embed(text)
    }
}

impl<T: EmbeddingOracle + ?Sized> EmbeddingOracle for Arc<T> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, OracleError> {
        (**self).embed(text)
    }
}
