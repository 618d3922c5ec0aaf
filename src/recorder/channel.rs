//! Platform encoder seam
//!
//! A [`MediaEncoder`] turns a live stream into an [`EncoderChannel`] that
//! hands back encoded data whenever the recorder asks for it.

use crate::capture::MediaStream;
use crate::utils::error::PlatformError;
use async_trait::async_trait;
use std::sync::Arc;

/// Factory for stream encoders
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Whether the encoder can produce `mime`
    fn is_type_supported(&self, mime: &str) -> bool;

    /// Container used when no MIME type is requested
    fn default_mime(&self) -> String;

    /// Start encoding `stream`; `None` lets the encoder choose the format
    async fn open(
        &self,
        stream: Arc<dyn MediaStream>,
        mime: Option<&str>,
    ) -> Result<Box<dyn EncoderChannel>, PlatformError>;
}

/// A running encoder
#[async_trait]
pub trait EncoderChannel: Send {
    /// MIME type of the produced data
    fn mime(&self) -> String;

    /// Data encoded since the previous request (may be empty)
    async fn request_data(&mut self) -> Result<Vec<u8>, PlatformError>;

    async fn pause(&mut self) -> Result<(), PlatformError>;

    async fn resume(&mut self) -> Result<(), PlatformError>;

    /// Flush and close; returns whatever was still buffered
    async fn finish(&mut self) -> Result<Vec<u8>, PlatformError>;
}
