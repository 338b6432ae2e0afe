use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Trait for streaming audio encoding
///
/// Implementations encode 16-bit PCM blocks as they arrive rather than
/// buffering the whole recording.
#[async_trait]
pub trait AudioSink: Send {
    /// Write a block of samples (called repeatedly during recording)
    /// The Vec is moved to avoid copying
    fn write_chunk(&mut self, samples: Vec<i16>) -> Result<()>;

    /// Finalize and close the sink, returning the path of the written file
    async fn finalize(&mut self) -> Result<PathBuf>;
}
