//! Error output.
//!
//! A sink receives one serialized line per [`ValidationError`], in the
//! order the error policy produces them. The orchestrator is the single
//! writer — concurrent row validation funnels everything through it, so
//! implementations never see interleaved writes.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use csval_types::ValidationError;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter, Stdout};

/// Destination for serialized validation errors.
#[async_trait]
pub trait ErrorSink: Send {
    /// Write one error as a single line.
    async fn write(&mut self, error: &ValidationError) -> io::Result<()>;

    /// Flush buffered output. Called once when a run completes.
    async fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes errors to a file, buffered.
#[derive(Debug)]
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub async fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path).await?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

#[async_trait]
impl ErrorSink for FileSink {
    async fn write(&mut self, error: &ValidationError) -> io::Result<()> {
        self.writer
            .write_all(format!("{error}\n").as_bytes())
            .await
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }
}

/// Writes errors to standard output.
#[derive(Debug)]
pub struct StdoutSink {
    out: Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ErrorSink for StdoutSink {
    async fn write(&mut self, error: &ValidationError) -> io::Result<()> {
        self.out.write_all(format!("{error}\n").as_bytes()).await
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.out.flush().await
    }
}

/// Collects errors in memory — for tests and callers that post-process.
#[derive(Debug, Default)]
pub struct MemorySink {
    errors: Vec<ValidationError>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    /// Serialized lines, as a file sink would have written them.
    pub fn lines(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

#[async_trait]
impl ErrorSink for MemorySink {
    async fn write(&mut self, error: &ValidationError) -> io::Result<()> {
        self.errors.push(error.clone());
        Ok(())
    }
}
