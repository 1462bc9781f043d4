//! Text extraction: turns a document into the text the extraction stage reads.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Errors from text extraction.
#[derive(Error, Debug)]
pub enum TextError {
    #[error("Input text cannot be empty.")]
    EmptyText,

    #[error("No text could be extracted from the image.")]
    NoTextInImage,

    #[error("Image input requires OCR, which is not enabled")]
    ImageNotSupported,

    #[error("Tesseract OCR Error: {0}")]
    Ocr(String),
}

impl TextError {
    /// Whether the caller supplied unusable input (as opposed to an OCR failure).
    pub fn is_input_error(&self) -> bool {
        !matches!(self, TextError::Ocr(_))
    }
}

/// A lab report as submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Report text, already extracted.
    Text(String),
    /// Encoded image bytes (PNG, JPEG, TIFF, ...).
    Image(Vec<u8>),
}

/// Produces report text from a document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, source: &DocumentSource) -> Result<String, TextError>;

    fn name(&self) -> &str;
}

/// Accepts text only.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughExtractor;

#[async_trait]
impl TextExtractor for PassthroughExtractor {
    async fn extract_text(&self, source: &DocumentSource) -> Result<String, TextError> {
        match source {
            DocumentSource::Text(text) => non_empty_text(text),
            DocumentSource::Image(_) => Err(TextError::ImageNotSupported),
        }
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Runs the `tesseract` command-line tool on image bytes.
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    binary: String,
    language: Option<String>,
}

impl Default for TesseractExtractor {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractExtractor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: None,
        }
    }

    /// Set the OCR language (`-l`), e.g. "eng".
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec!["stdin".to_string(), "stdout".to_string()];
        if let Some(lang) = &self.language {
            args.push("-l".to_string());
            args.push(lang.clone());
        }
        args
    }

    async fn ocr(&self, image: &[u8]) -> Result<String, TextError> {
        tracing::info!(binary = %self.binary, bytes = image.len(), "Running OCR");

        let mut child = Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TextError::Ocr(format!("failed to start '{}': {}", self.binary, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image)
                .await
                .map_err(|e| TextError::Ocr(format!("failed to send image: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TextError::Ocr(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TextError::Ocr(format!(
                "'{}' exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::debug!(chars = text.len(), "OCR finished");
        Ok(text)
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract_text(&self, source: &DocumentSource) -> Result<String, TextError> {
        match source {
            DocumentSource::Text(text) => non_empty_text(text),
            DocumentSource::Image(bytes) => {
                let text = self.ocr(bytes).await?;
                if text.trim().is_empty() {
                    return Err(TextError::NoTextInImage);
                }
                Ok(text)
            }
        }
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

fn non_empty_text(text: &str) -> Result<String, TextError> {
    if text.trim().is_empty() {
        return Err(TextError::EmptyText);
    }
    Ok(text.to_string())
}
