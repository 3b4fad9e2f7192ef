use std::io::Write as _;
use std::process::{Command, Stdio};

use anyhow::Context as _;

use crate::foundation::error::{PipelineError, PipelineResult};

/// Default narration budget in characters.
pub const DEFAULT_MAX_CHARS: usize = 3000;

/// Declared media type of an uploaded document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaType {
    /// `text/plain`.
    PlainText,
    /// `text/markdown`.
    Markdown,
    /// `application/pdf`.
    Pdf,
    /// Anything else, kept verbatim.
    Other(String),
}

impl MediaType {
    pub fn from_mime(mime: &str) -> Self {
        match mime.trim().to_ascii_lowercase().as_str() {
            "text/plain" => Self::PlainText,
            "text/markdown" | "text/x-markdown" => Self::Markdown,
            "application/pdf" => Self::Pdf,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "txt" | "text" => Self::PlainText,
            "md" | "markdown" => Self::Markdown,
            "pdf" => Self::Pdf,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Raw document bytes plus their declared type.
#[derive(Clone, Debug)]
pub struct Document {
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
}

impl Document {
    pub fn new(bytes: impl Into<Vec<u8>>, media_type: MediaType) -> Self {
        Self {
            bytes: bytes.into(),
            media_type,
        }
    }
}

/// Character-capped narration script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedText(String);

impl ExtractedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Length in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    /// `true` when the text has nothing to narrate.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Cap an externally supplied string to `max_chars`.
    pub fn from_fallback(text: &str, max_chars: usize) -> Self {
        concat_capped([text], max_chars)
    }
}

/// Pluggable document parser producing text units (pages, paragraphs) in source order.
pub trait TextSource: Send + Sync {
    /// Whether this source can parse `media_type`.
    fn supports(&self, media_type: &MediaType) -> bool;

    /// Split `bytes` into text units in reading order.
    fn extract_units(&self, bytes: &[u8]) -> anyhow::Result<Vec<String>>;
}

/// UTF-8 text and markdown; the whole document is one unit.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextSource;

impl TextSource for PlainTextSource {
    fn supports(&self, media_type: &MediaType) -> bool {
        matches!(media_type, MediaType::PlainText | MediaType::Markdown)
    }

    fn extract_units(&self, bytes: &[u8]) -> anyhow::Result<Vec<String>> {
        let text = std::str::from_utf8(bytes).context("document is not valid UTF-8")?;
        Ok(vec![text.to_string()])
    }
}

/// PDF text via the poppler `pdftotext` tool; pages are split on form feeds.
#[derive(Clone, Debug)]
pub struct PdfToTextSource {
    program: String,
}

impl Default for PdfToTextSource {
    fn default() -> Self {
        Self {
            program: "pdftotext".to_string(),
        }
    }
}

impl PdfToTextSource {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl TextSource for PdfToTextSource {
    fn supports(&self, media_type: &MediaType) -> bool {
        *media_type == MediaType::Pdf
    }

    fn extract_units(&self, bytes: &[u8]) -> anyhow::Result<Vec<String>> {
        let mut child = Command::new(&self.program)
            .args(["-enc", "UTF-8", "-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn '{}'", self.program))?;

        let mut stdin = child.stdin.take().context("failed to open pdftotext stdin")?;
        let input = bytes.to_vec();
        let writer = std::thread::spawn(move || stdin.write_all(&input));
        let out = child
            .wait_with_output()
            .context("failed to wait for pdftotext")?;
        writer
            .join()
            .map_err(|_| anyhow::anyhow!("pdftotext stdin writer panicked"))?
            .context("failed to write pdf bytes to pdftotext")?;

        if !out.status.success() {
            anyhow::bail!(
                "pdftotext exited with status {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        let text = String::from_utf8_lossy(&out.stdout);
        Ok(text
            .split('\u{c}')
            .filter(|page| !page.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Extract narration text from `doc`, capped at `max_chars` characters.
///
/// Units are concatenated in source order; the running text is truncated as soon as it reaches
/// the budget.
#[tracing::instrument(skip(doc, source), fields(bytes = doc.bytes.len()))]
pub fn extract_text(
    doc: &Document,
    source: &dyn TextSource,
    max_chars: usize,
) -> PipelineResult<ExtractedText> {
    if max_chars == 0 {
        return Err(PipelineError::config("max_chars must be > 0"));
    }
    if !source.supports(&doc.media_type) {
        return Err(PipelineError::extraction(format!(
            "no text source for media type {:?}",
            doc.media_type
        )));
    }
    let units = source
        .extract_units(&doc.bytes)
        .map_err(|e| PipelineError::extraction(format!("document could not be parsed: {e:#}")))?;
    let text = concat_capped(units.iter().map(String::as_str), max_chars);
    tracing::debug!(units = units.len(), chars = text.char_len(), "text extracted");
    Ok(text)
}

fn concat_capped<'a>(units: impl IntoIterator<Item = &'a str>, max_chars: usize) -> ExtractedText {
    let mut out = String::new();
    let mut len = 0usize;
    for unit in units {
        if len >= max_chars {
            break;
        }
        let remaining = max_chars - len;
        match unit.char_indices().nth(remaining) {
            Some((cut, _)) => {
                out.push_str(&unit[..cut]);
                len = max_chars;
            }
            None => {
                out.push_str(unit);
                len += unit.chars().count();
            }
        }
    }
    ExtractedText(out)
}

#[cfg(test)]
#[path = "../../tests/unit/extract/text.rs"]
mod tests;
