//! Text extraction from generated documents

use std::path::Path;

use pulldown_cmark::{Event, Parser, TagEnd};

use super::error::{RetrievalError, RetrievalResult};

/// Pulls plain text out of a document on disk
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> RetrievalResult<String>;
}

/// UTF-8 text files, with line endings normalized to `\n`
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> RetrievalResult<String> {
        let content = read_document(path)?;
        Ok(content.replace("\r\n", "\n"))
    }
}

/// Markdown documents rendered to plain text
///
/// Block elements end with a blank line so paragraph chunking sees the
/// same structure a reader does.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownExtractor;

impl MarkdownExtractor {
    pub fn render(content: &str) -> String {
        let mut text = String::new();

        for event in Parser::new(content) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak | Event::HardBreak => text.push('\n'),
                Event::End(TagEnd::Paragraph)
                | Event::End(TagEnd::Heading(_))
                | Event::End(TagEnd::CodeBlock)
                | Event::End(TagEnd::Item)
                | Event::End(TagEnd::TableRow) => text.push_str("\n\n"),
                Event::End(TagEnd::TableCell) => text.push(' '),
                _ => {}
            }
        }

        text.trim().to_string()
    }
}

impl TextExtractor for MarkdownExtractor {
    fn extract(&self, path: &Path) -> RetrievalResult<String> {
        Ok(Self::render(&read_document(path)?))
    }
}

/// Chooses an extractor from the file extension
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoExtractor;

impl TextExtractor for AutoExtractor {
    fn extract(&self, path: &Path) -> RetrievalResult<String> {
        extractor_for_path(path)?.extract(path)
    }
}

/// Extractor for a path, by extension
pub fn extractor_for_path(path: &Path) -> RetrievalResult<&'static dyn TextExtractor> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "md" | "markdown" => Ok(&MarkdownExtractor),
        "txt" | "text" | "" => Ok(&PlainTextExtractor),
        other => Err(RetrievalError::Extraction(format!(
            "no text extractor for .{} files: {}",
            other,
            path.display()
        ))),
    }
}

fn read_document(path: &Path) -> RetrievalResult<String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RetrievalError::Extraction(format!("{}: {}", path.display(), e)))?;
    if content.trim().is_empty() {
        return Err(RetrievalError::Extraction(format!(
            "{} contains no text",
            path.display()
        )));
    }
    Ok(content)
}
