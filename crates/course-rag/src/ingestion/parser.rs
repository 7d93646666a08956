//! Course material loader for pdf, docx and txt files

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{CourseMaterial, FileType};

/// Three or more line breaks collapse to one blank line
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Characters PDF fonts commonly emit that embed poorly
const PDF_REPLACEMENTS: &[(char, &str)] = &[
    ('\u{2010}', "-"),   // Hyphen
    ('\u{2011}', "-"),   // Non-breaking hyphen
    ('\u{2013}', "-"),   // En dash
    ('\u{2014}', "--"),  // Em dash
    ('\u{2018}', "'"),   // Left single quote
    ('\u{2019}', "'"),   // Right single quote
    ('\u{201C}', "\""),  // Left double quote
    ('\u{201D}', "\""),  // Right double quote
    ('\u{2022}', "* "),  // Bullet
    ('\u{2026}', "..."), // Ellipsis
    ('\u{00A0}', " "),   // Non-breaking space
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// Replace ligatures, typographic quotes and dashes with plain ASCII
fn cleanup_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match PDF_REPLACEMENTS.iter().find(|(c, _)| *c == ch) {
            Some((_, replacement)) => out.push_str(replacement),
            None => out.push(ch),
        }
    }
    out
}

/// Run a third-party extractor, mapping a panic to `None`
///
/// Only works with `panic = "unwind"`, which every build profile keeps.
fn recover_panic<T>(extract: impl FnOnce() -> T + std::panic::UnwindSafe) -> Option<T> {
    std::panic::catch_unwind(extract).ok()
}

/// Normalize line endings and whitespace in extracted text
pub fn normalize_text(raw: &str) -> String {
    let unified = raw
        .trim_start_matches('\u{FEFF}')
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\0', "");

    let trimmed_lines = unified
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_RUNS
        .replace_all(&trimmed_lines, "\n\n")
        .trim()
        .to_string()
}

/// Extracts normalized text from course material files
pub struct FileParser;

impl FileParser {
    /// Load one file for a tenant
    ///
    /// Fails with `NotFound`, `IsADirectory`, `UnsupportedFormat`,
    /// `Extraction` or `EmptyExtraction`. Reads the file and nothing else.
    pub fn load(tenant_id: &str, path: &Path) -> Result<CourseMaterial> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            return Err(Error::IsADirectory(path.to_path_buf()));
        }

        let format = FileType::from_path(path).ok_or_else(|| Error::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default(),
        })?;

        tracing::info!("Extracting text from {} ({})", path.display(), format.display_name());

        let data = std::fs::read(path)?;
        let raw = Self::extract(path, format, &data)?;
        let text = normalize_text(&raw);

        if text.trim().is_empty() {
            return Err(Error::EmptyExtraction(path.to_path_buf()));
        }

        tracing::info!(
            "Extracted {} characters from {}",
            text.chars().count(),
            path.display()
        );

        Ok(CourseMaterial {
            tenant_id: tenant_id.to_string(),
            source_path: path.to_path_buf(),
            format,
            raw_text: text,
        })
    }

    /// Extract raw text for a known format
    pub fn extract(path: &Path, format: FileType, data: &[u8]) -> Result<String> {
        match format {
            FileType::Pdf => Self::extract_pdf(path, data),
            FileType::Docx => Self::extract_docx(path, data),
            FileType::Txt => Ok(Self::extract_txt(path, data)),
        }
    }

    /// Extract PDF text, falling back to lopdf when pdf-extract fails
    fn extract_pdf(path: &Path, data: &[u8]) -> Result<String> {
        // pdf-extract panics on some malformed font tables
        let primary = recover_panic(|| pdf_extract::extract_text_from_mem(data));

        let text = match primary {
            Some(Ok(text)) if !text.trim().is_empty() => text,
            Some(Ok(_)) => {
                tracing::warn!("pdf-extract found no text in {}, trying lopdf", path.display());
                Self::extract_pdf_fallback(path, data)?
            }
            Some(Err(e)) => {
                tracing::warn!("pdf-extract failed on {}: {}, trying lopdf", path.display(), e);
                Self::extract_pdf_fallback(path, data)?
            }
            None => {
                tracing::error!("pdf-extract panicked on {}, trying lopdf", path.display());
                Self::extract_pdf_fallback(path, data)?
            }
        };

        Ok(cleanup_pdf_text(&text))
    }

    fn extract_pdf_fallback(path: &Path, data: &[u8]) -> Result<String> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::extraction(path, format!("Failed to load PDF: {}", e)))?;

        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        tracing::debug!("lopdf fallback over {} pages", pages.len());

        doc.extract_text(&pages)
            .map_err(|e| Error::extraction(path, format!("Failed to read PDF text: {}", e)))
    }

    /// Extract paragraph text from a DOCX document, one paragraph per line
    fn extract_docx(path: &Path, data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data).map_err(|e| Error::extraction(path, e.to_string()))?;

        let mut paragraphs = Vec::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                let mut text = String::new();
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
                if !text.trim().is_empty() {
                    paragraphs.push(text.trim().to_string());
                }
            }
        }

        Ok(paragraphs.join("\n"))
    }

    fn extract_txt(path: &Path, data: &[u8]) -> String {
        match std::str::from_utf8(data) {
            Ok(text) => text.to_string(),
            Err(_) => {
                tracing::warn!("{} is not valid UTF-8, replacing invalid bytes", path.display());
                String::from_utf8_lossy(data).into_owned()
            }
        }
    }
}
