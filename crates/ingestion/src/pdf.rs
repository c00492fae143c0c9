//! PDF document loading
//!
//! Extracts per-page text with lopdf and turns every page into a
//! [`Document`] carrying file and page metadata.

use finrag_common::errors::{AppError, Result};
use finrag_common::models::{keys, Document, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Text of one page, numbered from 1
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    pub number: u32,
    pub text: String,
}

/// Page-level text extraction for a file format
pub trait DocumentParser: Send + Sync {
    /// Pages in ascending page order
    fn parse(&self, path: &Path) -> Result<Vec<ParsedPage>>;
}

/// lopdf-backed PDF parser
#[derive(Debug, Default, Clone)]
pub struct LopdfParser;

impl DocumentParser for LopdfParser {
    fn parse(&self, path: &Path) -> Result<Vec<ParsedPage>> {
        let doc = lopdf::Document::load(path).map_err(|e| AppError::PdfParse {
            path: path.display().to_string(),
            message: format!("Failed to load PDF: {}", e),
        })?;

        let pages = doc.get_pages();
        debug!(page_count = pages.len(), "Extracting text from PDF");

        // get_pages is a BTreeMap keyed by page number, so iteration is ordered
        let parsed = pages
            .keys()
            .map(|&number| {
                let text = match doc.extract_text(&[number]) {
                    Ok(text) => clean_text(&text),
                    Err(e) => {
                        warn!(page = number, error = %e, "Failed to extract text from page, keeping it empty");
                        String::new()
                    }
                };
                ParsedPage { number, text }
            })
            .collect();

        Ok(parsed)
    }
}

/// Loads source files into page documents
#[derive(Clone)]
pub struct DocumentLoader {
    parser: Arc<dyn DocumentParser>,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(Arc::new(LopdfParser))
    }
}

impl DocumentLoader {
    pub fn new(parser: Arc<dyn DocumentParser>) -> Self {
        Self { parser }
    }

    /// One document per page, in page order
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn load(&self, path: &Path) -> Result<Vec<Document>> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(AppError::NotFound {
                path: path.display().to_string(),
            });
        }

        let parser = self.parser.clone();
        let owned = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || parser.parse(&owned))
            .await
            .map_err(|e| AppError::Internal {
                message: format!("PDF parsing task failed: {}", e),
            })??;

        let documents = to_documents(path, pages);
        info!(pages = documents.len(), "Loaded document");
        Ok(documents)
    }

    /// Load every `*.pdf` in `dir`, sorted by file name. Files that fail to
    /// load are logged and skipped.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn load_directory(&self, dir: &Path) -> Result<Vec<Document>> {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound {
                path: dir.display().to_string(),
            },
            _ => AppError::Io(e),
        })?;

        let mut files: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_pdf = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if is_pdf && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut documents = Vec::new();
        for file in &files {
            match self.load(file).await {
                Ok(mut docs) => documents.append(&mut docs),
                Err(e) => warn!(file = %file.display(), error = %e, "Skipping file"),
            }
        }

        info!(files = files.len(), documents = documents.len(), "Loaded directory");
        Ok(documents)
    }
}

fn to_documents(path: &Path, pages: Vec<ParsedPage>) -> Vec<Document> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let file_path = path.display().to_string();
    let total_pages = pages.len();

    pages
        .into_iter()
        .map(|page| {
            let mut metadata = Metadata::new();
            metadata.insert(keys::FILE_NAME.into(), file_name.clone().into());
            metadata.insert(keys::FILE_PATH.into(), file_path.clone().into());
            metadata.insert(keys::PAGE_LABEL.into(), page.number.to_string().into());
            metadata.insert(keys::TOTAL_PAGES.into(), total_pages.into());

            Document::new(
                format!("{}#page={}", file_name, page.number),
                page.text,
                metadata,
            )
        })
        .collect()
}

/// Collapse runs of whitespace and strip byte-order marks
fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
