//! Page-level document produced by the loader

use serde::{Deserialize, Serialize};

use super::Metadata;

/// One page (or other logical unit) of a source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier, `{file_name}#page={n}` for PDF pages
    pub id: String,

    /// Extracted text
    pub text: String,

    /// Source metadata (file_name, page_label, ...)
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }

    /// Length of the text in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
