//! Text chunking module
//!
//! Splits page documents into overlapping, size-bounded chunks. Sizes and
//! offsets are counted in characters. Chunks prefer to end on a sentence
//! boundary, then on whitespace, and only cut mid-word when neither exists
//! in the back half of the window.

use crate::errors::IngestionError;
use finrag_common::models::{keys, Chunk, Document};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

/// Configuration for text chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of a document
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 20,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestionError> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestionError> {
        if self.chunk_size == 0 {
            return Err(IngestionError::ChunkingError(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestionError::ChunkingError(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Character range `[start, end)` of a chunk within its document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Split every document into chunks, in document order
pub fn chunk_documents(
    documents: &[Document],
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, IngestionError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(chunk_document(document, config));
    }

    debug!(
        documents = documents.len(),
        chunk_count = chunks.len(),
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "Documents chunked"
    );
    Ok(chunks)
}

/// Chunks of one document; parent metadata is copied onto every chunk
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Vec<Chunk> {
    let chars: Vec<char> = document.text.chars().collect();

    split_spans(&document.text, &chars, config)
        .into_iter()
        .enumerate()
        .map(|(index, span)| {
            let mut metadata = document.metadata.clone();
            metadata.insert(keys::DOCUMENT_ID.into(), document.id.clone().into());
            metadata.insert(keys::CHUNK_INDEX.into(), index.into());
            metadata.insert(keys::START_CHAR_IDX.into(), span.start.into());
            metadata.insert(keys::END_CHAR_IDX.into(), span.end.into());

            Chunk {
                id: Chunk::make_id(&document.id, index),
                text: chars[span.start..span.end].iter().collect(),
                metadata,
                embedding: None,
            }
        })
        .collect()
}

/// Sliding window with exact overlap: chunk `i + 1` starts `chunk_overlap`
/// characters before chunk `i` ends. Text no longer than `chunk_size`,
/// including empty text, is a single span.
pub fn split_spans(text: &str, chars: &[char], config: &ChunkingConfig) -> Vec<Span> {
    let total = chars.len();

    let sentence_ends = sentence_ends(text);
    let mut spans = Vec::new();
    let mut start = 0;

    loop {
        if total - start <= config.chunk_size {
            spans.push(Span { start, end: total });
            break;
        }

        let window_end = start + config.chunk_size;
        // Ending past this point guarantees the next start moves forward
        let floor = start + config.chunk_overlap.max(config.chunk_size / 2);

        let end = last_in_range(&sentence_ends, floor, window_end)
            .or_else(|| last_whitespace_break(chars, floor, window_end))
            .unwrap_or(window_end);

        spans.push(Span { start, end });
        start = end - config.chunk_overlap;
    }

    spans
}

/// Character offsets at which a sentence (with its trailing space) ends
fn sentence_ends(text: &str) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut pos = 0;
    for sentence in text.split_sentence_bounds() {
        pos += sentence.chars().count();
        ends.push(pos);
    }
    ends
}

/// Largest boundary `b` with `floor < b <= ceiling`
fn last_in_range(boundaries: &[usize], floor: usize, ceiling: usize) -> Option<usize> {
    let upper = boundaries.partition_point(|&b| b <= ceiling);
    boundaries[..upper].last().copied().filter(|&b| b > floor)
}

/// Largest `b` with `floor < b <= ceiling` that directly follows whitespace
fn last_whitespace_break(chars: &[char], floor: usize, ceiling: usize) -> Option<usize> {
    (floor + 1..=ceiling)
        .rev()
        .find(|&b| chars[b - 1].is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finrag_common::models::Metadata;

    fn document(id: &str, text: &str) -> Document {
        let mut metadata = Metadata::new();
        metadata.insert(keys::FILE_NAME.into(), "sample-report.pdf".into());
        metadata.insert(keys::PAGE_LABEL.into(), "1".into());
        Document::new(id, text, metadata)
    }

    fn report_text(target_chars: usize) -> String {
        let sentences = [
            "Total revenue increased by 14% year over year. ",
            "Operating margin improved to 21.5% on lower input costs. ",
            "The company repurchased $1.2 billion of common stock. ",
            "Free cash flow reached a record level in the fourth quarter. ",
        ];
        let mut text = String::new();
        let mut i = 0;
        while text.chars().count() < target_chars {
            text.push_str(sentences[i % sentences.len()]);
            i += 1;
        }
        text.chars().take(target_chars).collect()
    }

    fn reassemble(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let skip = if i == 0 { 0 } else { overlap };
            out.extend(chunk.text.chars().skip(skip));
        }
        out
    }

    #[test]
    fn test_config_validation() {
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert!(ChunkingConfig::new(100, 100).is_err());
        assert!(ChunkingConfig::new(100, 150).is_err());
        assert!(ChunkingConfig::new(100, 99).is_ok());
        assert_eq!(ChunkingConfig::default(), ChunkingConfig::new(1024, 20).unwrap());
    }

    #[test]
    fn test_2500_char_page() {
        let text = report_text(2500);
        let config = ChunkingConfig::default();
        let chunks = chunk_documents(&[document("sample-report.pdf#page=1", &text)], &config).unwrap();

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 1024);
        }
        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().skip(pair[0].text.chars().count() - 20).collect();
            let head: String = pair[1].text.chars().take(20).collect();
            assert_eq!(tail, head);
            assert_eq!(pair[1].start_char().unwrap(), pair[0].end_char().unwrap() - 20);
        }
        assert_eq!(reassemble(&chunks, 20), text);
    }

    #[test]
    fn test_prefers_sentence_boundaries() {
        let text = report_text(2500);
        let chunks = chunk_document(&document("d", &text), &ChunkingConfig::default());

        // Every non-final chunk ends just after a sentence terminator
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.text.trim_end().ends_with('.'), "chunk ended mid-sentence");
        }
    }

    #[test]
    fn test_falls_back_to_whitespace_then_hard_cut() {
        let words = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let config = ChunkingConfig::new(16, 4).unwrap();
        let chunks = chunk_document(&document("w", words), &config);
        assert_eq!(reassemble(&chunks, 4), words);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 16));

        let solid = "x".repeat(50);
        let chunks = chunk_document(&document("s", &solid), &config);
        assert_eq!(chunks[0].text.chars().count(), 16);
        assert_eq!(reassemble(&chunks, 4), solid);
    }

    #[test]
    fn test_multibyte_text_is_counted_in_chars() {
        let text = "Umsatz stieg um 12 € pro Aktie. ".repeat(20);
        let config = ChunkingConfig::new(64, 8).unwrap();
        let chunks = chunk_document(&document("de", &text), &config);

        assert!(chunks.iter().all(|c| c.text.chars().count() <= 64));
        assert_eq!(reassemble(&chunks, 8), text);
    }

    #[test]
    fn test_short_document_is_single_chunk() {
        let chunks = chunk_document(&document("short", "Revenue grew."), &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Revenue grew.");
        assert_eq!(chunks[0].start_char(), Some(0));
        assert_eq!(chunks[0].end_char(), Some(13));
    }

    #[test]
    fn test_metadata_is_propagated() {
        let text = report_text(3000);
        let chunks = chunk_document(&document("sample-report.pdf#page=1", &text), &ChunkingConfig::default());

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata[keys::FILE_NAME], "sample-report.pdf");
            assert_eq!(chunk.metadata[keys::PAGE_LABEL], "1");
            assert_eq!(chunk.metadata[keys::DOCUMENT_ID], "sample-report.pdf#page=1");
            assert_eq!(chunk.index(), Some(i));
            assert_eq!(chunk.id, Chunk::make_id("sample-report.pdf#page=1", i));
            assert!(chunk.embedding.is_none());
        }
    }

    #[test]
    fn test_empty_inputs() {
        let config = ChunkingConfig::default();
        assert!(chunk_documents(&[], &config).unwrap().is_empty());

        let chunks = chunk_document(&document("blank", ""), &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
        assert_eq!(chunks[0].end_char(), Some(0));
    }

    #[test]
    fn test_blank_page_is_single_chunk() {
        let chunks = chunk_document(&document("blank", "  \n\t "), &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "  \n\t ");
        assert_eq!(chunks[0].metadata[keys::PAGE_LABEL], "1");
    }

    #[test]
    fn test_chunk_ids_are_stable_across_runs() {
        let doc = document("sample-report.pdf#page=2", &report_text(2000));
        let first = chunk_document(&doc, &ChunkingConfig::default());
        let second = chunk_document(&doc, &ChunkingConfig::default());
        assert_eq!(first, second);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// Arbitrary Unicode mixed with sentence and word breaks
        fn arb_text() -> impl Strategy<Value = String> {
            proptest::collection::vec(
                prop_oneof![
                    4 => any::<char>(),
                    1 => Just(' '),
                    1 => Just('\n'),
                    1 => Just('.'),
                ],
                0..600,
            )
            .prop_map(String::from_iter)
        }

        fn arb_config() -> impl Strategy<Value = ChunkingConfig> {
            (1usize..200)
                .prop_flat_map(|size| (Just(size), 0..size))
                .prop_map(|(chunk_size, chunk_overlap)| ChunkingConfig {
                    chunk_size,
                    chunk_overlap,
                })
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(256))]

            #[test]
            fn chunks_reassemble_to_the_source(text in arb_text(), config in arb_config()) {
                let chunks = chunk_document(&document("p", &text), &config);
                let total = text.chars().count();

                prop_assert!(!chunks.is_empty());
                if total <= config.chunk_size {
                    prop_assert_eq!(chunks.len(), 1);
                }
                for chunk in &chunks {
                    prop_assert!(chunk.text.chars().count() <= config.chunk_size);
                }
                for pair in chunks.windows(2) {
                    prop_assert_eq!(
                        pair[1].start_char().unwrap(),
                        pair[0].end_char().unwrap() - config.chunk_overlap
                    );
                }
                prop_assert_eq!(chunks.last().unwrap().end_char(), Some(total));
                prop_assert_eq!(reassemble(&chunks, config.chunk_overlap), text);
            }

            #[test]
            fn parent_metadata_reaches_every_chunk(text in arb_text(), config in arb_config()) {
                let chunks = chunk_document(&document("report.pdf#page=4", &text), &config);

                for (i, chunk) in chunks.iter().enumerate() {
                    prop_assert_eq!(&chunk.metadata[keys::FILE_NAME], "sample-report.pdf");
                    prop_assert_eq!(&chunk.metadata[keys::PAGE_LABEL], "1");
                    prop_assert_eq!(&chunk.metadata[keys::DOCUMENT_ID], "report.pdf#page=4");
                    prop_assert_eq!(chunk.index(), Some(i));
                }
            }
        }
    }
}
