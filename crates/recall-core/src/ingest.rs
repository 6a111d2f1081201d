//! Turning raw text into chunked `Document` groups.
//!
//! Identity scheme:
//! - generic text: base id `rag::<source>::<key>`, chunk ids `<baseId>::<i>`
//! - BFT chunks:   base id `bft::<bftId>`, chunk ids `<baseId>::<i>`
//!
//! Re-ingesting the same key with `replace = true` therefore supersedes the
//! previous chunks as a group.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::config::RetrievalSettings;
use crate::error::{Error, Result};
use crate::types::{Document, Metadata};

pub const SOURCE_BFT: &str = "bft";
pub const SOURCE_FILE_UPLOAD: &str = "file_upload";
pub const SOURCE_MANUAL_TEXT: &str = "manual_text";

static SENTENCE_END: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"[.!?…]+["'»”)\]]*\s+"#).ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Upper bound on whitespace-separated words per chunk.
    pub max_tokens: usize,
    /// Words carried over from the tail of the previous chunk.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self { Self { max_tokens: 400, overlap: 40 } }
}

impl ChunkingConfig {
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self { max_tokens: settings.chunk_max_tokens.max(1), overlap: settings.chunk_overlap }
    }
}

/// Collapse whitespace runs (including NBSP) to single spaces and trim.
pub fn clean_text(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn word_count(s: &str) -> usize { s.split_whitespace().count() }

/// Split on sentence terminators followed by whitespace. Sentences longer
/// than `max_words` are cut into word windows.
fn split_sentences(text: &str, max_words: usize) -> Vec<String> {
    let mut raw = Vec::new();
    let mut last = 0;
    if let Some(re) = SENTENCE_END.as_ref() {
        for m in re.find_iter(text) {
            raw.push(&text[last..m.end()]);
            last = m.end();
        }
    }
    raw.push(&text[last..]);

    let mut out = Vec::new();
    for sentence in raw.into_iter().map(str::trim).filter(|s| !s.is_empty()) {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        if words.len() <= max_words {
            out.push(words.join(" "));
        } else {
            out.extend(words.chunks(max_words).map(|w| w.join(" ")));
        }
    }
    out
}

/// Sentence-aware chunking.
///
/// Sentences accumulate until the next one would push the chunk past
/// `max_tokens` words. The following chunk then starts with the trailing
/// sentences of the previous one, up to `overlap` words in total. Empty input
/// yields no chunks.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let max_tokens = config.max_tokens.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut count = 0usize;

    for sentence in split_sentences(text, max_tokens) {
        let n = word_count(&sentence);
        if count + n > max_tokens && !current.is_empty() {
            chunks.push(current.join(" "));
            let mut keep = 0;
            let mut kept_words = 0;
            for s in current.iter().rev() {
                let w = word_count(s);
                if kept_words + w > config.overlap || kept_words + w + n > max_tokens { break; }
                kept_words += w;
                keep += 1;
            }
            current.drain(..current.len() - keep);
            count = kept_words;
        }
        current.push(sentence);
        count += n;
    }
    if !current.is_empty() { chunks.push(current.join(" ")); }
    chunks
}

/// Documents for pre-chunked BFT text.
pub fn build_bft_documents(bft_id: &str, chunks: &[String]) -> Vec<Document> {
    let base_id = format!("bft::{bft_id}");
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            Document::new(format!("{base_id}::{i}"), base_id.clone(), chunk.clone(), SOURCE_BFT)
                .with_chunk_index(i)
                .with_metadata("bft_id", bft_id)
        })
        .collect()
}

/// Clean, chunk and wrap free text. Reserved keys in `extra` are dropped.
pub fn build_generic_documents(
    key: &str,
    source: &str,
    text: &str,
    extra: &Metadata,
    config: &ChunkingConfig,
) -> Vec<Document> {
    let base_id = format!("rag::{source}::{key}");
    chunk_text(&clean_text(text), config)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut doc = Document::new(format!("{base_id}::{i}"), base_id.clone(), chunk, source).with_chunk_index(i);
            doc.extend_metadata(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
            doc
        })
        .collect()
}

/// Walks a directory of `.txt` files and turns each into a `file_upload`
/// document group keyed by its path relative to the root.
#[derive(Debug, Default)]
pub struct DataProcessor {
    chunking: ChunkingConfig,
    limit: Option<usize>,
}

impl DataProcessor {
    pub fn new(chunking: ChunkingConfig) -> Self { Self { chunking, limit: None } }

    /// Only process the first `limit` files (sorted by path).
    pub fn with_limit(mut self, limit: usize) -> Self { self.limit = Some(limit); self }

    pub fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
            .collect();
        files.sort();
        if let Some(limit) = self.limit { files.truncate(limit); }
        files
    }

    /// Chunk a single file. `root` determines the group key.
    pub fn process_file(&self, root: &Path, path: &Path) -> Result<Vec<Document>> {
        let bytes = fs::read(path).map_err(|e| Error::persistence(path, e))?;
        let content = String::from_utf8_lossy(&bytes);
        let rel = path.strip_prefix(root).unwrap_or(path);
        let key = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
        let mut extra = Metadata::new();
        extra.insert("path".into(), key.clone().into());
        if let Some(stem) = path.file_stem() {
            extra.insert("file_name".into(), stem.to_string_lossy().into_owned().into());
        }
        let docs = build_generic_documents(&key, SOURCE_FILE_UPLOAD, &content, &extra, &self.chunking);
        debug!(file = %path.display(), chunks = docs.len(), "file chunked");
        Ok(docs)
    }

    pub fn process_directory(&self, root: &Path) -> Result<Vec<Document>> {
        if !root.is_dir() {
            return Err(Error::NotFound(format!("directory {}", root.display())));
        }
        let files = self.list_txt_files(root);
        if files.is_empty() {
            info!(dir = %root.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut all = Vec::new();
        for file in &files { all.extend(self.process_file(root, file)?); }
        info!(files = files.len(), chunks = all.len(), "directory processed");
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetaValue;

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  a\u{a0}\u{a0}b\n\n\tc  "), "a b c");
        assert_eq!(clean_text(" \n "), "");
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("One sentence. Another one!", &ChunkingConfig::default());
        assert_eq!(chunks, vec!["One sentence. Another one!".to_string()]);
    }

    #[test]
    fn chunks_respect_budget_and_overlap() {
        let text = "a b c d. e f g h. i j k l. m n o p.";
        let config = ChunkingConfig { max_tokens: 8, overlap: 4 };
        let chunks = chunk_text(text, &config);
        assert_eq!(chunks, vec![
            "a b c d. e f g h.".to_string(),
            "e f g h. i j k l.".to_string(),
            "i j k l. m n o p.".to_string(),
        ]);
        for c in &chunks { assert!(word_count(c) <= 8); }
    }

    #[test]
    fn oversized_sentence_is_split_into_windows() {
        let text = (0..10).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_text(&text, &ChunkingConfig { max_tokens: 4, overlap: 0 });
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "w8 w9");
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_text("", &ChunkingConfig::default()).is_empty());
        assert!(build_generic_documents("k", "manual_text", "   ", &Metadata::new(), &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn generic_documents_use_stable_ids_and_drop_reserved_metadata() {
        let mut extra = Metadata::new();
        extra.insert("source".into(), "spoofed".into());
        extra.insert("doc_id".into(), "spoofed".into());
        extra.insert("author".into(), "ops".into());
        let docs = build_generic_documents("notes", "manual_text", "Hello world.", &extra, &ChunkingConfig::default());
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "rag::manual_text::notes::0");
        assert_eq!(docs[0].base_id, "rag::manual_text::notes");
        assert_eq!(docs[0].source, "manual_text");
        assert!(!docs[0].metadata.contains_key("doc_id"));
        assert_eq!(docs[0].metadata.get("author"), Some(&MetaValue::Text("ops".into())));
    }

    #[test]
    fn bft_documents_are_indexed_per_chunk() {
        let docs = build_bft_documents("42", &["first".to_string(), "second".to_string()]);
        assert_eq!(docs[1].id, "bft::42::1");
        assert_eq!(docs[1].chunk_index, 1);
        assert_eq!(docs[1].metadata.get("bft_id").and_then(MetaValue::as_str), Some("42"));
    }
}
