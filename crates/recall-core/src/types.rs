//! Domain types shared by the lexical, vector and hybrid engines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type DocumentId = String;
pub type Metadata = BTreeMap<String, MetaValue>;

/// Metadata keys owned by the document itself. Caller-supplied metadata
/// never overwrites them.
pub const RESERVED_METADATA_KEYS: &[&str] = &[
    "id", "baseId", "chunkIndex", "source",
    "doc_id", "doc_base_id", "chunk_index",
];

/// A scalar metadata value.
///
/// Untagged so the snapshot stays plain JSON: `true`, `3`, `0.5`, `"x"`, `["a","b"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self { MetaValue::Text(s) => Some(s), _ => None }
    }

    /// Render as a flat string; lists are comma-joined.
    pub fn to_display_string(&self) -> String {
        match self {
            MetaValue::Bool(b) => b.to_string(),
            MetaValue::Int(i) => i.to_string(),
            MetaValue::Float(f) => f.to_string(),
            MetaValue::Text(s) => s.clone(),
            MetaValue::List(items) => items.join(","),
        }
    }

    /// NaN and infinities have no JSON form; they are kept as their text.
    fn normalized(self) -> Self {
        match self {
            MetaValue::Float(f) if !f.is_finite() => MetaValue::Text(f.to_string()),
            other => other,
        }
    }

    /// Convert a loose JSON value. `null` and objects have no scalar form.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Bool(b) => Some(MetaValue::Bool(*b)),
            Value::Number(n) => n.as_i64().map(MetaValue::Int).or_else(|| n.as_f64().map(MetaValue::from)),
            Value::String(s) => Some(MetaValue::Text(s.clone())),
            Value::Array(items) => Some(MetaValue::List(
                items.iter().map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string)).collect(),
            )),
            Value::Null | Value::Object(_) => None,
        }
    }
}

impl From<&str> for MetaValue { fn from(v: &str) -> Self { MetaValue::Text(v.to_string()) } }
impl From<String> for MetaValue { fn from(v: String) -> Self { MetaValue::Text(v) } }
impl From<bool> for MetaValue { fn from(v: bool) -> Self { MetaValue::Bool(v) } }
impl From<i64> for MetaValue { fn from(v: i64) -> Self { MetaValue::Int(v) } }
impl From<f64> for MetaValue { fn from(v: f64) -> Self { MetaValue::Float(v).normalized() } }
impl From<Vec<String>> for MetaValue { fn from(v: Vec<String>) -> Self { MetaValue::List(v) } }

pub fn is_reserved_key(key: &str) -> bool { RESERVED_METADATA_KEYS.contains(&key) }

/// One independently indexed unit of text.
///
/// - `id`: globally unique identity; an empty id marks a malformed document
/// - `base_id`: groups sibling chunks of one logical source; replaced as a unit
/// - `source`: provenance tag (`bft`, `system_registry`, `manual_text`, `file_upload`, ...)
/// - `chunk_index`: position within the `base_id` group
/// - `metadata`: free-form scalar fields, never containing reserved keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub base_id: String,
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, base_id: impl Into<String>, content: impl Into<String>, source: impl Into<String>) -> Self {
        Self { id: id.into(), base_id: base_id.into(), content: content.into(), source: source.into(), chunk_index: 0, metadata: Metadata::new() }
    }

    pub fn with_chunk_index(mut self, chunk_index: usize) -> Self { self.chunk_index = chunk_index; self }

    /// Set a metadata field unless `key` is reserved.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.set_metadata(key, value);
        self
    }

    /// Returns `false` when the key is reserved and the value was dropped.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> bool {
        let key = key.into();
        if is_reserved_key(&key) { return false; }
        self.metadata.insert(key, value.into().normalized());
        true
    }

    /// Drop reserved keys and non-finite floats that reached `metadata`
    /// without going through `set_metadata`, e.g. from a hand-edited snapshot.
    /// Returns how many keys were dropped.
    pub fn sanitize_metadata(&mut self) -> usize {
        let before = self.metadata.len();
        self.metadata.retain(|k, _| !is_reserved_key(k));
        for value in self.metadata.values_mut() {
            *value = std::mem::replace(value, MetaValue::Bool(false)).normalized();
        }
        before - self.metadata.len()
    }

    pub fn extend_metadata<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MetaValue>,
    {
        for (k, v) in entries { self.set_metadata(k, v); }
    }

    pub fn has_identity(&self) -> bool { !self.id.trim().is_empty() }

    /// Metadata view including the reserved fields, as handed to vector stores.
    pub fn full_metadata(&self) -> Metadata {
        let mut meta = self.metadata.clone();
        meta.insert("id".into(), MetaValue::Text(self.id.clone()));
        meta.insert("baseId".into(), MetaValue::Text(self.base_id.clone()));
        meta.insert("source".into(), MetaValue::Text(self.source.clone()));
        meta.insert("chunkIndex".into(), MetaValue::Int(self.chunk_index as i64));
        meta
    }
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Vector,
    Text,
}

/// The minimal surface returned by all engines.
///
/// `id` matches `Document::id`. `score` is engine-specific but
/// higher is always better. `source` labels the origin engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: DocumentId,
    pub score: f32,
    pub source: SourceKind,
}

impl SearchHit {
    pub fn text(id: impl Into<String>, score: f32) -> Self { Self { id: id.into(), score, source: SourceKind::Text } }
    pub fn vector(id: impl Into<String>, score: f32) -> Self { Self { id: id.into(), score, source: SourceKind::Vector } }
}

/// A stored vector together with the metadata it was upserted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: DocumentId,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_keys_are_not_overwritten() {
        let doc = Document::new("a1", "doc1", "alpha", "manual_text")
            .with_metadata("source", "spoofed")
            .with_metadata("chunkIndex", 9i64)
            .with_metadata("author", "ops");
        assert_eq!(doc.source, "manual_text");
        assert!(!doc.metadata.contains_key("source"));
        assert!(!doc.metadata.contains_key("chunkIndex"));
        assert_eq!(doc.metadata.get("author"), Some(&MetaValue::Text("ops".into())));
    }

    #[test]
    fn meta_values_serialize_as_plain_json() {
        let doc = Document::new("a1", "doc1", "alpha", "bft")
            .with_metadata("flag", true)
            .with_metadata("n", 3i64)
            .with_metadata("ratio", 0.5f64)
            .with_metadata("tags", vec!["x".to_string(), "y".to_string()]);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["baseId"], "doc1");
        assert_eq!(json["chunkIndex"], 0);
        assert_eq!(json["metadata"]["flag"], true);
        assert_eq!(json["metadata"]["n"], 3);
        assert_eq!(json["metadata"]["tags"][1], "y");
        let back: Document = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn full_metadata_carries_identity() {
        let doc = Document::new("a1", "doc1", "alpha", "bft").with_chunk_index(2);
        let meta = doc.full_metadata();
        assert_eq!(meta.get("baseId").and_then(MetaValue::as_str), Some("doc1"));
        assert_eq!(meta.get("chunkIndex"), Some(&MetaValue::Int(2)));
    }

    #[test]
    fn non_finite_floats_are_kept_as_text() {
        let mut doc = Document::new("a1", "doc1", "alpha", "bft")
            .with_metadata("score", f64::NAN)
            .with_metadata("ceiling", MetaValue::Float(f64::INFINITY))
            .with_metadata("ratio", 0.25f64);
        assert_eq!(doc.metadata.get("score"), Some(&MetaValue::Text("NaN".into())));
        assert_eq!(doc.metadata.get("ceiling"), Some(&MetaValue::Text("inf".into())));
        assert_eq!(doc.metadata.get("ratio"), Some(&MetaValue::Float(0.25)));

        doc.metadata.insert("raw".into(), MetaValue::Float(f64::NEG_INFINITY));
        doc.sanitize_metadata();
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back.metadata.get("raw"), Some(&MetaValue::Text("-inf".into())));
    }

    #[test]
    fn sanitize_drops_reserved_keys() {
        let mut doc = Document::new("a1", "doc1", "alpha", "bft");
        doc.metadata.insert("doc_id".into(), "spoofed".into());
        doc.metadata.insert("source".into(), "spoofed".into());
        doc.metadata.insert("lang".into(), "en".into());
        assert_eq!(doc.sanitize_metadata(), 2);
        assert_eq!(doc.metadata.keys().collect::<Vec<_>>(), vec!["lang"]);
    }

    #[test]
    fn loose_json_maps_to_scalars() {
        let v: serde_json::Value = serde_json::json!({"n": 3, "f": 0.5, "t": "x", "l": ["a", 1], "z": null});
        assert_eq!(MetaValue::from_json(&v["n"]), Some(MetaValue::Int(3)));
        assert_eq!(MetaValue::from_json(&v["f"]), Some(MetaValue::Float(0.5)));
        assert_eq!(MetaValue::from_json(&v["l"]), Some(MetaValue::List(vec!["a".into(), "1".into()])));
        assert_eq!(MetaValue::from_json(&v["z"]), None);
    }

    #[test]
    fn blank_id_has_no_identity() {
        assert!(!Document::new("  ", "b", "c", "s").has_identity());
        assert!(Document::new("x", "b", "c", "s").has_identity());
    }
}
