//! System registry entities and their rendering into retrievable documents.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::ingest::{chunk_text, clean_text, ChunkingConfig};
use crate::traits::SystemRegistry;
use crate::types::{Document, MetaValue};

pub const REGISTRY_SOURCE: &str = "system_registry";

const MISSING: &str = "—";

static SYSTEM_ID_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(?:system[_\s-]?id|id\s*):\s*([a-zA-Z0-9_.-]+)").ok());
static SYSTEM_NAME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(?:system\s*name|название|title|имя)\s*[:|-]\s*(.+)").ok());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemEntity {
    #[serde(alias = "system_id")]
    pub system_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<SystemInterface>,
    #[serde(default)]
    pub topics: Vec<IntegrationTopic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInterface {
    #[serde(alias = "interface_type", alias = "type")]
    pub interface_type: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationTopic {
    pub name: String,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default, alias = "payload_schema")]
    pub payload_schema: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SystemEntity {
    pub fn new(system_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            name: name.into(),
            description: None,
            domain: None,
            owner: None,
            interfaces: Vec::new(),
            topics: Vec::new(),
        }
    }

    /// Group key for every document rendered from this entity.
    pub fn base_id(&self) -> String { system_base_id(&self.system_id) }
}

pub fn system_base_id(system_id: &str) -> String { format!("system::{system_id}") }

fn or_missing(v: Option<&String>) -> &str {
    v.map(String::as_str).filter(|s| !s.trim().is_empty()).unwrap_or(MISSING)
}

/// The plain-text card for one system.
pub fn render_system_card(system: &SystemEntity) -> String {
    let mut lines = vec![
        format!("System ID: {}", system.system_id),
        format!("Name: {}", system.name),
        format!("Description: {}", or_missing(system.description.as_ref())),
        format!("Domain: {}", or_missing(system.domain.as_ref())),
        format!("Owner: {}", or_missing(system.owner.as_ref())),
    ];
    if !system.interfaces.is_empty() {
        lines.push("Interfaces:".into());
        for iface in &system.interfaces {
            lines.push(format!(
                "- {}: {} ({})",
                iface.interface_type,
                or_missing(iface.endpoint.as_ref()),
                or_missing(iface.description.as_ref()),
            ));
        }
    }
    if !system.topics.is_empty() {
        lines.push("Integration topics:".into());
        for topic in &system.topics {
            let direction = topic.direction.as_deref().filter(|d| !d.trim().is_empty()).unwrap_or("n/a");
            lines.push(format!("- {} [{}] schema={}", topic.name, direction, or_missing(topic.payload_schema.as_ref())));
        }
    }
    lines.join("\n")
}

/// Render every entity into `system_registry` documents. Entities with a
/// blank `system_id` produce nothing.
pub fn render_system_documents(systems: &[SystemEntity], config: &ChunkingConfig) -> Vec<Document> {
    let mut docs = Vec::new();
    for system in systems.iter().filter(|s| !s.system_id.trim().is_empty()) {
        let base_id = system.base_id();
        let content = clean_text(&render_system_card(system));
        for (i, chunk) in chunk_text(&content, config).into_iter().enumerate() {
            docs.push(
                Document::new(format!("{base_id}::{i}"), base_id.clone(), chunk, REGISTRY_SOURCE)
                    .with_chunk_index(i)
                    .with_metadata("system_id", system.system_id.clone())
                    .with_metadata("system_name", system.name.clone()),
            );
        }
    }
    docs
}

/// A system mentioned by retrieved documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnownSystem {
    pub system_id: String,
    pub system_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

fn meta_text(doc: &Document, key: &str) -> Option<String> {
    doc.metadata.get(key).map(MetaValue::to_display_string).filter(|s| !s.trim().is_empty())
}

fn capture(pattern: &LazyLock<Option<Regex>>, text: &str) -> Option<String> {
    let re = pattern.as_ref()?;
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str().trim().to_string())
}

/// Collect distinct systems referenced by `docs`, first by metadata and then
/// by scanning the content. Ids compare case-insensitively; first sighting
/// wins except that a later alias is still recorded.
pub fn extract_known_systems(docs: &[Document]) -> Vec<KnownSystem> {
    let mut found: Vec<KnownSystem> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for doc in docs {
        let Some(system_id) = meta_text(doc, "system_id").or_else(|| capture(&SYSTEM_ID_PATTERN, &doc.content)) else {
            continue;
        };
        let system_name = meta_text(doc, "system_name")
            .or_else(|| meta_text(doc, "title"))
            .or_else(|| capture(&SYSTEM_NAME_PATTERN, &doc.content))
            .unwrap_or_else(|| system_id.clone());
        let key = system_id.to_lowercase();
        let slot = *index.entry(key).or_insert_with(|| {
            found.push(KnownSystem { system_id, system_name, alias: None });
            found.len() - 1
        });
        if let Some(alias) = meta_text(doc, "alias").or_else(|| meta_text(doc, "aliases")) {
            found[slot].alias = Some(alias);
        }
    }
    found
}

/// Registry backed by a JSON file holding either an array of systems or an
/// object with a `systems` array.
#[derive(Debug, Clone)]
pub struct JsonFileRegistry {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryFile {
    List(Vec<SystemEntity>),
    Wrapped { systems: Vec<SystemEntity> },
}

impl JsonFileRegistry {
    pub fn new(path: impl AsRef<Path>) -> Self { Self { path: path.as_ref().to_path_buf() } }

    pub fn path(&self) -> &Path { &self.path }
}

impl SystemRegistry for JsonFileRegistry {
    fn list_systems(&self) -> Result<Vec<SystemEntity>> {
        if !self.path.exists() {
            return Err(Error::NotFound(format!("registry file {}", self.path.display())));
        }
        let raw = fs::read(&self.path).map_err(|e| Error::persistence(&self.path, e))?;
        let file: RegistryFile = serde_json::from_slice(&raw).map_err(|e| {
            Error::InvalidConfig(format!("registry file {} is malformed: {e}", self.path.display()))
        })?;
        let systems = match file {
            RegistryFile::List(s) | RegistryFile::Wrapped { systems: s } => s,
        };
        debug!(path = %self.path.display(), systems = systems.len(), "registry loaded");
        Ok(systems)
    }
}

impl SystemRegistry for Vec<SystemEntity> {
    fn list_systems(&self) -> Result<Vec<SystemEntity>> { Ok(self.clone()) }
}
