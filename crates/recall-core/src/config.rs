//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Load `config.toml` and the env overlay from `dir`.
    pub fn load_from(dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::new()
            .merge(Serialized::default("retrieval", RetrievalSettings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn retrieval(&self) -> Result<RetrievalSettings> {
        let settings: RetrievalSettings = self.get("retrieval")?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackendKind {
    Flat,
    Lancedb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedderKind {
    BgeM3,
    Fake,
}

/// The `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub data_dir: String,
    pub snapshot_file: String,
    pub vector_dir: String,
    pub vector_backend: VectorBackendKind,
    pub table_name: String,
    pub top_k: usize,
    pub lexical_weight: f64,
    pub vector_weight: f64,
    pub rrf_constant: f64,
    pub bm25_k1: f64,
    pub bm25_b: f64,
    pub tolerate_vector_failure: bool,
    pub use_default_stop_words: bool,
    pub embedder: EmbedderKind,
    pub model_dir: Option<String>,
    pub fake_dim: usize,
    pub chunk_max_tokens: usize,
    pub chunk_overlap: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
            snapshot_file: "bm25_index.json".into(),
            vector_dir: "vectors".into(),
            vector_backend: VectorBackendKind::Flat,
            table_name: "rag_corpus".into(),
            top_k: 6,
            lexical_weight: 0.4,
            vector_weight: 0.6,
            rrf_constant: 60.0,
            bm25_k1: 1.5,
            bm25_b: 0.75,
            tolerate_vector_failure: false,
            use_default_stop_words: false,
            embedder: EmbedderKind::BgeM3,
            model_dir: None,
            fake_dim: 384,
            chunk_max_tokens: 400,
            chunk_overlap: 40,
        }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 { return Err(Error::InvalidConfig("retrieval.top_k must be > 0".into())); }
        if self.lexical_weight < 0.0 || self.vector_weight < 0.0 {
            return Err(Error::InvalidConfig("retrieval weights must be non-negative".into()));
        }
        if self.rrf_constant < 0.0 { return Err(Error::InvalidConfig("retrieval.rrf_constant must be >= 0".into())); }
        if !(0.0..=1.0).contains(&self.bm25_b) { return Err(Error::InvalidConfig("retrieval.bm25_b must be within [0, 1]".into())); }
        if self.chunk_max_tokens == 0 { return Err(Error::InvalidConfig("retrieval.chunk_max_tokens must be > 0".into())); }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf { expand_path(&self.data_dir) }

    pub fn snapshot_path(&self) -> PathBuf { resolve_with_base(&self.data_dir(), &self.snapshot_file) }

    pub fn vector_path(&self) -> PathBuf { resolve_with_base(&self.data_dir(), &self.vector_dir) }

    pub fn model_path(&self) -> Option<PathBuf> { self.model_dir.as_deref().map(expand_path) }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
