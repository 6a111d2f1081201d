use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence failed for {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot {} is malformed: {source}", .path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Vector store failure: {0}")]
    Vector(String),

    #[error("Embedding failure: {0}")]
    Embedding(String),
}

impl Error {
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Persistence { path: path.into(), source }
    }

    pub fn vector(msg: impl std::fmt::Display) -> Self { Error::Vector(msg.to_string()) }

    pub fn embedding(msg: impl std::fmt::Display) -> Self { Error::Embedding(msg.to_string()) }

    /// Failures of the vector capability, which retrieval may degrade around.
    pub fn is_vector(&self) -> bool { matches!(self, Error::Vector(_) | Error::Embedding(_)) }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_vector_failures() {
        assert!(Error::vector("down").is_vector());
        assert!(Error::embedding("oom").is_vector());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(!Error::persistence("/tmp/x.json", io).is_vector());
    }

    #[test]
    fn persistence_message_names_the_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let msg = Error::persistence("/data/bm25_index.json", io).to_string();
        assert!(msg.contains("/data/bm25_index.json"));
        assert!(msg.contains("denied"));
    }
}
