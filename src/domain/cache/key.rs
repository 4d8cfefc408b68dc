//! Content-addressed cache key derivation

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::domain::DomainError;

/// Number of hex characters of the SHA-256 digest kept in a key
pub const DIGEST_HEX_LEN: usize = 16;

/// Decimal places used when canonicalizing embedding vectors
const VECTOR_PRECISION: usize = 6;

/// Namespaces of the content-addressed cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Text -> embedding vector
    Embedding,
    /// Raw query text -> full query result
    Query,
    /// (embedding, limit) -> ranked search hits
    Search,
}

impl CacheNamespace {
    pub const ALL: [CacheNamespace; 3] = [Self::Embedding, Self::Query, Self::Search];

    /// Key prefix, including the trailing separator
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding:",
            Self::Query => "query:",
            Self::Search => "search:",
        }
    }

    /// Glob pattern matching every key of the namespace
    pub fn pattern(&self) -> String {
        format!("{}*", self.prefix())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Query => "query",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of a cache clear operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    /// Every content namespace (conversation keys are not touched)
    All,
    Namespace(CacheNamespace),
}

impl ClearScope {
    pub fn namespaces(&self) -> Vec<CacheNamespace> {
        match self {
            Self::All => CacheNamespace::ALL.to_vec(),
            Self::Namespace(ns) => vec![*ns],
        }
    }
}

impl fmt::Display for ClearScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Namespace(ns) => write!(f, "{}", ns),
        }
    }
}

impl FromStr for ClearScope {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "embedding" | "embeddings" => Ok(Self::Namespace(CacheNamespace::Embedding)),
            "query" | "queries" => Ok(Self::Namespace(CacheNamespace::Query)),
            "search" | "searches" => Ok(Self::Namespace(CacheNamespace::Search)),
            other => Err(DomainError::validation(format!(
                "Unknown cache type: {}. Valid types: all, embeddings, queries, searches",
                other
            ))),
        }
    }
}

/// Derives deterministic keys from content
#[derive(Debug, Clone, Default)]
pub struct ContentKeyGenerator;

impl ContentKeyGenerator {
    pub fn new() -> Self {
        Self
    }

    /// `namespace_prefix + first 16 hex chars of SHA-256(content)`
    pub fn generate(&self, namespace: CacheNamespace, content: &str) -> String {
        let digest = hex::encode(Sha256::digest(content.as_bytes()));
        format!("{}{}", namespace.prefix(), &digest[..DIGEST_HEX_LEN])
    }
}

/// Canonical form of an (embedding, limit) pair for the search namespace
///
/// Floats are written with a fixed precision so that vectors which round-trip
/// through JSON serialization keep producing the same key.
pub fn canonical_search_content(vector: &[f32], limit: usize) -> String {
    let mut out = String::with_capacity(vector.len() * 10 + 8);
    out.push('[');

    for (i, value) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!("{:.*}", VECTOR_PRECISION, value));
    }

    out.push(']');
    out.push('_');
    out.push_str(&limit.to_string());
    out
}
