//! Query collaborator contract and built-in sources.

#![forbid(unsafe_code)]

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Caching directive passed along with a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    CacheFirst,
    CacheAndNetwork,
    #[default]
    NetworkOnly,
    CacheOnly,
    NoCache,
}

impl FetchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchPolicy::CacheFirst => "cache-first",
            FetchPolicy::CacheAndNetwork => "cache-and-network",
            FetchPolicy::NetworkOnly => "network-only",
            FetchPolicy::CacheOnly => "cache-only",
            FetchPolicy::NoCache => "no-cache",
        }
    }
}

impl fmt::Display for FetchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cache-first" => Ok(FetchPolicy::CacheFirst),
            "cache-and-network" => Ok(FetchPolicy::CacheAndNetwork),
            "network-only" => Ok(FetchPolicy::NetworkOnly),
            "cache-only" => Ok(FetchPolicy::CacheOnly),
            "no-cache" => Ok(FetchPolicy::NoCache),
            other => Err(format!("unknown fetch policy: {}", other)),
        }
    }
}

/// A query plus its variables and fetch policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub fetch_policy: FetchPolicy,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Self::default() }
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = policy;
        self
    }

    /// Stable key of query + variables, used for caching.
    pub fn cache_key(&self) -> String {
        format!("{}\u{0}{}", self.query, Value::Object(self.variables.clone()))
    }
}

/// Errors reported by a query source. Kept as plain strings so they can cross a
/// process boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum QueryError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("cache miss for query `{0}`")]
    CacheMiss(String),
    #[error("source: {0}")]
    Source(String),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Executes queries. Caching, deduplication and transport are up to the implementation.
#[async_trait::async_trait]
pub trait QuerySource: Send + Sync {
    async fn fetch(&self, request: &QueryRequest) -> QueryResult<Value>;
}

#[async_trait::async_trait]
impl<S: QuerySource + ?Sized> QuerySource for Arc<S> {
    async fn fetch(&self, request: &QueryRequest) -> QueryResult<Value> {
        (**self).fetch(request).await
    }
}

/// Always answers with the same response.
#[derive(Debug, Clone)]
pub struct StaticSource {
    response: Value,
}

impl StaticSource {
    pub fn new(response: Value) -> Self { Self { response } }
}

#[async_trait::async_trait]
impl QuerySource for StaticSource {
    async fn fetch(&self, _request: &QueryRequest) -> QueryResult<Value> {
        Ok(self.response.clone())
    }
}

/// Reads a JSON response document from disk on every fetch.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self { Self { path: path.as_ref().to_path_buf() } }

    pub fn path(&self) -> &Path { &self.path }
}

#[async_trait::async_trait]
impl QuerySource for FileSource {
    async fn fetch(&self, request: &QueryRequest) -> QueryResult<Value> {
        debug!(path = %self.path.display(), query = %request.query, "reading response document");
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| QueryError::Io(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_slice(&bytes).map_err(|e| QueryError::Parse(format!("{}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fetch_policy_names_round_trip() {
        for p in [
            FetchPolicy::CacheFirst,
            FetchPolicy::CacheAndNetwork,
            FetchPolicy::NetworkOnly,
            FetchPolicy::CacheOnly,
            FetchPolicy::NoCache,
        ] {
            assert_eq!(p.as_str().parse::<FetchPolicy>(), Ok(p));
            assert_eq!(serde_json::to_value(p).unwrap(), json!(p.as_str()));
        }
        assert!("sometimes".parse::<FetchPolicy>().is_err());
        assert_eq!(FetchPolicy::default(), FetchPolicy::NetworkOnly);
    }

    #[test]
    fn cache_key_depends_on_variables() {
        let a = QueryRequest::new("products").variable("orderBy", "price_ASC");
        let b = QueryRequest::new("products").variable("orderBy", "price_DESC");
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), a.clone().fetch_policy(FetchPolicy::CacheOnly).cache_key());
    }

    #[tokio::test]
    async fn file_source_reports_io_and_parse_errors() {
        let dir = std::env::temp_dir();
        let missing = FileSource::new(dir.join("tably-definitely-missing.json"));
        assert_eq!(missing.path(), dir.join("tably-definitely-missing.json"));
        match missing.fetch(&QueryRequest::default()).await {
            Err(QueryError::Io(msg)) => assert!(msg.starts_with(&missing.path().display().to_string())),
            other => panic!("expected io error, got {:?}", other),
        }

        let bad = dir.join(format!("tably-bad-{}.json", std::process::id()));
        std::fs::write(&bad, b"{ not json").unwrap();
        let res = FileSource::new(&bad).fetch(&QueryRequest::default()).await;
        let _ = std::fs::remove_file(&bad);
        assert!(matches!(res, Err(QueryError::Parse(_))));
    }
}
