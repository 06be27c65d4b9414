//! Endpoint descriptors: the static shape of one benchmarked operation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{BenchError, Result};

// Matches `[param]` placeholders in a path template
static PLACEHOLDER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\[\]]+)\]").unwrap());

/// HTTP method of a benchmarked request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Patch => write!(f, "PATCH"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(format!("Unsupported method: {}", s)),
        }
    }
}

/// Static definition of one logical operation to benchmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Display name, unique within a suite
    pub name: String,
    #[serde(default)]
    pub method: Method,
    /// Path template with `[param]` placeholders
    pub path: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Query string appended verbatim (with or without the leading `?`)
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON body, sent for non-GET methods
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl EndpointDescriptor {
    pub fn new(name: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            params: BTreeMap::new(),
            query: None,
            headers: BTreeMap::new(),
            payload: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Names of every placeholder in the path template, in order of appearance
    pub fn placeholders(&self) -> Vec<&str> {
        PLACEHOLDER_PATTERN
            .captures_iter(&self.path)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Substitute every `[param]` in the path template.
    ///
    /// Fails with [`BenchError::UnresolvedPlaceholder`] on the first
    /// placeholder that has no value in `params`.
    pub fn resolve_path(&self) -> Result<String> {
        if let Some(missing) = self
            .placeholders()
            .into_iter()
            .find(|name| !self.params.contains_key(*name))
        {
            return Err(BenchError::UnresolvedPlaceholder {
                endpoint: self.name.clone(),
                placeholder: missing.to_string(),
            });
        }

        let resolved = PLACEHOLDER_PATTERN.replace_all(&self.path, |caps: &regex::Captures| {
            self.params
                .get(&caps[1])
                .cloned()
                .unwrap_or_default()
        });
        Ok(resolved.into_owned())
    }

    /// Resolved path plus query string, ready to append to a target base URL
    pub fn path_and_query(&self) -> Result<String> {
        let path = self.resolve_path()?;
        match self.query.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => {
                let q = q.trim_start_matches('?');
                Ok(format!("{}?{}", path, q))
            }
            _ => Ok(path),
        }
    }
}

/// Reject a suite before any request is issued.
///
/// Checks that the suite is non-empty, names are unique and every
/// placeholder resolves.
pub fn validate_suite(endpoints: &[EndpointDescriptor]) -> Result<()> {
    if endpoints.is_empty() {
        return Err(BenchError::InvalidConfig(
            "endpoint suite is empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for endpoint in endpoints {
        if !seen.insert(endpoint.name.as_str()) {
            return Err(BenchError::DuplicateEndpoint(endpoint.name.clone()));
        }
        endpoint.resolve_path()?;
    }

    Ok(())
}

/// Built-in suite used when no suite file is given
pub fn default_suite() -> Vec<EndpointDescriptor> {
    vec![
        EndpointDescriptor::new("Simple Ping", Method::Get, "/ping"),
        EndpointDescriptor::new("Medium API", Method::Get, "/api/v1/data"),
        EndpointDescriptor::new("Complex Process", Method::Post, "/api/v1/process").with_payload(
            serde_json::json!({
                "data": "test",
                "nested": {"field": "value"},
                "array": [1, 2, 3, 4, 5]
            }),
        ),
    ]
}
