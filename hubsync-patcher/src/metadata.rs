//! Authoritative depot → manifest metadata.
//!
//! Responses are classified rather than trusted: only `status == "success"`
//! payloads are used, and a payload that does not have the expected shape is
//! [`MetadataLookup::Malformed`], which callers treat like not found.

use std::collections::BTreeMap;
use std::time::Duration;

use hubsync_core::{DepotId, ManifestId, PackageId, Settings};
use serde_json::Value;

use crate::error::MetadataError;

pub type DepotManifestMap = BTreeMap<DepotId, ManifestId>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataLookup {
    Found(DepotManifestMap),
    NotFound,
    Malformed,
}

/// Source of authoritative manifest ids.
pub trait MetadataSource {
    fn lookup(&self, package: &PackageId) -> Result<MetadataLookup, MetadataError>;
}

/// Classify a decoded response for `package`.
///
/// Shape: `data.<package>.depots.<depot>.manifests.public.gid`. When the
/// package key is absent the first entry under `data` is used. Non-object
/// depot entries and depots without a public manifest contribute nothing.
pub fn classify_response(package: &PackageId, body: &Value) -> MetadataLookup {
    let Some(root) = body.as_object() else {
        return MetadataLookup::Malformed;
    };
    if root.get("status").and_then(Value::as_str) != Some("success") {
        return MetadataLookup::NotFound;
    }
    let Some(data) = root.get("data").and_then(Value::as_object) else {
        return MetadataLookup::Malformed;
    };
    let Some(app) = data
        .get(package.as_str())
        .or_else(|| data.values().next())
        .and_then(Value::as_object)
    else {
        return MetadataLookup::NotFound;
    };
    let depots = match app.get("depots") {
        None => return MetadataLookup::Found(DepotManifestMap::new()),
        Some(Value::Object(depots)) => depots,
        Some(_) => return MetadataLookup::Malformed,
    };

    let map = depots
        .iter()
        .filter_map(|(depot, entry)| {
            let gid = entry
                .as_object()?
                .get("manifests")?
                .get("public")?
                .get("gid")?;
            let gid = match gid {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((DepotId::from(depot.as_str()), ManifestId::from(gid)))
        })
        .collect();
    MetadataLookup::Found(map)
}

/// Merge per-package maps in declaration order. Later packages override
/// earlier ones for the same depot; empty values never override.
pub fn merge_maps(maps: impl IntoIterator<Item = DepotManifestMap>) -> DepotManifestMap {
    let mut merged = DepotManifestMap::new();
    for map in maps {
        for (depot, manifest) in map {
            if !manifest.is_empty() {
                merged.insert(depot, manifest);
            }
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// `GET {base}/{package}` over `ureq`.
#[derive(Debug)]
pub struct MetadataClient {
    agent: ureq::Agent,
    base_url: String,
}

impl MetadataClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("hubsync/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.metadata.api_base_url, settings.metadata_timeout())
    }
}

impl MetadataSource for MetadataClient {
    fn lookup(&self, package: &PackageId) -> Result<MetadataLookup, MetadataError> {
        let url = format!("{}/{}", self.base_url, package);
        let response = match self.agent.get(&url).call() {
            Ok(r) => r,
            Err(ureq::Error::Status(404, _)) => {
                return Err(MetadataError::NotFound {
                    package: package.to_string(),
                })
            }
            Err(ureq::Error::Status(status, _)) if status == 429 || status >= 500 => {
                return Err(MetadataError::Transient {
                    package: package.to_string(),
                    message: format!("HTTP {status}"),
                })
            }
            Err(ureq::Error::Status(status, _)) => {
                return Err(MetadataError::Other {
                    package: package.to_string(),
                    message: format!("HTTP {status}"),
                })
            }
            Err(ureq::Error::Transport(t)) => {
                return Err(MetadataError::Transient {
                    package: package.to_string(),
                    message: t.to_string(),
                })
            }
        };
        match response.into_json::<Value>() {
            Ok(body) => Ok(classify_response(package, &body)),
            Err(e) => {
                tracing::debug!(package = %package, error = %e, "undecodable metadata response");
                Ok(MetadataLookup::Malformed)
            }
        }
    }
}
