use crate::config::ApiConfig;
use crate::error::RegistryError;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One known face as loaded from the registry service. Immutable once
/// loaded; the registry replaces the whole set on refresh.
#[derive(Debug, Clone)]
pub struct FaceRecord {
    pub name: String,
    pub encoding: Vec<f64>,
    pub authorized: bool,
}

/// Outcome of matching a probe embedding against the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Probe landed within the confidence threshold of a known face.
    Known {
        name: String,
        authorized: bool,
        distance: f64,
    },
    /// No known face was close enough (or the registry is empty).
    Unknown,
}

/// Cached set of known face encodings.
#[derive(Debug, Clone, Default)]
pub struct FaceRegistry {
    records: Vec<FaceRecord>,
}

impl FaceRegistry {
    pub fn new(records: Vec<FaceRecord>) -> Self {
        Self { records }
    }

    /// Registry with no known faces; every probe classifies as unknown.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[FaceRecord] {
        &self.records
    }

    /// Nearest-neighbour classification of a probe embedding.
    ///
    /// Stable argmin: on a distance tie the earliest-loaded record wins.
    /// Records whose encoding length differs from the probe are skipped.
    pub fn classify(&self, probe: &[f64], threshold: f64) -> MatchOutcome {
        let mut best: Option<(&FaceRecord, f64)> = None;

        for record in &self.records {
            if record.encoding.len() != probe.len() {
                warn!(
                    "Skipping '{}': encoding length {} does not match probe length {}",
                    record.name,
                    record.encoding.len(),
                    probe.len()
                );
                continue;
            }
            let distance = euclidean_distance(&record.encoding, probe);
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((record, distance)),
            }
        }

        match best {
            Some((record, distance)) if distance < threshold => MatchOutcome::Known {
                name: record.name.clone(),
                authorized: record.authorized,
                distance,
            },
            _ => MatchOutcome::Unknown,
        }
    }
}

fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Decode a face encoding transmitted as base64 of raw little-endian f64s.
pub fn decode_encoding(name: &str, b64: &str) -> Result<Vec<f64>, RegistryError> {
    let bytes = BASE64
        .decode(b64)
        .map_err(|e| RegistryError::InvalidEncoding {
            name: name.to_string(),
            details: e.to_string(),
        })?;

    if bytes.len() % 8 != 0 {
        return Err(RegistryError::InvalidEncoding {
            name: name.to_string(),
            details: format!("payload of {} bytes is not a whole number of f64s", bytes.len()),
        });
    }

    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| f64::from_le_bytes(chunk.try_into().unwrap()))
        .collect())
}

#[derive(Debug, Deserialize)]
struct FacesResponse {
    #[serde(default)]
    data: Option<FacesData>,
}

#[derive(Debug, Deserialize)]
struct FacesData {
    #[serde(default)]
    faces: Vec<FaceEntry>,
}

#[derive(Debug, Deserialize)]
struct FaceEntry {
    name: String,
    #[serde(default)]
    face_encoding: Option<String>,
    #[serde(default)]
    is_authorized: bool,
}

/// Client for the remote face-registry service.
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
    recipient: String,
}

impl RegistryClient {
    pub fn new(api: &ApiConfig, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: api.base_url.clone(),
            auth_token: api.auth_token.clone(),
            recipient: api.recipient.clone(),
        }
    }

    /// Fetch the registered faces for the configured recipient.
    pub async fn fetch(&self) -> Result<FaceRegistry, RegistryError> {
        let url = format!("{}/faces/list", self.base_url);
        debug!("Fetching face registry from {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.auth_token)
            .json(&serde_json::json!({ "email": self.recipient }))
            .send()
            .await
            .map_err(|e| RegistryError::Request {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Request {
                details: format!("registry returned HTTP {}", status.as_u16()),
            });
        }

        let body: FacesResponse =
            response
                .json()
                .await
                .map_err(|e| RegistryError::MalformedResponse {
                    details: e.to_string(),
                })?;

        let entries = body.data.map(|d| d.faces).unwrap_or_default();

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(encoded) = entry.face_encoding else {
                warn!("Registry entry '{}' has no face encoding, skipping", entry.name);
                continue;
            };
            match decode_encoding(&entry.name, &encoded) {
                Ok(encoding) => records.push(FaceRecord {
                    name: entry.name,
                    encoding,
                    authorized: entry.is_authorized,
                }),
                Err(e) => warn!("{}", e),
            }
        }

        info!(
            "Loaded {} faces from registry: {:?}",
            records.len(),
            records.iter().map(|r| r.name.as_str()).collect::<Vec<_>>()
        );

        Ok(FaceRegistry::new(records))
    }

    /// Fetch, degrading any failure to an empty registry. The loop treats
    /// "zero known faces" as a working state, not an error.
    pub async fn fetch_or_empty(&self) -> FaceRegistry {
        match self.fetch().await {
            Ok(registry) => registry,
            Err(e) => {
                warn!("Face registry fetch failed, running with no known faces: {}", e);
                FaceRegistry::empty()
            }
        }
    }
}
