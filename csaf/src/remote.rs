//! Remote validation of advisories

use anyhow::Context;
use downloader_common::utils::hex::Hex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, io::ErrorKind, path::PathBuf};
use url::Url;

/// Options of the remote validator.
#[derive(Clone, Debug, Default)]
pub struct RemoteValidatorOptions {
    /// Base URL of the validation service.
    pub url: String,
    /// Presets to validate against. Defaults to `mandatory`.
    pub presets: Vec<String>,
    /// File caching verdicts by document digest.
    pub cache: Option<PathBuf>,
}

impl RemoteValidatorOptions {
    /// Open the validator.
    pub fn open(self) -> anyhow::Result<RemoteValidator> {
        let url = Url::parse(&format!(
            "{}/api/v1/validate",
            self.url.trim_end_matches('/')
        ))
        .with_context(|| format!("invalid remote validator URL: {}", self.url))?;

        let presets = if self.presets.is_empty() {
            vec!["mandatory".to_string()]
        } else {
            self.presets
        };

        let cache = self.cache.map(Cache::load).transpose()?;

        Ok(RemoteValidator {
            url,
            tests: presets
                .into_iter()
                .map(|name| ValidationTest {
                    kind: "preset",
                    name,
                })
                .collect(),
            client: reqwest::Client::new(),
            cache,
        })
    }
}

/// A client of the CSAF validator service.
///
/// Not safe for concurrent calls, callers are expected to wrap it into a
/// mutex.
pub struct RemoteValidator {
    url: Url,
    tests: Vec<ValidationTest>,
    client: reqwest::Client,
    cache: Option<Cache>,
}

#[derive(Clone, Debug, Serialize)]
struct ValidationTest {
    #[serde(rename = "type")]
    kind: &'static str,
    name: String,
}

#[derive(Serialize)]
struct ValidationRequest<'a> {
    tests: &'a [ValidationTest],
    document: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct ValidationResponse {
    #[serde(rename = "isValid")]
    is_valid: bool,
}

impl RemoteValidator {
    /// Validate a document, returning the verdict.
    pub async fn validate(&mut self, document: &serde_json::Value) -> anyhow::Result<bool> {
        let key = cache_key(document);

        if let Some(valid) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            log::debug!("Remote validation cache hit key={key}");
            return Ok(valid);
        }

        let response = self
            .client
            .post(self.url.clone())
            .json(&ValidationRequest {
                tests: &self.tests,
                document,
            })
            .send()
            .await
            .context("sending validation request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("remote validator returned {status}");
        }

        let verdict: ValidationResponse = response
            .json()
            .await
            .context("reading validation response failed")?;

        if let Some(cache) = &mut self.cache {
            cache.insert(key, verdict.is_valid);
        }

        Ok(verdict.is_valid)
    }

    /// Close the validator, flushing the verdict cache.
    pub fn close(self) -> anyhow::Result<()> {
        if let Some(cache) = self.cache {
            cache.store()?;
        }
        Ok(())
    }
}

fn cache_key(document: &serde_json::Value) -> String {
    let mut digest = Sha256::new();
    digest.update(document.to_string().as_bytes());
    Hex(&digest.finalize()).to_lower()
}

/// Verdicts by document digest, persisted as a single JSON file.
struct Cache {
    path: PathBuf,
    entries: HashMap<String, bool>,
    dirty: bool,
}

impl Cache {
    fn load(path: PathBuf) -> anyhow::Result<Self> {
        let entries = match std::fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)
                .with_context(|| format!("invalid validation cache: {}", path.display()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("unable to read validation cache: {}", path.display())
                });
            }
        };

        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    fn get(&self, key: &str) -> Option<bool> {
        self.entries.get(key).copied()
    }

    fn insert(&mut self, key: String, valid: bool) {
        self.entries.insert(key, valid);
        self.dirty = true;
    }

    fn store(&self) -> anyhow::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let data = serde_json::to_vec(&self.entries)?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("unable to write validation cache: {}", self.path.display()))
    }
}
