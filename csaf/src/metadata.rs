//! Loading provider metadata

use crate::{errors::DownloadError, model::metadata::ProviderMetadata};
use downloader_common::fetcher::Fetcher;
use reqwest::StatusCode;
use url::Url;

/// The well known path of the provider metadata document.
pub const WELL_KNOWN_METADATA: &str = ".well-known/csaf/provider-metadata.json";

/// Loads the provider metadata document for a domain.
///
/// A domain starting with `https://` is treated as the direct URL of the
/// document, everything else is resolved through the well known path.
pub struct MetadataLoader<'a> {
    fetcher: &'a Fetcher,
}

/// A successfully loaded provider metadata document.
#[derive(Clone, Debug)]
pub struct LoadedMetadata {
    /// The parsed document.
    pub metadata: ProviderMetadata,
    /// The canonical base URL, where the document was actually fetched.
    pub url: Url,
    /// The raw document.
    pub document: serde_json::Value,
}

impl<'a> MetadataLoader<'a> {
    pub fn new(fetcher: &'a Fetcher) -> Self {
        Self { fetcher }
    }

    /// Load the provider metadata for a domain.
    pub async fn load(&self, domain: &str) -> Result<LoadedMetadata, DownloadError> {
        let url = metadata_url(domain)?;

        let response = self.fetcher.get(url.clone()).await.map_err(|err| {
            DownloadError::Publisher(format!(
                "no valid provider-metadata.json found for '{domain}': {err}"
            ))
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::Publisher(format!(
                "no valid provider-metadata.json found for '{domain}': {status}"
            )));
        }

        let document: serde_json::Value = response.json().await.map_err(|err| {
            DownloadError::Publisher(format!(
                "provider-metadata.json for '{domain}' is not valid JSON: {err}"
            ))
        })?;

        let metadata = serde_json::from_value(document.clone()).map_err(|err| {
            DownloadError::Publisher(format!(
                "invalid provider-metadata.json for '{domain}': {err}"
            ))
        })?;

        log::info!("Loaded provider-metadata.json domain={domain} url={url}");

        Ok(LoadedMetadata {
            metadata,
            url,
            document,
        })
    }

    /// Enumerate the provider metadata documents discoverable for a domain.
    pub async fn enumerate(&self, domain: &str) -> Vec<serde_json::Value> {
        let mut documents = Vec::new();

        let Ok(url) = metadata_url(domain) else {
            log::warn!("Invalid domain domain={domain}");
            return documents;
        };

        match self.fetch_document(&url).await {
            Ok(document) => documents.push(document),
            Err(err) => {
                log::debug!("Enumerating provider-metadata.json domain={domain} message={err}")
            }
        }

        documents
    }

    async fn fetch_document(&self, url: &Url) -> Result<serde_json::Value, DownloadError> {
        let response = self
            .fetcher
            .get(url.clone())
            .await
            .map_err(|err| DownloadError::Network(format!("cannot fetch {url}: {err}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::Publisher(format!(
                "fetching {url} failed: {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|err| DownloadError::Publisher(format!("{url} is not valid JSON: {err}")))
    }
}

/// Resolve the URL of the provider metadata document for a domain.
pub fn metadata_url(domain: &str) -> Result<Url, DownloadError> {
    let url = if domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{domain}/{WELL_KNOWN_METADATA}")
    };

    Url::parse(&url).map_err(|err| DownloadError::Publisher(format!("invalid URL '{url}': {err}")))
}
