//! Downloader configuration

use anyhow::bail;
use downloader_common::{
    fetcher::{Fetcher, FetcherOptions, load_identity},
    timerange::TimeRange,
};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::{path::PathBuf, str::FromStr};
use url::Url;

/// How to handle advisories that fail validation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// A failing check abandons the advisory.
    #[default]
    Strict,
    /// Advisories failing validation are quarantined below
    /// `failed_validation`.
    Unsafe,
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "unsafe" => Ok(Self::Unsafe),
            _ => Err(format!("invalid validation mode {s:?}, expected 'strict' or 'unsafe'")),
        }
    }
}

/// Hash algorithms of advisory sidecars.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(format!("invalid hash algorithm {s:?}, expected 'sha256' or 'sha512'")),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        })
    }
}

/// The configuration of a downloader run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory to store the downloaded files in.
    pub directory: PathBuf,
    /// Skip TLS verification towards the publisher.
    pub insecure: bool,
    /// Downgrade a failing signature check to a warning.
    pub ignore_signature_check: bool,

    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub client_passphrase: Option<String>,

    /// Validate and forward, but do not write to disk.
    pub no_store: bool,
    /// Maximum number of HTTP operations per second. Unset means unlimited.
    pub rate: Option<f64>,
    /// Number of download workers.
    pub worker: usize,
    /// Only accept advisories within this range.
    pub time_range: Option<TimeRange>,
    /// Store below this sub folder instead of `<label>/<year>`.
    pub folder: Option<String>,
    /// URLs matching any of these patterns are skipped.
    pub ignore_pattern: Vec<Regex>,
    /// Extra `name:value` headers for publisher-facing requests.
    pub extra_header: Vec<String>,

    /// Only enumerate provider metadata documents.
    pub enumerate_pmd_only: bool,

    pub remote_validator: Option<String>,
    pub remote_validator_cache: Option<PathBuf>,
    pub remote_validator_presets: Vec<String>,
    pub validation_mode: ValidationMode,

    pub forward_url: Option<Url>,
    pub forward_header: Vec<String>,
    /// Queue size of the forwarder, submissions block when it is full.
    pub forward_queue: usize,
    pub forward_insecure: bool,
    /// Emit a copy of each advisory on the in-process channel.
    pub forward_channel: bool,

    /// Stop fetching the other hash once this one was retrieved.
    pub preferred_hash: Option<HashAlgorithm>,

    /// Log outgoing requests and redirects.
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory: ".".into(),
            insecure: false,
            ignore_signature_check: false,
            client_cert: None,
            client_key: None,
            client_passphrase: None,
            no_store: false,
            rate: None,
            worker: 2,
            time_range: None,
            folder: None,
            ignore_pattern: Vec::new(),
            extra_header: Vec::new(),
            enumerate_pmd_only: false,
            remote_validator: None,
            remote_validator_cache: None,
            remote_validator_presets: Vec::new(),
            validation_mode: ValidationMode::default(),
            forward_url: None,
            forward_header: Vec::new(),
            forward_queue: 1,
            forward_insecure: false,
            forward_channel: false,
            preferred_hash: None,
            verbose: false,
        }
    }
}

impl Config {
    /// Check whether a URL is matched by one of the ignore patterns.
    pub fn ignore_url(&self, url: &str) -> bool {
        self.ignore_pattern.iter().any(|pattern| pattern.is_match(url))
    }

    /// Create the HTTP client used towards the publisher.
    pub fn new_fetcher(&self) -> anyhow::Result<Fetcher> {
        let mut options = FetcherOptions::new()
            .insecure(self.insecure)
            .rate(self.rate)
            .verbose(self.verbose)
            .headers(parse_headers(&self.extra_header)?);

        match (&self.client_cert, &self.client_key) {
            (Some(cert), Some(key)) => {
                options = options.identity(load_identity(
                    cert,
                    key,
                    self.client_passphrase.as_deref(),
                )?);
            }
            (None, None) => {}
            _ => bail!("client_cert and client_key must be given together"),
        }

        Fetcher::new(options)
    }

    /// Create the independent HTTP client of the forwarder. No rate limit,
    /// no client certificates.
    pub fn new_forward_fetcher(&self) -> anyhow::Result<Fetcher> {
        Fetcher::new(
            FetcherOptions::new()
                .insecure(self.forward_insecure)
                .verbose(self.verbose)
                .headers(parse_headers(&self.forward_header)?),
        )
    }
}

/// Parse extra header lines of the form `name:value` into a header map.
pub fn parse_headers(headers: &[String]) -> anyhow::Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for header in headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("invalid header {header:?}, expected 'name:value'");
        };
        map.append(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    Ok(map)
}
