//! The download pipeline

use crate::{
    catalog::{AdvisoryFile, AdvisoryFileProcessor},
    config::{Config, HashAlgorithm, ValidationMode},
    errors::{DownloadError, DownloadErrors, classify_status},
    forwarder::{ForwardJob, ForwarderHandle},
    metadata::MetadataLoader,
    model::metadata::{ProviderMetadata, TlpLabel},
    remote::{RemoteValidator, RemoteValidatorOptions},
    stats::DownloadStats,
    validation::{self, ValidationStatus},
};
use anyhow::Context as _;
use bytes::Bytes;
use digest::Digest;
use downloader_common::{
    fetcher::Fetcher,
    utils::openpgp::{self, PublicKey},
    validate,
};
use reqwest::{StatusCode, header};
use sha2::{Sha256, Sha512};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339};
use tokio::sync::{Mutex as AsyncMutex, broadcast, mpsc};
use url::Url;

/// Sub folder where advisories are stored that fail validation in unsafe
/// mode.
const FAILED_VALIDATION_DIR: &str = "failed_validation";

/// Downloads, verifies and stores the advisories of the given domains.
pub struct Downloader {
    cfg: Arc<Config>,
    fetcher: Fetcher,
    validator: Option<AsyncMutex<RemoteValidator>>,
    forwarder: Option<ForwarderHandle>,
    csafs_tx: Option<mpsc::Sender<Bytes>>,
    mkdir_mutex: AsyncMutex<()>,
    stats: Mutex<DownloadStats>,
}

impl Downloader {
    /// Create a new downloader from a configuration.
    pub fn new(cfg: Arc<Config>) -> anyhow::Result<Self> {
        let fetcher = cfg.new_fetcher()?;

        let validator = cfg
            .remote_validator
            .as_ref()
            .map(|url| {
                RemoteValidatorOptions {
                    url: url.clone(),
                    presets: cfg.remote_validator_presets.clone(),
                    cache: cfg.remote_validator_cache.clone(),
                }
                .open()
                .map(AsyncMutex::new)
            })
            .transpose()
            .context("preparing remote validator failed")?;

        Ok(Self {
            cfg,
            fetcher,
            validator,
            forwarder: None,
            csafs_tx: None,
            mkdir_mutex: AsyncMutex::new(()),
            stats: Mutex::new(DownloadStats::default()),
        })
    }

    /// Attach a forwarder.
    pub fn with_forwarder(mut self, forwarder: ForwarderHandle) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Emit a copy of each downloaded advisory on the returned channel.
    ///
    /// The channel only carries data when `forward_channel` is configured,
    /// and the consumer must keep reading, workers block on a full channel.
    pub fn csaf_channel(&mut self) -> mpsc::Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(1);
        self.csafs_tx = Some(tx);
        rx
    }

    /// Close the downloader, flushing the remote validator cache.
    pub fn close(self) -> anyhow::Result<()> {
        if let Some(validator) = self.validator {
            validator.into_inner().close()?;
        }
        Ok(())
    }

    /// Download the advisories of all given domains, sequentially.
    ///
    /// The run aborts on the first domain that fails. The collected
    /// statistics are logged at the end, failed or not.
    pub async fn run(
        &self,
        shutdown: &broadcast::Sender<()>,
        domains: &[String],
    ) -> Result<(), DownloadError> {
        let result = async {
            for domain in domains {
                self.download(shutdown, domain)
                    .await
                    .map_err(|err| err.context(format!("processing domain '{domain}' failed")))?;
            }
            Ok(())
        }
        .await;

        self.stats.lock().expect("stats mutex").log();

        result
    }

    /// Enumerate the provider metadata documents of all given domains and
    /// print them as a JSON list.
    pub async fn run_enumerate(&self, domains: &[String]) -> Result<(), DownloadError> {
        let loader = MetadataLoader::new(&self.fetcher);

        let mut documents = Vec::new();
        for domain in domains {
            documents.extend(loader.enumerate(domain).await);
        }

        let out = serde_json::to_string_pretty(&documents)
            .map_err(|err| DownloadError::Other(format!("couldn't serialize documents: {err}")))?;
        println!("{out}");

        self.stats.lock().expect("stats mutex").log();

        Ok(())
    }

    async fn download(
        &self,
        shutdown: &broadcast::Sender<()>,
        domain: &str,
    ) -> Result<(), DownloadError> {
        let loader = MetadataLoader::new(&self.fetcher);
        let loaded = loader.load(domain).await?;

        let keys = self.load_openpgp_keys(&loaded.metadata, &loaded.url).await;

        let processor = AdvisoryFileProcessor::new(&self.fetcher, &loaded.metadata, &loaded.url)
            .with_time_range(self.cfg.time_range.as_ref());

        processor
            .process(async |label, files| {
                self.download_files(shutdown, label, files, &keys).await
            })
            .await
    }

    /// Populate the keyring from the metadata declarations.
    ///
    /// Individual key failures only warn, the keyring ends up with every
    /// key whose fingerprint could be verified.
    async fn load_openpgp_keys(&self, metadata: &ProviderMetadata, base: &Url) -> Vec<PublicKey> {
        let mut keys = Vec::new();

        for key in &metadata.public_openpgp_keys {
            let Some(key_url) = &key.url else { continue };

            // a key without declared fingerprint cannot be verified
            let Some(fingerprint) = key.fingerprint.as_deref() else {
                log::warn!("Ignoring key without fingerprint url={key_url}");
                continue;
            };

            let url = match base.join(key_url) {
                Ok(url) => url,
                Err(err) => {
                    log::warn!("Invalid key URL url={key_url} error={err}");
                    continue;
                }
            };

            let response = match self.fetcher.get(url.clone()).await {
                Ok(response) => response,
                Err(err) => {
                    log::warn!("Fetching public OpenPGP key failed url={url} error={err}");
                    continue;
                }
            };
            if response.status() != StatusCode::OK {
                log::warn!(
                    "Fetching public OpenPGP key failed url={url} status={}",
                    response.status()
                );
                continue;
            }

            let data = match response.bytes().await {
                Ok(data) => data,
                Err(err) => {
                    log::warn!("Reading public OpenPGP key failed url={url} error={err}");
                    continue;
                }
            };

            match openpgp::validate_keys(data, Some(fingerprint)) {
                Ok(key) => keys.push(key),
                Err(err) => {
                    log::warn!("Rejecting public OpenPGP key url={url} error={err}");
                }
            }
        }

        log::info!("Loaded {} public key(s)", keys.len());

        keys
    }

    /// Run the worker pool over a batch of advisory files.
    async fn download_files(
        &self,
        shutdown: &broadcast::Sender<()>,
        label: TlpLabel,
        files: Vec<AdvisoryFile>,
        keys: &[PublicKey],
    ) -> Result<(), DownloadError> {
        let worker_count = self.cfg.worker.max(1);

        let (advisory_tx, advisory_rx) = mpsc::channel::<AdvisoryFile>(1);
        let advisory_rx = Arc::new(AsyncMutex::new(advisory_rx));
        let (error_tx, mut error_rx) = mpsc::unbounded_channel::<DownloadError>();

        // drains the error channel while the workers run
        let collector = async move {
            let mut errors = Vec::new();
            while let Some(err) = error_rx.recv().await {
                errors.push(err);
            }
            errors
        };

        let workers = futures::future::join_all((0..worker_count).map(|_| {
            self.download_worker(
                label,
                advisory_rx.clone(),
                error_tx.clone(),
                keys,
                shutdown.subscribe(),
            )
        }));
        drop(error_tx);

        let mut shutdown_rx = shutdown.subscribe();
        let sender = async move {
            for file in files {
                tokio::select! {
                    result = advisory_tx.send(file) => {
                        if result.is_err() {
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
            // dropping the sender closes the channel, letting workers exit
        };

        let (_, _, errors) = tokio::join!(sender, workers, collector);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DownloadErrors(errors).into())
        }
    }

    /// A single download worker, consuming the shared advisory channel.
    ///
    /// On shutdown the advisory currently in flight is finished, the worker
    /// exits on the next channel read.
    async fn download_worker(
        &self,
        label: TlpLabel,
        files: Arc<AsyncMutex<mpsc::Receiver<AdvisoryFile>>>,
        errors: mpsc::UnboundedSender<DownloadError>,
        keys: &[PublicKey],
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut stats = DownloadStats::default();
        let mut last_dir = None;

        loop {
            let file = {
                let mut files = files.lock().await;
                tokio::select! {
                    file = files.recv() => file,
                    _ = shutdown.recv() => None,
                }
            };
            let Some(file) = file else { break };

            self.download_advisory(label, file, keys, &errors, &mut stats, &mut last_dir)
                .await;
        }

        self.stats.lock().expect("stats mutex").add(&stats);
    }

    /// Download and verify a single advisory.
    ///
    /// All failures are reported through the error channel and the stats,
    /// the worker itself keeps running.
    async fn download_advisory(
        &self,
        label: TlpLabel,
        file: AdvisoryFile,
        keys: &[PublicKey],
        errors: &mpsc::UnboundedSender<DownloadError>,
        stats: &mut DownloadStats,
        last_dir: &mut Option<PathBuf>,
    ) {
        let url = file.url().clone();

        if self.cfg.ignore_url(url.as_str()) {
            log::debug!("Ignoring URL url={url}");
            return;
        }

        let filename = url.path().rsplit('/').next().unwrap_or_default().to_string();
        if !validation::conforming_file_name(&filename) {
            stats.filename_failed += 1;
            let _ = errors.send(DownloadError::InvalidAdvisory(format!(
                "CSAF has non conforming filename {filename}"
            )));
            log::warn!("Ignoring non conforming filename filename={filename}");
            return;
        }

        let response = match self.fetcher.get(url.clone()).await {
            Ok(response) => response,
            Err(err) => {
                stats.download_failed += 1;
                let _ = errors.send(DownloadError::Network(format!(
                    "can't retrieve CSAF document {filename} from URL {url}: {err}"
                )));
                log::warn!("Cannot GET url={url} error={err}");
                return;
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            let _ = errors.send(classify_status(
                status,
                format!("could not retrieve CSAF document {filename} at URL {url}: {status}"),
            ));
            stats.download_failed += 1;
            log::warn!("Cannot load url={url} status={status}");
            return;
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if content_type != "application/json" {
            log::warn!("Content type is not 'application/json' url={url} content_type={content_type}");
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                stats.download_failed += 1;
                let _ = errors.send(DownloadError::Network(format!(
                    "can't read response body containing CSAF document {filename} from URL {url}: {err}"
                )));
                log::warn!("Cannot read response body url={url} error={err}");
                return;
            }
        };

        // fetch the expected digests, the preferred algorithm first
        let mut expected_sha256 = None;
        let mut sha256_data = None;
        let mut expected_sha512 = None;
        let mut sha512_data = None;

        for fetch in build_hash_plan(&file, self.cfg.preferred_hash) {
            match self.load_hash(&fetch.url).await {
                Ok((expected, data)) => {
                    match fetch.algorithm {
                        HashAlgorithm::Sha256 => {
                            expected_sha256 = Some(expected);
                            sha256_data = Some(data);
                        }
                        HashAlgorithm::Sha512 => {
                            expected_sha512 = Some(expected);
                            sha512_data = Some(data);
                        }
                    }
                    if fetch.preferred {
                        break;
                    }
                }
                Err(err) if fetch.warn => {
                    log::warn!(
                        "Cannot fetch hash hash={} url={} error={err}",
                        fetch.algorithm,
                        fetch.url
                    );
                }
                Err(err) => {
                    log::info!(
                        "Hash not present hash={} file={} error={err}",
                        fetch.algorithm,
                        fetch.url
                    );
                }
            }
        }

        // tee the body into the hashers and the JSON decoder
        let actual_sha256 = expected_sha256.as_ref().map(|_| {
            let mut digest = Sha256::new();
            digest.update(&body);
            digest.finalize()
        });
        let actual_sha512 = expected_sha512.as_ref().map(|_| {
            let mut digest = Sha512::new();
            digest.update(&body);
            digest.finalize()
        });

        let doc: serde_json::Value = match serde_json::from_slice(&body) {
            Ok(doc) => doc,
            Err(err) => {
                stats.download_failed += 1;
                let _ = errors.send(DownloadError::InvalidAdvisory(format!(
                    "CSAF document {filename} at URL {url} is not valid json: {err}"
                )));
                log::warn!("Downloading failed url={url} error={err}");
                return;
            }
        };

        // run the checks in a fixed order; a failing check marks the
        // advisory invalid, in strict mode it is abandoned right away
        let strict = self.cfg.validation_mode == ValidationMode::Strict;
        let mut valstatus = ValidationStatus::NotValidated;
        let mut signature_data = None;

        // sha256
        if let (Some(expected), Some(actual)) = (&expected_sha256, &actual_sha256) {
            if expected.as_slice() != actual.as_slice() {
                stats.sha256_failed += 1;
                let _ = errors.send(DownloadError::Publisher(format!(
                    "SHA256 checksum of CSAF document {filename} at URL {url} does not match"
                )));
                log::error!("Validation check failed error=SHA256 checksum of {url} does not match");
                valstatus.update(ValidationStatus::Invalid);
                if strict {
                    return;
                }
            }
        }

        // sha512
        if let (Some(expected), Some(actual)) = (&expected_sha512, &actual_sha512) {
            if expected.as_slice() != actual.as_slice() {
                stats.sha512_failed += 1;
                let _ = errors.send(DownloadError::Publisher(format!(
                    "SHA512 checksum of CSAF document {filename} at URL {url} does not match"
                )));
                log::error!("Validation check failed error=SHA512 checksum of {url} does not match");
                valstatus.update(ValidationStatus::Invalid);
                if strict {
                    return;
                }
            }
        }

        // signature, only checked with a populated keyring
        if !keys.is_empty() {
            let signature = match file.signature_url() {
                Some(signature_url) => match self.load_signature(&signature_url).await {
                    Ok(signature) => Some(signature),
                    Err(err) => {
                        log::warn!(
                            "Downloading signature failed url={signature_url} error={err}"
                        );
                        None
                    }
                },
                None => None,
            };

            if let Some(signature) = signature {
                signature_data = Some(signature.clone());

                if let Err(err) = validate::openpgp::validate_signature(keys, &signature, &body) {
                    if self.cfg.ignore_signature_check {
                        log::warn!("Ignoring failed signature check url={url} error={err}");
                    } else {
                        stats.signature_failed += 1;
                        let _ = errors.send(DownloadError::Publisher(format!(
                            "cannot verify signature for CSAF document {filename} at URL {url}: {err}"
                        )));
                        log::error!(
                            "Validation check failed error=cannot verify signature for {url}: {err}"
                        );
                        valstatus.update(ValidationStatus::Invalid);
                        if strict {
                            return;
                        }
                    }
                }
            }
        }

        // schema
        if let Err(schema_errors) = validation::validate_schema(&doc) {
            stats.schema_failed += 1;
            let _ = errors.send(DownloadError::InvalidAdvisory(format!(
                "CSAF document {filename} at URL {url} does not conform to JSON schema: {}",
                schema_errors.join(", ")
            )));
            log::error!(
                "CSAF file has validation errors url={url} count={}",
                schema_errors.len()
            );
            valstatus.update(ValidationStatus::Invalid);
            if strict {
                return;
            }
        }

        // filename must match the tracking id
        if let Err(err) = validation::id_matches_file_name(&doc, &filename) {
            stats.filename_failed += 1;
            let _ = errors.send(DownloadError::InvalidAdvisory(format!(
                "invalid CSAF document {filename} at URL {url}: {err}"
            )));
            log::error!("Validation check failed error=filename not conforming {url}: {err}");
            valstatus.update(ValidationStatus::Invalid);
            if strict {
                return;
            }
        }

        // remote validator
        if let Some(validator) = &self.validator {
            match validator.lock().await.validate(&doc).await {
                Ok(true) => {}
                Ok(false) => {
                    stats.remote_failed += 1;
                    let _ = errors.send(DownloadError::InvalidAdvisory(format!(
                        "remote validation of CSAF document {filename} at URL {url} failed"
                    )));
                    log::error!("Validation check failed error=remote validation of {url} failed");
                    valstatus.update(ValidationStatus::Invalid);
                    if strict {
                        return;
                    }
                }
                Err(err) => {
                    // a transport failure is not the publisher's fault
                    let _ = errors.send(DownloadError::Other(format!(
                        "calling remote validator on {url} failed: {err:#}"
                    )));
                }
            }
        }

        valstatus.update(ValidationStatus::Valid);

        if let Some(forwarder) = &self.forwarder {
            forwarder
                .forward(ForwardJob {
                    filename: filename.clone(),
                    doc: body.clone(),
                    status: valstatus,
                    sha256: sha256_data.clone(),
                    sha512: sha512_data.clone(),
                })
                .await;
        }

        if self.cfg.forward_channel {
            if let Some(csafs) = &self.csafs_tx {
                let _ = csafs.send(body.clone()).await;
            }
        }

        if self.cfg.no_store {
            if valstatus == ValidationStatus::Valid {
                stats.succeeded += 1;
            }
            return;
        }

        let initial_release_date = doc
            .pointer("/document/tracking/initial_release_date")
            .and_then(|value| value.as_str())
            .and_then(|value| OffsetDateTime::parse(value, &Rfc3339).ok())
            .map(|date| date.to_offset(UtcOffset::UTC))
            .unwrap_or_else(|| {
                log::warn!("Cannot extract initial_release_date from advisory url={url}");
                OffsetDateTime::now_utc()
            });

        let dir = store_directory(
            &self.cfg,
            valstatus,
            label,
            initial_release_date.year(),
        );

        if last_dir.as_deref() != Some(dir.as_path()) {
            if let Err(err) = self.mkdir_all(&dir).await {
                let _ = errors.send(DownloadError::Other(format!(
                    "failed to create directory {}: {err}",
                    dir.display()
                )));
                return;
            }
            *last_dir = Some(dir.clone());
        }

        let path = dir.join(&filename);

        let mut writes: Vec<(PathBuf, &[u8])> = vec![(path.clone(), &body)];
        if let Some(data) = &sha256_data {
            writes.push((dir.join(format!("{filename}.sha256")), data));
        }
        if let Some(data) = &sha512_data {
            writes.push((dir.join(format!("{filename}.sha512")), data));
        }
        if let Some(data) = &signature_data {
            writes.push((dir.join(format!("{filename}.asc")), data.as_bytes()));
        }

        for (path, data) in writes {
            if let Err(err) = tokio::fs::write(&path, data).await {
                let _ = errors.send(DownloadError::Other(format!(
                    "failed to write {}: {err}",
                    path.display()
                )));
                return;
            }
        }

        stats.succeeded += 1;
        log::info!("Written advisory path={}", path.display());
    }

    /// Fetch a hash sidecar, returning the decoded digest and the raw
    /// content.
    async fn load_hash(&self, url: &Url) -> anyhow::Result<(Vec<u8>, Bytes)> {
        let response = self.fetcher.get(url.clone()).await?;

        let status = response.status();
        if status != StatusCode::OK {
            anyhow::bail!("fetching hash from '{url}' failed: {status}");
        }

        let data = response.bytes().await?;
        let text = std::str::from_utf8(&data).context("hash file is not text")?;
        let token = text
            .split_ascii_whitespace()
            .next()
            .context("empty hash file")?;

        Ok((decode_hex(token)?, data))
    }

    async fn load_signature(&self, url: &Url) -> anyhow::Result<String> {
        let response = self.fetcher.get(url.clone()).await?;

        let status = response.status();
        if status != StatusCode::OK {
            anyhow::bail!("fetching signature from '{url}' failed: {status}");
        }

        Ok(response.text().await?)
    }

    /// Workers race on creating the same directories, serialize that.
    async fn mkdir_all(&self, path: &Path) -> std::io::Result<()> {
        let _guard = self.mkdir_mutex.lock().await;
        tokio::fs::create_dir_all(path).await
    }
}

/// A planned hash sidecar fetch.
struct HashFetch {
    url: Url,
    algorithm: HashAlgorithm,
    preferred: bool,
    /// Warn when the fetch fails. Directory style files derive their hash
    /// URLs speculatively, a missing one is no surprise there.
    warn: bool,
}

/// Plan the hash fetches for an advisory, the preferred algorithm first.
fn build_hash_plan(file: &AdvisoryFile, preferred: Option<HashAlgorithm>) -> Vec<HashFetch> {
    let mut plan = Vec::new();

    match file.sha512_url() {
        Some(url) => plan.push(HashFetch {
            url,
            algorithm: HashAlgorithm::Sha512,
            preferred: preferred == Some(HashAlgorithm::Sha512),
            warn: !file.is_directory(),
        }),
        None => log::info!("SHA512 not present"),
    }
    match file.sha256_url() {
        Some(url) => plan.push(HashFetch {
            url,
            algorithm: HashAlgorithm::Sha256,
            preferred: preferred == Some(HashAlgorithm::Sha256),
            warn: !file.is_directory(),
        }),
        None => log::info!("SHA256 not present"),
    }

    plan.sort_by_key(|fetch| !fetch.preferred);

    plan
}

/// The directory an advisory is stored in.
fn store_directory(
    cfg: &Config,
    status: ValidationStatus,
    label: TlpLabel,
    year: i32,
) -> PathBuf {
    let mut dir = cfg.directory.clone();

    if status != ValidationStatus::Valid {
        dir = dir.join(FAILED_VALIDATION_DIR);
    }

    match &cfg.folder {
        Some(folder) => dir.join(folder),
        None => dir.join(label.to_string()).join(year.to_string()),
    }
}

fn decode_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    if !s.is_ascii() || s.len() % 2 != 0 {
        anyhow::bail!("invalid hex digest {s:?}");
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| anyhow::anyhow!("invalid hex digest {s:?}"))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn plain_file() -> AdvisoryFile {
        AdvisoryFile::Plain {
            url: url("https://example.com/a.json"),
            sha256: Some(url("https://example.com/a.json.sha256")),
            sha512: Some(url("https://example.com/a.json.sha512")),
            signature: url("https://example.com/a.json.asc"),
        }
    }

    #[test]
    fn hash_plan_defaults_to_sha512_first() {
        let plan = build_hash_plan(&plain_file(), None);

        assert_eq!(
            plan.iter().map(|f| f.algorithm).collect::<Vec<_>>(),
            vec![HashAlgorithm::Sha512, HashAlgorithm::Sha256]
        );
        assert!(plan.iter().all(|f| !f.preferred));
        assert!(plan.iter().all(|f| f.warn));
    }

    #[test]
    fn hash_plan_moves_the_preferred_algorithm_first() {
        let plan = build_hash_plan(&plain_file(), Some(HashAlgorithm::Sha256));

        assert_eq!(
            plan.iter().map(|f| f.algorithm).collect::<Vec<_>>(),
            vec![HashAlgorithm::Sha256, HashAlgorithm::Sha512]
        );
        assert!(plan[0].preferred);
        assert!(!plan[1].preferred);
    }

    #[test]
    fn hash_plan_suppresses_warnings_for_directory_files() {
        let plan = build_hash_plan(
            &AdvisoryFile::Directory {
                url: url("https://example.com/a.json"),
            },
            None,
        );

        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|f| !f.warn));
    }

    #[test]
    fn hash_plan_skips_missing_urls() {
        let plan = build_hash_plan(
            &AdvisoryFile::Plain {
                url: url("https://example.com/a.json"),
                sha256: Some(url("https://example.com/a.json.sha256")),
                sha512: None,
                signature: url("https://example.com/a.json.asc"),
            },
            None,
        );

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].algorithm, HashAlgorithm::Sha256);
    }

    #[test]
    fn store_directories() {
        let cfg = Config {
            directory: "/out".into(),
            ..Default::default()
        };

        assert_eq!(
            store_directory(&cfg, ValidationStatus::Valid, TlpLabel::White, 2020),
            PathBuf::from("/out/white/2020")
        );
        assert_eq!(
            store_directory(&cfg, ValidationStatus::Invalid, TlpLabel::White, 2020),
            PathBuf::from("/out/failed_validation/white/2020")
        );

        let with_folder = Config {
            directory: "/out".into(),
            folder: Some("archive".into()),
            ..Default::default()
        };
        assert_eq!(
            store_directory(&with_folder, ValidationStatus::Valid, TlpLabel::Red, 2021),
            PathBuf::from("/out/archive")
        );
        assert_eq!(
            store_directory(
                &with_folder,
                ValidationStatus::NotValidated,
                TlpLabel::Red,
                2021
            ),
            PathBuf::from("/out/failed_validation/archive")
        );
    }

    #[test]
    fn hex_decoding() {
        assert_eq!(decode_hex("00abff").unwrap(), vec![0x00, 0xab, 0xff]);
        assert_eq!(decode_hex("CAFE").unwrap(), vec![0xca, 0xfe]);
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
        assert!(decode_hex("caf\u{e9}").is_err());
    }
}
