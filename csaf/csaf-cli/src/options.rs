//! The command line and config file surface

use anyhow::Context;
use clap::Parser;
use csaf_downloader::config::{Config, HashAlgorithm, ValidationMode};
use downloader_common::{cli::log::Logging, timerange::TimeRange};
use log::LevelFilter;
use regex::Regex;
use std::path::{Path, PathBuf};
use url::Url;

/// A tool to download CSAF advisories.
#[derive(Debug, Parser)]
#[command(version, about = "Download CSAF advisories", long_about = None)]
pub struct Cli {
    /// Domains to download from, or direct URLs to provider-metadata.json
    /// documents.
    #[arg(value_name = "DOMAIN")]
    pub domains: Vec<String>,

    /// Directory to store the downloaded files in.
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Do not check TLS certificates from the provider.
    #[arg(long)]
    pub insecure: bool,

    /// Only warn on failing signature checks.
    #[arg(long = "ignore_sigcheck")]
    pub ignore_sigcheck: bool,

    /// TLS client certificate file (PEM encoded).
    #[arg(long = "client_cert")]
    pub client_cert: Option<PathBuf>,

    /// TLS client private key file (PEM encoded).
    #[arg(long = "client_key")]
    pub client_key: Option<PathBuf>,

    /// Passphrase of the client key.
    #[arg(long = "client_passphrase")]
    pub client_passphrase: Option<String>,

    /// Do not store files, only validate and forward.
    #[arg(short = 'n', long = "no_store")]
    pub no_store: bool,

    /// The average upper limit of HTTPS operations per second.
    #[arg(short, long)]
    pub rate: Option<f64>,

    /// Number of concurrent downloads.
    #[arg(short, long)]
    pub worker: Option<usize>,

    /// Only download advisories within this time range.
    #[arg(short, long = "time_range")]
    pub time_range: Option<TimeRange>,

    /// Download into the given sub folder instead of '<label>/<year>'.
    #[arg(short, long)]
    pub folder: Option<String>,

    /// Do not download files whose URLs match any of the given patterns.
    #[arg(short, long = "ignore_pattern")]
    pub ignore_pattern: Vec<Regex>,

    /// One or more extra HTTP header fields ('name:value').
    #[arg(short = 'H', long = "header")]
    pub header: Vec<String>,

    /// Only enumerate the provider-metadata.json documents, do not
    /// download.
    #[arg(long = "enumerate_pmd_only")]
    pub enumerate_pmd_only: bool,

    /// URL of the remote validation service.
    #[arg(long = "validator")]
    pub validator: Option<String>,

    /// File to cache remote validation results in.
    #[arg(long = "validator_cache")]
    pub validator_cache: Option<PathBuf>,

    /// One or more presets to validate against.
    #[arg(long = "validator_preset")]
    pub validator_preset: Vec<String>,

    /// Validation mode, 'strict' or 'unsafe'.
    #[arg(short = 'm', long = "validation_mode")]
    pub validation_mode: Option<ValidationMode>,

    /// URL to forward downloaded advisories to.
    #[arg(long = "forward_url")]
    pub forward_url: Option<Url>,

    /// One or more extra HTTP header fields used by the forwarder.
    #[arg(long = "forward_header")]
    pub forward_header: Vec<String>,

    /// Maximum queue size of the forwarder, submissions block beyond it.
    #[arg(long = "forward_queue")]
    pub forward_queue: Option<usize>,

    /// Do not check TLS certificates from the forward endpoint.
    #[arg(long = "forward_insecure")]
    pub forward_insecure: bool,

    /// Prefer this hash algorithm, skipping the other once it was fetched.
    #[arg(long = "preferred_hash")]
    pub preferred_hash: Option<HashAlgorithm>,

    /// Log level.
    #[arg(long = "log_level")]
    pub log_level: Option<LevelFilter>,

    /// Write logs to a file instead of standard error.
    #[arg(long = "log_file")]
    pub log_file: Option<PathBuf>,

    /// Config file location.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// The TOML config file. Keys mirror the long flag names, with the legacy
/// aliases `ignoresigcheck` and `ignorepattern`.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub directory: Option<PathBuf>,
    pub insecure: Option<bool>,
    #[serde(alias = "ignoresigcheck")]
    pub ignore_sigcheck: Option<bool>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub client_passphrase: Option<String>,
    pub no_store: Option<bool>,
    pub rate: Option<f64>,
    pub worker: Option<usize>,
    pub time_range: Option<String>,
    pub folder: Option<String>,
    #[serde(alias = "ignorepattern")]
    pub ignore_pattern: Option<Vec<String>>,
    pub header: Option<Vec<String>>,
    pub enumerate_pmd_only: Option<bool>,
    pub validator: Option<String>,
    pub validator_cache: Option<PathBuf>,
    pub validator_preset: Option<Vec<String>>,
    pub validation_mode: Option<String>,
    pub forward_url: Option<Url>,
    pub forward_header: Option<Vec<String>>,
    pub forward_queue: Option<usize>,
    pub forward_insecure: Option<bool>,
    pub forward_channel: Option<bool>,
    pub preferred_hash: Option<String>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Locations probed when no config file is given.
const CONFIG_LOCATIONS: &[&str] = &[
    ".config/csaf/downloader.toml",
    ".csaf_downloader.toml",
];

fn find_config_file() -> Option<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        for location in CONFIG_LOCATIONS {
            let path = home.join(location);
            if path.is_file() {
                return Some(path);
            }
        }
    }

    let local = PathBuf::from("csaf_downloader.toml");
    local.is_file().then_some(local)
}

fn load_config_file(path: &Path) -> anyhow::Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("unable to parse config file: {}", path.display()))
}

impl Cli {
    /// Resolve the effective configuration: command line arguments win over
    /// the config file, the config file wins over the defaults.
    pub fn into_config(self) -> anyhow::Result<(Vec<String>, Logging, Config)> {
        let file = match &self.config {
            Some(path) => load_config_file(path)?,
            None => match find_config_file() {
                Some(path) => load_config_file(&path)?,
                None => FileConfig::default(),
            },
        };

        merge(self, file)
    }
}

fn merge(cli: Cli, file: FileConfig) -> anyhow::Result<(Vec<String>, Logging, Config)> {
    let defaults = Config::default();

    let time_range = match (cli.time_range, file.time_range) {
        (Some(range), _) => Some(range),
        (None, Some(range)) => Some(range.parse().context("invalid time_range in config file")?),
        (None, None) => None,
    };

    let validation_mode = match (cli.validation_mode, file.validation_mode) {
        (Some(mode), _) => mode,
        (None, Some(mode)) => mode
            .parse()
            .map_err(|err: String| anyhow::anyhow!(err))
            .context("invalid validation_mode in config file")?,
        (None, None) => defaults.validation_mode,
    };

    let preferred_hash = match (cli.preferred_hash, file.preferred_hash) {
        (Some(hash), _) => Some(hash),
        (None, Some(hash)) => Some(
            hash.parse()
                .map_err(|err: String| anyhow::anyhow!(err))
                .context("invalid preferred_hash in config file")?,
        ),
        (None, None) => None,
    };

    let ignore_pattern = if cli.ignore_pattern.is_empty() {
        file.ignore_pattern
            .unwrap_or_default()
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("invalid ignore_pattern in config file: {pattern:?}"))
            })
            .collect::<Result<Vec<_>, _>>()?
    } else {
        cli.ignore_pattern
    };

    let log_level = match (cli.log_level, file.log_level) {
        (Some(level), _) => level,
        (None, Some(level)) => level
            .parse()
            .context("invalid log_level in config file")?,
        (None, None) => LevelFilter::Info,
    };

    let logging = Logging {
        log_level,
        log_file: cli.log_file.or(file.log_file),
    };

    let config = Config {
        directory: cli
            .directory
            .or(file.directory)
            .unwrap_or(defaults.directory),
        insecure: cli.insecure || file.insecure.unwrap_or_default(),
        ignore_signature_check: cli.ignore_sigcheck || file.ignore_sigcheck.unwrap_or_default(),
        client_cert: cli.client_cert.or(file.client_cert),
        client_key: cli.client_key.or(file.client_key),
        client_passphrase: cli.client_passphrase.or(file.client_passphrase),
        no_store: cli.no_store || file.no_store.unwrap_or_default(),
        rate: cli.rate.or(file.rate),
        worker: cli.worker.or(file.worker).unwrap_or(defaults.worker),
        time_range,
        folder: cli.folder.or(file.folder),
        ignore_pattern,
        extra_header: if cli.header.is_empty() {
            file.header.unwrap_or_default()
        } else {
            cli.header
        },
        enumerate_pmd_only: cli.enumerate_pmd_only || file.enumerate_pmd_only.unwrap_or_default(),
        remote_validator: cli.validator.or(file.validator),
        remote_validator_cache: cli.validator_cache.or(file.validator_cache),
        remote_validator_presets: if cli.validator_preset.is_empty() {
            file.validator_preset.unwrap_or_default()
        } else {
            cli.validator_preset
        },
        validation_mode,
        forward_url: cli.forward_url.or(file.forward_url),
        forward_header: if cli.forward_header.is_empty() {
            file.forward_header.unwrap_or_default()
        } else {
            cli.forward_header
        },
        forward_queue: cli
            .forward_queue
            .or(file.forward_queue)
            .unwrap_or(defaults.forward_queue)
            .max(1),
        forward_insecure: cli.forward_insecure || file.forward_insecure.unwrap_or_default(),
        forward_channel: file.forward_channel.unwrap_or_default(),
        preferred_hash,
        verbose: log_level >= LevelFilter::Debug,
    };

    if let Some(rate) = config.rate {
        anyhow::ensure!(rate > 0.0, "rate must be greater than zero");
    }

    Ok((cli.domains, logging, config))
}

#[cfg(test)]
mod test {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("csaf_downloader").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn arguments_win_over_the_config_file() {
        let file: FileConfig = toml::from_str(
            r#"
            directory = "/from-file"
            worker = 7
            insecure = true
            "#,
        )
        .unwrap();

        let (domains, _, config) =
            merge(cli(&["-d", "/from-args", "example.com"]), file).unwrap();

        assert_eq!(domains, vec!["example.com"]);
        assert_eq!(config.directory, PathBuf::from("/from-args"));
        assert_eq!(config.worker, 7);
        assert!(config.insecure);
    }

    #[test]
    fn defaults_apply_without_file_and_arguments() {
        let (_, logging, config) = merge(cli(&["example.com"]), FileConfig::default()).unwrap();

        assert_eq!(config.directory, PathBuf::from("."));
        assert_eq!(config.worker, 2);
        assert_eq!(config.forward_queue, 1);
        assert_eq!(config.validation_mode, ValidationMode::Strict);
        assert_eq!(logging.log_level, LevelFilter::Info);
        assert!(!config.verbose);
    }

    #[test]
    fn config_file_aliases_are_accepted() {
        let file: FileConfig = toml::from_str(
            r#"
            ignoresigcheck = true
            ignorepattern = ["^https://example\\.com/old/"]
            "#,
        )
        .unwrap();

        let (_, _, config) = merge(cli(&[]), file).unwrap();

        assert!(config.ignore_signature_check);
        assert!(config.ignore_url("https://example.com/old/a.json"));
    }

    #[test]
    fn string_options_from_the_file_are_parsed() {
        let file: FileConfig = toml::from_str(
            r#"
            time_range = "2y"
            validation_mode = "unsafe"
            preferred_hash = "sha256"
            log_level = "debug"
            "#,
        )
        .unwrap();

        let (_, logging, config) = merge(cli(&[]), file).unwrap();

        assert!(config.time_range.is_some());
        assert_eq!(config.validation_mode, ValidationMode::Unsafe);
        assert_eq!(config.preferred_hash, Some(HashAlgorithm::Sha256));
        assert_eq!(logging.log_level, LevelFilter::Debug);
        assert!(config.verbose);
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("workers = 3").is_err());
    }

    #[test]
    fn zero_rates_are_rejected() {
        assert!(merge(cli(&["-r", "0"]), FileConfig::default()).is_err());
    }
}
