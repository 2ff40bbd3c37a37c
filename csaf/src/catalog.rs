//! Enumerating the advisories a publisher exposes

use crate::{
    errors::{CatalogErrors, DownloadError, classify_status},
    model::{
        metadata::{Feed, ProviderMetadata, TlpLabel},
        rolie::{Entry, RolieFeed},
    },
};
use downloader_common::{fetcher::Fetcher, timerange::TimeRange};
use reqwest::StatusCode;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use url::Url;

/// A single advisory, as listed by the publisher's catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdvisoryFile {
    /// Taken from a ROLIE feed entry, each sidecar URL carried explicitly.
    Plain {
        url: Url,
        sha256: Option<Url>,
        sha512: Option<Url>,
        signature: Url,
    },
    /// Taken from a directory changelog. The sidecar URLs are derived from
    /// the document URL and are speculative.
    Directory { url: Url },
}

impl AdvisoryFile {
    pub fn url(&self) -> &Url {
        match self {
            Self::Plain { url, .. } => url,
            Self::Directory { url } => url,
        }
    }

    pub fn sha256_url(&self) -> Option<Url> {
        match self {
            Self::Plain { sha256, .. } => sha256.clone(),
            Self::Directory { url } => derive(url, "sha256"),
        }
    }

    pub fn sha512_url(&self) -> Option<Url> {
        match self {
            Self::Plain { sha512, .. } => sha512.clone(),
            Self::Directory { url } => derive(url, "sha512"),
        }
    }

    pub fn signature_url(&self) -> Option<Url> {
        match self {
            Self::Plain { signature, .. } => Some(signature.clone()),
            Self::Directory { url } => derive(url, "asc"),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }
}

fn derive(url: &Url, extension: &str) -> Option<Url> {
    Url::parse(&format!("{url}.{extension}")).ok()
}

/// Extracts advisory files from a provider metadata document, handing them
/// out grouped by TLP label.
///
/// If the metadata advertises ROLIE feeds, those are used. Otherwise the
/// directory distributions are walked through their `changes.csv`.
pub struct AdvisoryFileProcessor<'a> {
    fetcher: &'a Fetcher,
    metadata: &'a ProviderMetadata,
    base: &'a Url,
    time_range: Option<&'a TimeRange>,
}

impl<'a> AdvisoryFileProcessor<'a> {
    pub fn new(fetcher: &'a Fetcher, metadata: &'a ProviderMetadata, base: &'a Url) -> Self {
        Self {
            fetcher,
            metadata,
            base,
            time_range: None,
        }
    }

    pub fn with_time_range(mut self, time_range: Option<&'a TimeRange>) -> Self {
        self.time_range = time_range;
        self
    }

    fn accepts(&self, timestamp: OffsetDateTime) -> bool {
        self.time_range
            .map(|range| range.contains(timestamp))
            .unwrap_or(true)
    }

    /// Walk the catalog, calling `emit` once per feed (ROLIE mode) or once
    /// per directory (directory mode).
    ///
    /// Failures of individual feeds, directories and entries are collected,
    /// peers keep being processed.
    pub async fn process<F>(&self, mut emit: F) -> Result<(), DownloadError>
    where
        F: AsyncFnMut(TlpLabel, Vec<AdvisoryFile>) -> Result<(), DownloadError>,
    {
        let feeds = self
            .metadata
            .distributions
            .iter()
            .filter_map(|distribution| distribution.rolie.as_ref())
            .flat_map(|rolie| &rolie.feeds)
            .collect::<Vec<_>>();

        if !feeds.is_empty() {
            log::info!("Found ROLIE feed(s) length={}", feeds.len());
            self.process_rolie(&feeds, &mut emit).await
        } else {
            self.process_directories(&mut emit).await
        }
    }

    async fn process_rolie<F>(&self, feeds: &[&Feed], emit: &mut F) -> Result<(), DownloadError>
    where
        F: AsyncFnMut(TlpLabel, Vec<AdvisoryFile>) -> Result<(), DownloadError>,
    {
        let mut errors = Vec::new();

        for feed in feeds {
            let Some(feed_url) = &feed.url else { continue };
            let label = feed.tlp_label.unwrap_or(TlpLabel::Unknown);

            let url = match self.base.join(feed_url) {
                Ok(url) => url,
                Err(err) => {
                    errors.push(DownloadError::Publisher(format!(
                        "invalid TLP:{label} feed URL {feed_url}: {err}"
                    )));
                    continue;
                }
            };
            log::info!("Got feed URL feed={url}");

            match self.load_feed(label, &url, &mut errors).await {
                Ok(Some(files)) => {
                    if let Err(err) = emit(label, files).await {
                        errors.push(err);
                    }
                }
                // insufficient permissions to access the feed, no error
                Ok(None) => {}
                Err(err) => errors.push(err),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CatalogErrors(errors).into())
        }
    }

    async fn load_feed(
        &self,
        label: TlpLabel,
        url: &Url,
        errors: &mut Vec<DownloadError>,
    ) -> Result<Option<Vec<AdvisoryFile>>, DownloadError> {
        let response = self.fetcher.get(url.clone()).await.map_err(|err| {
            DownloadError::Network(format!("failed get for TLP:{label} feed url {url}: {err}"))
        })?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if status != StatusCode::OK {
            log::error!("Fetching feed failed url={url} status={status}");
            return Err(classify_status(
                status,
                format!("could not retrieve TLP:{label} feed at {url}: {status}"),
            ));
        }

        let feed: RolieFeed = response.json().await.map_err(|err| {
            DownloadError::Publisher(format!(
                "TLP:{label} feed at {url} is not valid JSON: {err}"
            ))
        })?;

        let feed_base = base_url(url);

        let mut files = Vec::new();
        for entry in &feed.feed.entry {
            if let Some(updated) = entry.updated {
                if !self.accepts(updated) {
                    continue;
                }
            }

            let (file, entry_errors) = convert_entry(entry, label, url, &feed_base);
            errors.extend(entry_errors);
            files.extend(file);
        }

        Ok(Some(files))
    }

    async fn process_directories<F>(&self, emit: &mut F) -> Result<(), DownloadError>
    where
        F: AsyncFnMut(TlpLabel, Vec<AdvisoryFile>) -> Result<(), DownloadError>,
    {
        let mut directories = self
            .metadata
            .distributions
            .iter()
            .filter_map(|distribution| distribution.directory_url.clone())
            .filter(|url| !url.is_empty())
            .collect::<Vec<_>>();

        // no directories advertised, fall back to the location of the
        // metadata document itself
        if directories.is_empty() {
            directories.push(base_url(self.base).to_string());
        }

        let mut errors = Vec::new();

        for directory in directories {
            match self.load_changes(&directory).await {
                Ok(files) => {
                    // the directory index format carries no label
                    if let Err(err) = emit(TlpLabel::White, files).await {
                        errors.push(err);
                    }
                }
                Err(err) => errors.push(err),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CatalogErrors(errors).into())
        }
    }

    async fn load_changes(&self, directory: &str) -> Result<Vec<AdvisoryFile>, DownloadError> {
        let base = Url::parse(directory).map_err(|err| {
            DownloadError::Publisher(format!("invalid directory url {directory}: {err}"))
        })?;
        let changes_url = join_path(&base, "changes.csv").map_err(|err| {
            DownloadError::Publisher(format!("invalid directory url {directory}: {err}"))
        })?;

        let response = self.fetcher.get(changes_url.clone()).await.map_err(|err| {
            DownloadError::Network(format!("failed get request for url {changes_url}: {err}"))
        })?;

        let status = response.status();
        match status {
            StatusCode::OK => {}
            // directory based feeds are supposed to be public, but just to
            // be on the safe side
            StatusCode::FORBIDDEN => return Ok(Vec::new()),
            _ => {
                return Err(classify_status(
                    status,
                    format!("could not retrieve changes.csv at {changes_url}: {status}"),
                ));
            }
        }

        let body = response.text().await.map_err(|err| {
            DownloadError::Network(format!("failed to read changes.csv at {changes_url}: {err}"))
        })?;

        parse_changes(&body, &base, self.time_range, &changes_url)
    }
}

/// Parse a `changes.csv` document into advisory files, applying the time
/// range filter.
fn parse_changes(
    data: &str,
    base: &Url,
    time_range: Option<&TimeRange>,
    source: &Url,
) -> Result<Vec<AdvisoryFile>, DownloadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data.as_bytes());

    let mut files = Vec::new();

    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|err| {
            DownloadError::Publisher(format!("could not read record from changes.csv: {err}"))
        })?;

        if record.len() != 2 {
            return Err(DownloadError::Publisher(format!(
                "changes.csv at {source} has {} fields in line {}, expected 2",
                record.len(),
                line + 1
            )));
        }

        let timestamp = OffsetDateTime::parse(&record[1], &Rfc3339).map_err(|err| {
            log::error!(
                "Invalid time stamp in line url={source} line={} err={err}",
                line + 1
            );
            DownloadError::Publisher(format!(
                "could not read timestamp from changes.csv: {err}"
            ))
        })?;

        if let Some(range) = time_range {
            if !range.contains(timestamp) {
                continue;
            }
        }

        let url = join_path(base, &record[0]).map_err(|err| {
            log::error!(
                "Contains an invalid URL url={source} path={} line={}",
                &record[0],
                line + 1
            );
            DownloadError::Publisher(format!("could not read url from changes.csv: {err}"))
        })?;

        files.push(AdvisoryFile::Directory { url });
    }

    Ok(files)
}

/// Convert a feed entry into an advisory file, classifying its links.
///
/// Besides the converted file, all errors of the entry are reported. An
/// entry without document link, without any hash, or without signature
/// yields no file.
fn convert_entry(
    entry: &Entry,
    label: TlpLabel,
    feed_url: &Url,
    feed_base: &Url,
) -> (Option<AdvisoryFile>, Vec<DownloadError>) {
    let mut errors = Vec::new();

    let mut url = None;
    let mut sha256 = None;
    let mut sha512 = None;
    let mut signature = None;

    let resolve = |href: &str, errors: &mut Vec<DownloadError>| -> Option<Url> {
        if href.is_empty() {
            errors.push(DownloadError::Publisher(format!(
                "empty url in TLP:{label} feed at {feed_url}"
            )));
            return None;
        }
        match feed_base.join(href) {
            Ok(url) => Some(url),
            Err(err) => {
                errors.push(DownloadError::Publisher(format!(
                    "invalid url {href} in TLP:{label} feed at {feed_url}: {err}"
                )));
                None
            }
        }
    };

    for link in &entry.link {
        let lower = link.href.to_ascii_lowercase();
        match link.rel.as_str() {
            "self" => url = resolve(&link.href, &mut errors),
            "signature" => signature = resolve(&link.href, &mut errors),
            "hash" if lower.ends_with(".sha256") => sha256 = resolve(&link.href, &mut errors),
            "hash" if lower.ends_with(".sha512") => sha512 = resolve(&link.href, &mut errors),
            _ => {}
        }
    }

    let Some(url) = url else {
        errors.push(DownloadError::Publisher(format!(
            "TLP:{label} feed at {feed_url} contains entry (ID '{id}') without link to csaf document",
            id = entry.id
        )));
        return (None, errors);
    };

    if sha256.is_none() && sha512.is_none() {
        log::error!("No hash listed on ROLIE feed file={url}");
        errors.push(DownloadError::Publisher(format!(
            "no hash listed on TLP:{label} feed ({feed_url}) for CSAF {url}"
        )));
        return (None, errors);
    }

    let Some(signature) = signature else {
        log::error!("No signature listed on ROLIE feed file={url}");
        errors.push(DownloadError::Publisher(format!(
            "no signature listed on TLP:{label} feed ({feed_url}) for CSAF {url}"
        )));
        return (None, errors);
    };

    (
        Some(AdvisoryFile::Plain {
            url,
            sha256,
            sha512,
            signature,
        }),
        errors,
    )
}

/// The directory prefix of a URL, used as the base for relative references.
fn base_url(url: &Url) -> Url {
    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);
    if let Ok(mut segments) = base.path_segments_mut() {
        segments.pop().push("");
    }
    base
}

/// Append a possibly relative path to a directory URL.
fn join_path(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty();
    }
    let mut url = url.to_string();
    url.push('/');
    url.push_str(path);
    Url::parse(&url)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::rolie::Link;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn is_publisher(err: &DownloadError) -> bool {
        matches!(err, DownloadError::Publisher(_))
    }

    #[test]
    fn directory_files_derive_their_sidecars() {
        let file = AdvisoryFile::Directory {
            url: url("https://example.com/2020/advisory.json"),
        };

        assert_eq!(
            file.sha256_url(),
            Some(url("https://example.com/2020/advisory.json.sha256"))
        );
        assert_eq!(
            file.sha512_url(),
            Some(url("https://example.com/2020/advisory.json.sha512"))
        );
        assert_eq!(
            file.signature_url(),
            Some(url("https://example.com/2020/advisory.json.asc"))
        );
        assert!(file.is_directory());
    }

    #[test]
    fn base_url_strips_the_last_segment() {
        assert_eq!(
            base_url(&url("https://example.com/feeds/white.json")).as_str(),
            "https://example.com/feeds/"
        );
        assert_eq!(
            base_url(&url("https://example.com/white.json?x=1#top")).as_str(),
            "https://example.com/"
        );
    }

    #[test]
    fn join_path_appends() {
        let base = url("https://example.com/advisories");
        assert_eq!(
            join_path(&base, "2020/a.json").unwrap().as_str(),
            "https://example.com/advisories/2020/a.json"
        );
        let with_slash = url("https://example.com/advisories/");
        assert_eq!(
            join_path(&with_slash, "changes.csv").unwrap().as_str(),
            "https://example.com/advisories/changes.csv"
        );
    }

    fn entry(links: &[(&str, &str)]) -> Entry {
        Entry {
            id: "avendor-advisory-0004".into(),
            updated: None,
            link: links
                .iter()
                .map(|(rel, href)| Link {
                    rel: rel.to_string(),
                    href: href.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn entries_with_all_links_convert() {
        let feed_url = url("https://example.com/feeds/white.json");
        let feed_base = base_url(&feed_url);

        let (file, errors) = convert_entry(
            &entry(&[
                ("self", "2020/avendor-advisory-0004.json"),
                ("hash", "2020/avendor-advisory-0004.json.SHA256"),
                ("hash", "2020/avendor-advisory-0004.json.sha512"),
                ("signature", "2020/avendor-advisory-0004.json.asc"),
            ]),
            TlpLabel::White,
            &feed_url,
            &feed_base,
        );

        assert!(errors.is_empty());
        assert_eq!(
            file,
            Some(AdvisoryFile::Plain {
                url: url("https://example.com/feeds/2020/avendor-advisory-0004.json"),
                sha256: Some(url(
                    "https://example.com/feeds/2020/avendor-advisory-0004.json.SHA256"
                )),
                sha512: Some(url(
                    "https://example.com/feeds/2020/avendor-advisory-0004.json.sha512"
                )),
                signature: url("https://example.com/feeds/2020/avendor-advisory-0004.json.asc"),
            })
        );
    }

    #[test]
    fn entries_without_document_link_are_rejected() {
        let feed_url = url("https://example.com/feeds/white.json");
        let feed_base = base_url(&feed_url);

        let (file, errors) = convert_entry(
            &entry(&[("hash", "a.json.sha256"), ("signature", "a.json.asc")]),
            TlpLabel::White,
            &feed_url,
            &feed_base,
        );

        assert_eq!(file, None);
        assert_eq!(errors.len(), 1);
        assert!(is_publisher(&errors[0]));
    }

    #[test]
    fn entries_without_any_hash_are_rejected() {
        let feed_url = url("https://example.com/feeds/white.json");
        let feed_base = base_url(&feed_url);

        let (file, errors) = convert_entry(
            &entry(&[("self", "a.json"), ("signature", "a.json.asc")]),
            TlpLabel::White,
            &feed_url,
            &feed_base,
        );

        assert_eq!(file, None);
        assert!(errors.iter().all(is_publisher));
    }

    #[test]
    fn entries_without_signature_are_rejected() {
        let feed_url = url("https://example.com/feeds/white.json");
        let feed_base = base_url(&feed_url);

        let (file, errors) = convert_entry(
            &entry(&[("self", "a.json"), ("hash", "a.json.sha512")]),
            TlpLabel::White,
            &feed_url,
            &feed_base,
        );

        assert_eq!(file, None);
        assert!(errors.iter().all(is_publisher));
    }

    #[test]
    fn changes_are_parsed_and_filtered() {
        let base = url("https://example.com/advisories/");
        let source = url("https://example.com/advisories/changes.csv");
        let range = "2020-01-01,2020-12-31".parse::<TimeRange>().unwrap();

        let files = parse_changes(
            "2020/a.json,2020-06-01T10:00:00Z\n2017/old.json,2017-01-01T00:00:00Z\n",
            &base,
            Some(&range),
            &source,
        )
        .unwrap();

        assert_eq!(
            files,
            vec![AdvisoryFile::Directory {
                url: url("https://example.com/advisories/2020/a.json")
            }]
        );
    }

    #[test]
    fn changes_with_wrong_column_count_are_rejected() {
        let base = url("https://example.com/advisories/");
        let source = url("https://example.com/advisories/changes.csv");

        let result = parse_changes("a.json,2020-06-01T10:00:00Z,extra\n", &base, None, &source);
        assert!(matches!(result, Err(DownloadError::Publisher(_))));
    }

    #[test]
    fn changes_with_invalid_timestamps_are_rejected() {
        let base = url("https://example.com/advisories/");
        let source = url("https://example.com/advisories/changes.csv");

        let result = parse_changes("a.json,yesterday\n", &base, None, &source);
        assert!(matches!(result, Err(DownloadError::Publisher(_))));
    }
}
