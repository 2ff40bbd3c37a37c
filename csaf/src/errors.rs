//! The error taxonomy of the download pipeline

use reqwest::StatusCode;
use std::fmt::{Display, Formatter};

/// An error encountered while walking a publisher's catalog or downloading
/// advisories.
///
/// The variants distinguish who can act on a failure: the network, the
/// publisher's content, the publisher's infrastructure, or the provided
/// credentials.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// A transport level failure.
    #[error("{0}")]
    Network(String),
    /// The advisory document itself is broken. Can only be fixed by the
    /// publisher.
    #[error("{0}")]
    InvalidAdvisory(String),
    /// The publisher's infrastructure misbehaves, independent of any single
    /// document.
    #[error("{0}")]
    Publisher(String),
    /// Authentication was rejected.
    #[error("{0}")]
    InvalidCredentials(String),
    /// A transient failure. An outer caller may retry the operation, this
    /// tool does not.
    #[error("{0} (retryable error)")]
    Retryable(#[source] Box<DownloadError>),
    /// An error enriched with context.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<DownloadError>,
    },
    /// Errors collected while walking feeds and directory indexes.
    #[error(transparent)]
    Catalog(#[from] CatalogErrors),
    /// Errors collected across the download workers.
    #[error(transparent)]
    Download(#[from] DownloadErrors),
    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl DownloadError {
    /// Wrap the error with additional context.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Mark the error as retryable.
    pub fn retryable(self) -> Self {
        Self::Retryable(Box::new(self))
    }

    /// Check whether the error may be retried by an outer caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Retryable(_) => true,
            Self::Context { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    fn as_catalog(&self) -> Option<&CatalogErrors> {
        match self {
            Self::Catalog(errors) => Some(errors),
            Self::Context { source, .. } | Self::Retryable(source) => source.as_catalog(),
            _ => None,
        }
    }

    fn as_download(&self) -> Option<&DownloadErrors> {
        match self {
            Self::Download(errors) => Some(errors),
            Self::Context { source, .. } | Self::Retryable(source) => source.as_download(),
            _ => None,
        }
    }

    /// Flatten the composite errors of a pipeline run.
    ///
    /// The expected shape is `CatalogErrors { …, DownloadErrors { … }, … }`.
    /// Exactly this one level of nesting is unwrapped, wrapping around a
    /// composite is discarded. Any other error is returned as a singleton.
    pub fn flatten(&self) -> Vec<&DownloadError> {
        let Some(catalog) = self.as_catalog() else {
            return vec![self];
        };

        let mut flattened = Vec::new();
        for error in &catalog.0 {
            match error.as_download() {
                Some(download) => flattened.extend(download.0.iter()),
                None => flattened.push(error),
            }
        }
        flattened
    }
}

/// Errors collected while processing feeds and directory indexes.
#[derive(Debug, Default)]
pub struct CatalogErrors(pub Vec<DownloadError>);

/// Errors collected during the actual advisory downloads.
#[derive(Debug, Default)]
pub struct DownloadErrors(pub Vec<DownloadError>);

impl Display for CatalogErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        join_errors(f, &self.0, "empty catalog errors")
    }
}

impl Display for DownloadErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        join_errors(f, &self.0, "empty download errors")
    }
}

impl std::error::Error for CatalogErrors {}
impl std::error::Error for DownloadErrors {}

fn join_errors(
    f: &mut Formatter<'_>,
    errors: &[DownloadError],
    empty: &str,
) -> std::fmt::Result {
    if errors.is_empty() {
        return f.write_str(empty);
    }
    for (i, error) in errors.iter().enumerate() {
        if i > 0 {
            f.write_str("\n")?;
        }
        write!(f, "{error}")?;
    }
    Ok(())
}

/// Classify a non-OK response status from a publisher-facing request.
///
/// 403 is not handled here, the call sites decide whether "forbidden" means
/// "silently skip".
pub(crate) fn classify_status(status: StatusCode, message: String) -> DownloadError {
    match status {
        StatusCode::UNAUTHORIZED => DownloadError::InvalidCredentials(message),
        StatusCode::NOT_FOUND => DownloadError::Publisher(message),
        status if status.is_server_error() => DownloadError::Publisher(message).retryable(),
        _ => DownloadError::Other(message),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn messages(errors: &[&DownloadError]) -> Vec<String> {
        errors.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn flatten_composite_errors() {
        let download = DownloadErrors(vec![
            DownloadError::Network("nested err 1".into()),
            DownloadError::InvalidAdvisory("nested err 2".into()),
        ]);
        let catalog = CatalogErrors(vec![
            DownloadError::Publisher("single error feed 1".into()),
            DownloadError::Publisher("single error feed 2".into()),
            DownloadError::Download(download)
                .context("issues during download of feed"),
            DownloadError::Download(DownloadErrors(vec![DownloadError::Other(
                "single error 1".into(),
            )])),
        ]);

        let wrapped = DownloadError::Catalog(catalog).context("wrap feed composite err");
        let flattened = wrapped.flatten();

        assert_eq!(
            messages(&flattened),
            vec![
                "single error feed 1",
                "single error feed 2",
                "nested err 1",
                "nested err 2",
                "single error 1",
            ]
        );
    }

    #[test]
    fn flatten_returns_plain_errors_as_is() {
        let err = DownloadError::Network("plain".into());
        assert_eq!(messages(&err.flatten()), vec!["plain"]);
    }

    #[test]
    fn flatten_keeps_other_nesting_intact() {
        // a bare download composite is not the expected shape
        let err = DownloadError::Download(DownloadErrors(vec![DownloadError::Other(
            "inner".into(),
        )]));
        assert_eq!(err.flatten().len(), 1);
    }

    #[test]
    fn retryable_marker_survives_context() {
        let err = DownloadError::Publisher("boom".into())
            .retryable()
            .context("while fetching");
        assert!(err.is_retryable());
        assert!(!DownloadError::Publisher("boom".into()).is_retryable());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "m".into()),
            DownloadError::InvalidCredentials(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "m".into()),
            DownloadError::Publisher(_)
        ));
        let server = classify_status(StatusCode::INTERNAL_SERVER_ERROR, "m".into());
        assert!(server.is_retryable());
        assert!(matches!(
            classify_status(StatusCode::IM_A_TEAPOT, "m".into()),
            DownloadError::Other(_)
        ));
    }
}
