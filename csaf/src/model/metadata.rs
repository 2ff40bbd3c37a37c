use chrono::{DateTime, Utc};
use std::fmt::{Display, Formatter};

/// The provider metadata document.
///
/// Only the parts the downloader consumes are modeled. Everything else a
/// publisher puts into the document is accepted and ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ProviderMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distributions: Vec<Distribution>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_version: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub public_openpgp_keys: Vec<Key>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Distribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolie: Option<Rolie>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Rolie {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feeds: Vec<Feed>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Feed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tlp_label: Option<TlpLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A declared OpenPGP key.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Key {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The TLP label of a feed. Determines the storage sub directory, nothing
/// else.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TlpLabel {
    White,
    Green,
    Amber,
    Red,
    #[serde(other)]
    Unknown,
}

impl Display for TlpLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::White => "white",
            Self::Green => "green",
            Self::Amber => "amber",
            Self::Red => "red",
            Self::Unknown => "unknown",
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_a_minimal_document() {
        let metadata: ProviderMetadata = serde_json::from_value(serde_json::json!({
            "canonical_url": "https://example.com/.well-known/csaf/provider-metadata.json",
            "metadata_version": "2.0",
            "publisher": {
                "category": "vendor",
                "name": "Example",
                "namespace": "https://example.com"
            },
            "distributions": [
                {
                    "rolie": {
                        "feeds": [
                            {
                                "tlp_label": "WHITE",
                                "url": "https://example.com/white/csaf-feed-tlp-white.json"
                            }
                        ]
                    }
                },
                { "directory_url": "https://example.com/advisories/" }
            ]
        }))
        .unwrap();

        assert_eq!(metadata.distributions.len(), 2);
        assert_eq!(
            metadata.distributions[0].rolie.as_ref().unwrap().feeds[0].tlp_label,
            Some(TlpLabel::White)
        );
        assert_eq!(
            metadata.distributions[1].directory_url.as_deref(),
            Some("https://example.com/advisories/")
        );
    }

    #[test]
    fn unknown_labels_do_not_fail_parsing() {
        let feed: Feed = serde_json::from_value(serde_json::json!({
            "tlp_label": "CHARTREUSE",
            "url": "https://example.com/feed.json"
        }))
        .unwrap();

        assert_eq!(feed.tlp_label, Some(TlpLabel::Unknown));
        assert_eq!(feed.tlp_label.unwrap().to_string(), "unknown");
    }
}
