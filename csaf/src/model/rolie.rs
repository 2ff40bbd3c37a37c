use serde::Deserialize;
use time::OffsetDateTime;

/// A ROLIE feed document, as served by a publisher.
///
/// Lenient by intent: real world feeds carry plenty of optional content,
/// the downloader only needs entries, their update timestamps and links.
#[derive(Clone, Debug, Deserialize)]
pub struct RolieFeed {
    pub feed: Feed,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Feed {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: String,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated: Option<OffsetDateTime>,

    #[serde(default)]
    pub link: Vec<Link>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub rel: String,
    #[serde(default)]
    pub href: String,
}
