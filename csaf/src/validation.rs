//! Validation of advisory documents

use jsonschema::{Draft, JSONSchema};
use regex::Regex;
use std::{
    fmt::{Display, Formatter},
    sync::LazyLock,
};

/// The validation state of an advisory, as reported to the forwarder.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValidationStatus {
    Valid,
    Invalid,
    NotValidated,
}

impl ValidationStatus {
    /// Update the status. Cannot heal after it failed at least once.
    pub fn update(&mut self, status: ValidationStatus) {
        if *self != Self::Invalid {
            *self = status;
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::NotValidated => "not_validated",
        }
    }
}

impl Display for ValidationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static CONFORMING_FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9+\-_]+\.json$").expect("regex compiles"));

/// Check whether a file name conforms to the CSAF naming requirements.
pub fn conforming_file_name(name: &str) -> bool {
    CONFORMING_FILE_NAME.is_match(name)
}

/// The file name an advisory with the given tracking ID must use.
///
/// The ID is lowercased, everything outside `[a-z0-9+-]` becomes an
/// underscore.
pub fn id_to_file_name(id: &str) -> String {
    let mut name = id
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '+' | '-' => c,
            _ => '_',
        })
        .collect::<String>();
    name.push_str(".json");
    name
}

/// Check that the tracking ID of the document matches the file name.
pub fn id_matches_file_name(doc: &serde_json::Value, filename: &str) -> Result<(), String> {
    let Some(id) = doc
        .pointer("/document/tracking/id")
        .and_then(|value| value.as_str())
    else {
        return Err("document has no tracking id".to_string());
    };

    let expected = id_to_file_name(id);
    if expected != filename {
        return Err(format!("expected file name {expected}, got {filename}"));
    }

    Ok(())
}

static SCHEMA: LazyLock<JSONSchema> = LazyLock::new(|| {
    let schema = serde_json::from_str(include_str!("schema/csaf_json_schema.json"))
        .expect("embedded schema is valid JSON");
    JSONSchema::options()
        .with_draft(Draft::Draft202012)
        .compile(&schema)
        .expect("embedded schema compiles")
});

/// Validate a document against the embedded CSAF JSON schema.
pub fn validate_schema(doc: &serde_json::Value) -> Result<(), Vec<String>> {
    match SCHEMA.validate(doc) {
        Ok(()) => Ok(()),
        Err(errors) => Err(errors
            .map(|error| format!("{}: {error}", error.instance_path))
            .collect()),
    }
}

#[cfg(test)]
pub(crate) fn minimal_advisory(id: &str) -> serde_json::Value {
    serde_json::json!({
        "document": {
            "category": "csaf_security_advisory",
            "csaf_version": "2.0",
            "publisher": {
                "category": "vendor",
                "name": "A Vendor",
                "namespace": "https://avendor.example"
            },
            "title": "A security advisory",
            "tracking": {
                "current_release_date": "2020-06-01T10:00:00Z",
                "id": id,
                "initial_release_date": "2020-06-01T10:00:00Z",
                "revision_history": [
                    {
                        "date": "2020-06-01T10:00:00Z",
                        "number": "1",
                        "summary": "Initial release"
                    }
                ],
                "status": "final",
                "version": "1"
            }
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn conforming_file_names() {
        assert!(conforming_file_name("avendor-advisory-0004.json"));
        assert!(conforming_file_name("cve-2020-1234_v2+r1.json"));

        assert!(!conforming_file_name("AVendor-Advisory-0004.json"));
        assert!(!conforming_file_name("advisory.json.txt"));
        assert!(!conforming_file_name("advisory"));
        assert!(!conforming_file_name(".json"));
        assert!(!conforming_file_name("sp\u{e4}tzle.json"));
    }

    #[test]
    fn id_canonicalization() {
        assert_eq!(
            id_to_file_name("AVendor-Advisory-0004"),
            "avendor-advisory-0004.json"
        );
        assert_eq!(id_to_file_name("CVE 2020/1234"), "cve_2020_1234.json");
        assert_eq!(id_to_file_name("a+b-c"), "a+b-c.json");
    }

    #[test]
    fn id_must_match_file_name() {
        let doc = minimal_advisory("AVendor-Advisory-0004");

        assert_eq!(
            id_matches_file_name(&doc, "avendor-advisory-0004.json"),
            Ok(())
        );
        assert!(id_matches_file_name(&doc, "other.json").is_err());
        assert!(id_matches_file_name(&serde_json::json!({}), "other.json").is_err());
    }

    #[test]
    fn status_cannot_heal() {
        let mut status = ValidationStatus::NotValidated;

        status.update(ValidationStatus::Invalid);
        status.update(ValidationStatus::Valid);

        assert_eq!(status, ValidationStatus::Invalid);
    }

    #[test]
    fn status_becomes_valid_without_failures() {
        let mut status = ValidationStatus::NotValidated;
        status.update(ValidationStatus::Valid);
        assert_eq!(status, ValidationStatus::Valid);
    }

    #[test]
    fn schema_accepts_a_minimal_advisory() {
        assert_eq!(validate_schema(&minimal_advisory("a")), Ok(()));
    }

    #[test]
    fn schema_rejects_broken_documents() {
        let errors = validate_schema(&serde_json::json!({ "document": {} })).unwrap_err();
        assert!(!errors.is_empty());

        assert!(validate_schema(&serde_json::json!({})).is_err());
    }
}
