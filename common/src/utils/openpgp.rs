//! Helpers for working with "OpenPGP".
use bytes::Bytes;
use sequoia_openpgp::{Cert, cert::CertParser, parse::Parse};
use std::fmt::Debug;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("OpenPGP key error: {0}")]
    OpenPgp(#[from] anyhow::Error),
    #[error("No certificate in key file")]
    NoCertificate,
    #[error("Fingerprint mismatch - expected: {expected}, actual: {actual}")]
    FingerprintMismatch { actual: String, expected: String },
}

/// A public key, admitted to the keyring.
#[derive(Clone, Debug)]
pub struct PublicKey {
    pub certs: Vec<Cert>,
    pub raw: Bytes,
}

/// Parse an armored key and check it against the declared fingerprint.
///
/// A key is only admitted if every certificate it carries matches the
/// declared fingerprint (case-insensitive). Without a declared fingerprint,
/// the key is admitted as-is.
pub fn validate_keys(bytes: Bytes, fingerprint: Option<&str>) -> Result<PublicKey, Error> {
    let certs = CertParser::from_bytes(&bytes)?.collect::<Result<Vec<_>, _>>()?;

    if certs.is_empty() {
        return Err(Error::NoCertificate);
    }

    for cert in &certs {
        if let Some(expected) = &fingerprint {
            let actual = cert.fingerprint().to_hex();
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(Error::FingerprintMismatch {
                    actual,
                    expected: expected.to_string(),
                });
            }
        }
    }

    Ok(PublicKey { certs, raw: bytes })
}
