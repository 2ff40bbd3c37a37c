//! Client certificates for mutual TLS

use anyhow::{Context, bail};
use pkcs8::{EncryptedPrivateKeyInfo, SecretDocument, der::pem::LineEnding};
use reqwest::Identity;
use std::path::Path;

/// Load a client certificate and key into an identity usable for mutual
/// TLS.
///
/// Both files are PEM encoded. An encrypted key must be a PKCS#8
/// "ENCRYPTED PRIVATE KEY" and is decrypted with the passphrase.
pub fn load_identity(
    cert: &Path,
    key: &Path,
    passphrase: Option<&str>,
) -> anyhow::Result<Identity> {
    let cert = std::fs::read_to_string(cert)
        .with_context(|| format!("unable to read client certificate: {}", cert.display()))?;
    let mut key = std::fs::read_to_string(key)
        .with_context(|| format!("unable to read client key: {}", key.display()))?;

    if let Some(passphrase) = passphrase {
        key = decrypt_key(&key, passphrase)?;
    }

    let mut pem = Vec::new();
    pem.extend_from_slice(cert.as_bytes());
    pem.push(b'\n');
    pem.extend_from_slice(key.as_bytes());

    Ok(Identity::from_pem(&pem)?)
}

fn decrypt_key(pem: &str, passphrase: &str) -> anyhow::Result<String> {
    let (label, document) = SecretDocument::from_pem(pem)
        .map_err(|err| anyhow::anyhow!("unable to parse client key: {err}"))?;
    if label != "ENCRYPTED PRIVATE KEY" {
        bail!("client key is not an encrypted PKCS#8 key, found {label:?}");
    }

    let decrypted = EncryptedPrivateKeyInfo::try_from(document.as_bytes())
        .map_err(|err| anyhow::anyhow!("unable to parse encrypted client key: {err}"))?
        .decrypt(passphrase)
        .map_err(|err| anyhow::anyhow!("unable to decrypt client key: {err}"))?;

    Ok(decrypted
        .to_pem("PRIVATE KEY", LineEnding::LF)
        .map_err(|err| anyhow::anyhow!("unable to re-encode client key: {err}"))?
        .to_string())
}
