//! OpenPGP validation
use crate::utils::openpgp::PublicKey;
use anyhow::bail;
use sequoia_openpgp::{
    Cert, KeyHandle,
    parse::{
        Parse,
        stream::{DetachedVerifierBuilder, MessageLayer, MessageStructure, VerificationHelper},
    },
    policy::StandardPolicy,
};
use std::fmt::Debug;

struct Helper<'a> {
    keys: &'a [PublicKey],
}

impl VerificationHelper for Helper<'_> {
    fn get_certs(&mut self, _ids: &[KeyHandle]) -> sequoia_openpgp::Result<Vec<Cert>> {
        Ok(self.keys.iter().flat_map(|k| k.certs.clone()).collect())
    }

    fn check(&mut self, structure: MessageStructure) -> sequoia_openpgp::Result<()> {
        let mut good = false;

        for (i, layer) in structure.into_iter().enumerate() {
            log::trace!("Message ({i}): {layer:?}");

            match (i, layer) {
                (0, MessageLayer::SignatureGroup { results }) => match results.into_iter().next() {
                    Some(Ok(_)) => good = true,
                    Some(Err(err)) => {
                        return Err(sequoia_openpgp::Error::from(err).into());
                    }
                    None => {
                        bail!("No signature");
                    }
                },
                _ => {
                    bail!("Unexpected message structure");
                }
            }
        }

        if !good {
            bail!("Signature verification failed")
        }

        Ok(())
    }
}

/// Verify a detached, armored signature against the buffered document bytes.
pub fn validate_signature(
    keys: &[PublicKey],
    signature: &str,
    data: impl AsRef<[u8]>,
) -> Result<(), anyhow::Error> {
    let policy = StandardPolicy::new();
    let mut verifier = DetachedVerifierBuilder::from_bytes(&signature)?.with_policy(
        &policy,
        None,
        Helper { keys },
    )?;

    verifier.verify_bytes(data)?;

    Ok(())
}
