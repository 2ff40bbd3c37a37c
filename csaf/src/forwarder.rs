//! Forwarding advisories to an HTTP endpoint

use crate::{config::Config, validation::ValidationStatus};
use anyhow::Context;
use bytes::Bytes;
use downloader_common::fetcher::Fetcher;
use reqwest::{
    StatusCode,
    multipart::{Form, Part},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

/// Sub folder where advisories are stored that failed forwarding, so a
/// later process can retry them.
const FAILED_FORWARD_DIR: &str = "failed_forward";

/// How much of an error response body ends up in the log.
const MAX_RESPONSE_LOG: usize = 512;

/// A downloaded advisory handed to the forwarder.
#[derive(Clone, Debug)]
pub struct ForwardJob {
    /// Base name of the advisory.
    pub filename: String,
    /// The advisory document.
    pub doc: Bytes,
    pub status: ValidationStatus,
    /// Raw content of the SHA256 sidecar, if it was fetched.
    pub sha256: Option<Bytes>,
    /// Raw content of the SHA512 sidecar, if it was fetched.
    pub sha512: Option<Bytes>,
}

enum Command {
    Forward(ForwardJob),
    LogStats,
}

/// Handle used to submit work to the forwarder.
///
/// Submissions block once the queue is full, which intentionally applies
/// backpressure to the download workers.
#[derive(Clone)]
pub struct ForwarderHandle {
    tx: mpsc::Sender<Command>,
}

impl ForwarderHandle {
    /// Hand an advisory to the forwarder.
    pub async fn forward(&self, job: ForwardJob) {
        let _ = self.tx.send(Command::Forward(job)).await;
    }

    /// Log the forwarder statistics, serialized with the other work.
    pub async fn log_stats(&self) {
        let _ = self.tx.send(Command::LogStats).await;
    }
}

/// Forwards downloaded advisories to a given HTTP endpoint.
///
/// The forwarder owns its state and processes jobs in send order. It shuts
/// down once all handles are dropped and the queue has drained.
pub struct Forwarder {
    cfg: Arc<Config>,
    fetcher: Fetcher,
    url: Url,
    rx: mpsc::Receiver<Command>,

    succeeded: u64,
    failed: u64,
}

impl Forwarder {
    /// Create a new forwarder and its submission handle.
    pub fn new(cfg: Arc<Config>) -> anyhow::Result<(Self, ForwarderHandle)> {
        let url = cfg
            .forward_url
            .clone()
            .context("forward URL is not configured")?;
        let fetcher = cfg.new_forward_fetcher()?;

        let (tx, rx) = mpsc::channel(cfg.forward_queue.max(1));

        Ok((
            Self {
                cfg,
                fetcher,
                url,
                rx,
                succeeded: 0,
                failed: 0,
            },
            ForwarderHandle { tx },
        ))
    }

    /// Run the forwarder. Meant to be spawned as its own task.
    pub async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Forward(job) => self.handle(job).await,
                Command::LogStats => log::info!(
                    "Forward statistics succeeded={} failed={}",
                    self.succeeded,
                    self.failed
                ),
            }
        }
        log::debug!("forwarder done");
    }

    async fn handle(&mut self, job: ForwardJob) {
        match self.send(&job).await {
            Ok(()) => {
                self.succeeded += 1;
                log::debug!("forwarding succeeded filename={}", job.filename);
            }
            Err(err) => {
                log::error!("forwarding failed filename={} error={err:#}", job.filename);
                self.store_failed(&job).await;
            }
        }
    }

    async fn send(&self, job: &ForwardJob) -> anyhow::Result<()> {
        let form = build_form(job).context("building forward request failed")?;

        let response = self
            .fetcher
            .post_multipart(self.url.clone(), form)
            .await
            .context("sending forward request failed")?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.bytes().await.unwrap_or_default();
            anyhow::bail!(
                "unexpected status {status}: {body}",
                body = limited_string(&body, MAX_RESPONSE_LOG)
            );
        }

        Ok(())
    }

    async fn store_failed(&mut self, job: &ForwardJob) {
        self.failed += 1;
        if let Err(err) = self.store_failed_advisory(job).await {
            log::error!("storing advisory that failed forwarding failed error={err}");
        }
    }

    async fn store_failed_advisory(&self, job: &ForwardJob) -> std::io::Result<()> {
        let dir = self.cfg.directory.join(FAILED_FORWARD_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        tokio::fs::write(dir.join(&job.filename), &job.doc).await?;
        if let Some(sha256) = &job.sha256 {
            tokio::fs::write(dir.join(format!("{}.sha256", job.filename)), sha256).await?;
        }
        if let Some(sha512) = &job.sha512 {
            tokio::fs::write(dir.join(format!("{}.sha512", job.filename)), sha512).await?;
        }

        Ok(())
    }
}

fn build_form(job: &ForwardJob) -> anyhow::Result<Form> {
    let mut form = Form::new()
        .part(
            "advisory",
            Part::bytes(job.doc.to_vec())
                .file_name(job.filename.clone())
                .mime_str("application/json")?,
        )
        .text("validation_status", job.status.to_string());

    if let Some(sha256) = &job.sha256 {
        form = form.part(
            "hash-256",
            Part::bytes(sha256.to_vec())
                .file_name(replace_extension(&job.filename, ".sha256"))
                .mime_str("text/plain")?,
        );
    }
    if let Some(sha512) = &job.sha512 {
        form = form.part(
            "hash-512",
            Part::bytes(sha512.to_vec())
                .file_name(replace_extension(&job.filename, ".sha512"))
                .mime_str("text/plain")?,
        );
    }

    Ok(form)
}

/// Replace the extension of a file name.
fn replace_extension(name: &str, extension: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) => format!("{stem}{extension}"),
        None => format!("{name}{extension}"),
    }
}

/// Render at most `max` bytes of a response body. Longer bodies are marked
/// with a `...` suffix.
fn limited_string(body: &[u8], max: usize) -> String {
    let mut message = String::from_utf8_lossy(&body[..body.len().min(max)]).into_owned();
    if body.len() >= max {
        message.push_str("...");
    }
    message
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn extensions_are_replaced() {
        assert_eq!(replace_extension("a.json", ".sha256"), "a.sha256");
        assert_eq!(replace_extension("a", ".sha512"), "a.sha512");
        assert_eq!(replace_extension("a.b.json", ".asc"), "a.b.asc");
    }

    #[test]
    fn long_bodies_are_truncated() {
        assert_eq!(limited_string(b"short", 512), "short");

        let long = vec![b'x'; 600];
        let message = limited_string(&long, 512);
        assert_eq!(message.len(), 512 + 3);
        assert!(message.ends_with("..."));

        // bodies of exactly the limit are marked as truncated, too
        let exact = vec![b'y'; 512];
        assert!(limited_string(&exact, 512).ends_with("..."));
    }

    #[tokio::test]
    async fn failed_jobs_spill_to_disk() {
        let dir = tempfile::tempdir().unwrap();

        let cfg = Arc::new(Config {
            directory: dir.path().to_path_buf(),
            forward_url: Some(Url::parse("https://ingest.example.com/upload").unwrap()),
            ..Default::default()
        });

        let (forwarder, _handle) = Forwarder::new(cfg).unwrap();
        forwarder
            .store_failed_advisory(&ForwardJob {
                filename: "avendor-advisory-0004.json".into(),
                doc: Bytes::from_static(b"{}"),
                status: ValidationStatus::Valid,
                sha256: Some(Bytes::from_static(b"cafe  avendor-advisory-0004.json")),
                sha512: None,
            })
            .await
            .unwrap();

        let spill = dir.path().join(FAILED_FORWARD_DIR);
        assert!(spill.join("avendor-advisory-0004.json").is_file());
        assert!(spill.join("avendor-advisory-0004.json.sha256").is_file());
        assert!(!spill.join("avendor-advisory-0004.json.sha512").exists());
    }
}
