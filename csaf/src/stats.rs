//! Download statistics

/// Counters of a download run.
///
/// Workers keep a local instance and merge it into the shared one when they
/// exit, so the hot path does not take a lock.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadStats {
    pub download_failed: u64,
    pub filename_failed: u64,
    pub sha256_failed: u64,
    pub sha512_failed: u64,
    pub signature_failed: u64,
    pub schema_failed: u64,
    pub remote_failed: u64,
    pub succeeded: u64,
}

impl DownloadStats {
    /// Merge another set of counters into this one.
    pub fn add(&mut self, other: &DownloadStats) {
        self.download_failed += other.download_failed;
        self.filename_failed += other.filename_failed;
        self.sha256_failed += other.sha256_failed;
        self.sha512_failed += other.sha512_failed;
        self.signature_failed += other.signature_failed;
        self.schema_failed += other.schema_failed;
        self.remote_failed += other.remote_failed;
        self.succeeded += other.succeeded;
    }

    /// Log the counters.
    pub fn log(&self) {
        log::info!(
            "Download statistics succeeded={} download_failed={} filename_failed={} sha256_failed={} sha512_failed={} signature_failed={} schema_failed={} remote_failed={}",
            self.succeeded,
            self.download_failed,
            self.filename_failed,
            self.sha256_failed,
            self.sha512_failed,
            self.signature_failed,
            self.schema_failed,
            self.remote_failed,
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_merges_all_counters() {
        let mut total = DownloadStats {
            succeeded: 1,
            sha256_failed: 2,
            ..Default::default()
        };
        total.add(&DownloadStats {
            succeeded: 3,
            schema_failed: 1,
            ..Default::default()
        });

        assert_eq!(
            total,
            DownloadStats {
                succeeded: 4,
                sha256_failed: 2,
                schema_failed: 1,
                ..Default::default()
            }
        );
    }
}
