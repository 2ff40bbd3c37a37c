use anyhow::Context;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Clone, Debug, clap::Args)]
pub struct Logging {
    /// Log level.
    #[arg(long = "log_level", default_value = "info")]
    pub log_level: LevelFilter,

    /// Write logs to a file instead of standard error.
    #[arg(long = "log_file")]
    pub log_file: Option<PathBuf>,
}

impl Logging {
    /// Initialize logging from the arguments.
    ///
    /// `RUST_LOG` still takes precedence over the level flag, so individual
    /// modules can be turned up without touching the command line surface.
    pub fn init(self) -> anyhow::Result<()> {
        let mut builder = Builder::new();

        builder.filter_level(self.log_level);

        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }

        if let Some(path) = &self.log_file {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("unable to open log file: {}", path.display()))?;
            builder.target(Target::Pipe(Box::new(file)));
        }

        builder.init();

        Ok(())
    }
}
