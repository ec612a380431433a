use crate::cli::GlobalOpts;
use crate::helper::{get_snapshotter_instance, init_logger};
use crate::{Handler, Result};
use async_trait::async_trait;
use clap::Args;
use snapshots::Snapshotter;

/// Arguments for our `CleanupCommand`.
#[derive(Debug, Args)]
pub struct CleanupCommand {}

#[async_trait]
impl Handler for CleanupCommand {
    async fn handler(&self, opts: &GlobalOpts, logger: &mut env_logger::Builder) -> Result<()> {
        init_logger(logger, opts.quiet);

        get_snapshotter_instance(opts)?.cleanup()?;
        Ok(())
    }
}
