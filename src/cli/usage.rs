use crate::cli::GlobalOpts;
use crate::helper::{get_snapshotter_instance, init_logger, print_json};
use crate::{Handler, Result};
use async_trait::async_trait;
use clap::Args;
use snapshots::Snapshotter;

/// Arguments for our `UsageCommand`.
#[derive(Debug, Args)]
pub struct UsageCommand {
    /// The snapshot key or name.
    key: String,
}

#[async_trait]
impl Handler for UsageCommand {
    async fn handler(&self, opts: &GlobalOpts, logger: &mut env_logger::Builder) -> Result<()> {
        init_logger(logger, opts.quiet);

        let sn = get_snapshotter_instance(opts)?;
        print_json(&sn.usage(&self.key)?)
    }
}
