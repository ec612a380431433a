use crate::cli::GlobalOpts;
use crate::helper::{get_snapshotter_instance, init_logger};
use crate::{Handler, Result};
use async_trait::async_trait;
use clap::Args;
use snapshots::Snapshotter;

/// Arguments for our `RemoveCommand`.
#[derive(Debug, Args)]
pub struct RemoveCommand {
    /// The keys of the snapshots to remove.
    #[clap(required = true)]
    keys: Vec<String>,
}

#[async_trait]
impl Handler for RemoveCommand {
    async fn handler(&self, opts: &GlobalOpts, logger: &mut env_logger::Builder) -> Result<()> {
        init_logger(logger, opts.quiet);

        let sn = get_snapshotter_instance(opts)?;
        for key in &self.keys {
            sn.remove(key)?;
            log::info!("removed {}", key);
        }
        Ok(())
    }
}
