use crate::cli::GlobalOpts;
use crate::helper::{get_snapshotter_instance, init_logger};
use crate::{Handler, Result};
use async_trait::async_trait;
use clap::Args;
use snapshots::Snapshotter;
use std::sync::Arc;
use std::time::Duration;

/// Arguments for our `GcCommand`.
///
/// Example :
///
/// `rwsplit gc --interval 60`
///
/// runs a cleanup every minute, until interrupted.
#[derive(Debug, Args)]
pub struct GcCommand {
    /// The number of seconds between two cleanups.
    #[clap(long, short, default_value = "300")]
    interval: u64,
}

#[async_trait]
impl Handler for GcCommand {
    async fn handler(&self, opts: &GlobalOpts, logger: &mut env_logger::Builder) -> Result<()> {
        init_logger(logger, opts.quiet);

        let sn = Arc::new(get_snapshotter_instance(opts)?);
        let mut ticker = tokio::time::interval(Duration::from_secs(self.interval.max(1)));

        log::info!(
            "cleaning up {} every {}s",
            opts.root_dir.display(),
            self.interval.max(1)
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sn = Arc::clone(&sn);
                    // Cleanup blocks on the metadata lock and the filesystem
                    match tokio::task::spawn_blocking(move || sn.cleanup()).await? {
                        Ok(()) => log::debug!("cleanup done"),
                        Err(e) => log::warn!("cleanup failed: {:?}", e),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    log::info!("interrupted, stopping");
                    break;
                }
            }
        }

        sn.close()?;
        Ok(())
    }
}
