use crate::cli::GlobalOpts;
use crate::helper::{get_snapshotter_instance, init_logger, parse_label};
use crate::{Handler, Result};
use async_trait::async_trait;
use clap::Args;
use snapshots::Snapshotter;

/// Arguments for our `CommitCommand`.
///
/// Example :
///
/// `rwsplit commit sha256:abc default/extract-1`
#[derive(Debug, Args)]
pub struct CommitCommand {
    /// The name of the committed snapshot.
    name: String,
    /// The key of the active snapshot to commit.
    key: String,
    /// A label to attach to the committed snapshot, as `key=value`.
    #[clap(long = "label", short, parse(try_from_str = parse_label))]
    labels: Vec<(String, String)>,
}

#[async_trait]
impl Handler for CommitCommand {
    async fn handler(&self, opts: &GlobalOpts, logger: &mut env_logger::Builder) -> Result<()> {
        init_logger(logger, opts.quiet);

        let sn = get_snapshotter_instance(opts)?;
        sn.commit(&self.name, &self.key, self.labels.iter().cloned().collect())?;

        log::info!("committed {} as {}", &self.key, &self.name);
        Ok(())
    }
}
