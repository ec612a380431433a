use crate::cli::GlobalOpts;
use crate::helper::{get_snapshotter_instance, init_logger, parse_label, print_json};
use crate::{Handler, Result};
use async_trait::async_trait;
use clap::Args;
use snapshots::Snapshotter;

/// Arguments for our `PrepareCommand`.
///
/// These arguments are parsed by `clap` and an instance of `PrepareCommand` containing
/// arguments is provided.
///
/// Example :
///
/// `rwsplit prepare default/my-container --parent sha256:abc`
///
/// The `handler` method provided below will be executed.
#[derive(Debug, Args)]
pub struct PrepareCommand {
    /// The snapshot key.
    key: String,
    /// The committed snapshot to build on.
    #[clap(long, short, default_value = "")]
    parent: String,
    /// A label to attach to the snapshot, as `key=value`.
    #[clap(long = "label", short, parse(try_from_str = parse_label))]
    labels: Vec<(String, String)>,
}

#[async_trait]
impl Handler for PrepareCommand {
    async fn handler(&self, opts: &GlobalOpts, logger: &mut env_logger::Builder) -> Result<()> {
        init_logger(logger, opts.quiet);

        let sn = get_snapshotter_instance(opts)?;
        let mounts = sn.prepare(
            &self.key,
            &self.parent,
            self.labels.iter().cloned().collect(),
        )?;

        print_json(&mounts)
    }
}
