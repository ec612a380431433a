use crate::cli::GlobalOpts;
use crate::helper::{get_snapshotter_instance, init_logger, print_json};
use crate::{Handler, Result};
use async_trait::async_trait;
use clap::Args;
use snapshots::{Info, Snapshotter};

/// Arguments for our `ListCommand`.
///
/// Example :
///
/// `rwsplit list --filter kind==active --filter labels.app==web`
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only list the snapshots matching one of the filters.
    #[clap(long = "filter", short)]
    filters: Vec<String>,
}

#[async_trait]
impl Handler for ListCommand {
    async fn handler(&self, opts: &GlobalOpts, logger: &mut env_logger::Builder) -> Result<()> {
        init_logger(logger, opts.quiet);

        let sn = get_snapshotter_instance(opts)?;

        let mut infos = Vec::<Info>::new();
        sn.walk(
            &mut |info: &Info| {
                infos.push(info.clone());
                Ok(())
            },
            &self.filters,
        )?;

        print_json(&infos)
    }
}
