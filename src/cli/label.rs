use crate::cli::{Error, GlobalOpts};
use crate::helper::{get_snapshotter_instance, init_logger, print_json};
use crate::{Handler, Result};
use async_trait::async_trait;
use clap::Args;
use snapshots::Snapshotter;

/// Arguments for our `LabelCommand`.
///
/// Example :
///
/// `rwsplit label default/my-container app=web obsolete`
///
/// sets the `app` label and removes the `obsolete` one.
#[derive(Debug, Args)]
pub struct LabelCommand {
    /// The snapshot key or name.
    key: String,
    /// The labels to set, as `key=value`, or to remove, as `key`.
    #[clap(required = true)]
    labels: Vec<String>,
}

#[async_trait]
impl Handler for LabelCommand {
    async fn handler(&self, opts: &GlobalOpts, logger: &mut env_logger::Builder) -> Result<()> {
        init_logger(logger, opts.quiet);

        let sn = get_snapshotter_instance(opts)?;
        let mut info = sn.stat(&self.key)?;
        let mut fieldpaths = Vec::new();

        for label in &self.labels {
            let (name, value) = match label.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (label.as_str(), None),
            };
            if name.is_empty() {
                return Err(Error::InvalidLabel(label.clone()));
            }

            match value {
                Some(value) => info.labels.insert(name.to_string(), value.to_string()),
                None => info.labels.remove(name),
            };
            fieldpaths.push(format!("labels.{}", name));
        }

        print_json(&sn.update(info, &fieldpaths)?)
    }
}
