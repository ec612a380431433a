mod cleanup;
mod commit;
mod gc;
mod label;
mod list;
mod mounts;
mod prepare;
mod remove;
mod stat;
mod usage;
mod view;

use crate::cli::cleanup::CleanupCommand;
use crate::cli::commit::CommitCommand;
use crate::cli::gc::GcCommand;
use crate::cli::label::LabelCommand;
use crate::cli::list::ListCommand;
use crate::cli::mounts::MountsCommand;
use crate::cli::prepare::PrepareCommand;
use crate::cli::remove::RemoveCommand;
use crate::cli::stat::StatCommand;
use crate::cli::usage::UsageCommand;
use crate::cli::view::ViewCommand;
use crate::RWSPLIT_ROOT_DIR;
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI related errors
#[derive(Debug)]
pub enum Error {
    Snapshot(snapshots::Error),
    /// A result could not be written on the standard output
    Output(serde_json::Error),
    /// A label argument is not in the `key=value` or `key` format
    InvalidLabel(String),
    /// The garbage collection task panicked or was cancelled
    Gc(tokio::task::JoinError),
}

impl From<snapshots::Error> for Error {
    fn from(error: snapshots::Error) -> Self {
        Self::Snapshot(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Output(error)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Gc(error)
    }
}

/// A common result type for our CLI.
pub type Result<T> = std::result::Result<T, Error>;

/// `Handler` is a trait that should be implemented for each of our commands.
///
/// It defines the contract & the input / output of a command execution.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Executes the command handler.
    ///
    /// Every command gets the global options, and the logger which it must initialize.
    async fn handler(&self, opts: &GlobalOpts, logger: &mut env_logger::Builder) -> Result<()>;
}

/// The options shared by every command, used to build the snapshotter.
#[derive(Args, Debug)]
pub struct GlobalOpts {
    /// The root directory of the snapshotter storage.
    #[clap(long, global = true, default_value = RWSPLIT_ROOT_DIR)]
    pub root_dir: PathBuf,
    /// Defer the removal of snapshot directories by the overlay snapshotter until cleanup.
    #[clap(long, global = true, parse(try_from_str), default_value = "true")]
    pub async_remove: bool,
    /// Add the "containerd.io/snapshot/overlay.upperdir" label to new snapshots.
    #[clap(long, global = true)]
    pub upperdir_label: bool,
    /// If set, the command will be executed silently.
    #[clap(long, short, global = true)]
    pub quiet: bool,
}

impl GlobalOpts {
    /// The overlay snapshotter configuration.
    pub fn config(&self) -> snapshots::Config {
        snapshots::Config {
            async_remove: self.async_remove,
            upperdir_label: self.upperdir_label,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(version, author)]
pub struct Cli {
    #[clap(flatten)]
    pub(crate) opts: GlobalOpts,
    #[clap(subcommand)]
    pub(crate) command: Command,
}

impl Cli {
    /// Get the global options and the command used by the user.
    ///
    /// For example, if the user executes the command `prepare`,
    /// we dynamically return the command so the `main` can
    /// execute it.
    pub fn command(self) -> (GlobalOpts, Box<dyn Handler>) {
        let handler: Box<dyn Handler> = match self.command {
            Command::Prepare(cmd) => Box::new(cmd),
            Command::View(cmd) => Box::new(cmd),
            Command::Mounts(cmd) => Box::new(cmd),
            Command::Commit(cmd) => Box::new(cmd),
            Command::Remove(cmd) => Box::new(cmd),
            Command::Cleanup(cmd) => Box::new(cmd),
            Command::Stat(cmd) => Box::new(cmd),
            Command::Label(cmd) => Box::new(cmd),
            Command::Usage(cmd) => Box::new(cmd),
            Command::List(cmd) => Box::new(cmd),
            Command::Gc(cmd) => Box::new(cmd),
        };
        (self.opts, handler)
    }
}

/// The enumeration of our commands.
///
/// Each of our commands should be listed in this enumeration with the following format :
/// CommandName(CommandHandler)
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an active snapshot and print its mounts
    Prepare(PrepareCommand),
    /// Create a read-only snapshot and print its mounts
    View(ViewCommand),
    /// Print the mounts of an active or view snapshot
    Mounts(MountsCommand),
    /// Commit an active snapshot
    Commit(CommitCommand),
    /// Remove snapshots and their directories
    Remove(RemoveCommand),
    /// Remove the directories of removed snapshots
    Cleanup(CleanupCommand),
    /// Print the information of a snapshot
    Stat(StatCommand),
    /// Set or remove labels of a snapshot
    Label(LabelCommand),
    /// Print the disk usage of a snapshot
    Usage(UsageCommand),
    /// List the snapshots
    List(ListCommand),
    /// Periodically remove the directories of removed snapshots
    Gc(GcCommand),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_options_defaults() {
        let cli = Cli::try_parse_from(["rwsplit", "cleanup"]).unwrap();
        let (opts, _) = cli.command();

        assert_eq!(opts.root_dir, PathBuf::from(RWSPLIT_ROOT_DIR));
        assert_eq!(
            opts.config(),
            snapshots::Config {
                async_remove: true,
                upperdir_label: false,
            }
        );
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rwsplit",
            "prepare",
            "default/A",
            "--parent",
            "base",
            "--root-dir",
            "/tmp/rwsplit",
            "--async-remove",
            "false",
            "--upperdir-label",
        ])
        .unwrap();
        let (opts, _) = cli.command();

        assert_eq!(opts.root_dir, PathBuf::from("/tmp/rwsplit"));
        assert!(!opts.config().async_remove);
        assert!(opts.config().upperdir_label);
    }

    #[test]
    fn test_invalid_label_is_rejected() {
        assert!(Cli::try_parse_from(["rwsplit", "prepare", "default/A", "--label", "nolabel"]).is_err());
    }
}
