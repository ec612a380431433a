use crate::cli::{Cli, Handler, Result};
use clap::Parser;

mod cli;
mod helper;

/// The default root of the snapshotter storage.
pub const RWSPLIT_ROOT_DIR: &str = "/var/lib/rwsplit";

#[tokio::main]
async fn main() -> Result<()> {
    let (opts, command) = Cli::parse().command();

    // `RUST_LOG` takes precedence over the default level
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    command.handler(&opts, &mut logger).await
}
