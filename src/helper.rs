use crate::cli::{GlobalOpts, Result};
use log::LevelFilter;
use serde::Serialize;
use snapshots::OverlaySnapshotter;
use splitter::SplitSnapshotter;

/// Create a new snapshotter instance, splitting the writable directories of an overlay snapshotter.
pub fn get_snapshotter_instance(
    opts: &GlobalOpts,
) -> snapshots::Result<SplitSnapshotter<OverlaySnapshotter>> {
    splitter::new_snapshotter(&opts.root_dir, opts.config())
}

/// Change logger behavior and init it.
///
/// If the logger was not initialized, nothing will be displayed into the console.
pub fn init_logger(logger: &mut env_logger::Builder, quiet: bool) {
    if quiet {
        logger.filter_level(LevelFilter::Off);
    }
    logger.init();
}

/// Print a value as pretty JSON on the standard output.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a `key=value` label argument.
pub fn parse_label(label: &str) -> std::result::Result<(String, String), String> {
    match label.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid label {}, expected key=value", label)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label() {
        assert_eq!(
            parse_label("app=web=1"),
            Ok(("app".to_string(), "web=1".to_string()))
        );
        assert_eq!(parse_label("empty="), Ok(("empty".to_string(), String::new())));
        assert!(parse_label("app").is_err());
        assert!(parse_label("=web").is_err());
    }
}
