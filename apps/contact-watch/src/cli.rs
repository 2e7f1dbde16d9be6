//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use contact_sync::{SyncResult, WatchConfig};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "contact-watch")]
#[command(about = "Stream contact directory changes to stdout as JSON frames")]
#[command(version)]
pub struct Args {
    /// Config file (default: the platform config directory)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Contact directory, overrides `store.path`
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Emit the initial snapshot and exit
    #[arg(long)]
    pub once: bool,

    /// Pretty-print each frame
    #[arg(long)]
    pub pretty: bool,

    /// More diagnostics on stderr (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Loads the configuration, applies the flags and validates the result.
    pub fn resolve_config(&self) -> SyncResult<WatchConfig> {
        let mut config = WatchConfig::load(self.config.clone())?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Applies flag overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut WatchConfig) {
        if let Some(dir) = &self.dir {
            config.store.path = dir.clone();
        }
        if self.pretty {
            config.output.pretty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from(["contact-watch", "--dir", "/tmp/c", "--once", "-vv"]);
        assert_eq!(args.dir, Some(PathBuf::from("/tmp/c")));
        assert!(args.once);
        assert!(!args.pretty);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from(["contact-watch", "--dir", "/srv/contacts", "--pretty"]);
        let mut config = WatchConfig::default();
        args.apply(&mut config);

        assert_eq!(config.store.path, PathBuf::from("/srv/contacts"));
        assert!(config.output.pretty);
    }

    #[test]
    fn test_flags_leave_config_alone() {
        let args = Args::parse_from(["contact-watch"]);
        let mut config = WatchConfig::default();
        config.output.pretty = true;
        args.apply(&mut config);

        assert!(config.output.pretty);
        assert_eq!(config.store, WatchConfig::default().store);
    }

    #[test]
    fn test_flags_are_validated_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contact-watch.toml");
        std::fs::write(&path, "[store]\npath = \"\"\n").unwrap();
        let config_arg = path.to_str().unwrap();

        let args = Args::parse_from(["contact-watch", "--config", config_arg]);
        assert!(args.resolve_config().unwrap_err().is_config_error());

        let args = Args::parse_from(["contact-watch", "--config", config_arg, "--dir", "/srv/c"]);
        let config = args.resolve_config().unwrap();
        assert_eq!(config.store.path, PathBuf::from("/srv/c"));
    }
}
