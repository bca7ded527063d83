//! Command-line surface: subcommands, global options, and exit codes.

use crate::install::CliOverrides;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "account-switching supervisor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Overrides both `--root` and the registry/home-relative default,
    /// treating PATH as the Steam-style prefix containing `.steam/steam`.
    #[arg(long, value_name = "PATH", global = true)]
    pub prefix: Option<PathBuf>,

    /// Overrides the client installation root directly.
    #[arg(long, value_name = "PATH", global = true)]
    pub root: Option<PathBuf>,

    /// Overrides the client launcher executable.
    #[arg(long, value_name = "PATH", global = true)]
    pub exe: Option<PathBuf>,

    /// Enables debug-level logging.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Writes the spawned client's stdout/stderr to PATH instead of
    /// inheriting the supervisor's own.
    #[arg(long, value_name = "PATH", global = true)]
    pub logfile: Option<PathBuf>,

    /// Client-style arguments forwarded verbatim to an already-running
    /// instance when no subcommand is given (e.g. `-foreground`,
    /// `-shutdown`). Ignored once a subcommand is present.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub forward: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Captures the current cookie from the live config.
    Store,
    /// Rewrites config to USER's cookie and sets auto-login.
    Switch { user: String },
    /// Switches to USER, spawns the client, and recaptures the cookie.
    Start { user: String },
    /// Dispatches `-shutdown` to a running client without acquiring any
    /// locks of our own.
    Shutdown,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            prefix: self.prefix.clone(),
            root: self.root.clone(),
            exe: self.exe.clone(),
        }
    }

    /// The token list this invocation should forward to a running peer's
    /// Command Router — exactly the tokens a peer's listener sees after
    /// `argv[0]` is stripped.
    pub fn forward_tokens(&self) -> Vec<String> {
        match &self.command {
            Some(Command::Store) => vec!["store".to_string()],
            Some(Command::Switch { user }) => vec!["switch".to_string(), user.clone()],
            Some(Command::Start { user }) => vec!["start".to_string(), user.clone()],
            Some(Command::Shutdown) => vec!["-shutdown".to_string()],
            None => self.forward.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["acolyte"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn forward_tokens_for_store() {
        assert_eq!(parse(&["store"]).forward_tokens(), vec!["store".to_string()]);
    }

    #[test]
    fn forward_tokens_for_switch() {
        assert_eq!(
            parse(&["switch", "bob"]).forward_tokens(),
            vec!["switch".to_string(), "bob".to_string()]
        );
    }

    #[test]
    fn forward_tokens_for_start() {
        assert_eq!(
            parse(&["start", "alice"]).forward_tokens(),
            vec!["start".to_string(), "alice".to_string()]
        );
    }

    #[test]
    fn forward_tokens_for_bare_flag() {
        assert_eq!(
            parse(&["-foreground"]).forward_tokens(),
            vec!["-foreground".to_string()]
        );
    }

    #[test]
    fn forward_tokens_empty_for_plain_bare_launch() {
        assert!(parse(&[]).forward_tokens().is_empty());
    }
}
