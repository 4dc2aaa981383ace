//! Command-line interface for voxbridge
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Wake-word voice assistant for local language models
#[derive(Parser, Debug)]
#[command(
    name = "voxbridge",
    version = crate::version_string(),
    about = "Wake-word voice assistant for local language models"
)]
pub struct Cli {
    /// Subcommand to execute (default: interactive shell)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress diagnostics (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose diagnostics (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device (overrides [audio] device)
    #[arg(long, global = true, value_name = "DEVICE")]
    pub device: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,

    /// Run one listening session over a WAV file and print the log
    Replay {
        /// WAV file to feed through the recognizer
        wav: PathBuf,
    },

    /// Send one prompt to the language model and speak the reply
    Ask {
        /// Prompt text (joined with spaces)
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },

    /// Manage configuration
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Dump,
    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["voxbridge"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.device.is_none());
        assert!(cli.config.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["voxbridge", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_verbose_repeated_flags() {
        let cli = Cli::try_parse_from(["voxbridge", "-v", "-v"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "voxbridge",
            "replay",
            "clip.wav",
            "--config",
            "/tmp/vb.toml",
            "--device",
            "pipewire",
            "-q",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/vb.toml")));
        assert_eq!(cli.device.as_deref(), Some("pipewire"));
        assert!(cli.quiet);
        match cli.command {
            Some(Commands::Replay { wav }) => assert_eq!(wav, PathBuf::from("clip.wav")),
            other => panic!("Expected Replay command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_devices_command() {
        let cli = Cli::try_parse_from(["voxbridge", "devices"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Devices)));
    }

    #[test]
    fn test_parse_ask_collects_words() {
        let cli = Cli::try_parse_from(["voxbridge", "ask", "what", "time", "is", "it"]).unwrap();
        match cli.command {
            Some(Commands::Ask { prompt }) => {
                assert_eq!(prompt.join(" "), "what time is it");
            }
            other => panic!("Expected Ask command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_ask_requires_prompt() {
        assert!(Cli::try_parse_from(["voxbridge", "ask"]).is_err());
    }

    #[test]
    fn test_parse_config_actions() {
        let cli = Cli::try_parse_from(["voxbridge", "config", "dump"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Dump
            })
        ));

        let cli = Cli::try_parse_from(["voxbridge", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Path
            })
        ));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["voxbridge", "completions", "bash"]).unwrap();
        match cli.command {
            Some(Commands::Completions { shell }) => assert_eq!(shell, Shell::Bash),
            other => panic!("Expected Completions command, got {:?}", other),
        }
    }

    #[test]
    fn test_version_flag_reports_build_version() {
        let err = Cli::try_parse_from(["voxbridge", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        assert!(err.to_string().contains(crate::version_string()));
    }

    #[test]
    fn test_unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["voxbridge", "daemon"]).is_err());
    }
}
