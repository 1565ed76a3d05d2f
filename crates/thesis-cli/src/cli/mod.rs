use std::path::PathBuf;

use clap::Parser;

pub mod global;
pub mod root_commands;
pub mod subcommands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::Commands;

/// Top-level CLI parser for the `thesis` binary.
#[derive(Debug, Parser)]
#[command(
    name = "thesis",
    version,
    about = "Thesis supervision engine - semesters, capacity ledgers and grading"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, table
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Max results to return
    #[arg(short, long, global = true)]
    pub limit: Option<u32>,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of `.thesis/config.toml`
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Administrator id recorded on events
    #[arg(long = "as", global = true, default_value = "cli-admin")]
    pub actor: String,
}

impl Cli {
    /// Extract ergonomic global flags struct for command handlers.
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            limit: self.limit,
            quiet: self.quiet,
            verbose: self.verbose,
            config: self.config.clone(),
            actor: self.actor.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use pretty_assertions::assert_eq;

    use super::subcommands::{LedgerCommands, SemesterCommands};
    use super::{Cli, Commands, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_before_subcommand() {
        let cli = Cli::try_parse_from([
            "thesis", "--format", "table", "--limit", "10", "--verbose", "semester", "list",
        ])
        .expect("cli should parse");

        assert_eq!(cli.format, OutputFormat::Table);
        assert_eq!(cli.limit, Some(10));
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Semester {
                action: SemesterCommands::List
            }
        ));
    }

    #[test]
    fn ledger_provision_args() {
        let cli = Cli::try_parse_from([
            "thesis",
            "ledger",
            "provision",
            "--supervisor",
            "tch-1",
            "--semester",
            "sem-1",
            "--track",
            "pre-thesis",
            "--max-slots",
            "4",
            "--as",
            "adm-7",
        ])
        .expect("cli should parse");

        assert_eq!(cli.actor, "adm-7");
        match cli.command {
            Commands::Ledger {
                action:
                    LedgerCommands::Provision {
                        key, max_slots, ..
                    },
            } => {
                assert_eq!(key.supervisor, "tch-1");
                assert_eq!(key.track, "pre-thesis");
                assert_eq!(max_slots, 4);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
