use clap::{Args, Subcommand};

use crate::cli::subcommands::{EventCommands, LedgerCommands, SemesterCommands, TopicCommands};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Create `.thesis/` with a default config and an empty database.
    Init(InitArgs),
    /// Semesters, deadlines and grading windows.
    Semester {
        #[command(subcommand)]
        action: SemesterCommands,
    },
    /// Supervisor capacity ledgers.
    Ledger {
        #[command(subcommand)]
        action: LedgerCommands,
    },
    /// Published topics.
    Topic {
        #[command(subcommand)]
        action: TopicCommands,
    },
    /// The durable event log.
    Events {
        #[command(subcommand)]
        action: EventCommands,
    },
}

#[derive(Clone, Debug, Args)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}
