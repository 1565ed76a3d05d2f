use clap::{Args, Subcommand};

/// Capacity ledger commands.
#[derive(Clone, Debug, Subcommand)]
pub enum LedgerCommands {
    /// Create a ledger, or resize it.
    Provision {
        #[command(flatten)]
        key: LedgerKeyArgs,
        #[arg(long)]
        max_slots: u32,
    },
    /// Show one ledger.
    Show {
        #[command(flatten)]
        key: LedgerKeyArgs,
    },
    /// List ledgers of a semester.
    List {
        #[arg(long)]
        semester: String,
        #[arg(long)]
        track: Option<String>,
    },
    /// Delete a ledger with no allocated slots.
    Delete {
        #[command(flatten)]
        key: LedgerKeyArgs,
    },
}

/// `(supervisor, semester, track)` identifying one ledger.
#[derive(Clone, Debug, Args)]
pub struct LedgerKeyArgs {
    #[arg(long)]
    pub supervisor: String,
    #[arg(long)]
    pub semester: String,
    /// pre-thesis or thesis
    #[arg(long)]
    pub track: String,
}
