use clap::Subcommand;

/// Event log commands.
#[derive(Clone, Debug, Subcommand)]
pub enum EventCommands {
    /// List committed events, oldest first.
    List {
        /// semester, ledger, topic, application, work or grade
        #[arg(long)]
        subject_type: Option<String>,
        #[arg(long)]
        subject_id: Option<String>,
        /// Event type, e.g. application_approved
        #[arg(long = "type")]
        event_type: Option<String>,
        #[arg(long)]
        actor: Option<String>,
        /// RFC 3339 instant or date
        #[arg(long)]
        since: Option<String>,
    },
}
