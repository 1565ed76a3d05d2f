use clap::Subcommand;

/// Topic commands.
#[derive(Clone, Debug, Subcommand)]
pub enum TopicCommands {
    /// List topics of a semester.
    List {
        #[arg(long)]
        semester: String,
        #[arg(long)]
        track: Option<String>,
        /// Only topics still accepting applications
        #[arg(long)]
        open: bool,
    },
    /// Show one topic.
    Show { id: String },
}
