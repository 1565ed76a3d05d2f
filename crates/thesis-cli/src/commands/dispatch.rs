use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(command: Commands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match command {
        Commands::Semester { action } => commands::semester::handle(&action, ctx, flags).await,
        Commands::Ledger { action } => commands::ledger::handle(&action, ctx, flags).await,
        Commands::Topic { action } => commands::topic::handle(&action, ctx, flags).await,
        Commands::Events { action } => commands::events::handle(&action, ctx, flags).await,
        Commands::Init(_) => unreachable!("init is pre-dispatched in main"),
    }
}
