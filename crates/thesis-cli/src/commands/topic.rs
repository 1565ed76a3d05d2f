use thesis_core::enums::{TopicStatus, Track};

use crate::cli::GlobalFlags;
use crate::cli::subcommands::TopicCommands;
use crate::commands::shared::parse::parse_enum;
use crate::context::AppContext;
use crate::output::output;

/// Handle `thesis topic`.
pub async fn handle(
    action: &TopicCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        TopicCommands::List {
            semester,
            track,
            open,
        } => {
            let track = track
                .as_deref()
                .map(|t| parse_enum::<Track>(t, "track"))
                .transpose()?;
            let mut topics = ctx.service.list_topics(semester, track).await?;
            if *open {
                topics.retain(|topic| topic.status == TopicStatus::Open);
            }
            output(&topics, flags.format)
        }
        TopicCommands::Show { id } => output(&ctx.service.get_topic(id).await?, flags.format),
    }
}
