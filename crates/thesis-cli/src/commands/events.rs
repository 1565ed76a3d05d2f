use thesis_core::enums::{EntityType, EventType};
use thesis_db::repos::EventFilter;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::EventCommands;
use crate::commands::shared::parse::{DayEdge, parse_enum, parse_instant};
use crate::context::AppContext;
use crate::output::output;

/// Handle `thesis events`.
pub async fn handle(
    action: &EventCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let EventCommands::List {
        subject_type,
        subject_id,
        event_type,
        actor,
        since,
    } = action;

    let filter = EventFilter {
        subject_type: subject_type
            .as_deref()
            .map(|s| parse_enum::<EntityType>(s, "subject type"))
            .transpose()?,
        subject_id: subject_id.clone(),
        event_type: event_type
            .as_deref()
            .map(|s| parse_enum::<EventType>(s, "event type"))
            .transpose()?,
        actor_id: actor.clone(),
        since: since
            .as_deref()
            .map(|s| parse_instant(s, ctx.service.clock(), DayEdge::Start, "since"))
            .transpose()?,
        limit: flags.limit,
    };
    let events = ctx.service.query_events(&filter).await?;
    output(&events, flags.format)
}
