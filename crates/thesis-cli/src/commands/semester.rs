use thesis_core::clock::SemesterClock;
use thesis_core::entities::TrackDeadlines;
use thesis_core::enums::{Phase, Track};
use thesis_db::repos::NewSemester;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::{SemesterCommands, SemesterDates};
use crate::commands::shared::parse::{DayEdge, parse_enum, parse_instant};
use crate::context::AppContext;
use crate::output::output;

/// Handle `thesis semester`.
pub async fn handle(
    action: &SemesterCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        SemesterCommands::Create(dates) => {
            let schedule = parse_schedule(dates, ctx.service.clock())?;
            let semester = ctx.service.create_semester(&ctx.admin, schedule).await?;
            output(&semester, flags.format)
        }
        SemesterCommands::Show { id } => output(&ctx.service.get_semester(id).await?, flags.format),
        SemesterCommands::List => {
            let mut semesters = ctx.service.list_semesters().await?;
            if let Some(limit) = flags.limit {
                semesters.truncate(usize::try_from(limit)?);
            }
            output(&semesters, flags.format)
        }
        SemesterCommands::CorrectDeadline {
            id,
            track,
            phase,
            at,
        } => {
            let track: Track = parse_enum(track, "track")?;
            let phase: Phase = parse_enum(phase, "phase")?;
            let deadline = parse_instant(at, ctx.service.clock(), DayEdge::End, "at")?;
            let semester = ctx
                .service
                .correct_deadline(&ctx.admin, id, track, phase, deadline)
                .await?;
            output(&semester, flags.format)
        }
        SemesterCommands::Reschedule { id, dates } => {
            let schedule = parse_schedule(dates, ctx.service.clock())?;
            let semester = ctx
                .service
                .reschedule_semester(&ctx.admin, id, schedule)
                .await?;
            output(&semester, flags.format)
        }
        SemesterCommands::CloseGrading { id } => {
            let report = ctx.service.close_grading(&ctx.admin, id).await?;
            output(&report, flags.format)
        }
    }
}

fn parse_schedule(dates: &SemesterDates, clock: &SemesterClock) -> anyhow::Result<NewSemester> {
    let end = |raw: &str, field: &str| parse_instant(raw, clock, DayEdge::End, field);
    Ok(NewSemester {
        name: dates.name.clone(),
        starts_at: parse_instant(&dates.starts, clock, DayEdge::Start, "starts")?,
        ends_at: end(&dates.ends, "ends")?,
        pre_thesis: TrackDeadlines {
            registration: end(&dates.pre_thesis_registration, "pre-thesis-registration")?,
            submission: end(&dates.pre_thesis_submission, "pre-thesis-submission")?,
        },
        thesis: TrackDeadlines {
            registration: end(&dates.thesis_registration, "thesis-registration")?,
            submission: end(&dates.thesis_submission, "thesis-submission")?,
        },
    })
}
