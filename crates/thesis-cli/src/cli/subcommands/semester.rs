use clap::{Args, Subcommand};

/// Semester commands.
#[derive(Clone, Debug, Subcommand)]
pub enum SemesterCommands {
    /// Create a semester.
    Create(SemesterDates),
    /// Show one semester.
    Show { id: String },
    /// List semesters, newest first.
    List,
    /// Move one deadline. Allowed after the semester is in use.
    CorrectDeadline {
        id: String,
        /// pre-thesis or thesis
        #[arg(long)]
        track: String,
        /// registration or submission
        #[arg(long)]
        phase: String,
        /// RFC 3339 instant, or a date meaning the end of that day
        #[arg(long)]
        at: String,
    },
    /// Replace all dates of a semester nothing references yet.
    Reschedule {
        id: String,
        #[command(flatten)]
        dates: SemesterDates,
    },
    /// Close grading after the semester ended and finalize open works.
    CloseGrading { id: String },
}

/// Dates accept an RFC 3339 instant or a plain date. A plain start date means
/// the start of that day; every other plain date means its last instant.
#[derive(Clone, Debug, Args)]
pub struct SemesterDates {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub starts: String,
    #[arg(long)]
    pub ends: String,
    #[arg(long)]
    pub pre_thesis_registration: String,
    #[arg(long)]
    pub pre_thesis_submission: String,
    #[arg(long)]
    pub thesis_registration: String,
    #[arg(long)]
    pub thesis_submission: String,
}
