use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{Phase, Track};

/// Registration and submission deadlines for one track.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TrackDeadlines {
    pub registration: DateTime<Utc>,
    pub submission: DateTime<Utc>,
}

impl TrackDeadlines {
    #[must_use]
    pub const fn get(&self, phase: Phase) -> DateTime<Utc> {
        match phase {
            Phase::Registration => self.registration,
            Phase::Submission => self.submission,
        }
    }

    pub const fn set(&mut self, phase: Phase, at: DateTime<Utc>) {
        match phase {
            Phase::Registration => self.registration = at,
            Phase::Submission => self.submission = at,
        }
    }
}

/// The authoritative semester record every deadline comparison reads from.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Semester {
    pub id: String,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub pre_thesis: TrackDeadlines,
    pub thesis: TrackDeadlines,
    pub grading_closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Semester {
    #[must_use]
    pub const fn deadlines(&self, track: Track) -> &TrackDeadlines {
        match track {
            Track::PreThesis => &self.pre_thesis,
            Track::Thesis => &self.thesis,
        }
    }

    pub const fn deadlines_mut(&mut self, track: Track) -> &mut TrackDeadlines {
        match track {
            Track::PreThesis => &mut self.pre_thesis,
            Track::Thesis => &mut self.thesis,
        }
    }

    #[must_use]
    pub const fn deadline(&self, track: Track, phase: Phase) -> DateTime<Utc> {
        self.deadlines(track).get(phase)
    }
}
