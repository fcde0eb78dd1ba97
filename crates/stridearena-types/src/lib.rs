//! StrideArena Types - Leaderboard Domain Types
//!
//! This crate defines the core types for the StrideArena fitness
//! competition platform:
//! - Competition and participant identifiers
//! - Score entries and ranked leaderboard views
//! - Fitness sync payloads and activity aggregates
//! - Prize records
//! - Leaderboard change events
//!
//! Every record is an explicit schema'd struct that round-trips through
//! serde, timestamps included.
//!
//! # Example
//!
//! ```ignore
//! use stridearena_types::{CompetitionId, ParticipantId, ScoreEntry};
//!
//! let entry = ScoreEntry {
//!     competition: CompetitionId::new("spring-5k"),
//!     participant: ParticipantId::new("user-42"),
//!     score: 12_000,
//! };
//! ```

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ID Types
// ============================================================================

/// Competition identifier (e.g., "spring-5k", "office-steps-2026")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompetitionId(pub String);

impl CompetitionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CompetitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Participant identifier, assigned by the upstream identity layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Scores
// ============================================================================

/// A participant's current score within one competition.
///
/// At most one entry exists per (competition, participant); re-submission
/// overwrites the score in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Competition this score belongs to
    pub competition: CompetitionId,
    /// Scored participant
    pub participant: ParticipantId,
    /// Leaderboard score (currently equal to the step count)
    pub score: u64,
}

// ============================================================================
// Participant Details
// ============================================================================

/// Display detail for a participant, overwritten on every score submission.
///
/// Kept separately from the score ordering; a participant can hold a score
/// with no detail record yet, and readers fall back to a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantDetail {
    /// Competition scope
    pub competition: CompetitionId,
    /// Participant this detail describes
    pub participant: ParticipantId,
    /// Display name, if the upstream layer supplied one
    pub display_name: Option<String>,
    /// Score at the time of the last overwrite
    pub score: u64,
    /// Step count
    pub steps: u64,
    /// Distance in meters
    pub distance: f64,
    /// Calories burned
    pub calories: f64,
    /// When the participant's device last synced
    pub last_synced_at: DateTime<Utc>,
    /// When this record was written
    pub updated_at: DateTime<Utc>,
}

/// Placeholder display name for participants without a detail record
pub const UNKNOWN_PARTICIPANT: &str = "Unknown";

// ============================================================================
// Fitness Activity
// ============================================================================

/// Origin of a fitness sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySource {
    GoogleFit,
    AppleHealth,
    Fitbit,
    Manual,
}

impl Default for ActivitySource {
    fn default() -> Self {
        Self::Manual
    }
}

impl fmt::Display for ActivitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoogleFit => write!(f, "google_fit"),
            Self::AppleHealth => write!(f, "apple_health"),
            Self::Fitbit => write!(f, "fitbit"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// A raw fitness sync delivered by a tracker integration.
///
/// Syncs are deltas: each one is added onto the participant's running
/// aggregate, unlike score submissions which overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessSync {
    /// Competition scope
    pub competition: CompetitionId,
    /// Syncing participant
    pub participant: ParticipantId,
    /// Steps covered by this sync
    pub steps: u64,
    /// Distance in meters covered by this sync
    pub distance: f64,
    /// Calories burned during this sync
    pub calories: f64,
    /// Active minutes during this sync
    pub active_minutes: u32,
    /// Where the data came from
    pub source: ActivitySource,
    /// Day the activity occurred on
    pub recorded_on: NaiveDate,
}

/// Immutable per-day activity record, one per (participant, competition, day)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyActivity {
    /// Sync payload as received
    pub sync: FitnessSync,
    /// When the sync was ingested
    pub synced_at: DateTime<Utc>,
}

/// Running activity totals for a participant within one competition.
///
/// Accumulated additively across syncs; never reset within a competition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTotals {
    /// Competition scope
    pub competition: CompetitionId,
    /// Participant these totals belong to
    pub participant: ParticipantId,
    /// Total steps
    pub steps: u64,
    /// Total distance in meters
    pub distance: f64,
    /// Total calories burned
    pub calories: f64,
    /// Total active minutes
    pub active_minutes: u32,
    /// Source of the most recent sync
    pub source: ActivitySource,
    /// When the totals were last updated
    pub updated_at: DateTime<Utc>,
}

impl ActivityTotals {
    /// Zeroed totals for a participant with no syncs yet
    pub fn empty(competition: CompetitionId, participant: ParticipantId) -> Self {
        Self {
            competition,
            participant,
            steps: 0,
            distance: 0.0,
            calories: 0.0,
            active_minutes: 0,
            source: ActivitySource::default(),
            updated_at: Utc::now(),
        }
    }

    /// Fold a sync into the running totals
    pub fn accumulate(&mut self, sync: &FitnessSync) {
        self.steps += sync.steps;
        self.distance += sync.distance;
        self.calories += sync.calories;
        self.active_minutes += sync.active_minutes;
        self.source = sync.source;
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Leaderboard Views
// ============================================================================

/// A single ranked row in a leaderboard view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// Rank within the competition (1-based, dense)
    pub rank: usize,
    /// Ranked participant
    pub participant: ParticipantId,
    /// Display name, or "Unknown" when no detail record exists
    pub display_name: String,
    /// Current score
    pub score: u64,
    /// Step count from the detail record (zero when missing)
    pub steps: u64,
    /// Distance in meters from the detail record
    pub distance: f64,
    /// Calories from the detail record
    pub calories: f64,
    /// Last device sync, or the view timestamp when no detail exists
    pub last_synced_at: DateTime<Utc>,
}

impl RankedEntry {
    /// Placeholder row for a scored participant with no readable detail
    pub fn placeholder(
        rank: usize,
        participant: ParticipantId,
        score: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            rank,
            participant,
            display_name: UNKNOWN_PARTICIPANT.to_string(),
            score,
            steps: 0,
            distance: 0.0,
            calories: 0.0,
            last_synced_at: now,
        }
    }
}

/// Point-in-time ranked snapshot of one competition's leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardView {
    /// Competition this view describes
    pub competition: CompetitionId,
    /// Ranked entries, best score first
    pub entries: Vec<RankedEntry>,
    /// Scored participants in the competition at read time; may exceed
    /// `entries.len()` when a window limit was applied
    pub total_participants: usize,
    /// When the view was assembled
    pub generated_at: DateTime<Utc>,
}

// ============================================================================
// Prizes
// ============================================================================

/// Prize lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrizeStatus {
    /// Calculated but not yet paid out
    Pending,
    /// Payout completed by the distribution layer
    Distributed,
}

impl fmt::Display for PrizeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Distributed => write!(f, "distributed"),
        }
    }
}

/// A single calculated payout for a podium finisher.
///
/// Derived from a leaderboard snapshot; recomputable, and immutable once
/// created except for the pending → distributed transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prize {
    /// Stable id, shaped `prize-<competition>-<rank>`
    pub id: String,
    /// Competition the prize was calculated for
    pub competition: CompetitionId,
    /// Winning participant
    pub participant: ParticipantId,
    /// Podium rank (1 through 3)
    pub rank: usize,
    /// Payout amount
    pub amount: Decimal,
    /// Lifecycle status
    pub status: PrizeStatus,
    /// Set when the status transitions to distributed
    pub distributed_at: Option<DateTime<Utc>>,
    /// When the prize was calculated
    pub created_at: DateTime<Utc>,
}

impl Prize {
    /// Build the stable prize id for a competition and rank
    pub fn make_id(competition: &CompetitionId, rank: usize) -> String {
        format!("prize-{}-{}", competition, rank)
    }

    /// Mark the prize as distributed
    pub fn mark_distributed(&mut self, at: DateTime<Utc>) {
        self.status = PrizeStatus::Distributed;
        self.distributed_at = Some(at);
    }
}

// ============================================================================
// Change Events
// ============================================================================

/// Event published to live viewers when a leaderboard changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreEvent {
    /// A participant's score was written
    ScoreUpdate {
        competition_id: CompetitionId,
        participant_id: ParticipantId,
        score: u64,
        timestamp: DateTime<Utc>,
    },
}

impl ScoreEvent {
    /// Competition the event belongs to
    pub fn competition(&self) -> &CompetitionId {
        match self {
            Self::ScoreUpdate { competition_id, .. } => competition_id,
        }
    }
}

// ============================================================================
// Store Errors
// ============================================================================

/// Failure surfaced by a storage backend.
///
/// Retryable from the caller's point of view; the engine does not retry
/// internally beyond what the backend client already does.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("record could not be decoded: {0}")]
    Corrupt(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Tests
// ============================================================================
