//! StrideArena Engine - Leaderboard Composition Layer
//!
//! This crate ties the leaderboard together: score submissions, fitness
//! sync ingestion, ranked view assembly, prize calculation, and change
//! notification.
//!
//! # Write Protocol
//!
//! A score submission performs three steps:
//! 1. Overwrite the participant's score in the ordered score store
//! 2. Overwrite the participant's display detail record
//! 3. Publish a `score_update` event to the competition's live viewers
//!
//! Steps 1 and 2 are both attempted even when one fails; the outcome
//! reports each sub-step separately so a caller can tell "score not
//! recorded" apart from "detail not recorded". There is no cross-store
//! transaction and no rollback. Step 3 is fire-and-forget.
//!
//! Fitness syncs are the other write path and are *additive*: every sync
//! adds onto the participant's running totals, unlike the overwriting
//! detail write above.
//!
//! # Example
//!
//! ```ignore
//! use stridearena_engine::LeaderboardEngine;
//!
//! let engine = LeaderboardEngine::in_memory();
//!
//! engine.submit_score(submission).await?;
//! let view = engine.get_leaderboard(&competition, 10).await?;
//! ```

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use stridearena_notify::{ChangeNotifier, Subscription};
pub use stridearena_prizes::{PrizeError, PrizeSchedule};
pub use stridearena_scoreboard::{MemoryScoreStore, ScoreStore, ScoreUpdate};
pub use stridearena_store::{
    ActivityStorage, DetailStorage, ExpiryPolicy, MemoryStore, PrizeStorage,
};
use stridearena_types::{
    ActivityTotals, CompetitionId, DailyActivity, FitnessSync, LeaderboardView,
    ParticipantDetail, ParticipantId, Prize, RankedEntry, ScoreEvent, StoreError,
};

/// Upper bound on a single leaderboard window
pub const MAX_LEADERBOARD_LIMIT: usize = 1000;

// ============================================================================
// Errors
// ============================================================================

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// The score write failed, so the submission did not take effect.
    /// `detail_recorded` reports whether the (still attempted) detail
    /// write went through.
    #[error("score not recorded for {participant} in {competition}: {source}")]
    ScoreNotRecorded {
        competition: CompetitionId,
        participant: ParticipantId,
        source: StoreError,
        detail_recorded: bool,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Prize(#[from] PrizeError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

// ============================================================================
// Submission Types
// ============================================================================

/// A validated score submission from the request layer
#[derive(Debug, Clone)]
pub struct ScoreSubmission {
    /// Competition scope
    pub competition: CompetitionId,
    /// Submitting participant
    pub participant: ParticipantId,
    /// Display name, when the upstream layer knows it
    pub display_name: Option<String>,
    /// Step count; also the leaderboard score
    pub steps: u64,
    /// Distance in meters
    pub distance: f64,
    /// Calories burned
    pub calories: f64,
}

/// Outcome of a score submission.
///
/// The score write succeeded; `detail_error` carries the detail-store
/// failure when that sub-step did not.
#[derive(Debug)]
pub struct SubmitOutcome {
    /// The score update as applied
    pub score: ScoreUpdate,
    /// Detail-store failure, if the enrichment write was lost
    pub detail_error: Option<StoreError>,
}

impl SubmitOutcome {
    /// Whether both writes went through
    pub fn fully_recorded(&self) -> bool {
        self.detail_error.is_none()
    }
}

// ============================================================================
// Leaderboard Engine
// ============================================================================

/// The leaderboard engine serving one process.
///
/// All stores are shared seams: per-competition independence comes from the
/// backends (sharded maps), not from any lock held here, so concurrent
/// requests for unrelated competitions never serialize.
pub struct LeaderboardEngine {
    scores: Arc<dyn ScoreStore>,
    details: Arc<dyn DetailStorage>,
    activity: Arc<dyn ActivityStorage>,
    prizes: Arc<dyn PrizeStorage>,
    notifier: Arc<ChangeNotifier>,
    schedule: PrizeSchedule,
}

impl LeaderboardEngine {
    /// Assemble an engine from its stores
    pub fn new(
        scores: Arc<dyn ScoreStore>,
        details: Arc<dyn DetailStorage>,
        activity: Arc<dyn ActivityStorage>,
        prizes: Arc<dyn PrizeStorage>,
        notifier: Arc<ChangeNotifier>,
        schedule: PrizeSchedule,
    ) -> Self {
        Self {
            scores,
            details,
            activity,
            prizes,
            notifier,
            schedule,
        }
    }

    /// Engine backed entirely by in-memory stores
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self::new(
            Arc::new(MemoryScoreStore::new()),
            store.clone(),
            store.clone(),
            store,
            Arc::new(ChangeNotifier::new()),
            PrizeSchedule::default(),
        )
    }

    /// The notifier viewers subscribe through
    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Subscribe to a competition's change events
    pub fn subscribe(&self, competition: &CompetitionId) -> Subscription {
        self.notifier.subscribe(competition)
    }

    // ========================================================================
    // Write Path
    // ========================================================================

    /// Record a score submission.
    ///
    /// The leaderboard score is the step count; distance and calories are
    /// tracked for display but never ranked. Concurrent submissions for the
    /// same participant resolve last-write-wins.
    pub async fn submit_score(&self, submission: ScoreSubmission) -> EngineResult<SubmitOutcome> {
        let ScoreSubmission {
            competition,
            participant,
            display_name,
            steps,
            distance,
            calories,
        } = submission;

        let score = steps;
        let now = Utc::now();

        let score_result = self
            .scores
            .update(&competition, &participant, score)
            .await;

        // The detail write is attempted no matter how the score write went
        let detail = ParticipantDetail {
            competition: competition.clone(),
            participant: participant.clone(),
            display_name,
            score,
            steps,
            distance,
            calories,
            last_synced_at: now,
            updated_at: now,
        };
        let detail_result = self.details.put_detail(&detail).await;

        let update = match score_result {
            Ok(update) => update,
            Err(source) => {
                warn!(%competition, %participant, error = %source, "score write failed");
                return Err(EngineError::ScoreNotRecorded {
                    competition,
                    participant,
                    source,
                    detail_recorded: detail_result.is_ok(),
                });
            }
        };

        let detail_error = match detail_result {
            Ok(()) => None,
            Err(error) => {
                warn!(%competition, %participant, %error, "detail write failed");
                Some(error)
            }
        };

        let delivered = self.notifier.publish(
            &competition,
            ScoreEvent::ScoreUpdate {
                competition_id: competition.clone(),
                participant_id: participant.clone(),
                score,
                timestamp: now,
            },
        );
        debug!(%competition, %participant, score, delivered, "score recorded");

        Ok(SubmitOutcome {
            score: update,
            detail_error,
        })
    }

    /// Ingest a raw fitness sync.
    ///
    /// Stores the immutable daily record and folds the sync into the
    /// participant's running totals. Unlike `submit_score`, nothing here
    /// overwrites: repeated syncs keep adding up.
    pub async fn ingest_sync(&self, sync: FitnessSync) -> EngineResult<ActivityTotals> {
        let daily = DailyActivity {
            sync: sync.clone(),
            synced_at: Utc::now(),
        };
        self.activity.record_daily(&daily).await?;

        let totals = self.activity.accumulate(&sync).await?;
        debug!(
            competition = %sync.competition,
            participant = %sync.participant,
            total_steps = totals.steps,
            "fitness sync ingested"
        );
        Ok(totals)
    }

    // ========================================================================
    // Read Path
    // ========================================================================

    /// Assemble a ranked leaderboard view.
    ///
    /// Score-store failures surface to the caller; a missing or unreadable
    /// detail record only degrades its own row to a placeholder.
    pub async fn get_leaderboard(
        &self,
        competition: &CompetitionId,
        limit: usize,
    ) -> EngineResult<LeaderboardView> {
        let limit = limit.min(MAX_LEADERBOARD_LIMIT);

        let range = self.scores.top_range(competition, 0, limit).await?;
        let total_participants = self.scores.cardinality(competition).await?;
        let generated_at = Utc::now();

        let mut entries = Vec::with_capacity(range.len());
        for (idx, (participant, score)) in range.into_iter().enumerate() {
            let rank = idx + 1;
            let entry = match self.details.get_detail(competition, &participant).await {
                Ok(Some(detail)) => RankedEntry {
                    rank,
                    participant,
                    display_name: detail
                        .display_name
                        .unwrap_or_else(|| stridearena_types::UNKNOWN_PARTICIPANT.to_string()),
                    score,
                    steps: detail.steps,
                    distance: detail.distance,
                    calories: detail.calories,
                    last_synced_at: detail.last_synced_at,
                },
                Ok(None) => RankedEntry::placeholder(rank, participant, score, generated_at),
                Err(error) => {
                    warn!(%competition, %error, "detail read failed, degrading entry");
                    RankedEntry::placeholder(rank, participant, score, generated_at)
                }
            };
            entries.push(entry);
        }

        Ok(LeaderboardView {
            competition: competition.clone(),
            entries,
            total_participants,
            generated_at,
        })
    }

    /// A participant's 1-based rank, None when unscored
    pub async fn participant_rank(
        &self,
        competition: &CompetitionId,
        participant: &ParticipantId,
    ) -> EngineResult<Option<usize>> {
        Ok(self.scores.rank(competition, participant).await?)
    }

    /// A participant's running activity totals, zero-filled when absent.
    ///
    /// A store failure still propagates; only genuine absence zero-fills.
    pub async fn participant_stats(
        &self,
        competition: &CompetitionId,
        participant: &ParticipantId,
    ) -> EngineResult<ActivityTotals> {
        let totals = self.activity.get_totals(competition, participant).await?;
        Ok(totals.unwrap_or_else(|| {
            ActivityTotals::empty(competition.clone(), participant.clone())
        }))
    }

    /// The daily activity record for one day, if present
    pub async fn daily_stats(
        &self,
        competition: &CompetitionId,
        participant: &ParticipantId,
        day: chrono::NaiveDate,
    ) -> EngineResult<Option<DailyActivity>> {
        Ok(self.activity.get_daily(competition, participant, day).await?)
    }

    // ========================================================================
    // Prizes
    // ========================================================================

    /// Calculate the podium prizes and persist them as the competition's
    /// authoritative pending set, replacing any prior calculation.
    pub async fn calculate_prizes(
        &self,
        competition: &CompetitionId,
        prize_pool: Decimal,
    ) -> EngineResult<Vec<Prize>> {
        let view = self
            .get_leaderboard(competition, self.schedule.paid_ranks())
            .await?;
        let prizes = stridearena_prizes::calculate_prizes(&view, prize_pool, &self.schedule)?;

        self.prizes.replace_prizes(competition, &prizes).await?;
        info!(%competition, winners = prizes.len(), %prize_pool, "prizes calculated");
        Ok(prizes)
    }

    /// The current prize set, empty when none was calculated
    pub async fn get_prizes(&self, competition: &CompetitionId) -> EngineResult<Vec<Prize>> {
        Ok(self.prizes.get_prizes(competition).await?)
    }
}

// ============================================================================
// Tests
// ============================================================================
