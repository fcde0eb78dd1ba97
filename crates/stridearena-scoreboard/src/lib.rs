//! StrideArena Scoreboard - Ordered In-Memory Score Store
//!
//! This crate implements the ordered score collection backing every
//! competition leaderboard, using a BTreeMap keyed for descending-score
//! iteration.
//!
//! # Features
//!
//! - **Deterministic Ordering**: Descending score, participant id ascending
//!   among ties
//! - **O(log n) Overwrites**: Re-submitting a score replaces the old entry,
//!   never duplicates it
//! - **Range Queries**: Top-K windows with offset, for paginated leaderboards
//! - **Rank Lookup**: 1-based dense rank per participant
//!
//! # Example
//!
//! ```ignore
//! use stridearena_scoreboard::ScoreBoard;
//!
//! let mut board = ScoreBoard::new(competition_id);
//!
//! board.update(ParticipantId::new("user-1"), 12_000);
//!
//! // Top ten, best score first
//! let top = board.top_range(0, 10);
//!
//! // 1-based rank
//! let rank = board.rank(&ParticipantId::new("user-1"));
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use stridearena_types::{CompetitionId, ParticipantId, ScoreEntry, StoreResult};

// ============================================================================
// Score Key
// ============================================================================

/// Ordering key for the score map.
///
/// Sorts by score descending first, then participant id ascending, so plain
/// BTreeMap iteration yields the leaderboard order and ties always resolve
/// the same way.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ScoreKey {
    score: Reverse<u64>,
    participant: ParticipantId,
}

impl ScoreKey {
    fn new(score: u64, participant: ParticipantId) -> Self {
        Self {
            score: Reverse(score),
            participant,
        }
    }
}

// ============================================================================
// Update Result
// ============================================================================

/// Result of writing a score to the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreUpdate {
    /// The entry as stored
    pub entry: ScoreEntry,
    /// Score the participant held before this write, if any
    pub previous: Option<u64>,
}

impl ScoreUpdate {
    /// Whether the write changed the stored score
    pub fn changed(&self) -> bool {
        self.previous != Some(self.entry.score)
    }

    /// Whether this was the participant's first score in the competition
    pub fn first_entry(&self) -> bool {
        self.previous.is_none()
    }
}

// ============================================================================
// ScoreBoard
// ============================================================================

/// Ordered score collection for a single competition.
///
/// Two indexes are kept in lockstep: the ordered map for rank/range reads
/// and a participant index so overwrites can evict the old key in O(log n).
#[derive(Debug)]
pub struct ScoreBoard {
    /// Competition this board belongs to
    competition: CompetitionId,
    /// Scores in leaderboard order
    ordered: BTreeMap<ScoreKey, u64>,
    /// Current score per participant
    scores: HashMap<ParticipantId, u64>,
}

impl ScoreBoard {
    /// Create an empty board for a competition
    pub fn new(competition: CompetitionId) -> Self {
        Self {
            competition,
            ordered: BTreeMap::new(),
            scores: HashMap::new(),
        }
    }

    /// Get the competition id
    pub fn competition(&self) -> &CompetitionId {
        &self.competition
    }

    /// Write a participant's score, replacing any previous entry.
    ///
    /// Idempotent: submitting an identical score leaves the board unchanged.
    pub fn update(&mut self, participant: ParticipantId, score: u64) -> ScoreUpdate {
        let previous = self.scores.insert(participant.clone(), score);

        if let Some(old) = previous {
            if old == score {
                return ScoreUpdate {
                    entry: ScoreEntry {
                        competition: self.competition.clone(),
                        participant,
                        score,
                    },
                    previous,
                };
            }
            self.ordered.remove(&ScoreKey::new(old, participant.clone()));
        }

        self.ordered
            .insert(ScoreKey::new(score, participant.clone()), score);

        ScoreUpdate {
            entry: ScoreEntry {
                competition: self.competition.clone(),
                participant,
                score,
            },
            previous,
        }
    }

    /// Ordered window of (participant, score), best score first.
    ///
    /// Returns fewer than `count` entries when the board runs out; an empty
    /// board yields an empty window, not an error.
    pub fn top_range(&self, offset: usize, count: usize) -> Vec<(ParticipantId, u64)> {
        self.ordered
            .keys()
            .skip(offset)
            .take(count)
            .map(|key| (key.participant.clone(), key.score.0))
            .collect()
    }

    /// 1-based rank of a participant, or None when unscored.
    ///
    /// Linear scan over the ordered map; ranks are dense by construction
    /// since every participant occupies exactly one key.
    pub fn rank(&self, participant: &ParticipantId) -> Option<usize> {
        let score = *self.scores.get(participant)?;
        let target = ScoreKey::new(score, participant.clone());
        self.ordered
            .keys()
            .position(|key| *key == target)
            .map(|idx| idx + 1)
    }

    /// Current score of a participant
    pub fn score(&self, participant: &ParticipantId) -> Option<u64> {
        self.scores.get(participant).copied()
    }

    /// Number of scored participants
    pub fn cardinality(&self) -> usize {
        self.scores.len()
    }

    /// Whether the board has no entries
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

// ============================================================================
// Score Store
// ============================================================================

/// Storage seam for per-competition ordered scores.
///
/// Backends must keep competitions independent: operations on one
/// competition never block another.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Overwrite a participant's score
    async fn update(
        &self,
        competition: &CompetitionId,
        participant: &ParticipantId,
        score: u64,
    ) -> StoreResult<ScoreUpdate>;

    /// Ordered window of scores, best first
    async fn top_range(
        &self,
        competition: &CompetitionId,
        offset: usize,
        count: usize,
    ) -> StoreResult<Vec<(ParticipantId, u64)>>;

    /// 1-based rank, None when the participant has no score
    async fn rank(
        &self,
        competition: &CompetitionId,
        participant: &ParticipantId,
    ) -> StoreResult<Option<usize>>;

    /// Scored participant count for a competition
    async fn cardinality(&self, competition: &CompetitionId) -> StoreResult<usize>;
}

/// In-memory score store keyed by competition.
///
/// The DashMap gives shard-level locking, so writes to unrelated
/// competitions proceed concurrently with no global lock.
pub struct MemoryScoreStore {
    boards: DashMap<CompetitionId, ScoreBoard>,
}

impl MemoryScoreStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            boards: DashMap::new(),
        }
    }

    /// Number of competitions with at least one score
    pub fn competition_count(&self) -> usize {
        self.boards.len()
    }
}

impl Default for MemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn update(
        &self,
        competition: &CompetitionId,
        participant: &ParticipantId,
        score: u64,
    ) -> StoreResult<ScoreUpdate> {
        let mut board = self
            .boards
            .entry(competition.clone())
            .or_insert_with(|| ScoreBoard::new(competition.clone()));
        let update = board.update(participant.clone(), score);

        if update.first_entry() {
            debug!(%competition, %participant, score, "first score recorded");
        }
        Ok(update)
    }

    async fn top_range(
        &self,
        competition: &CompetitionId,
        offset: usize,
        count: usize,
    ) -> StoreResult<Vec<(ParticipantId, u64)>> {
        Ok(self
            .boards
            .get(competition)
            .map(|board| board.top_range(offset, count))
            .unwrap_or_default())
    }

    async fn rank(
        &self,
        competition: &CompetitionId,
        participant: &ParticipantId,
    ) -> StoreResult<Option<usize>> {
        Ok(self
            .boards
            .get(competition)
            .and_then(|board| board.rank(participant)))
    }

    async fn cardinality(&self, competition: &CompetitionId) -> StoreResult<usize> {
        Ok(self
            .boards
            .get(competition)
            .map(|board| board.cardinality())
            .unwrap_or(0))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> ScoreBoard {
        ScoreBoard::new(CompetitionId::new("comp-1"))
    }

    fn p(id: &str) -> ParticipantId {
        ParticipantId::new(id)
    }

    #[test]
    fn test_empty_board() {
        let board = board();
        assert_eq!(board.cardinality(), 0);
        assert!(board.top_range(0, 10).is_empty());
        assert_eq!(board.rank(&p("nobody")), None);
    }

    #[test]
    fn test_descending_order_with_tie_break() {
        let mut board = board();
        board.update(p("a"), 500);
        board.update(p("b"), 900);
        board.update(p("c"), 900);

        // Ties resolve by participant id ascending
        let top = board.top_range(0, 10);
        assert_eq!(
            top,
            vec![(p("b"), 900), (p("c"), 900), (p("a"), 500)]
        );

        assert_eq!(board.rank(&p("b")), Some(1));
        assert_eq!(board.rank(&p("c")), Some(2));
        assert_eq!(board.rank(&p("a")), Some(3));
    }

    #[test]
    fn test_overwrite_never_duplicates() {
        let mut board = board();
        board.update(p("a"), 100);
        board.update(p("a"), 300);
        board.update(p("a"), 200);

        assert_eq!(board.cardinality(), 1);
        assert_eq!(board.score(&p("a")), Some(200));
        assert_eq!(board.top_range(0, 10), vec![(p("a"), 200)]);
    }

    #[test]
    fn test_idempotent_resubmission() {
        let mut board = board();
        board.update(p("a"), 100);
        board.update(p("b"), 200);

        let update = board.update(p("a"), 100);
        assert!(!update.changed());
        assert_eq!(update.previous, Some(100));

        assert_eq!(board.cardinality(), 2);
        assert_eq!(board.rank(&p("a")), Some(2));
    }

    #[test]
    fn test_ranks_are_dense() {
        let mut board = board();
        for (id, score) in [("a", 10), ("b", 50), ("c", 50), ("d", 7), ("e", 99)] {
            board.update(p(id), score);
        }

        let mut ranks: Vec<usize> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|id| board.rank(&p(id)).unwrap())
            .collect();
        ranks.sort_unstable();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_range_window() {
        let mut board = board();
        for i in 0..10u64 {
            board.update(p(&format!("user-{i}")), i * 100);
        }

        let window = board.top_range(2, 3);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].1, 700);
        assert_eq!(window[2].1, 500);

        // Offset past the end
        assert!(board.top_range(50, 10).is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_isolated_competitions() {
        let store = MemoryScoreStore::new();
        let comp_a = CompetitionId::new("comp-a");
        let comp_b = CompetitionId::new("comp-b");

        store.update(&comp_a, &p("u1"), 100).await.unwrap();
        store.update(&comp_b, &p("u1"), 900).await.unwrap();

        assert_eq!(store.rank(&comp_a, &p("u1")).await.unwrap(), Some(1));
        assert_eq!(store.cardinality(&comp_a).await.unwrap(), 1);
        assert_eq!(store.cardinality(&comp_b).await.unwrap(), 1);
        assert_eq!(
            store.top_range(&comp_a, 0, 10).await.unwrap(),
            vec![(p("u1"), 100)]
        );
    }

    #[tokio::test]
    async fn test_memory_store_missing_competition() {
        let store = MemoryScoreStore::new();
        let comp = CompetitionId::new("ghost");

        assert!(store.top_range(&comp, 0, 10).await.unwrap().is_empty());
        assert_eq!(store.cardinality(&comp).await.unwrap(), 0);
        assert_eq!(store.rank(&comp, &p("u1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_overwrites_single_entry() {
        use std::sync::Arc;

        let store = Arc::new(MemoryScoreStore::new());
        let comp = CompetitionId::new("comp-1");

        let mut handles = Vec::new();
        for i in 0..16u64 {
            let store = store.clone();
            let comp = comp.clone();
            handles.push(tokio::spawn(async move {
                store.update(&comp, &ParticipantId::new("u1"), i * 1000).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Last write wins among racers, but never a duplicate entry
        assert_eq!(store.cardinality(&comp).await.unwrap(), 1);
        assert_eq!(store.rank(&comp, &p("u1")).await.unwrap(), Some(1));
    }
}
