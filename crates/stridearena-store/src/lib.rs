//! StrideArena Store - Participant Detail and Activity Storage
//!
//! This crate provides the storage seams for everything keyed by
//! (competition, participant): display details, per-day activity records,
//! running activity totals, and calculated prize sets.
//!
//! # Features
//!
//! - **Detail Snapshots**: Overwrite-on-write display records with short expiry
//! - **Daily Activity**: Immutable per-day records from tracker syncs
//! - **Running Totals**: Additive accumulation across syncs
//! - **Prize Sets**: Authoritative pending prizes, replaced per calculation
//!
//! Backends are best-effort from the engine's point of view: a failed
//! detail read degrades a leaderboard row, it never fails the query.
//!
//! # Example
//!
//! ```ignore
//! use stridearena_store::{MemoryStore, DetailStorage, ExpiryPolicy};
//!
//! let store = MemoryStore::new(ExpiryPolicy::default());
//!
//! store.put_detail(&detail).await?;
//! let detail = store.get_detail(&competition, &participant).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use stridearena_types::{
    ActivityTotals, CompetitionId, DailyActivity, FitnessSync, ParticipantDetail, ParticipantId,
    Prize, StoreResult,
};

// ============================================================================
// Expiry Policy
// ============================================================================

/// Retention windows for stored records.
///
/// Tunable policy, not a structural requirement; the defaults mirror how
/// long each record stays useful.
#[derive(Debug, Clone)]
pub struct ExpiryPolicy {
    /// Display detail snapshots (refreshed on every score submission)
    pub detail_ttl: Duration,
    /// Daily records and running totals
    pub activity_ttl: Duration,
    /// Calculated prize sets
    pub prize_ttl: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            detail_ttl: Duration::days(1),
            activity_ttl: Duration::days(30),
            prize_ttl: Duration::days(7),
        }
    }
}

// ============================================================================
// Storage Traits
// ============================================================================

/// Storage for display detail snapshots
#[async_trait]
pub trait DetailStorage: Send + Sync {
    /// Overwrite the detail record for a participant
    async fn put_detail(&self, detail: &ParticipantDetail) -> StoreResult<()>;

    /// Fetch the detail record, None when absent or expired
    async fn get_detail(
        &self,
        competition: &CompetitionId,
        participant: &ParticipantId,
    ) -> StoreResult<Option<ParticipantDetail>>;
}

/// Storage for per-day records and running activity totals
#[async_trait]
pub trait ActivityStorage: Send + Sync {
    /// Store the immutable daily record for a sync
    async fn record_daily(&self, activity: &DailyActivity) -> StoreResult<()>;

    /// Fetch a daily record by day
    async fn get_daily(
        &self,
        competition: &CompetitionId,
        participant: &ParticipantId,
        day: NaiveDate,
    ) -> StoreResult<Option<DailyActivity>>;

    /// Fold a sync into the participant's running totals and return them.
    ///
    /// Additive: each call adds onto whatever is stored, creating zeroed
    /// totals first when nothing exists yet.
    async fn accumulate(&self, sync: &FitnessSync) -> StoreResult<ActivityTotals>;

    /// Fetch the running totals, None when the participant never synced
    async fn get_totals(
        &self,
        competition: &CompetitionId,
        participant: &ParticipantId,
    ) -> StoreResult<Option<ActivityTotals>>;
}

/// Storage for calculated prize sets
#[async_trait]
pub trait PrizeStorage: Send + Sync {
    /// Replace the competition's prize set with a fresh calculation
    async fn replace_prizes(
        &self,
        competition: &CompetitionId,
        prizes: &[Prize],
    ) -> StoreResult<()>;

    /// Fetch the current prize set, empty when none was calculated
    async fn get_prizes(&self, competition: &CompetitionId) -> StoreResult<Vec<Prize>>;
}

// ============================================================================
// In-Memory Backend
// ============================================================================

/// A stored value with its expiry deadline
#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Utc::now() + ttl,
        }
    }

    fn live(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

type DetailKey = (CompetitionId, ParticipantId);
type DailyKey = (CompetitionId, ParticipantId, NaiveDate);

/// In-memory storage backend with lazy expiry.
///
/// Expired records are dropped on read; a durable backend would delegate
/// expiry to the store's own TTL mechanism instead.
pub struct MemoryStore {
    policy: ExpiryPolicy,
    details: RwLock<HashMap<DetailKey, Expiring<ParticipantDetail>>>,
    daily: RwLock<HashMap<DailyKey, Expiring<DailyActivity>>>,
    totals: RwLock<HashMap<DetailKey, Expiring<ActivityTotals>>>,
    prizes: RwLock<HashMap<CompetitionId, Expiring<Vec<Prize>>>>,
}

impl MemoryStore {
    /// Create a store with the given retention policy
    pub fn new(policy: ExpiryPolicy) -> Self {
        Self {
            policy,
            details: RwLock::new(HashMap::new()),
            daily: RwLock::new(HashMap::new()),
            totals: RwLock::new(HashMap::new()),
            prizes: RwLock::new(HashMap::new()),
        }
    }

    /// The retention policy in effect
    pub fn policy(&self) -> &ExpiryPolicy {
        &self.policy
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(ExpiryPolicy::default())
    }
}

#[async_trait]
impl DetailStorage for MemoryStore {
    async fn put_detail(&self, detail: &ParticipantDetail) -> StoreResult<()> {
        let key = (detail.competition.clone(), detail.participant.clone());
        self.details
            .write()
            .await
            .insert(key, Expiring::new(detail.clone(), self.policy.detail_ttl));
        Ok(())
    }

    async fn get_detail(
        &self,
        competition: &CompetitionId,
        participant: &ParticipantId,
    ) -> StoreResult<Option<ParticipantDetail>> {
        let key = (competition.clone(), participant.clone());
        let mut details = self.details.write().await;
        match details.get(&key) {
            Some(record) if record.live() => Ok(Some(record.value.clone())),
            Some(_) => {
                details.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ActivityStorage for MemoryStore {
    async fn record_daily(&self, activity: &DailyActivity) -> StoreResult<()> {
        let key = (
            activity.sync.competition.clone(),
            activity.sync.participant.clone(),
            activity.sync.recorded_on,
        );
        self.daily
            .write()
            .await
            .insert(key, Expiring::new(activity.clone(), self.policy.activity_ttl));
        Ok(())
    }

    async fn get_daily(
        &self,
        competition: &CompetitionId,
        participant: &ParticipantId,
        day: NaiveDate,
    ) -> StoreResult<Option<DailyActivity>> {
        let key = (competition.clone(), participant.clone(), day);
        let daily = self.daily.read().await;
        Ok(daily
            .get(&key)
            .filter(|record| record.live())
            .map(|record| record.value.clone()))
    }

    async fn accumulate(&self, sync: &FitnessSync) -> StoreResult<ActivityTotals> {
        let key = (sync.competition.clone(), sync.participant.clone());
        let mut totals = self.totals.write().await;

        let mut current = match totals.get(&key) {
            Some(record) if record.live() => record.value.clone(),
            _ => ActivityTotals::empty(sync.competition.clone(), sync.participant.clone()),
        };
        current.accumulate(sync);

        totals.insert(
            key,
            Expiring::new(current.clone(), self.policy.activity_ttl),
        );
        debug!(
            competition = %sync.competition,
            participant = %sync.participant,
            steps = current.steps,
            "activity totals updated"
        );
        Ok(current)
    }

    async fn get_totals(
        &self,
        competition: &CompetitionId,
        participant: &ParticipantId,
    ) -> StoreResult<Option<ActivityTotals>> {
        let key = (competition.clone(), participant.clone());
        let totals = self.totals.read().await;
        Ok(totals
            .get(&key)
            .filter(|record| record.live())
            .map(|record| record.value.clone()))
    }
}

#[async_trait]
impl PrizeStorage for MemoryStore {
    async fn replace_prizes(
        &self,
        competition: &CompetitionId,
        prizes: &[Prize],
    ) -> StoreResult<()> {
        self.prizes.write().await.insert(
            competition.clone(),
            Expiring::new(prizes.to_vec(), self.policy.prize_ttl),
        );
        Ok(())
    }

    async fn get_prizes(&self, competition: &CompetitionId) -> StoreResult<Vec<Prize>> {
        let prizes = self.prizes.read().await;
        Ok(prizes
            .get(competition)
            .filter(|record| record.live())
            .map(|record| record.value.clone())
            .unwrap_or_default())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stridearena_types::{ActivitySource, PrizeStatus};

    fn comp() -> CompetitionId {
        CompetitionId::new("comp-1")
    }

    fn user() -> ParticipantId {
        ParticipantId::new("user-1")
    }

    fn sync(steps: u64) -> FitnessSync {
        FitnessSync {
            competition: comp(),
            participant: user(),
            steps,
            distance: steps as f64 * 0.8,
            calories: steps as f64 / 20.0,
            active_minutes: 10,
            source: ActivitySource::GoogleFit,
            recorded_on: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
        }
    }

    fn detail(score: u64) -> ParticipantDetail {
        ParticipantDetail {
            competition: comp(),
            participant: user(),
            display_name: Some("Ada".to_string()),
            score,
            steps: score,
            distance: 0.0,
            calories: 0.0,
            last_synced_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_detail_overwrite() {
        let store = MemoryStore::default();

        store.put_detail(&detail(100)).await.unwrap();
        store.put_detail(&detail(250)).await.unwrap();

        let stored = store.get_detail(&comp(), &user()).await.unwrap().unwrap();
        assert_eq!(stored.score, 250);
    }

    #[tokio::test]
    async fn test_detail_absent_is_none() {
        let store = MemoryStore::default();
        assert!(store.get_detail(&comp(), &user()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accumulation_is_additive() {
        let store = MemoryStore::default();

        store.accumulate(&sync(100)).await.unwrap();
        let totals = store.accumulate(&sync(50)).await.unwrap();

        // Syncs add onto the stored totals, they never overwrite them
        assert_eq!(totals.steps, 150);
        assert_eq!(totals.active_minutes, 20);

        let stored = store.get_totals(&comp(), &user()).await.unwrap().unwrap();
        assert_eq!(stored.steps, 150);
    }

    #[tokio::test]
    async fn test_daily_record_keyed_by_day() {
        let store = MemoryStore::default();
        let activity = DailyActivity {
            sync: sync(4000),
            synced_at: Utc::now(),
        };

        store.record_daily(&activity).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let other = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert!(store.get_daily(&comp(), &user(), day).await.unwrap().is_some());
        assert!(store.get_daily(&comp(), &user(), other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prize_set_replaced_not_appended() {
        let store = MemoryStore::default();

        let first = vec![Prize {
            id: Prize::make_id(&comp(), 1),
            competition: comp(),
            participant: user(),
            rank: 1,
            amount: dec!(600),
            status: PrizeStatus::Pending,
            distributed_at: None,
            created_at: Utc::now(),
        }];
        store.replace_prizes(&comp(), &first).await.unwrap();

        let second = vec![
            Prize {
                participant: ParticipantId::new("user-2"),
                ..first[0].clone()
            },
        ];
        store.replace_prizes(&comp(), &second).await.unwrap();

        let stored = store.get_prizes(&comp()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].participant, ParticipantId::new("user-2"));
    }

    #[tokio::test]
    async fn test_expired_records_dropped() {
        let policy = ExpiryPolicy {
            detail_ttl: Duration::zero(),
            activity_ttl: Duration::zero(),
            prize_ttl: Duration::zero(),
        };
        let store = MemoryStore::new(policy);

        store.put_detail(&detail(100)).await.unwrap();
        store.accumulate(&sync(100)).await.unwrap();

        assert!(store.get_detail(&comp(), &user()).await.unwrap().is_none());
        assert!(store.get_totals(&comp(), &user()).await.unwrap().is_none());
        // A fresh accumulate starts over from zero once the totals expired
        let totals = store.accumulate(&sync(70)).await.unwrap();
        assert_eq!(totals.steps, 70);
    }
}
