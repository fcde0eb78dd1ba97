//! StrideArena Prizes - Podium Payout Calculation
//!
//! Deterministic prize calculation from a ranked leaderboard view and a
//! prize pool. The default schedule pays the podium 60% / 30% / 10%;
//! participants beyond rank 3 receive nothing.
//!
//! Prizes are derived records: the same view and pool always produce the
//! same amounts, and a recalculation replaces the previous set wholesale.
//!
//! # Example
//!
//! ```ignore
//! use stridearena_prizes::{PrizeSchedule, calculate_prizes};
//!
//! let view = engine.get_leaderboard(&competition, 3).await?;
//! let prizes = calculate_prizes(&view, dec!(1000), &PrizeSchedule::default())?;
//! ```

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use stridearena_types::{CompetitionId, LeaderboardView, Prize, PrizeStatus};

// ============================================================================
// Errors
// ============================================================================

/// Prize calculation errors
#[derive(Debug, Error)]
pub enum PrizeError {
    /// Calculation requested for a competition with no scored participants.
    /// A caller input error, not a retryable failure.
    #[error("competition has no participants: {0}")]
    EmptyCompetition(CompetitionId),

    #[error("invalid prize schedule: {0}")]
    InvalidSchedule(String),
}

/// Result type for prize operations
pub type PrizeResult<T> = Result<T, PrizeError>;

// ============================================================================
// Prize Schedule
// ============================================================================

/// Payout percentages per podium rank, best rank first.
///
/// Percentages may sum to less than 1 (the remainder stays in the pool)
/// but never more.
#[derive(Debug, Clone, PartialEq)]
pub struct PrizeSchedule {
    percentages: Vec<Decimal>,
}

impl PrizeSchedule {
    /// Build a schedule from per-rank percentages
    pub fn new(percentages: Vec<Decimal>) -> PrizeResult<Self> {
        if percentages.is_empty() {
            return Err(PrizeError::InvalidSchedule("no percentages given".into()));
        }
        if percentages.iter().any(|p| *p <= Decimal::ZERO) {
            return Err(PrizeError::InvalidSchedule(
                "percentages must be positive".into(),
            ));
        }
        let total: Decimal = percentages.iter().sum();
        if total > Decimal::ONE {
            return Err(PrizeError::InvalidSchedule(format!(
                "percentages sum to {total}, exceeding the pool"
            )));
        }
        Ok(Self { percentages })
    }

    /// Number of paid ranks
    pub fn paid_ranks(&self) -> usize {
        self.percentages.len()
    }

    /// Percentage for a 1-based rank, None beyond the podium
    pub fn percentage(&self, rank: usize) -> Option<Decimal> {
        self.percentages.get(rank.checked_sub(1)?).copied()
    }
}

impl Default for PrizeSchedule {
    /// The standard 60/30/10 podium split
    fn default() -> Self {
        Self {
            percentages: vec![dec!(0.60), dec!(0.30), dec!(0.10)],
        }
    }
}

// ============================================================================
// Calculation
// ============================================================================

/// Calculate the prize set for a leaderboard view.
///
/// Produces one pending prize per paid rank that has a ranked entry, so a
/// two-person competition yields two prizes. Fails when the view holds no
/// participants at all.
pub fn calculate_prizes(
    view: &LeaderboardView,
    prize_pool: Decimal,
    schedule: &PrizeSchedule,
) -> PrizeResult<Vec<Prize>> {
    if view.entries.is_empty() {
        return Err(PrizeError::EmptyCompetition(view.competition.clone()));
    }

    let created_at = Utc::now();
    let prizes = view
        .entries
        .iter()
        .take(schedule.paid_ranks())
        .enumerate()
        .map(|(idx, entry)| {
            let rank = idx + 1;
            // Ranks in the view are dense, so position and rank agree
            let percentage = schedule
                .percentage(rank)
                .unwrap_or(Decimal::ZERO);
            Prize {
                id: Prize::make_id(&view.competition, rank),
                competition: view.competition.clone(),
                participant: entry.participant.clone(),
                rank,
                amount: prize_pool * percentage,
                status: PrizeStatus::Pending,
                distributed_at: None,
                created_at,
            }
        })
        .collect();

    Ok(prizes)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stridearena_types::{ParticipantId, RankedEntry};

    fn view(scores: &[(&str, u64)]) -> LeaderboardView {
        let now = Utc::now();
        LeaderboardView {
            competition: CompetitionId::new("comp-1"),
            entries: scores
                .iter()
                .enumerate()
                .map(|(idx, (id, score))| {
                    RankedEntry::placeholder(idx + 1, ParticipantId::new(*id), *score, now)
                })
                .collect(),
            total_participants: scores.len(),
            generated_at: now,
        }
    }

    #[test]
    fn test_standard_split() {
        let view = view(&[("user-3", 18_000), ("user-1", 15_000), ("user-2", 12_000)]);
        let prizes =
            calculate_prizes(&view, dec!(1000), &PrizeSchedule::default()).unwrap();

        assert_eq!(prizes.len(), 3);
        assert_eq!(prizes[0].participant, ParticipantId::new("user-3"));
        assert_eq!(prizes[0].amount, dec!(600.0));
        assert_eq!(prizes[1].amount, dec!(300.0));
        assert_eq!(prizes[2].amount, dec!(100.0));
        assert!(prizes.iter().all(|p| p.status == PrizeStatus::Pending));
        assert_eq!(prizes[2].id, "prize-comp-1-3");
    }

    #[test]
    fn test_fewer_participants_than_ranks() {
        let view = view(&[("solo", 9_000)]);
        let prizes =
            calculate_prizes(&view, dec!(1000), &PrizeSchedule::default()).unwrap();

        assert_eq!(prizes.len(), 1);
        assert_eq!(prizes[0].rank, 1);
        assert_eq!(prizes[0].amount, dec!(600.0));
    }

    #[test]
    fn test_empty_competition_rejected() {
        let view = view(&[]);
        let err = calculate_prizes(&view, dec!(1000), &PrizeSchedule::default())
            .unwrap_err();
        assert!(matches!(err, PrizeError::EmptyCompetition(_)));
    }

    #[test]
    fn test_schedule_validation() {
        assert!(PrizeSchedule::new(vec![]).is_err());
        assert!(PrizeSchedule::new(vec![dec!(0.5), dec!(0.6)]).is_err());
        assert!(PrizeSchedule::new(vec![dec!(0.5), dec!(-0.1)]).is_err());

        let schedule = PrizeSchedule::new(vec![dec!(0.5), dec!(0.25)]).unwrap();
        assert_eq!(schedule.paid_ranks(), 2);
        assert_eq!(schedule.percentage(2), Some(dec!(0.25)));
        assert_eq!(schedule.percentage(3), None);
    }

    #[test]
    fn test_calculation_is_deterministic() {
        let view = view(&[("a", 500), ("b", 400)]);
        let first = calculate_prizes(&view, dec!(250), &PrizeSchedule::default()).unwrap();
        let second = calculate_prizes(&view, dec!(250), &PrizeSchedule::default()).unwrap();

        assert_eq!(first.len(), second.len());
        for (x, y) in first.iter().zip(second.iter()) {
            assert_eq!(x.amount, y.amount);
            assert_eq!(x.participant, y.participant);
            assert_eq!(x.id, y.id);
        }
    }
}
