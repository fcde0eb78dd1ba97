//! StrideArena Notify - Leaderboard Change Broadcasting
//!
//! This crate fans leaderboard change events out to the live viewers of a
//! competition. Each competition has its own subscriber channel; publishing
//! is fire-and-forget with no replay, so a viewer connecting after an event
//! never receives it.
//!
//! # Features
//!
//! - **Per-Competition Channels**: subscribers are registered per
//!   competition, and unrelated competitions never contend on a shared lock
//! - **Fire-and-Forget Publish**: a broadcast failure is logged and pruned,
//!   never surfaced to the writer
//! - **Clean Disconnects**: a subscriber whose receiver is gone is removed
//!   without stalling delivery to the rest of the channel
//!
//! # Example
//!
//! ```ignore
//! use stridearena_notify::ChangeNotifier;
//!
//! let notifier = ChangeNotifier::new();
//! let subscription = notifier.subscribe(&competition);
//!
//! while let Ok(event) = subscription.events.recv_async().await {
//!     // forward to the viewer's transport
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use stridearena_types::{CompetitionId, ScoreEvent};

// ============================================================================
// Subscriptions
// ============================================================================

/// Handle identifying one subscriber within a competition channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

/// A live subscription to one competition's events.
///
/// Dropping the receiver is enough to detach: the subscriber is pruned on
/// the next publish. Callers that can, should still `unsubscribe` for
/// immediate removal.
pub struct Subscription {
    /// Registry handle for explicit removal
    pub id: SubscriberId,
    /// Event stream for this subscriber
    pub events: flume::Receiver<ScoreEvent>,
}

struct Subscriber {
    id: SubscriberId,
    tx: flume::Sender<ScoreEvent>,
}

// ============================================================================
// Change Notifier
// ============================================================================

/// Per-competition event broadcaster.
///
/// The registry is a DashMap keyed by competition, so add/remove/publish
/// for one competition only takes that key's shard lock.
pub struct ChangeNotifier {
    channels: DashMap<CompetitionId, Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    /// Create a notifier with no subscribers
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber for a competition's events
    pub fn subscribe(&self, competition: &CompetitionId) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = flume::unbounded();

        self.channels
            .entry(competition.clone())
            .or_default()
            .push(Subscriber { id, tx });

        debug!(%competition, subscriber = id.0, "subscriber joined");
        Subscription { id, events: rx }
    }

    /// Remove a subscriber from a competition's channel.
    ///
    /// Unknown ids are ignored; the channel entry is dropped once empty so
    /// finished competitions do not leak registry slots.
    pub fn unsubscribe(&self, competition: &CompetitionId, id: SubscriberId) {
        if let Some(mut subscribers) = self.channels.get_mut(competition) {
            subscribers.retain(|sub| sub.id != id);
            if subscribers.is_empty() {
                drop(subscribers);
                self.channels.remove_if(competition, |_, subs| subs.is_empty());
            }
        }
        debug!(%competition, subscriber = id.0, "subscriber left");
    }

    /// Broadcast an event to the competition's current subscribers.
    ///
    /// Never blocks and never fails the caller: subscribers whose receiver
    /// is gone are pruned in the same pass. Returns how many subscribers
    /// the event was delivered to.
    pub fn publish(&self, competition: &CompetitionId, event: ScoreEvent) -> usize {
        let Some(mut subscribers) = self.channels.get_mut(competition) else {
            return 0;
        };

        let before = subscribers.len();
        subscribers.retain(|sub| sub.tx.try_send(event.clone()).is_ok());
        let delivered = subscribers.len();

        if delivered < before {
            debug!(
                %competition,
                pruned = before - delivered,
                "dropped disconnected subscribers"
            );
        }
        delivered
    }

    /// Current subscriber count for a competition
    pub fn subscriber_count(&self, competition: &CompetitionId) -> usize {
        self.channels
            .get(competition)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stridearena_types::ParticipantId;

    fn comp(id: &str) -> CompetitionId {
        CompetitionId::new(id)
    }

    fn event(competition: &CompetitionId, score: u64) -> ScoreEvent {
        ScoreEvent::ScoreUpdate {
            competition_id: competition.clone(),
            participant_id: ParticipantId::new("user-1"),
            score,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let notifier = ChangeNotifier::new();
        let competition = comp("comp-1");

        let sub_a = notifier.subscribe(&competition);
        let sub_b = notifier.subscribe(&competition);

        let delivered = notifier.publish(&competition, event(&competition, 100));
        assert_eq!(delivered, 2);
        assert!(sub_a.events.try_recv().is_ok());
        assert!(sub_b.events.try_recv().is_ok());
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let notifier = ChangeNotifier::new();
        let competition = comp("comp-1");

        notifier.publish(&competition, event(&competition, 100));

        let late = notifier.subscribe(&competition);
        assert!(late.events.try_recv().is_err());
    }

    #[test]
    fn test_channels_are_per_competition() {
        let notifier = ChangeNotifier::new();
        let comp_a = comp("comp-a");
        let comp_b = comp("comp-b");

        let sub_a = notifier.subscribe(&comp_a);
        let sub_b = notifier.subscribe(&comp_b);

        notifier.publish(&comp_a, event(&comp_a, 100));

        assert!(sub_a.events.try_recv().is_ok());
        assert!(sub_b.events.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_subscriber_pruned_without_stall() {
        let notifier = ChangeNotifier::new();
        let competition = comp("comp-1");

        let dropped = notifier.subscribe(&competition);
        let kept = notifier.subscribe(&competition);
        drop(dropped.events);

        let delivered = notifier.publish(&competition, event(&competition, 100));
        assert_eq!(delivered, 1);
        assert!(kept.events.try_recv().is_ok());
        assert_eq!(notifier.subscriber_count(&competition), 1);
    }

    #[test]
    fn test_unsubscribe_removes_membership() {
        let notifier = ChangeNotifier::new();
        let competition = comp("comp-1");

        let sub = notifier.subscribe(&competition);
        assert_eq!(notifier.subscriber_count(&competition), 1);

        notifier.unsubscribe(&competition, sub.id);
        assert_eq!(notifier.subscriber_count(&competition), 0);
        assert_eq!(notifier.publish(&competition, event(&competition, 1)), 0);
    }
}
