//! Rate governor for mutating actions
//!
//! Tracks per action-kind counts in fixed hourly windows, plus one daily
//! window over every kind. The decision to permit an action is taken before
//! the network call: a [`Permit`] reserves a slot, and the slot only turns
//! into a recorded action when the caller commits it after a success.

pub mod delay;

pub use delay::{DelayRange, human_pause};

use crate::config::LimitSettings;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

const HOUR_SECS: i64 = 3_600;
const DAY_SECS: i64 = 86_400;

/// Kinds of governed actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Follow,
    Unfollow,
    Like,
    Comment,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Follow,
        ActionKind::Unfollow,
        ActionKind::Like,
        ActionKind::Comment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Follow => "follows",
            ActionKind::Unfollow => "unfollows",
            ActionKind::Like => "likes",
            ActionKind::Comment => "comments",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counter over one fixed window. Rolls over implicitly when touched with a
/// timestamp from a later window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RateWindow {
    pub window_start: i64,
    pub count: u32,
}

impl RateWindow {
    fn roll(&mut self, window_start: i64) {
        if self.window_start != window_start {
            self.window_start = window_start;
            self.count = 0;
        }
    }
}

#[derive(Debug, Default)]
struct KindState {
    window: RateWindow,
    pending: u32,
}

#[derive(Debug, Default)]
struct GovernorState {
    kinds: HashMap<ActionKind, KindState>,
    daily: RateWindow,
    daily_pending: u32,
}

/// Counters for a single action kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionStats {
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
}

/// Snapshot of the governor's counters, keyed by action kind name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GovernorStats {
    pub hour_window_start: i64,
    pub actions: BTreeMap<String, ActionStats>,
    pub daily: ActionStats,
}

/// Enforces hourly ceilings per action kind and a daily ceiling overall
#[derive(Debug)]
pub struct RateGovernor {
    limits: LimitSettings,
    state: Mutex<GovernorState>,
}

/// A reserved slot for one governed action
///
/// Dropping the permit without calling [`Permit::commit`] releases the slot
/// without counting the action.
#[derive(Debug)]
#[must_use = "a permit releases its slot when dropped"]
pub struct Permit<'a> {
    governor: &'a RateGovernor,
    kind: ActionKind,
    committed: bool,
}

impl Permit<'_> {
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Record the action as performed now
    pub fn commit(self) {
        self.commit_at(Utc::now());
    }

    /// Record the action as performed at `now`
    pub fn commit_at(mut self, now: DateTime<Utc>) {
        self.committed = true;
        let mut state = self.governor.lock();
        release(&mut state, self.kind);
        record(&mut state, self.kind, now.timestamp());
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let mut state = self.governor.lock();
            release(&mut state, self.kind);
        }
    }
}

impl RateGovernor {
    /// Create a governor with the given ceilings
    pub fn new(limits: LimitSettings) -> Self {
        Self {
            limits,
            state: Mutex::new(GovernorState::default()),
        }
    }

    /// Hourly ceiling configured for `kind`
    pub fn limit(&self, kind: ActionKind) -> u32 {
        match kind {
            ActionKind::Follow => self.limits.follows,
            ActionKind::Unfollow => self.limits.unfollows,
            ActionKind::Like => self.limits.likes,
            ActionKind::Comment => self.limits.comments,
        }
    }

    /// Whether one more `kind` action is permitted right now
    pub fn can_perform(&self, kind: ActionKind) -> bool {
        self.can_perform_at(kind, Utc::now())
    }

    /// Whether one more `kind` action is permitted at `now` (without reserving it)
    pub fn can_perform_at(&self, kind: ActionKind, now: DateTime<Utc>) -> bool {
        let mut state = self.lock();
        self.has_room(&mut state, kind, now.timestamp())
    }

    /// Reserve a slot for a `kind` action, or `None` when a ceiling is reached
    pub fn try_acquire(&self, kind: ActionKind) -> Option<Permit<'_>> {
        self.try_acquire_at(kind, Utc::now())
    }

    /// Reserve a slot for a `kind` action at `now`
    pub fn try_acquire_at(&self, kind: ActionKind, now: DateTime<Utc>) -> Option<Permit<'_>> {
        let mut state = self.lock();
        if !self.has_room(&mut state, kind, now.timestamp()) {
            tracing::info!("Hourly or daily ceiling reached for {}", kind);
            return None;
        }
        state.kinds.entry(kind).or_default().pending += 1;
        state.daily_pending += 1;
        Some(Permit {
            governor: self,
            kind,
            committed: false,
        })
    }

    /// Record an action directly, bypassing reservation
    pub fn record_action(&self, kind: ActionKind) {
        self.record_action_at(kind, Utc::now());
    }

    pub fn record_action_at(&self, kind: ActionKind, now: DateTime<Utc>) {
        let mut state = self.lock();
        record(&mut state, kind, now.timestamp());
    }

    /// Counters for the current hour and day
    pub fn get_stats(&self) -> GovernorStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> GovernorStats {
        let ts = now.timestamp();
        let hour = window_start(ts, HOUR_SECS);
        let day = window_start(ts, DAY_SECS);
        let state = self.lock();

        let actions = ActionKind::ALL
            .iter()
            .map(|kind| {
                let count = state
                    .kinds
                    .get(kind)
                    .filter(|k| k.window.window_start == hour)
                    .map(|k| k.window.count)
                    .unwrap_or(0);
                let limit = self.limit(*kind);
                (
                    kind.as_str().to_string(),
                    ActionStats {
                        count,
                        limit,
                        remaining: limit.saturating_sub(count),
                    },
                )
            })
            .collect();

        let daily_count = if state.daily.window_start == day {
            state.daily.count
        } else {
            0
        };

        GovernorStats {
            hour_window_start: hour,
            actions,
            daily: ActionStats {
                count: daily_count,
                limit: self.limits.daily_actions,
                remaining: self.limits.daily_actions.saturating_sub(daily_count),
            },
        }
    }

    fn has_room(&self, state: &mut GovernorState, kind: ActionKind, ts: i64) -> bool {
        let hour = window_start(ts, HOUR_SECS);
        let day = window_start(ts, DAY_SECS);

        state.daily.roll(day);
        let kind_state = state.kinds.entry(kind).or_default();
        kind_state.window.roll(hour);

        let hourly_used = kind_state.window.count + kind_state.pending;
        let daily_used = state.daily.count + state.daily_pending;
        hourly_used < self.limit(kind) && daily_used < self.limits.daily_actions
    }

    fn lock(&self) -> MutexGuard<'_, GovernorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Floor a unix timestamp to the start of its window
fn window_start(timestamp: i64, width: i64) -> i64 {
    timestamp.div_euclid(width) * width
}

fn release(state: &mut GovernorState, kind: ActionKind) {
    if let Some(k) = state.kinds.get_mut(&kind) {
        k.pending = k.pending.saturating_sub(1);
    }
    state.daily_pending = state.daily_pending.saturating_sub(1);
}

fn record(state: &mut GovernorState, kind: ActionKind, ts: i64) {
    let kind_state = state.kinds.entry(kind).or_default();
    kind_state.window.roll(window_start(ts, HOUR_SECS));
    kind_state.window.count += 1;

    state.daily.roll(window_start(ts, DAY_SECS));
    state.daily.count += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn limits(follows: u32) -> LimitSettings {
        LimitSettings {
            follows,
            unfollows: 5,
            likes: 5,
            comments: 5,
            daily_actions: 400,
        }
    }

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    #[test]
    fn test_allows_actions_under_limit() {
        let governor = RateGovernor::new(limits(3));
        let now = at(1_000_000);

        for i in 0..3 {
            let permit = governor.try_acquire_at(ActionKind::Follow, now);
            assert!(permit.is_some(), "follow {} should be permitted", i + 1);
            permit.unwrap().commit_at(now);
        }

        assert!(governor.try_acquire_at(ActionKind::Follow, now).is_none());
        assert_eq!(governor.stats_at(now).actions["follows"].count, 3);
    }

    #[test]
    fn test_count_never_exceeds_ceiling() {
        let governor = RateGovernor::new(limits(20));
        let now = at(7_200);

        for _ in 0..50 {
            if let Some(permit) = governor.try_acquire_at(ActionKind::Follow, now) {
                permit.commit_at(now);
            }
        }

        let stats = governor.stats_at(now);
        assert_eq!(stats.actions["follows"].count, 20);
        assert_eq!(stats.actions["follows"].remaining, 0);
    }

    #[test]
    fn test_window_rolls_over() {
        let governor = RateGovernor::new(limits(2));
        let first = at(1_000_000);

        for _ in 0..2 {
            governor.record_action_at(ActionKind::Follow, first);
        }
        assert!(!governor.can_perform_at(ActionKind::Follow, at(1_000_100)));

        let next_hour = at(1_000_000 + 3_600);
        assert!(governor.can_perform_at(ActionKind::Follow, next_hour));
        assert_eq!(governor.stats_at(next_hour).actions["follows"].count, 0);
    }

    #[test]
    fn test_kinds_are_independent() {
        let governor = RateGovernor::new(limits(1));
        let now = at(1_000_000);

        governor.record_action_at(ActionKind::Follow, now);
        assert!(!governor.can_perform_at(ActionKind::Follow, now));
        assert!(governor.can_perform_at(ActionKind::Like, now));
    }

    #[test]
    fn test_dropped_permit_releases_slot() {
        let governor = RateGovernor::new(limits(1));
        let now = at(1_000_000);

        {
            let _permit = governor.try_acquire_at(ActionKind::Follow, now).unwrap();
            assert!(governor.try_acquire_at(ActionKind::Follow, now).is_none());
        }

        assert!(governor.try_acquire_at(ActionKind::Follow, now).is_some());
        assert_eq!(governor.stats_at(now).actions["follows"].count, 0);
    }

    #[test]
    fn test_daily_ceiling_spans_kinds() {
        let mut l = limits(10);
        l.daily_actions = 3;
        let governor = RateGovernor::new(l);
        let now = at(1_000_000);

        governor.record_action_at(ActionKind::Follow, now);
        governor.record_action_at(ActionKind::Like, now);
        governor.record_action_at(ActionKind::Comment, now);

        assert!(!governor.can_perform_at(ActionKind::Unfollow, now));
        assert_eq!(governor.stats_at(now).daily.remaining, 0);

        let tomorrow = at(1_000_000 + 86_400);
        assert!(governor.can_perform_at(ActionKind::Unfollow, tomorrow));
    }

    #[test]
    fn test_stats_serialize_by_kind_name() {
        let governor = RateGovernor::new(limits(20));
        let json = serde_json::to_value(governor.stats_at(at(0))).unwrap();
        assert_eq!(json["actions"]["follows"]["limit"], 20);
        assert_eq!(json["actions"]["comments"]["remaining"], 5);
    }
}
