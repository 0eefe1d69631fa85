//! In-process abuse ledger.
//!
//! Authoritative store of per-source rate-limit counters, block state, and
//! IP reputation. Tables are process-local and never persisted; memory is
//! bounded by the per-IP event cap and periodic cleanup. The ledger never
//! fails an operation: unknown keys are treated as zero-state defaults.

use std::collections::VecDeque;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::warn;
use metrics::increment_counter;

use crate::core::events::SecurityEvent;
use crate::utils::now_millis;

/// Starting reputation score for a freshly observed IP.
const INITIAL_SCORE: u32 = 100;
/// Score below which an IP is called out in the logs.
const LOW_SCORE_THRESHOLD: u32 = 30;

/// Per-source fixed-window rate limit record.
///
/// `count` is only meaningful while `now < reset_time`; an elapsed entry is
/// treated as absent on the next read rather than eagerly removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Requests observed in the current window
    pub count: u32,
    /// Absolute window end, epoch millis
    pub reset_time: u64,
    /// Whether the source is currently blocked
    pub blocked: bool,
    /// Absolute block end, epoch millis
    pub block_until: Option<u64>,
}

impl RateLimitEntry {
    fn fresh(reset_time: u64) -> Self {
        Self {
            count: 1,
            reset_time,
            blocked: false,
            block_until: None,
        }
    }
}

/// Per-IP reputation aggregate.
#[derive(Debug, Clone)]
pub struct IpReputation {
    /// Trust score; starts at [`INITIAL_SCORE`], floored at zero
    pub score: u32,
    /// Bounded history of recent events, oldest first
    pub events: VecDeque<SecurityEvent>,
    /// Last activity, epoch millis
    pub last_seen: u64,
}

/// Process-wide rate-limit and reputation bookkeeping.
///
/// Backed by sharded concurrent maps; the check-then-act sequences in
/// [`check_and_increment`](AbuseLedger::check_and_increment) and
/// [`record_event`](AbuseLedger::record_event) run under the per-key entry
/// guard, so counters cannot overshoot under concurrent requests from the
/// same source.
pub struct AbuseLedger {
    rate_limits: DashMap<String, RateLimitEntry>,
    reputations: DashMap<String, IpReputation>,
    max_events_per_ip: usize,
}

impl AbuseLedger {
    pub fn new(max_events_per_ip: usize) -> Self {
        Self {
            rate_limits: DashMap::new(),
            reputations: DashMap::new(),
            max_events_per_ip,
        }
    }

    /// Fixed-window admission check.
    ///
    /// Returns `true` when the key is over limit for the active window.
    /// Otherwise increments the counter, opening a fresh window (and
    /// dropping any stale block flag) when none is active.
    pub fn check_and_increment(&self, key: &str, max: u32, window_ms: u64, now: u64) -> bool {
        match self.rate_limits.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if now < entry.reset_time {
                    if entry.count >= max {
                        return true;
                    }
                    entry.count += 1;
                } else {
                    *entry = RateLimitEntry::fresh(now + window_ms);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(RateLimitEntry::fresh(now + window_ms));
            }
        }
        false
    }

    /// Mark a key blocked until `now + duration_ms`.
    pub fn block(&self, key: &str, now: u64, duration_ms: u64) {
        let mut entry = self
            .rate_limits
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry::fresh(now));
        entry.blocked = true;
        entry.block_until = Some(now + duration_ms);
    }

    /// Remaining block time in whole seconds (rounded up), or `None` when
    /// the key is not actively blocked.
    pub fn block_remaining(&self, key: &str, now: u64) -> Option<u64> {
        let entry = self.rate_limits.get(key)?;
        if !entry.blocked {
            return None;
        }
        let until = entry.block_until?;
        if now >= until {
            return None;
        }
        Some((until - now + 999) / 1000)
    }

    /// Snapshot of a rate-limit record.
    pub fn rate_entry(&self, key: &str) -> Option<RateLimitEntry> {
        self.rate_limits.get(key).map(|e| e.value().clone())
    }

    /// Ingest a security event: log it, append it to the source's bounded
    /// history, and apply the type's fixed score deduction (floored at zero).
    /// A fresh score-100 record is created on first occurrence.
    pub fn record_event(&self, event: SecurityEvent) {
        event.log();
        increment_counter!("security_events_total", "type" => event.event_type.as_str());

        let ip = event.ip.clone();
        let now = now_millis();
        let mut reputation = self
            .reputations
            .entry(ip.clone())
            .or_insert_with(|| IpReputation {
                score: INITIAL_SCORE,
                events: VecDeque::new(),
                last_seen: now,
            });
        reputation.score = reputation.score.saturating_sub(event.event_type.deduction());
        reputation.last_seen = now;
        reputation.events.push_back(event);
        while reputation.events.len() > self.max_events_per_ip {
            reputation.events.pop_front();
        }
        let score = reputation.score;
        drop(reputation);

        if score < LOW_SCORE_THRESHOLD {
            warn!("IP {} has low reputation score: {}", ip, score);
        }
    }

    /// Reputation snapshot for an IP, if one is tracked.
    pub fn get_reputation(&self, ip: &str) -> Option<IpReputation> {
        self.reputations.get(ip).map(|r| r.value().clone())
    }

    /// Cheap opportunistic eviction of expired, non-blocked rate entries.
    /// Blocked entries are left for [`cleanup`](AbuseLedger::cleanup).
    pub fn sweep_expired(&self, now: u64) {
        self.rate_limits
            .retain(|_, entry| entry.blocked || now <= entry.reset_time);
    }

    /// Full maintenance pass: evicts rate entries whose window (or block
    /// window, if blocked) has fully elapsed, and reputations idle beyond
    /// `retention_ms`. Safe to run repeatedly; a second pass with no
    /// intervening traffic is a no-op.
    pub fn cleanup(&self, now: u64, retention_ms: u64) {
        self.rate_limits.retain(|_, entry| {
            if entry.blocked {
                entry.block_until.map_or(false, |until| now < until) || now < entry.reset_time
            } else {
                now < entry.reset_time
            }
        });
        self.reputations
            .retain(|_, rep| now.saturating_sub(rep.last_seen) <= retention_ms);
    }

    /// Number of tracked rate-limit keys.
    pub fn tracked_sources(&self) -> usize {
        self.rate_limits.len()
    }

    /// Number of tracked reputation records.
    pub fn tracked_reputations(&self) -> usize {
        self.reputations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::EventType;
    use std::sync::Arc;

    const WINDOW: u64 = 900_000;

    #[test]
    fn counter_tracks_requests_under_the_limit() {
        let ledger = AbuseLedger::new(100);
        for n in 1..=99u32 {
            assert!(!ledger.check_and_increment("general:1.2.3.4", 100, WINDOW, 1_000));
            assert_eq!(ledger.rate_entry("general:1.2.3.4").unwrap().count, n);
        }
    }

    #[test]
    fn request_over_the_limit_is_denied_without_incrementing() {
        let ledger = AbuseLedger::new(100);
        for _ in 0..3 {
            assert!(!ledger.check_and_increment("k", 3, WINDOW, 1_000));
        }
        assert!(ledger.check_and_increment("k", 3, WINDOW, 1_000));
        assert!(ledger.check_and_increment("k", 3, WINDOW, 2_000));
        assert_eq!(ledger.rate_entry("k").unwrap().count, 3);
    }

    #[test]
    fn window_expiry_opens_a_fresh_window() {
        let ledger = AbuseLedger::new(100);
        for _ in 0..3 {
            assert!(!ledger.check_and_increment("k", 3, WINDOW, 1_000));
        }
        assert!(ledger.check_and_increment("k", 3, WINDOW, 1_500));
        // boundary burst resets cheaply: fixed window, not sliding
        assert!(!ledger.check_and_increment("k", 3, WINDOW, 1_000 + WINDOW));
        let entry = ledger.rate_entry("k").unwrap();
        assert_eq!(entry.count, 1);
        assert_eq!(entry.reset_time, 1_000 + WINDOW + WINDOW);
    }

    #[test]
    fn block_remaining_decreases_and_expires() {
        let ledger = AbuseLedger::new(100);
        assert!(!ledger.check_and_increment("k", 1, WINDOW, 1_000));
        ledger.block("k", 1_000, 3_600_000);

        let first = ledger.block_remaining("k", 11_000).unwrap();
        let second = ledger.block_remaining("k", 21_000).unwrap();
        assert_eq!(first, 3590);
        assert_eq!(second, 3580);
        assert!(second < first);

        // admission resumes exactly at block_until
        assert_eq!(ledger.block_remaining("k", 3_601_000), None);
        assert!(!ledger.check_and_increment("k", 1, WINDOW, 3_601_000));
        let entry = ledger.rate_entry("k").unwrap();
        assert!(!entry.blocked);
        assert_eq!(entry.count, 1);
    }

    #[test]
    fn fresh_window_clears_stale_block_flag() {
        let ledger = AbuseLedger::new(100);
        assert!(!ledger.check_and_increment("k", 1, 1_000, 1_000));
        ledger.block("k", 1_000, 1_000);
        assert_eq!(ledger.block_remaining("k", 2_500), None);
        assert!(!ledger.check_and_increment("k", 1, 1_000, 2_500));
        assert!(!ledger.rate_entry("k").unwrap().blocked);
    }

    #[test]
    fn sweep_evicts_expired_but_keeps_blocked_entries() {
        let ledger = AbuseLedger::new(100);
        ledger.check_and_increment("stale", 10, 1_000, 1_000);
        ledger.check_and_increment("active", 10, 10_000, 1_000);
        ledger.check_and_increment("banned", 10, 1_000, 1_000);
        ledger.block("banned", 1_000, 60_000);

        ledger.sweep_expired(5_000);
        assert!(ledger.rate_entry("stale").is_none());
        assert!(ledger.rate_entry("active").is_some());
        assert!(ledger.rate_entry("banned").is_some());
    }

    #[test]
    fn cleanup_is_idempotent() {
        let ledger = AbuseLedger::new(100);
        ledger.check_and_increment("stale", 10, 1_000, 1_000);
        ledger.check_and_increment("banned", 10, 1_000, 1_000);
        ledger.block("banned", 1_000, 10_000);
        ledger.record_event(SecurityEvent::new(EventType::RateLimit, "1.2.3.4"));

        ledger.cleanup(5_000, 86_400_000);
        let sources = ledger.tracked_sources();
        let reputations = ledger.tracked_reputations();
        assert_eq!(sources, 1); // only the still-blocked entry survives

        ledger.cleanup(5_000, 86_400_000);
        assert_eq!(ledger.tracked_sources(), sources);
        assert_eq!(ledger.tracked_reputations(), reputations);
    }

    #[test]
    fn cleanup_evicts_fully_elapsed_blocks_and_idle_reputations() {
        let ledger = AbuseLedger::new(100);
        ledger.check_and_increment("banned", 10, 1_000, 1_000);
        ledger.block("banned", 1_000, 10_000);
        ledger.record_event(SecurityEvent::new(EventType::RateLimit, "1.2.3.4"));

        ledger.cleanup(12_000, 86_400_000);
        assert_eq!(ledger.tracked_sources(), 0);
        assert_eq!(ledger.tracked_reputations(), 1);

        let idle_for_a_day = now_millis() + 86_400_001;
        ledger.cleanup(idle_for_a_day, 86_400_000);
        assert_eq!(ledger.tracked_reputations(), 0);
    }

    #[test]
    fn reputation_starts_at_100_and_deducts_per_event() {
        let ledger = AbuseLedger::new(100);
        assert!(ledger.get_reputation("1.2.3.4").is_none());

        ledger.record_event(SecurityEvent::new(EventType::CaptchaFail, "1.2.3.4"));
        assert_eq!(ledger.get_reputation("1.2.3.4").unwrap().score, 75);

        ledger.record_event(SecurityEvent::new(EventType::XssAttempt, "1.2.3.4"));
        assert_eq!(ledger.get_reputation("1.2.3.4").unwrap().score, 35);
    }

    #[test]
    fn reputation_never_goes_below_zero() {
        let ledger = AbuseLedger::new(100);
        for _ in 0..10 {
            ledger.record_event(SecurityEvent::new(EventType::BlockedIp, "6.6.6.6"));
        }
        assert_eq!(ledger.get_reputation("6.6.6.6").unwrap().score, 0);
    }

    #[test]
    fn event_history_is_capped_oldest_first() {
        let ledger = AbuseLedger::new(5);
        for i in 0..8 {
            ledger.record_event(
                SecurityEvent::new(EventType::FormSpam, "1.2.3.4").with_details(format!("{i}")),
            );
        }
        let reputation = ledger.get_reputation("1.2.3.4").unwrap();
        assert_eq!(reputation.events.len(), 5);
        assert_eq!(reputation.events[0].details.as_deref(), Some("3"));
        assert_eq!(reputation.events[4].details.as_deref(), Some("7"));
    }

    #[test]
    fn scoped_keys_keep_layers_independent() {
        let ledger = AbuseLedger::new(100);
        for _ in 0..5 {
            assert!(!ledger.check_and_increment("contact:1.2.3.4", 5, WINDOW, 1_000));
        }
        assert!(ledger.check_and_increment("contact:1.2.3.4", 5, WINDOW, 1_000));
        // the general-purpose counter for the same IP is untouched
        assert!(!ledger.check_and_increment("general:1.2.3.4", 100, WINDOW, 1_000));
        assert_eq!(ledger.rate_entry("general:1.2.3.4").unwrap().count, 1);
    }

    #[test]
    fn concurrent_increments_never_overshoot() {
        let ledger = Arc::new(AbuseLedger::new(100));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    let mut admitted = 0u32;
                    for _ in 0..100 {
                        if !ledger.check_and_increment("k", 500, WINDOW, 1_000) {
                            admitted += 1;
                        }
                    }
                    admitted
                })
            })
            .collect();
        let admitted: u32 = threads.into_iter().map(|t| t.join().unwrap()).sum();

        assert_eq!(admitted, 500);
        assert_eq!(ledger.rate_entry("k").unwrap().count, 500);
    }
}
