
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use std::sync::Arc;

    fn window() -> chrono::Duration {
        chrono::Duration::days(QUOTA_WINDOW_DAYS)
    }

    fn ledger() -> (QuotaLedger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (QuotaLedger::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_plan_limits() {
        assert_eq!(Plan::Free.limit(), 2);
        assert_eq!(Plan::Pro.limit(), 15);
        assert_eq!(Plan::Enterprise.limit(), 50);
    }

    #[test]
    fn test_plan_parse() {
        assert_eq!(Plan::parse("pro"), Plan::Pro);
        assert_eq!(Plan::parse("Enterprise"), Plan::Enterprise);
        assert_eq!(Plan::parse("FREE"), Plan::Free);
        assert_eq!(Plan::parse("platinum"), Plan::Free);
        assert_eq!(Plan::parse(""), Plan::Free);
        assert_eq!(Plan::default(), Plan::Free);
    }

    #[test]
    fn test_free_plan_third_call_denied() {
        let (ledger, clock) = ledger();
        let start = clock.now();

        let first = ledger.consume("user-a", Plan::Free);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert_eq!(first.reset_at, start + window());

        let second = ledger.consume("user-a", Plan::Free);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = ledger.consume("user-a", Plan::Free);
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
        assert_eq!(third.reset_at, first.reset_at);
        assert_eq!(third.limit, 2);
    }

    #[test]
    fn test_pro_plan_allows_fifteen() {
        let (ledger, _clock) = ledger();

        for i in 1..=15 {
            let decision = ledger.consume("user-p", Plan::Pro);
            assert!(decision.allowed, "call {} should be allowed", i);
            assert_eq!(decision.remaining, 15 - i);
        }
        assert!(!ledger.consume("user-p", Plan::Pro).allowed);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let (ledger, clock) = ledger();
        ledger.consume("user-a", Plan::Free);
        ledger.consume("user-a", Plan::Free);
        assert!(!ledger.consume("user-a", Plan::Free).allowed);

        clock.advance(chrono::Duration::days(29));
        assert!(!ledger.consume("user-a", Plan::Free).allowed);

        clock.advance(chrono::Duration::days(1));
        let fresh = ledger.consume("user-a", Plan::Free);
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 1);
        assert_eq!(fresh.reset_at, clock.now() + window());
    }

    #[test]
    fn test_keys_are_isolated() {
        let (ledger, _clock) = ledger();
        ledger.consume("user-a", Plan::Free);
        ledger.consume("user-a", Plan::Free);

        assert!(!ledger.consume("user-a", Plan::Free).allowed);
        assert!(ledger.consume("user-b", Plan::Free).allowed);
        assert!(ledger.consume("10.0.0.1", Plan::Free).allowed);
    }

    #[test]
    fn test_denied_calls_do_not_extend_window() {
        let (ledger, clock) = ledger();
        let first = ledger.consume("k", Plan::Free);
        ledger.consume("k", Plan::Free);

        clock.advance(chrono::Duration::days(10));
        let denied = ledger.consume("k", Plan::Free);
        assert!(!denied.allowed);
        assert_eq!(denied.reset_at, first.reset_at);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let (ledger, _clock) = ledger();

        let untouched = ledger.peek("user-a", Plan::Free);
        assert!(untouched.allowed);
        assert_eq!(untouched.remaining, 2);
        assert!(ledger.is_empty());

        ledger.consume("user-a", Plan::Free);
        let after_one = ledger.peek("user-a", Plan::Free);
        assert_eq!(after_one.remaining, 1);
        assert_eq!(ledger.peek("user-a", Plan::Free), after_one);

        ledger.consume("user-a", Plan::Free);
        let exhausted = ledger.peek("user-a", Plan::Free);
        assert!(!exhausted.allowed);
        assert_eq!(exhausted.remaining, 0);
    }

    #[test]
    fn test_compact_drops_only_expired() {
        let (ledger, clock) = ledger();
        ledger.consume("old", Plan::Free);
        clock.advance(chrono::Duration::days(20));
        ledger.consume("recent", Plan::Free);
        clock.advance(chrono::Duration::days(10));

        assert_eq!(ledger.compact(), 1);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.peek("recent", Plan::Free).remaining, 1);
        assert_eq!(ledger.compact(), 0);
    }

    #[test]
    fn test_concurrent_consume_counts_exactly() {
        let ledger = Arc::new(QuotaLedger::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    (0..20)
                        .filter(|_| ledger.consume("shared", Plan::Enterprise).allowed)
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }

    #[test]
    fn test_decision_serializes_camel_case() {
        let (ledger, _clock) = ledger();
        let json = serde_json::to_value(ledger.consume("k", Plan::Pro)).unwrap();
        assert_eq!(json["allowed"], true);
        assert_eq!(json["remaining"], 14);
        assert_eq!(json["limit"], 15);
        assert!(json["resetAt"].is_string());
    }
