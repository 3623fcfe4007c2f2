//! Property-based tests for auto-resolution and availability.
//!
//! Properties:
//! - The priority strategy always favours the strictly higher priority and
//!   defers exact ties.
//! - Free slots never intersect a reservation and stay inside the range.

use chrono::{DateTime, Duration, TimeZone, Utc};
use coordination_core::types::{
    AutoResolveStrategy, Channel, ConflictResolution, DateRange, NewCampaign, Reservation,
    ReservationStatus, ReservationType, ReserveOptions,
};
use coordination_engine::availability::compute_slots;
use coordination_engine::{Coordinator, FixedClock, InMemoryStore};
use proptest::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn hours(h: i64) -> DateTime<Utc> {
    epoch() + Duration::hours(h)
}

fn held(from: i64, len: i64) -> Reservation {
    Reservation {
        id: Uuid::new_v4(),
        campaign_id: Uuid::new_v4(),
        hcp_id: "HCP-1".to_string(),
        channel: Channel::Email,
        reservation_type: ReservationType::Priority,
        priority: 50,
        reserved_from: hours(from),
        reserved_until: hours(from + len),
        planned_action_date: None,
        can_preempt: true,
        status: ReservationStatus::Active,
        preempted_by: None,
        executed_at: None,
        created_at: epoch(),
        updated_at: epoch(),
    }
}

// ============================================================================
// ARBITRATORS
// ============================================================================

fn arb_reservations() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec((0i64..200, 1i64..48), 0..8)
}

proptest! {
    #[test]
    fn prop_priority_strategy_favours_higher(p1 in 0i32..100, p2 in 0i32..100) {
        let clock = Arc::new(FixedClock::new(epoch()));
        let coord = Coordinator::with_clock(Arc::new(InMemoryStore::new()), clock);
        let first = coord.create_campaign(NewCampaign::new("First", p1)).unwrap();
        let second = coord.create_campaign(NewCampaign::new("Second", p2)).unwrap();
        coord
            .reserve_hcp(first.id, "HCP-1", Channel::Email, hours(0), hours(10), ReserveOptions::default())
            .unwrap();
        coord
            .reserve_hcp(second.id, "HCP-1", Channel::Email, hours(5), hours(15), ReserveOptions::default())
            .unwrap();

        let report = coord.auto_resolve_conflicts(None, AutoResolveStrategy::Priority).unwrap();
        prop_assert_eq!(report.total, 1);
        let expected = if p1 > p2 {
            ConflictResolution::Campaign1Wins
        } else if p1 < p2 {
            ConflictResolution::Campaign2Wins
        } else {
            ConflictResolution::Deferred
        };
        prop_assert_eq!(report.actions[0].resolution, expected);
        prop_assert_eq!(report.resolved, usize::from(p1 != p2));
    }

    #[test]
    fn prop_free_slots_avoid_reservations(spans in arb_reservations()) {
        let range = DateRange::new(hours(24), hours(168));
        let mut reservations: Vec<Reservation> = spans
            .iter()
            .map(|(from, len)| held(*from, *len))
            .filter(|r| r.reserved_from < range.end && r.reserved_until > range.start)
            .collect();
        reservations.sort_by(|a, b| a.reserved_from.cmp(&b.reserved_from));

        let slots = compute_slots(range, &reservations);
        if reservations.is_empty() {
            prop_assert_eq!(slots.len(), 1);
            prop_assert!(slots[0].available);
        }
        for slot in slots.iter().filter(|s| s.available) {
            prop_assert!(slot.start < slot.end);
            prop_assert!(slot.start >= range.start && slot.end <= range.end);
            for r in &reservations {
                prop_assert!(slot.end <= r.reserved_from || slot.start >= r.reserved_until);
            }
        }
        prop_assert_eq!(
            slots.iter().filter(|s| !s.available).count(),
            reservations.len()
        );
    }
}
