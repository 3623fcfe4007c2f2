//! End-to-end coordination scenarios against the in-memory store.

use chrono::{DateTime, Duration, TimeZone, Utc};
use coordination_core::types::{
    AutoResolveStrategy, Channel, ConflictResolution, ConflictSeverity, DateRange, NewCampaign,
    ReservationStatus, ReserveOptions,
};
use coordination_engine::{Coordinator, FixedClock, InMemoryStore};
use std::sync::Arc;

fn day(d: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::days(d)
}

fn setup() -> (Coordinator, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(day(0)));
    let coord = Coordinator::with_clock(Arc::new(InMemoryStore::new()), clock.clone());
    (coord, clock)
}

#[test]
fn test_contention_preemption_resolution_and_expiry() {
    let (coord, clock) = setup();
    let a = coord.create_campaign(NewCampaign::new("Campaign A", 80)).unwrap();
    let b = coord.create_campaign(NewCampaign::new("Campaign B", 50)).unwrap();
    let c = coord.create_campaign(NewCampaign::new("Campaign C", 90)).unwrap();

    // A holds HCP-1/email for days 1-5 and does not yield to peers.
    let held = coord
        .reserve_hcp(a.id, "HCP-1", Channel::Email, day(1), day(5), ReserveOptions::non_preemptible())
        .unwrap();
    assert!(held.success);
    let a_reservation = held.reservation.unwrap();

    // B is outranked and blocked; the collision is logged.
    let blocked = coord
        .reserve_hcp(b.id, "HCP-1", Channel::Email, day(3), day(4), ReserveOptions::default())
        .unwrap();
    assert!(!blocked.success);
    assert!(blocked.reservation.is_none());
    assert_eq!(blocked.conflicts.len(), 1);
    // A 30-point gap sits at the top of the medium band.
    assert_eq!(blocked.conflicts[0].severity, ConflictSeverity::Medium);
    let b_conflicts = coord.list_unresolved_conflicts(Some(b.id)).unwrap();
    assert_eq!(b_conflicts.len(), 1);
    assert_eq!(b_conflicts[0].conflict.reservation2_id, None);

    // C outranks A and is admitted; the overlap is logged for later.
    let admitted = coord
        .reserve_hcp(c.id, "HCP-1", Channel::Email, day(3), day(4), ReserveOptions::default())
        .unwrap();
    assert!(admitted.success);
    let c_reservation = admitted.reservation.unwrap();
    let pending = coord.list_unresolved_conflicts(Some(c.id)).unwrap();
    assert_eq!(pending.len(), 1);
    let a_vs_c = &pending[0].conflict;
    assert_eq!(a_vs_c.campaign1_id, a.id);
    assert_eq!(a_vs_c.campaign2_id, c.id);
    assert_eq!(a_vs_c.severity, ConflictSeverity::High);
    assert_eq!(a_vs_c.reservation2_id, Some(c_reservation.id));

    // Priority strategy favours C and releases A's reservation.
    let report = coord
        .auto_resolve_conflicts(Some(c.id), AutoResolveStrategy::Priority)
        .unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(report.resolved, 1);
    assert_eq!(report.actions[0].resolution, ConflictResolution::Campaign2Wins);
    assert_eq!(report.actions[0].affected_reservations, vec![a_reservation.id]);
    assert_eq!(
        coord.get_reservation(a_reservation.id).unwrap().status,
        ReservationStatus::Released
    );
    let stamped = coord.get_conflict(a_vs_c.id).unwrap();
    assert!(stamped.auto_resolved);
    assert_eq!(stamped.resolution, Some(ConflictResolution::Campaign2Wins));

    // Past day 5 the sweep expires whatever is still active, exactly once.
    clock.set(day(6));
    assert_eq!(coord.expire_stale_reservations().unwrap(), 1);
    assert_eq!(
        coord.get_reservation(c_reservation.id).unwrap().status,
        ReservationStatus::Expired
    );
    assert_eq!(
        coord.get_reservation(a_reservation.id).unwrap().status,
        ReservationStatus::Released
    );
    assert_eq!(coord.expire_stale_reservations().unwrap(), 0);
}

#[test]
fn test_exclusive_reservation_blocks_higher_priority() {
    let (coord, _) = setup();
    let low = coord.create_campaign(NewCampaign::new("Low", 10)).unwrap();
    let high = coord.create_campaign(NewCampaign::new("High", 99)).unwrap();
    coord
        .reserve_hcp(low.id, "HCP-9", Channel::RepVisit, day(1), day(2), ReserveOptions::exclusive())
        .unwrap();

    let result = coord
        .reserve_hcp(high.id, "HCP-9", Channel::RepVisit, day(1), day(2), ReserveOptions::default())
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.conflicts[0].severity, ConflictSeverity::Low);
}

#[test]
fn test_preemptible_reservation_admits_lower_priority_overlap() {
    // The admission rule lets anyone through a preemptible reservation,
    // leaving two overlapping active claims until someone resolves them.
    let (coord, _) = setup();
    let high = coord.create_campaign(NewCampaign::new("High", 90)).unwrap();
    let low = coord.create_campaign(NewCampaign::new("Low", 10)).unwrap();
    let first = coord
        .reserve_hcp(high.id, "HCP-1", Channel::Email, day(1), day(5), ReserveOptions::default())
        .unwrap();
    let second = coord
        .reserve_hcp(low.id, "HCP-1", Channel::Email, day(2), day(3), ReserveOptions::default())
        .unwrap();

    assert!(first.success);
    assert!(second.success);
    assert_eq!(second.conflicts.len(), 1);
    let overlaps = coord
        .detect_hcp_conflicts("HCP-1", DateRange::new(day(0), day(10)))
        .unwrap();
    assert_eq!(overlaps.len(), 1);
    assert_eq!(coord.list_unresolved_conflicts(None).unwrap().len(), 1);
}

#[test]
fn test_preempt_then_reserve_vacated_slot() {
    let (coord, _) = setup();
    let holder = coord.create_campaign(NewCampaign::new("Holder", 40)).unwrap();
    let challenger = coord.create_campaign(NewCampaign::new("Challenger", 70)).unwrap();
    let held = coord
        .reserve_hcp(holder.id, "HCP-5", Channel::Webinar, day(1), day(2), ReserveOptions::default())
        .unwrap()
        .reservation
        .unwrap();

    coord.preempt(challenger.id, held.id).unwrap();
    let slots = coord
        .get_available_slots("HCP-5", Channel::Webinar, DateRange::new(day(1), day(2)), None)
        .unwrap();
    assert_eq!(slots.slots.len(), 1);
    assert!(slots.available);

    let claimed = coord
        .reserve_hcp(challenger.id, "HCP-5", Channel::Webinar, day(1), day(2), ReserveOptions::default())
        .unwrap();
    assert!(claimed.success);
    assert!(claimed.conflicts.is_empty());
}

#[test]
fn test_detect_campaign_conflicts_reports_only_contested_reservations() {
    let (coord, _) = setup();
    let a = coord.create_campaign(NewCampaign::new("A", 50)).unwrap();
    let b = coord.create_campaign(NewCampaign::new("B", 60)).unwrap();
    coord
        .reserve_hcp(a.id, "HCP-1", Channel::Email, day(1), day(3), ReserveOptions::default())
        .unwrap();
    coord
        .reserve_hcp(a.id, "HCP-2", Channel::Email, day(1), day(3), ReserveOptions::default())
        .unwrap();
    coord
        .reserve_hcp(b.id, "HCP-1", Channel::Email, day(2), day(4), ReserveOptions::default())
        .unwrap();

    let found = coord.detect_campaign_conflicts(a.id).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].hcp_id, "HCP-1");
    assert_eq!(found[0].check.conflicts[0].existing_campaign_id, b.id);
    // B's reservation is preemptible, so A's claim would still be admitted.
    assert!(found[0].check.can_proceed);
}

#[test]
fn test_activation_gate_follows_conflict_count() {
    let (coord, _) = setup();
    let a = coord.create_campaign(NewCampaign::new("A", 50)).unwrap();
    let b = coord.create_campaign(NewCampaign::new("B", 50)).unwrap();
    coord
        .reserve_hcp(a.id, "HCP-1", Channel::Sms, day(1), day(2), ReserveOptions::default())
        .unwrap();
    coord
        .reserve_hcp(b.id, "HCP-1", Channel::Sms, day(1), day(2), ReserveOptions::default())
        .unwrap();

    assert!(coord.activate_campaign(a.id).unwrap_err().is_invalid_state());
    let conflict = coord.list_conflicts(Some(a.id)).unwrap().remove(0);
    coord
        .resolve_conflict(conflict.id, ConflictResolution::Merged, "planner", Some("shared slot".into()))
        .unwrap();
    coord.activate_campaign(a.id).unwrap();
    coord.activate_campaign(b.id).unwrap();
}

#[test]
fn test_concurrent_reservations_never_double_book() {
    let (coord, _) = setup();
    let campaigns: Vec<_> = (0..8)
        .map(|i| coord.create_campaign(NewCampaign::new(format!("C{i}"), 50)).unwrap())
        .collect();

    let results: Vec<bool> = std::thread::scope(|scope| {
        let handles: Vec<_> = campaigns
            .iter()
            .map(|campaign| {
                let coord = coord.clone();
                let id = campaign.id;
                scope.spawn(move || {
                    coord
                        .reserve_hcp(id, "HCP-1", Channel::Email, day(1), day(3), ReserveOptions::non_preemptible())
                        .unwrap()
                        .success
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
    let overlaps = coord
        .detect_hcp_conflicts("HCP-1", DateRange::new(day(0), day(5)))
        .unwrap();
    assert!(overlaps.is_empty());
}

#[test]
fn test_extension_racing_expiry_keeps_one_outcome() {
    let (coord, clock) = setup();
    let a = coord.create_campaign(NewCampaign::new("A", 50)).unwrap();
    let r = coord
        .reserve_hcp(a.id, "HCP-1", Channel::Email, day(1), day(2), ReserveOptions::default())
        .unwrap()
        .reservation
        .unwrap();

    coord.extend_reservation(r.id, day(4)).unwrap();
    clock.set(day(3));
    assert_eq!(coord.expire_stale_reservations().unwrap(), 0);
    assert!(coord.get_reservation(r.id).unwrap().is_active());

    clock.set(day(4));
    assert_eq!(coord.expire_stale_reservations().unwrap(), 1);
    assert!(coord.extend_reservation(r.id, day(6)).unwrap_err().is_invalid_state());
}

#[test]
fn test_hcp_audit_pairs_only_matching_channels() {
    let (coord, _) = setup();
    let a = coord.create_campaign(NewCampaign::new("A", 50)).unwrap();
    let b = coord.create_campaign(NewCampaign::new("B", 60)).unwrap();
    let email = coord
        .reserve_hcp(a.id, "HCP-7", Channel::Email, day(1), day(4), ReserveOptions::default())
        .unwrap()
        .reservation
        .unwrap();
    coord
        .reserve_hcp(b.id, "HCP-7", Channel::Webinar, day(2), day(3), ReserveOptions::default())
        .unwrap();

    let audit = coord
        .detect_hcp_conflicts("HCP-7", DateRange::new(day(0), day(5)))
        .unwrap();
    assert!(audit.is_empty());

    let same_channel = coord
        .reserve_hcp(b.id, "HCP-7", Channel::Email, day(3), day(5), ReserveOptions::default())
        .unwrap()
        .reservation
        .unwrap();
    let audit = coord
        .detect_hcp_conflicts("HCP-7", DateRange::new(day(0), day(5)))
        .unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].channel, Channel::Email);
    assert_eq!(audit[0].reservation1.id, email.id);
    assert_eq!(audit[0].reservation2.id, same_channel.id);
}
