//! Conflict detection: interval overlap between reservations on the same
//! HCP and channel, plus the priority/preemption admission rule.

use crate::coordinator::Coordinator;
use chrono::{DateTime, Utc};
use coordination_core::results::{ConflictCheck, DetectedConflict, HcpConflict, ReservationConflicts};
use coordination_core::types::{Campaign, Channel, ConflictSeverity, DateRange, Reservation, ReservationType};
use coordination_core::CoordinationResult;
use tracing::debug;
use uuid::Uuid;

/// Priority gaps above this are easy to arbitrate.
const LOW_SEVERITY_GAP: u32 = 30;
const MEDIUM_SEVERITY_GAP: u32 = 10;

/// Small priority gaps are harder to arbitrate and rank as more severe.
pub fn severity_for(priority1: i32, priority2: i32) -> ConflictSeverity {
    let gap = priority1.abs_diff(priority2);
    if gap > LOW_SEVERITY_GAP {
        ConflictSeverity::Low
    } else if gap > MEDIUM_SEVERITY_GAP {
        ConflictSeverity::Medium
    } else {
        ConflictSeverity::High
    }
}

/// Whether a requester at `requesting_priority` may coexist with `existing`.
///
/// Exclusive reservations always block. Otherwise a strictly higher priority
/// wins, and a preemptible reservation admits any requester.
pub fn admits(existing: &Reservation, requesting_priority: i32) -> bool {
    if existing.reservation_type == ReservationType::Exclusive {
        return false;
    }
    requesting_priority > existing.priority || existing.can_preempt
}

/// Build the conflict check for `requester` against already-loaded overlaps.
/// Reservations owned by the requester are ignored.
pub fn evaluate(
    requester: &Campaign,
    hcp_id: &str,
    channel: Channel,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
    overlapping: &[Reservation],
) -> ConflictCheck {
    let mut can_proceed = true;
    let conflicts: Vec<DetectedConflict> = overlapping
        .iter()
        .filter(|existing| existing.campaign_id != requester.id)
        .map(|existing| {
            can_proceed &= admits(existing, requester.priority);
            DetectedConflict {
                hcp_id: hcp_id.to_string(),
                channel,
                existing_reservation_id: existing.id,
                existing_campaign_id: existing.campaign_id,
                existing_priority: existing.priority,
                existing_type: existing.reservation_type,
                existing_can_preempt: existing.can_preempt,
                requesting_campaign_id: requester.id,
                requesting_priority: requester.priority,
                overlap_start: existing.reserved_from.max(from),
                overlap_end: existing.reserved_until.min(until),
                severity: severity_for(existing.priority, requester.priority),
            }
        })
        .collect();

    ConflictCheck {
        has_conflicts: !conflicts.is_empty(),
        can_proceed,
        conflicts,
    }
}

impl Coordinator {
    /// Check a prospective `[from, until)` claim on `(hcp_id, channel)` by
    /// `requesting_campaign_id` against every other active reservation.
    pub fn detect_reservation_conflicts(
        &self,
        hcp_id: &str,
        channel: Channel,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        requesting_campaign_id: Uuid,
    ) -> CoordinationResult<ConflictCheck> {
        let requester = self.require_campaign(requesting_campaign_id)?;
        self.check_slot(&requester, hcp_id, channel, from, until)
    }

    /// Load overlaps from the store and evaluate them. Callers that go on to
    /// write must hold the slot lock.
    pub(crate) fn check_slot(
        &self,
        requester: &Campaign,
        hcp_id: &str,
        channel: Channel,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> CoordinationResult<ConflictCheck> {
        let overlapping = self
            .store
            .reservation_find_overlapping(hcp_id, channel, from, until)?;
        let check = evaluate(requester, hcp_id, channel, from, until, &overlapping);
        if check.has_conflicts {
            debug!(
                hcp_id,
                channel = %channel,
                campaign_id = %requester.id,
                conflicts = check.conflicts.len(),
                can_proceed = check.can_proceed,
                "Overlap detected"
            );
        }
        Ok(check)
    }

    /// Re-run detection for every active reservation the campaign owns.
    /// Only reservations with at least one conflict are returned.
    pub fn detect_campaign_conflicts(&self, campaign_id: Uuid) -> CoordinationResult<Vec<ReservationConflicts>> {
        let campaign = self.require_campaign(campaign_id)?;
        let mut found = Vec::new();
        for reservation in self
            .store
            .reservation_list_by_campaign(campaign_id)?
            .into_iter()
            .filter(Reservation::is_active)
        {
            let check = self.check_slot(
                &campaign,
                &reservation.hcp_id,
                reservation.channel,
                reservation.reserved_from,
                reservation.reserved_until,
            )?;
            if check.has_conflicts {
                found.push(ReservationConflicts {
                    reservation_id: reservation.id,
                    hcp_id: reservation.hcp_id,
                    channel: reservation.channel,
                    check,
                });
            }
        }
        Ok(found)
    }

    /// Pairwise audit of an HCP's active reservations inside `range`,
    /// comparing only reservations on the same channel from different campaigns.
    pub fn detect_hcp_conflicts(&self, hcp_id: &str, range: DateRange) -> CoordinationResult<Vec<HcpConflict>> {
        let mut active: Vec<Reservation> = self
            .store
            .reservation_views_by_hcp(hcp_id)?
            .into_iter()
            .map(|view| view.reservation)
            .filter(|r| r.is_active() && r.overlaps(range.start, range.end))
            .collect();
        active.sort_by(|a, b| a.reserved_from.cmp(&b.reserved_from));

        let mut conflicts = Vec::new();
        for (i, first) in active.iter().enumerate() {
            for second in &active[i + 1..] {
                if first.channel != second.channel || first.campaign_id == second.campaign_id {
                    continue;
                }
                if !first.overlaps(second.reserved_from, second.reserved_until) {
                    continue;
                }
                conflicts.push(HcpConflict {
                    channel: first.channel,
                    reservation1: first.clone(),
                    reservation2: second.clone(),
                    overlap_start: first.reserved_from.max(second.reserved_from),
                    overlap_end: first.reserved_until.min(second.reserved_until),
                    severity: severity_for(first.priority, second.priority),
                });
            }
        }
        Ok(conflicts)
    }
}
