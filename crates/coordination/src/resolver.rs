//! Conflict resolution: persistence of detected conflicts, manual and
//! policy-driven resolution, and preemption.

use crate::coordinator::Coordinator;
use crate::store::{ConflictFilter, ReservationTransition, ResolutionRecord};
use chrono::{DateTime, Utc};
use coordination_core::results::{DetectedConflict, ResolutionAction, ResolutionReport};
use coordination_core::types::{
    AutoResolveStrategy, Campaign, ConflictLog, ConflictResolution, ConflictType, Reservation,
};
use coordination_core::{CoordinationError, CoordinationResult};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

const AUTO_RESOLVER: &str = "auto-resolver";

/// Pick a winner between the two campaigns of a conflict. Ties yield
/// `Deferred`; a strategy never guesses.
pub fn decide(strategy: AutoResolveStrategy, campaign1: &Campaign, campaign2: &Campaign) -> ConflictResolution {
    let ordering = match strategy {
        AutoResolveStrategy::Priority => campaign1.priority.cmp(&campaign2.priority),
        // Earlier creation wins, so reverse the natural order.
        AutoResolveStrategy::FirstCome => campaign2.created_at.cmp(&campaign1.created_at),
        // Lower utilization wins.
        AutoResolveStrategy::BudgetEfficiency => match campaign2
            .budget_utilization()
            .partial_cmp(&campaign1.budget_utilization())
        {
            Some(ordering) => ordering,
            None => Ordering::Equal,
        },
    };
    match ordering {
        Ordering::Greater => ConflictResolution::Campaign1Wins,
        Ordering::Less => ConflictResolution::Campaign2Wins,
        Ordering::Equal => ConflictResolution::Deferred,
    }
}

/// Reservations a resolution releases.
fn losers(conflict: &ConflictLog, resolution: ConflictResolution) -> Vec<Uuid> {
    match resolution {
        ConflictResolution::Campaign1Wins => conflict.reservation2_id.into_iter().collect(),
        ConflictResolution::Campaign2Wins => conflict.reservation1_id.into_iter().collect(),
        ConflictResolution::Cancelled => conflict
            .reservation1_id
            .into_iter()
            .chain(conflict.reservation2_id)
            .collect(),
        ConflictResolution::Merged | ConflictResolution::Deferred => Vec::new(),
    }
}

impl Coordinator {
    /// Persist one pending log entry per detected conflict. The existing
    /// holder is campaign 1; the requester is campaign 2.
    pub(crate) fn record_conflicts(
        &self,
        conflicts: &[DetectedConflict],
        requesting_reservation_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> CoordinationResult<Vec<ConflictLog>> {
        let mut logged = Vec::with_capacity(conflicts.len());
        for detected in conflicts {
            let log = ConflictLog {
                id: Uuid::new_v4(),
                hcp_id: detected.hcp_id.clone(),
                channel: detected.channel,
                conflict_type: ConflictType::Overlap,
                campaign1_id: detected.existing_campaign_id,
                campaign2_id: detected.requesting_campaign_id,
                reservation1_id: Some(detected.existing_reservation_id),
                reservation2_id: requesting_reservation_id,
                conflict_date: detected.overlap_start,
                severity: detected.severity,
                description: format!(
                    "{} overlap on HCP {} from {} to {} (priority {} vs {})",
                    detected.channel,
                    detected.hcp_id,
                    detected.overlap_start,
                    detected.overlap_end,
                    detected.existing_priority,
                    detected.requesting_priority
                ),
                resolution: None,
                resolved_at: None,
                resolved_by: None,
                resolution_notes: None,
                auto_resolved: false,
                created_at: now,
            };
            self.store.conflict_insert(&log)?;
            metrics::counter!("coordination.conflicts.logged").increment(1);
            logged.push(log);
        }
        Ok(logged)
    }

    /// Manually resolve a pending conflict and apply its effect on the
    /// two reservations.
    pub fn resolve_conflict(
        &self,
        conflict_id: Uuid,
        resolution: ConflictResolution,
        resolved_by: &str,
        notes: Option<String>,
    ) -> CoordinationResult<ConflictLog> {
        let conflict = self.require_conflict(conflict_id)?;
        if let Some(existing) = conflict.resolution {
            return Err(CoordinationError::InvalidState(format!(
                "conflict {conflict_id} already resolved as {existing}"
            )));
        }

        let record = ResolutionRecord {
            resolution,
            resolved_by: resolved_by.to_string(),
            notes,
            auto_resolved: false,
            resolved_at: self.now(),
        };
        let resolved = self.store.conflict_resolve(conflict_id, record)?;
        let affected = self.apply_resolution(&resolved, resolution)?;

        metrics::counter!("coordination.conflicts.resolved").increment(1);
        info!(
            conflict_id = %conflict_id,
            resolution = %resolution,
            resolved_by,
            released = affected.len(),
            "Conflict resolved"
        );
        Ok(resolved)
    }

    /// Resolve every pending conflict (optionally for one campaign) with
    /// `strategy`. Undecidable conflicts stay pending and count as unresolved.
    pub fn auto_resolve_conflicts(
        &self,
        campaign_id: Option<Uuid>,
        strategy: AutoResolveStrategy,
    ) -> CoordinationResult<ResolutionReport> {
        let pending = self.store.conflict_list(ConflictFilter::pending(campaign_id))?;
        let total = pending.len();
        let mut resolved = 0;
        let mut by_resolution: BTreeMap<ConflictResolution, usize> = BTreeMap::new();
        let mut actions = Vec::new();

        for conflict in pending {
            let (Some(campaign1), Some(campaign2)) = (
                self.store.campaign_get(conflict.campaign1_id)?,
                self.store.campaign_get(conflict.campaign2_id)?,
            ) else {
                debug!(conflict_id = %conflict.id, "Skipping conflict with missing campaign");
                continue;
            };

            let resolution = decide(strategy, &campaign1, &campaign2);
            if resolution == ConflictResolution::Deferred {
                *by_resolution.entry(resolution).or_default() += 1;
                actions.push(ResolutionAction {
                    conflict_id: conflict.id,
                    resolution,
                    affected_reservations: Vec::new(),
                });
                continue;
            }

            let record = ResolutionRecord {
                resolution,
                resolved_by: AUTO_RESOLVER.to_string(),
                notes: Some(format!("auto-resolved by {strategy:?} strategy")),
                auto_resolved: true,
                resolved_at: self.now(),
            };
            let stamped = match self.store.conflict_resolve(conflict.id, record) {
                Ok(stamped) => stamped,
                // Someone resolved it between our read and write.
                Err(e) if e.is_invalid_state() => continue,
                Err(e) => return Err(e),
            };
            let affected = self.apply_resolution(&stamped, resolution)?;

            resolved += 1;
            *by_resolution.entry(resolution).or_default() += 1;
            actions.push(ResolutionAction {
                conflict_id: conflict.id,
                resolution,
                affected_reservations: affected,
            });
        }

        if resolved > 0 {
            metrics::counter!("coordination.conflicts.resolved").increment(resolved as u64);
        }
        info!(
            strategy = ?strategy,
            total,
            resolved,
            unresolved = total - resolved,
            "Auto-resolution pass finished"
        );
        Ok(ResolutionReport {
            strategy,
            total,
            resolved,
            unresolved: total - resolved,
            by_resolution,
            actions,
        })
    }

    /// Release the losing reservation(s). Reservations that already left
    /// `active` are skipped.
    fn apply_resolution(&self, conflict: &ConflictLog, resolution: ConflictResolution) -> CoordinationResult<Vec<Uuid>> {
        let now = self.now();
        let mut affected = Vec::new();
        for reservation_id in losers(conflict, resolution) {
            match self
                .store
                .reservation_transition(reservation_id, ReservationTransition::Release, now)
            {
                Ok(released) => {
                    self.refresh_reach(released.campaign_id)?;
                    affected.push(reservation_id);
                }
                Err(e) if e.is_invalid_state() || e.is_not_found() => {
                    debug!(
                        reservation_id = %reservation_id,
                        conflict_id = %conflict.id,
                        "Reservation no longer active, nothing to release"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(affected)
    }

    /// A campaign may preempt a reservation when it strictly outranks the
    /// reservation's snapshotted priority and the reservation allows it.
    pub fn can_preempt(&self, new_campaign_id: Uuid, reservation_id: Uuid) -> CoordinationResult<bool> {
        let campaign = self.require_campaign(new_campaign_id)?;
        let reservation = self.require_reservation(reservation_id)?;
        Ok(campaign.priority > reservation.priority && reservation.can_preempt)
    }

    /// Mark the reservation `preempted` in favour of `new_campaign_id`.
    /// The vacated slot is not claimed; reserve it separately.
    pub fn preempt(&self, new_campaign_id: Uuid, reservation_id: Uuid) -> CoordinationResult<Reservation> {
        if !self.can_preempt(new_campaign_id, reservation_id)? {
            return Err(CoordinationError::InvalidState(format!(
                "campaign {new_campaign_id} cannot preempt reservation {reservation_id}"
            )));
        }
        let preempted = self.store.reservation_transition(
            reservation_id,
            ReservationTransition::Preempt { by: new_campaign_id },
            self.now(),
        )?;
        self.refresh_reach(preempted.campaign_id)?;

        metrics::counter!("coordination.reservations.preempted").increment(1);
        warn!(
            reservation_id = %reservation_id,
            owner = %preempted.campaign_id,
            preempted_by = %new_campaign_id,
            "Reservation preempted"
        );
        Ok(preempted)
    }

    pub fn get_conflict(&self, conflict_id: Uuid) -> CoordinationResult<ConflictLog> {
        self.require_conflict(conflict_id)
    }

    /// All conflict logs, optionally restricted to one campaign, oldest first.
    pub fn list_conflicts(&self, campaign_id: Option<Uuid>) -> CoordinationResult<Vec<ConflictLog>> {
        self.store.conflict_list(ConflictFilter {
            campaign_id,
            pending_only: false,
        })
    }
}
