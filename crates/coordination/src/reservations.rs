//! Reservation manager: claims, releases, extensions and execution of
//! HCP-channel-time reservations.

use crate::coordinator::Coordinator;
use crate::store::ReservationTransition;
use chrono::{DateTime, Utc};
use coordination_core::results::{
    BatchItemError, BatchReservationItem, BatchReservationResult, ReservationResult,
};
use coordination_core::types::{Campaign, CampaignStatus, Channel, Reservation, ReservationStatus, ReserveOptions};
use coordination_core::{CoordinationError, CoordinationResult};
use tracing::{debug, info, warn};
use uuid::Uuid;

fn ensure_reservable(campaign: &Campaign) -> CoordinationResult<()> {
    if campaign.status == CampaignStatus::Completed {
        return Err(CoordinationError::InvalidState(format!(
            "campaign {} is completed",
            campaign.id
        )));
    }
    Ok(())
}

impl Coordinator {
    /// Claim `[from, until)` on `(hcp_id, channel)` for a campaign.
    ///
    /// Contention is not an error: a blocked claim returns `success: false`
    /// with the conflicts, which are also logged for resolution.
    pub fn reserve_hcp(
        &self,
        campaign_id: Uuid,
        hcp_id: &str,
        channel: Channel,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        options: ReserveOptions,
    ) -> CoordinationResult<ReservationResult> {
        if from >= until {
            return Err(CoordinationError::Validation(format!(
                "reservation start {from} must be before end {until}"
            )));
        }
        ensure_reservable(&self.require_campaign(campaign_id)?)?;
        let now = self.now();

        let slot = self.store.lock_slot(hcp_id, channel);
        // Re-read under the slot lock; the campaign may have completed meanwhile.
        let campaign = self.require_campaign(campaign_id)?;
        ensure_reservable(&campaign)?;
        let check = self.check_slot(&campaign, hcp_id, channel, from, until)?;

        if check.has_conflicts && !check.can_proceed {
            self.record_conflicts(&check.conflicts, None, now)?;
            drop(slot);
            metrics::counter!("coordination.reservations.blocked").increment(1);
            info!(
                campaign_id = %campaign_id,
                hcp_id,
                channel = %channel,
                conflicts = check.conflicts.len(),
                "Reservation blocked by existing claims"
            );
            let message = format!(
                "{} conflicting reservation(s) block {} on {}",
                check.conflicts.len(),
                hcp_id,
                channel
            );
            return Ok(ReservationResult::blocked(check.conflicts, message));
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            campaign_id,
            hcp_id: hcp_id.to_string(),
            channel,
            reservation_type: options.reservation_type,
            priority: campaign.priority,
            reserved_from: from,
            reserved_until: until,
            planned_action_date: options.planned_action_date,
            can_preempt: options.can_preempt,
            status: ReservationStatus::Active,
            preempted_by: None,
            executed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.reservation_insert(&reservation)?;
        // A completion that slipped in before the insert would not have seen
        // this row, so withdraw it here.
        if let Err(e) = ensure_reservable(&self.require_campaign(campaign_id)?) {
            match self
                .store
                .reservation_transition(reservation.id, ReservationTransition::Release, now)
            {
                Ok(_) => {}
                Err(released) if released.is_invalid_state() => {}
                Err(released) => return Err(released),
            }
            return Err(e);
        }
        if check.has_conflicts {
            self.record_conflicts(&check.conflicts, Some(reservation.id), now)?;
        }
        drop(slot);

        self.refresh_reach(campaign_id)?;
        metrics::counter!("coordination.reservations.created").increment(1);
        info!(
            reservation_id = %reservation.id,
            campaign_id = %campaign_id,
            hcp_id,
            channel = %channel,
            admitted_over = check.conflicts.len(),
            "Reservation created"
        );

        let message = if check.has_conflicts {
            format!(
                "Reserved with {} overlapping reservation(s) pending resolution",
                check.conflicts.len()
            )
        } else {
            "Reserved".to_string()
        };
        Ok(ReservationResult {
            success: true,
            reservation: Some(reservation),
            conflicts: check.conflicts,
            message,
        })
    }

    /// Reserve each item independently. One item's failure never affects
    /// the others; the result lists every outcome.
    pub fn batch_reserve_hcps(
        &self,
        campaign_id: Uuid,
        items: Vec<BatchReservationItem>,
    ) -> CoordinationResult<BatchReservationResult> {
        self.require_campaign(campaign_id)?;
        let mut result = BatchReservationResult::default();

        for (index, item) in items.into_iter().enumerate() {
            match self.reserve_hcp(
                campaign_id,
                &item.hcp_id,
                item.channel,
                item.reserved_from,
                item.reserved_until,
                item.options,
            ) {
                Ok(outcome) => {
                    result.conflict_count += outcome.conflicts.len();
                    result.conflicts.extend(outcome.conflicts);
                    match outcome.reservation {
                        Some(reservation) if outcome.success => {
                            result.success_count += 1;
                            result.reservations.push(reservation);
                        }
                        _ => result.failed_count += 1,
                    }
                }
                Err(e) => {
                    warn!(index, hcp_id = %item.hcp_id, error = %e, "Batch reservation item failed");
                    result.failed_count += 1;
                    result.errors.push(BatchItemError {
                        index,
                        hcp_id: item.hcp_id,
                        channel: item.channel,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            campaign_id = %campaign_id,
            succeeded = result.success_count,
            failed = result.failed_count,
            conflicts = result.conflict_count,
            "Batch reservation finished"
        );
        Ok(result)
    }

    pub fn release_reservation(&self, reservation_id: Uuid) -> CoordinationResult<Reservation> {
        let released = self
            .store
            .reservation_transition(reservation_id, ReservationTransition::Release, self.now())?;
        self.refresh_reach(released.campaign_id)?;
        info!(reservation_id = %reservation_id, "Reservation released");
        Ok(released)
    }

    pub fn mark_reservation_executed(&self, reservation_id: Uuid) -> CoordinationResult<Reservation> {
        let executed = self
            .store
            .reservation_transition(reservation_id, ReservationTransition::Execute, self.now())?;
        self.refresh_reach(executed.campaign_id)?;
        info!(reservation_id = %reservation_id, "Reservation executed");
        Ok(executed)
    }

    /// Push `reserved_until` out to `new_until`. Only the added range
    /// `[old_until, new_until)` is checked; a blocked extension changes nothing.
    pub fn extend_reservation(
        &self,
        reservation_id: Uuid,
        new_until: DateTime<Utc>,
    ) -> CoordinationResult<ReservationResult> {
        let current = self.require_reservation(reservation_id)?;
        if !current.is_active() {
            return Err(CoordinationError::InvalidState(format!(
                "cannot extend reservation {} in status {}",
                reservation_id, current.status
            )));
        }
        if new_until <= current.reserved_until {
            return Err(CoordinationError::Validation(format!(
                "new end {new_until} must be after current end {}",
                current.reserved_until
            )));
        }
        let campaign = self.require_campaign(current.campaign_id)?;
        let now = self.now();

        let slot = self.store.lock_slot(&current.hcp_id, current.channel);
        let check = self.check_slot(
            &campaign,
            &current.hcp_id,
            current.channel,
            current.reserved_until,
            new_until,
        )?;

        if check.has_conflicts && !check.can_proceed {
            // The refused range was never held; the log carries no reservation2.
            self.record_conflicts(&check.conflicts, None, now)?;
            drop(slot);
            debug!(reservation_id = %reservation_id, "Extension blocked");
            let message = format!(
                "{} conflicting reservation(s) block the extension",
                check.conflicts.len()
            );
            return Ok(ReservationResult::blocked(check.conflicts, message));
        }

        let extended = self
            .store
            .reservation_extend(reservation_id, current.reserved_until, new_until, now)?;
        if check.has_conflicts {
            self.record_conflicts(&check.conflicts, Some(reservation_id), now)?;
        }
        drop(slot);

        info!(
            reservation_id = %reservation_id,
            until = %new_until,
            "Reservation extended"
        );
        Ok(ReservationResult {
            success: true,
            reservation: Some(extended),
            conflicts: check.conflicts,
            message: "Extended".to_string(),
        })
    }

    pub fn get_reservation(&self, reservation_id: Uuid) -> CoordinationResult<Reservation> {
        self.require_reservation(reservation_id)
    }

    pub fn list_campaign_reservations(&self, campaign_id: Uuid) -> CoordinationResult<Vec<Reservation>> {
        self.require_campaign(campaign_id)?;
        self.store.reservation_list_by_campaign(campaign_id)
    }

    /// Release every active reservation a campaign still holds.
    pub(crate) fn release_all_for_campaign(&self, campaign_id: Uuid) -> CoordinationResult<usize> {
        let now = self.now();
        let mut released = 0;
        for reservation in self.store.reservation_list_by_campaign(campaign_id)? {
            if !reservation.is_active() {
                continue;
            }
            match self
                .store
                .reservation_transition(reservation.id, ReservationTransition::Release, now)
            {
                Ok(_) => released += 1,
                // Lost a race with expiry or another release.
                Err(e) if e.is_invalid_state() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::FixedClock;
    use crate::memory::InMemoryStore;
    use crate::Coordinator;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use coordination_core::results::BatchReservationItem;
    use coordination_core::types::{
        AutoResolveStrategy, CampaignStatus, Channel, ConflictResolution, NewCampaign, ReservationStatus,
        ReserveOptions,
    };
    use std::sync::Arc;
    use uuid::Uuid;

    fn day(d: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::days(d)
    }

    fn coordinator() -> Coordinator {
        Coordinator::with_clock(Arc::new(InMemoryStore::new()), Arc::new(FixedClock::new(day(0))))
    }

    #[test]
    fn test_reserve_requires_ordered_range() {
        let coord = coordinator();
        let c = coord.create_campaign(NewCampaign::new("A", 50)).unwrap();
        let err = coord
            .reserve_hcp(c.id, "HCP-1", Channel::Email, day(3), day(3), ReserveOptions::default())
            .unwrap_err();
        assert!(matches!(err, coordination_core::CoordinationError::Validation(_)));
    }

    #[test]
    fn test_reserve_unknown_campaign_is_not_found() {
        let coord = coordinator();
        let err = coord
            .reserve_hcp(Uuid::new_v4(), "HCP-1", Channel::Email, day(1), day(2), ReserveOptions::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_reserve_snapshots_priority_and_updates_reach() {
        let coord = coordinator();
        let c = coord.create_campaign(NewCampaign::new("A", 70)).unwrap();
        let result = coord
            .reserve_hcp(c.id, "HCP-1", Channel::Email, day(1), day(5), ReserveOptions::default())
            .unwrap();
        assert!(result.success);
        let reservation = result.reservation.unwrap();
        assert_eq!(reservation.priority, 70);
        assert!(reservation.can_preempt);

        coord
            .update_campaign(c.id, coordination_core::types::CampaignUpdate {
                priority: Some(10),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(coord.get_reservation(reservation.id).unwrap().priority, 70);
        assert_eq!(coord.get_campaign(c.id).unwrap().reach_count, 1);

        coord.release_reservation(reservation.id).unwrap();
        assert_eq!(coord.get_campaign(c.id).unwrap().reach_count, 0);
    }

    #[test]
    fn test_extend_checks_only_added_range() {
        let coord = coordinator();
        let a = coord.create_campaign(NewCampaign::new("A", 50)).unwrap();
        let b = coord.create_campaign(NewCampaign::new("B", 50)).unwrap();
        let mine = coord
            .reserve_hcp(a.id, "HCP-1", Channel::Email, day(1), day(3), ReserveOptions::default())
            .unwrap()
            .reservation
            .unwrap();
        coord
            .reserve_hcp(b.id, "HCP-1", Channel::Email, day(6), day(8), ReserveOptions::non_preemptible())
            .unwrap();

        let ok = coord.extend_reservation(mine.id, day(5)).unwrap();
        assert!(ok.success);
        assert_eq!(ok.reservation.unwrap().reserved_until, day(5));

        let blocked = coord.extend_reservation(mine.id, day(7)).unwrap();
        assert!(!blocked.success);
        assert_eq!(coord.get_reservation(mine.id).unwrap().reserved_until, day(5));
    }

    #[test]
    fn test_extend_released_is_invalid_state() {
        let coord = coordinator();
        let a = coord.create_campaign(NewCampaign::new("A", 50)).unwrap();
        let r = coord
            .reserve_hcp(a.id, "HCP-1", Channel::Email, day(1), day(3), ReserveOptions::default())
            .unwrap()
            .reservation
            .unwrap();
        coord.release_reservation(r.id).unwrap();
        assert!(coord.extend_reservation(r.id, day(4)).unwrap_err().is_invalid_state());
        assert!(coord.release_reservation(r.id).unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_mark_executed_stamps_time() {
        let coord = coordinator();
        let a = coord.create_campaign(NewCampaign::new("A", 50)).unwrap();
        let r = coord
            .reserve_hcp(a.id, "HCP-1", Channel::RepVisit, day(1), day(3), ReserveOptions::default())
            .unwrap()
            .reservation
            .unwrap();
        let executed = coord.mark_reservation_executed(r.id).unwrap();
        assert_eq!(executed.status, ReservationStatus::Executed);
        assert_eq!(executed.executed_at, Some(day(0)));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let coord = coordinator();
        let holder = coord.create_campaign(NewCampaign::new("Holder", 90)).unwrap();
        let requester = coord.create_campaign(NewCampaign::new("Requester", 40)).unwrap();
        coord
            .reserve_hcp(holder.id, "HCP-2", Channel::Email, day(1), day(5), ReserveOptions::exclusive())
            .unwrap();

        let item = |hcp: &str, from, until| BatchReservationItem {
            hcp_id: hcp.to_string(),
            channel: Channel::Email,
            reserved_from: from,
            reserved_until: until,
            options: ReserveOptions::default(),
        };
        let result = coord
            .batch_reserve_hcps(
                requester.id,
                vec![
                    item("HCP-1", day(1), day(2)),
                    item("HCP-2", day(2), day(3)),
                    item("HCP-3", day(4), day(2)),
                    item("HCP-4", day(1), day(2)),
                ],
            )
            .unwrap();

        assert_eq!(result.success_count, 2);
        assert_eq!(result.failed_count, 2);
        assert_eq!(result.conflict_count, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].index, 2);
        assert_eq!(coord.get_campaign(requester.id).unwrap().reach_count, 2);
    }

    #[test]
    fn test_blocked_extension_survives_resolution() {
        let coord = coordinator();
        let holder = coord.create_campaign(NewCampaign::new("Holder", 80)).unwrap();
        let extender = coord.create_campaign(NewCampaign::new("Extender", 50)).unwrap();
        coord
            .reserve_hcp(holder.id, "HCP-1", Channel::Email, day(5), day(8), ReserveOptions::non_preemptible())
            .unwrap();
        let mine = coord
            .reserve_hcp(extender.id, "HCP-1", Channel::Email, day(1), day(3), ReserveOptions::default())
            .unwrap()
            .reservation
            .unwrap();

        let blocked = coord.extend_reservation(mine.id, day(6)).unwrap();
        assert!(!blocked.success);
        let logged = coord.list_unresolved_conflicts(Some(extender.id)).unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].conflict.reservation2_id, None);

        let report = coord
            .auto_resolve_conflicts(None, AutoResolveStrategy::Priority)
            .unwrap();
        assert_eq!(report.actions[0].resolution, ConflictResolution::Campaign1Wins);
        assert!(report.actions[0].affected_reservations.is_empty());
        let kept = coord.get_reservation(mine.id).unwrap();
        assert_eq!(kept.status, ReservationStatus::Active);
        assert_eq!(kept.reserved_until, day(3));
    }

    #[test]
    fn test_reservations_racing_completion_end_inactive() {
        let coord = coordinator();
        let c = coord.create_campaign(NewCampaign::new("C", 50)).unwrap();
        coord.activate_campaign(c.id).unwrap();

        std::thread::scope(|scope| {
            let reserving = coord.clone();
            scope.spawn(move || {
                for i in 0..200 {
                    // Refusals after completion are expected.
                    let _ = reserving.reserve_hcp(
                        c.id,
                        &format!("HCP-{i}"),
                        Channel::Email,
                        day(1),
                        day(2),
                        ReserveOptions::default(),
                    );
                }
            });
            let completing = coord.clone();
            scope.spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(1));
                completing.complete_campaign(c.id).unwrap();
            });
        });

        assert!(coord
            .list_campaign_reservations(c.id)
            .unwrap()
            .iter()
            .all(|r| !r.is_active()));
        assert_eq!(coord.get_campaign(c.id).unwrap().status, CampaignStatus::Completed);
    }
}
