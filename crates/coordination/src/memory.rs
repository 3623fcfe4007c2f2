//! In-memory coordination store backed by DashMap.
//!
//! Production: replace with PostgreSQL or a similar ACID store. This provides
//! the same conditional-write semantics for development and testing.

use crate::store::{ConflictFilter, CoordinationStore, ReservationTransition, ResolutionRecord, SlotGuard};
use chrono::{DateTime, Utc};
use coordination_core::types::{
    Campaign, Channel, ConflictLog, ConflictView, Reservation, ReservationStatus, ReservationView,
};
use coordination_core::{CoordinationError, CoordinationResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

type SlotKey = (String, Channel);

/// Thread-safe in-memory store for campaigns, reservations, and conflict logs.
#[derive(Default)]
pub struct InMemoryStore {
    campaigns: DashMap<Uuid, Campaign>,
    reservations: DashMap<Uuid, Reservation>,
    conflicts: DashMap<Uuid, ConflictLog>,
    slot_locks: DashMap<SlotKey, Arc<Mutex<()>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        info!("Coordination store initialized (in-memory, development mode)");
        Self::default()
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    fn not_active(reservation: &Reservation) -> CoordinationError {
        CoordinationError::InvalidState(format!(
            "reservation {} is {}, not active",
            reservation.id, reservation.status
        ))
    }
}

impl CoordinationStore for InMemoryStore {
    // ─── Campaigns ─────────────────────────────────────────────────────────

    fn campaign_insert(&self, campaign: &Campaign) -> CoordinationResult<()> {
        if self.campaigns.contains_key(&campaign.id) {
            return Err(CoordinationError::Storage(format!(
                "campaign {} already exists",
                campaign.id
            )));
        }
        self.campaigns.insert(campaign.id, campaign.clone());
        Ok(())
    }

    fn campaign_get(&self, id: Uuid) -> CoordinationResult<Option<Campaign>> {
        Ok(self.campaigns.get(&id).map(|r| r.value().clone()))
    }

    fn campaign_modify(
        &self,
        id: Uuid,
        change: &mut dyn FnMut(&mut Campaign) -> CoordinationResult<()>,
    ) -> CoordinationResult<Campaign> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| CoordinationError::not_found("campaign", id))?;
        let mut updated = entry.value().clone();
        change(&mut updated)?;
        *entry = updated.clone();
        Ok(updated)
    }

    fn campaign_delete(&self, id: Uuid) -> CoordinationResult<bool> {
        Ok(self.campaigns.remove(&id).is_some())
    }

    fn campaign_list(&self) -> CoordinationResult<Vec<Campaign>> {
        Ok(self.campaigns.iter().map(|r| r.value().clone()).collect())
    }

    // ─── Reservations ──────────────────────────────────────────────────────

    fn lock_slot(&self, hcp_id: &str, channel: Channel) -> SlotGuard {
        let lock = self
            .slot_locks
            .entry((hcp_id.to_string(), channel))
            .or_default()
            .clone();
        SlotGuard::new(lock.lock_arc())
    }

    fn reservation_insert(&self, reservation: &Reservation) -> CoordinationResult<()> {
        if self.reservations.contains_key(&reservation.id) {
            return Err(CoordinationError::Storage(format!(
                "reservation {} already exists",
                reservation.id
            )));
        }
        self.reservations.insert(reservation.id, reservation.clone());
        Ok(())
    }

    fn reservation_get(&self, id: Uuid) -> CoordinationResult<Option<Reservation>> {
        Ok(self.reservations.get(&id).map(|r| r.value().clone()))
    }

    fn reservation_find_overlapping(
        &self,
        hcp_id: &str,
        channel: Channel,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> CoordinationResult<Vec<Reservation>> {
        Ok(self
            .reservations
            .iter()
            .filter(|r| {
                r.is_active() && r.hcp_id == hcp_id && r.channel == channel && r.overlaps(from, until)
            })
            .map(|r| r.value().clone())
            .collect())
    }

    fn reservation_transition(
        &self,
        id: Uuid,
        transition: ReservationTransition,
        at: DateTime<Utc>,
    ) -> CoordinationResult<Reservation> {
        let mut entry = self
            .reservations
            .get_mut(&id)
            .ok_or_else(|| CoordinationError::not_found("reservation", id))?;
        if entry.status.is_terminal() {
            return Err(Self::not_active(&entry));
        }
        match transition {
            ReservationTransition::Release => entry.status = ReservationStatus::Released,
            ReservationTransition::Execute => {
                entry.status = ReservationStatus::Executed;
                entry.executed_at = Some(at);
            }
            ReservationTransition::Preempt { by } => {
                entry.status = ReservationStatus::Preempted;
                entry.preempted_by = Some(by);
            }
        }
        entry.updated_at = at;
        Ok(entry.value().clone())
    }

    fn reservation_extend(
        &self,
        id: Uuid,
        expected_until: DateTime<Utc>,
        new_until: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> CoordinationResult<Reservation> {
        let mut entry = self
            .reservations
            .get_mut(&id)
            .ok_or_else(|| CoordinationError::not_found("reservation", id))?;
        if entry.status.is_terminal() {
            return Err(Self::not_active(&entry));
        }
        if entry.reserved_until != expected_until {
            return Err(CoordinationError::InvalidState(format!(
                "reservation {} was modified concurrently",
                id
            )));
        }
        entry.reserved_until = new_until;
        entry.updated_at = at;
        Ok(entry.value().clone())
    }

    fn reservation_list_by_campaign(&self, campaign_id: Uuid) -> CoordinationResult<Vec<Reservation>> {
        let mut reservations: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| r.campaign_id == campaign_id)
            .map(|r| r.value().clone())
            .collect();
        reservations.sort_by(|a, b| a.reserved_from.cmp(&b.reserved_from));
        Ok(reservations)
    }

    fn reservation_views_by_hcp(&self, hcp_id: &str) -> CoordinationResult<Vec<ReservationView>> {
        let reservations: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|r| r.hcp_id == hcp_id)
            .map(|r| r.value().clone())
            .collect();

        let mut views: Vec<ReservationView> = reservations
            .into_iter()
            .filter_map(|reservation| {
                // Rows whose campaign is gone are dropped, as an inner join would.
                self.campaigns.get(&reservation.campaign_id).map(|c| ReservationView {
                    campaign_name: c.name.clone(),
                    campaign_status: c.status,
                    brand: c.brand.clone(),
                    reservation,
                })
            })
            .collect();
        views.sort_by(|a, b| a.reservation.reserved_from.cmp(&b.reservation.reserved_from));
        Ok(views)
    }

    fn reservation_list(&self) -> CoordinationResult<Vec<Reservation>> {
        Ok(self.reservations.iter().map(|r| r.value().clone()).collect())
    }

    fn reservation_expire_stale(&self, now: DateTime<Utc>) -> CoordinationResult<Vec<Reservation>> {
        let mut expired = Vec::new();
        for mut entry in self.reservations.iter_mut() {
            if entry.is_active() && entry.reserved_until <= now {
                entry.status = ReservationStatus::Expired;
                entry.updated_at = now;
                expired.push(entry.value().clone());
            }
        }
        Ok(expired)
    }

    // ─── Conflicts ─────────────────────────────────────────────────────────

    fn conflict_insert(&self, conflict: &ConflictLog) -> CoordinationResult<()> {
        self.conflicts.insert(conflict.id, conflict.clone());
        Ok(())
    }

    fn conflict_get(&self, id: Uuid) -> CoordinationResult<Option<ConflictLog>> {
        Ok(self.conflicts.get(&id).map(|r| r.value().clone()))
    }

    fn conflict_resolve(&self, id: Uuid, record: ResolutionRecord) -> CoordinationResult<ConflictLog> {
        let mut entry = self
            .conflicts
            .get_mut(&id)
            .ok_or_else(|| CoordinationError::not_found("conflict", id))?;
        if let Some(existing) = entry.resolution {
            return Err(CoordinationError::InvalidState(format!(
                "conflict {} already resolved as {}",
                id, existing
            )));
        }
        entry.resolution = Some(record.resolution);
        entry.resolved_at = Some(record.resolved_at);
        entry.resolved_by = Some(record.resolved_by);
        entry.resolution_notes = record.notes;
        entry.auto_resolved = record.auto_resolved;
        Ok(entry.value().clone())
    }

    fn conflict_list(&self, filter: ConflictFilter) -> CoordinationResult<Vec<ConflictLog>> {
        let mut conflicts: Vec<ConflictLog> = self
            .conflicts
            .iter()
            .filter(|c| filter.matches(c.value()))
            .map(|c| c.value().clone())
            .collect();
        conflicts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(conflicts)
    }

    fn conflict_views(&self, filter: ConflictFilter) -> CoordinationResult<Vec<ConflictView>> {
        let name_of = |id: Uuid| self.campaigns.get(&id).map(|c| c.name.clone());
        Ok(self
            .conflict_list(filter)?
            .into_iter()
            .map(|conflict| ConflictView {
                campaign1_name: name_of(conflict.campaign1_id),
                campaign2_name: name_of(conflict.campaign2_id),
                conflict,
            })
            .collect())
    }
}
