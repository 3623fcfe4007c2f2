use crate::clock::{Clock, SystemClock};
use crate::store::CoordinationStore;
use chrono::{DateTime, Utc};
use coordination_core::types::{Campaign, ConflictLog, Reservation};
use coordination_core::{CoordinationError, CoordinationResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Stateless coordination service. Holds only a store handle and a clock;
/// clone it freely and inject it wherever coordination is needed.
///
/// Operations are grouped by concern across modules: campaign registry
/// ([`crate::registry`]), reservations ([`crate::reservations`]), detection
/// ([`crate::detector`]), resolution and preemption ([`crate::resolver`]),
/// availability ([`crate::availability`]) and reporting ([`crate::reporting`]).
#[derive(Clone)]
pub struct Coordinator {
    pub(crate) store: Arc<dyn CoordinationStore>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CoordinationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        &self.store
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn require_campaign(&self, id: Uuid) -> CoordinationResult<Campaign> {
        self.store
            .campaign_get(id)?
            .ok_or_else(|| CoordinationError::not_found("campaign", id))
    }

    pub(crate) fn require_reservation(&self, id: Uuid) -> CoordinationResult<Reservation> {
        self.store
            .reservation_get(id)?
            .ok_or_else(|| CoordinationError::not_found("reservation", id))
    }

    pub(crate) fn require_conflict(&self, id: Uuid) -> CoordinationResult<ConflictLog> {
        self.store
            .conflict_get(id)?
            .ok_or_else(|| CoordinationError::not_found("conflict", id))
    }

    /// Recompute the number of distinct HCPs the campaign actively holds.
    pub(crate) fn refresh_reach(&self, campaign_id: Uuid) -> CoordinationResult<u32> {
        let reach = self
            .store
            .reservation_list_by_campaign(campaign_id)?
            .iter()
            .filter(|r| r.is_active())
            .map(|r| r.hcp_id.as_str())
            .collect::<HashSet<_>>()
            .len() as u32;

        match self.store.campaign_modify(campaign_id, &mut |c: &mut Campaign| {
            c.reach_count = reach;
            Ok(())
        }) {
            Ok(_) => {}
            // Campaign rows may be removed while their reservations linger.
            Err(e) if e.is_not_found() => {
                debug!(campaign_id = %campaign_id, "Skipping reach refresh for missing campaign");
            }
            Err(e) => return Err(e),
        }
        Ok(reach)
    }
}
