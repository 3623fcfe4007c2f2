//! Repository interface over the transactional store.
//!
//! Exposes exactly the reads and conditional writes the engine needs so the
//! storage technology can be swapped without touching coordination logic.

use chrono::{DateTime, Utc};
use coordination_core::types::{
    Campaign, Channel, ConflictLog, ConflictResolution, ConflictView, Reservation,
    ReservationView,
};
use coordination_core::CoordinationResult;
use std::any::Any;
use uuid::Uuid;

// ============================================================================
// UPDATE TYPES
// ============================================================================

/// One-way transition out of `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationTransition {
    Release,
    Execute,
    Preempt { by: Uuid },
}

/// Stamp written onto a pending conflict log.
#[derive(Debug, Clone)]
pub struct ResolutionRecord {
    pub resolution: ConflictResolution,
    pub resolved_by: String,
    pub notes: Option<String>,
    pub auto_resolved: bool,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictFilter {
    pub campaign_id: Option<Uuid>,
    pub pending_only: bool,
}

impl ConflictFilter {
    pub fn pending(campaign_id: Option<Uuid>) -> Self {
        Self {
            campaign_id,
            pending_only: true,
        }
    }

    pub fn matches(&self, conflict: &ConflictLog) -> bool {
        if self.pending_only && !conflict.is_pending() {
            return false;
        }
        self.campaign_id.map_or(true, |id| conflict.involves(id))
    }
}

/// Exclusive hold on one `(hcp_id, channel)` slot. Released on drop.
pub struct SlotGuard {
    _held: Box<dyn Any>,
}

impl SlotGuard {
    pub fn new<G: 'static>(held: G) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Storage operations for campaigns, reservations, and conflict logs.
///
/// Every reservation write is conditional on the row still being `active`
/// and every resolution write is conditional on the log still being pending;
/// violations surface as `CoordinationError::InvalidState`.
pub trait CoordinationStore: Send + Sync {
    // === Campaign Operations ===

    fn campaign_insert(&self, campaign: &Campaign) -> CoordinationResult<()>;

    fn campaign_get(&self, id: Uuid) -> CoordinationResult<Option<Campaign>>;

    /// Apply `change` to the stored row atomically. The closure may reject
    /// the change by returning an error, in which case nothing is written.
    fn campaign_modify(
        &self,
        id: Uuid,
        change: &mut dyn FnMut(&mut Campaign) -> CoordinationResult<()>,
    ) -> CoordinationResult<Campaign>;

    fn campaign_delete(&self, id: Uuid) -> CoordinationResult<bool>;

    fn campaign_list(&self) -> CoordinationResult<Vec<Campaign>>;

    // === Reservation Operations ===

    /// Serialize overlap check and write for one slot key.
    fn lock_slot(&self, hcp_id: &str, channel: Channel) -> SlotGuard;

    fn reservation_insert(&self, reservation: &Reservation) -> CoordinationResult<()>;

    fn reservation_get(&self, id: Uuid) -> CoordinationResult<Option<Reservation>>;

    /// Active reservations on the slot whose interval overlaps `[from, until]`.
    fn reservation_find_overlapping(
        &self,
        hcp_id: &str,
        channel: Channel,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> CoordinationResult<Vec<Reservation>>;

    fn reservation_transition(
        &self,
        id: Uuid,
        transition: ReservationTransition,
        at: DateTime<Utc>,
    ) -> CoordinationResult<Reservation>;

    /// Move `reserved_until` from `expected_until` to `new_until`; fails if the
    /// row is no longer active or its bound changed in the meantime.
    fn reservation_extend(
        &self,
        id: Uuid,
        expected_until: DateTime<Utc>,
        new_until: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> CoordinationResult<Reservation>;

    fn reservation_list_by_campaign(&self, campaign_id: Uuid) -> CoordinationResult<Vec<Reservation>>;

    /// All reservations for an HCP joined with the owning campaign.
    fn reservation_views_by_hcp(&self, hcp_id: &str) -> CoordinationResult<Vec<ReservationView>>;

    fn reservation_list(&self) -> CoordinationResult<Vec<Reservation>>;

    /// Set `expired` on every row with `status == active AND reserved_until <= now`.
    /// Returns the rows that changed.
    fn reservation_expire_stale(&self, now: DateTime<Utc>) -> CoordinationResult<Vec<Reservation>>;

    // === Conflict Operations ===

    fn conflict_insert(&self, conflict: &ConflictLog) -> CoordinationResult<()>;

    fn conflict_get(&self, id: Uuid) -> CoordinationResult<Option<ConflictLog>>;

    fn conflict_resolve(&self, id: Uuid, record: ResolutionRecord) -> CoordinationResult<ConflictLog>;

    /// Matching logs, oldest first.
    fn conflict_list(&self, filter: ConflictFilter) -> CoordinationResult<Vec<ConflictLog>>;

    /// Matching logs joined with both campaign names, oldest first.
    fn conflict_views(&self, filter: ConflictFilter) -> CoordinationResult<Vec<ConflictView>>;
}
