//! Typed outcomes returned by the coordination engine.

use crate::types::{
    AutoResolveStrategy, CampaignStatus, Channel, ConflictResolution, ConflictSeverity,
    Reservation, ReservationType, ReservationView,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ─── Conflict Detection ────────────────────────────────────────────────────

/// One existing reservation that overlaps a requested interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedConflict {
    pub hcp_id: String,
    pub channel: Channel,
    pub existing_reservation_id: Uuid,
    pub existing_campaign_id: Uuid,
    pub existing_priority: i32,
    pub existing_type: ReservationType,
    pub existing_can_preempt: bool,
    pub requesting_campaign_id: Uuid,
    pub requesting_priority: i32,
    pub overlap_start: DateTime<Utc>,
    pub overlap_end: DateTime<Utc>,
    pub severity: ConflictSeverity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictCheck {
    pub has_conflicts: bool,
    pub can_proceed: bool,
    pub conflicts: Vec<DetectedConflict>,
}

/// Conflicts found when re-checking one of a campaign's own reservations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConflicts {
    pub reservation_id: Uuid,
    pub hcp_id: String,
    pub channel: Channel,
    pub check: ConflictCheck,
}

/// A pair of overlapping active reservations found during an HCP audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HcpConflict {
    pub channel: Channel,
    pub reservation1: Reservation,
    pub reservation2: Reservation,
    pub overlap_start: DateTime<Utc>,
    pub overlap_end: DateTime<Utc>,
    pub severity: ConflictSeverity,
}

// ─── Reservations ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationResult {
    pub success: bool,
    pub reservation: Option<Reservation>,
    pub conflicts: Vec<DetectedConflict>,
    pub message: String,
}

impl ReservationResult {
    pub fn blocked(conflicts: Vec<DetectedConflict>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            reservation: None,
            conflicts,
            message: message.into(),
        }
    }
}

/// One entry of a batch reservation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReservationItem {
    pub hcp_id: String,
    pub channel: Channel,
    pub reserved_from: DateTime<Utc>,
    pub reserved_until: DateTime<Utc>,
    #[serde(default)]
    pub options: crate::types::ReserveOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemError {
    pub index: usize,
    pub hcp_id: String,
    pub channel: Channel,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReservationResult {
    pub success_count: usize,
    pub failed_count: usize,
    pub conflict_count: usize,
    pub reservations: Vec<Reservation>,
    pub conflicts: Vec<DetectedConflict>,
    pub errors: Vec<BatchItemError>,
}

// ─── Availability ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub available: bool,
    pub reservation_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
}

impl TimeSlot {
    pub fn free(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            available: true,
            reservation_id: None,
            campaign_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub available: bool,
    pub slots: Vec<TimeSlot>,
    pub existing_reservations: Vec<Reservation>,
}

// ─── Resolution ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionAction {
    pub conflict_id: Uuid,
    pub resolution: ConflictResolution,
    pub affected_reservations: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub strategy: AutoResolveStrategy,
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub by_resolution: BTreeMap<ConflictResolution, usize>,
    pub actions: Vec<ResolutionAction>,
}

// ─── Reporting ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandSummary {
    pub campaigns: usize,
    pub budget: f64,
    pub spent: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub total_campaigns: usize,
    pub active_campaigns: usize,
    pub draft_campaigns: usize,
    pub paused_campaigns: usize,
    pub completed_campaigns: usize,
    pub total_budget: f64,
    pub total_spent: f64,
    pub total_reservations: usize,
    pub active_reservations: usize,
    pub pending_conflicts: usize,
    pub resolved_conflicts: usize,
    pub by_brand: BTreeMap<String, BrandSummary>,
    pub by_status: BTreeMap<CampaignStatus, usize>,
}

/// All reservations one campaign holds on a single HCP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HcpCampaignEntry {
    pub campaign_id: Uuid,
    pub campaign_name: String,
    pub campaign_status: CampaignStatus,
    pub brand: Option<String>,
    pub reservations: Vec<Reservation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HcpCampaignView {
    pub hcp_id: String,
    pub campaigns: Vec<HcpCampaignEntry>,
    pub total_reservations: usize,
    /// Active reservations whose interval covers "now".
    pub active_reservations: Vec<ReservationView>,
    /// Active reservations with a planned action still in the future.
    pub upcoming_actions: Vec<ReservationView>,
}
