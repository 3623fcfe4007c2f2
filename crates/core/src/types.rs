use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ─── Campaign ──────────────────────────────────────────────────────────────

/// A marketing campaign competing for HCP contact slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    /// Higher wins.
    pub priority: i32,
    pub budget: Option<f64>,
    pub spent_to_date: f64,
    pub brand: Option<String>,
    pub business_unit: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_by: String,
    /// Distinct HCPs currently held by an active reservation.
    #[serde(default)]
    pub reach_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Fraction of budget already spent; 0 when no budget is set.
    pub fn budget_utilization(&self) -> f64 {
        match self.budget {
            Some(budget) if budget > 0.0 => self.spent_to_date / budget,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub business_unit: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub created_by: String,
}

fn default_priority() -> i32 {
    50
}

impl NewCampaign {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            budget: None,
            brand: None,
            business_unit: None,
            start_date: None,
            end_date: None,
            created_by: "system".to_string(),
        }
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignUpdate {
    pub name: Option<String>,
    pub priority: Option<i32>,
    pub budget: Option<f64>,
    pub spent_to_date: Option<f64>,
    pub brand: Option<String>,
    pub business_unit: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

// ─── Channel ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    RepVisit,
    Webinar,
    Phone,
    Sms,
    DirectMail,
    Social,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Channel::Email => "email",
            Channel::RepVisit => "rep_visit",
            Channel::Webinar => "webinar",
            Channel::Phone => "phone",
            Channel::Sms => "sms",
            Channel::DirectMail => "direct_mail",
            Channel::Social => "social",
        };
        f.write_str(s)
    }
}

// ─── Reservation ───────────────────────────────────────────────────────────

/// A campaign's claim on one HCP, one channel, for `[reserved_from, reserved_until)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub hcp_id: String,
    pub channel: Channel,
    pub reservation_type: ReservationType,
    /// Campaign priority at the time the reservation was made.
    pub priority: i32,
    pub reserved_from: DateTime<Utc>,
    pub reserved_until: DateTime<Utc>,
    pub planned_action_date: Option<DateTime<Utc>>,
    pub can_preempt: bool,
    pub status: ReservationStatus,
    pub preempted_by: Option<Uuid>,
    pub executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    /// Overlap test used for conflict detection. Touching bounds count.
    pub fn overlaps(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> bool {
        self.reserved_from <= until && self.reserved_until >= from
    }

    /// Whether `at` falls inside `[reserved_from, reserved_until)`.
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.reserved_from <= at && at < self.reserved_until
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReservationType {
    #[default]
    Priority,
    Exclusive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Active,
    Executed,
    Released,
    Expired,
    Preempted,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Executed => "executed",
            ReservationStatus::Released => "released",
            ReservationStatus::Expired => "expired",
            ReservationStatus::Preempted => "preempted",
        };
        f.write_str(s)
    }
}

/// Caller-supplied knobs for a single reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveOptions {
    #[serde(default)]
    pub reservation_type: ReservationType,
    #[serde(default)]
    pub planned_action_date: Option<DateTime<Utc>>,
    #[serde(default = "default_can_preempt")]
    pub can_preempt: bool,
}

fn default_can_preempt() -> bool {
    true
}

impl Default for ReserveOptions {
    fn default() -> Self {
        Self {
            reservation_type: ReservationType::Priority,
            planned_action_date: None,
            can_preempt: default_can_preempt(),
        }
    }
}

impl ReserveOptions {
    pub fn exclusive() -> Self {
        Self {
            reservation_type: ReservationType::Exclusive,
            ..Self::default()
        }
    }

    pub fn non_preemptible() -> Self {
        Self {
            can_preempt: false,
            ..Self::default()
        }
    }

    pub fn with_planned_action(mut self, at: DateTime<Utc>) -> Self {
        self.planned_action_date = Some(at);
        self
    }
}

/// Inclusive start, exclusive end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

// ─── Conflict Log ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictLog {
    pub id: Uuid,
    pub hcp_id: String,
    pub channel: Channel,
    pub conflict_type: ConflictType,
    /// Owner of the reservation that was already in place.
    pub campaign1_id: Uuid,
    /// Campaign that attempted the new reservation.
    pub campaign2_id: Uuid,
    pub reservation1_id: Option<Uuid>,
    pub reservation2_id: Option<Uuid>,
    pub conflict_date: DateTime<Utc>,
    pub severity: ConflictSeverity,
    pub description: String,
    pub resolution: Option<ConflictResolution>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
    pub auto_resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl ConflictLog {
    pub fn is_pending(&self) -> bool {
        self.resolution.is_none()
    }

    pub fn involves(&self, campaign_id: Uuid) -> bool {
        self.campaign1_id == campaign_id || self.campaign2_id == campaign_id
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    #[default]
    Overlap,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    Campaign1Wins,
    Campaign2Wins,
    Merged,
    Deferred,
    Cancelled,
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictResolution::Campaign1Wins => "campaign1_wins",
            ConflictResolution::Campaign2Wins => "campaign2_wins",
            ConflictResolution::Merged => "merged",
            ConflictResolution::Deferred => "deferred",
            ConflictResolution::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Policy used to pick a winner without human input.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AutoResolveStrategy {
    #[default]
    Priority,
    FirstCome,
    BudgetEfficiency,
}

impl std::str::FromStr for AutoResolveStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priority" => Ok(Self::Priority),
            "first_come" => Ok(Self::FirstCome),
            "budget_efficiency" => Ok(Self::BudgetEfficiency),
            other => Err(format!("unknown auto-resolve strategy: {other}")),
        }
    }
}

// ─── Joined Views ──────────────────────────────────────────────────────────

/// A reservation joined with the owning campaign's display fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationView {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub campaign_name: String,
    pub campaign_status: CampaignStatus,
    pub brand: Option<String>,
}

/// A conflict log joined with both campaign names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictView {
    #[serde(flatten)]
    pub conflict: ConflictLog,
    pub campaign1_name: Option<String>,
    pub campaign2_name: Option<String>,
}
