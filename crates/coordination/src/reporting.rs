//! Portfolio summaries, per-HCP views, unresolved-conflict listing and the
//! stale-reservation expiry sweep.

use crate::coordinator::Coordinator;
use crate::store::ConflictFilter;
use coordination_core::results::{CampaignSummary, HcpCampaignEntry, HcpCampaignView};
use coordination_core::types::{CampaignStatus, ConflictView};
use coordination_core::CoordinationResult;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use uuid::Uuid;

const UNBRANDED: &str = "unbranded";

impl Coordinator {
    pub fn campaign_summary(&self) -> CoordinationResult<CampaignSummary> {
        let campaigns = self.store.campaign_list()?;
        let reservations = self.store.reservation_list()?;
        let conflicts = self.store.conflict_list(ConflictFilter::default())?;

        let mut summary = CampaignSummary {
            total_campaigns: campaigns.len(),
            total_reservations: reservations.len(),
            active_reservations: reservations.iter().filter(|r| r.is_active()).count(),
            pending_conflicts: conflicts.iter().filter(|c| c.is_pending()).count(),
            ..Default::default()
        };
        summary.resolved_conflicts = conflicts.len() - summary.pending_conflicts;

        for campaign in &campaigns {
            match campaign.status {
                CampaignStatus::Draft => summary.draft_campaigns += 1,
                CampaignStatus::Active => summary.active_campaigns += 1,
                CampaignStatus::Paused => summary.paused_campaigns += 1,
                CampaignStatus::Completed => summary.completed_campaigns += 1,
            }
            *summary.by_status.entry(campaign.status).or_default() += 1;

            let budget = campaign.budget.unwrap_or(0.0);
            summary.total_budget += budget;
            summary.total_spent += campaign.spent_to_date;

            let brand = summary
                .by_brand
                .entry(campaign.brand.clone().unwrap_or_else(|| UNBRANDED.to_string()))
                .or_default();
            brand.campaigns += 1;
            brand.budget += budget;
            brand.spent += campaign.spent_to_date;
        }
        Ok(summary)
    }

    /// Every campaign touching `hcp_id`, with the reservations it holds.
    pub fn hcp_campaign_view(&self, hcp_id: &str) -> CoordinationResult<HcpCampaignView> {
        let now = self.now();
        let views = self.store.reservation_views_by_hcp(hcp_id)?;

        let mut grouped: BTreeMap<Uuid, HcpCampaignEntry> = BTreeMap::new();
        for view in &views {
            grouped
                .entry(view.reservation.campaign_id)
                .or_insert_with(|| HcpCampaignEntry {
                    campaign_id: view.reservation.campaign_id,
                    campaign_name: view.campaign_name.clone(),
                    campaign_status: view.campaign_status,
                    brand: view.brand.clone(),
                    reservations: Vec::new(),
                })
                .reservations
                .push(view.reservation.clone());
        }
        let mut campaigns: Vec<HcpCampaignEntry> = grouped.into_values().collect();
        campaigns.sort_by(|a, b| a.campaign_name.cmp(&b.campaign_name));

        let active_reservations = views
            .iter()
            .filter(|v| v.reservation.is_active() && v.reservation.covers(now))
            .cloned()
            .collect();
        let upcoming_actions = views
            .iter()
            .filter(|v| {
                v.reservation.is_active()
                    && v.reservation.planned_action_date.is_some_and(|at| at > now)
            })
            .cloned()
            .collect();

        Ok(HcpCampaignView {
            hcp_id: hcp_id.to_string(),
            campaigns,
            total_reservations: views.len(),
            active_reservations,
            upcoming_actions,
        })
    }

    pub fn list_unresolved_conflicts(&self, campaign_id: Option<Uuid>) -> CoordinationResult<Vec<ConflictView>> {
        self.store.conflict_views(ConflictFilter::pending(campaign_id))
    }

    /// Expire every active reservation whose end has passed. Safe to run
    /// repeatedly and alongside reservation traffic; returns how many changed.
    pub fn expire_stale_reservations(&self) -> CoordinationResult<usize> {
        let now = self.now();
        let expired = self.store.reservation_expire_stale(now)?;
        if expired.is_empty() {
            debug!("Expiry sweep found nothing to expire");
            return Ok(0);
        }

        let affected: BTreeSet<Uuid> = expired.iter().map(|r| r.campaign_id).collect();
        for campaign_id in &affected {
            self.refresh_reach(*campaign_id)?;
        }

        metrics::counter!("coordination.reservations.expired").increment(expired.len() as u64);
        info!(
            expired = expired.len(),
            campaigns = affected.len(),
            "Expired stale reservations"
        );
        Ok(expired.len())
    }
}
