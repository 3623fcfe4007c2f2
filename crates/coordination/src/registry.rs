//! Campaign registry: CRUD and lifecycle (draft → active → paused/completed).

use crate::coordinator::Coordinator;
use crate::store::ConflictFilter;
use coordination_core::types::{Campaign, CampaignStatus, CampaignUpdate, NewCampaign};
use coordination_core::{CoordinationError, CoordinationResult};
use tracing::info;
use uuid::Uuid;

fn invalid_transition(campaign: &Campaign, to: CampaignStatus) -> CoordinationError {
    CoordinationError::InvalidState(format!(
        "campaign {} cannot move from {} to {}",
        campaign.id, campaign.status, to
    ))
}

impl Coordinator {
    pub fn create_campaign(&self, req: NewCampaign) -> CoordinationResult<Campaign> {
        if req.name.trim().is_empty() {
            return Err(CoordinationError::Validation("campaign name is required".into()));
        }
        if req.budget.is_some_and(|b| b < 0.0) {
            return Err(CoordinationError::Validation("budget cannot be negative".into()));
        }
        let now = self.now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            name: req.name,
            status: CampaignStatus::Draft,
            priority: req.priority,
            budget: req.budget,
            spent_to_date: 0.0,
            brand: req.brand,
            business_unit: req.business_unit,
            start_date: req.start_date,
            end_date: req.end_date,
            created_by: req.created_by,
            reach_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.campaign_insert(&campaign)?;
        info!(campaign_id = %campaign.id, name = %campaign.name, priority = campaign.priority, "Campaign created");
        Ok(campaign)
    }

    pub fn get_campaign(&self, campaign_id: Uuid) -> CoordinationResult<Campaign> {
        self.require_campaign(campaign_id)
    }

    /// Newest first.
    pub fn list_campaigns(&self) -> CoordinationResult<Vec<Campaign>> {
        let mut campaigns = self.store.campaign_list()?;
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(campaigns)
    }

    /// Priority changes apply to future reservations only; existing ones
    /// keep their snapshot.
    pub fn update_campaign(&self, campaign_id: Uuid, req: CampaignUpdate) -> CoordinationResult<Campaign> {
        let now = self.now();
        self.store.campaign_modify(campaign_id, &mut |c: &mut Campaign| {
            if let Some(ref name) = req.name {
                c.name = name.clone();
            }
            if let Some(priority) = req.priority {
                c.priority = priority;
            }
            if let Some(budget) = req.budget {
                c.budget = Some(budget);
            }
            if let Some(spent) = req.spent_to_date {
                c.spent_to_date = spent;
            }
            if let Some(ref brand) = req.brand {
                c.brand = Some(brand.clone());
            }
            if let Some(ref unit) = req.business_unit {
                c.business_unit = Some(unit.clone());
            }
            if let Some(start) = req.start_date {
                c.start_date = Some(start);
            }
            if let Some(end) = req.end_date {
                c.end_date = Some(end);
            }
            c.updated_at = now;
            Ok(())
        })
    }

    /// Only drafts may be deleted. Any reservations the draft held are released.
    pub fn delete_campaign(&self, campaign_id: Uuid) -> CoordinationResult<()> {
        let campaign = self.require_campaign(campaign_id)?;
        if campaign.status != CampaignStatus::Draft {
            return Err(CoordinationError::InvalidState(format!(
                "only draft campaigns can be deleted; {} is {}",
                campaign_id, campaign.status
            )));
        }
        self.release_all_for_campaign(campaign_id)?;
        self.store.campaign_delete(campaign_id)?;
        info!(campaign_id = %campaign_id, "Campaign deleted");
        Ok(())
    }

    /// Pending conflicts in which the campaign takes part.
    pub fn conflict_count(&self, campaign_id: Uuid) -> CoordinationResult<usize> {
        Ok(self
            .store
            .conflict_list(ConflictFilter::pending(Some(campaign_id)))?
            .len())
    }

    /// Draft or paused → active. Refused while any conflict is unresolved.
    pub fn activate_campaign(&self, campaign_id: Uuid) -> CoordinationResult<Campaign> {
        let now = self.now();
        // Counted while the campaign row is held so the gate and the write agree.
        let campaign = self.store.campaign_modify(campaign_id, &mut |c: &mut Campaign| {
            if !matches!(c.status, CampaignStatus::Draft | CampaignStatus::Paused) {
                return Err(invalid_transition(c, CampaignStatus::Active));
            }
            let pending = self.conflict_count(campaign_id)?;
            if pending > 0 {
                return Err(CoordinationError::InvalidState(format!(
                    "campaign {campaign_id} has {pending} unresolved conflict(s)"
                )));
            }
            c.status = CampaignStatus::Active;
            c.updated_at = now;
            Ok(())
        })?;
        info!(campaign_id = %campaign_id, "Campaign activated");
        Ok(campaign)
    }

    /// Reservations survive a pause.
    pub fn pause_campaign(&self, campaign_id: Uuid) -> CoordinationResult<Campaign> {
        let campaign = self.transition_campaign(campaign_id, &[CampaignStatus::Active], CampaignStatus::Paused)?;
        info!(campaign_id = %campaign_id, "Campaign paused");
        Ok(campaign)
    }

    /// Completing a campaign ends its claims: active reservations are released.
    pub fn complete_campaign(&self, campaign_id: Uuid) -> CoordinationResult<Campaign> {
        self.transition_campaign(
            campaign_id,
            &[CampaignStatus::Active, CampaignStatus::Paused],
            CampaignStatus::Completed,
        )?;
        let released = self.release_all_for_campaign(campaign_id)?;
        let reach = self.refresh_reach(campaign_id)?;
        info!(campaign_id = %campaign_id, released, reach, "Campaign completed");
        self.require_campaign(campaign_id)
    }

    fn transition_campaign(
        &self,
        campaign_id: Uuid,
        from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> CoordinationResult<Campaign> {
        let now = self.now();
        self.store.campaign_modify(campaign_id, &mut |c: &mut Campaign| {
            if !from.contains(&c.status) {
                return Err(invalid_transition(c, to));
            }
            c.status = to;
            c.updated_at = now;
            Ok(())
        })
    }
}
