//! Demo portfolio used by `--demo` to exercise a fresh in-memory store.

use chrono::{Duration, Utc};
use coordination_core::types::{Channel, NewCampaign, ReserveOptions};
use coordination_core::CoordinationResult;
use coordination_engine::Coordinator;
use tracing::info;

pub fn seed(coord: &Coordinator) -> CoordinationResult<()> {
    let now = Utc::now();

    let campaigns = vec![
        ("Cardio Launch Wave 1", "Cardio", 85, 120_000.0),
        ("Cardio Awareness", "Cardio", 55, 40_000.0),
        ("Oncology Education Series", "Oncology", 70, 90_000.0),
        ("Respiratory Refresh", "Respiratory", 40, 25_000.0),
    ];

    let mut ids = Vec::with_capacity(campaigns.len());
    for (name, brand, priority, budget) in campaigns {
        let campaign = coord.create_campaign(
            NewCampaign::new(name, priority)
                .with_brand(brand)
                .with_budget(budget),
        )?;
        ids.push(campaign.id);
    }

    let hcps = ["HCP-1001", "HCP-1002", "HCP-1003"];
    for (i, hcp) in hcps.iter().enumerate() {
        let offset = Duration::days(i as i64);
        coord.reserve_hcp(
            ids[0],
            hcp,
            Channel::RepVisit,
            now + offset,
            now + offset + Duration::days(5),
            ReserveOptions::non_preemptible().with_planned_action(now + offset + Duration::days(2)),
        )?;
        coord.reserve_hcp(
            ids[1],
            hcp,
            Channel::RepVisit,
            now + offset + Duration::days(3),
            now + offset + Duration::days(7),
            ReserveOptions::default(),
        )?;
        coord.reserve_hcp(
            ids[2],
            hcp,
            Channel::Email,
            now,
            now + Duration::days(14),
            ReserveOptions::default(),
        )?;
    }
    coord.reserve_hcp(
        ids[3],
        "HCP-1001",
        Channel::Email,
        now + Duration::days(1),
        now + Duration::days(2),
        ReserveOptions::default(),
    )?;

    let summary = coord.campaign_summary()?;
    info!(
        campaigns = summary.total_campaigns,
        reservations = summary.total_reservations,
        pending_conflicts = summary.pending_conflicts,
        "Demo portfolio seeded"
    );
    Ok(())
}
