//! Free/busy computation for one HCP on one channel. Read-only.

use crate::coordinator::Coordinator;
use coordination_core::results::{AvailabilityResult, TimeSlot};
use coordination_core::types::{Channel, DateRange, Reservation};
use coordination_core::{CoordinationError, CoordinationResult};
use uuid::Uuid;

/// Tile `range` with free and reserved slots. `reservations` must be sorted
/// by start and limited to those intersecting the range.
pub fn compute_slots(range: DateRange, reservations: &[Reservation]) -> Vec<TimeSlot> {
    let mut slots = Vec::with_capacity(reservations.len() * 2 + 1);
    let mut cursor = range.start;

    for reservation in reservations {
        if reservation.reserved_from > cursor {
            slots.push(TimeSlot::free(cursor, reservation.reserved_from));
        }
        slots.push(TimeSlot {
            start: reservation.reserved_from.max(range.start),
            end: reservation.reserved_until.min(range.end),
            available: false,
            reservation_id: Some(reservation.id),
            campaign_id: Some(reservation.campaign_id),
        });
        cursor = cursor.max(reservation.reserved_until);
    }

    if cursor < range.end {
        slots.push(TimeSlot::free(cursor, range.end));
    }
    slots
}

impl Coordinator {
    /// Free and reserved slots for `(hcp_id, channel)` across `range`.
    /// Reservations held by `exclude_campaign_id` are treated as free.
    pub fn get_available_slots(
        &self,
        hcp_id: &str,
        channel: Channel,
        range: DateRange,
        exclude_campaign_id: Option<Uuid>,
    ) -> CoordinationResult<AvailabilityResult> {
        if range.start >= range.end {
            return Err(CoordinationError::Validation(format!(
                "range start {} must be before end {}",
                range.start, range.end
            )));
        }

        let mut reservations: Vec<Reservation> = self
            .store
            .reservation_find_overlapping(hcp_id, channel, range.start, range.end)?
            .into_iter()
            // Touching bounds hold no time inside the range.
            .filter(|r| r.reserved_from < range.end && r.reserved_until > range.start)
            .filter(|r| exclude_campaign_id != Some(r.campaign_id))
            .collect();
        reservations.sort_by(|a, b| a.reserved_from.cmp(&b.reserved_from));

        let slots = compute_slots(range, &reservations);
        Ok(AvailabilityResult {
            available: slots.iter().any(|s| s.available),
            slots,
            existing_reservations: reservations,
        })
    }
}
