//! Campaign coordination engine: HCP-channel-time reservations, overlap
//! conflict detection, manual and policy-driven conflict resolution,
//! preemption, availability, and portfolio reporting.
//!
//! All operations hang off [`Coordinator`], a cheap-to-clone service that
//! holds a [`CoordinationStore`] handle and a [`Clock`].
//! [`InMemoryStore`] is the development store; swap in a transactional
//! relational store for production.

pub mod availability;
pub mod clock;
pub mod coordinator;
pub mod detector;
pub mod memory;
pub mod registry;
pub mod reporting;
pub mod reservations;
pub mod resolver;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use coordinator::Coordinator;
pub use memory::InMemoryStore;
pub use store::{ConflictFilter, CoordinationStore, ReservationTransition, ResolutionRecord, SlotGuard};
