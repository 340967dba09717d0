//! Personas module — persona lifecycle management
//!
//! Provides admin and user REST endpoints for creating, updating,
//! soft-deleting, hiding and reordering personas.

pub mod handler;
pub mod store;
pub mod types;

pub use handler::{personas_router, PersonasState};
pub use store::{ListScope, PersonaStore, PriorityUpdate};
