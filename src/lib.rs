//! Persona Hub - persona lifecycle service for chat assistants
//!
//! A persona pairs a prompt template with retrieval and behavior settings.
//! This crate owns the persona state machine (ownership, visibility,
//! soft-delete, display priority) and serves it over HTTP.
//!
//! ## Modules
//!
//! - [`personas`]: Persona store and REST handlers
//! - [`auth`]: Principal resolution and access tiers
//! - [`prompts`]: Prompt template preview
//! - [`api`]: Application router
//! - [`config`]: Configuration management

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod personas;
pub mod prompts;

pub use config::PersonaHubConfig;
pub use error::{Error, Result};
