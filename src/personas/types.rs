//! Persona wire types
//!
//! [`Persona`] is the stored entity; [`PersonaSnapshot`] is what the API
//! returns. Field names are snake_case on the wire.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type PersonaId = u64;

/// How strongly retrieval favors recent documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecencyBias {
    FavorRecent,
    #[default]
    BaseDecay,
    NoDecay,
    Auto,
}

/// Canned conversation opener shown for a persona
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarterMessage {
    pub name: String,
    pub description: String,
    pub message: String,
}

/// Stored persona
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: PersonaId,
    pub owner_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub task_prompt: String,
    pub include_citations: bool,
    pub num_chunks: f64,
    pub llm_relevance_filter: bool,
    pub llm_filter_extraction: bool,
    pub recency_bias: RecencyBias,
    pub llm_model_version_override: Option<String>,
    pub starter_messages: Vec<StarterMessage>,
    pub document_set_ids: Vec<u64>,
    pub builtin: bool,
    pub is_visible: bool,
    pub is_deleted: bool,
    pub display_priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Persona {
    /// Build a fresh persona from a validated request
    pub fn from_request(id: PersonaId, owner_id: Option<Uuid>, req: CreatePersonaRequest) -> Self {
        let now = Utc::now();
        let mut persona = Self {
            id,
            owner_id,
            name: String::new(),
            description: String::new(),
            system_prompt: String::new(),
            task_prompt: String::new(),
            include_citations: true,
            num_chunks: 0.0,
            llm_relevance_filter: false,
            llm_filter_extraction: false,
            recency_bias: RecencyBias::default(),
            llm_model_version_override: None,
            starter_messages: Vec::new(),
            document_set_ids: Vec::new(),
            builtin: false,
            is_visible: true,
            is_deleted: false,
            display_priority: 0,
            created_at: now,
            updated_at: now,
        };
        persona.apply(req);
        persona
    }

    /// Replace every content field with the request's values
    ///
    /// Ownership, visibility, deletion and priority are left alone.
    pub fn apply(&mut self, req: CreatePersonaRequest) {
        self.name = req.name.trim().to_string();
        self.description = req.description;
        self.system_prompt = req.system_prompt;
        self.task_prompt = req.task_prompt;
        self.include_citations = req.include_citations;
        self.num_chunks = req.num_chunks;
        self.llm_relevance_filter = req.llm_relevance_filter;
        self.llm_filter_extraction = req.llm_filter_extraction;
        self.recency_bias = req.recency_bias;
        self.llm_model_version_override = req.llm_model_version_override;
        self.starter_messages = req.starter_messages;
        self.document_set_ids = req.document_set_ids;
        self.updated_at = Utc::now();
    }

    /// Whether `user_id` may see and edit this persona without admin rights
    pub fn is_owned_by(&self, user_id: Option<Uuid>) -> bool {
        self.owner_id.is_some() && self.owner_id == user_id
    }

    pub fn is_global(&self) -> bool {
        self.owner_id.is_none()
    }
}

/// Persona as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaSnapshot {
    pub id: PersonaId,
    pub owner_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub task_prompt: String,
    pub include_citations: bool,
    pub num_chunks: f64,
    pub llm_relevance_filter: bool,
    pub llm_filter_extraction: bool,
    pub recency_bias: RecencyBias,
    pub llm_model_version_override: Option<String>,
    pub starter_messages: Vec<StarterMessage>,
    pub document_set_ids: Vec<u64>,
    pub default_persona: bool,
    pub is_visible: bool,
    pub is_deleted: bool,
    pub display_priority: i32,
}

impl From<Persona> for PersonaSnapshot {
    fn from(p: Persona) -> Self {
        Self {
            id: p.id,
            owner_id: p.owner_id,
            name: p.name,
            description: p.description,
            system_prompt: p.system_prompt,
            task_prompt: p.task_prompt,
            include_citations: p.include_citations,
            num_chunks: p.num_chunks,
            llm_relevance_filter: p.llm_relevance_filter,
            llm_filter_extraction: p.llm_filter_extraction,
            recency_bias: p.recency_bias,
            llm_model_version_override: p.llm_model_version_override,
            starter_messages: p.starter_messages,
            document_set_ids: p.document_set_ids,
            default_persona: p.builtin,
            is_visible: p.is_visible,
            is_deleted: p.is_deleted,
            display_priority: p.display_priority,
        }
    }
}

/// Request body for creating or wholesale-updating a persona
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePersonaRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub task_prompt: String,
    #[serde(default = "default_include_citations")]
    pub include_citations: bool,
    #[serde(default = "default_num_chunks")]
    pub num_chunks: f64,
    #[serde(default)]
    pub llm_relevance_filter: bool,
    #[serde(default)]
    pub llm_filter_extraction: bool,
    #[serde(default)]
    pub recency_bias: RecencyBias,
    #[serde(default)]
    pub llm_model_version_override: Option<String>,
    #[serde(default)]
    pub starter_messages: Vec<StarterMessage>,
    #[serde(default)]
    pub document_set_ids: Vec<u64>,
}

fn default_include_citations() -> bool {
    true
}

fn default_num_chunks() -> f64 {
    10.0
}

impl CreatePersonaRequest {
    /// Request with only a name; everything else defaulted
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: String::new(),
            task_prompt: String::new(),
            include_citations: default_include_citations(),
            num_chunks: default_num_chunks(),
            llm_relevance_filter: false,
            llm_filter_extraction: false,
            recency_bias: RecencyBias::default(),
            llm_model_version_override: None,
            starter_messages: Vec::new(),
            document_set_ids: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "must not be empty"));
        }
        if !self.num_chunks.is_finite() || self.num_chunks < 0.0 {
            return Err(Error::validation(
                "num_chunks",
                "must be a non-negative number",
            ));
        }
        if let Some(i) = self
            .starter_messages
            .iter()
            .position(|m| m.name.trim().is_empty() || m.message.trim().is_empty())
        {
            return Err(Error::validation(
                format!("starter_messages[{}]", i),
                "name and message must not be empty",
            ));
        }
        Ok(())
    }
}

/// Request body for PATCH /admin/persona/:id/visible
#[derive(Debug, Deserialize)]
pub struct IsVisibleRequest {
    pub is_visible: bool,
}

/// Request body for PUT /admin/persona/display-priority
#[derive(Debug, Deserialize)]
pub struct DisplayPriorityRequest {
    pub display_priority_map: BTreeMap<PersonaId, i32>,
}

/// Query parameters for persona listings
#[derive(Debug, Default, Deserialize)]
pub struct ListPersonasQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

/// Query parameters for the prompt explorer
#[derive(Debug, Deserialize)]
pub struct PromptExplorerQuery {
    pub system_prompt: String,
    pub task_prompt: String,
    #[serde(default)]
    pub retrieval_disabled: bool,
}

/// Rendered prompt preview
#[derive(Debug, Serialize, Deserialize)]
pub struct PromptTemplateResponse {
    pub final_prompt_template: String,
}
