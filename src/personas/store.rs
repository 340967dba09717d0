//! Persona store: lifecycle state for personas
//!
//! Readers work on an immutable [`PersonaTable`] snapshot behind an `Arc`.
//! Writers are serialized, mutate a private copy, persist it, and only then
//! publish it, so a reader sees either the whole effect of a mutation or
//! none of it. State lives in a single `personas.json` under the storage
//! directory, replaced via temp file + rename.

use crate::auth::Caller;
use crate::config::{PersonasConfig, UnknownIdPolicy};
use crate::error::{Error, Result};
use crate::personas::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

const STATE_FILE: &str = "personas.json";

/// Which personas a listing may consider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// Every persona (admin view)
    All,
    /// Personas owned by the caller plus global ones
    Accessible,
}

/// Outcome of a display-priority batch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PriorityUpdate {
    pub applied: usize,
    pub skipped: Vec<PersonaId>,
}

/// Full persona state at one point in time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaTable {
    next_id: PersonaId,
    personas: BTreeMap<PersonaId, Persona>,
}

impl PersonaTable {
    fn insert_new(&mut self, owner: Option<uuid::Uuid>, req: CreatePersonaRequest) -> Persona {
        let id = self.next_id;
        self.next_id += 1;
        let persona = Persona::from_request(id, owner, req);
        self.personas.insert(id, persona.clone());
        persona
    }

    fn get_mut(&mut self, id: PersonaId) -> Result<&mut Persona> {
        self.personas.get_mut(&id).ok_or_else(|| not_found(id))
    }
}

/// Persona store with snapshot reads and serialized writes
pub struct PersonaStore {
    dir: Option<PathBuf>,
    snapshot: RwLock<Arc<PersonaTable>>,
    writer: Mutex<()>,
    unknown_id_policy: UnknownIdPolicy,
}

impl PersonaStore {
    /// Open (or create) the store under `dir`
    pub async fn open(dir: PathBuf, options: &PersonasConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        let table = Self::load_from_disk(&dir).await?;
        tracing::info!(
            "Loaded {} personas from {}",
            table.personas.len(),
            dir.display()
        );

        let store = Self {
            dir: Some(dir),
            snapshot: RwLock::new(Arc::new(table)),
            writer: Mutex::new(()),
            unknown_id_policy: options.unknown_id_policy,
        };
        if options.seed_builtin {
            store.seed_builtin().await?;
        }
        Ok(store)
    }

    /// Store without persistence
    pub async fn in_memory(options: &PersonasConfig) -> Result<Self> {
        let store = Self {
            dir: None,
            snapshot: RwLock::new(Arc::new(PersonaTable::default())),
            writer: Mutex::new(()),
            unknown_id_policy: options.unknown_id_policy,
        };
        if options.seed_builtin {
            store.seed_builtin().await?;
        }
        Ok(store)
    }

    async fn seed_builtin(&self) -> Result<()> {
        if !self.snapshot().await.personas.is_empty() {
            return Ok(());
        }
        self.transact(|table| {
            let mut persona = table.insert_new(None, builtin_persona());
            persona.builtin = true;
            table.personas.insert(persona.id, persona);
            Ok(())
        })
        .await?;
        tracing::info!("Seeded builtin persona");
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create a persona owned by the acting principal
    pub async fn create(&self, caller: &Caller, req: CreatePersonaRequest) -> Result<Persona> {
        req.validate()?;
        let owner = caller.user_id();
        let persona = self
            .transact(move |table| Ok(table.insert_new(owner, req)))
            .await?;
        tracing::info!(
            persona_id = persona.id,
            owner = ?persona.owner_id,
            "Created persona"
        );
        Ok(persona)
    }

    /// Replace the content fields of a live persona
    pub async fn update(
        &self,
        id: PersonaId,
        req: CreatePersonaRequest,
        caller: &Caller,
    ) -> Result<Persona> {
        req.validate()?;
        let persona = self
            .transact(|table| {
                let persona = table.get_mut(id)?;
                if persona.is_deleted {
                    return Err(not_found(id));
                }
                authorize_edit(persona, caller)?;
                persona.apply(req);
                Ok(persona.clone())
            })
            .await?;
        tracing::info!(persona_id = id, "Updated persona");
        Ok(persona)
    }

    /// Soft-delete a persona; deleting twice is a no-op
    pub async fn delete(&self, id: PersonaId, caller: &Caller) -> Result<()> {
        self.transact(|table| {
            let persona = table.get_mut(id)?;
            authorize_edit(persona, caller)?;
            set_flag(persona, |p| &mut p.is_deleted, true);
            Ok(())
        })
        .await?;
        tracing::info!(persona_id = id, "Deleted persona");
        Ok(())
    }

    /// Restore a soft-deleted persona (admin)
    pub async fn undelete(&self, id: PersonaId) -> Result<()> {
        self.transact(|table| {
            set_flag(table.get_mut(id)?, |p| &mut p.is_deleted, false);
            Ok(())
        })
        .await?;
        tracing::info!(persona_id = id, "Undeleted persona");
        Ok(())
    }

    /// Show or hide a persona in default listings (admin)
    pub async fn set_visibility(&self, id: PersonaId, is_visible: bool) -> Result<()> {
        self.transact(|table| {
            set_flag(table.get_mut(id)?, |p| &mut p.is_visible, is_visible);
            Ok(())
        })
        .await?;
        tracing::info!(persona_id = id, is_visible, "Changed persona visibility");
        Ok(())
    }

    /// Apply a batch of display priorities as one transaction (admin)
    pub async fn set_display_priorities(
        &self,
        mapping: &BTreeMap<PersonaId, i32>,
    ) -> Result<PriorityUpdate> {
        let policy = self.unknown_id_policy;
        let outcome = self
            .transact(|table| {
                let mut outcome = PriorityUpdate::default();
                for id in mapping.keys() {
                    if !table.personas.contains_key(id) {
                        match policy {
                            UnknownIdPolicy::FailFast => return Err(not_found(*id)),
                            UnknownIdPolicy::SkipUnknown => outcome.skipped.push(*id),
                        }
                    }
                }
                for (id, priority) in mapping {
                    if let Some(persona) = table.personas.get_mut(id) {
                        persona.display_priority = *priority;
                        outcome.applied += 1;
                    }
                }
                Ok(outcome)
            })
            .await?;

        if !outcome.skipped.is_empty() {
            tracing::warn!(
                skipped = ?outcome.skipped,
                "Skipped unknown persona ids in priority batch"
            );
        }
        tracing::info!(applied = outcome.applied, "Updated display priorities");
        Ok(outcome)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Look up a persona under the caller's visibility rules
    pub async fn get(&self, id: PersonaId, caller: &Caller) -> Result<Persona> {
        let table = self.snapshot().await;
        let persona = table.personas.get(&id).ok_or_else(|| not_found(id))?;
        if caller.is_admin() {
            return Ok(persona.clone());
        }
        if persona.is_deleted || !(persona.is_global() || persona.is_owned_by(caller.user_id())) {
            return Err(not_found(id));
        }
        Ok(persona.clone())
    }

    /// List personas ordered by display priority, then id
    ///
    /// Non-admin callers are always restricted to their own and global
    /// personas, never see deleted ones, and see hidden ones only if they
    /// own them.
    pub async fn list(
        &self,
        caller: &Caller,
        scope: ListScope,
        include_deleted: bool,
    ) -> Vec<Persona> {
        let admin = caller.is_admin();
        let scope = if admin { scope } else { ListScope::Accessible };
        let include_deleted = include_deleted && admin;
        let user_id = caller.user_id();

        let table = self.snapshot().await;
        let mut personas: Vec<Persona> = table
            .personas
            .values()
            .filter(|p| include_deleted || !p.is_deleted)
            .filter(|p| scope == ListScope::All || p.is_global() || p.is_owned_by(user_id))
            .filter(|p| admin || p.is_visible || p.is_owned_by(user_id))
            .cloned()
            .collect();

        personas.sort_by_key(|p| (p.display_priority, p.id));
        personas
    }

    /// Read the persisted personas under `dir` without creating or seeding anything
    pub async fn inspect(dir: &Path) -> Result<Vec<Persona>> {
        let table = Self::load_from_disk(dir).await?;
        Ok(table.personas.into_values().collect())
    }

    // =========================================================================
    // Transactions & persistence
    // =========================================================================

    async fn snapshot(&self) -> Arc<PersonaTable> {
        self.snapshot.read().await.clone()
    }

    /// Run `f` against a copy of the table and publish it on success
    async fn transact<T>(&self, f: impl FnOnce(&mut PersonaTable) -> Result<T>) -> Result<T> {
        let _writer = self.writer.lock().await;
        let mut next = (*self.snapshot().await).clone();
        let out = f(&mut next)?;
        if let Some(dir) = &self.dir {
            Self::persist(dir, &next).await?;
        }
        *self.snapshot.write().await = Arc::new(next);
        Ok(out)
    }

    async fn load_from_disk(dir: &Path) -> Result<PersonaTable> {
        let path = dir.join(STATE_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => {
                let mut table: PersonaTable = serde_json::from_str(&data)?;
                // never hand out an id at or below an existing one
                if let Some(max) = table.personas.keys().next_back() {
                    table.next_id = table.next_id.max(max + 1);
                }
                Ok(table)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersonaTable::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(dir: &Path, table: &PersonaTable) -> Result<()> {
        let path = dir.join(STATE_FILE);
        let tmp = dir.join(format!("{}.tmp", STATE_FILE));
        let json = serde_json::to_vec_pretty(table)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            tracing::warn!("Failed to persist personas to {}: {}", path.display(), e);
            Error::from(e)
        })
    }
}

fn not_found(id: PersonaId) -> Error {
    Error::NotFound(format!("Persona {} not found", id))
}

fn authorize_edit(persona: &Persona, caller: &Caller) -> Result<()> {
    if caller.is_admin() || persona.is_owned_by(caller.user_id()) {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "Not allowed to modify persona {}",
            persona.id
        )))
    }
}

fn set_flag(persona: &mut Persona, flag: impl FnOnce(&mut Persona) -> &mut bool, value: bool) {
    let slot = flag(persona);
    if *slot != value {
        *slot = value;
        persona.updated_at = chrono::Utc::now();
    }
}

/// Global persona seeded into an empty store
fn builtin_persona() -> CreatePersonaRequest {
    let mut req = CreatePersonaRequest::named("Default");
    req.description = "Default assistant with access to all indexed documents".to_string();
    req.system_prompt = "You are a question answering system that is constantly learning and \
        improving. You can process and comprehend vast amounts of text and utilize this \
        knowledge to provide accurate and detailed answers to diverse queries."
        .to_string();
    req.task_prompt = "Answer my query based on the documents provided. \
        If the documents are not relevant, say so and answer from general knowledge."
        .to_string();
    req
}
