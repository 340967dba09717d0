//! HTTP handlers for the persona APIs
//!
//! Admin endpoints:
//! - PATCH  /admin/persona/:id/visible        — show/hide a persona
//! - PUT    /admin/persona/display-priority   — batch reorder
//! - GET    /admin/persona                    — list every persona
//! - PATCH  /admin/persona/:id/undelete       — restore a deleted persona
//!
//! User endpoints:
//! - POST   /persona                          — create persona
//! - PATCH  /persona/:id                      — replace persona content
//! - DELETE /persona/:id                      — soft-delete persona
//! - GET    /persona                          — list own + global personas
//! - GET    /persona/:id                      — persona detail
//! - GET    /persona/utils/prompt-explorer    — preview the final prompt

use crate::auth::{CurrentAdmin, CurrentUser, PrincipalResolver};
use crate::error::{Error, Result};
use crate::personas::store::{ListScope, PersonaStore};
use crate::personas::types::*;
use crate::prompts::build_dummy_prompt;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRef, Path, Query, State,
    },
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};
use std::sync::Arc;

/// Shared state for persona handlers
#[derive(Clone)]
pub struct PersonasState {
    pub store: Arc<PersonaStore>,
    pub resolver: Arc<PrincipalResolver>,
}

impl FromRef<PersonasState> for Arc<PrincipalResolver> {
    fn from_ref(state: &PersonasState) -> Self {
        state.resolver.clone()
    }
}

/// Create the admin + user persona router
pub fn personas_router(state: PersonasState) -> Router {
    Router::new()
        .route("/admin/persona", get(list_personas_admin))
        .route("/admin/persona/display-priority", put(patch_display_priority))
        .route("/admin/persona/:id/visible", patch(patch_visibility))
        .route("/admin/persona/:id/undelete", patch(undelete_persona))
        .route("/persona", get(list_personas).post(create_persona))
        .route("/persona/utils/prompt-explorer", get(build_final_template_prompt))
        .route(
            "/persona/:id",
            get(get_persona).patch(update_persona).delete(delete_persona),
        )
        .with_state(state)
}

// =============================================================================
// Rejection mapping
// =============================================================================

fn path_id(path: std::result::Result<Path<PersonaId>, PathRejection>) -> Result<PersonaId> {
    path.map(|Path(id)| id)
        .map_err(|e| Error::validation("id", e.body_text()))
}

fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(v)| v)
        .map_err(|e| Error::validation("body", e.body_text()))
}

fn query_params<T>(query: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    query
        .map(|Query(v)| v)
        .map_err(|e| Error::validation("query", e.body_text()))
}

// =============================================================================
// Admin handlers
// =============================================================================

/// PATCH /admin/persona/:id/visible
async fn patch_visibility(
    State(state): State<PersonasState>,
    CurrentAdmin(_): CurrentAdmin,
    id: std::result::Result<Path<PersonaId>, PathRejection>,
    body: std::result::Result<Json<IsVisibleRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let id = path_id(id)?;
    let request = json_body(body)?;
    state.store.set_visibility(id, request.is_visible).await?;
    Ok(StatusCode::OK)
}

/// PUT /admin/persona/display-priority
async fn patch_display_priority(
    State(state): State<PersonasState>,
    CurrentAdmin(_): CurrentAdmin,
    body: std::result::Result<Json<DisplayPriorityRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let request = json_body(body)?;
    state
        .store
        .set_display_priorities(&request.display_priority_map)
        .await?;
    Ok(StatusCode::OK)
}

/// GET /admin/persona
async fn list_personas_admin(
    State(state): State<PersonasState>,
    CurrentAdmin(caller): CurrentAdmin,
    query: std::result::Result<Query<ListPersonasQuery>, QueryRejection>,
) -> Result<Json<Vec<PersonaSnapshot>>> {
    let params = query_params(query)?;
    let personas = state
        .store
        .list(&caller, ListScope::All, params.include_deleted)
        .await;
    Ok(Json(personas.into_iter().map(PersonaSnapshot::from).collect()))
}

/// PATCH /admin/persona/:id/undelete
async fn undelete_persona(
    State(state): State<PersonasState>,
    CurrentAdmin(_): CurrentAdmin,
    id: std::result::Result<Path<PersonaId>, PathRejection>,
) -> Result<StatusCode> {
    state.store.undelete(path_id(id)?).await?;
    Ok(StatusCode::OK)
}

// =============================================================================
// User handlers
// =============================================================================

/// POST /persona
async fn create_persona(
    State(state): State<PersonasState>,
    CurrentUser(caller): CurrentUser,
    body: std::result::Result<Json<CreatePersonaRequest>, JsonRejection>,
) -> Result<Json<PersonaSnapshot>> {
    let request = json_body(body)?;
    let persona = state.store.create(&caller, request).await?;
    Ok(Json(persona.into()))
}

/// PATCH /persona/:id
async fn update_persona(
    State(state): State<PersonasState>,
    CurrentUser(caller): CurrentUser,
    id: std::result::Result<Path<PersonaId>, PathRejection>,
    body: std::result::Result<Json<CreatePersonaRequest>, JsonRejection>,
) -> Result<Json<PersonaSnapshot>> {
    let id = path_id(id)?;
    let request = json_body(body)?;
    let persona = state.store.update(id, request, &caller).await?;
    Ok(Json(persona.into()))
}

/// DELETE /persona/:id
async fn delete_persona(
    State(state): State<PersonasState>,
    CurrentUser(caller): CurrentUser,
    id: std::result::Result<Path<PersonaId>, PathRejection>,
) -> Result<StatusCode> {
    state.store.delete(path_id(id)?, &caller).await?;
    Ok(StatusCode::OK)
}

/// GET /persona
async fn list_personas(
    State(state): State<PersonasState>,
    CurrentUser(caller): CurrentUser,
    query: std::result::Result<Query<ListPersonasQuery>, QueryRejection>,
) -> Result<Json<Vec<PersonaSnapshot>>> {
    let params = query_params(query)?;
    let personas = state
        .store
        .list(&caller, ListScope::Accessible, params.include_deleted)
        .await;
    Ok(Json(personas.into_iter().map(PersonaSnapshot::from).collect()))
}

/// GET /persona/:id
async fn get_persona(
    State(state): State<PersonasState>,
    CurrentUser(caller): CurrentUser,
    id: std::result::Result<Path<PersonaId>, PathRejection>,
) -> Result<Json<PersonaSnapshot>> {
    let persona = state.store.get(path_id(id)?, &caller).await?;
    Ok(Json(persona.into()))
}

/// GET /persona/utils/prompt-explorer
async fn build_final_template_prompt(
    CurrentUser(_): CurrentUser,
    query: std::result::Result<Query<PromptExplorerQuery>, QueryRejection>,
) -> Result<Json<PromptTemplateResponse>> {
    let params = query_params(query)?;
    Ok(Json(PromptTemplateResponse {
        final_prompt_template: build_dummy_prompt(
            &params.system_prompt,
            &params.task_prompt,
            params.retrieval_disabled,
        ),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserRole;
    use crate::config::{AuthConfig, AuthUser, PersonasConfig, UnknownIdPolicy};
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use uuid::Uuid;

    const ADMIN: &str = "admin-token";
    const ALICE: &str = "alice-token";
    const BOB: &str = "bob-token";

    async fn make_app() -> (Router, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            PersonaStore::open(
                dir.path().to_path_buf(),
                &PersonasConfig {
                    seed_builtin: false,
                    unknown_id_policy: UnknownIdPolicy::FailFast,
                },
            )
            .await
            .unwrap(),
        );
        let auth = AuthConfig {
            disabled: false,
            users: [(ADMIN, UserRole::Admin), (ALICE, UserRole::Basic), (BOB, UserRole::Basic)]
                .into_iter()
                .map(|(token, role)| AuthUser {
                    token: token.to_string(),
                    id: Uuid::new_v4(),
                    email: format!("{}@example.com", token),
                    role,
                })
                .collect(),
        };
        let state = PersonasState {
            store,
            resolver: Arc::new(PrincipalResolver::from_config(&auth)),
        };
        (personas_router(state), dir)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 64)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn create(app: &Router, token: &str, name: &str) -> u64 {
        let resp = send(
            app,
            "POST",
            "/persona",
            Some(token),
            Some(serde_json::json!({ "name": name })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        body_json(resp).await["id"].as_u64().unwrap()
    }

    fn listed_ids(json: &serde_json::Value) -> Vec<u64> {
        json.as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_u64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_create_and_get_persona() {
        let (app, _dir) = make_app().await;

        let resp = send(
            &app,
            "POST",
            "/persona",
            Some(ALICE),
            Some(serde_json::json!({
                "name": "Tax Specialist",
                "description": "Corporate tax planning",
                "system_prompt": "You are a tax specialist."
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let created = body_json(resp).await;
        assert_eq!(created["name"], "Tax Specialist");
        assert_eq!(created["is_visible"], true);
        assert_eq!(created["default_persona"], false);
        assert!(created["owner_id"].is_string());

        let id = created["id"].as_u64().unwrap();
        let resp = send(&app, "GET", &format!("/persona/{}", id), Some(ALICE), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let fetched = body_json(resp).await;
        assert_eq!(fetched["owner_id"], created["owner_id"]);
    }

    #[tokio::test]
    async fn test_create_validation_error() {
        let (app, _dir) = make_app().await;

        let resp = send(
            &app,
            "POST",
            "/persona",
            Some(ALICE),
            Some(serde_json::json!({ "name": "  " })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["field"], "name");

        let resp = send(
            &app,
            "POST",
            "/persona",
            Some(ALICE),
            Some(serde_json::json!({ "description": "no name" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(resp).await["error"]["field"], "body");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let (app, _dir) = make_app().await;
        let resp = send(&app, "GET", "/persona", None, None).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_admin_routes_forbidden_for_basic_users() {
        let (app, _dir) = make_app().await;
        let id = create(&app, ALICE, "Mine").await;

        let resp = send(&app, "GET", "/admin/persona", Some(ALICE), None).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = send(
            &app,
            "PATCH",
            &format!("/admin/persona/{}/visible", id),
            Some(ALICE),
            Some(serde_json::json!({ "is_visible": false })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = send(
            &app,
            "PATCH",
            &format!("/admin/persona/{}/undelete", id),
            Some(ALICE),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_update_persona() {
        let (app, _dir) = make_app().await;
        let id = create(&app, ALICE, "My Agent").await;

        let resp = send(
            &app,
            "PATCH",
            &format!("/persona/{}", id),
            Some(ALICE),
            Some(serde_json::json!({
                "name": "My Updated Agent",
                "system_prompt": "Updated prompt"
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["name"], "My Updated Agent");
        assert_eq!(json["system_prompt"], "Updated prompt");

        let resp = send(
            &app,
            "PATCH",
            &format!("/persona/{}", id),
            Some(BOB),
            Some(serde_json::json!({ "name": "Hacked" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = send(
            &app,
            "PATCH",
            "/persona/4242",
            Some(ALICE),
            Some(serde_json::json!({ "name": "Ghost" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_and_undelete_flow() {
        let (app, _dir) = make_app().await;
        let id = create(&app, ALICE, "Temp").await;
        let uri = format!("/persona/{}", id);

        for _ in 0..2 {
            let resp = send(&app, "DELETE", &uri, Some(ALICE), None).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let resp = send(&app, "GET", &uri, Some(ALICE), None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(&app, "GET", &uri, Some(ADMIN), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["is_deleted"], true);

        let resp = send(&app, "GET", "/persona?include_deleted=true", Some(ALICE), None).await;
        assert!(listed_ids(&body_json(resp).await).is_empty());

        let resp = send(&app, "GET", "/admin/persona", Some(ADMIN), None).await;
        assert!(listed_ids(&body_json(resp).await).is_empty());
        let uri = "/admin/persona?include_deleted=true";
        let resp = send(&app, "GET", uri, Some(ADMIN), None).await;
        assert_eq!(listed_ids(&body_json(resp).await), vec![id]);

        let resp = send(
            &app,
            "PATCH",
            &format!("/admin/persona/{}/undelete", id),
            Some(ADMIN),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send(&app, "GET", &uri, Some(ALICE), None).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let (app, _dir) = make_app().await;
        let resp = send(&app, "DELETE", "/persona/55", Some(ALICE), None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_visibility_patch() {
        let (app, _dir) = make_app().await;
        let id = create(&app, ADMIN, "Hidden soon").await;

        let resp = send(
            &app,
            "PATCH",
            &format!("/admin/persona/{}/visible", id),
            Some(ADMIN),
            Some(serde_json::json!({ "is_visible": false })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send(&app, "GET", "/admin/persona", Some(ADMIN), None).await;
        let json = body_json(resp).await;
        assert_eq!(json[0]["is_visible"], false);

        let resp = send(
            &app,
            "PATCH",
            &format!("/admin/persona/{}/visible", id),
            Some(ADMIN),
            Some(serde_json::json!({ "is_visible": "nope" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_display_priority_batch() {
        let (app, _dir) = make_app().await;
        let a = create(&app, ADMIN, "A").await;
        let b = create(&app, ADMIN, "B").await;

        let resp = send(
            &app,
            "PUT",
            "/admin/persona/display-priority",
            Some(ADMIN),
            Some(serde_json::json!({
                "display_priority_map": { a.to_string(): 5, b.to_string(): 1 }
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send(&app, "GET", "/admin/persona", Some(ADMIN), None).await;
        assert_eq!(listed_ids(&body_json(resp).await), vec![b, a]);

        let resp = send(
            &app,
            "PUT",
            "/admin/persona/display-priority",
            Some(ADMIN),
            Some(serde_json::json!({ "display_priority_map": { a.to_string(): 0, "999": 0 } })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(&app, "GET", "/admin/persona", Some(ADMIN), None).await;
        let json = body_json(resp).await;
        assert_eq!(listed_ids(&json), vec![b, a]);
        assert_eq!(json[1]["display_priority"], 5);

        let resp = send(
            &app,
            "PUT",
            "/admin/persona/display-priority",
            Some(ADMIN),
            Some(serde_json::json!({ "display_priority_map": { "not-an-id": 1 } })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_user_listing_scope() {
        let (app, _dir) = make_app().await;
        let alices = create(&app, ALICE, "Alice's").await;
        let bobs = create(&app, BOB, "Bob's").await;

        let resp = send(&app, "GET", "/persona", Some(ALICE), None).await;
        assert_eq!(listed_ids(&body_json(resp).await), vec![alices]);

        let resp = send(&app, "GET", &format!("/persona/{}", bobs), Some(ALICE), None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(&app, "GET", "/admin/persona", Some(ADMIN), None).await;
        assert_eq!(listed_ids(&body_json(resp).await), vec![alices, bobs]);
    }

    #[tokio::test]
    async fn test_invalid_path_id() {
        let (app, _dir) = make_app().await;
        let resp = send(&app, "GET", "/persona/abc", Some(ALICE), None).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(resp).await["error"]["field"], "id");
    }

    #[tokio::test]
    async fn test_prompt_explorer() {
        let (app, _dir) = make_app().await;

        let resp = send(
            &app,
            "GET",
            concat!(
                "/persona/utils/prompt-explorer",
                "?system_prompt=Be%20kind&task_prompt=Answer&retrieval_disabled=true"
            ),
            Some(ALICE),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(
            json["final_prompt_template"],
            "Be kind\n\nAnswer\n\nQUERY: <USER_QUERY>\nRESPONSE:"
        );

        let resp = send(
            &app,
            "GET",
            "/persona/utils/prompt-explorer?system_prompt=Be%20kind&task_prompt=Answer",
            Some(ALICE),
            None,
        )
        .await;
        let json = body_json(resp).await;
        assert!(json["final_prompt_template"]
            .as_str()
            .unwrap()
            .contains("<CONTEXT_DOCS>"));

        let resp = send(
            &app,
            "GET",
            "/persona/utils/prompt-explorer?system_prompt=x",
            Some(ALICE),
            None,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
