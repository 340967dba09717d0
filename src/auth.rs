//! Principal resolution and access tiers
//!
//! Requests carry `Authorization: Bearer <token>`; the token is looked up in
//! the static table from [`AuthConfig`]. Handlers never see raw headers, they
//! take a [`CurrentUser`] or [`CurrentAdmin`] extractor instead.

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Role attached to a configured user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Basic,
    Admin,
}

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

/// Who is acting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    User(UserIdentity),
}

impl Principal {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Principal::Anonymous => None,
            Principal::User(user) => Some(user.id),
        }
    }
}

/// Authorization tier the caller was granted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTier {
    Basic,
    Admin,
}

/// A resolved principal together with its tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub principal: Principal,
    pub tier: AccessTier,
}

impl Caller {
    /// Caller used when principal resolution is disabled
    pub fn anonymous_admin() -> Self {
        Self {
            principal: Principal::Anonymous,
            tier: AccessTier::Admin,
        }
    }

    pub fn user(identity: UserIdentity) -> Self {
        let tier = match identity.role {
            UserRole::Admin => AccessTier::Admin,
            UserRole::Basic => AccessTier::Basic,
        };
        Self {
            principal: Principal::User(identity),
            tier,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.tier == AccessTier::Admin
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.principal.user_id()
    }
}

/// Maps bearer tokens to callers
#[derive(Debug, Default)]
pub struct PrincipalResolver {
    disabled: bool,
    tokens: HashMap<String, UserIdentity>,
}

impl PrincipalResolver {
    pub fn from_config(config: &AuthConfig) -> Self {
        let tokens = config
            .users
            .iter()
            .map(|u| {
                (
                    u.token.clone(),
                    UserIdentity {
                        id: u.id,
                        email: u.email.clone(),
                        role: u.role,
                    },
                )
            })
            .collect();
        Self {
            disabled: config.disabled,
            tokens,
        }
    }

    /// Resolver that treats every request as an anonymous admin
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            tokens: HashMap::new(),
        }
    }

    /// Resolve the caller for a request
    pub fn resolve(&self, headers: &HeaderMap) -> Result<Caller> {
        if self.disabled {
            return Ok(Caller::anonymous_admin());
        }

        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or_else(|| Error::Unauthorized("Missing bearer token".to_string()))?;

        self.tokens
            .get(token)
            .cloned()
            .map(Caller::user)
            .ok_or_else(|| Error::Unauthorized("Unknown bearer token".to_string()))
    }
}

/// Any authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Caller);

/// An admin-tier caller; everyone else gets 403
#[derive(Debug, Clone)]
pub struct CurrentAdmin(pub Caller);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<PrincipalResolver>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let resolver = Arc::<PrincipalResolver>::from_ref(state);
        resolver.resolve(&parts.headers).map(CurrentUser)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentAdmin
where
    Arc<PrincipalResolver>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let resolver = Arc::<PrincipalResolver>::from_ref(state);
        let caller = resolver.resolve(&parts.headers)?;
        if !caller.is_admin() {
            return Err(Error::Forbidden("Admin access required".to_string()));
        }
        Ok(CurrentAdmin(caller))
    }
}
