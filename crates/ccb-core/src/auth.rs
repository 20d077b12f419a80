//! Authentication collaborator
//!
//! The session only loads the chart bundle once the provider reports an
//! authenticated user.

use crate::api::LuzmoClient;
use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::Mutex;

/// Organization a user belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization id
    pub id: String,
    /// Localized name
    #[serde(default)]
    pub name: Value,
}

/// Authenticated backend user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User id
    pub id: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Organizations, the first one is the active one
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

/// Source of authentication state
#[async_trait]
pub trait AuthProvider: Send + Sync + fmt::Debug {
    /// Whether credentials are present and usable
    fn is_authenticated(&self) -> bool;

    /// Current user, loaded on first use
    ///
    /// `Ok(None)` when the backend knows no such user or the user has no
    /// organization.
    async fn get_or_load_user(&self) -> Result<Option<User>, ApiError>;
}

/// Provider over fixed API credentials
#[derive(Debug)]
pub struct StaticAuth {
    authenticated: bool,
    client: Option<LuzmoClient>,
    user: Mutex<Option<User>>,
}

impl StaticAuth {
    /// Provider backed by a client; authenticated when it has credentials
    #[must_use]
    pub fn from_client(client: LuzmoClient) -> Self {
        Self {
            authenticated: client.has_credentials(),
            client: Some(client),
            user: Mutex::new(None),
        }
    }

    /// Provider with a fixed answer and no user backend
    #[must_use]
    pub fn fixed(authenticated: bool) -> Self {
        Self {
            authenticated,
            client: None,
            user: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn get_or_load_user(&self) -> Result<Option<User>, ApiError> {
        let mut cached = self.user.lock().await;
        if let Some(user) = cached.as_ref() {
            return Ok(Some(user.clone()));
        }
        let Some(client) = &self.client else {
            return Ok(None);
        };

        let result = client.load_user("me").await?;
        let Some(user) = result.rows.into_iter().next() else {
            tracing::warn!("no user returned for credentials");
            return Ok(None);
        };
        if user.organizations.is_empty() {
            tracing::warn!(user = %user.id, "user has no organization");
            return Ok(None);
        }

        tracing::info!(user = %user.id, "user loaded");
        *cached = Some(user.clone());
        Ok(Some(user))
    }
}
