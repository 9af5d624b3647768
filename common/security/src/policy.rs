use std::sync::Arc;

use async_trait::async_trait;
use common_auth::AuthContext;
use tracing::{debug, error, warn};

use crate::roles::Role;
use crate::SecurityError;

pub type LookupError = Box<dyn std::error::Error + Send + Sync>;

/// Source of truth for stored roles. Implemented by the credential store.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// `Ok(None)` when no credential record exists for `email`.
    async fn role_of(&self, email: &str) -> Result<Option<Role>, LookupError>;
}

/// Authorization level an operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    Public,
    Authenticated,
    /// Caller email must equal the resource owner.
    Owner(&'a str),
    /// Caller's stored role must be admin.
    Admin,
    OwnerOrAdmin(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

#[derive(Clone)]
pub struct AccessPolicy {
    directory: Arc<dyn RoleDirectory>,
}

impl AccessPolicy {
    pub fn new(directory: Arc<dyn RoleDirectory>) -> Self {
        Self { directory }
    }

    /// Only `Admin`/`OwnerOrAdmin` touch the directory, and they do so on
    /// every call: roles can change after a token was issued.
    pub async fn decide(
        &self,
        auth: Option<&AuthContext>,
        scope: Scope<'_>,
    ) -> Result<Decision, SecurityError> {
        let email = match (scope, auth) {
            (Scope::Public, _) => return Ok(Decision::Allow),
            (_, None) => return Ok(Decision::Deny),
            (_, Some(auth)) => auth.email(),
        };

        match scope {
            Scope::Public | Scope::Authenticated => Ok(Decision::Allow),
            Scope::Owner(owner) => Ok(allow_if(email == owner)),
            Scope::Admin => self.admin_decision(email).await,
            Scope::OwnerOrAdmin(owner) => {
                if email == owner {
                    Ok(Decision::Allow)
                } else {
                    self.admin_decision(email).await
                }
            }
        }
    }

    pub async fn authorize(
        &self,
        auth: Option<&AuthContext>,
        scope: Scope<'_>,
    ) -> Result<(), SecurityError> {
        match self.decide(auth, scope).await? {
            Decision::Allow => Ok(()),
            Decision::Deny => {
                warn!(
                    email = auth.map(|a| a.email()).unwrap_or("<anonymous>"),
                    ?scope,
                    "access denied"
                );
                Err(SecurityError::Forbidden)
            }
        }
    }

    pub async fn is_admin(&self, email: &str) -> Result<bool, SecurityError> {
        Ok(self.admin_decision(email).await? == Decision::Allow)
    }

    async fn admin_decision(&self, email: &str) -> Result<Decision, SecurityError> {
        match self.directory.role_of(email).await {
            Ok(Some(role)) => Ok(allow_if(role.is_admin())),
            Ok(None) => {
                debug!(email, "no credential record for admin check");
                Ok(Decision::Deny)
            }
            Err(err) => {
                error!(email, error = %err, "role lookup failed");
                Err(SecurityError::Lookup(err.to_string()))
            }
        }
    }
}

fn allow_if(condition: bool) -> Decision {
    if condition {
        Decision::Allow
    } else {
        Decision::Deny
    }
}
