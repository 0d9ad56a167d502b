//! Maps a verified subject to the live account record.
//!
//! Every call goes to the store. Nothing here is cached, so a ban or role change is
//! visible on the very next request. Store failures and timeouts are errors, never
//! `NotFound`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repos::{error::RepoError, user_repo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            r if r.eq_ignore_ascii_case("admin") => Ok(Role::Admin),
            r if r.eq_ignore_ascii_case("user") => Ok(Role::User),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Authoritative, database-backed identity tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedPrincipal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub banned: bool,
}

impl ConfirmedPrincipal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PrincipalStoreError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("principal lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("principal store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of the account store.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    // Returns the store name (for logging).
    fn backend_name(&self) -> &'static str;

    async fn find(&self, id: Uuid) -> Result<Option<ConfirmedPrincipal>, PrincipalStoreError>;
}

/// Postgres-backed principal store.
#[derive(Clone, Debug)]
pub struct PgPrincipalStore {
    db: PgPool,
}

impl PgPrincipalStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn find(&self, id: Uuid) -> Result<Option<ConfirmedPrincipal>, PrincipalStoreError> {
        let Some(row) = user_repo::find_principal(&self.db, id).await? else {
            return Ok(None);
        };

        // Unknown roles get the least privilege.
        let role = row.role.parse::<Role>().unwrap_or_else(|err: UnknownRole| {
            tracing::warn!(user_id = %row.id, error = %err, "treating unknown role as User");
            Role::User
        });

        Ok(Some(ConfirmedPrincipal {
            id: row.id,
            email: row.email,
            role,
            banned: row.banned,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(ConfirmedPrincipal),
    NotFound,
}

/// Fresh, time-bounded principal lookups.
#[derive(Clone)]
pub struct PrincipalResolver {
    store: Arc<dyn PrincipalStore>,
    timeout: Duration,
}

impl fmt::Debug for PrincipalResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrincipalResolver")
            .field("store", &self.store.backend_name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PrincipalResolver {
    pub fn new(store: Arc<dyn PrincipalStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn resolve(&self, subject_id: &str) -> Result<Resolution, PrincipalStoreError> {
        // Account ids are UUIDs; any other subject cannot name an account.
        let Ok(id) = Uuid::parse_str(subject_id.trim()) else {
            return Ok(Resolution::NotFound);
        };

        match tokio::time::timeout(self.timeout, self.store.find(id)).await {
            Ok(Ok(Some(principal))) => Ok(Resolution::Found(principal)),
            Ok(Ok(None)) => Ok(Resolution::NotFound),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(PrincipalStoreError::Timeout(self.timeout)),
        }
    }
}
