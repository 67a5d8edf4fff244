use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::info;

use railbook_shared::{Masked, UserProfile};

use crate::CredentialError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: Masked<String>,
    pub first_name: String,
    pub last_name: String,
    /// Not part of `/auth/register`; pushed with a profile update afterwards.
    #[serde(skip)]
    pub passport_data: Option<Masked<String>>,
}

/// Response of `/auth/register` (and `/auth/login` when the backend includes the user).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthGrant {
    pub token: Masked<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Body of `PUT /users/me`. Absent fields are left untouched by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_data: Option<Masked<String>>,
}

/// The authenticated identity: profile and bearer credential, always stored together.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: Masked<String>,
    pub profile: UserProfile,
}

/// Device-local persistence of the session
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<Session>, CredentialError>;

    async fn save(&self, session: &Session) -> Result<(), CredentialError>;

    async fn clear(&self) -> Result<(), CredentialError>;
}

/// Keeps the session in memory only. Used when nothing should touch the disk.
#[derive(Default)]
pub struct MemoryCredentialStore {
    saved: Mutex<Option<Session>>,
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<Session>, CredentialError> {
        Ok(self.saved.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    async fn save(&self, session: &Session) -> Result<(), CredentialError> {
        *self.saved.lock().unwrap_or_else(|p| p.into_inner()) = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialError> {
        *self.saved.lock().unwrap_or_else(|p| p.into_inner()) = None;
        Ok(())
    }
}

/// Explicit session context shared by every component that needs the identity.
///
/// Lifecycle: `restore` (or `establish`) at session start, `logout` at teardown.
/// Subscribers are notified of every change through a watch channel.
#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn CredentialStore>,
    current: Arc<watch::Sender<Option<Session>>>,
}

impl SessionContext {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            store,
            current: Arc::new(current),
        }
    }

    /// An unauthenticated context backed by memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCredentialStore::default()))
    }

    /// Load the persisted session, if any. Returns whether one was found.
    pub async fn restore(&self) -> Result<bool, CredentialError> {
        let saved = self.store.load().await?;
        let found = saved.is_some();
        if let Some(session) = &saved {
            info!("Restored session for user {}", session.profile.id);
        }
        self.current.send_replace(saved);
        Ok(found)
    }

    pub async fn establish(&self, session: Session) -> Result<(), CredentialError> {
        self.store.save(&session).await?;
        info!("Session established for user {}", session.profile.id);
        self.current.send_replace(Some(session));
        Ok(())
    }

    /// Apply a local change to the stored profile. No-op when logged out.
    pub async fn amend_profile<F>(&self, amend: F) -> Result<(), CredentialError>
    where
        F: FnOnce(&mut UserProfile),
    {
        let Some(mut session) = self.current.borrow().clone() else {
            return Ok(());
        };
        amend(&mut session.profile);
        self.store.save(&session).await?;
        self.current.send_replace(Some(session));
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), CredentialError> {
        let previous = self.current.send_replace(None);
        if let Some(session) = previous {
            info!("Session closed for user {}", session.profile.id);
        }
        self.store.clear().await
    }

    pub fn token(&self) -> Option<String> {
        self.current
            .borrow()
            .as_ref()
            .map(|session| session.token.expose().clone())
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.current.borrow().as_ref().map(|session| session.profile.clone())
    }

    pub fn identity(&self) -> Option<i64> {
        self.current.borrow().as_ref().map(|session| session.profile.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }
}
