use railbook_core::identity::{ProfileUpdate, Registration};
use railbook_core::repository::{AuthProvider, ProfileRepository};
use railbook_core::{GatewayError, Session, SessionContext};
use railbook_shared::{Masked, UserProfile};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::BookingError;

const MIN_PASSWORD_LEN: usize = 8;

/// Login, registration and logout on top of the shared [`SessionContext`].
#[derive(Clone)]
pub struct AuthService {
    auth: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileRepository>,
    session: SessionContext,
}

impl AuthService {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileRepository>,
        session: SessionContext,
    ) -> Self {
        Self { auth, profiles, session }
    }

    /// Exchange credentials for a token, load the profile and persist both together.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, BookingError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(BookingError::InvalidInput("Введите email и пароль".to_string()));
        }

        let token = self.auth.login(email, password).await.map_err(|e| match e {
            GatewayError::Unauthenticated | GatewayError::Rejected { status: 400..=403, .. } => {
                BookingError::InvalidInput("Неверный email или пароль".to_string())
            }
            other => other.into(),
        })?;
        let profile = self.profiles.fetch_profile(&token).await?;

        self.session
            .establish(Session { token: Masked(token), profile: profile.clone() })
            .await?;
        info!("Logged in as user {}", profile.id);
        Ok(profile)
    }

    /// Create an account. Passport data, when given, is pushed as a profile update
    /// afterwards; its failure does not undo the registration.
    pub async fn register(
        &self,
        registration: Registration,
        password_confirmation: &str,
    ) -> Result<UserProfile, BookingError> {
        if registration.email.trim().is_empty() {
            return Err(BookingError::InvalidInput("Введите email".to_string()));
        }
        if registration.password.expose().chars().count() < MIN_PASSWORD_LEN {
            return Err(BookingError::InvalidInput(
                "Пароль должен содержать минимум 8 символов".to_string(),
            ));
        }
        if registration.password.expose() != password_confirmation {
            return Err(BookingError::InvalidInput("Пароли не совпадают".to_string()));
        }

        let grant = self.auth.register(&registration).await?;
        let token = grant.token.into_inner();
        let mut profile = match grant.user {
            Some(user) => user,
            None => self.profiles.fetch_profile(&token).await?,
        };

        if let Some(passport) = registration.passport_data.filter(|p| !p.is_blank()) {
            let update = ProfileUpdate {
                passport_data: Some(passport.clone()),
                ..Default::default()
            };
            match self.profiles.update_profile(&token, &update).await {
                Ok(()) => profile.passport_data = Some(passport),
                Err(e) => warn!("Failed to store passport data after registration: {}", e),
            }
        }

        self.session
            .establish(Session { token: Masked(token), profile: profile.clone() })
            .await?;
        info!("Registered user {}", profile.id);
        Ok(profile)
    }

    pub async fn logout(&self) -> Result<(), BookingError> {
        self.session.logout().await?;
        Ok(())
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.session.profile()
    }
}
