use railbook_catalog::InventoryError;
use railbook_core::{CredentialError, GatewayError};
use std::fmt;

use crate::draft::Stage;

/// Draft field a stage operation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    SearchCriteria,
    Route,
    Seat,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Requirement::SearchCriteria => "search criteria",
            Requirement::Route => "route",
            Requirement::Seat => "seat",
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookingError {
    #[error("No {missing} selected yet, go back to {redirect}")]
    ValidationGap { missing: Requirement, redirect: Stage },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Seat is not available")]
    SeatUnavailable,

    #[error("Route is not among the loaded offers")]
    UnknownRoute,

    #[error("Request rejected with status {status}")]
    UpstreamRejection { status: u16, message: Option<String> },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Transient fetch failure: {0}")]
    TransientFetchFailure(String),

    #[error("Session storage failed: {0}")]
    Session(String),
}

impl BookingError {
    /// Text shown to the user: the server's own message when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            BookingError::UpstreamRejection { message: Some(message), .. } => message.clone(),
            BookingError::MalformedResponse(message) => message.clone(),
            BookingError::InvalidInput(message) => message.clone(),
            BookingError::ValidationGap { redirect, .. } => {
                format!("Сначала завершите шаг «{}»", redirect.title())
            }
            BookingError::NotAuthenticated => "Необходимо войти в систему".to_string(),
            BookingError::SeatUnavailable => "Место уже занято, выберите другое".to_string(),
            BookingError::UnknownRoute => "Маршрут не найден".to_string(),
            BookingError::UpstreamRejection { .. } | BookingError::TransientFetchFailure(_) => {
                "Сервер недоступен, попробуйте позже".to_string()
            }
            BookingError::Session(_) => "Не удалось сохранить сессию".to_string(),
        }
    }

    /// Stage the user should be sent back to, if any.
    pub fn redirect(&self) -> Option<Stage> {
        match self {
            BookingError::ValidationGap { redirect, .. } => Some(*redirect),
            _ => None,
        }
    }
}

impl From<GatewayError> for BookingError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unauthenticated => BookingError::NotAuthenticated,
            GatewayError::Rejected { status, message } => {
                BookingError::UpstreamRejection { status, message }
            }
            GatewayError::Malformed(message) => BookingError::MalformedResponse(message),
            GatewayError::Transport(message) => BookingError::TransientFetchFailure(message),
        }
    }
}

impl From<InventoryError> for BookingError {
    fn from(err: InventoryError) -> Self {
        BookingError::TransientFetchFailure(err.to_string())
    }
}

impl From<CredentialError> for BookingError {
    fn from(err: CredentialError) -> Self {
        BookingError::Session(err.to_string())
    }
}
