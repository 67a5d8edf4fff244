use serde::{Deserialize, Serialize};

use crate::pii::Masked;
use super::booking::PassengerDetails;

/// The authenticated user as returned by `/users/me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_data: Option<Masked<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl UserProfile {
    /// Passenger details pre-populated from the profile. Missing fields stay empty.
    pub fn as_passenger(&self) -> PassengerDetails {
        PassengerDetails {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            travel_document_id: self.passport_data.clone().unwrap_or_default(),
        }
    }
}
