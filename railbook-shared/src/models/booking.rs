use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::pii::Masked;

/// Step 1 of a booking: where from, where to and when.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    pub origin_city: String,
    pub destination_city: String,
    pub travel_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Train {
    pub id: i64,
    pub number: String,
    #[serde(rename = "type")]
    pub train_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub name: String,
    pub city: String,
}

impl Station {
    pub fn in_city(city: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            city: city.into(),
        }
    }
}

/// A bookable scheduled route as presented to the passenger.
/// Sourced from the route search endpoint and never mutated locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteOffer {
    pub id: i64,
    pub schedule_name: String,
    pub train: Train,
    pub origin_station: Station,
    pub destination_station: Station,
    pub departure_time: String,
    pub arrival_time: String,
    pub duration_label: String,
    pub unit_price: f64,
    pub available_seat_count: u32,
}

/// One specific seat tied to one route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeatSelection {
    pub route_id: i64,
    pub seat_id: i64,
    pub carriage_id: i64,
    pub carriage_number: u32,
    pub seat_number: u32,
    pub price: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassengerDetails {
    pub first_name: String,
    pub last_name: String,
    pub travel_document_id: Masked<String>,
}

impl PassengerDetails {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        travel_document_id: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            travel_document_id: Masked(travel_document_id.into()),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}
