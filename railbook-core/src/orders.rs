use serde::{Deserialize, Serialize};
use railbook_shared::OrderStatus;

/// A ticket inside a backend order record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendTicket {
    pub id: i64,
    #[serde(default)]
    pub ticket_number: String,
    #[serde(default)]
    pub seat_number: Option<u32>,
    #[serde(default)]
    pub carriage_number: Option<u32>,
    #[serde(default)]
    pub price: Option<f64>,
}

/// An order as stored by the backend (`GET /orders`).
/// Route and train fields are optional upstream and are defaulted when mapped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendOrder {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub route_id: Option<i64>,
    #[serde(default)]
    pub route_name: Option<String>,
    #[serde(default)]
    pub train_number: Option<String>,
    #[serde(default)]
    pub train_type: Option<String>,
    #[serde(default)]
    pub departure_city: Option<String>,
    #[serde(default)]
    pub arrival_city: Option<String>,
    #[serde(default)]
    pub departure_time: Option<String>,
    #[serde(default)]
    pub arrival_time: Option<String>,
    pub created_at: String,
    pub status: OrderStatus,
    pub total_amount: f64,
    #[serde(default)]
    pub tickets: Vec<BackendTicket>,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub route_id: i64,
    pub seat_id: i64,
    pub price: f64,
}

/// Response of `POST /orders`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub id: i64,
    pub created_at: String,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}
