use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{GatewayError, GatewayResult};

/// One row of `GET /routes/search`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteSearchRow {
    pub route_id: i64,
    #[serde(default)]
    pub train_number: Option<String>,
    #[serde(default)]
    pub departure_time: Option<String>,
    #[serde(default)]
    pub arrival_time: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub available_seats: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrainRef {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default, rename = "type")]
    pub train_type: Option<String>,
}

/// `GET /routes/{id}`. Only the nested train is of interest to the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteDetail {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub train: Option<TrainRef>,
}

impl RouteDetail {
    pub fn train_id(&self) -> Option<i64> {
        self.train.as_ref().and_then(|train| train.id).filter(|id| *id != 0)
    }
}

/// Pull the `error` field out of a JSON error body.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Decode a route search body, insisting on a JSON array.
pub fn decode_route_rows(body: &str) -> GatewayResult<Vec<RouteSearchRow>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::Malformed(format!("could not parse server response: {}", e)))?;

    match value {
        Value::Array(_) => serde_json::from_value(value)
            .map_err(|e| GatewayError::Malformed(format!("unexpected route row shape: {}", e))),
        Value::Null => Err(GatewayError::Malformed("server returned an empty response".to_string())),
        Value::Object(ref fields) if fields.contains_key("error") => {
            let message = fields
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("server reported an error")
                .to_string();
            Err(GatewayError::Malformed(message))
        }
        other => Err(GatewayError::Malformed(format!(
            "expected an array of routes, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
