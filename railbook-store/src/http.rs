use async_trait::async_trait;
use railbook_core::identity::{AuthGrant, ProfileUpdate, Registration};
use railbook_core::orders::{BackendOrder, CreateOrderRequest, CreatedOrder};
use railbook_core::repository::{AuthProvider, OrderRepository, ProfileRepository, RouteRepository};
use railbook_core::search::{decode_route_rows, error_message, RouteDetail, RouteSearchRow};
use railbook_core::{GatewayError, GatewayResult};
use railbook_shared::{SearchCriteria, UserProfile};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::app_config::ApiConfig;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// REST gateway to the booking backend. Implements every port in
/// `railbook_core::repository`.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ApiConfig) -> GatewayResult<Self> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> GatewayResult<Response> {
        let response = request.send().await.map_err(|e| {
            warn!("Backend unreachable: {}", e);
            GatewayError::Transport(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!("Backend answered {} with body {:?}", status, body);
        if status == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Unauthenticated);
        }
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn text(&self, request: RequestBuilder) -> GatewayResult<String> {
        self.send(request)
            .await?
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> GatewayResult<T> {
        let body = self.text(request).await?;
        serde_json::from_str(&body)
            .map_err(|e| GatewayError::Malformed(format!("could not parse server response: {}", e)))
    }
}

#[async_trait]
impl AuthProvider for ApiClient {
    async fn login(&self, email: &str, password: &str) -> GatewayResult<String> {
        let request = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest { email, password });
        let grant: AuthGrant = self.json(request).await?;
        Ok(grant.token.into_inner())
    }

    async fn register(&self, registration: &Registration) -> GatewayResult<AuthGrant> {
        let request = self.client.post(self.url("/auth/register")).json(registration);
        self.json(request).await
    }
}

#[async_trait]
impl ProfileRepository for ApiClient {
    async fn fetch_profile(&self, token: &str) -> GatewayResult<UserProfile> {
        let request = self.client.get(self.url("/users/me")).bearer_auth(token);
        self.json(request).await
    }

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> GatewayResult<()> {
        let request = self
            .client
            .put(self.url("/users/me"))
            .bearer_auth(token)
            .json(update);
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl RouteRepository for ApiClient {
    async fn search_routes(&self, criteria: &SearchCriteria) -> GatewayResult<Vec<RouteSearchRow>> {
        let date = criteria.travel_date.format("%Y-%m-%d").to_string();
        let request = self.client.get(self.url("/routes/search")).query(&[
            ("from_city", criteria.origin_city.as_str()),
            ("to_city", criteria.destination_city.as_str()),
            ("date", date.as_str()),
        ]);
        let body = self.text(request).await?;
        decode_route_rows(&body)
    }

    async fn route_detail(&self, route_id: i64) -> GatewayResult<RouteDetail> {
        let request = self.client.get(self.url(&format!("/routes/{}", route_id)));
        self.json(request).await
    }
}

#[async_trait]
impl OrderRepository for ApiClient {
    async fn list_orders(&self, token: &str) -> GatewayResult<Vec<BackendOrder>> {
        let request = self.client.get(self.url("/orders")).bearer_auth(token);
        self.json(request).await
    }

    async fn create_order(
        &self,
        token: &str,
        request: &CreateOrderRequest,
    ) -> GatewayResult<CreatedOrder> {
        let request = self
            .client
            .post(self.url("/orders"))
            .bearer_auth(token)
            .json(request);
        self.json(request).await
    }

    async fn delete_order(&self, token: &str, order_id: i64) -> GatewayResult<()> {
        let request = self
            .client
            .delete(self.url(&format!("/orders/{}", order_id)))
            .bearer_auth(token);
        self.send(request).await?;
        Ok(())
    }
}
