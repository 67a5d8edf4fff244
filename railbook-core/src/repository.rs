use async_trait::async_trait;
use railbook_shared::{SearchCriteria, UserProfile};

use crate::identity::{AuthGrant, ProfileUpdate, Registration};
use crate::orders::{BackendOrder, CreateOrderRequest, CreatedOrder};
use crate::search::{RouteDetail, RouteSearchRow};
use crate::GatewayResult;

/// Credential issuance (`/auth/*`)
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Exchange email and password for a bearer token.
    async fn login(&self, email: &str, password: &str) -> GatewayResult<String>;

    async fn register(&self, registration: &Registration) -> GatewayResult<AuthGrant>;
}

/// Profile access for the authenticated user (`/users/me`)
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn fetch_profile(&self, token: &str) -> GatewayResult<UserProfile>;

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> GatewayResult<()>;
}

/// Route search and detail (`/routes/*`), no credential required
#[async_trait]
pub trait RouteRepository: Send + Sync {
    /// Implementations must reject any body that is not a JSON array of rows
    /// with [`crate::GatewayError::Malformed`].
    async fn search_routes(&self, criteria: &SearchCriteria) -> GatewayResult<Vec<RouteSearchRow>>;

    async fn route_detail(&self, route_id: i64) -> GatewayResult<RouteDetail>;
}

/// Order service of record (`/orders`)
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn list_orders(&self, token: &str) -> GatewayResult<Vec<BackendOrder>>;

    async fn create_order(
        &self,
        token: &str,
        request: &CreateOrderRequest,
    ) -> GatewayResult<CreatedOrder>;

    async fn delete_order(&self, token: &str, order_id: i64) -> GatewayResult<()>;
}
