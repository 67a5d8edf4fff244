use railbook_catalog::{GeneratedSeatInventory, SeatInventory};
use railbook_core::{Clock, GatewayResult, SessionContext, SystemClock};
use railbook_order::{OrderCollection, PaymentTimer, PaymentWindow};
use railbook_store::app_config::BusinessRules;
use railbook_store::{ApiClient, Config, FileCredentialStore};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthService;
use crate::workflow::BookingWorkflow;

/// Everything a command needs, wired once from configuration.
#[derive(Clone)]
pub struct ClientContext {
    pub api: Arc<ApiClient>,
    pub session: SessionContext,
    pub inventory: Arc<dyn SeatInventory>,
    pub orders: OrderCollection,
    pub business_rules: BusinessRules,
}

pub fn payment_window(rules: &BusinessRules) -> PaymentWindow {
    PaymentWindow {
        window: Duration::from_secs(rules.payment_window_seconds),
        urgent_below: Duration::from_secs(rules.urgent_threshold_seconds),
        tick: Duration::from_millis(rules.tick_millis.max(1)),
    }
}

impl ClientContext {
    pub fn from_config(config: &Config) -> GatewayResult<Self> {
        let api = Arc::new(ApiClient::from_config(&config.api)?);
        let store = Arc::new(FileCredentialStore::new(config.session.resolved_path()));
        let session = SessionContext::new(store);
        let inventory: Arc<dyn SeatInventory> = Arc::new(GeneratedSeatInventory::new(
            config.inventory.availability_ratio,
            config.inventory.seed,
        ));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let timer = PaymentTimer::new(payment_window(&config.business_rules), clock);
        let orders = OrderCollection::new(api.clone(), session.clone(), timer);

        Ok(Self {
            api,
            session,
            inventory,
            orders,
            business_rules: config.business_rules.clone(),
        })
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.api.clone(), self.api.clone(), self.session.clone())
    }

    pub fn workflow(&self) -> BookingWorkflow {
        BookingWorkflow::new(
            self.api.clone(),
            self.api.clone(),
            self.api.clone(),
            self.inventory.clone(),
            self.session.clone(),
            self.orders.clone(),
            self.business_rules.fallback_unit_price,
        )
    }
}
