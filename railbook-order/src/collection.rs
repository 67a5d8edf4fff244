use railbook_core::repository::OrderRepository;
use railbook_core::{GatewayError, SessionContext};
use railbook_shared::Order;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::orders_from_records;
use crate::timer::{PaymentTimer, TimerPhase, TimerSubscription};

/// What a call to [`OrderCollection::refresh`] did to the local collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The collection was replaced with this many orders.
    Replaced(usize),
    /// The fetch failed; the collection is now empty.
    Emptied,
    /// A later refresh, local mutation or identity change made this response stale.
    Superseded,
}

struct CollectionState {
    orders: Vec<Order>,
    identity: Option<i64>,
    generation: u64,
    refreshes_in_flight: usize,
}

impl CollectionState {
    /// Drop everything cached for a previous identity.
    fn align_identity(&mut self, identity: Option<i64>) {
        if self.identity != identity {
            if !self.orders.is_empty() {
                info!("Identity changed, clearing {} cached orders", self.orders.len());
            }
            self.orders.clear();
            self.identity = identity;
            self.generation += 1;
        }
    }
}

struct Inner {
    repository: Arc<dyn OrderRepository>,
    session: SessionContext,
    timer: PaymentTimer,
    state: RwLock<CollectionState>,
}

/// Client-side view over the authenticated user's orders, kept consistent with the
/// order service of record.
///
/// Every refresh, local mutation and identity change bumps a generation counter; a
/// refresh response is applied only if the generation it was issued under is still
/// current.
#[derive(Clone)]
pub struct OrderCollection {
    inner: Arc<Inner>,
}

impl OrderCollection {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        session: SessionContext,
        timer: PaymentTimer,
    ) -> Self {
        let identity = session.identity();
        Self {
            inner: Arc::new(Inner {
                repository,
                session,
                timer,
                state: RwLock::new(CollectionState {
                    orders: Vec::new(),
                    identity,
                    generation: 0,
                    refreshes_in_flight: 0,
                }),
            }),
        }
    }

    /// Fetch all orders for the current identity and replace the local collection.
    /// Any failure leaves the collection empty rather than stale.
    pub async fn refresh(&self) -> RefreshOutcome {
        let session = &self.inner.session;
        let issued = {
            let mut state = self.inner.state.write().await;
            state.align_identity(session.identity());
            state.generation += 1;
            state.refreshes_in_flight += 1;
            state.generation
        };

        let fetched = match (session.token(), session.profile()) {
            (Some(token), Some(profile)) => self
                .inner
                .repository
                .list_orders(&token)
                .await
                .map(|records| orders_from_records(records, &profile.as_passenger())),
            _ => Err(GatewayError::Unauthenticated),
        };

        let mut state = self.inner.state.write().await;
        state.refreshes_in_flight -= 1;

        if state.generation != issued {
            debug!("Discarding superseded order refresh (generation {})", issued);
            return RefreshOutcome::Superseded;
        }

        match fetched {
            Ok(orders) => {
                info!("Loaded {} orders", orders.len());
                let count = orders.len();
                state.orders = orders;
                RefreshOutcome::Replaced(count)
            }
            Err(GatewayError::Unauthenticated) => {
                debug!("No credential available, order collection emptied");
                state.orders.clear();
                RefreshOutcome::Emptied
            }
            Err(e) => {
                warn!("Failed to load orders: {}", e);
                state.orders.clear();
                RefreshOutcome::Emptied
            }
        }
    }

    /// Delete a PENDING order remotely, then locally. Nothing changes locally unless
    /// the backend confirms. Orders that are unknown or not PENDING are rejected
    /// before any request is made.
    pub async fn delete(&self, order_id: i64) -> bool {
        {
            let mut state = self.inner.state.write().await;
            state.align_identity(self.inner.session.identity());
            match state.orders.iter().find(|order| order.id == order_id) {
                None => {
                    warn!("Refusing to delete unknown order {}", order_id);
                    return false;
                }
                Some(order) if !order.can_delete() => {
                    warn!("Refusing to delete order {} with status {}", order_id, order.status);
                    return false;
                }
                Some(_) => {}
            }
        }

        let Some(token) = self.inner.session.token() else {
            return false;
        };

        match self.inner.repository.delete_order(&token, order_id).await {
            Ok(()) => {
                let mut state = self.inner.state.write().await;
                state.orders.retain(|order| order.id != order_id);
                state.generation += 1;
                info!("Deleted order {}", order_id);
                true
            }
            Err(e) => {
                error!("Failed to delete order {}: {}", order_id, e);
                false
            }
        }
    }

    /// Insert a freshly created order at the front without a round trip.
    pub async fn append(&self, order: Order) {
        let mut state = self.inner.state.write().await;
        state.align_identity(self.inner.session.identity());
        debug!("Appending order {}", order.id);
        state.orders.insert(0, order);
        state.generation += 1;
    }

    /// Forget all cached orders for a changed (or absent) identity.
    pub async fn on_identity_changed(&self, identity: Option<i64>) {
        let mut state = self.inner.state.write().await;
        state.align_identity(identity);
    }

    /// Follow the session: clear on every identity change and reload after login.
    pub fn track_identity(&self) -> JoinHandle<()> {
        let collection = self.clone();
        let mut sessions = self.inner.session.subscribe();
        tokio::spawn(async move {
            while sessions.changed().await.is_ok() {
                let identity = sessions
                    .borrow_and_update()
                    .as_ref()
                    .map(|session| session.profile.id);
                let changed = {
                    let state = collection.inner.state.read().await;
                    state.identity != identity
                };
                if !changed {
                    continue;
                }
                collection.on_identity_changed(identity).await;
                if identity.is_some() {
                    collection.refresh().await;
                }
            }
        })
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.inner.state.read().await.orders.clone()
    }

    pub async fn get(&self, order_id: i64) -> Option<Order> {
        self.inner
            .state
            .read()
            .await
            .orders
            .iter()
            .find(|order| order.id == order_id)
            .cloned()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.state.read().await.refreshes_in_flight > 0
    }

    pub fn timer(&self) -> &PaymentTimer {
        &self.inner.timer
    }

    /// Start the payment countdown of one order. Its expiry triggers a refresh.
    /// Returns `None` for orders that are not PENDING.
    pub fn watch_order(&self, order: &Order) -> Option<TimerSubscription> {
        if !order.status.is_pending() {
            return None;
        }
        let collection = self.clone();
        let order_id = order.id;
        Some(self.inner.timer.activate_with(order.created_at, move || {
            info!("Payment window of order {} elapsed, reconciling", order_id);
            tokio::spawn(async move {
                collection.refresh().await;
            });
        }))
    }

    /// Register countdowns for every PENDING order currently in the collection.
    pub async fn watch_pending(&self) -> ExpiryWatch {
        let orders = self.orders().await;
        let subscriptions = orders
            .iter()
            .filter_map(|order| self.watch_order(order).map(|sub| (order.id, sub)))
            .collect();
        ExpiryWatch { subscriptions }
    }
}

/// Set of running payment countdowns. Dropping it unregisters all of them.
#[derive(Default)]
pub struct ExpiryWatch {
    subscriptions: HashMap<i64, TimerSubscription>,
}

impl ExpiryWatch {
    pub fn phase(&self, order_id: i64) -> Option<TimerPhase> {
        self.subscriptions.get(&order_id).map(TimerSubscription::phase)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn order_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.subscriptions.keys().copied()
    }

    pub fn running(&self) -> usize {
        self.subscriptions.values().filter(|sub| sub.is_running()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use railbook_core::orders::{BackendOrder, CreateOrderRequest, CreatedOrder};
    use railbook_core::{GatewayResult, Session, SystemClock};
    use railbook_shared::{Masked, OrderStatus, UserProfile};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    use crate::timer::PaymentWindow;

    #[derive(Default)]
    struct FakeOrderService {
        records: Mutex<Vec<BackendOrder>>,
        fail_list: Mutex<bool>,
        fail_delete: Mutex<bool>,
        list_calls: AtomicUsize,
        delete_calls: AtomicUsize,
        /// When set, `list_orders` waits on it before answering.
        gate: Mutex<Option<Arc<Notify>>>,
    }

    impl FakeOrderService {
        fn with(records: Vec<BackendOrder>) -> Arc<Self> {
            let service = Self::default();
            *service.records.lock().unwrap() = records;
            Arc::new(service)
        }
    }

    #[async_trait]
    impl OrderRepository for FakeOrderService {
        async fn list_orders(&self, _token: &str) -> GatewayResult<Vec<BackendOrder>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if *self.fail_list.lock().unwrap() {
                return Err(GatewayError::Transport("connection refused".to_string()));
            }
            Ok(self.records.lock().unwrap().clone())
        }

        async fn create_order(&self, _token: &str, _request: &CreateOrderRequest) -> GatewayResult<CreatedOrder> {
            Err(GatewayError::Transport("not used".to_string()))
        }

        async fn delete_order(&self, _token: &str, order_id: i64) -> GatewayResult<()> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail_delete.lock().unwrap() {
                return Err(GatewayError::Rejected { status: 500, message: None });
            }
            self.records.lock().unwrap().retain(|r| r.id != order_id);
            Ok(())
        }
    }

    fn record(id: i64, status: &str, minutes_ago: i64) -> BackendOrder {
        BackendOrder {
            id,
            user_id: Some(7),
            route_id: Some(12),
            route_name: None,
            train_number: None,
            train_type: None,
            departure_city: None,
            arrival_city: None,
            departure_time: None,
            arrival_time: None,
            created_at: (Utc::now() - Duration::minutes(minutes_ago)).to_rfc3339(),
            status: OrderStatus::from(status.to_string()),
            total_amount: 25.5,
            tickets: vec![],
        }
    }

    fn session(id: i64) -> Session {
        Session {
            token: Masked(format!("token-{}", id)),
            profile: UserProfile {
                id,
                email: "ivan@example.com".to_string(),
                first_name: "Иван".to_string(),
                last_name: "Петров".to_string(),
                passport_data: Some(Masked::from("AB1234567")),
                role: None,
            },
        }
    }

    async fn collection(service: Arc<FakeOrderService>) -> (OrderCollection, SessionContext) {
        let context = SessionContext::in_memory();
        context.establish(session(7)).await.unwrap();
        let timer = PaymentTimer::new(PaymentWindow::default(), Arc::new(SystemClock));
        (OrderCollection::new(service, context.clone(), timer), context)
    }

    #[tokio::test]
    async fn test_refresh_replaces_collection() {
        let service = FakeOrderService::with(vec![record(1, "PENDING", 2), record(2, "PAID", 60)]);
        let (orders, _) = collection(service).await;

        assert_eq!(orders.refresh().await, RefreshOutcome::Replaced(2));
        let loaded = orders.orders().await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].passenger.first_name, "Иван");
        assert!(!orders.is_loading().await);
    }

    #[tokio::test]
    async fn test_failed_refresh_empties_collection() {
        let service = FakeOrderService::with(vec![record(1, "PENDING", 2)]);
        let (orders, _) = collection(service.clone()).await;
        orders.refresh().await;
        assert_eq!(orders.orders().await.len(), 1);

        *service.fail_list.lock().unwrap() = true;
        assert_eq!(orders.refresh().await, RefreshOutcome::Emptied);
        assert!(orders.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_without_identity_is_empty() {
        let service = FakeOrderService::with(vec![record(1, "PENDING", 2)]);
        let timer = PaymentTimer::new(PaymentWindow::default(), Arc::new(SystemClock));
        let orders = OrderCollection::new(service.clone(), SessionContext::in_memory(), timer);

        assert_eq!(orders.refresh().await, RefreshOutcome::Emptied);
        assert_eq!(service.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_collection_unchanged() {
        let service = FakeOrderService::with(vec![record(1, "PENDING", 2), record(2, "PENDING", 3)]);
        let (orders, _) = collection(service.clone()).await;
        orders.refresh().await;
        let before = orders.orders().await;

        *service.fail_delete.lock().unwrap() = true;
        assert!(!orders.delete(1).await);
        assert_eq!(orders.orders().await, before);
        assert_eq!(service.delete_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_successful_delete_removes_locally() {
        let service = FakeOrderService::with(vec![record(1, "PENDING", 2), record(2, "PENDING", 3)]);
        let (orders, _) = collection(service).await;
        orders.refresh().await;

        assert!(orders.delete(1).await);
        let remaining: Vec<i64> = orders.orders().await.iter().map(|o| o.id).collect();
        assert_eq!(remaining, vec![2]);
    }

    #[tokio::test]
    async fn test_delete_of_paid_order_rejected_without_request() {
        let service = FakeOrderService::with(vec![record(1, "PAID", 30)]);
        let (orders, _) = collection(service.clone()).await;
        orders.refresh().await;

        assert!(!orders.delete(1).await);
        assert!(!orders.delete(99).await);
        assert_eq!(service.delete_calls.load(Ordering::SeqCst), 0);
        assert_eq!(orders.orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_append_inserts_at_front() {
        let service = FakeOrderService::with(vec![record(1, "PAID", 30)]);
        let (orders, _) = collection(service).await;
        orders.refresh().await;

        let passenger = railbook_shared::PassengerDetails::default();
        let mut fresh = crate::models::order_from_record(record(9, "PENDING", 0), &passenger).unwrap();
        fresh.total_amount = 31.0;
        orders.append(fresh.clone()).await;

        let loaded = orders.orders().await;
        assert_eq!(loaded[0], fresh);
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn test_identity_change_clears_orders() {
        let service = FakeOrderService::with(vec![record(1, "PENDING", 2)]);
        let (orders, context) = collection(service).await;
        orders.refresh().await;
        assert_eq!(orders.orders().await.len(), 1);

        context.logout().await.unwrap();
        orders.on_identity_changed(context.identity()).await;
        assert!(orders.orders().await.is_empty());

        // operations observe a swapped identity even without an explicit notification
        context.establish(session(7)).await.unwrap();
        orders.refresh().await;
        assert!(orders.get(1).await.is_some());
        context.establish(session(8)).await.unwrap();
        orders.append(crate::models::order_from_record(record(5, "PENDING", 0), &Default::default()).unwrap()).await;
        let ids: Vec<i64> = orders.orders().await.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![5]);
    }

    #[tokio::test]
    async fn test_superseded_refresh_is_discarded() {
        let service = FakeOrderService::with(vec![record(1, "PENDING", 2)]);
        let (orders, _) = collection(service.clone()).await;

        let gate = Arc::new(Notify::new());
        *service.gate.lock().unwrap() = Some(gate.clone());

        let slow = {
            let orders = orders.clone();
            tokio::spawn(async move { orders.refresh().await })
        };
        while service.list_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(orders.is_loading().await);

        let passenger = railbook_shared::PassengerDetails::default();
        let fresh = crate::models::order_from_record(record(9, "PENDING", 0), &passenger).unwrap();
        orders.append(fresh).await;

        gate.notify_one();
        assert_eq!(slow.await.unwrap(), RefreshOutcome::Superseded);

        let ids: Vec<i64> = orders.orders().await.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![9]);
        assert!(!orders.is_loading().await);
    }

    #[tokio::test]
    async fn test_track_identity_reloads_after_login() {
        let service = FakeOrderService::with(vec![record(1, "PENDING", 2)]);
        let context = SessionContext::in_memory();
        let timer = PaymentTimer::new(PaymentWindow::default(), Arc::new(SystemClock));
        let orders = OrderCollection::new(service.clone(), context.clone(), timer);
        let listener = orders.track_identity();

        context.establish(session(7)).await.unwrap();
        for _ in 0..100 {
            if !orders.orders().await.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(orders.orders().await.len(), 1);

        context.logout().await.unwrap();
        for _ in 0..100 {
            if orders.orders().await.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(orders.orders().await.is_empty());
        listener.abort();
    }

    #[tokio::test]
    async fn test_watch_pending_registers_only_pending_orders() {
        let service = FakeOrderService::with(vec![
            record(1, "PENDING", 2),
            record(2, "PAID", 30),
            record(3, "PENDING", 20),
        ]);
        let (orders, _) = collection(service.clone()).await;
        orders.refresh().await;
        let calls_before = service.list_calls.load(Ordering::SeqCst);

        let watch = orders.watch_pending().await;
        assert_eq!(watch.len(), 2);
        assert!(matches!(watch.phase(1), Some(TimerPhase::Counting { .. })));
        assert_eq!(watch.phase(3), Some(TimerPhase::Expired));
        assert_eq!(watch.running(), 1);

        // the already-expired order reconciles right away
        for _ in 0..100 {
            if service.list_calls.load(Ordering::SeqCst) > calls_before {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(service.list_calls.load(Ordering::SeqCst), calls_before + 1);

        drop(watch);
    }
}
