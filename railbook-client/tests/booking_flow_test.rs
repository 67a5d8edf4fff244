use async_trait::async_trait;
use railbook_catalog::{Carriage, CarriageClass, InventoryError, Seat, SeatInventory};
use railbook_client::{BookingError, BookingWorkflow, Requirement, SearchForm, Stage};
use railbook_core::identity::ProfileUpdate;
use railbook_core::orders::{BackendOrder, CreateOrderRequest, CreatedOrder};
use railbook_core::repository::{OrderRepository, ProfileRepository, RouteRepository};
use railbook_core::search::{RouteDetail, RouteSearchRow, TrainRef};
use railbook_core::{GatewayError, GatewayResult, Session, SessionContext, SystemClock};
use railbook_order::{OrderCollection, PaymentTimer, PaymentWindow, TimerPhase};
use railbook_shared::{Masked, OrderStatus, PassengerDetails, SearchCriteria, UserProfile};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory stand-in for the booking backend.
struct FakeBackend {
    search: Mutex<GatewayResult<Vec<RouteSearchRow>>>,
    create: Mutex<GatewayResult<CreatedOrder>>,
    profile_update: Mutex<GatewayResult<()>>,
    orders: Mutex<Vec<BackendOrder>>,
    created_requests: Mutex<Vec<CreateOrderRequest>>,
    profile_updates: Mutex<Vec<ProfileUpdate>>,
    deletes: AtomicUsize,
}

impl FakeBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            search: Mutex::new(Ok(vec![row(12, Some(25.5)), row(13, None)])),
            create: Mutex::new(Ok(CreatedOrder {
                id: 42,
                created_at: chrono::Utc::now().to_rfc3339(),
                total_amount: Some(25.5),
                status: Some(OrderStatus::Pending),
            })),
            profile_update: Mutex::new(Ok(())),
            orders: Mutex::new(Vec::new()),
            created_requests: Mutex::new(Vec::new()),
            profile_updates: Mutex::new(Vec::new()),
            deletes: AtomicUsize::new(0),
        })
    }
}

fn row(route_id: i64, price: Option<f64>) -> RouteSearchRow {
    RouteSearchRow {
        route_id,
        train_number: Some(format!("70{}Б", route_id)),
        departure_time: Some("2024-06-01T08:15:00".to_string()),
        arrival_time: Some("2024-06-01T11:40:00".to_string()),
        price,
        available_seats: Some(40),
    }
}

#[async_trait]
impl RouteRepository for FakeBackend {
    async fn search_routes(&self, _criteria: &SearchCriteria) -> GatewayResult<Vec<RouteSearchRow>> {
        self.search.lock().unwrap().clone()
    }

    async fn route_detail(&self, route_id: i64) -> GatewayResult<RouteDetail> {
        if route_id == 13 {
            return Err(GatewayError::Rejected { status: 404, message: None });
        }
        Ok(RouteDetail {
            id: route_id,
            train: Some(TrainRef { id: Some(3), number: None, train_type: None }),
        })
    }
}

#[async_trait]
impl OrderRepository for FakeBackend {
    async fn list_orders(&self, _token: &str) -> GatewayResult<Vec<BackendOrder>> {
        Ok(self.orders.lock().unwrap().clone())
    }

    async fn create_order(&self, _token: &str, request: &CreateOrderRequest) -> GatewayResult<CreatedOrder> {
        self.created_requests.lock().unwrap().push(request.clone());
        self.create.lock().unwrap().clone()
    }

    async fn delete_order(&self, _token: &str, _order_id: i64) -> GatewayResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for FakeBackend {
    async fn fetch_profile(&self, _token: &str) -> GatewayResult<UserProfile> {
        Ok(profile())
    }

    async fn update_profile(&self, _token: &str, update: &ProfileUpdate) -> GatewayResult<()> {
        self.profile_updates.lock().unwrap().push(update.clone());
        self.profile_update.lock().unwrap().clone()
    }
}

/// One carriage whose odd-numbered seats are free.
struct AlternatingInventory;

#[async_trait]
impl SeatInventory for AlternatingInventory {
    async fn carriages(&self, train_id: i64) -> Result<Vec<Carriage>, InventoryError> {
        Ok(vec![Carriage { id: 1, train_id, number: 1, class: CarriageClass::Coupe }])
    }

    async fn seats(&self, carriage: &Carriage) -> Result<Vec<Seat>, InventoryError> {
        Ok((1..=carriage.class.capacity())
            .map(|number| Seat {
                id: carriage.id * 100 + number as i64,
                carriage_id: carriage.id,
                number,
                is_available: number % 2 == 1,
            })
            .collect())
    }
}

fn profile() -> UserProfile {
    UserProfile {
        id: 7,
        email: "ivan@example.com".to_string(),
        first_name: "Иван".to_string(),
        last_name: "Петров".to_string(),
        passport_data: None,
        role: None,
    }
}

async fn logged_in() -> SessionContext {
    let session = SessionContext::in_memory();
    session
        .establish(Session { token: Masked::from("good"), profile: profile() })
        .await
        .unwrap();
    session
}

fn workflow(backend: &Arc<FakeBackend>, session: SessionContext) -> (BookingWorkflow, OrderCollection) {
    let timer = PaymentTimer::new(PaymentWindow::default(), Arc::new(SystemClock));
    let collection = OrderCollection::new(backend.clone(), session.clone(), timer);
    let workflow = BookingWorkflow::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        Arc::new(AlternatingInventory),
        session,
        collection.clone(),
        20.0,
    );
    (workflow, collection)
}

fn minsk_brest() -> SearchForm {
    SearchForm::new("Минск", "Брест", "2024-06-01")
}

/// Runs the first three stages and picks seat 101 (free) in carriage 1.
async fn up_to_passenger(workflow: &mut BookingWorkflow) {
    workflow.submit_search(&minsk_brest()).unwrap();
    workflow.load_routes().await.unwrap();
    workflow.select_route(12).unwrap();
    workflow.load_seat_map().await.unwrap();
    workflow.select_seat(1, 101).unwrap();
}

#[tokio::test]
async fn test_error_object_from_route_search_surfaces_server_message() {
    let backend = FakeBackend::new();
    *backend.search.lock().unwrap() = Err(GatewayError::Malformed("db down".to_string()));
    let (mut workflow, _) = workflow(&backend, logged_in().await);

    let criteria = workflow.submit_search(&minsk_brest()).unwrap().clone();
    assert_eq!(criteria.origin_city, "Минск");
    assert_eq!(criteria.destination_city, "Брест");
    assert_eq!(criteria.travel_date.to_string(), "2024-06-01");

    let err = workflow.load_routes().await.unwrap_err();
    assert_eq!(err, BookingError::MalformedResponse("db down".to_string()));
    assert_eq!(err.user_message(), "db down");
    assert!(workflow.draft().route().is_none());
    assert!(workflow.offers().is_empty());
}

#[tokio::test]
async fn test_offers_are_enriched_and_defaulted() {
    let backend = FakeBackend::new();
    let (mut workflow, _) = workflow(&backend, logged_in().await);
    workflow.submit_search(&minsk_brest()).unwrap();

    let offers = workflow.load_routes().await.unwrap();
    assert_eq!(offers.len(), 2);
    assert_eq!(offers[0].train.id, 3);
    assert_eq!(offers[0].unit_price, 25.5);
    assert_eq!(offers[0].departure_time, "08:15");
    assert_eq!(offers[0].duration_label, "3ч 25м");
    assert_eq!(offers[0].schedule_name, "Минск - Брест");
    // failed detail lookup and missing price
    assert_eq!(offers[1].train.id, 0);
    assert_eq!(offers[1].unit_price, 20.0);
}

#[tokio::test]
async fn test_stage_prerequisites_redirect_to_search() {
    let backend = FakeBackend::new();
    let (mut workflow, _) = workflow(&backend, logged_in().await);

    assert_eq!(
        workflow.load_routes().await.unwrap_err(),
        BookingError::ValidationGap { missing: Requirement::SearchCriteria, redirect: Stage::Search }
    );

    workflow.submit_search(&minsk_brest()).unwrap();
    assert_eq!(workflow.current_stage(), Stage::RouteSelection);
    assert!(matches!(
        workflow.load_seat_map().await,
        Err(BookingError::ValidationGap { missing: Requirement::Route, redirect: Stage::Search })
    ));

    let details = PassengerDetails::new("Иван", "Петров", "AB1234567");
    assert!(matches!(
        workflow.submit_passenger(details).await,
        Err(BookingError::ValidationGap { missing: Requirement::Seat, redirect: Stage::Search })
    ));
    assert!(backend.created_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_route_and_unavailable_seat() {
    let backend = FakeBackend::new();
    let (mut workflow, _) = workflow(&backend, logged_in().await);
    workflow.submit_search(&minsk_brest()).unwrap();
    workflow.load_routes().await.unwrap();

    assert_eq!(workflow.select_route(99).unwrap_err(), BookingError::UnknownRoute);

    workflow.select_route(12).unwrap();
    // seat map not loaded yet
    assert_eq!(workflow.select_seat(1, 101).unwrap_err(), BookingError::SeatUnavailable);

    let map = workflow.load_seat_map().await.unwrap();
    assert_eq!(map.train_id, 3);
    assert_eq!(map.carriages[0].available_count(), 18);

    assert_eq!(workflow.select_seat(1, 102).unwrap_err(), BookingError::SeatUnavailable);
    assert_eq!(workflow.select_seat(1, 999).unwrap_err(), BookingError::SeatUnavailable);

    let seat = workflow.select_seat(1, 103).unwrap();
    assert_eq!(seat.seat_number, 3);
    assert_eq!(seat.price, 25.5);
    assert_eq!(workflow.current_stage(), Stage::Passenger);
}

#[tokio::test]
async fn test_reselecting_route_clears_seat() {
    let backend = FakeBackend::new();
    let (mut workflow, _) = workflow(&backend, logged_in().await);
    up_to_passenger(&mut workflow).await;
    assert!(workflow.draft().seat().is_some());

    workflow.select_route(13).unwrap();
    assert!(workflow.draft().seat().is_none());
    assert!(workflow.seat_map().is_none());
    assert_eq!(workflow.draft().route().unwrap().id, 13);
    assert_eq!(workflow.current_stage(), Stage::SeatSelection);
}

#[tokio::test]
async fn test_new_search_drops_previous_route() {
    let backend = FakeBackend::new();
    let (mut workflow, _) = workflow(&backend, logged_in().await);
    up_to_passenger(&mut workflow).await;

    // same criteria: going back to search keeps later selections
    workflow.submit_search(&minsk_brest()).unwrap();
    assert!(workflow.draft().seat().is_some());

    let mut reversed = minsk_brest();
    reversed.swap_cities();
    workflow.submit_search(&reversed).unwrap();
    assert!(workflow.draft().route().is_none());
    assert!(workflow.draft().seat().is_none());
    assert_eq!(workflow.draft().criteria().unwrap().origin_city, "Брест");
}

#[tokio::test]
async fn test_successful_submission() {
    let backend = FakeBackend::new();
    let session = logged_in().await;
    let (mut workflow, collection) = workflow(&backend, session.clone());
    up_to_passenger(&mut workflow).await;

    let created_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    *backend.create.lock().unwrap() = Ok(CreatedOrder {
        id: 42,
        created_at: created_at.clone(),
        total_amount: Some(27.0),
        status: Some(OrderStatus::Pending),
    });

    let prefill = workflow.passenger_prefill();
    assert_eq!(prefill.first_name, "Иван");
    assert!(prefill.travel_document_id.is_blank());

    let booking = workflow
        .submit_passenger(PassengerDetails::new("Иван", "Петров", "AB1234567"))
        .await
        .unwrap();

    let request = backend.created_requests.lock().unwrap()[0].clone();
    assert_eq!(request, CreateOrderRequest { route_id: 12, seat_id: 101, price: 25.5 });
    assert_eq!(backend.profile_updates.lock().unwrap().len(), 1);
    assert_eq!(session.profile().unwrap().passport_data.unwrap().expose(), "AB1234567");

    assert_eq!(booking.order.id, 42);
    assert_eq!(
        booking.order.created_at,
        chrono::DateTime::parse_from_rfc3339(&created_at).unwrap()
    );
    assert_eq!(booking.order.total_amount, 27.0);
    assert_eq!(booking.order.status, OrderStatus::Pending);
    assert_eq!(booking.order.seat.seat_number, 1);
    assert_eq!(booking.order.passenger.full_name(), "Иван Петров");
    let timer = booking.timer.expect("pending order gets a countdown");
    assert!(matches!(timer.phase(), TimerPhase::Counting { remaining } if remaining > 890));

    let orders = collection.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0], booking.order);

    assert!(workflow.draft().is_empty());
    assert_eq!(workflow.current_stage(), Stage::Search);
}

#[tokio::test]
async fn test_failed_submission_preserves_draft() {
    let backend = FakeBackend::new();
    *backend.create.lock().unwrap() = Err(GatewayError::Rejected {
        status: 409,
        message: Some("Seat already taken".to_string()),
    });
    *backend.profile_update.lock().unwrap() = Err(GatewayError::Transport("timeout".to_string()));
    let (mut workflow, collection) = workflow(&backend, logged_in().await);
    up_to_passenger(&mut workflow).await;

    let err = workflow
        .submit_passenger(PassengerDetails::new("Иван", "Петров", "AB1234567"))
        .await
        .err()
        .unwrap();
    assert_eq!(err.user_message(), "Seat already taken");

    assert_eq!(workflow.draft().seat().unwrap().seat_id, 101);
    assert_eq!(workflow.draft().passenger().unwrap().last_name, "Петров");
    assert_eq!(workflow.current_stage(), Stage::Passenger);
    assert!(collection.orders().await.is_empty());
}

#[tokio::test]
async fn test_submission_requires_credential() {
    let backend = FakeBackend::new();
    let (mut workflow, _) = workflow(&backend, SessionContext::in_memory());
    up_to_passenger(&mut workflow).await;

    let err = workflow
        .submit_passenger(PassengerDetails::new("Иван", "Петров", ""))
        .await
        .err()
        .unwrap();
    assert_eq!(err, BookingError::NotAuthenticated);
    assert!(workflow.draft().seat().is_some());
    assert!(backend.created_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_names_are_rejected() {
    let backend = FakeBackend::new();
    let (mut workflow, _) = workflow(&backend, logged_in().await);
    up_to_passenger(&mut workflow).await;

    let err = workflow
        .submit_passenger(PassengerDetails::new("  ", "Петров", "AB1234567"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, BookingError::InvalidInput(_)));
}

#[tokio::test]
async fn test_abandon_clears_everything() {
    let backend = FakeBackend::new();
    let (mut workflow, _) = workflow(&backend, logged_in().await);
    up_to_passenger(&mut workflow).await;

    workflow.abandon();
    assert!(workflow.draft().is_empty());
    assert!(workflow.offers().is_empty());
    assert!(workflow.seat_map().is_none());
}

#[tokio::test]
async fn test_paid_order_cannot_be_deleted() {
    let backend = FakeBackend::new();
    backend.orders.lock().unwrap().push(BackendOrder {
        id: 5,
        user_id: Some(7),
        route_id: Some(12),
        route_name: None,
        train_number: None,
        train_type: None,
        departure_city: None,
        arrival_city: None,
        departure_time: Some("08:15".to_string()),
        arrival_time: Some("11:40".to_string()),
        created_at: "2024-06-01T10:00:00Z".to_string(),
        status: OrderStatus::Paid,
        total_amount: 25.5,
        tickets: vec![],
    });
    let (_, collection) = workflow(&backend, logged_in().await);
    collection.refresh().await;
    assert_eq!(collection.orders().await[0].route.duration_label, "3ч 25м");

    assert!(!collection.delete(5).await);
    assert_eq!(backend.deletes.load(Ordering::SeqCst), 0);
    assert_eq!(collection.orders().await.len(), 1);
}
