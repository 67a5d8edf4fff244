use chrono::NaiveDate;
use futures_util::future::join_all;
use railbook_catalog::{CarriageSeats, OfferBuilder, ResolvedRow, SeatInventory, SeatMap};
use railbook_core::identity::ProfileUpdate;
use railbook_core::orders::CreateOrderRequest;
use railbook_core::repository::{OrderRepository, ProfileRepository, RouteRepository};
use railbook_core::SessionContext;
use railbook_order::{OrderCollection, TimerSubscription};
use railbook_shared::schedule::parse_timestamp;
use railbook_shared::{Order, OrderStatus, PassengerDetails, RouteOffer, SearchCriteria, SeatSelection};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::draft::{ReservationDraft, Stage};
use crate::error::{BookingError, Requirement};

/// Raw search form input, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchForm {
    pub origin: String,
    pub destination: String,
    pub date: String,
}

impl SearchForm {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            date: date.into(),
        }
    }

    pub fn swap_cities(&mut self) {
        std::mem::swap(&mut self.origin, &mut self.destination);
    }

    pub fn to_criteria(&self) -> Result<SearchCriteria, BookingError> {
        let origin = self.origin.trim();
        let destination = self.destination.trim();
        if origin.is_empty() || destination.is_empty() {
            return Err(BookingError::InvalidInput("Укажите города отправления и прибытия".to_string()));
        }
        let travel_date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|_| BookingError::InvalidInput(format!("Некорректная дата: {}", self.date)))?;

        Ok(SearchCriteria {
            origin_city: origin.to_string(),
            destination_city: destination.to_string(),
            travel_date,
        })
    }
}

/// Result of a successful passenger submission.
pub struct SubmittedBooking {
    pub order: Order,
    /// Countdown of the new order's payment window; `None` if the backend did not
    /// report it as PENDING.
    pub timer: Option<TimerSubscription>,
}

/// Drives one booking attempt through search, route, seat and passenger stages.
///
/// Every operation takes `&mut self`, so stage operations on the draft never
/// overlap. Failures leave the draft as it was unless noted otherwise.
pub struct BookingWorkflow {
    routes: Arc<dyn RouteRepository>,
    orders: Arc<dyn OrderRepository>,
    profiles: Arc<dyn ProfileRepository>,
    inventory: Arc<dyn SeatInventory>,
    session: SessionContext,
    collection: OrderCollection,
    fallback_unit_price: f64,
    draft: ReservationDraft,
    offers: Vec<RouteOffer>,
    seat_map: Option<SeatMap>,
}

impl BookingWorkflow {
    pub fn new(
        routes: Arc<dyn RouteRepository>,
        orders: Arc<dyn OrderRepository>,
        profiles: Arc<dyn ProfileRepository>,
        inventory: Arc<dyn SeatInventory>,
        session: SessionContext,
        collection: OrderCollection,
        fallback_unit_price: f64,
    ) -> Self {
        Self {
            routes,
            orders,
            profiles,
            inventory,
            session,
            collection,
            fallback_unit_price,
            draft: ReservationDraft::new(),
            offers: Vec::new(),
            seat_map: None,
        }
    }

    pub fn draft(&self) -> &ReservationDraft {
        &self.draft
    }

    pub fn offers(&self) -> &[RouteOffer] {
        &self.offers
    }

    pub fn seat_map(&self) -> Option<&SeatMap> {
        self.seat_map.as_ref()
    }

    pub fn current_stage(&self) -> Stage {
        self.draft.current_stage()
    }

    /// Stage 1. A criteria value different from the stored one drops the route and
    /// seat chosen for the previous search.
    pub fn submit_search(&mut self, form: &SearchForm) -> Result<&SearchCriteria, BookingError> {
        let criteria = form.to_criteria()?;
        if self.draft.criteria() != Some(&criteria) {
            debug!(
                "Attempt {}: new search {} -> {} on {}",
                self.draft.attempt_id(),
                criteria.origin_city,
                criteria.destination_city,
                criteria.travel_date
            );
            self.draft.set_route_offer(None);
            self.draft.set_seat_selection(None);
            self.offers.clear();
            self.seat_map = None;
        }
        self.draft.set_search_criteria(Some(criteria));
        self.require_criteria()
    }

    /// Stage 2. Query the route search endpoint and resolve each row's train.
    pub async fn load_routes(&mut self) -> Result<&[RouteOffer], BookingError> {
        let criteria = self.require_criteria()?.clone();

        let rows = match self.routes.search_routes(&criteria).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Route search failed: {}", e);
                self.offers.clear();
                self.draft.set_route_offer(None);
                self.draft.set_seat_selection(None);
                self.seat_map = None;
                return Err(e.into());
            }
        };

        let routes = self.routes.clone();
        let lookups = rows.iter().map(|row| {
            let routes = routes.clone();
            let route_id = row.route_id;
            async move {
                match routes.route_detail(route_id).await {
                    Ok(detail) => detail.train_id().unwrap_or(0),
                    Err(e) => {
                        warn!("Route {} detail unavailable: {}", route_id, e);
                        0
                    }
                }
            }
        });
        let train_ids = join_all(lookups).await;

        let resolved = rows
            .into_iter()
            .zip(train_ids)
            .map(|(row, train_id)| ResolvedRow { row, train_id })
            .collect();
        self.offers = OfferBuilder::new(&criteria, self.fallback_unit_price).build_all(resolved);
        info!("Found {} routes", self.offers.len());
        Ok(&self.offers)
    }

    /// Pick one of the loaded offers. Any previously chosen seat is dropped.
    pub fn select_route(&mut self, route_id: i64) -> Result<&RouteOffer, BookingError> {
        self.require_criteria()?;
        let offer = self
            .offers
            .iter()
            .find(|offer| offer.id == route_id)
            .cloned()
            .ok_or(BookingError::UnknownRoute)?;

        self.draft.set_seat_selection(None);
        self.seat_map = None;
        self.draft.set_route_offer(Some(offer));
        self.require_route()
    }

    /// Stage 3. Load carriages and seats of the chosen route's train.
    pub async fn load_seat_map(&mut self) -> Result<&SeatMap, BookingError> {
        let route = self.require_route()?.clone();

        let train_id = match self.routes.route_detail(route.id).await {
            Ok(detail) => detail.train_id().unwrap_or(route.train.id),
            Err(e) => {
                warn!("Route {} detail unavailable, using offer train: {}", route.id, e);
                route.train.id
            }
        };

        let carriages = self.inventory.carriages(train_id).await?;
        let inventory = self.inventory.clone();
        let seats = join_all(carriages.iter().map(|carriage| {
            let inventory = inventory.clone();
            async move { inventory.seats(carriage).await }
        }))
        .await;

        let mut loaded = Vec::with_capacity(carriages.len());
        for (carriage, seats) in carriages.into_iter().zip(seats) {
            loaded.push(CarriageSeats { carriage, seats: seats? });
        }

        let seat_map = SeatMap {
            route_id: route.id,
            train_id,
            carriages: loaded,
        };
        debug!("Loaded {} carriages for train {}", seat_map.carriages.len(), train_id);
        Ok(self.seat_map.insert(seat_map))
    }

    /// Record a seat that was available in the loaded map. Price is the route's unit price.
    pub fn select_seat(&mut self, carriage_id: i64, seat_id: i64) -> Result<&SeatSelection, BookingError> {
        let route = self.require_route()?;
        let map = self
            .seat_map
            .as_ref()
            .filter(|map| map.route_id == route.id)
            .ok_or(BookingError::SeatUnavailable)?;
        let (carriage, seat) = map
            .find(carriage_id, seat_id)
            .filter(|(_, seat)| seat.is_available)
            .ok_or(BookingError::SeatUnavailable)?;

        let selection = SeatSelection {
            route_id: route.id,
            seat_id: seat.id,
            carriage_id: carriage.id,
            carriage_number: carriage.number,
            seat_number: seat.number,
            price: route.unit_price,
        };
        self.draft.set_seat_selection(Some(selection));
        self.require_seat()
    }

    /// Passenger details to show in the form: what was entered before, else the profile.
    pub fn passenger_prefill(&self) -> PassengerDetails {
        if let Some(passenger) = self.draft.passenger() {
            return passenger.clone();
        }
        self.session
            .profile()
            .map(|profile| profile.as_passenger())
            .unwrap_or_default()
    }

    /// Stage 4. Create the order. On success the draft is cleared; on any failure it
    /// is left intact for a retry.
    pub async fn submit_passenger(&mut self, details: PassengerDetails) -> Result<SubmittedBooking, BookingError> {
        let seat = self.require_seat()?.clone();
        let route = self.require_route()?.clone();

        let details = PassengerDetails::new(
            details.first_name.trim(),
            details.last_name.trim(),
            details.travel_document_id.expose().trim(),
        );
        if details.first_name.is_empty() || details.last_name.is_empty() {
            return Err(BookingError::InvalidInput("Укажите имя и фамилию пассажира".to_string()));
        }
        self.draft.set_passenger_details(Some(details.clone()));

        let Some(token) = self.session.token() else {
            return Err(BookingError::NotAuthenticated);
        };

        if !details.travel_document_id.is_blank() {
            self.push_travel_document(&token, &details).await;
        }

        let request = CreateOrderRequest {
            route_id: route.id,
            seat_id: seat.seat_id,
            price: seat.price,
        };
        let created = self.orders.create_order(&token, &request).await.map_err(|e| {
            error!("Order creation failed for attempt {}: {}", self.draft.attempt_id(), e);
            BookingError::from(e)
        })?;

        let Some(created_at) = parse_timestamp(&created.created_at) else {
            error!("Order {} created with unusable createdAt {:?}", created.id, created.created_at);
            self.collection.refresh().await;
            return Err(BookingError::MalformedResponse(format!(
                "invalid order timestamp: {}",
                created.created_at
            )));
        };

        let order = Order {
            id: created.id,
            total_amount: created.total_amount.unwrap_or(seat.price),
            status: created.status.unwrap_or(OrderStatus::Pending),
            route,
            seat,
            passenger: details,
            created_at,
        };
        info!("Order {} created, status {}", order.id, order.status);

        self.collection.append(order.clone()).await;
        let timer = self.collection.watch_order(&order);
        self.reset();

        Ok(SubmittedBooking { order, timer })
    }

    /// Drop the whole attempt.
    pub fn abandon(&mut self) {
        if !self.draft.is_empty() {
            info!("Booking attempt {} abandoned", self.draft.attempt_id());
        }
        self.reset();
    }

    async fn push_travel_document(&self, token: &str, details: &PassengerDetails) {
        let update = ProfileUpdate {
            passport_data: Some(details.travel_document_id.clone()),
            ..Default::default()
        };
        match self.profiles.update_profile(token, &update).await {
            Ok(()) => {
                let document = details.travel_document_id.clone();
                if let Err(e) = self
                    .session
                    .amend_profile(|profile| profile.passport_data = Some(document))
                    .await
                {
                    warn!("Could not persist updated profile: {}", e);
                }
            }
            Err(e) => warn!("Failed to update passport data: {}", e),
        }
    }

    fn reset(&mut self) {
        self.draft.clear();
        self.offers.clear();
        self.seat_map = None;
    }

    fn gap(missing: Requirement) -> BookingError {
        BookingError::ValidationGap {
            missing,
            redirect: Stage::Search,
        }
    }

    fn require_criteria(&self) -> Result<&SearchCriteria, BookingError> {
        self.draft.criteria().ok_or_else(|| Self::gap(Requirement::SearchCriteria))
    }

    fn require_route(&self) -> Result<&RouteOffer, BookingError> {
        self.draft.route().ok_or_else(|| Self::gap(Requirement::Route))
    }

    fn require_seat(&self) -> Result<&SeatSelection, BookingError> {
        self.draft.seat().ok_or_else(|| Self::gap(Requirement::Seat))
    }
}
