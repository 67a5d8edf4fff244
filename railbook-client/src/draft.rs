use railbook_shared::{PassengerDetails, RouteOffer, SearchCriteria, SeatSelection};
use std::fmt;
use uuid::Uuid;

/// Steps of the booking pipeline, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Search,
    RouteSelection,
    SeatSelection,
    Passenger,
}

impl Stage {
    pub fn title(&self) -> &'static str {
        match self {
            Stage::Search => "Поиск",
            Stage::RouteSelection => "Выбор маршрута",
            Stage::SeatSelection => "Выбор места",
            Stage::Passenger => "Данные пассажира",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Search => "search",
            Stage::RouteSelection => "route selection",
            Stage::SeatSelection => "seat selection",
            Stage::Passenger => "passenger details",
        })
    }
}

/// The in-progress booking. A plain holder: ordering of the fields is enforced by
/// the workflow, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationDraft {
    attempt_id: Uuid,
    criteria: Option<SearchCriteria>,
    route: Option<RouteOffer>,
    seat: Option<SeatSelection>,
    passenger: Option<PassengerDetails>,
}

impl Default for ReservationDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationDraft {
    pub fn new() -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            criteria: None,
            route: None,
            seat: None,
            passenger: None,
        }
    }

    /// Identifies one booking attempt in the logs. Renewed when a non-empty draft is
    /// cleared.
    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn criteria(&self) -> Option<&SearchCriteria> {
        self.criteria.as_ref()
    }

    pub fn route(&self) -> Option<&RouteOffer> {
        self.route.as_ref()
    }

    pub fn seat(&self) -> Option<&SeatSelection> {
        self.seat.as_ref()
    }

    pub fn passenger(&self) -> Option<&PassengerDetails> {
        self.passenger.as_ref()
    }

    pub fn set_search_criteria(&mut self, criteria: Option<SearchCriteria>) {
        self.criteria = criteria;
    }

    pub fn set_route_offer(&mut self, route: Option<RouteOffer>) {
        self.route = route;
    }

    pub fn set_seat_selection(&mut self, seat: Option<SeatSelection>) {
        self.seat = seat;
    }

    pub fn set_passenger_details(&mut self, passenger: Option<PassengerDetails>) {
        self.passenger = passenger;
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_none() && self.route.is_none() && self.seat.is_none() && self.passenger.is_none()
    }

    /// Furthest stage whose prerequisites are all present.
    pub fn current_stage(&self) -> Stage {
        match (&self.criteria, &self.route, &self.seat) {
            (None, _, _) => Stage::Search,
            (Some(_), None, _) => Stage::RouteSelection,
            (Some(_), Some(_), None) => Stage::SeatSelection,
            (Some(_), Some(_), Some(_)) => Stage::Passenger,
        }
    }

    /// Reset to the empty draft. Clearing an already empty draft changes nothing.
    pub fn clear(&mut self) {
        if !self.is_empty() {
            *self = Self::new();
        }
    }
}
