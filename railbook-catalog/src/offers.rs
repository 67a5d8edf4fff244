use railbook_core::search::RouteSearchRow;
use railbook_shared::schedule::{clock_label, duration_label};
use railbook_shared::{RouteOffer, SearchCriteria, Station, Train};

/// A search row together with the train id resolved from the route detail endpoint.
#[derive(Debug, Clone)]
pub struct ResolvedRow {
    pub row: RouteSearchRow,
    pub train_id: i64,
}

/// Builds presentation-ready offers from raw search rows.
pub struct OfferBuilder<'a> {
    criteria: &'a SearchCriteria,
    fallback_unit_price: f64,
}

impl<'a> OfferBuilder<'a> {
    pub fn new(criteria: &'a SearchCriteria, fallback_unit_price: f64) -> Self {
        Self {
            criteria,
            fallback_unit_price,
        }
    }

    pub fn build(&self, resolved: ResolvedRow) -> RouteOffer {
        let ResolvedRow { row, train_id } = resolved;
        let departure = row.departure_time.unwrap_or_default();
        let arrival = row.arrival_time.unwrap_or_default();

        RouteOffer {
            id: row.route_id,
            schedule_name: format!(
                "{} - {}",
                self.criteria.origin_city, self.criteria.destination_city
            ),
            train: Train {
                id: train_id,
                number: row.train_number.unwrap_or_default(),
                train_type: String::new(),
            },
            origin_station: Station::in_city(self.criteria.origin_city.clone()),
            destination_station: Station::in_city(self.criteria.destination_city.clone()),
            duration_label: duration_label(&departure, &arrival),
            departure_time: clock_label(&departure),
            arrival_time: clock_label(&arrival),
            unit_price: row
                .price
                .filter(|price| *price > 0.0)
                .unwrap_or(self.fallback_unit_price),
            available_seat_count: row.available_seats.unwrap_or(0),
        }
    }

    pub fn build_all(&self, rows: Vec<ResolvedRow>) -> Vec<RouteOffer> {
        rows.into_iter().map(|row| self.build(row)).collect()
    }
}
