use railbook_core::orders::BackendOrder;
use railbook_shared::schedule::{duration_label, parse_timestamp};
use railbook_shared::{Order, PassengerDetails, RouteOffer, SeatSelection, Station, Train};
use tracing::warn;

/// Map a backend order record into the client view model.
///
/// Missing station and train fields become empty strings and the duration is recomputed
/// from departure/arrival when both parse. The backend does not store passenger details
/// per order, so the passenger snapshot comes from the current profile. Returns `None`
/// only when the creation timestamp is unusable, since the payment window depends on it.
pub fn order_from_record(record: BackendOrder, passenger: &PassengerDetails) -> Option<Order> {
    let Some(created_at) = parse_timestamp(&record.created_at) else {
        warn!("Skipping order {}: unparseable createdAt {:?}", record.id, record.created_at);
        return None;
    };

    let departure = record.departure_time.unwrap_or_default();
    let arrival = record.arrival_time.unwrap_or_default();
    let route_id = record.route_id.unwrap_or(0);
    let ticket = record.tickets.first();

    let route = RouteOffer {
        id: route_id,
        schedule_name: record.route_name.unwrap_or_default(),
        train: Train {
            id: 0,
            number: record.train_number.unwrap_or_default(),
            train_type: record.train_type.unwrap_or_default(),
        },
        origin_station: Station::in_city(record.departure_city.unwrap_or_default()),
        destination_station: Station::in_city(record.arrival_city.unwrap_or_default()),
        duration_label: duration_label(&departure, &arrival),
        departure_time: departure,
        arrival_time: arrival,
        unit_price: record.total_amount,
        available_seat_count: 0,
    };

    let seat = SeatSelection {
        route_id,
        seat_id: 0,
        carriage_id: 0,
        carriage_number: ticket.and_then(|t| t.carriage_number).unwrap_or(0),
        seat_number: ticket.and_then(|t| t.seat_number).unwrap_or(0),
        price: ticket.and_then(|t| t.price).unwrap_or(record.total_amount),
    };

    Some(Order {
        id: record.id,
        route,
        seat,
        passenger: passenger.clone(),
        status: record.status,
        created_at,
        total_amount: record.total_amount,
    })
}

pub fn orders_from_records(records: Vec<BackendOrder>, passenger: &PassengerDetails) -> Vec<Order> {
    records
        .into_iter()
        .filter_map(|record| order_from_record(record, passenger))
        .collect()
}
