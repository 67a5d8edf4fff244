pub mod models;
pub mod pii;
pub mod schedule;

pub use models::{
    Order, OrderStatus, PassengerDetails, RouteOffer, SearchCriteria, SeatSelection, Station,
    Train, UserProfile,
};
pub use pii::Masked;
