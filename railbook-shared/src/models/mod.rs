pub mod booking;
pub mod order;
pub mod user;

pub use booking::{PassengerDetails, RouteOffer, SearchCriteria, SeatSelection, Station, Train};
pub use order::{Order, OrderStatus};
pub use user::UserProfile;
