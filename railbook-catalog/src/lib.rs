pub mod inventory;
pub mod offers;

pub use inventory::{
    Carriage, CarriageClass, CarriageSeats, GeneratedSeatInventory, InventoryError, Seat,
    SeatInventory, SeatMap,
};
pub use offers::{OfferBuilder, ResolvedRow};
