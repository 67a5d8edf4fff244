pub mod auth;
pub mod cli;
pub mod draft;
pub mod error;
pub mod state;
pub mod workflow;

pub use auth::AuthService;
pub use draft::{ReservationDraft, Stage};
pub use error::{BookingError, Requirement};
pub use state::ClientContext;
pub use workflow::{BookingWorkflow, SearchForm, SubmittedBooking};
