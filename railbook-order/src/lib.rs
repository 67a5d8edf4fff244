pub mod collection;
pub mod models;
pub mod timer;

pub use collection::{ExpiryWatch, OrderCollection, RefreshOutcome};
pub use models::{order_from_record, orders_from_records};
pub use timer::{format_remaining, PaymentTimer, PaymentWindow, TimerPhase, TimerSubscription};
