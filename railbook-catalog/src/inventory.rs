use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use tracing::debug;

/// Carriage class. Determines capacity and seat layout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CarriageClass {
    /// Open-plan sleeper
    Platskart,
    /// Four-berth compartment
    Coupe,
    /// Two-berth sleeper
    Sleeper,
}

impl CarriageClass {
    pub fn capacity(&self) -> u32 {
        match self {
            CarriageClass::Platskart => 54,
            CarriageClass::Coupe => 36,
            CarriageClass::Sleeper => 18,
        }
    }

    pub fn seats_per_row(&self) -> usize {
        match self {
            CarriageClass::Platskart => 6,
            CarriageClass::Coupe => 4,
            CarriageClass::Sleeper => 2,
        }
    }
}

impl fmt::Display for CarriageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CarriageClass::Platskart => "Плацкарт",
            CarriageClass::Coupe => "Купе",
            CarriageClass::Sleeper => "СВ",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Carriage {
    pub id: i64,
    pub train_id: i64,
    pub number: u32,
    pub class: CarriageClass,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seat {
    pub id: i64,
    pub carriage_id: i64,
    pub number: u32,
    pub is_available: bool,
}

/// Seats of one carriage as they were reported at load time.
#[derive(Debug, Clone)]
pub struct CarriageSeats {
    pub carriage: Carriage,
    pub seats: Vec<Seat>,
}

impl CarriageSeats {
    pub fn available_count(&self) -> usize {
        self.seats.iter().filter(|seat| seat.is_available).count()
    }

    /// Seats grouped into display rows according to the carriage layout.
    pub fn rows(&self) -> impl Iterator<Item = &[Seat]> {
        self.seats.chunks(self.carriage.class.seats_per_row())
    }
}

/// Snapshot of a route's seat inventory.
#[derive(Debug, Clone)]
pub struct SeatMap {
    pub route_id: i64,
    pub train_id: i64,
    pub carriages: Vec<CarriageSeats>,
}

impl SeatMap {
    pub fn find(&self, carriage_id: i64, seat_id: i64) -> Option<(&Carriage, &Seat)> {
        self.carriages
            .iter()
            .find(|entry| entry.carriage.id == carriage_id)
            .and_then(|entry| {
                entry
                    .seats
                    .iter()
                    .find(|seat| seat.id == seat_id)
                    .map(|seat| (&entry.carriage, seat))
            })
    }
}

/// External seat inventory keyed by train
#[async_trait]
pub trait SeatInventory: Send + Sync {
    async fn carriages(&self, train_id: i64) -> Result<Vec<Carriage>, InventoryError>;

    async fn seats(&self, carriage: &Carriage) -> Result<Vec<Seat>, InventoryError>;
}

/// Inventory generated on the fly: three carriages per train, each seat available
/// with a fixed probability. Stands in until the backend exposes carriages and seats.
pub struct GeneratedSeatInventory {
    availability: f64,
    rng: Mutex<StdRng>,
}

impl GeneratedSeatInventory {
    pub fn new(availability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            availability: availability.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }
}

impl Default for GeneratedSeatInventory {
    fn default() -> Self {
        Self::new(0.7, None)
    }
}

#[async_trait]
impl SeatInventory for GeneratedSeatInventory {
    async fn carriages(&self, train_id: i64) -> Result<Vec<Carriage>, InventoryError> {
        let classes = [CarriageClass::Platskart, CarriageClass::Coupe, CarriageClass::Sleeper];
        Ok(classes
            .iter()
            .enumerate()
            .map(|(index, class)| Carriage {
                id: index as i64 + 1,
                train_id,
                number: index as u32 + 1,
                class: *class,
            })
            .collect())
    }

    async fn seats(&self, carriage: &Carriage) -> Result<Vec<Seat>, InventoryError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| InventoryError::Unavailable("seat generator poisoned".to_string()))?;

        let seats: Vec<Seat> = (1..=carriage.class.capacity())
            .map(|number| Seat {
                id: carriage.id * 100 + number as i64,
                carriage_id: carriage.id,
                number,
                is_available: rng.gen_bool(self.availability),
            })
            .collect();
        debug!(
            "Generated {} seats for carriage {} of train {}",
            seats.len(),
            carriage.number,
            carriage.train_id
        );
        Ok(seats)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Train not found: {0}")]
    TrainNotFound(i64),

    #[error("Seat inventory unavailable: {0}")]
    Unavailable(String),
}
