pub mod events;
pub mod types;

pub use events::{FirstFixPayload, GnssEvent, SatellitesPayload};
pub use types::{Constellation, SatelliteRecord};
