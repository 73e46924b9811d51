use std::fmt;

use serde::{Deserialize, Serialize};

pub mod board;
pub mod cache;
pub mod game;
pub mod luck;
pub mod storage;

/// A continuous geographic coordinate in floating-point degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        GeoPoint { lat, lng }
    }

    /// True when both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// A unit of value carried between caches and the player.
///
/// `home_i`/`home_j` record the cell the coin was generated in (its
/// provenance, not its current holder). `serial` is unique within the
/// cache that generated it. Coins are immutable; they move between
/// containers by transfer, never by copy with a new identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    pub home_i: i64,
    pub home_j: i64,
    pub serial: u32,
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.home_i, self.home_j, self.serial)
    }
}
