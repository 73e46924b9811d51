use crate::Coin;
use crate::board::Cell;
use crate::luck::luck;
use crate::storage::{KeyValueStore, StorageError};

/// Errors raised by cache generation and coin transfer.
///
/// `CoinNotFound` and `NothingToDeposit` are benign, user-facing
/// conditions; the frontend shows them as messages. `InvalidCell` is a
/// defensive rejection of a caller bug. Storage and encoding failures
/// are fatal for the operation and propagate.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache '{id}' was generated without a usable cell")]
    InvalidCell { id: String },
    #[error("coin #{serial} not found or already collected")]
    CoinNotFound { serial: u32 },
    #[error("no coins available to deposit")]
    NothingToDeposit,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("cache state encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// One discoverable location holding an ordered coin inventory.
///
/// The cell reference is by value; cells live in the `GridIndex` and
/// are not owned by caches. A cache starts *unsaved* and becomes
/// *persisted* on its first save; it never transitions back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geocache {
    pub cell_i: i64,
    pub cell_j: i64,
    coins: Vec<Coin>,
    persisted: bool,
}

impl Geocache {
    pub fn new(cell_i: i64, cell_j: i64, coins: Vec<Coin>) -> Self {
        Geocache {
            cell_i,
            cell_j,
            coins,
            persisted: false,
        }
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Encodes the coin sequence losslessly, order preserved.
    pub fn memento(&self) -> Result<String, CacheError> {
        Ok(serde_json::to_string(&self.coins)?)
    }

    /// Replaces the coin sequence with the decoded blob. Cell
    /// coordinates are untouched; a memento only carries coins.
    pub fn restore(&mut self, blob: &str) -> Result<(), CacheError> {
        self.coins = serde_json::from_str(blob)?;
        Ok(())
    }

    /// Removes and returns the coin with the given serial, preserving
    /// the order of the remaining coins. No state change on failure.
    pub fn collect(&mut self, serial: u32) -> Result<Coin, CacheError> {
        let index = self
            .coins
            .iter()
            .position(|coin| coin.serial == serial)
            .ok_or(CacheError::CoinNotFound { serial })?;
        Ok(self.coins.remove(index))
    }

    /// Appends coins to the inventory in their given order. Ownership
    /// checks belong to the caller; by the time coins arrive here they
    /// have already left the player inventory.
    pub fn deposit(&mut self, coins: Vec<Coin>) {
        self.coins.extend(coins);
    }
}

/// Generates cache inventories deterministically and persists them
/// through an injected key-value store.
pub struct CacheStore {
    store: Box<dyn KeyValueStore>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore").finish_non_exhaustive()
    }
}

impl CacheStore {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        CacheStore { store }
    }

    /// Produces the cache for `cache_id`.
    ///
    /// If a persisted blob exists for the identifier, the coin sequence
    /// is restored from it verbatim and regeneration is skipped, even
    /// when `distance` or `cell` differ from the original generation
    /// call. Player-caused mutations must never be overwritten by a
    /// re-scan.
    ///
    /// On first generation the coin count is
    /// `max(1, floor(luck(cache_id) * distance))`, with serials
    /// `0..count` and provenance taken from `cell`. A missing cell is a
    /// caller bug: logged, rejected, nothing written.
    pub fn generate(
        &mut self,
        cache_id: &str,
        distance: f64,
        cell: Option<&Cell>,
    ) -> Result<Geocache, CacheError> {
        let Some(cell) = cell else {
            log::error!("cache '{cache_id}': generation requested without a cell");
            return Err(CacheError::InvalidCell {
                id: cache_id.to_string(),
            });
        };

        if let Some(blob) = self.store.get(cache_id)? {
            let mut cache = Geocache::new(cell.i, cell.j, Vec::new());
            cache.restore(&blob)?;
            cache.persisted = true;
            log::debug!(
                "cache '{cache_id}': restored {} coin(s) from persisted state",
                cache.coins.len()
            );
            return Ok(cache);
        }

        let count = ((luck(cache_id) * distance).floor()).max(1.0) as u32;
        let coins = (0..count)
            .map(|serial| Coin {
                home_i: cell.i,
                home_j: cell.j,
                serial,
            })
            .collect();
        log::debug!("cache '{cache_id}': generated {count} coin(s) at ({}, {})", cell.i, cell.j);
        Ok(Geocache::new(cell.i, cell.j, coins))
    }

    /// Encodes the cache and writes it to the store, flipping the cache
    /// to its persisted state.
    pub fn save(&mut self, cache_id: &str, cache: &mut Geocache) -> Result<(), CacheError> {
        let blob = cache.memento()?;
        self.store.set(cache_id, &blob)?;
        cache.persisted = true;
        Ok(())
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }
}
