use std::rc::Rc;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::board::{Cell, GridIndex};
use crate::cache::{CacheError, CacheStore, Geocache};
use crate::storage::KeyValueStore;
use crate::{Coin, GeoPoint};

/// Errors surfaced by game-level operations. Cache errors pass through;
/// see `CacheError` for which of those are benign.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("location is not a finite coordinate")]
    NonFiniteLocation,
    #[error("no cache with id '{id}'")]
    UnknownCache { id: String },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// A single step of player movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Tunables for a session. Defaults carry the original game's
/// constants: the Santa Cruz origin, 0.001-degree tiles, a tenth-tile
/// movement step, an 8-cell scan radius, 10% cache density and a
/// five-coin deposit cap.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub origin: GeoPoint,
    pub tile_width: f64,
    pub step: f64,
    pub grid_radius: u32,
    pub cache_density: f64,
    pub deposit_limit: usize,
    pub world_seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            origin: GeoPoint::new(36.98949379578401, -122.06277128548504),
            tile_width: 0.001,
            step: 0.0001,
            grid_radius: 8,
            cache_density: 0.1,
            deposit_limit: 5,
            world_seed: 0,
        }
    }
}

/// A cache placed by the procedural scan, with its session label and
/// the geographic point its marker sits on.
#[derive(Debug)]
pub struct PlacedCache {
    pub id: String,
    pub location: GeoPoint,
    pub cache: Geocache,
}

/// Owns all mutable session state: the grid index, the cache store,
/// the placed caches in label order, and the player.
///
/// Single-threaded by design; operations run to completion in the
/// order the triggering events occur.
#[derive(Debug)]
pub struct GameState {
    config: GameConfig,
    board: GridIndex,
    store: CacheStore,
    caches: Vec<PlacedCache>,
    player_location: GeoPoint,
    player_coins: Vec<Coin>,
}

impl GameState {
    pub fn new(config: GameConfig, store: Box<dyn KeyValueStore>) -> Result<Self, GameError> {
        if !config.origin.is_finite() {
            return Err(GameError::NonFiniteLocation);
        }
        let board = GridIndex::new(config.tile_width);
        let player_location = config.origin;
        Ok(GameState {
            config,
            board,
            store: CacheStore::new(store),
            caches: Vec::new(),
            player_location,
            player_coins: Vec::new(),
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn caches(&self) -> &[PlacedCache] {
        &self.caches
    }

    pub fn player_location(&self) -> GeoPoint {
        self.player_location
    }

    pub fn player_coins(&self) -> &[Coin] {
        &self.player_coins
    }

    /// The procedural scan run at session start.
    ///
    /// Walks the `(2r+1)^2` square around the origin; every offset
    /// within Euclidean distance `r` that passes a density roll gets a
    /// cache, labeled `cache-<n>` in placement order. Placement rolls
    /// come from a generator seeded with `world_seed`, so the same
    /// seed reproduces the same grid. Caches with persisted state are
    /// restored rather than regenerated; each cache is saved as soon
    /// as it exists.
    pub fn scan_caches(&mut self) -> Result<(), GameError> {
        let mut placement = StdRng::seed_from_u64(self.config.world_seed);
        let radius = self.config.grid_radius as i64;
        let mut label: u32 = 0;
        self.caches.clear();

        for dx in -radius..=radius {
            for dy in -radius..=radius {
                let distance = ((dx * dx + dy * dy) as f64).sqrt();
                if distance > radius as f64 {
                    continue;
                }
                if placement.random::<f64>() >= self.config.cache_density {
                    continue;
                }

                let location = GeoPoint::new(
                    self.config.origin.lat + dx as f64 * self.config.tile_width,
                    self.config.origin.lng + dy as f64 * self.config.tile_width,
                );
                let id = format!("cache-{label}");
                let cell = self.board.cell_for(location);

                match self.store.generate(&id, distance, Some(cell.as_ref())) {
                    Ok(mut cache) => {
                        self.store.save(&id, &mut cache)?;
                        self.caches.push(PlacedCache {
                            id,
                            location,
                            cache,
                        });
                    }
                    Err(CacheError::InvalidCell { id }) => {
                        // Recoverable: skip this cache, keep scanning.
                        log::warn!("scan skipped cache '{id}'");
                    }
                    Err(err) => return Err(err.into()),
                }
                label += 1;
            }
        }

        log::info!("scan placed {} cache(s)", self.caches.len());
        Ok(())
    }

    fn cache_index(&self, cache_id: &str) -> Result<usize, GameError> {
        self.caches
            .iter()
            .position(|placed| placed.id == cache_id)
            .ok_or_else(|| GameError::UnknownCache {
                id: cache_id.to_string(),
            })
    }

    /// Moves one coin from the cache to the player inventory, then
    /// persists the cache. `CoinNotFound` leaves everything unchanged.
    pub fn collect_coin(&mut self, cache_id: &str, serial: u32) -> Result<(), GameError> {
        let index = self.cache_index(cache_id)?;
        let coin = self.caches[index].cache.collect(serial)?;
        self.player_coins.push(coin);
        let placed = &mut self.caches[index];
        self.store.save(&placed.id, &mut placed.cache)?;
        Ok(())
    }

    /// Moves up to `deposit_limit` coins from the front of the player
    /// inventory into the cache (FIFO), then persists the cache.
    /// Returns how many coins were deposited.
    pub fn deposit_coins(&mut self, cache_id: &str) -> Result<usize, GameError> {
        let index = self.cache_index(cache_id)?;
        if self.player_coins.is_empty() {
            return Err(CacheError::NothingToDeposit.into());
        }
        let count = self.player_coins.len().min(self.config.deposit_limit);
        let coins: Vec<Coin> = self.player_coins.drain(..count).collect();
        let placed = &mut self.caches[index];
        placed.cache.deposit(coins);
        self.store.save(&placed.id, &mut placed.cache)?;
        Ok(count)
    }

    /// Steps the player one `step` in the given direction.
    pub fn move_player(&mut self, direction: Direction) {
        match direction {
            Direction::Up => self.player_location.lat += self.config.step,
            Direction::Down => self.player_location.lat -= self.config.step,
            Direction::Left => self.player_location.lng -= self.config.step,
            Direction::Right => self.player_location.lng += self.config.step,
        }
    }

    /// Relocates the player to an absolute point (the geolocation
    /// jump in the original game).
    pub fn move_player_to(&mut self, point: GeoPoint) -> Result<(), GameError> {
        if !point.is_finite() {
            return Err(GameError::NonFiniteLocation);
        }
        self.player_location = point;
        Ok(())
    }

    /// Canonical cell under the player right now.
    pub fn player_cell(&mut self) -> Rc<Cell> {
        self.board.cell_for(self.player_location)
    }

    /// Cells currently in view around the player.
    pub fn visible_cells(&mut self) -> Vec<Rc<Cell>> {
        self.board
            .cells_near(self.player_location, self.config.grid_radius)
    }

    /// The placed cache nearest the player, if one is within a tile
    /// width on both axes. This is what collect/deposit actions target.
    pub fn nearest_cache(&self) -> Option<&PlacedCache> {
        let here = self.player_location;
        let tile = self.config.tile_width;
        self.caches
            .iter()
            .filter(|placed| {
                (placed.location.lat - here.lat).abs() < tile
                    && (placed.location.lng - here.lng).abs() < tile
            })
            .min_by(|a, b| {
                let da = (a.location.lat - here.lat)
                    .abs()
                    .max((a.location.lng - here.lng).abs());
                let db = (b.location.lat - here.lat)
                    .abs()
                    .max((b.location.lng - here.lng).abs());
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};

    fn dense_config() -> GameConfig {
        // Density 1.0 places a cache on every in-radius offset, which
        // keeps these tests independent of the placement rolls.
        GameConfig {
            grid_radius: 2,
            cache_density: 1.0,
            ..GameConfig::default()
        }
    }

    fn new_game(config: GameConfig) -> GameState {
        GameState::new(config, Box::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn non_finite_origin_is_rejected() {
        let config = GameConfig {
            origin: GeoPoint::new(f64::NAN, 0.0),
            ..GameConfig::default()
        };
        let err = GameState::new(config, Box::new(MemoryStore::new())).unwrap_err();
        assert!(matches!(err, GameError::NonFiniteLocation));
    }

    #[test]
    fn scan_is_reproducible_for_a_seed() {
        let config = GameConfig {
            world_seed: 42,
            ..GameConfig::default()
        };
        let mut a = new_game(config.clone());
        let mut b = new_game(config);
        a.scan_caches().unwrap();
        b.scan_caches().unwrap();

        assert_eq!(a.caches().len(), b.caches().len());
        for (ca, cb) in a.caches().iter().zip(b.caches().iter()) {
            assert_eq!(ca.id, cb.id);
            assert_eq!(ca.location, cb.location);
            assert_eq!(ca.cache.coins(), cb.cache.coins());
        }
    }

    #[test]
    fn dense_scan_covers_every_in_radius_offset() {
        // Offsets with sqrt(dx^2+dy^2) <= 2 in a 5x5 square: 13.
        let mut game = new_game(dense_config());
        game.scan_caches().unwrap();
        assert_eq!(game.caches().len(), 13);
        assert_eq!(game.caches()[0].id, "cache-0");
        assert_eq!(game.caches()[12].id, "cache-12");
    }

    #[test]
    fn every_placed_cache_is_saved_and_nonempty() {
        let mut game = new_game(dense_config());
        game.scan_caches().unwrap();
        for placed in game.caches() {
            assert!(placed.cache.is_persisted());
            assert!(!placed.cache.coins().is_empty());
        }
    }

    #[test]
    fn collect_moves_coin_to_player_inventory() {
        let mut game = new_game(dense_config());
        game.scan_caches().unwrap();

        let id = game.caches()[0].id.clone();
        let before = game.caches()[0].cache.coins().to_vec();
        game.collect_coin(&id, 0).unwrap();

        assert_eq!(game.player_coins().len(), 1);
        assert_eq!(game.player_coins()[0], before[0]);
        assert_eq!(game.caches()[0].cache.coins().len(), before.len() - 1);
    }

    #[test]
    fn collect_from_unknown_cache_fails() {
        let mut game = new_game(dense_config());
        game.scan_caches().unwrap();
        let err = game.collect_coin("cache-999", 0).unwrap_err();
        assert!(matches!(err, GameError::UnknownCache { .. }));
    }

    #[test]
    fn collect_of_collected_coin_is_benign_and_mutation_free() {
        let mut game = new_game(dense_config());
        game.scan_caches().unwrap();
        let id = game.caches()[0].id.clone();
        game.collect_coin(&id, 0).unwrap();

        let cache_before = game.caches()[0].cache.coins().to_vec();
        let err = game.collect_coin(&id, 0).unwrap_err();
        assert!(matches!(
            err,
            GameError::Cache(CacheError::CoinNotFound { serial: 0 })
        ));
        assert_eq!(game.caches()[0].cache.coins(), &cache_before[..]);
        assert_eq!(game.player_coins().len(), 1);
    }

    #[test]
    fn deposit_with_empty_inventory_is_benign() {
        let mut game = new_game(dense_config());
        game.scan_caches().unwrap();
        let id = game.caches()[0].id.clone();
        let err = game.deposit_coins(&id).unwrap_err();
        assert!(matches!(
            err,
            GameError::Cache(CacheError::NothingToDeposit)
        ));
    }

    #[test]
    fn deposit_is_capped_and_fifo() {
        let mut game = new_game(dense_config());
        game.scan_caches().unwrap();

        // Collect serial 0 from six different caches.
        let ids: Vec<String> = game.caches().iter().map(|p| p.id.clone()).collect();
        for id in ids.iter().take(6) {
            game.collect_coin(id, 0).unwrap();
        }
        assert_eq!(game.player_coins().len(), 6);
        let held = game.player_coins().to_vec();

        let target = ids[7].clone();
        let tail_before = game
            .caches()
            .iter()
            .find(|p| p.id == target)
            .unwrap()
            .cache
            .coins()
            .len();
        let deposited = game.deposit_coins(&target).unwrap();
        assert_eq!(deposited, 5);

        // First five held coins moved, in order, to the cache tail.
        assert_eq!(game.player_coins(), &held[5..]);
        let cache = &game.caches().iter().find(|p| p.id == target).unwrap().cache;
        assert_eq!(cache.coins().len(), tail_before + 5);
        assert_eq!(&cache.coins()[tail_before..], &held[..5]);
    }

    #[test]
    fn collect_then_deposit_restores_cache_coin_set() {
        let mut game = new_game(dense_config());
        game.scan_caches().unwrap();
        let id = game.caches()[0].id.clone();
        let before = game.caches()[0].cache.coins().to_vec();

        game.collect_coin(&id, 0).unwrap();
        game.deposit_coins(&id).unwrap();

        let after = game.caches()[0].cache.coins().to_vec();
        assert_eq!(after.len(), before.len());
        for coin in &before {
            assert!(after.contains(coin));
        }
    }

    #[test]
    fn movement_steps_and_relocation() {
        let mut game = new_game(GameConfig::default());
        let start = game.player_location();
        game.move_player(Direction::Up);
        game.move_player(Direction::Right);
        let here = game.player_location();
        assert!((here.lat - (start.lat + 0.0001)).abs() < 1e-12);
        assert!((here.lng - (start.lng + 0.0001)).abs() < 1e-12);

        game.move_player_to(GeoPoint::new(37.0, -122.0)).unwrap();
        assert_eq!(game.player_location(), GeoPoint::new(37.0, -122.0));

        let err = game
            .move_player_to(GeoPoint::new(f64::NAN, 0.0))
            .unwrap_err();
        assert!(matches!(err, GameError::NonFiniteLocation));
    }

    #[test]
    fn player_cell_is_canonical_and_tracks_movement() {
        let mut game = new_game(GameConfig::default());
        let a = game.player_cell();
        let b = game.player_cell();
        assert!(Rc::ptr_eq(&a, &b));

        game.move_player(Direction::Up);
        let after = game.player_cell();
        assert_ne!((a.i, a.j), (after.i, after.j));
    }

    #[test]
    fn visible_cells_match_radius_square() {
        let mut game = new_game(dense_config());
        assert_eq!(game.visible_cells().len(), 25);
    }

    #[test]
    fn nearest_cache_targets_the_origin_cache_at_session_start() {
        let mut game = new_game(dense_config());
        game.scan_caches().unwrap();
        // Density 1.0 guarantees a cache at offset (0, 0), which is the
        // player's starting location.
        let origin = game.player_location();
        let nearest = game.nearest_cache().unwrap();
        assert_eq!(nearest.location, origin);
    }

    #[test]
    fn mutations_survive_a_session_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saves.json");
        let config = dense_config();

        let (id, expected) = {
            let store = FileStore::open(&path).unwrap();
            let mut game = GameState::new(config.clone(), Box::new(store)).unwrap();
            game.scan_caches().unwrap();
            let id = game.caches()[0].id.clone();
            game.collect_coin(&id, 0).unwrap();
            (id, game.caches()[0].cache.coins().to_vec())
        };

        let store = FileStore::open(&path).unwrap();
        let mut game = GameState::new(config, Box::new(store)).unwrap();
        game.scan_caches().unwrap();
        let placed = game.caches().iter().find(|p| p.id == id).unwrap();
        assert_eq!(placed.cache.coins(), &expected[..]);
        assert!(placed.cache.is_persisted());
    }
}
