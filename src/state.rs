//! Application state: the in-memory store, the curriculum catalog and the game rules.
//!
//! This module owns:
//!   - the transactional store (plans, tasks, sessions, progress, logs)
//!   - the read-only catalog (cycles, templates, sparring bank), from TOML or seeds
//!   - the tunable game rules (`[game]` section or defaults)

use tracing::{info, instrument};

use crate::catalog::Catalog;
use crate::config::{load_app_config_from_env, GameConfig};
use crate::store::Store;

pub struct AppState {
    pub store: Store,
    pub catalog: Catalog,
    pub game: GameConfig,
}

impl AppState {
    /// Build state from env: load config, build the catalog, start with an empty store.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg_opt = load_app_config_from_env();
        let game = cfg_opt
            .as_ref()
            .map(|c| c.game.clone())
            .unwrap_or_default();
        let catalog = Catalog::from_config(cfg_opt.as_ref());

        info!(
            target: "kata_backend",
            default_target_xp = game.default_target_xp,
            rank_xp_step = game.rank_xp_step,
            ranks = game.ranks.len(),
            min_daily_plans = game.cycle_advancement.min_daily_plans,
            min_interviews = game.cycle_advancement.min_interviews,
            "Game rules ready"
        );
        Self::with_parts(catalog, game)
    }

    /// State over an explicit catalog and rules, with an empty store.
    pub fn with_parts(catalog: Catalog, game: GameConfig) -> Self {
        Self {
            store: Store::new(),
            catalog,
            game,
        }
    }

    pub fn first_cycle_code(&self) -> u32 {
        self.catalog.first_cycle_code()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_parts(Catalog::from_config(None), GameConfig::default())
    }
}
