//! Training progression engine: daily plans, step sessions, the XP/streak/rank
//! ledger and the cycle gate, behind a small axum HTTP adapter.

pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod logic;
pub mod mock;
pub mod planner;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod session;
pub mod sparring;
pub mod state;
pub mod steps;
pub mod store;
pub mod telemetry;
pub mod util;
