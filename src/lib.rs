//! Bullet-journal task migration library
//!
//! The lifecycle state machine, migration engine with its append-only
//! ledger, the daily catch-up and monthly wizard workflows, derived views,
//! and the storage, config and HTTP layers around them.

pub mod catchup;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod format;
pub mod ledger;
pub mod logging;
pub mod repair;
pub mod server;
pub mod state;
pub mod storage;
pub mod types;
pub mod views;
pub mod wizard;
