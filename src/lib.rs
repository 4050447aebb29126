//! Cli/daemon companion for tracking your GTA Online grind.
//! Samples the game's HUD regions, reads them through the OS text recognizer,
//! classifies the current activity and keeps a per-session earnings ledger.
//!

pub mod capture;
pub mod classify;
pub mod cli;
pub mod config;
pub mod fs;
pub mod recognize;
pub mod storage;
pub mod tracker;
pub mod utils;
