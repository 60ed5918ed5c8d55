// src/services/mod.rs

pub mod coins;
pub mod evaluation;
pub mod leaderboard;
pub mod scoring;
