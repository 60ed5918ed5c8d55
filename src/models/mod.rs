// src/models/mod.rs

pub mod coin;
pub mod leaderboard;
pub mod live_test;
pub mod question;
pub mod result;
pub mod submission;
pub mod user;
