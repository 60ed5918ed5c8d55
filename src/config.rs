// src/config.rs

use std::env;
use std::net::SocketAddr;

use dotenvy::dotenv;

/// Marks awarded for a correct answer.
pub const CORRECT_MARK: f64 = 1.0;

/// Marks deducted for an attempted but incorrect answer.
pub const NEGATIVE_MARK: f64 = 0.25;

/// Accuracy values closer than this are treated as equal when ranking.
pub const ACCURACY_EPSILON: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub bind_addr: SocketAddr,
    /// How many times a single rank back-write is tried before it is reported as failed.
    pub rank_write_attempts: u32,
    /// Coins for rank 1, 2, 3, ... in order.
    pub podium_coin_rewards: Vec<i64>,
    /// Coins for every other evaluated participant.
    pub participation_coin_reward: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let rank_write_attempts = env::var("RANK_WRITE_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(3);

        let podium_coin_rewards = env::var("PODIUM_COIN_REWARDS")
            .ok()
            .and_then(|v| parse_rewards(&v))
            .unwrap_or_else(|| vec![50, 30, 20]);

        let participation_coin_reward = env::var("PARTICIPATION_COIN_REWARD")
            .ok()
            .and_then(|v| parse_reward(&v))
            .unwrap_or(5);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            bind_addr,
            rank_write_attempts,
            podium_coin_rewards,
            participation_coin_reward,
        }
    }

    /// Coins granted to the participant finishing at `rank` (1-based).
    pub fn coin_reward_for_rank(&self, rank: u32) -> i64 {
        rank.checked_sub(1)
            .and_then(|idx| self.podium_coin_rewards.get(idx as usize))
            .copied()
            .unwrap_or(self.participation_coin_reward)
    }
}

/// Parses a comma separated list like `50,30,20`. Returns `None` if any item is not a non-negative number.
fn parse_rewards(raw: &str) -> Option<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_reward)
        .collect()
}

/// Rewards are credits only; negative values are rejected.
fn parse_reward(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|n| *n >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_rewards(podium: Vec<i64>, participation: i64) -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: String::new(),
            jwt_expiration: 60,
            rust_log: "error".to_string(),
            admin_username: None,
            admin_password: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            rank_write_attempts: 1,
            podium_coin_rewards: podium,
            participation_coin_reward: participation,
        }
    }

    #[test]
    fn test_parse_rewards() {
        assert_eq!(parse_rewards("50, 30,20"), Some(vec![50, 30, 20]));
        assert_eq!(parse_rewards(""), Some(vec![]));
        assert_eq!(parse_rewards("50,abc"), None);
        assert_eq!(parse_rewards("50,-30,20"), None);
        assert_eq!(parse_reward(" 5 "), Some(5));
        assert_eq!(parse_reward("0"), Some(0));
        assert_eq!(parse_reward("-5"), None);
    }

    #[test]
    fn test_coin_reward_for_rank() {
        let config = config_with_rewards(vec![50, 30, 20], 5);
        assert_eq!(config.coin_reward_for_rank(1), 50);
        assert_eq!(config.coin_reward_for_rank(3), 20);
        assert_eq!(config.coin_reward_for_rank(4), 5);
        assert_eq!(config.coin_reward_for_rank(0), 5);
    }
}
