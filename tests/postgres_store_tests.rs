// tests/postgres_store_tests.rs
//
// Needs a running Postgres: DATABASE_URL=... cargo test -- --ignored

use std::sync::Arc;

use iba_live_test::{
    models::{
        coin::{CoinGrant, CoinUpdate},
        live_test::LiveTest,
        user::{NewUser, UserProfile},
    },
    store::{PgStore, Store},
};
use sqlx::{postgres::PgPoolOptions, types::Json};

async fn connect() -> PgStore {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    PgStore::new(pool)
}

async fn seed_user(store: &PgStore) -> UserProfile {
    let user = store
        .create_user(NewUser {
            username: format!("pg_{}", &uuid::Uuid::new_v4().to_string()[..8]),
            password_hash: "x".to_string(),
            role: "user".to_string(),
            display_name: None,
            profile_picture_url: None,
            batch: Some("B1".to_string()),
        })
        .await
        .unwrap();
    UserProfile::from(&user)
}

#[tokio::test]
#[ignore]
async fn concurrent_grants_use_row_lock() {
    let store = Arc::new(connect().await);
    let profile = seed_user(&store).await;

    let grant = |delta: i64| {
        let store = store.clone();
        let profile = profile.clone();
        tokio::spawn(async move {
            store
                .apply_coin_delta(
                    CoinGrant {
                        user_id: profile.user_id,
                        delta,
                        reason: "test".to_string(),
                        reference: None,
                    },
                    profile,
                )
                .await
        })
    };

    let (a, b) = tokio::join!(grant(10), grant(5));
    assert!(matches!(a.unwrap().unwrap(), CoinUpdate::Applied(_)));
    assert!(matches!(b.unwrap().unwrap(), CoinUpdate::Applied(_)));

    let balance = store.coin_balance(profile.user_id).await.unwrap().unwrap();
    assert_eq!(balance.coins, 15);
}

#[tokio::test]
#[ignore]
async fn legacy_result_recovers_correct_count() {
    let store = connect().await;
    let profile = seed_user(&store).await;
    let test_id = format!("legacy_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    store
        .create_live_test(LiveTest {
            id: test_id.clone(),
            title: "Legacy".to_string(),
            question_ids: Json(vec![]),
            starts_at: None,
            ends_at: None,
            created_at: None,
        })
        .await
        .unwrap();

    // 7 correct out of 10 attempted, stored without a correct count.
    sqlx::query(
        r#"
        INSERT INTO evaluated_results (test_id, user_id, total_score, attempted, accuracy, time_taken)
        VALUES ($1, $2, 6.25, 10, 70.0, 900)
        "#,
    )
    .bind(&test_id)
    .bind(profile.user_id)
    .execute(store.pool())
    .await
    .unwrap();

    let result = store.find_result(&test_id, profile.user_id).await.unwrap().unwrap();
    assert_eq!(result.total_correct, 7);
}
