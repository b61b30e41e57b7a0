//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `enquete_test`)
//!   `TEST_DB_PASSWORD` (default: `enquete_test`)
//!   `TEST_DB_NAME` (default: `enquete_test`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use enquete_db::entities::{poll, poll_option, user};
use enquete_db::repositories::{
    PollOptionRepository, PollRepository, UserRepository, VoteAction, VoteRepository,
};
use enquete_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::Set;

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_migrations_apply() {
    let db = TestDatabase::create_unique().await.unwrap();
    let result = enquete_db::migrate(db.connection()).await;
    assert!(result.is_ok(), "Migrations failed: {:?}", result.err());
    db.drop_database().await.unwrap();
}

fn test_user(id: &str, username: &str) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(id.to_string()),
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
        password_hash: Set("hash".to_string()),
        role: Set(user::UserRole::Client),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_vote_transition_lifecycle() {
    let test_db = TestDatabase::create_unique().await.unwrap();
    enquete_db::migrate(test_db.connection()).await.unwrap();

    let db = Arc::new(test_db.conn.clone());
    let users = UserRepository::new(Arc::clone(&db));
    let polls = PollRepository::new(Arc::clone(&db));
    let options = PollOptionRepository::new(Arc::clone(&db));
    let votes = VoteRepository::new(Arc::clone(&db));

    users.create(test_user("u1", "alice")).await.unwrap();

    let (poll, opts) = polls
        .create_with_options(
            poll::ActiveModel {
                id: Set("p1".to_string()),
                title: Set("Lunch?".to_string()),
                description: Set("Where to eat".to_string()),
                ends_at: Set((Utc::now() + Duration::days(1)).into()),
                is_active: Set(true),
                author_id: Set("u1".to_string()),
                created_at: Set(Utc::now().into()),
            },
            vec![
                poll_option::ActiveModel {
                    id: Set("o1".to_string()),
                    text: Set("Pizza".to_string()),
                    poll_id: Set("p1".to_string()),
                },
                poll_option::ActiveModel {
                    id: Set("o2".to_string()),
                    text: Set("Salad".to_string()),
                    poll_id: Set("p1".to_string()),
                },
            ],
        )
        .await
        .unwrap();

    assert_eq!(opts.len(), 2);
    assert_eq!(options.find_by_poll(&poll.id).await.unwrap().len(), 2);

    // First vote on o1 creates
    let t = votes
        .transition("u1", "o1", "p1", "v1".to_string())
        .await
        .unwrap();
    assert_eq!(t.action, VoteAction::Created);
    assert_eq!(votes.count_for_option("o1").await.unwrap(), 1);

    // Switching to o2 moves the single live vote
    let t = votes
        .transition("u1", "o2", "p1", "v2".to_string())
        .await
        .unwrap();
    assert_eq!(t.action, VoteAction::Created);
    assert_eq!(votes.count_for_option("o1").await.unwrap(), 0);
    assert_eq!(votes.count_for_option("o2").await.unwrap(), 1);
    assert_eq!(
        votes.find_by_user_and_poll("u1", "p1").await.unwrap().len(),
        1
    );

    // Voting o2 again toggles it off
    let t = votes
        .transition("u1", "o2", "p1", "v3".to_string())
        .await
        .unwrap();
    assert_eq!(t.action, VoteAction::Removed);
    assert_eq!(votes.count_for_option("o2").await.unwrap(), 0);

    test_db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_expiration_sweep() {
    let test_db = TestDatabase::create_unique().await.unwrap();
    enquete_db::migrate(test_db.connection()).await.unwrap();

    let db = Arc::new(test_db.conn.clone());
    let users = UserRepository::new(Arc::clone(&db));
    let polls = PollRepository::new(Arc::clone(&db));

    users.create(test_user("u1", "alice")).await.unwrap();

    polls
        .create_with_options(
            poll::ActiveModel {
                id: Set("expired".to_string()),
                title: Set("Old poll".to_string()),
                description: Set("Past its deadline".to_string()),
                ends_at: Set((Utc::now() - Duration::hours(1)).into()),
                is_active: Set(true),
                author_id: Set("u1".to_string()),
                created_at: Set(Utc::now().into()),
            },
            vec![
                poll_option::ActiveModel {
                    id: Set("o1".to_string()),
                    text: Set("Yes".to_string()),
                    poll_id: Set("expired".to_string()),
                },
                poll_option::ActiveModel {
                    id: Set("o2".to_string()),
                    text: Set("No".to_string()),
                    poll_id: Set("expired".to_string()),
                },
            ],
        )
        .await
        .unwrap();

    let swept = polls.deactivate_expired().await.unwrap();
    assert_eq!(swept, 1);
    assert!(!polls.get_by_id("expired").await.unwrap().is_active);

    // Sweep is idempotent
    let swept = polls.deactivate_expired().await.unwrap();
    assert_eq!(swept, 0);

    test_db.drop_database().await.unwrap();
}
