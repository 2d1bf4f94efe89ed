mod common;

use anyhow::Result;
use relay_core::{now_utc, to_unix_millis, CreateMessageRequest, UpdateMessageRequest};
use axum::http::StatusCode;
use relay_server::error::AppError;
use relay_server::store::{MessageStore, DEFAULT_RETENTION};
use relay_server::{connect_pool_with_timeout, run_migrations};
use std::time::Duration;

fn create_req(text: &str) -> CreateMessageRequest {
    CreateMessageRequest { text: text.to_string() }
}

// Inserisce direttamente un record con created_at nel passato
async fn insert_aged(pool: &sqlx::SqlitePool, id: &str, age: Duration) -> Result<()> {
    let created_at = to_unix_millis(now_utc()) - age.as_millis() as i64;
    sqlx::query("INSERT INTO messages (id, text, read, created_at, read_notification_sent) VALUES (?, 'old', 0, ?, 0)")
        .bind(id)
        .bind(created_at)
        .execute(pool)
        .await?;
    Ok(())
}

#[tokio::test]
async fn created_message_starts_unread() -> Result<()> {
    let (_td, state) = common::setup().await?;

    let m = state.store.create(create_req("hi")).await?;
    assert!(!m.id.is_empty());
    assert_eq!(m.text, "hi");
    assert!(!m.read);
    assert!(m.read_at.is_none());
    assert!(!m.read_notification_sent);
    Ok(())
}

#[tokio::test]
async fn create_then_get_returns_same_record() -> Result<()> {
    let (_td, state) = common::setup().await?;

    let created = state.store.create(create_req("round trip")).await?;
    let fetched = state.store.get_by_id(&created.id).await?;
    assert_eq!(fetched, created);
    Ok(())
}

#[tokio::test]
async fn list_returns_messages_in_creation_order() -> Result<()> {
    let (_td, state) = common::setup().await?;
    assert!(state.store.list().await?.is_empty());

    let a = state.store.create(create_req("a")).await?;
    let b = state.store.create(create_req("b")).await?;
    let c = state.store.create(create_req("c")).await?;

    let ids: Vec<String> = state.store.list().await?.into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![a.id, b.id, c.id]);
    Ok(())
}

#[tokio::test]
async fn update_merges_only_provided_fields() -> Result<()> {
    let (_td, state) = common::setup().await?;
    let m = state.store.create(create_req("before")).await?;

    let updated = state
        .store
        .update(&m.id, UpdateMessageRequest { text: Some("after".to_string()) })
        .await?;
    assert_eq!(updated.text, "after");
    assert_eq!(updated.created_at, m.created_at);
    assert!(!updated.read);

    // update vuoto: nessun campo cambia
    let untouched = state.store.update(&m.id, UpdateMessageRequest::default()).await?;
    assert_eq!(untouched, updated);

    let missing = state.store.update("missing", UpdateMessageRequest::default()).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
    Ok(())
}

#[tokio::test]
async fn update_and_delete_unknown_id_are_not_found() -> Result<()> {
    let (_td, state) = common::setup().await?;

    let update = state.store.update("missing", UpdateMessageRequest { text: Some("x".into()) }).await;
    assert!(matches!(update, Err(AppError::NotFound)));

    let delete = state.store.delete("missing").await;
    assert!(matches!(delete, Err(AppError::NotFound)));

    let get = state.store.get_by_id("missing").await;
    assert!(matches!(get, Err(AppError::NotFound)));
    Ok(())
}

#[tokio::test]
async fn delete_removes_record() -> Result<()> {
    let (_td, state) = common::setup().await?;
    let m = state.store.create(create_req("bye")).await?;

    state.store.delete(&m.id).await?;
    assert!(matches!(state.store.get_by_id(&m.id).await, Err(AppError::NotFound)));
    assert!(matches!(state.store.delete(&m.id).await, Err(AppError::NotFound)));
    assert!(state.store.list().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn mark_read_fires_once() -> Result<()> {
    let (_td, state) = common::setup().await?;
    let m = state.store.create(create_req("read me")).await?;

    let first = state.store.mark_read(&m.id, now_utc()).await?.expect("first transition");
    assert!(first.read);
    assert!(first.read_at.is_some());
    assert!(first.read_notification_sent);
    assert_eq!(first.created_at, m.created_at);

    let second = state.store.mark_read(&m.id, now_utc()).await?;
    assert!(second.is_none());

    // readAt non viene riscritto
    let stored = state.store.get_by_id(&m.id).await?;
    assert_eq!(stored.read_at, first.read_at);
    assert!(stored.read_state_is_consistent());
    Ok(())
}

#[tokio::test]
async fn update_never_touches_read_state() -> Result<()> {
    let (_td, state) = common::setup().await?;
    let m = state.store.create(create_req("x")).await?;
    let read = state.store.mark_read(&m.id, now_utc()).await?.expect("transition");

    let updated = state
        .store
        .update(&m.id, UpdateMessageRequest { text: Some("edited".into()) })
        .await?;
    assert_eq!(updated.text, "edited");
    assert!(updated.read);
    assert_eq!(updated.read_at, read.read_at);
    assert!(updated.read_notification_sent);
    Ok(())
}

#[tokio::test]
async fn expired_messages_are_invisible() -> Result<()> {
    let (_td, state) = common::setup().await?;
    let month = Duration::from_secs(30 * 24 * 60 * 60);
    insert_aged(state.store.pool(), "old", month + Duration::from_secs(60)).await?;
    let fresh = state.store.create(create_req("fresh")).await?;

    let ids: Vec<String> = state.store.list().await?.into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![fresh.id]);

    assert!(matches!(state.store.get_by_id("old").await, Err(AppError::NotFound)));
    assert!(matches!(
        state.store.update("old", UpdateMessageRequest { text: Some("x".into()) }).await,
        Err(AppError::NotFound)
    ));
    assert!(state.store.mark_read("old", now_utc()).await?.is_none());
    assert!(matches!(state.store.delete("old").await, Err(AppError::NotFound)));
    Ok(())
}

#[tokio::test]
async fn message_just_inside_retention_is_visible() -> Result<()> {
    let (_td, state) = common::setup().await?;
    let month = Duration::from_secs(30 * 24 * 60 * 60);
    insert_aged(state.store.pool(), "almost", month - Duration::from_secs(60)).await?;

    let m = state.store.get_by_id("almost").await?;
    assert_eq!(m.text, "old");
    Ok(())
}

#[tokio::test]
async fn purge_expired_removes_only_old_rows() -> Result<()> {
    let (_td, state) = common::setup().await?;
    let month = Duration::from_secs(30 * 24 * 60 * 60);
    insert_aged(state.store.pool(), "old-1", month * 2).await?;
    insert_aged(state.store.pool(), "old-2", month + Duration::from_secs(1)).await?;
    let fresh = state.store.create(create_req("fresh")).await?;

    assert_eq!(state.store.purge_expired().await?, 2);
    assert_eq!(state.store.purge_expired().await?, 0);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(state.store.pool())
        .await?;
    assert_eq!(total, 1);
    assert_eq!(state.store.get_by_id(&fresh.id).await?, fresh);
    Ok(())
}

#[tokio::test]
async fn retention_is_configurable() -> Result<()> {
    let config = relay_server::config::Config {
        retention: Duration::from_secs(60),
        ..Default::default()
    };
    let (_td, state) = common::setup_with(config).await?;
    assert_eq!(state.store.retention(), Duration::from_secs(60));

    insert_aged(state.store.pool(), "two-minutes", Duration::from_secs(120)).await?;
    assert!(state.store.list().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn sweeper_purges_in_background() -> Result<()> {
    let (_td, state) = common::setup().await?;
    let month = Duration::from_secs(30 * 24 * 60 * 60);
    insert_aged(state.store.pool(), "stale", month * 3).await?;

    let sweeper = relay_server::expiry::start_expiry_sweeper(state.store.clone(), Duration::from_millis(20));
    let purged = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
                .fetch_one(state.store.pool())
                .await
                .expect("count");
            if total == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    sweeper.abort();
    assert!(purged.is_ok(), "sweeper did not remove the stale row");
    Ok(())
}

// Con un timeout minimo le scritture arrivano comunque in fondo: il risultato restituito
// coincide con quanto salvato, quindi una transizione non resta mai senza notifica
#[tokio::test]
async fn short_store_timeout_never_abandons_writes() -> Result<()> {
    let (_td, state) = common::setup().await?;
    let hasty = MessageStore::new(state.pool.clone(), DEFAULT_RETENTION, Duration::from_micros(1));

    let created = hasty.create(create_req("hasty")).await?;
    assert_eq!(state.store.get_by_id(&created.id).await?, created);

    let read = hasty.mark_read(&created.id, now_utc()).await?.expect("transition");
    assert_eq!(state.store.get_by_id(&created.id).await?, read);
    assert!(hasty.mark_read(&created.id, now_utc()).await?.is_none());

    let edited = hasty
        .update(&created.id, UpdateMessageRequest { text: Some("edited".into()) })
        .await?;
    assert_eq!(state.store.get_by_id(&created.id).await?, edited);
    Ok(())
}

#[tokio::test]
async fn exhausted_pool_surfaces_storage_timeout_without_writing() -> Result<()> {
    let timeout = Duration::from_millis(200);
    let pool = connect_pool_with_timeout("sqlite::memory:", timeout).await?;
    run_migrations(&pool).await?;
    let store = MessageStore::new(pool.clone(), DEFAULT_RETENTION, timeout);

    // l'unica connessione è occupata
    let held = pool.acquire().await?;
    let err = store.create(create_req("blocked")).await.unwrap_err();
    assert!(matches!(err, AppError::Timeout(t) if t == timeout), "got {:?}", err);
    assert_eq!(err.code(), "storage_timeout");
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(matches!(store.mark_read("any", now_utc()).await, Err(AppError::Timeout(_))));
    assert!(matches!(store.list().await, Err(AppError::Timeout(_))));
    drop(held);

    assert!(store.list().await?.is_empty());
    Ok(())
}
