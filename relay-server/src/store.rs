//! Persistenza dei messaggi su SQLite.
//!
//! I messaggi più vecchi della finestra di conservazione sono invisibili a tutte le
//! operazioni (filtro su `created_at`) e vengono rimossi periodicamente da `purge_expired`.
//! Le scritture che leggono e modificano lo stesso record sono un singolo
//! `UPDATE ... RETURNING`, quindi atomiche per id.
//!
//! Solo le letture sono interrotte dal timeout dello store. Una scrittura già inviata a
//! SQLite non viene mai abbandonata: la latenza è limitata dal pool (`acquire_timeout`)
//! e dal `busy_timeout` della connessione, e un errore significa che nulla è stato scritto.

use relay_core::{
    from_unix_millis, new_message_id, now_utc, to_unix_millis, CreateMessageRequest, Message,
    UpdateMessageRequest,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::future::Future;
use std::time::Duration;
use time::OffsetDateTime;

use crate::error::{AppError, AppResult};

/// 30 giorni.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
    retention: Duration,
    timeout: Duration,
}

impl MessageStore {
    pub fn new(pool: SqlitePool, retention: Duration, timeout: Duration) -> Self {
        Self {
            pool,
            retention,
            timeout,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Primo `created_at` (in ms) ancora visibile.
    fn cutoff_millis(&self) -> i64 {
        to_unix_millis(now_utc()).saturating_sub(self.retention.as_millis() as i64)
    }

    // solo per le SELECT: abbandonarle non lascia effetti sul database
    async fn bounded<T, F>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(|e| self.storage_error(e)),
            Err(_) => Err(AppError::Timeout(self.timeout)),
        }
    }

    fn storage_error(&self, e: sqlx::Error) -> AppError {
        match e {
            sqlx::Error::PoolTimedOut => AppError::Timeout(self.timeout),
            other => AppError::Storage(other),
        }
    }

    /// Inserisce un nuovo messaggio non letto e lo restituisce.
    pub async fn create(&self, req: CreateMessageRequest) -> AppResult<Message> {
        let message = Message::new(new_message_id(), req.text, now_utc());
        sqlx::query(
            "INSERT INTO messages (id, text, read, created_at, read_at, read_notification_sent) VALUES (?, ?, 0, ?, NULL, 0)",
        )
        .bind(&message.id)
        .bind(&message.text)
        .bind(to_unix_millis(message.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| self.storage_error(e))?;
        Ok(message)
    }

    /// Tutti i messaggi non scaduti, in ordine di inserimento.
    pub async fn list(&self) -> AppResult<Vec<Message>> {
        let rows = self
            .bounded(
                sqlx::query(
                    "SELECT id, text, read, created_at, read_at, read_notification_sent FROM messages WHERE created_at >= ? ORDER BY rowid",
                )
                .bind(self.cutoff_millis())
                .fetch_all(&self.pool),
            )
            .await?;
        rows.iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(AppError::from)
    }

    pub async fn get_by_id(&self, id: &str) -> AppResult<Message> {
        let row = self
            .bounded(
                sqlx::query(
                    "SELECT id, text, read, created_at, read_at, read_notification_sent FROM messages WHERE id = ? AND created_at >= ?",
                )
                .bind(id)
                .bind(self.cutoff_millis())
                .fetch_optional(&self.pool),
            )
            .await?;
        match row {
            Some(r) => Ok(message_from_row(&r)?),
            None => Err(AppError::NotFound),
        }
    }

    /// Merge dei campi presenti in `req`; lo stato di lettura non è modificabile da qui.
    pub async fn update(&self, id: &str, req: UpdateMessageRequest) -> AppResult<Message> {
        // niente da cambiare: basta il record attuale
        if req.is_empty() {
            return self.get_by_id(id).await;
        }
        let row = sqlx::query(
            "UPDATE messages SET text = COALESCE(?, text) WHERE id = ? AND created_at >= ? \
             RETURNING id, text, read, created_at, read_at, read_notification_sent",
        )
        .bind(req.text)
        .bind(id)
        .bind(self.cutoff_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| self.storage_error(e))?;
        match row {
            Some(r) => Ok(message_from_row(&r)?),
            None => Err(AppError::NotFound),
        }
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ? AND created_at >= ?")
            .bind(id)
            .bind(self.cutoff_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| self.storage_error(e))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Transizione unread -> read. Restituisce il record aggiornato solo se questa chiamata
    /// ha effettuato la scrittura; `None` se il messaggio non esiste, è scaduto o era già letto.
    pub async fn mark_read(&self, id: &str, at: OffsetDateTime) -> AppResult<Option<Message>> {
        let row = sqlx::query(
            "UPDATE messages SET read = 1, read_at = ?, read_notification_sent = 1 \
             WHERE id = ? AND read = 0 AND created_at >= ? \
             RETURNING id, text, read, created_at, read_at, read_notification_sent",
        )
        .bind(to_unix_millis(at))
        .bind(id)
        .bind(self.cutoff_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| self.storage_error(e))?;
        row.as_ref()
            .map(message_from_row)
            .transpose()
            .map_err(AppError::from)
    }

    /// Elimina fisicamente i messaggi scaduti. Restituisce quanti record sono stati rimossi.
    pub async fn purge_expired(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE created_at < ?")
            .bind(self.cutoff_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| self.storage_error(e))?;
        Ok(result.rows_affected())
    }
}

fn message_from_row(row: &SqliteRow) -> Result<Message, sqlx::Error> {
    let created_at: i64 = row.try_get("created_at")?;
    let read_at: Option<i64> = row.try_get("read_at")?;
    Ok(Message {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        read: row.try_get("read")?,
        created_at: millis_to_datetime(created_at)?,
        read_at: read_at.map(millis_to_datetime).transpose()?,
        read_notification_sent: row.try_get("read_notification_sent")?,
    })
}

fn millis_to_datetime(ms: i64) -> Result<OffsetDateTime, sqlx::Error> {
    from_unix_millis(ms)
        .ok_or_else(|| sqlx::Error::Decode(format!("timestamp out of range: {}", ms).into()))
}
