//! PostgreSQL implementation of NotificationInbox.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::domain::foundation::{DomainError, NotificationId, Timestamp, UserId};
use crate::domain::notification::{Audience, Inbox, InboxEntry, NewNotification};
use crate::ports::NotificationInbox;

use super::rows::database_error;

/// Inserts the notification and its recipient rows on `conn`.
///
/// Returns false when the idempotency key is already taken; nothing is
/// written in that case.
pub(super) async fn insert_notification(
    conn: &mut PgConnection,
    notification: &NewNotification,
) -> Result<bool, DomainError> {
    let broadcast = matches!(notification.audience, Audience::Broadcast);
    let inserted = sqlx::query(
        r#"
        INSERT INTO notifications (id, label, type, description, emitter_id, broadcast, idempotency_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (idempotency_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(notification.id.as_uuid())
    .bind(&notification.label)
    .bind(&notification.kind)
    .bind(&notification.description)
    .bind(notification.emitter_id.map(|id| id.as_i64()))
    .bind(broadcast)
    .bind(&notification.idempotency_key)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| database_error("insert notification", e))?;

    if inserted.is_none() {
        return Ok(false);
    }

    let recipients: Vec<Option<i64>> = match &notification.audience {
        Audience::Broadcast => vec![None],
        Audience::Users(users) => {
            let mut ids: Vec<_> = users.iter().map(|u| u.as_i64()).collect();
            ids.sort_unstable();
            ids.dedup();
            ids.into_iter().map(Some).collect()
        }
    };

    sqlx::query(
        r#"
        INSERT INTO notification_recipients (notification_id, recipient_id)
        SELECT $1, UNNEST($2::BIGINT[])
        "#,
    )
    .bind(notification.id.as_uuid())
    .bind(recipients)
    .execute(&mut *conn)
    .await
    .map_err(|e| database_error("insert notification recipients", e))?;

    Ok(true)
}

/// PostgreSQL implementation of NotificationInbox.
#[derive(Clone)]
pub struct PostgresNotificationInbox {
    pool: PgPool,
}

impl PostgresNotificationInbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationInbox for PostgresNotificationInbox {
    async fn publish(&self, notification: &NewNotification) -> Result<bool, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database_error("begin transaction", e))?;
        let inserted = insert_notification(&mut tx, notification).await?;
        tx.commit()
            .await
            .map_err(|e| database_error("commit notification", e))?;
        Ok(inserted)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: u32,
        offset: u32,
    ) -> Result<Inbox, DomainError> {
        let counts = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE NOT COALESCE(r.read, FALSE)) AS unread
            FROM notifications n
            LEFT JOIN notification_recipients r
                   ON r.notification_id = n.id AND r.recipient_id = $1
            WHERE n.broadcast OR r.recipient_id IS NOT NULL
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error("count notifications", e))?;

        let rows = sqlx::query(
            r#"
            SELECT n.id, n.label, n.type, n.description, n.emitter_id, n.broadcast, n.created_at,
                   COALESCE(r.read, FALSE) AS read, r.read_at
            FROM notifications n
            LEFT JOIN notification_recipients r
                   ON r.notification_id = n.id AND r.recipient_id = $1
            WHERE n.broadcast OR r.recipient_id IS NOT NULL
            ORDER BY n.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id.as_i64())
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database_error("fetch notifications", e))?;

        let entries = rows
            .iter()
            .map(|row| -> Result<InboxEntry, sqlx::Error> {
                Ok(InboxEntry {
                    id: NotificationId::from_uuid(row.try_get::<Uuid, _>("id")?),
                    label: row.try_get("label")?,
                    kind: row.try_get("type")?,
                    description: row.try_get("description")?,
                    emitter_id: row
                        .try_get::<Option<i64>, _>("emitter_id")?
                        .and_then(|id| UserId::new(id).ok()),
                    broadcast: row.try_get("broadcast")?,
                    read: row.try_get("read")?,
                    read_at: row
                        .try_get::<Option<DateTime<Utc>>, _>("read_at")?
                        .map(Timestamp::from_datetime),
                    created_at: Timestamp::from_datetime(row.try_get("created_at")?),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| database_error("decode notification", e))?;

        let total: i64 = counts
            .try_get("total")
            .map_err(|e| database_error("decode notification count", e))?;
        let unread: i64 = counts
            .try_get("unread")
            .map_err(|e| database_error("decode notification count", e))?;

        Ok(Inbox {
            entries,
            total: total as u64,
            unread: unread as u64,
        })
    }

    async fn mark_read(&self, user_id: UserId, id: NotificationId) -> Result<bool, DomainError> {
        let direct = sqlx::query(
            r#"
            UPDATE notification_recipients
            SET read = TRUE, read_at = COALESCE(read_at, NOW())
            WHERE notification_id = $1 AND recipient_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("mark notification read", e))?;

        if direct.rows_affected() > 0 {
            return Ok(true);
        }

        let receipt = sqlx::query(
            r#"
            INSERT INTO notification_recipients (notification_id, recipient_id, read, read_at)
            SELECT id, $2, TRUE, NOW() FROM notifications WHERE id = $1 AND broadcast
            ON CONFLICT (notification_id, recipient_id) DO NOTHING
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("record broadcast receipt", e))?;

        Ok(receipt.rows_affected() > 0)
    }
}
