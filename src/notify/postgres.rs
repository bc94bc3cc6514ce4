//! Postgres-backed notifier and messenger
//!
//! Both write into tables owned by the marketplace's notification and chat
//! features; the handoff core only appends rows.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{DeliveryError, Messenger, Notification, Notifier, SystemMessage};

#[derive(Clone)]
pub struct PgNotifier {
    db_pool: PgPool,
}

impl PgNotifier {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), DeliveryError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (user_id, notification_type, title, message, data)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(notification.target_user_id)
        .bind(&notification.category)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.metadata)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }
}

#[derive(Clone)]
pub struct PgMessenger {
    db_pool: PgPool,
}

impl PgMessenger {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl Messenger for PgMessenger {
    async fn send_system_message(&self, message: &SystemMessage) -> Result<(), DeliveryError> {
        let mut tx = self.db_pool.begin().await?;

        // 1. Find the conversation between the two participants, in either order
        let existing = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT conversation_id FROM conversations
            WHERE (participant1_id = $1 AND participant2_id = $2)
               OR (participant1_id = $2 AND participant2_id = $1)
            ORDER BY conversation_id
            LIMIT 1
            "#,
        )
        .bind(message.from_user_id)
        .bind(message.to_user_id)
        .fetch_optional(&mut *tx)
        .await?;

        // 2. Or open one
        let conversation_id = match existing {
            Some((id,)) => id,
            None => {
                let (id,) = sqlx::query_as::<_, (i64,)>(
                    r#"
                    INSERT INTO conversations (participant1_id, participant2_id, product_id)
                    VALUES ($1, $2, $3)
                    RETURNING conversation_id
                    "#,
                )
                .bind(message.from_user_id)
                .bind(message.to_user_id)
                .bind(message.related_product_id)
                .fetch_one(&mut *tx)
                .await?;
                id
            }
        };

        // 3. Append the message and bump the conversation
        sqlx::query(
            r#"
            INSERT INTO messages (conversation_id, sender_id, receiver_id, message_text, product_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(conversation_id)
        .bind(message.from_user_id)
        .bind(message.to_user_id)
        .bind(&message.text)
        .bind(message.related_product_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET last_message_at = NOW() WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
