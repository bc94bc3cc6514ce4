//! Catalog collaborator
//!
//! Products and user profiles are owned by the wider marketplace. The
//! handoff core only reads the fields it needs (price, lender, display name,
//! payout account) and writes the payout account id during onboarding.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::BookingError;

/// Product fields relevant to pricing and ownership
#[derive(Debug, Clone, Serialize, sqlx::FromRow, PartialEq, Eq)]
pub struct Product {
    pub product_id: i64,
    pub name: String,
    pub lender_id: Uuid,
    pub price_per_day: i64, // minor currency units
}

/// User profile fields relevant to messaging and payouts
#[derive(Debug, Clone, Serialize, sqlx::FromRow, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub payout_account_id: Option<String>,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn product(&self, product_id: i64) -> Result<Option<Product>, BookingError>;

    async fn user(&self, user_id: Uuid) -> Result<Option<UserProfile>, BookingError>;

    async fn set_payout_account(
        &self,
        user_id: Uuid,
        account_id: &str,
    ) -> Result<(), BookingError>;

    /// Connected payout destination of a user, if onboarded
    async fn payout_account(&self, user_id: Uuid) -> Result<Option<String>, BookingError> {
        Ok(self
            .user(user_id)
            .await?
            .and_then(|profile| profile.payout_account_id))
    }

    /// Non-blank display name of a user
    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, BookingError> {
        Ok(self
            .user(user_id)
            .await?
            .and_then(|profile| profile.name)
            .filter(|name| !name.trim().is_empty()))
    }
}

/// Catalog reading the marketplace `products` and `users` tables
#[derive(Clone)]
pub struct PgCatalog {
    db_pool: PgPool,
}

impl PgCatalog {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn product(&self, product_id: i64) -> Result<Option<Product>, BookingError> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT product_id, name, lender_id, price_per_day FROM products WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(product)
    }

    async fn user(&self, user_id: Uuid) -> Result<Option<UserProfile>, BookingError> {
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT uuid AS user_id, name, email, stripe_account_id AS payout_account_id
            FROM users
            WHERE uuid = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(profile)
    }

    async fn set_payout_account(
        &self,
        user_id: Uuid,
        account_id: &str,
    ) -> Result<(), BookingError> {
        let result = sqlx::query("UPDATE users SET stripe_account_id = $1 WHERE uuid = $2")
            .bind(account_id)
            .bind(user_id)
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BookingError::NotFound);
        }
        Ok(())
    }
}

/// In-memory catalog used by tests and local tooling
#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<i64, Product>>,
    users: RwLock<HashMap<Uuid, UserProfile>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, product: Product) {
        if let Ok(mut products) = self.products.write() {
            products.insert(product.product_id, product);
        }
    }

    pub fn add_user(&self, profile: UserProfile) {
        if let Ok(mut users) = self.users.write() {
            users.insert(profile.user_id, profile);
        }
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn product(&self, product_id: i64) -> Result<Option<Product>, BookingError> {
        let products = self
            .products
            .read()
            .map_err(|e| BookingError::Storage(e.to_string()))?;
        Ok(products.get(&product_id).cloned())
    }

    async fn user(&self, user_id: Uuid) -> Result<Option<UserProfile>, BookingError> {
        let users = self
            .users
            .read()
            .map_err(|e| BookingError::Storage(e.to_string()))?;
        Ok(users.get(&user_id).cloned())
    }

    async fn set_payout_account(
        &self,
        user_id: Uuid,
        account_id: &str,
    ) -> Result<(), BookingError> {
        let mut users = self
            .users
            .write()
            .map_err(|e| BookingError::Storage(e.to_string()))?;
        let profile = users.get_mut(&user_id).ok_or(BookingError::NotFound)?;
        profile.payout_account_id = Some(account_id.to_string());
        Ok(())
    }
}
