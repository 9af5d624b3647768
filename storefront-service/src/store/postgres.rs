use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_security::Role;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    NewOrder, NewPaymentRecord, Order, OrderItem, OrderStore, PaymentRecord, PaymentStore,
    Profile, ShippingDetails, StoreError, StoreResult, UpsertOutcome, UserRecord, UserStore,
};

const USER_COLUMNS: &str = "email, role, profile, created_at, updated_at";
const ORDER_COLUMNS: &str =
    "id, owner_email, items, total_price, shipping, paid, approved, transaction_id, created_at, updated_at";
const PAYMENT_COLUMNS: &str = "id, order_id, transaction_id, amount, currency, method, created_at";

/// Postgres backend. Documents with open-ended shape (profile, items,
/// shipping) live in JSONB columns; the fields the lifecycle guards on are
/// real columns so single-statement conditional updates stay atomic.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct UserRow {
    email: String,
    role: String,
    profile: Json<Profile>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        let role = row.role.parse::<Role>().map_err(|err| StoreError::Corrupt {
            id: row.email.clone(),
            reason: err.to_string(),
        })?;
        Ok(UserRecord {
            email: row.email,
            role,
            profile: row.profile.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    user: UserRow,
    created: bool,
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    owner_email: String,
    items: Json<Vec<OrderItem>>,
    total_price: BigDecimal,
    shipping: Json<ShippingDetails>,
    paid: bool,
    approved: bool,
    transaction_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            owner_email: row.owner_email,
            items: row.items.0,
            total_price: row.total_price,
            shipping: row.shipping.0,
            paid: row.paid,
            approved: row.approved,
            transaction_id: row.transaction_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    transaction_id: String,
    amount: BigDecimal,
    currency: String,
    method: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for PaymentRecord {
    fn from(row: PaymentRow) -> Self {
        PaymentRecord {
            id: row.id,
            order_id: row.order_id,
            transaction_id: row.transaction_id,
            amount: row.amount,
            currency: row.currency,
            method: row.method,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn upsert_profile(&self, email: &str, profile: &Profile) -> StoreResult<UpsertOutcome> {
        // xmax = 0 only for freshly inserted tuples.
        let row = sqlx::query_as::<_, UpsertRow>(&format!(
            "INSERT INTO users (email, role, profile) VALUES ($1, 'customer', $2)
             ON CONFLICT (email) DO UPDATE
                SET profile = users.profile || EXCLUDED.profile, updated_at = now()
             RETURNING {USER_COLUMNS}, (xmax = 0) AS created"
        ))
        .bind(email)
        .bind(Json(profile.sanitized()))
        .fetch_one(&self.pool)
        .await?;

        Ok(UpsertOutcome {
            created: row.created,
            user: row.user.try_into()?,
        })
    }

    async fn update_profile(&self, email: &str, profile: &Profile) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET profile = profile || $2, updated_at = now()
             WHERE email = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(Json(profile.sanitized()))
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn get(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn list(&self) -> StoreResult<Vec<UserRecord>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY email"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(UserRecord::try_from).collect()
    }

    async fn set_role(&self, email: &str, role: Role) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET role = $2, updated_at = now()
             WHERE email = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn delete(&self, email: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert(&self, order: NewOrder) -> StoreResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders (id, owner_email, items, total_price, shipping)
             VALUES ($1, $2, $3, $4, $5) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&order.owner_email)
        .bind(Json(&order.items))
        .bind(&order.total_price)
        .bind(Json(&order.shipping))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    async fn list_by_owner(&self, email: &str) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE owner_email = $1 ORDER BY created_at, id"
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn list_all(&self) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn mark_paid(&self, id: Uuid, transaction_id: &str) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET paid = TRUE, transaction_id = $2, updated_at = now()
             WHERE id = $1 AND paid = FALSE RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    async fn clear_payment(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query(
            "UPDATE orders SET paid = FALSE, transaction_id = NULL, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_approved(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET approved = TRUE, updated_at = now()
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn append(&self, record: NewPaymentRecord) -> StoreResult<PaymentRecord> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "INSERT INTO payments (id, order_id, transaction_id, amount, currency, method)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(record.order_id)
        .bind(&record.transaction_id)
        .bind(&record.amount)
        .bind(&record.currency)
        .bind(record.method.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_for_order(&self, order_id: Uuid) -> StoreResult<Vec<PaymentRecord>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at, id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PaymentRecord::from).collect())
    }
}
