//! Document-style persistence contracts for users, orders and payments.
//!
//! Every mutating call is atomic for a single record. Nothing here spans
//! more than one record; callers that need two writes (payment confirmation)
//! handle partial failure themselves.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_http_errors::ApiError;
use common_security::{LookupError, Role, RoleDirectory};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        ApiError::internal(value)
    }
}

/// Editable profile fields. `None` means "leave as is" on merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    /// Any other client-supplied fields, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keys owned by [`UserRecord`] itself; never stored as profile fields.
const RESERVED_PROFILE_KEYS: [&str; 4] = ["email", "role", "createdAt", "updatedAt"];

impl Profile {
    /// Copy without reserved keys or null extras, as it should be persisted.
    pub fn sanitized(&self) -> Profile {
        let mut clean = self.clone();
        clean
            .extra
            .retain(|key, value| !value.is_null() && !RESERVED_PROFILE_KEYS.contains(&key.as_str()));
        clean
    }

    pub fn merge(&mut self, update: &Profile) {
        fn take(slot: &mut Option<String>, value: &Option<String>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }
        take(&mut self.name, &update.name);
        take(&mut self.image, &update.image);
        take(&mut self.location, &update.location);
        take(&mut self.education, &update.education);
        take(&mut self.contact, &update.contact);
        for (key, value) in update.sanitized().extra {
            self.extra.insert(key, value);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub email: String,
    pub role: Role,
    #[serde(flatten)]
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub created: bool,
    pub user: UserRecord,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Login-or-register: creates a customer record on first sight, otherwise
    /// merges profile fields. Never touches the role.
    async fn upsert_profile(&self, email: &str, profile: &Profile) -> StoreResult<UpsertOutcome>;
    /// Merges profile fields into an existing record only.
    async fn update_profile(&self, email: &str, profile: &Profile) -> StoreResult<Option<UserRecord>>;
    async fn get(&self, email: &str) -> StoreResult<Option<UserRecord>>;
    async fn list(&self) -> StoreResult<Vec<UserRecord>>;
    async fn set_role(&self, email: &str, role: Role) -> StoreResult<Option<UserRecord>>;
    async fn delete(&self, email: &str) -> StoreResult<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<BigDecimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    AwaitingPayment,
    Paid,
    Approved,
    /// Only reachable under the lenient approval policy.
    ApprovedUnpaid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub owner_email: String,
    pub items: Vec<OrderItem>,
    pub total_price: BigDecimal,
    pub shipping: ShippingDetails,
    pub paid: bool,
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn status(&self) -> OrderStatus {
        match (self.paid, self.approved) {
            (false, false) => OrderStatus::AwaitingPayment,
            (true, false) => OrderStatus::Paid,
            (true, true) => OrderStatus::Approved,
            (false, true) => OrderStatus::ApprovedUnpaid,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub owner_email: String,
    pub items: Vec<OrderItem>,
    pub total_price: BigDecimal,
    pub shipping: ShippingDetails,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: NewOrder) -> StoreResult<Order>;
    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn list_by_owner(&self, email: &str) -> StoreResult<Vec<Order>>;
    async fn list_all(&self) -> StoreResult<Vec<Order>>;
    /// Sets `paid` and `transaction_id` only if the order is currently unpaid.
    /// `None` when the order is missing or already paid.
    async fn mark_paid(&self, id: Uuid, transaction_id: &str) -> StoreResult<Option<Order>>;
    /// Reverts a `mark_paid` whose payment record could not be written.
    async fn clear_payment(&self, id: Uuid) -> StoreResult<()>;
    async fn mark_approved(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub transaction_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub order_id: Uuid,
    pub transaction_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub method: Option<String>,
}

/// Append-only payment ledger. No uniqueness on `transaction_id`.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn append(&self, record: NewPaymentRecord) -> StoreResult<PaymentRecord>;
    async fn list_for_order(&self, order_id: Uuid) -> StoreResult<Vec<PaymentRecord>>;
}

/// Bundle of store handles injected into the application at startup.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub orders: Arc<dyn OrderStore>,
    pub payments: Arc<dyn PaymentStore>,
}

impl Stores {
    pub fn memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self::from_backend(Arc::new(PgStore::new(pool)))
    }

    fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: UserStore + OrderStore + PaymentStore + 'static,
    {
        Self {
            users: backend.clone(),
            orders: backend.clone(),
            payments: backend,
        }
    }
}

/// Exposes stored roles to the access policy.
pub struct UserRoles(pub Arc<dyn UserStore>);

#[async_trait]
impl RoleDirectory for UserRoles {
    async fn role_of(&self, email: &str) -> Result<Option<Role>, LookupError> {
        let user = self.0.get(email).await?;
        Ok(user.map(|u| u.role))
    }
}
