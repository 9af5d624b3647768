use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common_security::Role;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    NewOrder, NewPaymentRecord, Order, OrderStore, PaymentRecord, PaymentStore, Profile,
    StoreResult, UpsertOutcome, UserRecord, UserStore,
};

/// Process-local store used when no database is configured and in tests.
/// Each operation holds a single write lock, which gives the same
/// single-record atomicity the Postgres backend provides.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
    orders: RwLock<HashMap<Uuid, Order>>,
    payments: RwLock<Vec<PaymentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_creation(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    orders
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn upsert_profile(&self, email: &str, profile: &Profile) -> StoreResult<UpsertOutcome> {
        let mut users = self.users.write().await;
        let now = Utc::now();
        let created = !users.contains_key(email);
        let user = users.entry(email.to_owned()).or_insert_with(|| UserRecord {
            email: email.to_owned(),
            role: Role::Customer,
            profile: Profile::default(),
            created_at: now,
            updated_at: now,
        });
        user.profile.merge(profile);
        user.updated_at = now;
        Ok(UpsertOutcome { created, user: user.clone() })
    }

    async fn update_profile(&self, email: &str, profile: &Profile) -> StoreResult<Option<UserRecord>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(email).map(|user| {
            user.profile.merge(profile);
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn get(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<UserRecord>> {
        let mut users: Vec<_> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn set_role(&self, email: &str, role: Role) -> StoreResult<Option<UserRecord>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(email).map(|user| {
            user.role = role;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn delete(&self, email: &str) -> StoreResult<bool> {
        Ok(self.users.write().await.remove(email).is_some())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert(&self, order: NewOrder) -> StoreResult<Order> {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            owner_email: order.owner_email,
            items: order.items,
            total_price: order.total_price,
            shipping: order.shipping,
            paid: false,
            approved: false,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        };
        self.orders.write().await.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list_by_owner(&self, email: &str) -> StoreResult<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(sorted_by_creation(
            orders.values().filter(|o| o.owner_email == email).cloned().collect(),
        ))
    }

    async fn list_all(&self) -> StoreResult<Vec<Order>> {
        Ok(sorted_by_creation(self.orders.read().await.values().cloned().collect()))
    }

    async fn mark_paid(&self, id: Uuid, transaction_id: &str) -> StoreResult<Option<Order>> {
        let mut orders = self.orders.write().await;
        Ok(orders.get_mut(&id).filter(|o| !o.paid).map(|order| {
            order.paid = true;
            order.transaction_id = Some(transaction_id.to_owned());
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn clear_payment(&self, id: Uuid) -> StoreResult<()> {
        if let Some(order) = self.orders.write().await.get_mut(&id) {
            order.paid = false;
            order.transaction_id = None;
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_approved(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let mut orders = self.orders.write().await;
        Ok(orders.get_mut(&id).map(|order| {
            order.approved = true;
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.orders.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn append(&self, record: NewPaymentRecord) -> StoreResult<PaymentRecord> {
        let record = PaymentRecord {
            id: Uuid::new_v4(),
            order_id: record.order_id,
            transaction_id: record.transaction_id,
            amount: record.amount,
            currency: record.currency,
            method: record.method,
            created_at: Utc::now(),
        };
        self.payments.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_for_order(&self, order_id: Uuid) -> StoreResult<Vec<PaymentRecord>> {
        let payments = self.payments.read().await;
        Ok(payments.iter().filter(|p| p.order_id == order_id).cloned().collect())
    }
}
