use std::sync::Arc;

use bigdecimal::BigDecimal;
use common_auth::AuthContext;
use common_http_errors::ApiError;
use common_money::round_to_cents;
use common_security::{AccessPolicy, Scope, SecurityError};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::{
    NewOrder, NewPaymentRecord, Order, OrderItem, OrderStore, PaymentRecord, PaymentStore,
    ShippingDetails, StoreError,
};

/// Whether an order must be paid before an admin may approve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalPolicy {
    #[default]
    RequirePayment,
    Lenient,
}

impl ApprovalPolicy {
    pub fn from_requires_payment(requires_payment: bool) -> Self {
        if requires_payment {
            Self::RequirePayment
        } else {
            Self::Lenient
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("order {0} not found")]
    NotFound(Uuid),
    #[error("forbidden access")]
    Forbidden,
    #[error("{message}")]
    Validation { code: &'static str, message: String },
    #[error("order {0} is already paid")]
    AlreadyPaid(Uuid),
    #[error("order {0} must be paid before approval")]
    NotPaid(Uuid),
    #[error("role lookup failed: {0}")]
    Lookup(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LifecycleError {
    fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { code, message: message.into() }
    }
}

impl From<SecurityError> for LifecycleError {
    fn from(value: SecurityError) -> Self {
        match value {
            SecurityError::Forbidden => Self::Forbidden,
            SecurityError::Lookup(detail) => Self::Lookup(detail),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(value: LifecycleError) -> Self {
        match value {
            LifecycleError::NotFound(_) => ApiError::NotFound {
                code: "order_not_found",
                message: Some(value.to_string()),
            },
            LifecycleError::Forbidden => ApiError::Forbidden { message: Some(value.to_string()) },
            LifecycleError::Validation { code, message } => ApiError::BadRequest { code, message: Some(message) },
            LifecycleError::AlreadyPaid(_) => ApiError::Conflict {
                code: "order_already_paid",
                message: Some(value.to_string()),
            },
            LifecycleError::NotPaid(_) => ApiError::Conflict {
                code: "order_not_paid",
                message: Some(value.to_string()),
            },
            LifecycleError::Lookup(_) | LifecycleError::Store(_) => ApiError::internal(value),
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Caller-supplied order contents; the owner always comes from the token.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub items: Vec<OrderItem>,
    pub total_price: BigDecimal,
    pub shipping: ShippingDetails,
}

impl OrderDraft {
    fn validate(&self) -> LifecycleResult<BigDecimal> {
        if self.items.is_empty() {
            return Err(LifecycleError::validation("invalid_items", "order must contain at least one item"));
        }
        if let Some(item) = self.items.iter().find(|i| i.product_id.trim().is_empty()) {
            return Err(LifecycleError::validation(
                "invalid_items",
                format!("item {:?} is missing a product id", item.name.as_deref().unwrap_or("")),
            ));
        }
        if let Some(item) = self.items.iter().find(|i| i.quantity == 0) {
            return Err(LifecycleError::validation(
                "invalid_quantity",
                format!("quantity for product {} must be positive", item.product_id),
            ));
        }
        round_to_cents(&self.total_price)
            .map_err(|err| LifecycleError::validation("invalid_total", err.to_string()))
    }
}

/// Order state machine: creation, payment confirmation, approval and
/// deletion, each gated by the access policy.
pub struct OrderLifecycle {
    orders: Arc<dyn OrderStore>,
    payments: Arc<dyn PaymentStore>,
    policy: AccessPolicy,
    approval: ApprovalPolicy,
    currency: String,
}

impl OrderLifecycle {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        payments: Arc<dyn PaymentStore>,
        policy: AccessPolicy,
        approval: ApprovalPolicy,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            orders,
            payments,
            policy,
            approval,
            currency: currency.into().to_ascii_lowercase(),
        }
    }

    pub async fn create(&self, auth: &AuthContext, draft: OrderDraft) -> LifecycleResult<Order> {
        self.policy.authorize(Some(auth), Scope::Authenticated).await?;
        let total_price = draft.validate()?;
        let order = self
            .orders
            .insert(NewOrder {
                owner_email: auth.email().to_owned(),
                items: draft.items,
                total_price,
                shipping: draft.shipping,
            })
            .await?;
        info!(order_id = %order.id, email = %order.owner_email, total = %order.total_price, "order created");
        Ok(order)
    }

    pub async fn get(&self, auth: &AuthContext, id: Uuid) -> LifecycleResult<Order> {
        let order = self.load(id).await?;
        self.policy.authorize(Some(auth), Scope::OwnerOrAdmin(&order.owner_email)).await?;
        Ok(order)
    }

    pub async fn list_for_owner(&self, auth: &AuthContext, email: &str) -> LifecycleResult<Vec<Order>> {
        self.policy.authorize(Some(auth), Scope::Owner(email)).await?;
        Ok(self.orders.list_by_owner(email).await?)
    }

    pub async fn list_all(&self, auth: &AuthContext) -> LifecycleResult<Vec<Order>> {
        self.policy.authorize(Some(auth), Scope::Admin).await?;
        Ok(self.orders.list_all().await?)
    }

    /// Flags the order paid, then appends the payment record. A failed append
    /// rolls the flag back so the order never reads paid without a record.
    pub async fn record_payment(
        &self,
        auth: &AuthContext,
        id: Uuid,
        transaction_id: &str,
        method: Option<String>,
    ) -> LifecycleResult<Order> {
        let order = self.load(id).await?;
        self.policy.authorize(Some(auth), Scope::OwnerOrAdmin(&order.owner_email)).await?;

        let transaction_id = transaction_id.trim();
        if transaction_id.is_empty() {
            return Err(LifecycleError::validation("invalid_transaction_id", "transactionId must not be blank"));
        }
        if order.paid {
            return Err(LifecycleError::AlreadyPaid(id));
        }

        let paid = match self.orders.mark_paid(id, transaction_id).await? {
            Some(paid) => paid,
            // Lost a race: either a concurrent confirmation or a delete.
            None => {
                return match self.orders.get(id).await? {
                    Some(_) => Err(LifecycleError::AlreadyPaid(id)),
                    None => Err(LifecycleError::NotFound(id)),
                }
            }
        };

        let record = NewPaymentRecord {
            order_id: id,
            transaction_id: transaction_id.to_owned(),
            amount: paid.total_price.clone(),
            currency: self.currency.clone(),
            method: method.filter(|m| !m.trim().is_empty()),
        };
        if let Err(err) = self.payments.append(record).await {
            error!(order_id = %id, error = %err, "payment record append failed, reverting paid flag");
            self.revert_payment(id).await;
            return Err(err.into());
        }

        info!(order_id = %id, transaction_id, email = auth.email(), "order paid");
        Ok(paid)
    }

    pub async fn approve(&self, auth: &AuthContext, id: Uuid) -> LifecycleResult<Order> {
        self.policy.authorize(Some(auth), Scope::Admin).await?;
        let order = self.load(id).await?;
        if order.approved {
            return Ok(order);
        }
        if !order.paid {
            match self.approval {
                ApprovalPolicy::RequirePayment => return Err(LifecycleError::NotPaid(id)),
                ApprovalPolicy::Lenient => warn!(order_id = %id, "approving unpaid order"),
            }
        }
        let approved = self.orders.mark_approved(id).await?.ok_or(LifecycleError::NotFound(id))?;
        info!(order_id = %id, admin = auth.email(), "order approved");
        Ok(approved)
    }

    pub async fn delete(&self, auth: &AuthContext, id: Uuid) -> LifecycleResult<()> {
        let order = self.load(id).await?;
        self.policy.authorize(Some(auth), Scope::OwnerOrAdmin(&order.owner_email)).await?;
        if !self.orders.delete(id).await? {
            return Err(LifecycleError::NotFound(id));
        }
        info!(order_id = %id, email = auth.email(), status = ?order.status(), "order deleted");
        Ok(())
    }

    pub async fn payments_for(&self, auth: &AuthContext, id: Uuid) -> LifecycleResult<Vec<PaymentRecord>> {
        let order = self.load(id).await?;
        self.policy.authorize(Some(auth), Scope::OwnerOrAdmin(&order.owner_email)).await?;
        Ok(self.payments.list_for_order(id).await?)
    }

    async fn revert_payment(&self, id: Uuid) {
        if let Err(rollback) = self.orders.clear_payment(id).await {
            error!(order_id = %id, error = %rollback, "paid flag rollback failed");
            return;
        }
        // An approval can land between mark_paid and the rollback.
        match self.orders.get(id).await {
            Ok(Some(order)) if order.approved && self.approval == ApprovalPolicy::RequirePayment => {
                error!(order_id = %id, "order was approved while its payment was being reverted; now approved without payment");
            }
            Ok(_) => {}
            Err(err) => warn!(order_id = %id, error = %err, "could not re-read order after payment rollback"),
        }
    }

    async fn load(&self, id: Uuid) -> LifecycleResult<Order> {
        self.orders.get(id).await?.ok_or(LifecycleError::NotFound(id))
    }
}
