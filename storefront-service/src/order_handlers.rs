use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::lifecycle::OrderDraft;
use crate::store::{Order, OrderItem, OrderStatus, PaymentRecord, ShippingDetails};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItem>,
    pub total_price: BigDecimal,
    #[serde(default)]
    pub shipping: ShippingDetails,
}

impl From<CreateOrderRequest> for OrderDraft {
    fn from(req: CreateOrderRequest) -> Self {
        OrderDraft { items: req.items, total_price: req.total_price, shipping: req.shipping }
    }
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    pub transaction_id: String,
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub status: OrderStatus,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        let status = order.status();
        Self { order, status }
    }
}

fn views(orders: Vec<Order>) -> Json<Vec<OrderView>> {
    Json(orders.into_iter().map(OrderView::from).collect())
}

pub(crate) fn parse_order_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::bad_request("invalid_order_id", format!("{raw:?} is not a valid order id")))
}

pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OrderView>)> {
    let Json(req) = payload?;
    let order = state.lifecycle.create(&auth, req.into()).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

pub async fn list_my_orders(
    State(state): State<AppState>,
    auth: AuthContext,
    query: Result<Query<OwnerQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<OrderView>>> {
    let Query(OwnerQuery { email }) = query?;
    Ok(views(state.lifecycle.list_for_owner(&auth, &email).await?))
}

pub async fn list_all_orders(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Vec<OrderView>>> {
    Ok(views(state.lifecycle.list_all(&auth).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderView>> {
    let id = parse_order_id(&id)?;
    Ok(Json(state.lifecycle.get(&auth, id).await?.into()))
}

pub async fn record_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    payload: Result<Json<RecordPaymentRequest>, JsonRejection>,
) -> ApiResult<Json<OrderView>> {
    let id = parse_order_id(&id)?;
    let Json(req) = payload?;
    let order = state
        .lifecycle
        .record_payment(&auth, id, &req.transaction_id, req.method)
        .await?;
    Ok(Json(order.into()))
}

pub async fn approve_order(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderView>> {
    let id = parse_order_id(&id)?;
    Ok(Json(state.lifecycle.approve(&auth, id).await?.into()))
}

pub async fn delete_order(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_order_id(&id)?;
    state.lifecycle.delete(&auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_order_payments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<PaymentRecord>>> {
    let id = parse_order_id(&id)?;
    Ok(Json(state.lifecycle.payments_for(&auth, id).await?))
}
