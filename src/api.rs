//! JSON facade over a [`Storefront`].

use axum::{extract::{Path, Query, State}, http::StatusCode, response::{IntoResponse, Response}, routing::{delete, get, post, put}, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use crate::domain::aggregates::{CheckoutError, Order, ShippingDetails};
use crate::ports::{Notification, UserIdentity};
use crate::services::tracking::{order_lines, timeline, OrderLine, TimelineEntry, NOT_AUTHENTICATED};
use crate::services::{SubmissionOutcome, TrackingState};
use crate::storefront::Storefront;
use crate::StorefrontError;

type ApiResult<T> = std::result::Result<T, StorefrontError>;

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::ProductNotFound(_) | Self::OrderNotFound | Self::CartItemNotFound(_) | Self::CouponNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotSignedIn => StatusCode::UNAUTHORIZED,
            Self::NoCheckout => StatusCode::CONFLICT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Checkout(CheckoutError::NothingToCheckout | CheckoutError::NotAtPaymentStep) => StatusCode::CONFLICT,
            Self::Checkout(_) | Self::Order(_) | Self::Amount(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Notification(_) => StatusCode::BAD_GATEWAY,
            Self::Continuation(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Responding with error");
        } else {
            tracing::debug!(error = %self, %status, "Request rejected");
        }
        let mut body = json!({ "error": self.to_string() });
        if let Self::Checkout(CheckoutError::IncompleteShipping(fields)) = &self {
            body["missing"] = json!(fields);
        }
        (status, Json(body)).into_response()
    }
}

pub fn router(storefront: Arc<Storefront>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "storefront"})) }))
        .route("/api/v1/session", post(sign_in).delete(sign_out))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/products/:id", get(get_product))
        .route("/api/v1/banners", get(list_banners))
        .route("/api/v1/cart", get(get_cart))
        .route("/api/v1/cart/items", post(add_to_cart))
        .route("/api/v1/cart/items/:key", delete(remove_from_cart))
        .route("/api/v1/cart/items/:key/increase", post(increase_item))
        .route("/api/v1/cart/items/:key/decrease", post(decrease_item))
        .route("/api/v1/checkout", get(get_checkout))
        .route("/api/v1/checkout/buy-now", post(buy_now))
        .route("/api/v1/checkout/cart", post(cart_checkout))
        .route("/api/v1/checkout/shipping", put(update_shipping))
        .route("/api/v1/checkout/payment", post(proceed_to_payment))
        .route("/api/v1/checkout/coupon", post(apply_coupon).delete(clear_coupon))
        .route("/api/v1/checkout/pay", post(pay))
        .route("/api/v1/coupons", get(list_coupons))
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/orders/pending/retry", post(retry_pending))
        .route("/api/v1/orders/:id/tracking", get(track_order))
        .route("/api/v1/notifications/push", post(relay_push))
        .with_state(storefront)
}

type AppState = State<Arc<Storefront>>;

async fn sign_in(State(s): AppState, Json(user): Json<UserIdentity>) -> ApiResult<Json<UserIdentity>> {
    if user.uid.trim().is_empty() { return Err(StorefrontError::InvalidRequest("uid is required".to_string())); }
    s.sign_in(user.clone()).await;
    Ok(Json(user))
}

async fn sign_out(State(s): AppState) -> StatusCode {
    s.sign_out().await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)] pub struct ProductQuery { pub category: Option<String> }

async fn list_products(State(s): AppState, Query(q): Query<ProductQuery>) -> impl IntoResponse {
    Json(s.products(q.category.as_deref()))
}

async fn get_product(State(s): AppState, Path(id): Path<String>) -> impl IntoResponse { s.product(&id).map(Json) }

async fn list_banners(State(s): AppState) -> impl IntoResponse { Json(s.banners()) }

async fn get_cart(State(s): AppState) -> impl IntoResponse { Json(s.cart()) }

#[derive(Debug, Deserialize)] pub struct ProductRef { pub product_id: String }

async fn add_to_cart(State(s): AppState, Json(r): Json<ProductRef>) -> impl IntoResponse { s.add_to_cart(&r.product_id).await.map(Json) }

async fn increase_item(State(s): AppState, Path(key): Path<String>) -> impl IntoResponse { s.increase_item(&key).await.map(Json) }

async fn decrease_item(State(s): AppState, Path(key): Path<String>) -> impl IntoResponse { s.decrease_item(&key).await.map(Json) }

async fn remove_from_cart(State(s): AppState, Path(key): Path<String>) -> impl IntoResponse { s.remove_item(&key).await.map(Json) }

async fn get_checkout(State(s): AppState) -> impl IntoResponse { s.checkout().await.map(Json) }

async fn buy_now(State(s): AppState, Json(r): Json<ProductRef>) -> impl IntoResponse {
    s.begin_buy_now(&r.product_id).await.map(|session| (StatusCode::CREATED, Json(session)))
}

async fn cart_checkout(State(s): AppState) -> impl IntoResponse {
    s.begin_cart_checkout().await.map(|session| (StatusCode::CREATED, Json(session)))
}

async fn update_shipping(State(s): AppState, Json(details): Json<ShippingDetails>) -> impl IntoResponse { s.update_shipping(details).await.map(Json) }

async fn proceed_to_payment(State(s): AppState) -> impl IntoResponse { s.proceed_to_payment().await.map(Json) }

async fn list_coupons(State(s): AppState) -> impl IntoResponse { s.coupons().await.map(Json) }

#[derive(Debug, Deserialize)] pub struct CouponRef { pub coupon_id: String }

async fn apply_coupon(State(s): AppState, Json(r): Json<CouponRef>) -> impl IntoResponse { s.apply_coupon(&r.coupon_id).await.map(Json) }

async fn clear_coupon(State(s): AppState) -> impl IntoResponse { s.clear_coupon().await.map(Json) }

async fn pay(State(s): AppState) -> ApiResult<(StatusCode, Json<SubmissionOutcome>)> {
    let outcome = s.pay().await?;
    let status = match &outcome {
        SubmissionOutcome::Confirmed(_) => StatusCode::CREATED,
        SubmissionOutcome::RecordPending { .. } => StatusCode::ACCEPTED,
        SubmissionOutcome::PaymentFailed { .. } => StatusCode::PAYMENT_REQUIRED,
    };
    Ok((status, Json(outcome)))
}

async fn list_orders(State(s): AppState) -> impl IntoResponse { s.orders().await.map(Json) }

async fn retry_pending(State(s): AppState) -> impl IntoResponse {
    let recorded: Vec<String> = s.retry_pending_orders().await.into_iter().map(|o| o.order_id).collect();
    Json(json!({ "recorded": recorded }))
}

#[derive(Debug, Deserialize)]
pub struct PushMessage {
    pub title: Option<String>,
    pub body: Option<String>,
}

async fn relay_push(State(s): AppState, Json(m): Json<PushMessage>) -> ApiResult<(StatusCode, Json<Notification>)> {
    let notification = s.relay_push(m.title.as_deref(), m.body.as_deref()).await?;
    Ok((StatusCode::ACCEPTED, Json(notification)))
}

#[derive(Debug, Serialize)]
pub struct TrackingResponse {
    pub order: Order,
    pub status_label: String,
    pub timeline: Vec<TimelineEntry>,
    pub lines: Vec<OrderLine>,
}

async fn track_order(State(s): AppState, Path(id): Path<String>) -> Response {
    match s.track(&id).await {
        TrackingState::Found(order) => Json(TrackingResponse {
            status_label: order.status_label(),
            timeline: timeline(&order),
            lines: order_lines(&order),
            order: *order,
        }).into_response(),
        TrackingState::NotFound => StorefrontError::OrderNotFound.into_response(),
        TrackingState::Error(message) if message == NOT_AUTHENTICATED => StorefrontError::NotSignedIn.into_response(),
        TrackingState::Error(message) => (StatusCode::BAD_GATEWAY, Json(json!({ "error": message }))).into_response(),
        TrackingState::Idle | TrackingState::Loading => StatusCode::ACCEPTED.into_response(),
    }
}
