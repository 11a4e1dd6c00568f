//! JSON API over in-memory shopping sessions.
//!
//! - `GET    /health`
//! - `POST   /sessions`                             start a session
//! - `GET    /sessions/{id}`                        transcript, status and brief
//! - `DELETE /sessions/{id}`                        end a session and drop its state
//! - `POST   /sessions/{id}/chat`                   one conversational turn
//! - `POST   /sessions/{id}/search`                 search and rank for a ready brief
//! - `GET    /sessions/{id}/cart`                   cart summary
//! - `POST   /sessions/{id}/cart/items`             add a product from the latest result
//! - `PATCH  /sessions/{id}/cart/items/{item_id}`   change quantity (below one removes)
//! - `DELETE /sessions/{id}/cart/items/{item_id}`   remove an item
//! - `POST   /sessions/{id}/checkout`               simulated checkout, one step per retailer

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shopwise_agent::{
    runtime::{AgentRuntime, TurnOutcome},
    sessions::{SessionHandle, SessionRegistry, SessionView},
};
use shopwise_core::{
    cart::{CartItemId, CartSummary, CheckoutSimulation},
    domain::{candidate::Variant, requirement::SessionId},
    errors::{ApplicationError, InterfaceError},
    ranking::SearchResult,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::health::health;

#[derive(Clone)]
pub struct ApiState {
    pub(crate) runtime: Arc<AgentRuntime>,
    pub(crate) sessions: Arc<SessionRegistry>,
}

impl ApiState {
    pub fn new(runtime: Arc<AgentRuntime>, sessions: Arc<SessionRegistry>) -> Self {
        Self { runtime, sessions }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub source_id: String,
    pub external_id: String,
    pub quantity: Option<u32>,
    pub variant: Option<Variant>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CartItemResponse {
    pub item_id: CartItemId,
    pub cart: CartSummary,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

/// Interface error rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    fn status(&self) -> StatusCode {
        match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(
                event_name = "api.request_failed",
                correlation_id = %self.0.correlation_id(),
                error = %self.0,
                "request failed"
            );
        }
        let body = ErrorBody {
            error: self.0.user_message(),
            detail: self.0.message().to_string(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/chat", post(chat))
        .route("/sessions/{id}/search", post(search))
        .route("/sessions/{id}/cart", get(get_cart))
        .route("/sessions/{id}/cart/items", post(add_cart_item))
        .route(
            "/sessions/{id}/cart/items/{item_id}",
            patch(update_cart_item).delete(remove_cart_item),
        )
        .route("/sessions/{id}/checkout", post(checkout))
        .with_state(state)
}

fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

async fn session(
    state: &ApiState,
    id: String,
    correlation_id: &str,
) -> Result<SessionHandle, ApiError> {
    state
        .sessions
        .require(&SessionId(id))
        .await
        .map_err(|error| ApiError::from_application(error, correlation_id))
}

fn cart_item_not_found(item_id: u64, correlation_id: &str) -> ApiError {
    ApiError(InterfaceError::NotFound {
        message: format!("cart item `{item_id}` not found"),
        correlation_id: correlation_id.to_string(),
    })
}

pub async fn create_session(State(state): State<ApiState>) -> (StatusCode, Json<SessionView>) {
    let (_, handle) = state.sessions.create().await;
    let view = handle.lock().await.view();
    (StatusCode::CREATED, Json(view))
}

pub async fn get_session(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> Result<Json<SessionView>, ApiError> {
    let correlation_id = correlation_id();
    let handle = session(&state, id, &correlation_id).await?;
    let view = handle.lock().await.view();
    Ok(Json(view))
}

pub async fn delete_session(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> Result<StatusCode, ApiError> {
    let correlation_id = correlation_id();
    let session_id = SessionId(id);
    if !state.sessions.remove(&session_id).await {
        return Err(ApiError::from_application(
            ApplicationError::SessionNotFound(session_id.0),
            &correlation_id,
        ));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn chat(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<TurnOutcome>, ApiError> {
    let correlation_id = correlation_id();
    let message = body.message.trim();
    if message.is_empty() {
        return Err(ApiError(InterfaceError::BadRequest {
            message: "message must not be empty".to_string(),
            correlation_id,
        }));
    }

    let handle = session(&state, id, &correlation_id).await?;
    let mut session = handle.lock().await;
    let outcome = state
        .runtime
        .handle_turn(&mut session, message, &correlation_id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(outcome))
}

pub async fn search(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> Result<Json<SearchResult>, ApiError> {
    let correlation_id = correlation_id();
    let handle = session(&state, id, &correlation_id).await?;
    let mut session = handle.lock().await;
    let result = state
        .runtime
        .run_search(&mut session, &correlation_id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(result))
}

pub async fn get_cart(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> Result<Json<CartSummary>, ApiError> {
    let correlation_id = correlation_id();
    let handle = session(&state, id, &correlation_id).await?;
    let summary = handle.lock().await.cart().summary();
    Ok(Json(summary))
}

pub async fn add_cart_item(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    Json(body): Json<AddCartItemRequest>,
) -> Result<(StatusCode, Json<CartItemResponse>), ApiError> {
    let correlation_id = correlation_id();
    let handle = session(&state, id, &correlation_id).await?;
    let mut session = handle.lock().await;
    let item_id = state
        .runtime
        .add_to_cart(
            &mut session,
            &body.source_id,
            &body.external_id,
            body.quantity.unwrap_or(1),
            body.variant,
            &correlation_id,
        )
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    info!(
        event_name = "api.cart_item_added",
        correlation_id = %correlation_id,
        session_id = %session.id(),
        item_id = %item_id,
        "added product to cart"
    );
    Ok((StatusCode::CREATED, Json(CartItemResponse { item_id, cart: session.cart().summary() })))
}

pub async fn update_cart_item(
    Path((id, item_id)): Path<(String, u64)>,
    State(state): State<ApiState>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<Json<CartSummary>, ApiError> {
    let correlation_id = correlation_id();
    let handle = session(&state, id, &correlation_id).await?;
    let mut session = handle.lock().await;
    let updated = session
        .cart_mut()
        .update_quantity(CartItemId(item_id), body.quantity)
        .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?;
    if !updated {
        return Err(cart_item_not_found(item_id, &correlation_id));
    }
    Ok(Json(session.cart().summary()))
}

pub async fn remove_cart_item(
    Path((id, item_id)): Path<(String, u64)>,
    State(state): State<ApiState>,
) -> Result<Json<CartSummary>, ApiError> {
    let correlation_id = correlation_id();
    let handle = session(&state, id, &correlation_id).await?;
    let mut session = handle.lock().await;
    if !session.cart_mut().remove(CartItemId(item_id)) {
        return Err(cart_item_not_found(item_id, &correlation_id));
    }
    Ok(Json(session.cart().summary()))
}

pub async fn checkout(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> Result<Json<CheckoutSimulation>, ApiError> {
    let correlation_id = correlation_id();
    let handle = session(&state, id, &correlation_id).await?;
    let session = handle.lock().await;
    let simulation = session.cart().simulate_checkout();

    info!(
        event_name = "api.checkout_simulated",
        correlation_id = %correlation_id,
        session_id = %session.id(),
        retailers = simulation.steps.len(),
        total_price = %simulation.total_price,
        "simulated checkout"
    );
    Ok(Json(simulation))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        extract::{Path, State},
        http::{Request, StatusCode},
        response::IntoResponse,
        Json,
    };
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use shopwise_agent::KeywordExtractor;
    use shopwise_core::{catalog::demo_sources, flows::SessionStatus, search::Aggregator};
    use tower::ServiceExt;

    use super::*;

    fn state() -> ApiState {
        let today = NaiveDate::from_ymd_opt(2025, 1, 10).expect("valid date");
        let runtime = AgentRuntime::new(
            Arc::new(KeywordExtractor::new().with_today(today)),
            Aggregator::new(demo_sources(), std::time::Duration::from_secs(2)),
        )
        .with_today(today);
        ApiState::new(Arc::new(runtime), Arc::new(SessionRegistry::new()))
    }

    async fn new_session(state: &ApiState) -> String {
        let (status, Json(view)) = create_session(State(state.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        view.session_id
    }

    async fn say(state: &ApiState, id: &str, message: &str) -> Result<TurnOutcome, ApiError> {
        chat(
            Path(id.to_string()),
            State(state.clone()),
            Json(ChatRequest { message: message.to_string() }),
        )
        .await
        .map(|Json(outcome)| outcome)
    }

    #[tokio::test]
    async fn chat_gathers_until_ready_then_rejects_more_turns() {
        let state = state();
        let id = new_session(&state).await;

        let first = say(&state, &id, "I need a ski outfit").await.expect("turn succeeds");
        assert_eq!(first.status, SessionStatus::GatheringInfo);
        assert_eq!(first.session_id, id);

        let second =
            say(&state, &id, "under 400 euro by 2025-01-15").await.expect("turn succeeds");
        assert_eq!(second.status, SessionStatus::ReadyForSearch);
        assert!(!second.requirements["budget_max"].is_null());

        let rejected = say(&state, &id, "also red please").await.expect_err("brief is frozen");
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        let Json(view) =
            get_session(Path(id.clone()), State(state.clone())).await.expect("session exists");
        assert_eq!(view.turns, 2);
        assert_eq!(view.messages.len(), 4);
    }

    #[tokio::test]
    async fn empty_message_is_a_bad_request() {
        let state = state();
        let id = new_session(&state).await;

        let error = say(&state, &id, "   ").await.expect_err("empty message");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let state = state();

        let error = say(&state, "missing", "hello").await.expect_err("no such session");
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert!(error.0.message().contains("missing"));

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_requires_a_ready_brief() {
        let state = state();
        let id = new_session(&state).await;

        let error = search(Path(id.clone()), State(state.clone()))
            .await
            .expect_err("brief is still gathering");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);

        say(&state, &id, "party outfit, that's all").await.expect("turn succeeds");
        let Json(result) =
            search(Path(id), State(state.clone())).await.expect("search succeeds");
        assert!(!result.products.is_empty());
        assert!(!result.ranking_explanation.is_empty());
    }

    #[tokio::test]
    async fn cart_items_are_added_updated_and_removed() {
        let state = state();
        let id = new_session(&state).await;
        say(&state, &id, "ski jacket, search now").await.expect("turn succeeds");
        let Json(result) =
            search(Path(id.clone()), State(state.clone())).await.expect("search succeeds");
        let top = result.products[0].candidate.clone();

        let (status, Json(added)) = add_cart_item(
            Path(id.clone()),
            State(state.clone()),
            Json(AddCartItemRequest {
                source_id: top.source_id().to_string(),
                external_id: top.external_id().to_string(),
                quantity: Some(2),
                variant: None,
            }),
        )
        .await
        .expect("product is in the result");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(added.cart.items.len(), 1);
        assert_eq!(added.cart.total_price, top.price() * Decimal::from(2));

        let Json(updated) = update_cart_item(
            Path((id.clone(), added.item_id.0)),
            State(state.clone()),
            Json(UpdateQuantityRequest { quantity: 3 }),
        )
        .await
        .expect("item exists");
        assert_eq!(updated.items[0].quantity, 3);

        let Json(emptied) =
            remove_cart_item(Path((id.clone(), added.item_id.0)), State(state.clone()))
                .await
                .expect("item exists");
        assert!(emptied.items.is_empty());

        let missing = remove_cart_item(Path((id, added.item_id.0)), State(state))
            .await
            .expect_err("already removed");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn checkout_walks_each_retailer_without_touching_the_cart() {
        let state = state();
        let id = new_session(&state).await;

        let Json(empty) =
            checkout(Path(id.clone()), State(state.clone())).await.expect("session exists");
        assert!(empty.steps.is_empty());

        say(&state, &id, "ski jacket, search now").await.expect("turn succeeds");
        let Json(result) =
            search(Path(id.clone()), State(state.clone())).await.expect("search succeeds");
        let top = result.products[0].candidate.clone();
        add_cart_item(
            Path(id.clone()),
            State(state.clone()),
            Json(AddCartItemRequest {
                source_id: top.source_id().to_string(),
                external_id: top.external_id().to_string(),
                quantity: None,
                variant: None,
            }),
        )
        .await
        .expect("product is in the result");

        let Json(simulation) =
            checkout(Path(id.clone()), State(state.clone())).await.expect("session exists");
        assert_eq!(simulation.steps.len(), 1);
        assert_eq!(simulation.steps[0].source_id, top.source_id());
        assert_eq!(
            simulation.steps[0].url,
            format!("https://checkout-sandbox.example.com/{}", top.source_id())
        );
        assert_eq!(simulation.total_price, top.price().round_dp(2));
        assert!(simulation.payment_entered_once);

        let Json(cart) = get_cart(Path(id), State(state)).await.expect("session exists");
        assert_eq!(cart.items.len(), 1);
    }

    #[tokio::test]
    async fn deleted_sessions_are_gone() {
        let state = state();
        let id = new_session(&state).await;

        let status =
            delete_session(Path(id.clone()), State(state.clone())).await.expect("session exists");
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.sessions.is_empty().await);

        let error = get_session(Path(id.clone()), State(state.clone()))
            .await
            .expect_err("session was deleted");
        assert_eq!(error.status(), StatusCode::NOT_FOUND);

        let again = delete_session(Path(id), State(state)).await.expect_err("already deleted");
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn router_serves_session_creation() {
        let response = router(state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sessions")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = router(state())
            .oneshot(
                Request::builder()
                    .uri("/sessions/unknown/cart")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
