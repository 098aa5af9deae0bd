// Split Tracker - Web Server
// REST API over the shared ledger with Axum

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use split_tracker::settings::{self, server_addr};
use split_tracker::{
    format_money, format_timestamp, ledger_error, validation_error, Direction, Ledger,
    LedgerError, Session, Settings, Settlement, SqliteStore, Transaction, TransactionKind,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    settings: Settings,
}

impl AppState {
    fn new(store: SqliteStore, settings: Settings) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            settings,
        }
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, SqliteStore>, ApiError> {
        self.store
            .lock()
            .map_err(|_| ApiError::Internal("ledger store lock poisoned".to_string()))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(invalid) = validation_error(&err) {
            return ApiError::BadRequest(invalid.to_string());
        }
        if let Some(missing @ LedgerError::NotFound(_)) = ledger_error(&err) {
            return ApiError::NotFound(missing.to_string());
        }

        tracing::error!(error = %format!("{:#}", err), "request failed");
        ApiError::Internal(err.to_string())
    }
}

/// Unparseable bodies are bad input, answered in the usual wrapper
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(error = %rejection.body_text(), "rejected request body");
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        tracing::warn!(error = %rejection.body_text(), "rejected path parameter");
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        (status, Json(ApiResponse::err(message))).into_response()
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize, Deserialize)]
struct TransactionResponse {
    id: Uuid,
    actor: String,
    kind: TransactionKind,
    label: String,
    amount: Decimal,
    reason: String,
    timestamp: String,
    description: String,
}

impl TransactionResponse {
    fn new(tx: &Transaction, ledger: &Ledger) -> Self {
        Self {
            id: tx.id,
            actor: ledger.party(tx.actor).name.clone(),
            kind: tx.kind,
            label: tx.kind.label().to_string(),
            amount: tx.amount,
            reason: tx.reason.clone(),
            timestamp: format_timestamp(&tx.timestamp),
            description: tx.describe(ledger),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SettlementResponse {
    direction: Direction,
    amount: Decimal,
    display_amount: String,
    statement: String,
}

impl SettlementResponse {
    fn new(settlement: &Settlement, ledger: &Ledger) -> Self {
        Self {
            direction: settlement.direction,
            amount: settlement.amount,
            display_amount: format_money(settlement.amount),
            statement: settlement.statement(ledger),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PartyResponse {
    name: String,
    balance: Decimal,
}

#[derive(Serialize, Deserialize)]
struct LedgerResponse {
    party_a: PartyResponse,
    party_b: PartyResponse,
    settlement: SettlementResponse,
    /// Newest first
    transactions: Vec<TransactionResponse>,
}

impl From<Ledger> for LedgerResponse {
    fn from(ledger: Ledger) -> Self {
        let settlement = SettlementResponse::new(&Settlement::from_ledger(&ledger), &ledger);
        let transactions = ledger
            .transactions
            .iter()
            .rev()
            .map(|tx| TransactionResponse::new(tx, &ledger))
            .collect();

        Self {
            party_a: PartyResponse {
                name: ledger.party_a.name.clone(),
                balance: ledger.party_a.balance,
            },
            party_b: PartyResponse {
                name: ledger.party_b.name.clone(),
                balance: ledger.party_b.balance,
            },
            settlement,
            transactions,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct KindResponse {
    tag: String,
    label: String,
}

/// Body of POST /api/transactions
#[derive(Deserialize)]
struct NewTransactionRequest {
    actor: String,
    kind: String,
    amount: Decimal,
    #[serde(default)]
    reason: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/ledger - Balances, settlement and all transactions
async fn get_ledger(State(state): State<AppState>) -> Result<Json<ApiResponse<LedgerResponse>>, ApiError> {
    let mut store = state.lock_store()?;
    let mut session = Session::new(&mut *store, state.settings.clone());

    let ledger = session.ledger()?;
    Ok(Json(ApiResponse::ok(ledger.into())))
}

/// GET /api/settlement - Who owes whom
async fn get_settlement(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SettlementResponse>>, ApiError> {
    let mut store = state.lock_store()?;
    let mut session = Session::new(&mut *store, state.settings.clone());

    let summary = session.summary()?;
    Ok(Json(ApiResponse::ok(SettlementResponse::new(
        &summary.settlement,
        &summary.ledger,
    ))))
}

/// GET /api/kinds - The six transaction kinds
async fn get_kinds() -> impl IntoResponse {
    let kinds: Vec<KindResponse> = TransactionKind::ALL
        .into_iter()
        .map(|kind| KindResponse {
            tag: kind.tag().to_string(),
            label: kind.label().to_string(),
        })
        .collect();

    Json(ApiResponse::ok(kinds))
}

/// POST /api/transactions - Record a transaction as `actor`
async fn create_transaction(
    State(state): State<AppState>,
    request: Result<Json<NewTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionResponse>>), ApiError> {
    let Json(request) = request?;
    let kind: TransactionKind = request
        .kind
        .parse()
        .map_err(|err: split_tracker::ValidationError| ApiError::BadRequest(err.to_string()))?;

    let mut store = state.lock_store()?;
    let mut session = Session::new(&mut *store, state.settings.clone());

    session
        .login(&request.actor)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let tx = session.add_transaction(kind, request.amount, &request.reason)?;
    let ledger = session.ledger()?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(TransactionResponse::new(&tx, &ledger))),
    ))
}

/// DELETE /api/transactions/:id - Reverse and remove a transaction
async fn delete_transaction(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let Path(id) = id?;
    let mut store = state.lock_store()?;
    let mut session = Session::new(&mut *store, state.settings.clone());

    let ledger = session.ledger()?;
    let removed = session.delete_transaction(id)?;

    Ok(Json(ApiResponse::ok(TransactionResponse::new(&removed, &ledger))))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ledger", get(get_ledger))
        .route("/settlement", get(get_settlement))
        .route("/kinds", get(get_kinds))
        .route("/transactions", axum::routing::post(create_transaction))
        .route("/transactions/:id", delete(delete_transaction))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = settings::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    if let Some(path) = env_file {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    println!("🌐 Split Tracker - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let settings = Settings::from_file(settings::settings_path())?;
    let db_path = settings::db_path();
    let store = SqliteStore::open(&db_path)?;
    println!("✓ Database opened: {:?}", db_path);
    println!(
        "✓ Parties: {} and {}",
        settings.person_a_name, settings.person_b_name
    );

    let app = router(AppState::new(store, settings));

    let addr = server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/ledger", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let store = SqliteStore::open_in_memory().unwrap();
        router(AppState::new(store, Settings::default()))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_transaction(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/transactions")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = send(&app, get("/api/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_create_then_settlement() {
        let app = test_app();

        let (status, body) = send(
            &app,
            post_transaction(json!({
                "actor": "Alice",
                "kind": "self_paid_split",
                "amount": "20.00",
                "reason": "dinner"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["actor"], "Alice");
        assert_eq!(body["data"]["amount"], "20.00");

        let (status, body) = send(&app, get("/api/settlement")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["direction"], "B_OWES_A");
        assert_eq!(body["data"]["statement"], "Bob owes Alice: $10.00");
    }

    #[tokio::test]
    async fn test_validation_errors_are_bad_request() {
        let app = test_app();

        let (status, body) = send(
            &app,
            post_transaction(json!({"actor": "Alice", "kind": "self_paid_split", "amount": "0"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = send(
            &app,
            post_transaction(json!({"actor": "Alice", "kind": "paid_by_grandma", "amount": "5"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            post_transaction(json!({"actor": "Mallory", "kind": "self_settled", "amount": "5"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, get("/api/ledger")).await;
        assert_eq!(body["data"]["transactions"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_wrapped_bad_request() {
        let app = test_app();

        let (status, body) = send(
            &app,
            post_transaction(json!({"actor": "Alice", "kind": "self_paid_split", "amount": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());

        let (status, body) = send(
            &app,
            post_transaction(json!({"actor": "Alice", "kind": "self_paid_split"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("amount"));

        let request = Request::builder()
            .method("DELETE")
            .uri("/api/transactions/not-a-uuid")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_oversized_amounts_rejected_and_server_keeps_serving() {
        let app = test_app();

        let (status, body) = send(
            &app,
            post_transaction(json!({
                "actor": "Alice",
                "kind": "self_paid_full",
                "amount": "79228162514264337593543950335"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        for _ in 0..2 {
            let (status, _) = send(
                &app,
                post_transaction(json!({
                    "actor": "Alice",
                    "kind": "self_paid_full",
                    "amount": "1000000000"
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, _) = send(
            &app,
            post_transaction(json!({"actor": "Bob", "kind": "self_settled", "amount": "5"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = send(&app, get("/api/ledger")).await;
        let balance: Decimal = body["data"]["party_a"]["balance"].as_str().unwrap().parse().unwrap();
        assert_eq!(balance, Decimal::from(1_999_999_995));
    }

    #[tokio::test]
    async fn test_delete_round_trip() {
        let app = test_app();

        let (_, body) = send(
            &app,
            post_transaction(json!({"actor": "Bob", "kind": "other_paid_full", "amount": "50"})),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/transactions/{}", id))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, get("/api/ledger")).await;
        assert_eq!(body["data"]["settlement"]["direction"], "SETTLED");
        assert_eq!(body["data"]["transactions"].as_array().unwrap().len(), 0);

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/transactions/{}", id))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
