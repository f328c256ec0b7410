//! REST API for TallyChain
//!
//! Exposes mining, transaction submission, the chain, peer registration and
//! conflict resolution over HTTP.

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use crate::blockchain::Block;
use crate::error::ChainError;
use crate::network::{ChainFetcher, ChainResponse};
use crate::node::Node;
use crate::transaction::{Transaction, TransactionPayload};

/// Shared state behind every route.
#[derive(Clone)]
pub struct ApiContext {
    pub node: Arc<Node>,
    pub fetcher: Arc<dyn ChainFetcher>,
}

impl ApiContext {
    pub fn new(node: Arc<Node>, fetcher: Arc<dyn ChainFetcher>) -> Self {
        Self { node, fetcher }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Chain(ChainError),
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Chain(e) => {
                let status = match e {
                    ChainError::InvalidTransactionPayload(_) | ChainError::NetworkError(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    ChainError::CancelledMining => StatusCode::CONFLICT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Chain(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    #[serde(rename = "previousHash")]
    pub previous_hash: String,
}

impl From<&Block> for MineResponse {
    fn from(block: &Block) -> Self {
        Self {
            message: "New Block Forged".to_string(),
            index: block.index(),
            transactions: block.transactions().to_vec(),
            proof: block.proof(),
            previous_hash: hex::encode(block.previous_hash()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterNodesRequest {
    pub nodes: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterNodesResponse {
    pub message: String,
    pub total_nodes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub message: String,
    pub replaced: bool,
    pub chain: Vec<Block>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration of every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

pub fn build_api_router(node: Arc<Node>, fetcher: Arc<dyn ChainFetcher>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        .route("/mine", get(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/chain", get(full_chain))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(resolve_nodes))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(Arc::new(ApiContext::new(node, fetcher)))
        .layer(cors)
}

/// Serve the API on `0.0.0.0:port` until `shutdown` resolves.
pub async fn run_api_server(
    node: Arc<Node>,
    fetcher: Arc<dyn ChainFetcher>,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_api_router(node.clone(), fetcher);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, node_id = %node.node_id(), "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn mine(State(ctx): State<Arc<ApiContext>>) -> Result<Json<MineResponse>, ApiError> {
    let block = ctx.node.mine_next_block().await?;
    Ok(Json(MineResponse::from(&block)))
}

async fn new_transaction(
    State(ctx): State<Arc<ApiContext>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload = TransactionPayload::from_json(&body)?;
    let index = ctx.node.submit_payload(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": format!("Transaction will be added to Block {}", index),
            "index": index
        })),
    ))
}

async fn full_chain(State(ctx): State<Arc<ApiContext>>) -> Json<ChainResponse> {
    Json(ChainResponse::new(ctx.node.get_chain().await))
}

async fn register_nodes(
    State(ctx): State<Arc<ApiContext>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: RegisterNodesRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidInput(format!("Invalid request body: {}", e)))?;
    let nodes = request.nodes.ok_or_else(|| {
        ApiError::InvalidInput("Error: Please supply a valid list of nodes".to_string())
    })?;

    ctx.node.register_peers(&nodes).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterNodesResponse {
            message: "New nodes have been added".to_string(),
            total_nodes: ctx.node.peers().peers().await,
        }),
    ))
}

async fn resolve_nodes(State(ctx): State<Arc<ApiContext>>) -> Json<ResolveResponse> {
    let replaced = ctx.node.resolve_consensus(ctx.fetcher.as_ref()).await;
    let message = if replaced {
        "Our chain was replaced"
    } else {
        "Our chain is authoritative"
    };

    Json(ResolveResponse {
        message: message.to_string(),
        replaced,
        chain: ctx.node.get_chain().await,
    })
}

async fn health_check(State(ctx): State<Arc<ApiContext>>) -> impl IntoResponse {
    let length = ctx.node.get_chain().await.len();
    Json(serde_json::json!({
        "status": "healthy",
        "node_id": ctx.node.node_id(),
        "length": length,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
