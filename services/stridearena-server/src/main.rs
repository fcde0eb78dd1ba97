//! StrideArena Server - Real-Time Fitness Competition Leaderboards
//!
//! Tracks competition scores and pushes ranking changes to connected
//! viewers over WebSocket.
//!
//! # Quick Start
//!
//! ```bash
//! # Start the server
//! cargo run -p stridearena-server
//!
//! # Start with demo mode (simulated participants)
//! cargo run -p stridearena-server -- --demo
//!
//! # Watch a leaderboard
//! websocat ws://localhost:8090/ws/demo
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ws::{Message, WebSocket},
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{header, Method},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stridearena_engine::{LeaderboardEngine, ScoreSubmission};
use stridearena_types::{
    ActivitySource, CompetitionId, FitnessSync, LeaderboardView, ParticipantId,
};

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser)]
#[command(name = "stridearena")]
#[command(about = "StrideArena - Real-time fitness competition leaderboards")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8090")]
    port: u16,

    /// Enable demo mode with simulated participants
    #[arg(long)]
    demo: bool,

    /// Number of demo participants
    #[arg(long, default_value = "8")]
    demo_participants: usize,
}

// ============================================================================
// Application State
// ============================================================================

struct AppState {
    /// The leaderboard engine
    engine: LeaderboardEngine,
}

/// Entries pushed to a viewer right after connecting
const INITIAL_SNAPSHOT_LIMIT: usize = 100;

// ============================================================================
// WebSocket Messages
// ============================================================================

/// Messages the server sends besides raw score events
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    /// Initial snapshot sent on connect
    Leaderboard {
        data: LeaderboardView,
        timestamp: DateTime<Utc>,
    },
    /// Subscription acknowledged
    Subscribed { competition: String },
    /// Pong response
    Pong { id: Option<u64> },
}

/// Messages a viewer may send
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping { id: Option<u64> },
    Subscribe,
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    fn ok<T: Serialize>(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
        })
    }

    fn err(msg: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SubmitScoreRequest {
    participant_id: String,
    display_name: Option<String>,
    steps: u64,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    calories: f64,
}

#[derive(Debug, Deserialize)]
struct SyncRequest {
    participant_id: String,
    steps: u64,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    calories: f64,
    #[serde(default)]
    active_minutes: u32,
    #[serde(default)]
    source: ActivitySource,
    /// Day the activity occurred on; defaults to today
    recorded_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CalculatePrizesRequest {
    prize_pool: String,
}

// ============================================================================
// Routes
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "stridearena",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn submit_score(
    State(state): State<Arc<AppState>>,
    Path(competition): Path<String>,
    Json(req): Json<SubmitScoreRequest>,
) -> impl IntoResponse {
    let submission = ScoreSubmission {
        competition: CompetitionId::new(&competition),
        participant: ParticipantId::new(&req.participant_id),
        display_name: req.display_name,
        steps: req.steps,
        distance: req.distance,
        calories: req.calories,
    };

    match state.engine.submit_score(submission).await {
        Ok(outcome) => {
            if let Some(error) = &outcome.detail_error {
                warn!(%competition, %error, "score recorded without detail");
            }
            ApiResponse::ok(serde_json::json!({
                "participant_id": outcome.score.entry.participant.0,
                "score": outcome.score.entry.score,
                "previous_score": outcome.score.previous,
                "detail_recorded": outcome.fully_recorded(),
            }))
        }
        Err(e) => ApiResponse::err(format!("{e}")),
    }
}

async fn ingest_sync(
    State(state): State<Arc<AppState>>,
    Path(competition): Path<String>,
    Json(req): Json<SyncRequest>,
) -> impl IntoResponse {
    let sync = FitnessSync {
        competition: CompetitionId::new(&competition),
        participant: ParticipantId::new(&req.participant_id),
        steps: req.steps,
        distance: req.distance,
        calories: req.calories,
        active_minutes: req.active_minutes,
        source: req.source,
        recorded_on: req.recorded_on.unwrap_or_else(|| Utc::now().date_naive()),
    };

    match state.engine.ingest_sync(sync).await {
        Ok(totals) => ApiResponse::ok(totals),
        Err(e) => ApiResponse::err(format!("{e}")),
    }
}

async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(competition): Path<String>,
    Query(params): Query<LeaderboardQuery>,
) -> impl IntoResponse {
    let competition = CompetitionId::new(&competition);
    let limit = params.limit.unwrap_or(INITIAL_SNAPSHOT_LIMIT);

    match state.engine.get_leaderboard(&competition, limit).await {
        Ok(view) => ApiResponse::ok(view),
        Err(e) => ApiResponse::err(format!("{e}")),
    }
}

async fn get_rank(
    State(state): State<Arc<AppState>>,
    Path((competition, participant)): Path<(String, String)>,
) -> impl IntoResponse {
    let competition = CompetitionId::new(&competition);
    let participant = ParticipantId::new(&participant);

    match state.engine.participant_rank(&competition, &participant).await {
        Ok(Some(rank)) => ApiResponse::ok(serde_json::json!({
            "participant_id": participant.0,
            "rank": rank,
        })),
        Ok(None) => ApiResponse::err("Participant has no score"),
        Err(e) => ApiResponse::err(format!("{e}")),
    }
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path((competition, participant)): Path<(String, String)>,
) -> impl IntoResponse {
    let competition = CompetitionId::new(&competition);
    let participant = ParticipantId::new(&participant);

    match state.engine.participant_stats(&competition, &participant).await {
        Ok(totals) => ApiResponse::ok(totals),
        Err(e) => ApiResponse::err(format!("{e}")),
    }
}

async fn get_daily_stats(
    State(state): State<Arc<AppState>>,
    Path((competition, participant, date)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let competition = CompetitionId::new(&competition);
    let participant = ParticipantId::new(&participant);
    let day: NaiveDate = match date.parse() {
        Ok(day) => day,
        Err(_) => return ApiResponse::err("Invalid date, expected YYYY-MM-DD"),
    };

    match state.engine.daily_stats(&competition, &participant, day).await {
        Ok(Some(daily)) => ApiResponse::ok(daily),
        Ok(None) => ApiResponse::err("No activity recorded for that day"),
        Err(e) => ApiResponse::err(format!("{e}")),
    }
}

async fn calculate_prizes(
    State(state): State<Arc<AppState>>,
    Path(competition): Path<String>,
    Json(req): Json<CalculatePrizesRequest>,
) -> impl IntoResponse {
    let competition = CompetitionId::new(&competition);
    let prize_pool: Decimal = match req.prize_pool.parse() {
        Ok(pool) if pool > Decimal::ZERO => pool,
        _ => return ApiResponse::err("Invalid prize pool"),
    };

    match state.engine.calculate_prizes(&competition, prize_pool).await {
        Ok(prizes) => ApiResponse::ok(prizes),
        Err(e) => ApiResponse::err(format!("{e}")),
    }
}

async fn get_prizes(
    State(state): State<Arc<AppState>>,
    Path(competition): Path<String>,
) -> impl IntoResponse {
    let competition = CompetitionId::new(&competition);

    match state.engine.get_prizes(&competition).await {
        Ok(prizes) => ApiResponse::ok(prizes),
        Err(e) => ApiResponse::err(format!("{e}")),
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(competition): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let competition = CompetitionId::new(&competition);
    ws.on_upgrade(move |socket| handle_socket(socket, state, competition))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, competition: CompetitionId) {
    let (mut sender, mut receiver) = socket.split();
    let subscription = state.engine.subscribe(&competition);

    // Push the current standings so the viewer starts from a full picture
    if let Ok(view) = state
        .engine
        .get_leaderboard(&competition, INITIAL_SNAPSHOT_LIMIT)
        .await
    {
        let snapshot = ServerMessage::Leaderboard {
            data: view,
            timestamp: Utc::now(),
        };
        if let Ok(json) = serde_json::to_string(&snapshot) {
            if sender.send(Message::Text(json)).await.is_err() {
                state
                    .engine
                    .notifier()
                    .unsubscribe(&competition, subscription.id);
                return;
            }
        }
    }

    info!(%competition, "viewer connected");

    loop {
        tokio::select! {
            event = subscription.events.recv_async() => {
                let Ok(event) = event else { break };
                let Ok(json) = serde_json::to_string(&event) else { continue };
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Ping { id }) => Some(ServerMessage::Pong { id }),
                            Ok(ClientMessage::Subscribe) => Some(ServerMessage::Subscribed {
                                competition: competition.0.clone(),
                            }),
                            // Unknown messages are ignored
                            Err(_) => None,
                        };
                        if let Some(reply) = reply {
                            if let Ok(json) = serde_json::to_string(&reply) {
                                if sender.send(Message::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    // Departing viewers must not linger in the channel registry
    state
        .engine
        .notifier()
        .unsubscribe(&competition, subscription.id);
    info!(%competition, "viewer disconnected");
}

// ============================================================================
// Demo Mode
// ============================================================================

async fn run_demo_traffic(state: Arc<AppState>, num_participants: usize) {
    info!("Starting demo traffic with {} participants", num_participants);

    let competition = CompetitionId::new("demo");
    let participants: Vec<ParticipantId> = (0..num_participants)
        .map(|i| ParticipantId::new(format!("demo-runner-{i}")))
        .collect();
    let mut step_totals = vec![0u64; num_participants];

    let mut interval = tokio::time::interval(Duration::from_secs(2));

    loop {
        interval.tick().await;

        let idx = rand::random::<usize>() % participants.len();
        let burst = 200 + rand::random::<u64>() % 2_500;
        step_totals[idx] += burst;

        let sync = FitnessSync {
            competition: competition.clone(),
            participant: participants[idx].clone(),
            steps: burst,
            distance: burst as f64 * 0.78,
            calories: burst as f64 / 22.0,
            active_minutes: (burst / 120) as u32,
            source: ActivitySource::GoogleFit,
            recorded_on: Utc::now().date_naive(),
        };
        if let Err(e) = state.engine.ingest_sync(sync).await {
            warn!("demo sync failed: {e}");
        }

        let submission = ScoreSubmission {
            competition: competition.clone(),
            participant: participants[idx].clone(),
            display_name: Some(format!("Demo Runner {idx}")),
            steps: step_totals[idx],
            distance: step_totals[idx] as f64 * 0.78,
            calories: step_totals[idx] as f64 / 22.0,
        };
        if let Err(e) = state.engine.submit_score(submission).await {
            warn!("demo submission failed: {e}");
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting StrideArena Server");
    info!("  Port: {}", cli.port);
    info!("  Demo Mode: {}", cli.demo);

    let state = Arc::new(AppState {
        engine: LeaderboardEngine::in_memory(),
    });

    if cli.demo {
        let demo_state = state.clone();
        let participants = cli.demo_participants;
        tokio::spawn(async move {
            run_demo_traffic(demo_state, participants).await;
        });
    }

    let app = Router::new()
        // Health
        .route("/health", get(health))
        // REST API
        .route(
            "/api/v1/competitions/:competition/scores",
            post(submit_score),
        )
        .route("/api/v1/competitions/:competition/syncs", post(ingest_sync))
        .route(
            "/api/v1/competitions/:competition/leaderboard",
            get(get_leaderboard),
        )
        .route(
            "/api/v1/competitions/:competition/rank/:participant",
            get(get_rank),
        )
        .route(
            "/api/v1/competitions/:competition/participants/:participant/stats",
            get(get_stats),
        )
        .route(
            "/api/v1/competitions/:competition/participants/:participant/daily/:date",
            get(get_daily_stats),
        )
        .route(
            "/api/v1/competitions/:competition/prizes",
            post(calculate_prizes).get(get_prizes),
        )
        // WebSocket
        .route("/ws/:competition", get(ws_handler))
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!("Listening on http://{}", addr);
    info!("WebSocket: ws://localhost:{}/ws/:competition", cli.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
