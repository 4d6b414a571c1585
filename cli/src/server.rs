use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State, rejection::JsonRejection},
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::gateway::GatewayClient;
use fittrack_core::analytics;
use fittrack_core::db::Database;
use fittrack_core::generation::{GenerationError, PlanKind};
use fittrack_core::models::{
    BackfillError, Badge, GeneratedMeal, GenerationProfile, Habit, HabitAnalytics, HabitLog, HabitLogOutcome,
    HabitType, NewHabit, Profile, SavedMeal, SavedWorkout, UpdateProfile, WeightEntry, WorkoutPlan,
    days_before, parse_date, validate_habit_value, validate_new_habit, validate_profile_update,
    validate_user_id, validate_weight,
};
use fittrack_core::service::FitTrackService;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB
const DEFAULT_HISTORY_LIMIT: i64 = 20;

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
    gateway: Arc<GatewayClient>,
    api_key: Option<String>,
}

impl AppState {
    fn db(&self) -> MutexGuard<'_, Database> {
        self.db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct CreateHabitRequest {
    #[serde(rename = "type")]
    habit_type: String,
    target_value: f64,
    unit: String,
}

#[derive(Deserialize)]
struct LogHabitRequest {
    value: f64,
    date: Option<String>,
}

#[derive(Deserialize)]
struct CreateWeightRequest {
    date: Option<String>,
    weight_kg: f64,
}

#[derive(Deserialize)]
struct WeightHistoryQuery {
    days: Option<i64>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Generation(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Generation(msg) => {
                tracing::error!(error = %msg, "plan generation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        Self::Generation(err.to_string())
    }
}

fn bad_request(err: &anyhow::Error) -> ApiError {
    ApiError::BadRequest(format!("{err}"))
}

fn check_user(user_id: &str) -> Result<(), ApiError> {
    validate_user_id(user_id).map_err(|e| bad_request(&e))
}

fn parse_optional_date(date: Option<&str>) -> Result<NaiveDate, ApiError> {
    date.map_or_else(
        || Ok(FitTrackService::today()),
        |d| parse_date(d).map_err(|e| bad_request(&e)),
    )
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
}

// --- Profile handlers ---

async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    check_user(&user_id)?;
    let profile = state
        .db()
        .get_profile(&user_id)
        .context("database error")?
        .ok_or_else(|| ApiError::NotFound(format!("No profile for user '{user_id}'")))?;
    Ok(Json(profile))
}

async fn put_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(update): Json<UpdateProfile>,
) -> Result<Json<Profile>, ApiError> {
    check_user(&user_id)?;
    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one field must be provided".to_string(),
        ));
    }
    validate_profile_update(&update).map_err(|e| bad_request(&e))?;

    let profile = state
        .db()
        .upsert_profile(&user_id, &update)
        .context("failed to save profile")?;
    Ok(Json(profile))
}

// --- Habit handlers ---

async fn list_habits(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Habit>>, ApiError> {
    check_user(&user_id)?;
    let habits = state
        .db()
        .ensure_default_habits(&user_id)
        .context("failed to load habits")?;
    Ok(Json(habits))
}

async fn create_habit(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<CreateHabitRequest>,
) -> Result<(StatusCode, Json<Habit>), ApiError> {
    check_user(&user_id)?;
    let habit_type: HabitType = req.habit_type.parse().map_err(|e| bad_request(&e))?;
    let new_habit = NewHabit {
        habit_type,
        target_value: req.target_value,
        unit: req.unit,
    };
    validate_new_habit(&new_habit).map_err(|e| bad_request(&e))?;

    let habit = state
        .db()
        .insert_habit(&user_id, &new_habit)
        .context("failed to create habit")?;
    Ok((StatusCode::CREATED, Json(habit)))
}

async fn log_habit(
    State(state): State<AppState>,
    Path((user_id, habit_id)): Path<(String, i64)>,
    Json(req): Json<LogHabitRequest>,
) -> Result<(StatusCode, Json<HabitLogOutcome>), ApiError> {
    check_user(&user_id)?;
    validate_habit_value(req.value).map_err(|e| bad_request(&e))?;
    let date = parse_optional_date(req.date.as_deref())?;

    let db = state.db();
    if db.find_habit(&user_id, habit_id)?.is_none() {
        return Err(ApiError::NotFound(format!("Habit {habit_id} not found")));
    }

    let outcome = db
        .log_habit(&user_id, habit_id, date, req.value)
        .map_err(|e| {
            if e.is::<BackfillError>() {
                bad_request(&e)
            } else {
                ApiError::Internal(e.context("failed to log habit"))
            }
        })?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn get_habit_logs(
    State(state): State<AppState>,
    Path((user_id, date_str)): Path<(String, String)>,
) -> Result<Json<Vec<HabitLog>>, ApiError> {
    check_user(&user_id)?;
    let date = parse_date(&date_str).map_err(|e| bad_request(&e))?;
    let logs = state
        .db()
        .get_habit_logs_for_date(&user_id, date)
        .context("database error")?;
    Ok(Json(logs))
}

async fn list_badges(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Badge>>, ApiError> {
    check_user(&user_id)?;
    let badges = state
        .db()
        .list_badges(&user_id)
        .context("database error")?;
    Ok(Json(badges))
}

async fn get_analytics(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<HabitAnalytics>, ApiError> {
    check_user(&user_id)?;
    let today = FitTrackService::today();
    let records = state
        .db()
        .get_habit_log_records_since(&user_id, analytics::window_start(today))
        .context("database error")?;
    Ok(Json(analytics::summarize(&records, today)))
}

// --- Weight handlers ---

async fn create_weight(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<CreateWeightRequest>,
) -> Result<(StatusCode, Json<WeightEntry>), ApiError> {
    check_user(&user_id)?;
    let date = parse_optional_date(req.date.as_deref())?;
    validate_weight(req.weight_kg).map_err(|e| bad_request(&e))?;

    let entry = state
        .db()
        .upsert_weight(&user_id, date, req.weight_kg)
        .context("failed to upsert weight")?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_weight(
    State(state): State<AppState>,
    Path((user_id, date_str)): Path<(String, String)>,
) -> Result<Json<WeightEntry>, ApiError> {
    check_user(&user_id)?;
    let date = parse_date(&date_str).map_err(|e| bad_request(&e))?;
    let entry = state
        .db()
        .get_weight(&user_id, date)
        .context("database error")?
        .ok_or_else(|| ApiError::NotFound(format!("No weight entry for {date_str}")))?;
    Ok(Json(entry))
}

async fn get_weight_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<WeightHistoryQuery>,
) -> Result<Json<Vec<WeightEntry>>, ApiError> {
    check_user(&user_id)?;
    if params.days.is_some_and(|d| d < 0) {
        return Err(ApiError::BadRequest("days must not be negative".to_string()));
    }
    // A window reaching past the calendar range means all history
    let since = params
        .days
        .and_then(|n| days_before(FitTrackService::today(), n));
    let entries = state
        .db()
        .get_weight_history(&user_id, since)
        .context("database error")?;
    Ok(Json(entries))
}

async fn delete_weight(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    check_user(&user_id)?;
    state
        .db()
        .delete_weight(&user_id, id)
        .map_err(|_| ApiError::NotFound(format!("Weight entry {id} not found")))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Plan history handlers ---

fn history_limit(params: &HistoryQuery) -> Result<i64, ApiError> {
    match params.limit {
        Some(n) if n <= 0 => Err(ApiError::BadRequest(
            "limit must be greater than 0".to_string(),
        )),
        Some(n) => Ok(n),
        None => Ok(DEFAULT_HISTORY_LIMIT),
    }
}

async fn list_workouts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<SavedWorkout>>, ApiError> {
    check_user(&user_id)?;
    let limit = history_limit(&params)?;
    let workouts = state
        .db()
        .list_workouts(&user_id, limit)
        .context("database error")?;
    Ok(Json(workouts))
}

async fn create_workout(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(plan): Json<WorkoutPlan>,
) -> Result<(StatusCode, Json<SavedWorkout>), ApiError> {
    check_user(&user_id)?;
    let saved = state
        .db()
        .insert_workout(&user_id, &plan)
        .context("failed to save workout")?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn list_meals(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<SavedMeal>>, ApiError> {
    check_user(&user_id)?;
    let limit = history_limit(&params)?;
    let meals = state
        .db()
        .list_meals(&user_id, limit)
        .context("database error")?;
    Ok(Json(meals))
}

async fn create_meal(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(meal): Json<GeneratedMeal>,
) -> Result<(StatusCode, Json<SavedMeal>), ApiError> {
    check_user(&user_id)?;
    let saved = state
        .db()
        .insert_meal(&user_id, &meal)
        .context("failed to save meal")?;
    Ok((StatusCode::CREATED, Json(saved)))
}

// --- Generation handlers ---

async fn generate(
    state: &AppState,
    kind: PlanKind,
    payload: Result<Json<GenerationProfile>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(profile) = payload.map_err(|e| ApiError::Generation(e.body_text()))?;
    let plan = state.gateway.generate_async(kind, &profile).await?;
    Ok(Json(plan))
}

async fn generate_workout(
    State(state): State<AppState>,
    payload: Result<Json<GenerationProfile>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    generate(&state, PlanKind::Workout, payload).await
}

async fn generate_meal_plan(
    State(state): State<AppState>,
    payload: Result<Json<GenerationProfile>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    generate(&state, PlanKind::MealPlan, payload).await
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/users/{user_id}/profile",
            get(get_profile).put(put_profile),
        )
        .route(
            "/api/users/{user_id}/habits",
            get(list_habits).post(create_habit),
        )
        .route(
            "/api/users/{user_id}/habits/{habit_id}/logs",
            post(log_habit),
        )
        .route("/api/users/{user_id}/habit-logs/{date}", get(get_habit_logs))
        .route("/api/users/{user_id}/badges", get(list_badges))
        .route("/api/users/{user_id}/analytics", get(get_analytics))
        .route(
            "/api/users/{user_id}/weight",
            post(create_weight).get(get_weight_history),
        )
        .route("/api/users/{user_id}/weight/{date}", get(get_weight))
        .route("/api/users/{user_id}/weight/entry/{id}", delete(delete_weight))
        .route(
            "/api/users/{user_id}/workouts",
            get(list_workouts).post(create_workout),
        )
        .route(
            "/api/users/{user_id}/meals",
            get(list_meals).post(create_meal),
        )
        .route("/api/generate/workout", post(generate_workout))
        .route("/api/generate/meal-plan", post(generate_meal_plan))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    db: Database,
    gateway: GatewayClient,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        gateway: Arc::new(gateway),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        let head = key.get(..4).unwrap_or(key);
        let tail = key.get(key.len().saturating_sub(4)..).unwrap_or("");
        eprintln!("API key: {head}...{tail} (see api_key file in data directory)");
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("Failed to bind {bind}:{port}"))?;
    tracing::info!(%bind, port, "listening");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
