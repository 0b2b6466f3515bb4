use crate::error::EngineError;
use crate::models::{Book, Recommendation, Student};
use crate::services::analytics::AnalyticsSnapshot;
use crate::services::engine::explain;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const DEFAULT_BOOK_LIMIT: usize = 50;
const DEFAULT_SIMILAR_COUNT: usize = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message,
        }
    }
}

type ApiError = (StatusCode, Json<ApiResponse<()>>);
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn failure(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::error(message.into())))
}

impl From<EngineError> for (StatusCode, Json<ApiResponse<()>>) {
    fn from(e: EngineError) -> Self {
        let status = match &e {
            EngineError::NotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        failure(status, e.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    pub n: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudentSummary {
    #[serde(flatten)]
    pub student: Student,
    pub books_read_count: usize,
}

impl From<&Student> for StudentSummary {
    fn from(student: &Student) -> Self {
        Self {
            books_read_count: student.reading_history.len(),
            student: student.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExplainedRecommendation {
    #[serde(flatten)]
    pub recommendation: Recommendation,
    pub explanation: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarBook {
    pub book: Book,
    pub similarity: f32,
}

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HashMap<String, String>>> {
    let snapshot = state.engine.current();
    let mut status = HashMap::new();
    status.insert("status".to_string(), "healthy".to_string());
    status.insert("service".to_string(), "smartreads-recommendation".to_string());
    status.insert("version".to_string(), env!("CARGO_PKG_VERSION").to_string());
    status.insert("ready".to_string(), snapshot.load_state().is_ready().to_string());
    status.insert("snapshot".to_string(), snapshot.version().to_string());

    Json(ApiResponse::success(status))
}

async fn list_students(State(state): State<AppState>) -> ApiResult<Vec<StudentSummary>> {
    let snapshot = state.engine.ready()?;
    let students = snapshot.students().map(StudentSummary::from).collect();
    Ok(Json(ApiResponse::success(students)))
}

async fn get_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<StudentSummary> {
    let snapshot = state.engine.ready()?;
    match snapshot.student(&student_id) {
        Some(student) => Ok(Json(ApiResponse::success(StudentSummary::from(student)))),
        None => Err(failure(StatusCode::NOT_FOUND, "Student not found")),
    }
}

async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<LimitQuery>,
) -> ApiResult<Vec<Book>> {
    let snapshot = state.engine.ready()?;
    let books = snapshot.books(params.limit.unwrap_or(DEFAULT_BOOK_LIMIT)).to_vec();
    Ok(Json(ApiResponse::success(books)))
}

async fn similar_books(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
    Query(params): Query<CountQuery>,
) -> ApiResult<Vec<SimilarBook>> {
    let snapshot = state.engine.ready()?;
    if snapshot.book(&book_id).is_none() {
        return Err(failure(StatusCode::NOT_FOUND, "Book not found"));
    }
    let n = clamp_count(&state, params.n.unwrap_or(DEFAULT_SIMILAR_COUNT));
    let similar = snapshot
        .similar_books(&book_id, n)
        .into_iter()
        .map(|(book, similarity)| SimilarBook { book, similarity })
        .collect();
    Ok(Json(ApiResponse::success(similar)))
}

async fn get_recommendations(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Query(params): Query<CountQuery>,
) -> ApiResult<Vec<Recommendation>> {
    let n = requested_count(&state, params.n);
    let recommendations = state.engine.recommend(&student_id, n)?;
    info!("Served {} recommendations for student {}", recommendations.len(), student_id);
    Ok(Json(ApiResponse::success(recommendations)))
}

async fn explain_recommendations(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Query(params): Query<CountQuery>,
) -> ApiResult<Vec<ExplainedRecommendation>> {
    let n = requested_count(&state, params.n);
    let explained = state
        .engine
        .recommend(&student_id, n)?
        .into_iter()
        .map(|recommendation| ExplainedRecommendation {
            explanation: explain(&recommendation),
            recommendation,
        })
        .collect();
    Ok(Json(ApiResponse::success(explained)))
}

async fn get_analytics(State(state): State<AppState>) -> ApiResult<AnalyticsSnapshot> {
    Ok(Json(ApiResponse::success(state.engine.analytics()?)))
}

async fn regenerate_data(State(state): State<AppState>) -> ApiResult<u64> {
    let version = tokio::task::spawn_blocking(move || state.regenerate())
        .await
        .map_err(|e| {
            error!("Data regeneration task failed: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Data regeneration failed")
        })??;

    let mut response = ApiResponse::success(version);
    response.message = "Data regenerated successfully".to_string();
    Ok(Json(response))
}

fn requested_count(state: &AppState, n: Option<usize>) -> usize {
    clamp_count(state, n.unwrap_or(state.config.recommendation.default_count))
}

fn clamp_count(state: &AppState, n: usize) -> usize {
    n.min(state.config.recommendation.max_request_count)
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/students", get(list_students))
        .route("/api/students/:student_id", get(get_student))
        .route("/api/books", get(list_books))
        .route("/api/books/:book_id/similar", get(similar_books))
        .route("/api/recommendations/:student_id", get(get_recommendations))
        .route("/api/recommendations/:student_id/explain", get(explain_recommendations))
        .route("/api/analytics", get(get_analytics))
        .route("/api/regenerate-data", post(regenerate_data))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
