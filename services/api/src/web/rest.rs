//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::engine_error_response;
use crate::web::middleware::Identity;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use doubt_forum_core::analytics::DEFAULT_INSIGHT_LIMIT;
use doubt_forum_core::{
    CourseAnalytics, Doubt, DoubtFilter, HistoryEntry, NewDoubt, ReplierRole, Reply,
    StudentAction, TopicInsight,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

const DEFAULT_COURSE: &str = "general";

type HandlerError = (StatusCode, String);

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        list_doubts_handler,
        create_doubt_handler,
        get_doubt_handler,
        doubt_action_handler,
        submit_reply_handler,
        professor_queue_handler,
        confusion_insights_handler,
        course_analytics_handler,
    ),
    components(
        schemas(
            DoubtView, ParticipantView, ReplyView, HistoryView, CourseAnalyticsView,
            StatusCountView, TopicInsightView, CreateDoubtRequest, DoubtActionRequest,
            ReplyRequest, HealthResponse
        )
    ),
    tags(
        (name = "Doubt Forum API", description = "Course doubts with automatic escalation from AI to peers to faculty.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
}

/// A doubt as returned by every endpoint that yields one.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DoubtView {
    id: Uuid,
    content: String,
    course_id: String,
    asked_by: ParticipantView,
    created_at: DateTime<Utc>,
    #[schema(example = "OPEN")]
    status: String,
    resolved: bool,
    last_escalated_at: Option<DateTime<Utc>>,
    ai_answer: String,
    replies: Vec<ReplyView>,
    history: Vec<HistoryView>,
    tags: Vec<String>,
    version: i64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    user_id: String,
    name: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplyView {
    id: Uuid,
    content: String,
    user_id: String,
    name: String,
    #[schema(example = "PROFESSOR")]
    role: String,
    created_at: DateTime<Utc>,
    is_ai: bool,
    is_accepted: bool,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryView {
    status: String,
    timestamp: DateTime<Utc>,
    note: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseAnalyticsView {
    course_id: String,
    total_doubts: usize,
    resolved_doubts: usize,
    resolution_rate: f64,
    by_status: Vec<StatusCountView>,
}

#[derive(Serialize, ToSchema)]
pub struct StatusCountView {
    status: String,
    count: usize,
}

#[derive(Serialize, ToSchema)]
pub struct TopicInsightView {
    topic: String,
    count: usize,
}

impl From<Doubt> for DoubtView {
    fn from(doubt: Doubt) -> Self {
        Self {
            id: doubt.id,
            content: doubt.content,
            course_id: doubt.course_id,
            asked_by: ParticipantView {
                user_id: doubt.asked_by.user_id,
                name: doubt.asked_by.name,
            },
            created_at: doubt.created_at,
            status: doubt.status.as_str().to_string(),
            resolved: doubt.resolved,
            last_escalated_at: doubt.last_escalated_at,
            ai_answer: doubt.ai_answer,
            replies: doubt.replies.into_iter().map(ReplyView::from).collect(),
            history: doubt.history.into_iter().map(HistoryView::from).collect(),
            tags: doubt.tags,
            version: doubt.version,
        }
    }
}

impl From<Reply> for ReplyView {
    fn from(reply: Reply) -> Self {
        let role = match reply.replied_by.role {
            ReplierRole::Student => "STUDENT",
            ReplierRole::Professor => "PROFESSOR",
            ReplierRole::Ai => "AI",
        };
        Self {
            id: reply.id,
            content: reply.content,
            user_id: reply.replied_by.user_id,
            name: reply.replied_by.name,
            role: role.to_string(),
            created_at: reply.created_at,
            is_ai: reply.is_ai,
            is_accepted: reply.is_accepted,
        }
    }
}

impl From<HistoryEntry> for HistoryView {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            status: entry.status.as_str().to_string(),
            timestamp: entry.timestamp,
            note: entry.note,
        }
    }
}

impl From<CourseAnalytics> for CourseAnalyticsView {
    fn from(report: CourseAnalytics) -> Self {
        Self {
            course_id: report.course_id,
            total_doubts: report.total_doubts,
            resolved_doubts: report.resolved_doubts,
            resolution_rate: report.resolution_rate,
            by_status: report
                .by_status
                .into_iter()
                .map(|c| StatusCountView {
                    status: c.status.as_str().to_string(),
                    count: c.count,
                })
                .collect(),
        }
    }
}

impl From<TopicInsight> for TopicInsightView {
    fn from(insight: TopicInsight) -> Self {
        Self {
            topic: insight.topic,
            count: insight.count,
        }
    }
}

/// The payload for asking a new doubt.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDoubtRequest {
    content: String,
    course_id: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// The asker's verdict on the AI answer: `SOLVED` or `CONFUSED`.
#[derive(Deserialize, ToSchema)]
pub struct DoubtActionRequest {
    #[schema(example = "CONFUSED")]
    action: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ReplyRequest {
    content: String,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListDoubtsParams {
    /// Restrict to one course.
    course_id: Option<String>,
    /// `all` lifts the role filter; professors only.
    scope: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CourseParams {
    course_id: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InsightParams {
    /// Number of topics to return. Defaults to 10.
    limit: Option<usize>,
}

fn forbidden(message: &str) -> HandlerError {
    (StatusCode::FORBIDDEN, message.to_string())
}

fn require_professor(identity: &Identity) -> Result<(), HandlerError> {
    if identity.is_professor() {
        Ok(())
    } else {
        Err(forbidden("Professor role required"))
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// List doubts the caller may see, newest first.
#[utoipa::path(
    get,
    path = "/doubts",
    params(
        ListDoubtsParams,
        ("x-user-id" = String, Header, description = "The caller's user id."),
        ("x-user-role" = Option<String>, Header, description = "student, senior or professor.")
    ),
    responses(
        (status = 200, description = "Visible doubts", body = [DoubtView]),
        (status = 400, description = "Unknown scope or role"),
        (status = 401, description = "Missing identity"),
        (status = 403, description = "scope=all requested by a non-professor")
    )
)]
pub async fn list_doubts_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<ListDoubtsParams>,
) -> Result<impl IntoResponse, HandlerError> {
    let viewer = match params.scope.as_deref() {
        None => Some(identity.viewer()),
        Some("all") => {
            require_professor(&identity)?;
            None
        }
        Some(other) => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unknown scope '{}'", other),
            ))
        }
    };
    let filter = DoubtFilter {
        course_id: params.course_id,
        viewer,
    };

    let doubts = app_state
        .engine
        .list_doubts(&filter)
        .await
        .map_err(engine_error_response)?;
    let views: Vec<DoubtView> = doubts.into_iter().map(DoubtView::from).collect();
    Ok(Json(views))
}

/// Ask a new doubt. The AI answer is attached before the response returns.
#[utoipa::path(
    post,
    path = "/doubts",
    request_body = CreateDoubtRequest,
    params(
        ("x-user-id" = String, Header, description = "The asker's user id."),
        ("x-user-name" = Option<String>, Header, description = "Display name, defaults to Student.")
    ),
    responses(
        (status = 201, description = "Doubt created in AI state", body = DoubtView),
        (status = 400, description = "Blank content"),
        (status = 401, description = "Missing identity"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_doubt_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateDoubtRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let course_id = payload
        .course_id
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_COURSE.to_string());

    let doubt = app_state
        .engine
        .create_doubt(NewDoubt {
            content: payload.content,
            course_id,
            asker: identity.participant(),
            tags: payload.tags,
        })
        .await
        .map_err(engine_error_response)?;
    Ok((StatusCode::CREATED, Json(DoubtView::from(doubt))))
}

/// Fetch one doubt with its replies and history.
///
/// The same visibility rule as the listing applies; professors may open any doubt,
/// as with `scope=all`.
#[utoipa::path(
    get,
    path = "/doubts/{id}",
    params(
        ("id" = Uuid, Path, description = "The doubt id."),
        ("x-user-id" = String, Header, description = "The caller's user id."),
        ("x-user-role" = Option<String>, Header, description = "student, senior or professor.")
    ),
    responses(
        (status = 200, description = "The doubt", body = DoubtView),
        (status = 403, description = "The doubt's tier is not visible to the caller"),
        (status = 404, description = "No such doubt")
    )
)]
pub async fn get_doubt_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(doubt_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let doubt = app_state
        .engine
        .get_doubt(doubt_id)
        .await
        .map_err(engine_error_response)?;
    if !identity.is_professor() && !doubt.is_visible_to(&identity.viewer()) {
        return Err(forbidden("This doubt is not visible to your role"));
    }
    Ok(Json(DoubtView::from(doubt)))
}

/// Confirm (`SOLVED`) or reject (`CONFUSED`) the AI answer. Only the asker may act.
#[utoipa::path(
    post,
    path = "/doubts/{id}/action",
    request_body = DoubtActionRequest,
    params(
        ("id" = Uuid, Path, description = "The doubt id."),
        ("x-user-id" = String, Header, description = "Must be the asker.")
    ),
    responses(
        (status = 200, description = "Updated doubt", body = DoubtView),
        (status = 400, description = "Unrecognized action"),
        (status = 403, description = "Caller is not the asker"),
        (status = 404, description = "No such doubt"),
        (status = 409, description = "The doubt is no longer in AI state")
    )
)]
pub async fn doubt_action_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(doubt_id): Path<Uuid>,
    Json(payload): Json<DoubtActionRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let action = payload
        .action
        .parse::<StudentAction>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let engine = &app_state.engine;
    let doubt = engine
        .get_doubt(doubt_id)
        .await
        .map_err(engine_error_response)?;
    if doubt.asked_by.user_id != identity.user_id {
        return Err(forbidden("Only the asker can act on the AI answer"));
    }

    let doubt = engine
        .apply_student_action(doubt_id, action)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(DoubtView::from(doubt)))
}

/// Reply to a doubt. A professor's reply resolves it.
#[utoipa::path(
    post,
    path = "/doubts/{id}/replies",
    request_body = ReplyRequest,
    params(
        ("id" = Uuid, Path, description = "The doubt id."),
        ("x-user-id" = String, Header, description = "The replier's user id."),
        ("x-user-role" = Option<String>, Header, description = "professor replies resolve the doubt.")
    ),
    responses(
        (status = 201, description = "Reply recorded", body = DoubtView),
        (status = 400, description = "Blank reply"),
        (status = 404, description = "No such doubt"),
        (status = 409, description = "The doubt is already resolved")
    )
)]
pub async fn submit_reply_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(doubt_id): Path<Uuid>,
    Json(payload): Json<ReplyRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let doubt = app_state
        .engine
        .submit_reply(
            doubt_id,
            &payload.content,
            identity.participant(),
            identity.is_professor(),
        )
        .await
        .map_err(engine_error_response)?;
    Ok((StatusCode::CREATED, Json(DoubtView::from(doubt))))
}

/// Doubts waiting for a professor, longest waiting first.
#[utoipa::path(
    get,
    path = "/professor/doubts",
    params(
        CourseParams,
        ("x-user-role" = String, Header, description = "Must be professor.")
    ),
    responses(
        (status = 200, description = "Professor queue", body = [DoubtView]),
        (status = 403, description = "Caller is not a professor")
    )
)]
pub async fn professor_queue_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<CourseParams>,
) -> Result<impl IntoResponse, HandlerError> {
    require_professor(&identity)?;
    let doubts = app_state
        .engine
        .professor_queue(params.course_id.as_deref())
        .await
        .map_err(engine_error_response)?;
    let views: Vec<DoubtView> = doubts.into_iter().map(DoubtView::from).collect();
    Ok(Json(views))
}

/// The topics students get stuck on most in a course.
#[utoipa::path(
    get,
    path = "/professor/insights/{course_id}",
    params(
        ("course_id" = String, Path, description = "The course."),
        InsightParams,
        ("x-user-role" = String, Header, description = "Must be professor.")
    ),
    responses(
        (status = 200, description = "Most frequent topics", body = [TopicInsightView]),
        (status = 400, description = "limit must be positive"),
        (status = 403, description = "Caller is not a professor")
    )
)]
pub async fn confusion_insights_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(course_id): Path<String>,
    Query(params): Query<InsightParams>,
) -> Result<impl IntoResponse, HandlerError> {
    require_professor(&identity)?;
    let limit = params.limit.unwrap_or(DEFAULT_INSIGHT_LIMIT);
    if limit == 0 {
        return Err((StatusCode::BAD_REQUEST, "limit must be positive".to_string()));
    }

    let insights = app_state
        .engine
        .confusion_insights(&course_id, limit)
        .await
        .map_err(engine_error_response)?;
    let views: Vec<TopicInsightView> = insights.into_iter().map(TopicInsightView::from).collect();
    Ok(Json(views))
}

/// Resolution counters for a course.
#[utoipa::path(
    get,
    path = "/analytics/{course_id}",
    params(("course_id" = String, Path, description = "The course.")),
    responses((status = 200, description = "Course analytics", body = CourseAnalyticsView))
)]
pub async fn course_analytics_handler(
    State(app_state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let report = app_state
        .engine
        .course_analytics(&course_id)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(CourseAnalyticsView::from(report)))
}
