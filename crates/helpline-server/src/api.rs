//! HTTP API.
//!
//! JSON over HTTP. Student routes are open or gated by the network access
//! filter; staff routes under `/staff` sit behind an HTTP basic auth layer
//! that runs before any request body is read.
//!
//! Policy rejections of a join (closed, capped, already queued) are ordinary
//! `200 OK` responses distinguished by the `outcome` tag. Errors map as:
//!
//! - Validation: 422 Unprocessable Entity
//! - Bad credentials or secret: 401 Unauthorized with `WWW-Authenticate`
//! - Access filter: 403 Forbidden
//! - Encoding failure: 500 Internal Server Error

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Extension, Json, Router,
    extract::{ConnectInfo, Path, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose};
use chrono::{DateTime, Utc};
use helpline_core::{Environment, JoinOutcome, Storage, Ticket};
use serde::{Deserialize, Serialize};

use crate::service::{HelpDesk, JoinRequest, ServiceError};

/// Build the router for `desk`.
pub fn router<E, S>(desk: Arc<HelpDesk<E, S>>) -> Router
where
    E: Environment,
    S: Storage,
{
    let staff: Router<Arc<HelpDesk<E, S>>> = Router::new()
        .route("/staff/serve", post(staff_serve::<E, S>))
        .route("/staff/open", post(staff_open::<E, S>))
        .route("/staff/close", post(staff_close::<E, S>))
        .route("/staff/reset", post(staff_reset::<E, S>))
        .route("/staff/dump", get(staff_dump::<E, S>))
        .route("/staff/queue", get(staff_queue::<E, S>))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&desk), require_staff::<E, S>));

    Router::new()
        .route("/status", get(status::<E, S>))
        .route("/join", post(join::<E, S>))
        .route("/position/:student_id", get(position::<E, S>))
        .route("/leave", post(leave::<E, S>))
        .merge(staff)
        .with_state(desk)
}

impl ServiceError {
    /// HTTP status for this error.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Storage(e) => {
                tracing::error!("Request failed: {}", e);
                "internal error".to_string()
            },
            other => other.to_string(),
        };

        let mut response = (status, Json(ErrorBody { error: message })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"helpline\""));
        }
        response
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// A waiting ticket as shown to clients.
#[derive(Debug, Serialize)]
struct TicketView {
    student_id: String,
    name: String,
    task_info: String,
    joined_at: DateTime<Utc>,
}

impl From<Ticket> for TicketView {
    fn from(ticket: Ticket) -> Self {
        Self {
            student_id: ticket.student_id,
            name: ticket.name,
            task_info: ticket.task_info,
            joined_at: ticket.joined_at,
        }
    }
}

fn secs(wait: Option<std::time::Duration>) -> Option<f64> {
    wait.map(|w| w.as_secs_f64())
}

#[derive(Debug, Serialize)]
struct StatusBody {
    is_open: bool,
    total_served: usize,
    estimated_wait_secs: Option<f64>,
    waiting: Vec<TicketView>,
}

async fn status<E: Environment, S: Storage>(
    State(desk): State<Arc<HelpDesk<E, S>>>,
) -> Json<StatusBody> {
    let status = desk.status();
    Json(StatusBody {
        is_open: status.is_open,
        total_served: status.total_served,
        estimated_wait_secs: secs(status.estimated_wait),
        waiting: status.waiting.into_iter().map(TicketView::from).collect(),
    })
}

#[derive(Debug, Deserialize)]
struct JoinBody {
    student_id: String,
    name: String,
    #[serde(default)]
    task_info: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum JoinBodyResponse {
    Joined { ahead_of_me: usize, estimated_wait_secs: Option<f64>, secret: String },
    AlreadyQueued { position: usize },
    RateLimited { times_helped: usize },
    Closed,
}

async fn join<E: Environment, S: Storage>(
    State(desk): State<Arc<HelpDesk<E, S>>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(body): Json<JoinBody>,
) -> Result<Json<JoinBodyResponse>, ServiceError> {
    desk.check_network(peer.ip()).await?;

    let receipt = desk.join(&JoinRequest {
        student_id: body.student_id,
        name: body.name,
        task_info: body.task_info,
    })?;

    let response = match receipt.outcome {
        JoinOutcome::Joined { ahead_of_me, estimated_wait } => JoinBodyResponse::Joined {
            ahead_of_me,
            estimated_wait_secs: secs(estimated_wait),
            secret: receipt.secret.unwrap_or_default(),
        },
        JoinOutcome::AlreadyQueued { position } => JoinBodyResponse::AlreadyQueued { position },
        JoinOutcome::RateLimited { times_helped } => JoinBodyResponse::RateLimited { times_helped },
        JoinOutcome::Closed => JoinBodyResponse::Closed,
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct PositionBody {
    position: Option<usize>,
    estimated_wait_secs: Option<f64>,
}

async fn position<E: Environment, S: Storage>(
    State(desk): State<Arc<HelpDesk<E, S>>>,
    Path(student_id): Path<String>,
) -> Result<Json<PositionBody>, ServiceError> {
    let report = desk.position(&student_id)?;
    Ok(Json(PositionBody {
        position: report.position,
        estimated_wait_secs: secs(report.estimated_wait),
    }))
}

#[derive(Debug, Deserialize)]
struct LeaveBody {
    student_id: String,
    secret: String,
}

#[derive(Debug, Serialize)]
struct LeaveResponse {
    left: usize,
}

async fn leave<E: Environment, S: Storage>(
    State(desk): State<Arc<HelpDesk<E, S>>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(body): Json<LeaveBody>,
) -> Result<Json<LeaveResponse>, ServiceError> {
    desk.check_network(peer.ip()).await?;
    let left = desk.leave(&body.student_id, &body.secret)?;
    Ok(Json(LeaveResponse { left }))
}

/// Authenticated staff username, set by [`require_staff`].
#[derive(Debug, Clone)]
struct StaffUser(String);

/// Reject requests without valid staff basic auth.
async fn require_staff<E: Environment, S: Storage>(
    State(desk): State<Arc<HelpDesk<E, S>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let (username, password) =
        basic_credentials(request.headers()).ok_or(ServiceError::Unauthorized)?;
    desk.check_staff(&username, &password)?;

    request.extensions_mut().insert(StaffUser(username));
    Ok(next.run(request).await)
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[derive(Debug, Deserialize)]
struct ServeBody {
    student_id: String,
}

#[derive(Debug, Serialize)]
struct ServeResponse {
    served: usize,
}

async fn staff_serve<E: Environment, S: Storage>(
    State(desk): State<Arc<HelpDesk<E, S>>>,
    Extension(StaffUser(staff)): Extension<StaffUser>,
    Json(body): Json<ServeBody>,
) -> Json<ServeResponse> {
    let served = desk.serve(&staff, &body.student_id);
    Json(ServeResponse { served })
}

#[derive(Debug, Serialize)]
struct GateResponse {
    is_open: bool,
}

async fn staff_open<E: Environment, S: Storage>(
    State(desk): State<Arc<HelpDesk<E, S>>>,
    Extension(StaffUser(staff)): Extension<StaffUser>,
) -> Json<GateResponse> {
    desk.set_open(&staff, true);
    Json(GateResponse { is_open: desk.store().is_open() })
}

async fn staff_close<E: Environment, S: Storage>(
    State(desk): State<Arc<HelpDesk<E, S>>>,
    Extension(StaffUser(staff)): Extension<StaffUser>,
) -> Json<GateResponse> {
    desk.set_open(&staff, false);
    Json(GateResponse { is_open: desk.store().is_open() })
}

#[derive(Debug, Deserialize)]
struct ResetBody {
    #[serde(default)]
    confirm: bool,
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    reset: bool,
}

async fn staff_reset<E: Environment, S: Storage>(
    State(desk): State<Arc<HelpDesk<E, S>>>,
    Extension(StaffUser(staff)): Extension<StaffUser>,
    Json(body): Json<ResetBody>,
) -> Json<ResetResponse> {
    if body.confirm {
        desk.reset(&staff);
    }
    Json(ResetResponse { reset: body.confirm })
}

async fn staff_dump<E: Environment, S: Storage>(
    State(desk): State<Arc<HelpDesk<E, S>>>,
) -> Result<Response, ServiceError> {
    let document = desk.dump()?;
    Ok(([(header::CONTENT_TYPE, "application/json")], document).into_response())
}

#[derive(Debug, Serialize)]
struct StaffEntryView {
    #[serde(flatten)]
    ticket: TicketView,
    times_helped: usize,
}

async fn staff_queue<E: Environment, S: Storage>(
    State(desk): State<Arc<HelpDesk<E, S>>>,
) -> Json<Vec<StaffEntryView>> {
    let entries = desk
        .staff_queue()
        .into_iter()
        .map(|entry| StaffEntryView { ticket: entry.ticket.into(), times_helped: entry.times_helped })
        .collect();
    Json(entries)
}
