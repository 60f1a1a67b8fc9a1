//! HTTP handlers for the notification inbox and admin announcements.

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::handlers::{
    ListNotificationsQuery, MarkNotificationReadCommand, PublishNotificationCommand,
};
use crate::domain::foundation::NotificationId;

use super::super::error::ApiError;
use super::super::middleware::RequireAuth;
use super::super::state::AppState;
use super::dto::{ListNotificationsParams, PublishNotificationRequest, PublishNotificationResponse};

/// GET /api/notifications?limit&offset - Caller's inbox with unread count
pub async fn list_notifications(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(params): Query<ListNotificationsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let inbox = state
        .list_notifications_handler()
        .handle(ListNotificationsQuery {
            actor: user,
            limit: params.limit,
            offset: params.offset,
        })
        .await?;

    Ok(Json(inbox))
}

/// PUT /api/notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .mark_notification_read_handler()
        .handle(MarkNotificationReadCommand {
            actor: user,
            notification_id: NotificationId::from_uuid(id),
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/notifications - Publish to users or broadcast
pub async fn publish_notification(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<PublishNotificationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let audience = request.audience()?;
    let result = state
        .publish_notification_handler()
        .handle(PublishNotificationCommand {
            actor: user,
            label: request.label,
            kind: request.kind,
            description: request.description,
            audience,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PublishNotificationResponse {
            id: result.notification_id,
        }),
    ))
}
