// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::routes::{respond, ApiResult};
use crate::api::session::CurrentUser;
use crate::api::AppState;
use crate::error::ServiceError;
use crate::models::{AbuseReport, ReportId, ReportStatus, ReportUpdate, UserId};
use crate::services::abuse_workflow::{FileReport, ReportActionResponse, ReportFormContext};
use crate::services::Notice;

#[derive(Debug, Default, Deserialize)]
pub struct ReportListParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub note: String,
}

pub async fn get_report_form(
    Path(user_id): Path<UserId>,
    CurrentUser(actor): CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<ReportFormContext> {
    respond(state.services.workflow.report_form(actor, user_id).await)
}

pub async fn file_report(
    Path(user_id): Path<UserId>,
    CurrentUser(actor): CurrentUser,
    State(state): State<AppState>,
    Json(request): Json<FileReport>,
) -> ApiResult<ReportActionResponse> {
    respond(state.services.workflow.file_report(actor, user_id, request).await)
}

/// Reports visible to the current user, optionally filtered by status
pub async fn list_reports(
    Query(params): Query<ReportListParams>,
    CurrentUser(actor): CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<Vec<AbuseReport>> {
    let status = match params.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<ReportStatus>()
                .map_err(|e| ServiceError::validation(e.to_string()))?,
        ),
    };
    respond(state.services.workflow.list_reports(actor, status).await)
}

pub async fn get_report(
    Path(report_id): Path<ReportId>,
    CurrentUser(actor): CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<AbuseReport> {
    respond(state.services.workflow.view_report(actor, report_id).await)
}

pub async fn update_report(
    Path(report_id): Path<ReportId>,
    CurrentUser(actor): CurrentUser,
    State(state): State<AppState>,
    Json(update): Json<ReportUpdate>,
) -> ApiResult<ReportActionResponse> {
    respond(
        state
            .services
            .workflow
            .update_report(actor, report_id, update)
            .await,
    )
}

pub async fn delete_report(
    Path(report_id): Path<ReportId>,
    CurrentUser(actor): CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<Notice> {
    respond(state.services.workflow.delete_report(actor, report_id).await)
}

/// Reporter reply to a report waiting on them
pub async fn reply_to_report(
    Path(report_id): Path<ReportId>,
    CurrentUser(actor): CurrentUser,
    State(state): State<AppState>,
    Json(request): Json<ReplyRequest>,
) -> ApiResult<ReportActionResponse> {
    respond(
        state
            .services
            .workflow
            .reply(actor, report_id, request.note)
            .await,
    )
}
