// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::debug;

use crate::api::routes::{respond, ApiResult};
use crate::api::session::CurrentUser;
use crate::api::AppState;
use crate::error::ServiceError;
use crate::models::{BlockPair, BlockStatus, UserId};
use crate::services::block_actions::{BlockActionResponse, ImportSummary};
use crate::services::visibility::{BlockControl, ProfileVisibility};

#[derive(Debug, Default, Deserialize)]
pub struct ChatThreadParams {
    pub chat_thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportBlocksRequest {
    pub blocks: Vec<BlockPair>,
}

/// Both block directions between the current user and `user_id`
pub async fn get_block_status(
    Path(user_id): Path<UserId>,
    CurrentUser(viewer): CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<BlockStatus> {
    debug!("Block status between {} and {}", viewer, user_id);
    let services = &state.services;

    let result = async {
        let other = services.visibility.require_user(user_id).await?;
        Ok::<_, ServiceError>(services.checker.block_status(viewer, other.id).await?)
    }
    .await;
    respond(result)
}

pub async fn get_block_control(
    Path(user_id): Path<UserId>,
    CurrentUser(viewer): CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<Option<BlockControl>> {
    let visibility = &state.services.visibility;

    let result = async {
        let target = visibility.require_user(user_id).await?;
        visibility.block_control(viewer, &target).await
    }
    .await;
    respond(result)
}

/// What the current user sees of `user_id`'s profile
pub async fn get_visibility(
    Path(user_id): Path<UserId>,
    CurrentUser(viewer): CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<ProfileVisibility> {
    let visibility = &state.services.visibility;

    let result = async {
        let viewed = visibility.require_user(user_id).await?;
        visibility.profile_visibility(viewer, viewed.id).await
    }
    .await;
    respond(result)
}

pub async fn block_user(
    Path(user_id): Path<UserId>,
    Query(params): Query<ChatThreadParams>,
    CurrentUser(actor): CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<BlockActionResponse> {
    respond(
        state
            .services
            .block_actions
            .block(actor, user_id, params.chat_thread_id)
            .await,
    )
}

pub async fn unblock_user(
    Path(user_id): Path<UserId>,
    Query(params): Query<ChatThreadParams>,
    CurrentUser(actor): CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<BlockActionResponse> {
    respond(
        state
            .services
            .block_actions
            .unblock(actor, user_id, params.chat_thread_id)
            .await,
    )
}

/// Administrative bulk import of block pairs
pub async fn import_blocks(
    CurrentUser(actor): CurrentUser,
    State(state): State<AppState>,
    Json(request): Json<ImportBlocksRequest>,
) -> ApiResult<ImportSummary> {
    debug!("Importing {} block pairs for {}", request.blocks.len(), actor);
    respond(
        state
            .services
            .block_actions
            .import_blocks(actor, request.blocks)
            .await,
    )
}
