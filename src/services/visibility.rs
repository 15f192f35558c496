// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! What a viewer gets to see of another user after block state is applied.

use std::sync::Arc;

use serde::Serialize;

use super::block_checker::BlockChecker;
use super::permissions::Permissions;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Capability, UserAccount, UserId};
use crate::store::UserDirectory;

pub const BLOCKED_BY_USER_NOTICE: &str = "This user has blocked you.";
pub const BLOCKED_BY_VIEWER_NOTICE: &str = "You have blocked this user.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockControlAction {
    Block,
    Unblock,
}

/// The block/unblock toggle shown on a profile or chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockControl {
    pub target_user_id: UserId,
    pub label: String,
    pub action: BlockControlAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportAction {
    pub target_user_id: UserId,
    pub label: String,
}

/// Mutually exclusive outcomes of viewing another user's profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProfileVisibility {
    /// The viewed user blocked the viewer; nothing else is shown
    BlockedByUser { notice: String },
    /// The viewer blocked the viewed user
    BlockedByViewer {
        notice: String,
        report_action: Option<ReportAction>,
    },
    Visible,
}

/// Message composer state for a chat thread between two users
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatComposer {
    pub thread_id: String,
    pub messaging_allowed: bool,
}

#[derive(Clone)]
pub struct VisibilityService {
    checker: BlockChecker,
    permissions: Permissions,
    users: Arc<dyn UserDirectory>,
}

impl VisibilityService {
    pub fn new(checker: BlockChecker, permissions: Permissions, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            checker,
            permissions,
            users,
        }
    }

    pub async fn require_user(&self, id: UserId) -> ServiceResult<UserAccount> {
        self.users
            .find_user(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("User {} does not exist.", id)))
    }

    /// Block toggle for `target`, or `None` when the viewer cannot act on it
    pub async fn block_control(
        &self,
        viewer: UserId,
        target: &UserAccount,
    ) -> ServiceResult<Option<BlockControl>> {
        if viewer == target.id || !self.permissions.has(viewer, Capability::BlockUsers).await? {
            return Ok(None);
        }

        let control = if self.checker.is_user_blocked_by(target.id, viewer).await? {
            BlockControl {
                target_user_id: target.id,
                label: format!("Unblock {}", target.account_name),
                action: BlockControlAction::Unblock,
            }
        } else {
            BlockControl {
                target_user_id: target.id,
                label: format!("Block {}", target.account_name),
                action: BlockControlAction::Block,
            }
        };
        Ok(Some(control))
    }

    /// Evaluate what `viewer` sees of `viewed`'s profile
    pub async fn profile_visibility(
        &self,
        viewer: UserId,
        viewed: UserId,
    ) -> ServiceResult<ProfileVisibility> {
        if viewer == viewed {
            return Ok(ProfileVisibility::Visible);
        }

        // Being blocked wins over having blocked
        if self.checker.is_user_blocked_by(viewer, viewed).await? {
            return Ok(ProfileVisibility::BlockedByUser {
                notice: BLOCKED_BY_USER_NOTICE.to_string(),
            });
        }

        if self.checker.is_user_blocked_by(viewed, viewer).await? {
            let report_action = if self.permissions.has(viewer, Capability::ReportAbuse).await? {
                Some(ReportAction {
                    target_user_id: viewed,
                    label: "Report abuse".to_string(),
                })
            } else {
                None
            };
            return Ok(ProfileVisibility::BlockedByViewer {
                notice: BLOCKED_BY_VIEWER_NOTICE.to_string(),
                report_action,
            });
        }

        Ok(ProfileVisibility::Visible)
    }

    pub async fn chat_composer(
        &self,
        viewer: UserId,
        other: UserId,
        thread_id: String,
    ) -> ServiceResult<ChatComposer> {
        let messaging_allowed = !self.checker.is_block_active(viewer, other).await?;
        Ok(ChatComposer {
            thread_id,
            messaging_allowed,
        })
    }
}
