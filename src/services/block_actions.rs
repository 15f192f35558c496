// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::notice::Notice;
use super::permissions::Permissions;
use super::visibility::{BlockControl, ChatComposer, ProfileVisibility, VisibilityService};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::models::{BlockPair, Capability, UserAccount, UserId};
use crate::store::{BlockStore, GalleryAccess, UserDirectory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockOutcome {
    Blocked,
    AlreadyBlocked,
    Unblocked,
    NotBlocked,
}

impl BlockOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockOutcome::Blocked => "blocked",
            BlockOutcome::AlreadyBlocked => "already_blocked",
            BlockOutcome::Unblocked => "unblocked",
            BlockOutcome::NotBlocked => "not_blocked",
        }
    }

    fn notice(&self, target: &UserAccount) -> Notice {
        let name = &target.account_name;
        match self {
            BlockOutcome::Blocked => {
                Notice::warning("User Blocked", format!("You have blocked {}!", name))
            }
            BlockOutcome::AlreadyBlocked => {
                Notice::info("Already Blocked", format!("{} is already blocked!", name))
            }
            BlockOutcome::Unblocked => {
                Notice::success("User unblocked", format!("You have unblocked {}!", name))
            }
            BlockOutcome::NotBlocked => {
                Notice::info("Not blocked", format!("{} was not blocked!", name))
            }
        }
    }
}

/// Everything the client needs to refresh after a block or unblock
#[derive(Debug, Clone, Serialize)]
pub struct BlockActionResponse {
    pub outcome: BlockOutcome,
    pub notice: Notice,
    pub control: Option<BlockControl>,
    pub visibility: ProfileVisibility,
    pub chat_composer: Option<ChatComposer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub duplicates: usize,
    pub rejected: Vec<BlockPair>,
}

#[derive(Clone)]
pub struct BlockActions {
    blocks: Arc<dyn BlockStore>,
    users: Arc<dyn UserDirectory>,
    galleries: Arc<dyn GalleryAccess>,
    permissions: Permissions,
    visibility: VisibilityService,
}

impl BlockActions {
    pub fn new(
        blocks: Arc<dyn BlockStore>,
        users: Arc<dyn UserDirectory>,
        galleries: Arc<dyn GalleryAccess>,
        permissions: Permissions,
        visibility: VisibilityService,
    ) -> Self {
        Self {
            blocks,
            users,
            galleries,
            permissions,
            visibility,
        }
    }

    /// Check the actor may block or unblock `target_id` and resolve the target
    async fn authorize(&self, actor: UserId, target_id: UserId) -> ServiceResult<UserAccount> {
        self.permissions.require(actor, Capability::BlockUsers).await?;
        let target = self.visibility.require_user(target_id).await?;
        if actor == target.id {
            return Err(ServiceError::forbidden("You cannot block yourself."));
        }
        Ok(target)
    }

    /// Block `target_id` on behalf of `actor`
    pub async fn block(
        &self,
        actor: UserId,
        target_id: UserId,
        chat_thread_id: Option<String>,
    ) -> ServiceResult<BlockActionResponse> {
        let target = self.authorize(actor, target_id).await?;

        let outcome = match self.blocks.insert_block(actor, target.id).await? {
            Some(record) => {
                info!("User {} blocked user {} (block {})", actor, target.id, record.id);
                self.revoke_gallery_access(actor, target.id).await;
                BlockOutcome::Blocked
            }
            None => {
                debug!("User {} already blocks user {}", actor, target.id);
                BlockOutcome::AlreadyBlocked
            }
        };
        metrics::record_block_action(outcome.as_str());

        self.respond(actor, &target, outcome, chat_thread_id).await
    }

    /// Remove every block `actor` holds against `target_id`
    pub async fn unblock(
        &self,
        actor: UserId,
        target_id: UserId,
        chat_thread_id: Option<String>,
    ) -> ServiceResult<BlockActionResponse> {
        let target = self.authorize(actor, target_id).await?;

        let removed = self.blocks.delete_blocks(actor, target.id).await?;
        let outcome = if removed > 0 {
            info!("User {} unblocked user {} ({} records)", actor, target.id, removed);
            BlockOutcome::Unblocked
        } else {
            debug!("User {} did not block user {}", actor, target.id);
            BlockOutcome::NotBlocked
        };
        metrics::record_block_action(outcome.as_str());

        self.respond(actor, &target, outcome, chat_thread_id).await
    }

    /// Insert blocks in bulk without touching gallery allow-lists
    pub async fn import_blocks(&self, actor: UserId, pairs: Vec<BlockPair>) -> ServiceResult<ImportSummary> {
        self.permissions
            .require(actor, Capability::AdministerAbuseReports)
            .await?;

        let mut summary = ImportSummary::default();
        for pair in pairs {
            if pair.blocker_user_id == pair.blocked_user_id
                || self.users.find_user(pair.blocker_user_id).await?.is_none()
                || self.users.find_user(pair.blocked_user_id).await?.is_none()
            {
                summary.rejected.push(pair);
                continue;
            }

            match self
                .blocks
                .insert_block(pair.blocker_user_id, pair.blocked_user_id)
                .await?
            {
                Some(_) => summary.imported += 1,
                None => summary.duplicates += 1,
            }
        }

        metrics::record_block_action_by("imported", summary.imported);
        info!(
            "Block import by {}: {} imported, {} duplicates, {} rejected",
            actor,
            summary.imported,
            summary.duplicates,
            summary.rejected.len()
        );
        Ok(summary)
    }

    /// Each party loses access to the other's private gallery.
    ///
    /// Failures are logged and skipped; the block itself stands.
    async fn revoke_gallery_access(&self, blocker: UserId, blocked: UserId) {
        for (owner, member) in [(blocked, blocker), (blocker, blocked)] {
            match self.galleries.revoke_member(owner, member).await {
                Ok(true) => info!(
                    "User {} access revoked from private gallery of user {} due to a block",
                    member, owner
                ),
                Ok(false) => debug!("User {} had no access to private gallery of user {}", member, owner),
                Err(e) => {
                    metrics::record_degraded("gallery_revocation");
                    warn!(
                        "Failed to revoke user {} from private gallery of user {}: {:#}",
                        member, owner, e
                    );
                }
            }
        }
    }

    async fn respond(
        &self,
        actor: UserId,
        target: &UserAccount,
        outcome: BlockOutcome,
        chat_thread_id: Option<String>,
    ) -> ServiceResult<BlockActionResponse> {
        let control = self.visibility.block_control(actor, target).await?;
        let visibility = self.visibility.profile_visibility(actor, target.id).await?;
        let chat_composer = match chat_thread_id {
            Some(thread_id) => Some(
                self.visibility
                    .chat_composer(actor, target.id, thread_id)
                    .await?,
            ),
            None => None,
        };

        Ok(BlockActionResponse {
            outcome,
            notice: outcome.notice(target),
            control,
            visibility,
            chat_composer,
        })
    }
}
