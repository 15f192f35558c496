// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::models::{BlockStatus, UserId};
use crate::store::BlockStore;

/// Read-only block relationship queries
#[derive(Clone)]
pub struct BlockChecker {
    blocks: Arc<dyn BlockStore>,
}

impl BlockChecker {
    pub fn new(blocks: Arc<dyn BlockStore>) -> Self {
        Self { blocks }
    }

    /// Whether `blocker` has blocked `blocked`. Users cannot block themselves.
    async fn has_blocked(&self, blocker: UserId, blocked: UserId) -> Result<bool> {
        if blocker == blocked {
            return Ok(false);
        }
        self.blocks.block_exists(blocker, blocked).await
    }

    /// True if either user has blocked the other
    pub async fn is_block_active(&self, user_one: UserId, user_two: UserId) -> Result<bool> {
        if user_one == user_two {
            return Ok(false);
        }
        Ok(self.has_blocked(user_one, user_two).await? || self.has_blocked(user_two, user_one).await?)
    }

    /// True if `blocker_user` has blocked `blocked_user`
    pub async fn is_user_blocked_by(&self, blocked_user: UserId, blocker_user: UserId) -> Result<bool> {
        self.has_blocked(blocker_user, blocked_user).await
    }

    /// Both directions between `viewer` and `other`
    pub async fn block_status(&self, viewer: UserId, other: UserId) -> Result<BlockStatus> {
        let blocked_by_you = self.has_blocked(viewer, other).await?;
        let blocked_you = self.has_blocked(other, viewer).await?;
        debug!(
            "Block status {} <-> {}: by_viewer={} by_other={}",
            viewer, other, blocked_by_you, blocked_you
        );

        Ok(BlockStatus {
            is_block_active: blocked_by_you || blocked_you,
            blocked_by_you,
            blocked_you,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn checker_with(blocks: &[(UserId, UserId)]) -> BlockChecker {
        let store = Arc::new(MemoryStore::new());
        for (blocker, blocked) in blocks {
            store.insert_block(*blocker, *blocked).await.unwrap();
        }
        BlockChecker::new(store)
    }

    #[tokio::test]
    async fn block_is_active_in_both_directions() {
        let checker = checker_with(&[(1, 2)]).await;

        assert!(checker.is_block_active(1, 2).await.unwrap());
        assert!(checker.is_block_active(2, 1).await.unwrap());
        assert!(!checker.is_block_active(1, 3).await.unwrap());
    }

    #[tokio::test]
    async fn blocked_by_is_directed() {
        let checker = checker_with(&[(1, 2)]).await;

        assert!(checker.is_user_blocked_by(2, 1).await.unwrap());
        assert!(!checker.is_user_blocked_by(1, 2).await.unwrap());
    }

    #[tokio::test]
    async fn self_comparison_is_never_blocked() {
        let checker = checker_with(&[(1, 2)]).await;

        assert!(!checker.is_block_active(1, 1).await.unwrap());
        assert!(!checker.is_user_blocked_by(1, 1).await.unwrap());
    }

    #[tokio::test]
    async fn status_reports_each_direction() {
        let checker = checker_with(&[(2, 1)]).await;

        let status = checker.block_status(1, 2).await.unwrap();
        assert_eq!(
            status,
            BlockStatus {
                is_block_active: true,
                blocked_by_you: false,
                blocked_you: true,
            }
        );
    }
}
