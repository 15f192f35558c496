// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Storage and collaborator seams.
//!
//! The block and report stores are owned by this service. The user directory,
//! capability evaluator and gallery allow-list belong to the wider platform and
//! are consumed through the same kind of trait so the services never depend on
//! a concrete backend.

pub mod memory;
pub mod pg;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    AbuseReport, BlockRecord, Capability, NewAbuseReport, ReportId, ReportStatus, ReportUpdate,
    UserAccount, UserId,
};

pub use memory::MemoryStore;
pub use pg::PgStore;

#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Existence check for a `blocker -> blocked` record
    async fn block_exists(&self, blocker: UserId, blocked: UserId) -> Result<bool>;

    /// Insert a block unless the ordered pair already has one.
    ///
    /// Returns `None` when a record for the pair already existed.
    async fn insert_block(&self, blocker: UserId, blocked: UserId) -> Result<Option<BlockRecord>>;

    /// Delete every record for the ordered pair, returning how many were removed
    async fn delete_blocks(&self, blocker: UserId, blocked: UserId) -> Result<usize>;
}

/// Which reports a listing should return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub reporter: Option<UserId>,
    pub status: Option<ReportStatus>,
}

#[async_trait]
pub trait AbuseReportStore: Send + Sync {
    async fn insert_report(&self, report: NewAbuseReport) -> Result<AbuseReport>;

    async fn find_report(&self, id: ReportId) -> Result<Option<AbuseReport>>;

    /// Newest first
    async fn list_reports(&self, filter: ReportFilter) -> Result<Vec<AbuseReport>>;

    /// Append a reporter note and move `waiting_user -> user_replied`.
    ///
    /// The status check and the write happen together; `None` means the report
    /// was missing or no longer waiting for the user.
    async fn append_user_reply(
        &self,
        id: ReportId,
        author: UserId,
        note: String,
    ) -> Result<Option<AbuseReport>>;

    /// Apply an administrative status change and/or note.
    ///
    /// `expected` is the status the caller validated the change against; the
    /// update is skipped (`None`) if the stored status differs.
    async fn apply_admin_update(
        &self,
        id: ReportId,
        author: UserId,
        expected: ReportStatus,
        update: ReportUpdate,
    ) -> Result<Option<AbuseReport>>;

    async fn delete_report(&self, id: ReportId) -> Result<bool>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<UserAccount>>;
}

#[async_trait]
pub trait CapabilityEvaluator: Send + Sync {
    async fn has_capability(&self, actor: UserId, capability: Capability) -> Result<bool>;
}

#[async_trait]
pub trait GalleryAccess: Send + Sync {
    /// Remove `member` from the allow-list of `owner`'s private gallery.
    ///
    /// Returns `false` when the owner has no private gallery entry for the
    /// member.
    async fn revoke_member(&self, owner: UserId, member: UserId) -> Result<bool>;
}
