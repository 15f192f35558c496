// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! In-process store backing the unit and HTTP tests.
//!
//! This is a test fixture, not a runtime backend: besides the store traits it
//! exposes seeding and fault hooks (`add_user`, `grant`, `fail_gallery_of`,
//! `force_status`, ...) that only tests should call.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{
    AbuseReportStore, BlockStore, CapabilityEvaluator, GalleryAccess, ReportFilter, UserDirectory,
};
use crate::models::{
    AbuseReport, BlockRecord, Capability, NewAbuseReport, ReportId, ReportNote, ReportStatus,
    ReportUpdate, UserAccount, UserId,
};

#[derive(Default)]
struct State {
    users: BTreeMap<UserId, UserAccount>,
    capabilities: HashSet<(UserId, Capability)>,
    galleries: HashMap<UserId, HashSet<UserId>>,
    blocks: Vec<BlockRecord>,
    reports: BTreeMap<ReportId, AbuseReport>,
    next_block_id: i32,
    next_report_id: ReportId,
    next_note_id: i32,
    failing_galleries: HashSet<UserId>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, id: UserId, account_name: &str) {
        let mut state = self.state.lock().await;
        state.users.insert(
            id,
            UserAccount {
                id,
                account_name: account_name.to_string(),
            },
        );
    }

    pub async fn grant(&self, user: UserId, capability: Capability) {
        self.state.lock().await.capabilities.insert((user, capability));
    }

    /// Give `member` access to `owner`'s private gallery
    pub async fn allow_gallery_member(&self, owner: UserId, member: UserId) {
        let mut state = self.state.lock().await;
        state.galleries.entry(owner).or_default().insert(member);
    }

    pub async fn gallery_members(&self, owner: UserId) -> HashSet<UserId> {
        let state = self.state.lock().await;
        state.galleries.get(&owner).cloned().unwrap_or_default()
    }

    /// Make revocations against `owner`'s gallery fail
    pub async fn fail_gallery_of(&self, owner: UserId) {
        self.state.lock().await.failing_galleries.insert(owner);
    }

    pub async fn block_count(&self, blocker: UserId, blocked: UserId) -> usize {
        let state = self.state.lock().await;
        state
            .blocks
            .iter()
            .filter(|b| b.blocker_user_id == blocker && b.blocked_user_id == blocked)
            .count()
    }

    /// Overwrite a report's status directly, bypassing the workflow
    pub async fn force_status(&self, id: ReportId, status: ReportStatus) -> Result<()> {
        let mut state = self.state.lock().await;
        let report = state
            .reports
            .get_mut(&id)
            .ok_or_else(|| anyhow!("report {} not found", id))?;
        report.status = status;
        Ok(())
    }
}

impl State {
    fn note(&mut self, author: UserId, body: String) -> ReportNote {
        self.next_note_id += 1;
        ReportNote {
            id: self.next_note_id,
            author_user_id: author,
            body,
            created_at: Utc::now().naive_utc(),
        }
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn block_exists(&self, blocker: UserId, blocked: UserId) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state
            .blocks
            .iter()
            .any(|b| b.blocker_user_id == blocker && b.blocked_user_id == blocked))
    }

    async fn insert_block(&self, blocker: UserId, blocked: UserId) -> Result<Option<BlockRecord>> {
        if blocker == blocked {
            return Err(anyhow!("block record would reference the same user twice"));
        }
        let mut state = self.state.lock().await;
        if state
            .blocks
            .iter()
            .any(|b| b.blocker_user_id == blocker && b.blocked_user_id == blocked)
        {
            return Ok(None);
        }

        state.next_block_id += 1;
        let record = BlockRecord {
            id: state.next_block_id,
            blocker_user_id: blocker,
            blocked_user_id: blocked,
            created_at: Utc::now().naive_utc(),
        };
        state.blocks.push(record.clone());
        Ok(Some(record))
    }

    async fn delete_blocks(&self, blocker: UserId, blocked: UserId) -> Result<usize> {
        let mut state = self.state.lock().await;
        let before = state.blocks.len();
        state
            .blocks
            .retain(|b| !(b.blocker_user_id == blocker && b.blocked_user_id == blocked));
        Ok(before - state.blocks.len())
    }
}

#[async_trait]
impl AbuseReportStore for MemoryStore {
    async fn insert_report(&self, report: NewAbuseReport) -> Result<AbuseReport> {
        let mut state = self.state.lock().await;
        state.next_report_id += 1;
        let now = Utc::now().naive_utc();
        let stored = AbuseReport {
            id: state.next_report_id,
            reporter_user_id: report.reporter_user_id,
            reported_user_id: report.reported_user_id,
            reason: report.reason,
            message: report.message,
            status: ReportStatus::New,
            admin_notes: Vec::new(),
            user_notes: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        state.reports.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_report(&self, id: ReportId) -> Result<Option<AbuseReport>> {
        Ok(self.state.lock().await.reports.get(&id).cloned())
    }

    async fn list_reports(&self, filter: ReportFilter) -> Result<Vec<AbuseReport>> {
        let state = self.state.lock().await;
        Ok(state
            .reports
            .values()
            .rev()
            .filter(|r| filter.reporter.map_or(true, |id| r.reporter_user_id == id))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect())
    }

    async fn append_user_reply(
        &self,
        id: ReportId,
        author: UserId,
        note: String,
    ) -> Result<Option<AbuseReport>> {
        let mut state = self.state.lock().await;
        match state.reports.get(&id) {
            Some(report) if report.status.accepts_user_reply() => {}
            _ => return Ok(None),
        }

        let note = state.note(author, note);
        let Some(report) = state.reports.get_mut(&id) else {
            return Ok(None);
        };
        report.user_notes.push(note);
        report.status = ReportStatus::UserReplied;
        report.updated_at = Utc::now().naive_utc();
        Ok(Some(report.clone()))
    }

    async fn apply_admin_update(
        &self,
        id: ReportId,
        author: UserId,
        expected: ReportStatus,
        update: ReportUpdate,
    ) -> Result<Option<AbuseReport>> {
        let mut state = self.state.lock().await;
        match state.reports.get(&id) {
            Some(report) if report.status == expected => {}
            _ => return Ok(None),
        }

        let note = update.admin_note.map(|body| state.note(author, body));
        let Some(report) = state.reports.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(status) = update.status {
            report.status = status;
        }
        report.admin_notes.extend(note);
        report.updated_at = Utc::now().naive_utc();
        Ok(Some(report.clone()))
    }

    async fn delete_report(&self, id: ReportId) -> Result<bool> {
        Ok(self.state.lock().await.reports.remove(&id).is_some())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, id: UserId) -> Result<Option<UserAccount>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl CapabilityEvaluator for MemoryStore {
    async fn has_capability(&self, actor: UserId, capability: Capability) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .await
            .capabilities
            .contains(&(actor, capability)))
    }
}

#[async_trait]
impl GalleryAccess for MemoryStore {
    async fn revoke_member(&self, owner: UserId, member: UserId) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.failing_galleries.contains(&owner) {
            return Err(anyhow!("gallery storage unavailable for user {}", owner));
        }
        Ok(state
            .galleries
            .get_mut(&owner)
            .map_or(false, |members| members.remove(&member)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn filed(store: &MemoryStore) -> ReportId {
        store
            .insert_report(NewAbuseReport {
                reporter_user_id: 1,
                reported_user_id: 2,
                reason: "spam".into(),
                message: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn reply_requires_waiting_status_in_the_same_step() {
        let store = MemoryStore::new();
        let id = filed(&store).await;
        store.force_status(id, ReportStatus::UserReplied).await.unwrap();

        let replied = store.append_user_reply(id, 1, "again".into()).await.unwrap();
        assert!(replied.is_none());

        let stored = store.find_report(id).await.unwrap().unwrap();
        assert!(stored.user_notes.is_empty());
        assert_eq!(stored.status, ReportStatus::UserReplied);
    }

    #[tokio::test]
    async fn reply_moves_waiting_report_once() {
        let store = MemoryStore::new();
        let id = filed(&store).await;
        store.force_status(id, ReportStatus::WaitingUser).await.unwrap();

        let first = store.append_user_reply(id, 1, "first".into()).await.unwrap();
        let second = store.append_user_reply(id, 1, "second".into()).await.unwrap();

        assert_eq!(first.map(|r| r.status), Some(ReportStatus::UserReplied));
        assert!(second.is_none());
        let stored = store.find_report(id).await.unwrap().unwrap();
        assert_eq!(stored.user_notes.len(), 1);
    }

    #[tokio::test]
    async fn admin_update_with_stale_status_is_skipped() {
        let store = MemoryStore::new();
        let id = filed(&store).await;
        store.force_status(id, ReportStatus::Reviewed).await.unwrap();

        let update = ReportUpdate {
            status: Some(ReportStatus::Resolved),
            admin_note: Some("closing".into()),
        };
        let applied = store
            .apply_admin_update(id, 9, ReportStatus::New, update)
            .await
            .unwrap();
        assert!(applied.is_none());

        let stored = store.find_report(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Reviewed);
        assert!(stored.admin_notes.is_empty());
    }
}
