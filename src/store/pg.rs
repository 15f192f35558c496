// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use super::{
    AbuseReportStore, BlockStore, CapabilityEvaluator, GalleryAccess, ReportFilter, UserDirectory,
};
use crate::db::{Database, DbConnection};
use crate::models::{
    AbuseReport, AbuseReportRow, BlockRecord, Capability, NewAbuseReport, NewAbuseReportRow,
    NewBlockRecord, NewReportNoteRow, NoteKind, ReportId, ReportNoteRow, ReportStatus,
    ReportUpdate, UserAccount, UserId,
};
use crate::schema::{
    abuse_blocks, abuse_report_notes, abuse_reports, private_gallery_members, user_capabilities,
    users,
};

/// PostgreSQL-backed implementation of every store and collaborator trait
#[derive(Clone)]
pub struct PgStore {
    db: Arc<Database>,
}

impl PgStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Get a database connection from the pool
    async fn get_connection(&self) -> Result<DbConnection> {
        self.db
            .get_connection()
            .await
            .map_err(|e| anyhow!("Failed to get database connection: {}", e))
    }
}

/// Load one report with its notes over an existing connection
async fn load_report(conn: &mut DbConnection, id: ReportId) -> Result<Option<AbuseReport>> {
    let row = abuse_reports::table
        .find(id)
        .select(AbuseReportRow::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to load abuse report")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let notes = abuse_report_notes::table
        .filter(abuse_report_notes::report_id.eq(id))
        .order(abuse_report_notes::id.asc())
        .select(ReportNoteRow::as_select())
        .load(conn)
        .await
        .context("Failed to load report notes")?;

    Ok(Some(AbuseReport::from_rows(row, notes)?))
}

fn new_note(report_id: ReportId, kind: NoteKind, author: UserId, body: String) -> NewReportNoteRow {
    NewReportNoteRow {
        report_id,
        kind: kind.as_str().to_string(),
        author_uid: author,
        body,
        created_at: Utc::now().naive_utc(),
    }
}

#[async_trait]
impl BlockStore for PgStore {
    async fn block_exists(&self, blocker: UserId, blocked: UserId) -> Result<bool> {
        let mut conn = self.get_connection().await?;

        let exists = diesel::select(diesel::dsl::exists(
            abuse_blocks::table
                .filter(abuse_blocks::blocker_uid.eq(blocker))
                .filter(abuse_blocks::blocked_uid.eq(blocked)),
        ))
        .get_result::<bool>(&mut conn)
        .await
        .context("Failed to check block")?;

        Ok(exists)
    }

    async fn insert_block(&self, blocker: UserId, blocked: UserId) -> Result<Option<BlockRecord>> {
        let mut conn = self.get_connection().await?;

        let record = NewBlockRecord {
            blocker_user_id: blocker,
            blocked_user_id: blocked,
            created_at: Utc::now().naive_utc(),
        };

        // The unique pair constraint turns a concurrent duplicate into a no-op
        let inserted = diesel::insert_into(abuse_blocks::table)
            .values(&record)
            .on_conflict((abuse_blocks::blocker_uid, abuse_blocks::blocked_uid))
            .do_nothing()
            .returning(BlockRecord::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .context("Failed to insert block")?;

        debug!(
            "Block insert {} -> {}: {}",
            blocker,
            blocked,
            if inserted.is_some() { "created" } else { "exists" }
        );
        Ok(inserted)
    }

    async fn delete_blocks(&self, blocker: UserId, blocked: UserId) -> Result<usize> {
        let mut conn = self.get_connection().await?;

        let removed = diesel::delete(
            abuse_blocks::table
                .filter(abuse_blocks::blocker_uid.eq(blocker))
                .filter(abuse_blocks::blocked_uid.eq(blocked)),
        )
        .execute(&mut conn)
        .await
        .context("Failed to delete blocks")?;

        Ok(removed)
    }
}

#[async_trait]
impl AbuseReportStore for PgStore {
    async fn insert_report(&self, report: NewAbuseReport) -> Result<AbuseReport> {
        let mut conn = self.get_connection().await?;
        let now = Utc::now().naive_utc();

        let row = NewAbuseReportRow {
            reporter_uid: report.reporter_user_id,
            reported_uid: report.reported_user_id,
            reason: report.reason,
            message: report.message,
            status: ReportStatus::New.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };

        let stored = diesel::insert_into(abuse_reports::table)
            .values(&row)
            .returning(AbuseReportRow::as_returning())
            .get_result(&mut conn)
            .await
            .context("Failed to insert abuse report")?;

        Ok(AbuseReport::from_rows(stored, Vec::new())?)
    }

    async fn find_report(&self, id: ReportId) -> Result<Option<AbuseReport>> {
        let mut conn = self.get_connection().await?;
        load_report(&mut conn, id).await
    }

    async fn list_reports(&self, filter: ReportFilter) -> Result<Vec<AbuseReport>> {
        let mut conn = self.get_connection().await?;

        let mut query = abuse_reports::table
            .select(AbuseReportRow::as_select())
            .into_boxed();
        if let Some(reporter) = filter.reporter {
            query = query.filter(abuse_reports::reporter_uid.eq(reporter));
        }
        if let Some(status) = filter.status {
            query = query.filter(abuse_reports::status.eq(status.as_str()));
        }

        let rows = query
            .order((abuse_reports::created_at.desc(), abuse_reports::id.desc()))
            .load(&mut conn)
            .await
            .context("Failed to list abuse reports")?;

        let ids: Vec<ReportId> = rows.iter().map(|row| row.id).collect();
        let notes = abuse_report_notes::table
            .filter(abuse_report_notes::report_id.eq_any(ids))
            .order(abuse_report_notes::id.asc())
            .select(ReportNoteRow::as_select())
            .load(&mut conn)
            .await
            .context("Failed to load report notes")?;

        let mut notes_by_report: HashMap<ReportId, Vec<ReportNoteRow>> = HashMap::new();
        for note in notes {
            notes_by_report.entry(note.report_id).or_default().push(note);
        }

        rows.into_iter()
            .map(|row| {
                let notes = notes_by_report.remove(&row.id).unwrap_or_default();
                AbuseReport::from_rows(row, notes).map_err(Into::into)
            })
            .collect()
    }

    async fn append_user_reply(
        &self,
        id: ReportId,
        author: UserId,
        note: String,
    ) -> Result<Option<AbuseReport>> {
        let mut conn = self.get_connection().await?;
        let now = Utc::now().naive_utc();

        let replied = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    let updated = diesel::update(
                        abuse_reports::table
                            .filter(abuse_reports::id.eq(id))
                            .filter(abuse_reports::status.eq(ReportStatus::WaitingUser.as_str())),
                    )
                    .set((
                        abuse_reports::status.eq(ReportStatus::UserReplied.as_str()),
                        abuse_reports::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .await?;

                    if updated == 0 {
                        return Ok(false);
                    }

                    diesel::insert_into(abuse_report_notes::table)
                        .values(&new_note(id, NoteKind::User, author, note))
                        .execute(conn)
                        .await?;

                    Ok(true)
                }
                .scope_boxed()
            })
            .await
            .context("Failed to append user reply")?;

        if !replied {
            return Ok(None);
        }
        load_report(&mut conn, id).await
    }

    async fn apply_admin_update(
        &self,
        id: ReportId,
        author: UserId,
        expected: ReportStatus,
        update: ReportUpdate,
    ) -> Result<Option<AbuseReport>> {
        let mut conn = self.get_connection().await?;
        let now = Utc::now().naive_utc();

        let applied = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    let target = abuse_reports::table
                        .filter(abuse_reports::id.eq(id))
                        .filter(abuse_reports::status.eq(expected.as_str()));

                    let updated = match update.status {
                        Some(status) => {
                            diesel::update(target)
                                .set((
                                    abuse_reports::status.eq(status.as_str()),
                                    abuse_reports::updated_at.eq(now),
                                ))
                                .execute(conn)
                                .await?
                        }
                        None => {
                            diesel::update(target)
                                .set(abuse_reports::updated_at.eq(now))
                                .execute(conn)
                                .await?
                        }
                    };

                    if updated == 0 {
                        return Ok(false);
                    }

                    if let Some(body) = update.admin_note {
                        diesel::insert_into(abuse_report_notes::table)
                            .values(&new_note(id, NoteKind::Admin, author, body))
                            .execute(conn)
                            .await?;
                    }

                    Ok(true)
                }
                .scope_boxed()
            })
            .await
            .context("Failed to update abuse report")?;

        if !applied {
            return Ok(None);
        }
        load_report(&mut conn, id).await
    }

    async fn delete_report(&self, id: ReportId) -> Result<bool> {
        let mut conn = self.get_connection().await?;

        // Notes go with the report through ON DELETE CASCADE
        let removed = diesel::delete(abuse_reports::table.find(id))
            .execute(&mut conn)
            .await
            .context("Failed to delete abuse report")?;

        Ok(removed > 0)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_user(&self, id: UserId) -> Result<Option<UserAccount>> {
        let mut conn = self.get_connection().await?;

        let user = users::table
            .find(id)
            .select(UserAccount::as_select())
            .first(&mut conn)
            .await
            .optional()
            .context("Failed to load user")?;

        Ok(user)
    }
}

#[async_trait]
impl CapabilityEvaluator for PgStore {
    async fn has_capability(&self, actor: UserId, capability: Capability) -> Result<bool> {
        let mut conn = self.get_connection().await?;

        let granted = diesel::select(diesel::dsl::exists(
            user_capabilities::table
                .filter(user_capabilities::user_id.eq(actor))
                .filter(user_capabilities::capability.eq(capability.as_str())),
        ))
        .get_result::<bool>(&mut conn)
        .await
        .context("Failed to check capability")?;

        Ok(granted)
    }
}

#[async_trait]
impl GalleryAccess for PgStore {
    async fn revoke_member(&self, owner: UserId, member: UserId) -> Result<bool> {
        let mut conn = self.get_connection().await?;

        let removed = diesel::delete(
            private_gallery_members::table
                .filter(private_gallery_members::owner_uid.eq(owner))
                .filter(private_gallery_members::member_uid.eq(member)),
        )
        .execute(&mut conn)
        .await
        .context("Failed to revoke gallery access")?;

        Ok(removed > 0)
    }
}
