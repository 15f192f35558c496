// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ReportId, UserId};
use crate::schema::{abuse_report_notes, abuse_reports};

/// Longest accepted report reason, in characters
pub const REASON_MAX_LENGTH: usize = 255;

/// Review state of an abuse report.
///
/// Reports start at `New`. Administrators move them between `Reviewed`,
/// `WaitingUser` and `Resolved`; only a reporter reply moves a report from
/// `WaitingUser` to `UserReplied`. `Resolved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    New,
    Reviewed,
    WaitingUser,
    UserReplied,
    Resolved,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::New => "new",
            ReportStatus::Reviewed => "reviewed",
            ReportStatus::WaitingUser => "waiting_user",
            ReportStatus::UserReplied => "user_replied",
            ReportStatus::Resolved => "resolved",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Resolved)
    }

    /// Whether the reporter may append a reply in this state
    pub fn accepts_user_reply(&self) -> bool {
        matches!(self, ReportStatus::WaitingUser)
    }

    /// Whether an administrator may move a report from `self` to `next`
    pub fn admin_can_move_to(&self, next: ReportStatus) -> bool {
        if self.is_terminal() || *self == next {
            return false;
        }
        matches!(
            next,
            ReportStatus::Reviewed | ReportStatus::WaitingUser | ReportStatus::Resolved
        )
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown report status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ReportStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ReportStatus::New),
            "reviewed" => Ok(ReportStatus::Reviewed),
            "waiting_user" => Ok(ReportStatus::WaitingUser),
            "user_replied" => Ok(ReportStatus::UserReplied),
            "resolved" => Ok(ReportStatus::Resolved),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Who wrote a report note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Admin,
    User,
}

impl NoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteKind::Admin => "admin",
            NoteKind::User => "user",
        }
    }
}

/// Abuse report as stored in `abuse_reports`
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = abuse_reports)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AbuseReportRow {
    pub id: ReportId,
    pub reporter_uid: UserId,
    pub reported_uid: UserId,
    pub reason: String,
    pub message: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// DTO for inserting a new abuse report
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = abuse_reports)]
pub struct NewAbuseReportRow {
    pub reporter_uid: UserId,
    pub reported_uid: UserId,
    pub reason: String,
    pub message: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Note attached to a report, as stored in `abuse_report_notes`
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = abuse_report_notes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReportNoteRow {
    pub id: i32,
    pub report_id: ReportId,
    pub kind: String,
    pub author_uid: UserId,
    pub body: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = abuse_report_notes)]
pub struct NewReportNoteRow {
    pub report_id: ReportId,
    pub kind: String,
    pub author_uid: UserId,
    pub body: String,
    pub created_at: NaiveDateTime,
}

/// Validated input for a new report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAbuseReport {
    pub reporter_user_id: UserId,
    pub reported_user_id: UserId,
    pub reason: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportNote {
    pub id: i32,
    pub author_user_id: UserId,
    pub body: String,
    pub created_at: NaiveDateTime,
}

impl From<ReportNoteRow> for ReportNote {
    fn from(row: ReportNoteRow) -> Self {
        Self {
            id: row.id,
            author_user_id: row.author_uid,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

/// An abuse report together with its ordered admin and user notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbuseReport {
    pub id: ReportId,
    pub reporter_user_id: UserId,
    pub reported_user_id: UserId,
    pub reason: String,
    pub message: Option<String>,
    pub status: ReportStatus,
    pub admin_notes: Vec<ReportNote>,
    pub user_notes: Vec<ReportNote>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl AbuseReport {
    /// Assemble a report from its row and its notes (in id order)
    pub fn from_rows(row: AbuseReportRow, notes: Vec<ReportNoteRow>) -> Result<Self, UnknownStatus> {
        let status = row.status.parse()?;
        let mut admin_notes = Vec::new();
        let mut user_notes = Vec::new();
        for note in notes {
            if note.kind == NoteKind::Admin.as_str() {
                admin_notes.push(note.into());
            } else {
                user_notes.push(note.into());
            }
        }

        Ok(Self {
            id: row.id,
            reporter_user_id: row.reporter_uid,
            reported_user_id: row.reported_uid,
            reason: row.reason,
            message: row.message,
            status,
            admin_notes,
            user_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Administrative changes applied to a report in one step
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReportUpdate {
    pub status: Option<ReportStatus>,
    pub admin_note: Option<String>,
}
