// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Abuse report lifecycle.
//!
//! Reports are filed by a user against someone they currently block and start
//! as `new`. Administrators (capability "administer abuse reports") can read,
//! annotate, move and delete any report. A reporter can always read their own
//! report and can reply only while it is `waiting_user`, which moves it to
//! `user_replied`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::block_checker::BlockChecker;
use super::notice::Notice;
use super::notification::ReportNotifier;
use super::permissions::Permissions;
use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::models::{
    AbuseReport, Capability, NewAbuseReport, ReportId, ReportStatus, ReportUpdate, UserAccount,
    UserId, REASON_MAX_LENGTH,
};
use crate::store::{AbuseReportStore, ReportFilter, UserDirectory};

pub const NOTIFICATION_FAILED_MESSAGE: &str =
    "There was a problem sending the abuse report notification email.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOperation {
    View,
    Reply,
    Administer,
    Delete,
}

/// Who may do what with a report
pub struct ReportAccess;

impl ReportAccess {
    pub fn allows(
        is_admin: bool,
        actor: UserId,
        report: &AbuseReport,
        operation: ReportOperation,
    ) -> bool {
        let is_reporter = report.reporter_user_id == actor;
        match operation {
            // User notes belong to the reporter; administrators annotate through updates
            ReportOperation::Reply => is_reporter && report.status.accepts_user_reply(),
            ReportOperation::View => is_admin || is_reporter,
            ReportOperation::Administer | ReportOperation::Delete => is_admin,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileReport {
    pub reason: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// What the report form needs before anything is submitted
#[derive(Debug, Clone, Serialize)]
pub struct ReportFormContext {
    pub reported_user: UserAccount,
    pub title: String,
    pub may_report: bool,
    pub reason_max_length: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportActionResponse {
    pub report: AbuseReport,
    pub notice: Notice,
    /// Degraded side effects; the action itself succeeded
    pub warnings: Vec<Notice>,
}

#[derive(Clone)]
pub struct AbuseWorkflow {
    reports: Arc<dyn AbuseReportStore>,
    users: Arc<dyn UserDirectory>,
    checker: BlockChecker,
    permissions: Permissions,
    notifier: ReportNotifier,
}

impl AbuseWorkflow {
    pub fn new(
        reports: Arc<dyn AbuseReportStore>,
        users: Arc<dyn UserDirectory>,
        checker: BlockChecker,
        permissions: Permissions,
        notifier: ReportNotifier,
    ) -> Self {
        Self {
            reports,
            users,
            checker,
            permissions,
            notifier,
        }
    }

    async fn require_user(&self, id: UserId) -> ServiceResult<UserAccount> {
        self.users
            .find_user(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("User {} does not exist.", id)))
    }

    async fn require_report(&self, id: ReportId) -> ServiceResult<AbuseReport> {
        self.reports
            .find_report(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Abuse report {} does not exist.", id)))
    }

    /// Load a report and check the actor may perform `operation` on it
    async fn authorized_report(
        &self,
        actor: UserId,
        id: ReportId,
        operation: ReportOperation,
    ) -> ServiceResult<AbuseReport> {
        let report = self.require_report(id).await?;
        let is_admin = self.permissions.is_admin(actor).await?;
        if !ReportAccess::allows(is_admin, actor, &report, operation) {
            let message = match operation {
                ReportOperation::Reply => {
                    "You do not have permission to reply to this report at this time."
                }
                _ => "You do not have access to this report.",
            };
            return Err(ServiceError::forbidden(message));
        }
        Ok(report)
    }

    /// Reason a report cannot be filed right now, if any
    async fn filing_blocker(&self, actor: UserId, target: UserId) -> ServiceResult<Option<&'static str>> {
        if !self.permissions.has(actor, Capability::ReportAbuse).await? {
            return Ok(Some("You need the \"report abuse\" permission to file a report."));
        }
        if actor == target {
            return Ok(Some("You cannot report yourself."));
        }
        if !self.checker.is_user_blocked_by(target, actor).await? {
            return Ok(Some("You can only report users you have blocked."));
        }
        Ok(None)
    }

    pub async fn report_form(&self, actor: UserId, target_id: UserId) -> ServiceResult<ReportFormContext> {
        let reported_user = self.require_user(target_id).await?;
        let may_report = self.filing_blocker(actor, target_id).await?.is_none();

        Ok(ReportFormContext {
            title: format!("Report Abuse: {}", reported_user.account_name),
            reported_user,
            may_report,
            reason_max_length: REASON_MAX_LENGTH,
        })
    }

    /// File a new report against `target_id` and notify the site address
    pub async fn file_report(
        &self,
        actor: UserId,
        target_id: UserId,
        input: FileReport,
    ) -> ServiceResult<ReportActionResponse> {
        self.permissions.require(actor, Capability::ReportAbuse).await?;
        let reported = self.require_user(target_id).await?;
        let reporter = self.require_user(actor).await?;
        if actor == reported.id {
            return Err(ServiceError::forbidden("You cannot report yourself."));
        }

        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::validation("A reason is required."));
        }
        if reason.chars().count() > REASON_MAX_LENGTH {
            return Err(ServiceError::validation(format!(
                "The reason cannot be longer than {} characters.",
                REASON_MAX_LENGTH
            )));
        }
        let message = input
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        if let Some(refusal) = self.filing_blocker(actor, reported.id).await? {
            return Err(ServiceError::forbidden(refusal));
        }

        let report = self
            .reports
            .insert_report(NewAbuseReport {
                reporter_user_id: actor,
                reported_user_id: reported.id,
                reason: reason.to_string(),
                message,
            })
            .await?;
        metrics::record_report_event("filed");
        info!(
            "User {} filed abuse report {} against user {}",
            actor, report.id, reported.id
        );

        let mut warnings = Vec::new();
        if self
            .notifier
            .notify_new_report(&report, &reporter, &reported)
            .await
            .is_err()
        {
            metrics::record_degraded("notification");
            warnings.push(Notice::warning("Notification", NOTIFICATION_FAILED_MESSAGE));
        }

        Ok(ReportActionResponse {
            notice: Notice::success(
                "Report submitted",
                format!(
                    "Your abuse report against {} has been submitted.",
                    reported.account_name
                ),
            ),
            report,
            warnings,
        })
    }

    pub async fn view_report(&self, actor: UserId, id: ReportId) -> ServiceResult<AbuseReport> {
        self.authorized_report(actor, id, ReportOperation::View).await
    }

    /// Administrators see every report, everyone else only their own
    pub async fn list_reports(
        &self,
        actor: UserId,
        status: Option<ReportStatus>,
    ) -> ServiceResult<Vec<AbuseReport>> {
        let reporter = if self.permissions.is_admin(actor).await? {
            None
        } else {
            Some(actor)
        };

        Ok(self
            .reports
            .list_reports(ReportFilter { reporter, status })
            .await?)
    }

    /// Reporter reply while the report waits on them
    pub async fn reply(
        &self,
        actor: UserId,
        id: ReportId,
        note: String,
    ) -> ServiceResult<ReportActionResponse> {
        self.authorized_report(actor, id, ReportOperation::Reply).await?;

        let note = note.trim();
        if note.is_empty() {
            return Err(ServiceError::validation("A reply is required."));
        }

        let report = self
            .reports
            .append_user_reply(id, actor, note.to_string())
            .await?
            .ok_or_else(|| {
                ServiceError::forbidden(
                    "You do not have permission to reply to this report at this time.",
                )
            })?;
        metrics::record_report_event("user_reply");
        info!("User {} replied to abuse report {}", actor, id);

        Ok(ReportActionResponse {
            report,
            notice: Notice::success("Reply added", "Your reply has been added."),
            warnings: Vec::new(),
        })
    }

    /// Administrative status change and/or note
    pub async fn update_report(
        &self,
        actor: UserId,
        id: ReportId,
        update: ReportUpdate,
    ) -> ServiceResult<ReportActionResponse> {
        let report = self
            .authorized_report(actor, id, ReportOperation::Administer)
            .await?;

        let admin_note = match update.admin_note {
            Some(note) if note.trim().is_empty() => {
                return Err(ServiceError::validation("An admin note cannot be empty."))
            }
            Some(note) => Some(note.trim().to_string()),
            None => None,
        };
        if update.status.is_none() && admin_note.is_none() {
            return Err(ServiceError::validation("Nothing to update."));
        }
        if let Some(next) = update.status {
            if !report.status.admin_can_move_to(next) {
                return Err(ServiceError::forbidden(format!(
                    "A report cannot move from {} to {}.",
                    report.status, next
                )));
            }
        }

        let updated = self
            .reports
            .apply_admin_update(
                id,
                actor,
                report.status,
                ReportUpdate {
                    status: update.status,
                    admin_note,
                },
            )
            .await?
            .ok_or_else(|| {
                ServiceError::forbidden("The report was changed by someone else; reload and try again.")
            })?;
        metrics::record_report_event("admin_update");
        info!(
            "Administrator {} updated abuse report {} ({} -> {})",
            actor, id, report.status, updated.status
        );

        Ok(ReportActionResponse {
            notice: Notice::success(
                "Report saved",
                format!("Abuse report #{} has been saved.", updated.id),
            ),
            report: updated,
            warnings: Vec::new(),
        })
    }

    pub async fn delete_report(&self, actor: UserId, id: ReportId) -> ServiceResult<Notice> {
        let report = self
            .authorized_report(actor, id, ReportOperation::Delete)
            .await?;

        if !self.reports.delete_report(report.id).await? {
            return Err(ServiceError::not_found(format!(
                "Abuse report {} does not exist.",
                id
            )));
        }
        metrics::record_report_event("deleted");
        info!("Administrator {} deleted abuse report {}", actor, id);

        Ok(Notice::success(
            "Report deleted",
            format!("Abuse report #{} has been deleted.", report.id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notification::{DisabledMailer, Mailer, OutgoingMail};
    use crate::store::{BlockStore, MemoryStore};
    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    const ALICE: UserId = 1;
    const BOB: UserId = 2;
    const ADMIN: UserId = 9;

    struct AcceptingMailer;

    #[async_trait]
    impl Mailer for AcceptingMailer {
        async fn send(&self, _mail: OutgoingMail) -> anyhow::Result<()> {
            Ok(())
        }
    }

    async fn setup_with(mailer: Arc<dyn Mailer>) -> (Arc<MemoryStore>, AbuseWorkflow) {
        let store = Arc::new(MemoryStore::new());
        store.add_user(ALICE, "alice").await;
        store.add_user(BOB, "bob").await;
        store.add_user(ADMIN, "moderator").await;
        store.grant(ALICE, Capability::ReportAbuse).await;
        store.grant(ADMIN, Capability::AdministerAbuseReports).await;
        store.insert_block(ALICE, BOB).await.unwrap();

        let workflow = AbuseWorkflow::new(
            store.clone(),
            store.clone(),
            BlockChecker::new(store.clone()),
            Permissions::new(store.clone()),
            ReportNotifier::new(mailer, "abuse@example.org"),
        );
        (store, workflow)
    }

    /// Report store whose reads race with another writer: every report handed
    /// out by `find_report` is moved to `moved_to` right after it is read.
    struct EditedAfterRead {
        inner: Arc<MemoryStore>,
        moved_to: ReportStatus,
    }

    #[async_trait]
    impl AbuseReportStore for EditedAfterRead {
        async fn insert_report(&self, report: NewAbuseReport) -> anyhow::Result<AbuseReport> {
            self.inner.insert_report(report).await
        }

        async fn find_report(&self, id: ReportId) -> anyhow::Result<Option<AbuseReport>> {
            let found = self.inner.find_report(id).await?;
            if found.is_some() {
                self.inner.force_status(id, self.moved_to).await?;
            }
            Ok(found)
        }

        async fn list_reports(&self, filter: ReportFilter) -> anyhow::Result<Vec<AbuseReport>> {
            self.inner.list_reports(filter).await
        }

        async fn append_user_reply(
            &self,
            id: ReportId,
            author: UserId,
            note: String,
        ) -> anyhow::Result<Option<AbuseReport>> {
            self.inner.append_user_reply(id, author, note).await
        }

        async fn apply_admin_update(
            &self,
            id: ReportId,
            author: UserId,
            expected: ReportStatus,
            update: ReportUpdate,
        ) -> anyhow::Result<Option<AbuseReport>> {
            self.inner.apply_admin_update(id, author, expected, update).await
        }

        async fn delete_report(&self, id: ReportId) -> anyhow::Result<bool> {
            self.inner.delete_report(id).await
        }
    }

    async fn racing_workflow(moved_to: ReportStatus) -> (Arc<MemoryStore>, AbuseWorkflow, ReportId) {
        let (store, workflow) = setup().await;
        let id = filed(&workflow).await;

        let racing = AbuseWorkflow::new(
            Arc::new(EditedAfterRead {
                inner: store.clone(),
                moved_to,
            }),
            store.clone(),
            BlockChecker::new(store.clone()),
            Permissions::new(store.clone()),
            ReportNotifier::new(Arc::new(AcceptingMailer), "abuse@example.org"),
        );
        (store, racing, id)
    }

    async fn setup() -> (Arc<MemoryStore>, AbuseWorkflow) {
        setup_with(Arc::new(AcceptingMailer)).await
    }

    fn input(reason: &str) -> FileReport {
        FileReport {
            reason: reason.to_string(),
            message: None,
        }
    }

    async fn filed(workflow: &AbuseWorkflow) -> ReportId {
        workflow
            .file_report(ALICE, BOB, input("harassment"))
            .await
            .unwrap()
            .report
            .id
    }

    #[tokio::test]
    async fn new_reports_start_as_new() {
        let (_store, workflow) = setup().await;

        let response = workflow
            .file_report(
                ALICE,
                BOB,
                FileReport {
                    reason: "  harassment ".into(),
                    message: Some("   ".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(response.report.status, ReportStatus::New);
        assert_eq!(response.report.reason, "harassment");
        assert_eq!(response.report.message, None);
        assert!(response.warnings.is_empty());
    }

    #[tokio::test]
    async fn filing_requires_an_active_block() {
        let (store, workflow) = setup().await;
        store.delete_blocks(ALICE, BOB).await.unwrap();

        let result = workflow.file_report(ALICE, BOB, input("spam")).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn filing_requires_report_permission() {
        let (store, workflow) = setup().await;
        store.insert_block(BOB, ALICE).await.unwrap();

        let result = workflow.file_report(BOB, ALICE, input("spam")).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn reason_is_validated() {
        let (_store, workflow) = setup().await;

        assert!(matches!(
            workflow.file_report(ALICE, BOB, input("   ")).await,
            Err(ServiceError::Validation(_))
        ));
        let long = "x".repeat(REASON_MAX_LENGTH + 1);
        assert!(matches!(
            workflow.file_report(ALICE, BOB, input(&long)).await,
            Err(ServiceError::Validation(_))
        ));
        assert_ok!(
            workflow
                .file_report(ALICE, BOB, input(&"x".repeat(REASON_MAX_LENGTH)))
                .await
        );
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let (_store, workflow) = setup().await;
        assert!(matches!(
            workflow.file_report(ALICE, 404, input("spam")).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_notification_keeps_the_report() {
        let (_store, workflow) = setup_with(Arc::new(DisabledMailer)).await;

        let response = workflow
            .file_report(ALICE, BOB, input("harassment"))
            .await
            .unwrap();

        assert_eq!(response.warnings.len(), 1);
        assert_eq!(response.warnings[0].message, NOTIFICATION_FAILED_MESSAGE);
        assert_ok!(workflow.view_report(ADMIN, response.report.id).await);
    }

    #[tokio::test]
    async fn reply_only_while_waiting_on_user() {
        let (store, workflow) = setup().await;
        let id = filed(&workflow).await;

        assert!(matches!(
            workflow.reply(ALICE, id, "more detail".into()).await,
            Err(ServiceError::Forbidden(_))
        ));

        store.force_status(id, ReportStatus::WaitingUser).await.unwrap();
        let response = workflow.reply(ALICE, id, "more detail".into()).await.unwrap();
        assert_eq!(response.report.status, ReportStatus::UserReplied);
        assert_eq!(response.report.user_notes.len(), 1);
        assert_eq!(response.report.user_notes[0].body, "more detail");

        assert!(matches!(
            workflow.reply(ALICE, id, "again".into()).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn only_the_reporter_may_reply() {
        let (store, workflow) = setup().await;
        let id = filed(&workflow).await;
        store.force_status(id, ReportStatus::WaitingUser).await.unwrap();

        assert!(matches!(
            workflow.reply(BOB, id, "not mine".into()).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            workflow.reply(ADMIN, id, "admin speaking".into()).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            workflow.reply(ALICE, 999, "missing".into()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            workflow.reply(ALICE, id, "  ".into()).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn admin_drives_review_loop() {
        let (_store, workflow) = setup().await;
        let id = filed(&workflow).await;

        let reviewed = workflow
            .update_report(
                ADMIN,
                id,
                ReportUpdate {
                    status: Some(ReportStatus::WaitingUser),
                    admin_note: Some("Can you share a screenshot?".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(reviewed.report.status, ReportStatus::WaitingUser);
        assert_eq!(reviewed.report.admin_notes.len(), 1);

        workflow.reply(ALICE, id, "attached".into()).await.unwrap();

        let resolved = workflow
            .update_report(
                ADMIN,
                id,
                ReportUpdate {
                    status: Some(ReportStatus::Resolved),
                    admin_note: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(resolved.report.status, ReportStatus::Resolved);

        assert!(matches!(
            workflow
                .update_report(
                    ADMIN,
                    id,
                    ReportUpdate {
                        status: Some(ReportStatus::Reviewed),
                        admin_note: None,
                    },
                )
                .await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn non_admins_cannot_administer() {
        let (_store, workflow) = setup().await;
        let id = filed(&workflow).await;

        let update = ReportUpdate {
            status: Some(ReportStatus::Resolved),
            admin_note: None,
        };
        assert_err!(workflow.update_report(ALICE, id, update).await);
        assert!(matches!(
            workflow.delete_report(ALICE, id).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn reporter_sees_own_reports_only() {
        let (store, workflow) = setup().await;
        let id = filed(&workflow).await;
        store.grant(BOB, Capability::ReportAbuse).await;
        store.insert_block(BOB, ALICE).await.unwrap();
        let other = workflow
            .file_report(BOB, ALICE, input("spam"))
            .await
            .unwrap()
            .report
            .id;

        assert_ok!(workflow.view_report(ALICE, id).await);
        assert!(matches!(
            workflow.view_report(ALICE, other).await,
            Err(ServiceError::Forbidden(_))
        ));

        let mine = workflow.list_reports(ALICE, None).await.unwrap();
        assert_eq!(mine.iter().map(|r| r.id).collect::<Vec<_>>(), vec![id]);
        let all = workflow.list_reports(ADMIN, None).await.unwrap();
        assert_eq!(all.len(), 2);
        let waiting = workflow
            .list_reports(ADMIN, Some(ReportStatus::WaitingUser))
            .await
            .unwrap();
        assert!(waiting.is_empty());
    }

    #[tokio::test]
    async fn admin_update_loses_to_concurrent_change() {
        let (store, workflow, id) = racing_workflow(ReportStatus::Resolved).await;

        let result = workflow
            .update_report(
                ADMIN,
                id,
                ReportUpdate {
                    status: Some(ReportStatus::Reviewed),
                    admin_note: Some("looking into it".into()),
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));

        let stored = store.find_report(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Resolved);
        assert!(stored.admin_notes.is_empty());
    }

    #[tokio::test]
    async fn reply_loses_to_concurrent_reply() {
        let (store, racing, id) = racing_workflow(ReportStatus::UserReplied).await;
        store.force_status(id, ReportStatus::WaitingUser).await.unwrap();

        let result = racing.reply(ALICE, id, "second reply".into()).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));

        let stored = store.find_report(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::UserReplied);
        assert!(stored.user_notes.is_empty());
    }

    #[tokio::test]
    async fn admin_deletes_reports() {
        let (_store, workflow) = setup().await;
        let id = filed(&workflow).await;

        workflow.delete_report(ADMIN, id).await.unwrap();
        assert!(matches!(
            workflow.view_report(ADMIN, id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn form_context_reflects_precondition() {
        let (store, workflow) = setup().await;

        let form = workflow.report_form(ALICE, BOB).await.unwrap();
        assert!(form.may_report);
        assert_eq!(form.title, "Report Abuse: bob");

        store.delete_blocks(ALICE, BOB).await.unwrap();
        assert!(!workflow.report_form(ALICE, BOB).await.unwrap().may_report);
    }

    #[test]
    fn access_rules() {
        let now = chrono::Utc::now().naive_utc();
        let mut report = AbuseReport {
            id: 1,
            reporter_user_id: ALICE,
            reported_user_id: BOB,
            reason: "spam".into(),
            message: None,
            status: ReportStatus::Reviewed,
            admin_notes: Vec::new(),
            user_notes: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        assert!(ReportAccess::allows(false, ALICE, &report, ReportOperation::View));
        assert!(!ReportAccess::allows(false, ALICE, &report, ReportOperation::Reply));
        assert!(!ReportAccess::allows(false, BOB, &report, ReportOperation::View));
        assert!(!ReportAccess::allows(false, ALICE, &report, ReportOperation::Delete));
        assert!(ReportAccess::allows(true, ADMIN, &report, ReportOperation::Delete));

        report.status = ReportStatus::WaitingUser;
        assert!(ReportAccess::allows(false, ALICE, &report, ReportOperation::Reply));
        assert!(!ReportAccess::allows(true, ADMIN, &report, ReportOperation::Reply));
        assert!(!ReportAccess::allows(false, BOB, &report, ReportOperation::Reply));
    }
}
