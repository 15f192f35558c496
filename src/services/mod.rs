// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

pub mod abuse_workflow;
pub mod block_actions;
pub mod block_checker;
pub mod notice;
pub mod notification;
pub mod permissions;
pub mod visibility;

use std::sync::Arc;

pub use abuse_workflow::AbuseWorkflow;
pub use block_actions::BlockActions;
pub use block_checker::BlockChecker;
pub use notice::{Notice, NoticeLevel};
pub use notification::{DisabledMailer, Mailer, ReportNotifier, SmtpMailer};
pub use permissions::Permissions;
pub use visibility::VisibilityService;

use crate::store::{AbuseReportStore, BlockStore, CapabilityEvaluator, GalleryAccess, UserDirectory};

/// The wired-up services shared by every request
#[derive(Clone)]
pub struct AppServices {
    pub checker: BlockChecker,
    pub visibility: VisibilityService,
    pub block_actions: BlockActions,
    pub workflow: AbuseWorkflow,
}

impl AppServices {
    /// Wire every service over one backend that provides all storage and
    /// collaborator traits
    pub fn new<S>(store: Arc<S>, mailer: Arc<dyn Mailer>, site_address: impl Into<String>) -> Self
    where
        S: BlockStore
            + AbuseReportStore
            + UserDirectory
            + CapabilityEvaluator
            + GalleryAccess
            + 'static,
    {
        let checker = BlockChecker::new(store.clone());
        let permissions = Permissions::new(store.clone());
        let visibility = VisibilityService::new(checker.clone(), permissions.clone(), store.clone());
        let block_actions = BlockActions::new(
            store.clone(),
            store.clone(),
            store.clone(),
            permissions.clone(),
            visibility.clone(),
        );
        let workflow = AbuseWorkflow::new(
            store.clone(),
            store,
            checker.clone(),
            permissions,
            ReportNotifier::new(mailer, site_address),
        );

        Self {
            checker,
            visibility,
            block_actions,
            workflow,
        }
    }
}
