// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Capability, UserId};
use crate::store::CapabilityEvaluator;

/// Capability checks on top of the injected evaluator
#[derive(Clone)]
pub struct Permissions {
    evaluator: Arc<dyn CapabilityEvaluator>,
}

impl Permissions {
    pub fn new(evaluator: Arc<dyn CapabilityEvaluator>) -> Self {
        Self { evaluator }
    }

    pub async fn has(&self, actor: UserId, capability: Capability) -> ServiceResult<bool> {
        Ok(self.evaluator.has_capability(actor, capability).await?)
    }

    pub async fn is_admin(&self, actor: UserId) -> ServiceResult<bool> {
        self.has(actor, Capability::AdministerAbuseReports).await
    }

    /// Fail with `Forbidden` unless the actor holds the capability
    pub async fn require(&self, actor: UserId, capability: Capability) -> ServiceResult<()> {
        if self.has(actor, capability).await? {
            Ok(())
        } else {
            Err(ServiceError::forbidden(format!(
                "You need the \"{}\" permission for this action.",
                capability
            )))
        }
    }
}
