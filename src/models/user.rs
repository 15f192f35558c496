// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::UserId;
use crate::schema::users;

/// Account as seen through the user directory
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserAccount {
    pub id: UserId,
    pub account_name: String,
}

/// Named permission grants consulted by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "block users")]
    BlockUsers,
    #[serde(rename = "report abuse")]
    ReportAbuse,
    #[serde(rename = "administer abuse reports")]
    AdministerAbuseReports,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::BlockUsers => "block users",
            Capability::ReportAbuse => "report abuse",
            Capability::AdministerAbuseReports => "administer abuse reports",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
