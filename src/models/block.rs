// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::UserId;
use crate::schema::abuse_blocks;

/// Block model - a user hiding another user
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = abuse_blocks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BlockRecord {
    pub id: i32,
    #[diesel(column_name = blocker_uid)]
    pub blocker_user_id: UserId,
    #[diesel(column_name = blocked_uid)]
    pub blocked_user_id: UserId,
    pub created_at: NaiveDateTime,
}

/// DTO for inserting a new block
#[derive(Debug, Insertable)]
#[diesel(table_name = abuse_blocks)]
pub struct NewBlockRecord {
    #[diesel(column_name = blocker_uid)]
    pub blocker_user_id: UserId,
    #[diesel(column_name = blocked_uid)]
    pub blocked_user_id: UserId,
    pub created_at: NaiveDateTime,
}

/// An ordered blocker/blocked pair, as supplied to bulk import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPair {
    pub blocker_user_id: UserId,
    pub blocked_user_id: UserId,
}

/// Both directions of blocking between a viewer and another user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockStatus {
    pub is_block_active: bool,
    pub blocked_by_you: bool,
    pub blocked_you: bool,
}
