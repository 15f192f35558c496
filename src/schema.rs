// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

// Import diesel table macros
use diesel::allow_tables_to_appear_in_same_query;
use diesel::joinable;
use diesel::table;

table! {
    users (id) {
        id -> Integer,
        account_name -> Varchar,
        created_at -> Timestamp,
    }
}

table! {
    user_capabilities (user_id, capability) {
        user_id -> Integer,
        capability -> Varchar,
    }
}

table! {
    private_gallery_members (owner_uid, member_uid) {
        owner_uid -> Integer,
        member_uid -> Integer,
        added_at -> Timestamp,
    }
}

table! {
    abuse_blocks (id) {
        id -> Integer,
        blocker_uid -> Integer,
        blocked_uid -> Integer,
        created_at -> Timestamp,
    }
}

table! {
    abuse_reports (id) {
        id -> Integer,
        reporter_uid -> Integer,
        reported_uid -> Integer,
        reason -> Varchar,
        message -> Nullable<Text>,
        status -> Varchar,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    abuse_report_notes (id) {
        id -> Integer,
        report_id -> Integer,
        kind -> Varchar,
        author_uid -> Integer,
        body -> Text,
        created_at -> Timestamp,
    }
}

joinable!(abuse_report_notes -> abuse_reports (report_id));
joinable!(user_capabilities -> users (user_id));

allow_tables_to_appear_in_same_query!(
    users,
    user_capabilities,
    private_gallery_members,
    abuse_blocks,
    abuse_reports,
    abuse_report_notes,
);
