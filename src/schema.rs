// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

// Import diesel table macros
use diesel::table;
use diesel::allow_tables_to_appear_in_same_query;

table! {
    users (id) {
        id -> Int8,
        name -> Varchar,
        im_name -> Varchar,
        external_id -> Nullable<Varchar>,
        phone -> Nullable<Varchar>,
        avatar -> Varchar,
        profile_id -> Nullable<Int8>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    profiles (id) {
        id -> Int8,
        user_id -> Int8,
        name -> Varchar,
        im_name -> Varchar,
        avatar -> Varchar,
        avatar_file_id -> Nullable<Int8>,
        age -> Int4,
        gender -> Varchar,
        prompt -> Text,
        intro -> Text,
        custom -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    chat_sessions (id) {
        id -> Int8,
        name -> Varchar,
        user_id -> Int8,
        profile_id -> Nullable<Int8>,
        avatar -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    chat_messages (id) {
        id -> Int8,
        user_id -> Int8,
        session_id -> Int8,
        parent_id -> Nullable<Int8>,
        profile_id -> Nullable<Int8>,
        role -> Varchar,
        msg_type -> Varchar,
        content -> Text,
        tags -> Array<Text>,
        msg_at -> Timestamptz,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

// Key/value application config, versioned per client
table! {
    configs (id) {
        id -> Int8,
        config_key -> Varchar,
        value -> Text,
        app -> Varchar,
        platform -> Varchar,
        env -> Varchar,
        version -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    user_files (id) {
        id -> Int8,
        user_id -> Int8,
        original_name -> Varchar,
        file_size -> Int8,
        file_type -> Varchar,
        file_ext -> Varchar,
        storage_key -> Varchar,
        public_url -> Text,
        public_expire -> Nullable<Timestamptz>,
        file_hash -> Varchar,
        status -> Int2,
        usage_type -> Varchar,
        expires_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

allow_tables_to_appear_in_same_query!(
    users,
    profiles,
    chat_sessions,
    chat_messages,
    configs,
    user_files,
);
