diesel::table! {
    queue_snapshots (id) {
        id -> Nullable<Integer>,
        guild_id -> Text,
        url -> Text,
        title -> Text,
        duration -> Integer,
        requester_id -> Nullable<Text>,
        channel_id -> Nullable<Text>,
        position -> Integer,
        is_current -> Bool,
        saved_at -> Timestamp,
    }
}

diesel::table! {
    autoplaylist (url) {
        url -> Text,
        added_at -> Timestamp,
    }
}

diesel::allow_tables_to_appear_in_same_query!(autoplaylist, queue_snapshots);
