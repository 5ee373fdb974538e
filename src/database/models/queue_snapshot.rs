use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::schema::queue_snapshots;

/// One row of a guild's persisted queue. `is_current` marks the playback
/// cursor; everything else is ordered by `position`.
#[derive(Queryable, Selectable, Serialize, Deserialize, Debug)]
#[diesel(table_name = queue_snapshots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QueueSnapshotRow {
    pub id: Option<i32>,
    pub guild_id: String,
    pub url: String,
    pub title: String,
    pub duration: i32,
    pub requester_id: Option<String>,
    pub channel_id: Option<String>,
    pub position: i32,
    pub is_current: bool,
    pub saved_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = queue_snapshots)]
pub struct NewQueueSnapshotRow {
    pub guild_id: String,
    pub url: String,
    pub title: String,
    pub duration: i32,
    pub requester_id: Option<String>,
    pub channel_id: Option<String>,
    pub position: i32,
    pub is_current: bool,
}

impl QueueSnapshotRow {
    /// Atomically replace a guild's snapshot: delete-then-insert inside one
    /// transaction so readers never observe a half-written queue.
    pub fn replace_guild_snapshot(
        conn: &mut SqliteConnection,
        guild_id: &str,
        rows: &[NewQueueSnapshotRow],
    ) -> QueryResult<()> {
        conn.transaction(|conn| {
            diesel::delete(queue_snapshots::table)
                .filter(queue_snapshots::guild_id.eq(guild_id))
                .execute(conn)?;
            diesel::insert_into(queue_snapshots::table)
                .values(rows)
                .execute(conn)?;
            Ok(())
        })
    }

    pub fn load_guild_snapshot(
        conn: &mut SqliteConnection,
        guild_id: &str,
    ) -> QueryResult<Vec<QueueSnapshotRow>> {
        queue_snapshots::table
            .filter(queue_snapshots::guild_id.eq(guild_id))
            .order(queue_snapshots::position.asc())
            .select(QueueSnapshotRow::as_select())
            .load::<QueueSnapshotRow>(conn)
    }

    pub fn clear_guild_snapshot(conn: &mut SqliteConnection, guild_id: &str) -> QueryResult<usize> {
        diesel::delete(queue_snapshots::table)
            .filter(queue_snapshots::guild_id.eq(guild_id))
            .execute(conn)
    }
}
