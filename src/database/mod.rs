use diesel::prelude::*;
use diesel::sql_query;

pub mod models;
pub mod schema;

use crate::persistence::PersistenceError;

/// Open a connection and make sure the schema exists. One connection per
/// operation; sqlite serializes writers itself and the busy timeout keeps
/// concurrent tenants from surfacing spurious lock errors.
pub fn establish_connection(database_url: &str) -> Result<SqliteConnection, PersistenceError> {
    let mut conn = SqliteConnection::establish(database_url)?;
    sql_query("PRAGMA busy_timeout = 5000").execute(&mut conn)?;
    sql_query("PRAGMA foreign_keys = ON").execute(&mut conn)?;
    init_schema(&mut conn)?;
    Ok(conn)
}

fn init_schema(conn: &mut SqliteConnection) -> QueryResult<()> {
    sql_query(
        "CREATE TABLE IF NOT EXISTS queue_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            guild_id TEXT NOT NULL,
            url TEXT NOT NULL,
            title TEXT NOT NULL,
            duration INTEGER NOT NULL DEFAULT 0,
            requester_id TEXT,
            channel_id TEXT,
            position INTEGER NOT NULL,
            is_current BOOLEAN NOT NULL DEFAULT 0,
            saved_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(conn)?;
    sql_query(
        "CREATE INDEX IF NOT EXISTS idx_queue_snapshots_guild
            ON queue_snapshots (guild_id, position)",
    )
    .execute(conn)?;
    sql_query(
        "CREATE TABLE IF NOT EXISTS autoplaylist (
            url TEXT PRIMARY KEY NOT NULL,
            added_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(conn)?;
    Ok(())
}
