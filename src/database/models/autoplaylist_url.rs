use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::schema::autoplaylist;

/// Shared autoplaylist source entry. Removal is durable: a URL deleted here
/// is never offered again, across restarts.
#[derive(Queryable, Selectable, Serialize, Deserialize, Debug)]
#[diesel(table_name = autoplaylist)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AutoplaylistUrl {
    pub url: String,
    pub added_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = autoplaylist)]
pub struct NewAutoplaylistUrl {
    pub url: String,
}

impl AutoplaylistUrl {
    pub fn load_all(conn: &mut SqliteConnection) -> QueryResult<Vec<String>> {
        autoplaylist::table
            .order(autoplaylist::added_at.asc())
            .select(autoplaylist::url)
            .load::<String>(conn)
    }

    /// Insert URLs that are not already present; returns how many were new.
    pub fn insert_missing(conn: &mut SqliteConnection, urls: &[String]) -> QueryResult<usize> {
        let mut inserted = 0;
        for url in urls {
            let row = NewAutoplaylistUrl { url: url.clone() };
            inserted += diesel::insert_into(autoplaylist::table)
                .values(&row)
                .on_conflict(autoplaylist::url)
                .do_nothing()
                .execute(conn)?;
        }
        Ok(inserted)
    }

    pub fn remove(conn: &mut SqliteConnection, url: &str) -> QueryResult<usize> {
        diesel::delete(autoplaylist::table)
            .filter(autoplaylist::url.eq(url))
            .execute(conn)
    }
}
