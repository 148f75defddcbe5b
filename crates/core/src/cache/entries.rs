//! Cache entry operations.
//!
//! Entries map a request identity to a response snapshot inside one
//! generation. Writes are last-write-wins upserts; a write into a
//! generation that does not exist is rejected by the foreign key.

use super::connection::CacheDb;
use crate::{Error, RequestIdentity, ResponseSnapshot};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Listing row for a cached entry, without the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntrySummary {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub stored_at: String,
    pub size: u64,
}

pub(crate) fn upsert(
    conn: &rusqlite::Connection, generation: &str, identity: &RequestIdentity, snapshot: &ResponseSnapshot,
    stored_at: &str,
) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&snapshot.headers)?;
    conn.execute(
        "INSERT INTO entries (
            generation, key_hash, method, url, status_code, status_text, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(generation, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status_code = excluded.status_code,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation,
            identity.key(),
            &identity.method,
            &identity.url,
            snapshot.status,
            &snapshot.status_text,
            headers_json,
            &snapshot.body,
            stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Store a response snapshot under `identity` in `generation`.
    ///
    /// Overwrites any previous entry for the same identity. Fails if the
    /// generation does not exist.
    pub async fn put_entry(
        &self, generation: &str, identity: &RequestIdentity, snapshot: &ResponseSnapshot,
    ) -> Result<(), Error> {
        let generation = generation.to_string();
        let identity = identity.clone();
        let snapshot = snapshot.clone();
        let stored_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> { upsert(conn, &generation, &identity, &snapshot, &stored_at) })
            .await
            .map_err(Error::from)
    }

    /// Look up the snapshot stored under `identity` in `generation`.
    ///
    /// Returns None on a miss, including when the generation is gone.
    pub async fn match_entry(
        &self, generation: &str, identity: &RequestIdentity,
    ) -> Result<Option<ResponseSnapshot>, Error> {
        let generation = generation.to_string();
        let key_hash = identity.key();
        self.conn
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status_code, status_text, headers_json, body
                     FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![generation, key_hash], |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                });

                match result {
                    Ok((status, status_text, headers_json, body)) => {
                        let headers = serde_json::from_str(&headers_json)?;
                        Ok(Some(ResponseSnapshot { status, status_text, headers, body }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in `generation`.
    pub async fn entry_count(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Entries of `generation` ordered by URL, without bodies.
    pub async fn list_entries(&self, generation: &str) -> Result<Vec<EntrySummary>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntrySummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status_code, stored_at, LENGTH(body)
                     FROM entries WHERE generation = ?1
                     ORDER BY url ASC, method ASC",
                )?;
                let rows = stmt
                    .query_map(params![generation], |row| {
                        Ok(EntrySummary {
                            method: row.get(0)?,
                            url: row.get(1)?,
                            status: row.get(2)?,
                            stored_at: row.get(3)?,
                            size: row.get::<_, i64>(4)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)
    }
}
