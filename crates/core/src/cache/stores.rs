//! SQLite implementation of [`CacheStorage`].
//!
//! Stores live in `caches`; entries in `cache_entries` reference their store
//! with `ON DELETE CASCADE`, so deleting a store is a single statement.

use super::CacheStorage;
use super::connection::CacheDb;
use crate::Error;
use crate::message::{RequestKey, Response, ResponseType};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Connection, OptionalExtension};

fn cache_id(conn: &Connection, name: &str) -> Result<i64, Error> {
    conn.query_row("SELECT id FROM caches WHERE name = ?1", params![name], |row| row.get(0))
        .optional()?
        .ok_or_else(|| Error::StoreNotFound(name.to_string()))
}

fn insert_entry(conn: &Connection, cache_id: i64, key: &RequestKey, response: &Response) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&response.headers)?;
    conn.execute(
        "INSERT INTO cache_entries (
            cache_id, key_hash, method, url, response_url, status, status_text,
            response_type, redirected, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(cache_id, key_hash) DO UPDATE SET
            response_url = excluded.response_url,
            status = excluded.status,
            status_text = excluded.status_text,
            response_type = excluded.response_type,
            redirected = excluded.redirected,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            cache_id,
            key.hash(),
            &key.method,
            &key.url,
            &response.url,
            response.status,
            &response.status_text,
            response.response_type.as_str(),
            response.redirected,
            headers_json,
            response.body.as_ref(),
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

#[async_trait::async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO caches (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
                    params![name, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn match_request(&self, name: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        let name = name.to_string();
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let row = conn
                    .query_row(
                        "SELECT e.response_url, e.status, e.status_text, e.response_type,
                                e.redirected, e.headers_json, e.body
                         FROM cache_entries e JOIN caches c ON c.id = e.cache_id
                         WHERE c.name = ?1 AND e.key_hash = ?2",
                        params![name, key_hash],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, u16>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, String>(3)?,
                                row.get::<_, bool>(4)?,
                                row.get::<_, String>(5)?,
                                row.get::<_, Vec<u8>>(6)?,
                            ))
                        },
                    )
                    .optional()?;

                let Some((url, status, status_text, response_type, redirected, headers_json, body)) = row else {
                    return Ok(None);
                };

                let response_type = ResponseType::parse(&response_type)
                    .ok_or_else(|| Error::CorruptEntry(format!("unknown response type {response_type}")))?;

                Ok(Some(Response {
                    url,
                    status,
                    status_text,
                    response_type,
                    redirected,
                    headers: serde_json::from_str(&headers_json)?,
                    body: body.into(),
                }))
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let name = name.to_string();
        let key = key.clone();
        let response = response.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let id = cache_id(conn, &name)?;
                insert_entry(conn, id, &key, &response)
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        let name = name.to_string();
        let entries = entries.to_vec();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let id = cache_id(&tx, &name)?;
                for (key, response) in &entries {
                    insert_entry(&tx, id, key, response)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let id = cache_id(conn, &name)?;
                let mut stmt =
                    conn.prepare("SELECT method, url FROM cache_entries WHERE cache_id = ?1 ORDER BY rowid ASC")?;
                let keys = stmt
                    .query_map(params![id], |row| Ok(RequestKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}
