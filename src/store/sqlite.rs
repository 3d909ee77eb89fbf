use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

use super::{
    is_server_timestamp, migrations, Document, DocumentStore, Fields, Filter, Listener, Query,
    StoreError,
};

struct Db {
    conn: Connection,
    last_commit: DateTime<Utc>,
}

struct Inner {
    db: Mutex<Db>,
    changes: broadcast::Sender<String>,
}

/// SQLite-backed document store. Each document is one row holding its JSON
/// body; committed writes are announced on an in-process broadcast channel
/// carrying the collection name.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<Inner>,
}

impl SqliteStore {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("failed to open database")?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("failed to set database pragmas")?;

        migrations::run_migrations(&conn)?;

        let (changes, _) = broadcast::channel(256);

        Ok(Self {
            inner: Arc::new(Inner {
                db: Mutex::new(Db {
                    conn,
                    last_commit: DateTime::<Utc>::MIN_UTC,
                }),
                changes,
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Db>, StoreError> {
        self.inner.db.lock().map_err(|_| StoreError::Poisoned)
    }

    fn notify(&self, collection: &str) {
        // No receivers just means nobody is listening.
        let _ = self.inner.changes.send(collection.to_string());
    }

    /// Check and write under one lock hold, so the precondition still holds
    /// when the merged document is stored.
    fn merge_existing(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        precondition: Option<(&str, &Value)>,
    ) -> Result<Document, StoreError> {
        let merged = {
            let mut db = self.lock()?;
            let mut existing = db.load(collection, id)?.ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
            if let Some((field, expected)) = precondition {
                if existing.get(field) != Some(expected) {
                    return Err(StoreError::Conflict {
                        collection: collection.to_string(),
                        id: id.to_string(),
                        field: field.to_string(),
                    });
                }
            }
            existing.extend(fields);
            db.upsert(collection, id, &mut existing)?;
            existing
        };
        self.notify(collection);
        Ok(Document {
            id: id.to_string(),
            fields: merged,
        })
    }

    fn read(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let (sql, values) = compile_query(query)?;
        let db = self.lock()?;
        let mut stmt = db.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut docs = vec![];
        for row in rows {
            let (id, data) = row?;
            docs.push(Document {
                id,
                fields: serde_json::from_str(&data)?,
            });
        }
        Ok(docs)
    }
}

impl Db {
    /// Commit times are strictly increasing at microsecond resolution, so two
    /// writes never share a timestamp.
    fn commit_time(&mut self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let at = if now > self.last_commit {
            now
        } else {
            self.last_commit + Duration::microseconds(1)
        };
        self.last_commit = at;
        at
    }

    fn load(&self, collection: &str, id: &str) -> Result<Option<Fields>, StoreError> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    fn upsert(&mut self, collection: &str, id: &str, fields: &mut Fields) -> Result<(), StoreError> {
        let at = self.commit_time();
        let stamp = format_time(&at);
        resolve_server_timestamps(fields, &stamp);
        let data = serde_json::to_string(fields)?;

        self.conn.execute(
            "INSERT INTO documents (collection, id, data, create_time, update_time)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(collection, id) DO UPDATE SET
               data = excluded.data,
               update_time = excluded.update_time",
            params![collection, id, data, stamp],
        )?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn add(&self, collection: &str, mut fields: Fields) -> Result<Document, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        {
            let mut db = self.lock()?;
            db.upsert(collection, &id, &mut fields)?;
        }
        self.notify(collection);
        Ok(Document { id, fields })
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        merge: bool,
    ) -> Result<Document, StoreError> {
        let merged = {
            let mut db = self.lock()?;
            let mut merged = match (merge, db.load(collection, id)?) {
                (true, Some(existing)) => existing,
                _ => Fields::new(),
            };
            merged.extend(fields);
            db.upsert(collection, id, &mut merged)?;
            merged
        };
        self.notify(collection);
        Ok(Document {
            id: id.to_string(),
            fields: merged,
        })
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let db = self.lock()?;
        Ok(db.load(collection, id)?.map(|fields| Document {
            id: id.to_string(),
            fields,
        }))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<Document, StoreError> {
        self.merge_existing(collection, id, fields, None)
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &Value,
        fields: Fields,
    ) -> Result<Document, StoreError> {
        self.merge_existing(collection, id, fields, Some((field, expected)))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.read(query)
    }

    fn listen(&self, query: Query) -> Listener {
        let (tx, rx) = mpsc::unbounded_channel();
        // Subscribe before the first read so no write can slip in between.
        let mut changes = self.inner.changes.subscribe();
        let store = self.clone();

        let task = tokio::spawn(async move {
            loop {
                let snapshot = store.read(&query);
                let failed = snapshot.is_err();
                if tx.send(snapshot).is_err() || failed {
                    return;
                }

                loop {
                    match changes.recv().await {
                        Ok(collection) if collection == query.collection => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, collection = %query.collection, "listener lagged, re-reading");
                            break;
                        }
                        Err(RecvError::Closed) => return,
                    }
                }

                // Coalesce writes that landed while we were waiting; the next
                // read sees all of them.
                while changes.try_recv().is_ok() {}
            }
        });

        Listener::new(rx, task)
    }
}

fn format_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn resolve_server_timestamps(fields: &mut Fields, stamp: &str) {
    for value in fields.values_mut() {
        if is_server_timestamp(value) {
            *value = Value::String(stamp.to_string());
        }
    }
}

fn json_path(field: &str) -> Result<SqlValue, StoreError> {
    let valid = !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StoreError::Malformed(format!("invalid field name: {field:?}")));
    }
    Ok(SqlValue::Text(format!("$.{field}")))
}

/// JSON scalars as SQLite sees them through `json_extract` / `json_each`.
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn compile_query(query: &Query) -> Result<(String, Vec<SqlValue>), StoreError> {
    let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?1");
    let mut values = vec![SqlValue::Text(query.collection.clone())];

    for filter in &query.filters {
        let (field, value, clause) = match filter {
            Filter::Eq { field, value } => (field, value, "json_extract(data, ?{p}) IS ?{v}"),
            Filter::ArrayContains { field, value } => (
                field,
                value,
                "EXISTS (SELECT 1 FROM json_each(data, ?{p}) WHERE json_each.value IS ?{v})",
            ),
        };
        values.push(json_path(field)?);
        let p = values.len();
        values.push(to_sql_value(value));
        let v = values.len();

        sql.push_str(" AND ");
        sql.push_str(
            &clause
                .replace("{p}", &p.to_string())
                .replace("{v}", &v.to_string()),
        );
    }

    sql.push_str(" ORDER BY rowid");
    Ok((sql, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::server_timestamp;
    use serde_json::json;

    fn store() -> SqliteStore {
        SqliteStore::open(":memory:").unwrap()
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_add_assigns_id_and_resolves_timestamp() {
        let store = store();
        let doc = store
            .add("bookings", fields(json!({"status": "pending", "createdAt": server_timestamp()})))
            .await
            .unwrap();

        assert!(!doc.id.is_empty());
        let created = doc.fields["createdAt"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(created).is_ok());

        let loaded = store.get("bookings", &doc.id).await.unwrap().unwrap();
        assert_eq!(loaded, doc);
    }

    #[tokio::test]
    async fn test_commit_times_strictly_increase() {
        let store = store();
        let mut stamps = vec![];
        for _ in 0..20 {
            let doc = store
                .add("c", fields(json!({"at": server_timestamp()})))
                .await
                .unwrap();
            stamps.push(doc.fields["at"].as_str().unwrap().to_string());
        }
        for pair in stamps.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = store();
        let err = store
            .update("bookings", "nope", fields(json!({"status": "accepted"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(store.get("bookings", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = store();
        let doc = store
            .add("bookings", fields(json!({"status": "pending", "servicePrice": 500})))
            .await
            .unwrap();
        let updated = store
            .update("bookings", &doc.id, fields(json!({"status": "accepted"})))
            .await
            .unwrap();
        assert_eq!(updated.fields["status"], "accepted");
        assert_eq!(updated.fields["servicePrice"], 500);
    }

    #[tokio::test]
    async fn test_update_if_checks_field_under_lock() {
        let store = store();
        let doc = store
            .add("bookings", fields(json!({"status": "in_progress"})))
            .await
            .unwrap();

        let done = store
            .update_if(
                "bookings",
                &doc.id,
                "status",
                &json!("in_progress"),
                fields(json!({"status": "completed"})),
            )
            .await
            .unwrap();
        assert_eq!(done.fields["status"], "completed");

        let err = store
            .update_if(
                "bookings",
                &doc.id,
                "status",
                &json!("in_progress"),
                fields(json!({"status": "cancelled"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref field, .. } if field == "status"));

        let stored = store.get("bookings", &doc.id).await.unwrap().unwrap();
        assert_eq!(stored.fields["status"], "completed");
    }

    #[tokio::test]
    async fn test_set_with_and_without_merge() {
        let store = store();
        store
            .set("user", "u1", fields(json!({"email": "a@b.c", "role": "customer"})), false)
            .await
            .unwrap();
        let merged = store
            .set("user", "u1", fields(json!({"displayName": "Ann"})), true)
            .await
            .unwrap();
        assert_eq!(merged.fields["email"], "a@b.c");
        assert_eq!(merged.fields["displayName"], "Ann");

        let replaced = store
            .set("user", "u1", fields(json!({"displayName": "Bo"})), false)
            .await
            .unwrap();
        assert!(replaced.fields.get("email").is_none());
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = store();
        store
            .add("services", fields(json!({"name": "AC repair", "active": true})))
            .await
            .unwrap();
        store
            .add("services", fields(json!({"name": "Car wash", "active": false})))
            .await
            .unwrap();
        store
            .add("partners", fields(json!({"name": "Raj", "services": ["s1", "s2"]})))
            .await
            .unwrap();
        store
            .add("partners", fields(json!({"name": "Mei", "services": ["s3"]})))
            .await
            .unwrap();

        let active = store
            .query(&Query::collection("services").where_eq("active", true))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].fields["name"], "AC repair");

        let s2 = store
            .query(&Query::collection("partners").where_array_contains("services", "s2"))
            .await
            .unwrap();
        assert_eq!(s2.len(), 1);
        assert_eq!(s2[0].fields["name"], "Raj");

        let all = store.query(&Query::collection("partners")).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].fields["name"], "Raj");
    }

    #[tokio::test]
    async fn test_query_rejects_bad_field_name() {
        let store = store();
        let err = store
            .query(&Query::collection("services").where_eq("a') OR 1=1 --", true))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_listen_initial_and_change_snapshots() {
        let store = store();
        store
            .add("bookings", fields(json!({"customerId": "c1"})))
            .await
            .unwrap();

        let mut listener = store.listen(Query::collection("bookings").where_eq("customerId", "c1"));
        let initial = listener.next().await.unwrap().unwrap();
        assert_eq!(initial.len(), 1);

        store
            .add("bookings", fields(json!({"customerId": "c1"})))
            .await
            .unwrap();
        let next = listener.next().await.unwrap().unwrap();
        assert_eq!(next.len(), 2);
    }
}
