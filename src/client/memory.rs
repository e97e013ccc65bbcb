use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::{AuthEvent, Session};
use crate::client::backend::{Backend, BackendError};
use crate::client::query::{DeleteRequest, Embed, InsertRequest, SelectRequest};

const COLLECTIONS: [&str; 6] = ["profiles", "posts", "likes", "comments", "follows", "reposts"];

/// In-process provider for tests and local development.
///
/// Emulates the hosted service's behavior at the contract boundary: the
/// same uniqueness constraints, embedded-relation resolution, and the
/// read-only `user_stats` aggregate the profile pages consume.
pub struct MemoryBackend {
    state: Mutex<State>,
    events: broadcast::Sender<AuthEvent>,
}

struct State {
    tables: HashMap<&'static str, Vec<Value>>,
    session: Option<Session>,
    buckets: Vec<String>,
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_buckets(&["images"])
    }

    pub fn with_buckets(buckets: &[&str]) -> Self {
        let (events, _) = broadcast::channel(32);
        let tables = COLLECTIONS.iter().map(|t| (*t, Vec::new())).collect();
        Self {
            state: Mutex::new(State {
                tables,
                session: None,
                buckets: buckets.iter().map(|b| b.to_string()).collect(),
                blobs: HashMap::new(),
            }),
            events,
        }
    }

    /// Establish a session for the given identity and announce it on the
    /// auth stream, the way the hosted service would after a sign-in.
    pub fn sign_in_as(&self, user_id: Uuid, email: &str) -> Session {
        let session = Session {
            user_id,
            email: Some(email.to_string()),
        };
        self.state.lock().expect("state lock").session = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        session
    }

    pub fn sign_out(&self) {
        self.state.lock().expect("state lock").session = None;
        let _ = self.events.send(AuthEvent::SignedOut);
    }

    fn conflict_key(table: &str, row: &Value) -> Option<Vec<Value>> {
        let key = |columns: &[&str]| -> Option<Vec<Value>> {
            columns.iter().map(|c| row.get(*c).cloned()).collect()
        };
        match table {
            "profiles" => key(&["id"]),
            "likes" => key(&["post_id", "user_id"]),
            "reposts" => key(&["original_post_id", "user_id"]),
            "follows" => key(&["follower_id", "following_id"]),
            _ => None,
        }
    }

    fn user_stats(state: &State) -> Vec<Value> {
        let profiles = state.tables.get("profiles").expect("profiles table");
        let posts = state.tables.get("posts").expect("posts table");
        let follows = state.tables.get("follows").expect("follows table");
        profiles
            .iter()
            .map(|p| {
                let id = p.get("id").cloned().unwrap_or(Value::Null);
                let count = |rows: &[Value], column: &str| -> i64 {
                    rows.iter().filter(|r| r.get(column) == Some(&id)).count() as i64
                };
                json!({
                    "id": id,
                    "username": p.get("username").cloned().unwrap_or(Value::Null),
                    "avatar_url": p.get("avatar_url").cloned().unwrap_or(Value::Null),
                    "bio": p.get("bio").cloned().unwrap_or(Value::Null),
                    "posts_count": count(posts, "user_id"),
                    "followers_count": count(follows, "following_id"),
                    "following_count": count(follows, "follower_id"),
                })
            })
            .collect()
    }

    fn attach_embeds(state: &State, table: &str, row: &mut Value, embeds: &[Embed]) {
        for embed in embeds {
            let value = match (table, embed.relation) {
                ("posts", "profiles") | ("comments", "profiles") => {
                    let user_id = row.get("user_id").cloned().unwrap_or(Value::Null);
                    state
                        .tables
                        .get("profiles")
                        .expect("profiles table")
                        .iter()
                        .find(|p| p.get("id") == Some(&user_id))
                        .map(|p| project(p.clone(), &embed.columns))
                        .unwrap_or(Value::Null)
                }
                ("posts", "likes") | ("posts", "comments") => {
                    let post_id = row.get("id").cloned().unwrap_or(Value::Null);
                    related(state, embed.relation, "post_id", &post_id, &embed.columns)
                }
                ("posts", "reposts") => {
                    let post_id = row.get("id").cloned().unwrap_or(Value::Null);
                    related(state, "reposts", "original_post_id", &post_id, &embed.columns)
                }
                _ => Value::Null,
            };
            row[embed.relation] = value;
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn related(state: &State, table: &str, fk: &str, parent_id: &Value, columns: &[&'static str]) -> Value {
    let rows: Vec<Value> = state
        .tables
        .get(table)
        .map(|rows| {
            rows.iter()
                .filter(|r| r.get(fk) == Some(parent_id))
                .map(|r| project(r.clone(), columns))
                .collect()
        })
        .unwrap_or_default();
    Value::Array(rows)
}

fn project(row: Value, columns: &[&'static str]) -> Value {
    if columns.is_empty() {
        return row;
    }
    let Value::Object(map) = row else { return row };
    Value::Object(
        map.into_iter()
            .filter(|(k, _)| columns.contains(&k.as_str()))
            .collect(),
    )
}

/// Timestamps serialize as RFC 3339 strings with varying fractional widths,
/// so order them as instants rather than lexically.
fn cmp_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (
                chrono::DateTime::parse_from_rfc3339(x),
                chrono::DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(tx), Ok(ty)) => tx.cmp(&ty),
                _ => x.cmp(y),
            }
        }
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait::async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, req: SelectRequest) -> Result<Vec<Value>, BackendError> {
        let state = self.state.lock().expect("state lock");

        let mut rows: Vec<Value> = if req.table == "user_stats" {
            Self::user_stats(&state)
        } else {
            state
                .tables
                .get(req.table)
                .ok_or_else(|| BackendError::Protocol(format!("unknown collection {:?}", req.table)))?
                .clone()
        };

        rows.retain(|row| req.filters.iter().all(|f| f.matches(row)));

        rows.sort_by(|a, b| {
            for order in &req.order {
                let mut ord = cmp_values(a.get(order.column), b.get(order.column));
                if order.descending {
                    ord = ord.reverse();
                }
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        if let Some(range) = req.range {
            rows = rows
                .into_iter()
                .skip(range.offset)
                .take(range.limit)
                .collect();
        }

        let rows = rows
            .into_iter()
            .map(|row| {
                let mut row = project(row, &req.columns);
                Self::attach_embeds(&state, req.table, &mut row, &req.embeds);
                row
            })
            .collect();
        Ok(rows)
    }

    async fn insert(&self, req: InsertRequest) -> Result<Vec<Value>, BackendError> {
        let mut state = self.state.lock().expect("state lock");

        let Value::Object(mut row) = req.row else {
            return Err(BackendError::Protocol("insert payload must be an object".to_string()));
        };

        // Server-side column defaults.
        if req.table != "profiles" && req.table != "follows" && !row.contains_key("id") {
            row.insert("id".to_string(), json!(Uuid::new_v4()));
        }
        if req.table == "profiles" {
            row.entry("updated_at".to_string())
                .or_insert_with(|| json!(Utc::now()));
        } else {
            row.entry("created_at".to_string())
                .or_insert_with(|| json!(Utc::now()));
        }
        let row = Value::Object(row);

        let table = state
            .tables
            .get_mut(req.table)
            .ok_or_else(|| BackendError::Protocol(format!("unknown collection {:?}", req.table)))?;

        if let Some(key) = Self::conflict_key(req.table, &row) {
            let existing = table
                .iter_mut()
                .find(|r| Self::conflict_key(req.table, r).as_ref() == Some(&key));
            if let Some(existing) = existing {
                if !req.upsert {
                    return Err(BackendError::Conflict);
                }
                if let (Value::Object(target), Value::Object(source)) = (&mut *existing, &row) {
                    for (k, v) in source {
                        target.insert(k.clone(), v.clone());
                    }
                }
                return Ok(vec![existing.clone()]);
            }
        }

        table.push(row.clone());
        Ok(vec![row])
    }

    async fn delete(&self, req: DeleteRequest) -> Result<u64, BackendError> {
        let mut state = self.state.lock().expect("state lock");
        let table = state
            .tables
            .get_mut(req.table)
            .ok_or_else(|| BackendError::Protocol(format!("unknown collection {:?}", req.table)))?;

        let before = table.len();
        table.retain(|row| !req.filters.iter().all(|f| f.matches(row)));
        Ok((before - table.len()) as u64)
    }

    async fn session(&self) -> Option<Session> {
        self.state.lock().expect("state lock").session.clone()
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().expect("state lock");
        if !state.buckets.iter().any(|b| b == bucket) {
            return Err(BackendError::BucketMissing(bucket.to_string()));
        }
        if state.session.is_none() {
            return Err(BackendError::StorageDenied);
        }
        state.blobs.insert(format!("{bucket}/{key}"), bytes);
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("memory://{bucket}/{key}")
    }
}
