use std::sync::RwLock;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RANGE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;
use url::Url;

use crate::auth::{AuthEvent, Session};
use crate::client::backend::{Backend, BackendError};
use crate::client::query::{DeleteRequest, Filter, InsertRequest, SelectRequest};
use crate::config::Settings;

/// Provider speaking the hosted service's REST conventions: PostgREST-style
/// row access, password-grant token issuance, and object storage.
///
/// Failure classification is structural (HTTP status plus the service's
/// error `code` field), never matching on human-readable messages.
pub struct RestBackend {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
    auth: RwLock<Option<AuthState>>,
    events: broadcast::Sender<AuthEvent>,
}

struct AuthState {
    access_token: String,
    session: Session,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

#[derive(Deserialize)]
struct AuthUser {
    id: uuid::Uuid,
    email: Option<String>,
}

impl RestBackend {
    pub fn new(settings: &Settings) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            http: reqwest::Client::new(),
            base: settings.base_url.clone(),
            anon_key: settings.anon_key.clone(),
            auth: RwLock::new(None),
            events,
        }
    }

    /// Password sign-in against the hosted auth endpoint. The token never
    /// leaves this provider; callers observe the resulting [`Session`].
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let mut url = self.join("auth/v1/token")?;
        url.set_query(Some("grant_type=password"));

        let resp = self
            .http
            .post(url)
            .headers(self.headers())
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }

        let token: TokenResponse = resp.json().await.map_err(|e| {
            BackendError::Protocol(format!("malformed token response: {e}"))
        })?;
        let session = Session {
            user_id: token.user.id,
            email: token.user.email,
        };
        *self.auth.write().expect("auth lock") = Some(AuthState {
            access_token: token.access_token,
            session: session.clone(),
        });
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<(), BackendError> {
        let url = self.join("auth/v1/logout")?;
        // Revoke best-effort; local state clears regardless.
        let _ = self.http.post(url).headers(self.headers()).send().await;
        *self.auth.write().expect("auth lock") = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    fn join(&self, path: &str) -> Result<Url, BackendError> {
        self.base
            .join(path)
            .map_err(|e| BackendError::Protocol(format!("bad request path {path:?}: {e}")))
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", v);
        }
        let token = self
            .auth
            .read()
            .expect("auth lock")
            .as_ref()
            .map(|a| a.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone());
        if let Ok(v) = HeaderValue::from_str(&format!("Bearer {token}")) {
            headers.insert(AUTHORIZATION, v);
        }
        headers
    }
}

fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

async fn error_from_response(resp: reqwest::Response) -> BackendError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    classify(status, &body)
}

fn classify(status: StatusCode, body: &str) -> BackendError {
    if status == StatusCode::UNAUTHORIZED {
        return BackendError::AuthExpired;
    }
    if status == StatusCode::CONFLICT {
        return BackendError::Conflict;
    }
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        // PostgREST surfaces the SQLSTATE; 23505 is unique_violation.
        if v.get("code").and_then(Value::as_str) == Some("23505") {
            return BackendError::Conflict;
        }
    }
    BackendError::Protocol(format!("{status}: {body}"))
}

fn classify_storage(status: StatusCode, bucket: &str, body: &str) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED => BackendError::AuthExpired,
        StatusCode::NOT_FOUND => BackendError::BucketMissing(bucket.to_string()),
        StatusCode::FORBIDDEN => BackendError::StorageDenied,
        _ => {
            // The storage API reports its own statusCode field on 400s.
            if let Ok(v) = serde_json::from_str::<Value>(body) {
                match v.get("statusCode").and_then(Value::as_str) {
                    Some("404") => return BackendError::BucketMissing(bucket.to_string()),
                    Some("403") => return BackendError::StorageDenied,
                    _ => {}
                }
            }
            BackendError::Protocol(format!("{status}: {body}"))
        }
    }
}

fn select_param(req: &SelectRequest) -> String {
    let mut parts: Vec<String> = if req.columns.is_empty() {
        vec!["*".to_string()]
    } else {
        req.columns.iter().map(|c| c.to_string()).collect()
    };
    for embed in &req.embeds {
        parts.push(format!("{}({})", embed.relation, embed.columns.join(",")));
    }
    parts.join(",")
}

fn filter_param(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq(column, value) => (column.to_string(), format!("eq.{}", render(value))),
        Filter::In(column, values) => {
            let list: Vec<String> = values.iter().map(render).collect();
            (column.to_string(), format!("in.({})", list.join(",")))
        }
    }
}

fn order_param(req: &SelectRequest) -> Option<String> {
    if req.order.is_empty() {
        return None;
    }
    let keys: Vec<String> = req
        .order
        .iter()
        .map(|o| {
            format!(
                "{}.{}",
                o.column,
                if o.descending { "desc" } else { "asc" }
            )
        })
        .collect();
    Some(keys.join(","))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait::async_trait]
impl Backend for RestBackend {
    async fn select(&self, req: SelectRequest) -> Result<Vec<Value>, BackendError> {
        let url = self.join(&format!("rest/v1/{}", req.table))?;

        let mut params = vec![("select".to_string(), select_param(&req))];
        params.extend(req.filters.iter().map(filter_param));
        if let Some(order) = order_param(&req) {
            params.push(("order".to_string(), order));
        }

        let mut headers = self.headers();
        if let Some(range) = req.range {
            let end = range.offset + range.limit.saturating_sub(1);
            headers.insert("Range-Unit", HeaderValue::from_static("items"));
            if let Ok(v) = HeaderValue::from_str(&format!("{}-{end}", range.offset)) {
                headers.insert(RANGE, v);
            }
        }

        let resp = self
            .http
            .get(url)
            .query(&params)
            .headers(headers)
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        resp.json()
            .await
            .map_err(|e| BackendError::Protocol(format!("malformed row set: {e}")))
    }

    async fn insert(&self, req: InsertRequest) -> Result<Vec<Value>, BackendError> {
        let url = self.join(&format!("rest/v1/{}", req.table))?;

        let mut headers = self.headers();
        let prefer = if req.upsert {
            "return=representation,resolution=merge-duplicates"
        } else {
            "return=representation"
        };
        headers.insert("Prefer", HeaderValue::from_static(prefer));

        let resp = self
            .http
            .post(url)
            .headers(headers)
            .json(&req.row)
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        resp.json()
            .await
            .map_err(|e| BackendError::Protocol(format!("malformed created-row set: {e}")))
    }

    async fn delete(&self, req: DeleteRequest) -> Result<u64, BackendError> {
        let url = self.join(&format!("rest/v1/{}", req.table))?;
        let params: Vec<(String, String)> = req.filters.iter().map(filter_param).collect();

        let mut headers = self.headers();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let resp = self
            .http
            .delete(url)
            .query(&params)
            .headers(headers)
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }
        let rows: Vec<Value> = resp
            .json()
            .await
            .map_err(|e| BackendError::Protocol(format!("malformed deleted-row set: {e}")))?;
        Ok(rows.len() as u64)
    }

    async fn session(&self) -> Option<Session> {
        self.auth
            .read()
            .expect("auth lock")
            .as_ref()
            .map(|a| a.session.clone())
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendError> {
        let url = self.join(&format!("storage/v1/object/{bucket}/{key}"))?;

        let mut headers = self.headers();
        if let Ok(v) = HeaderValue::from_str(content_type) {
            headers.insert(CONTENT_TYPE, v);
        }

        let resp = self
            .http
            .post(url)
            .headers(headers)
            .body(bytes)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(classify_storage(status, bucket, &body))
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}storage/v1/object/public/{bucket}/{key}", self.base)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn select_param_renders_columns_and_embeds() {
        let req = SelectRequest::new("posts")
            .columns(&["id", "user_id"])
            .embed("profiles", &["id", "username"])
            .embed("likes", &["user_id"]);
        assert_eq!(select_param(&req), "id,user_id,profiles(id,username),likes(user_id)");
    }

    #[test]
    fn select_param_defaults_to_star() {
        assert_eq!(select_param(&SelectRequest::new("posts")), "*");
    }

    #[test]
    fn filters_render_postgrest_operators() {
        let (k, v) = filter_param(&Filter::Eq("user_id", json!("u1")));
        assert_eq!((k.as_str(), v.as_str()), ("user_id", "eq.u1"));

        let (k, v) = filter_param(&Filter::In("user_id", vec![json!("a"), json!("b")]));
        assert_eq!((k.as_str(), v.as_str()), ("user_id", "in.(a,b)"));
    }

    #[test]
    fn order_renders_multi_key() {
        let req = SelectRequest::new("posts").order_desc("created_at").order_desc("id");
        assert_eq!(order_param(&req).as_deref(), Some("created_at.desc,id.desc"));
    }

    #[test]
    fn unique_violation_code_maps_to_conflict() {
        let err = classify(
            StatusCode::CONFLICT,
            r#"{"code":"23505","message":"duplicate key value"}"#,
        );
        assert!(matches!(err, BackendError::Conflict));

        let err = classify(StatusCode::BAD_REQUEST, r#"{"code":"23505"}"#);
        assert!(matches!(err, BackendError::Conflict));
    }

    #[test]
    fn storage_statuses_map_to_categories() {
        assert!(matches!(
            classify_storage(StatusCode::NOT_FOUND, "images", ""),
            BackendError::BucketMissing(_)
        ));
        assert!(matches!(
            classify_storage(StatusCode::BAD_REQUEST, "images", r#"{"statusCode":"404"}"#),
            BackendError::BucketMissing(_)
        ));
        assert!(matches!(
            classify_storage(StatusCode::FORBIDDEN, "images", ""),
            BackendError::StorageDenied
        ));
        assert!(matches!(
            classify_storage(StatusCode::UNAUTHORIZED, "images", ""),
            BackendError::AuthExpired
        ));
    }
}
