//! HTTP-backed member source
//!
//! Thin reqwest client for a JSON paging API. Maps transport outcomes onto
//! the source error taxonomy and skips individual malformed member records
//! rather than failing the page.

use crate::error::SourceError;
use crate::member::Member;
use crate::source::{Credentials, MemberPage, MemberSource, PageToken, SessionState};
use crate::types::Relation;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// [`MemberSource`] over an HTTP JSON API.
///
/// Expected endpoints:
/// - `POST {base}/auth` with `{username, password}` -> `{token}`
/// - `GET  {base}/session` with bearer token -> 200/401
/// - `GET  {base}/members?relation=<r>[&page=<token>]` with bearer token ->
///   `{members: [{id, username, full_name}], next_page: <token>?}`
pub struct HttpMemberSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
}

#[derive(Deserialize)]
struct PageResponse {
    members: Vec<Value>,
    next_page: Option<String>,
}

impl HttpMemberSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpMemberSource {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn token(session: &SessionState) -> Result<String, SourceError> {
        String::from_utf8(session.0.clone())
            .map_err(|_| SourceError::Terminal("stored session is not a valid token".into()))
    }

    /// A member record with missing or mistyped fields is dropped with a
    /// warning; one bad record must not block the whole relation.
    fn parse_member(raw: &Value) -> Option<Member> {
        let id = raw.get("id")?.as_i64()?;
        let username = raw.get("username")?.as_str()?.to_string();
        let full_name = raw
            .get("full_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(Member {
            id,
            username,
            full_name,
        })
    }

    fn classify_status(status: StatusCode, context: &str) -> SourceError {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            SourceError::Terminal(format!("{}: {}", context, status))
        } else {
            SourceError::Transient(format!("{}: {}", context, status))
        }
    }
}

fn transport_error(context: &str, err: reqwest::Error) -> SourceError {
    SourceError::Transient(format!("{}: {}", context, err))
}

#[async_trait]
impl MemberSource for HttpMemberSource {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionState, SourceError> {
        let response = self
            .client
            .post(format!("{}/auth", self.base_url))
            .json(&serde_json::json!({
                "username": credentials.username,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(|e| transport_error("auth request", e))?;

        let status = response.status();
        if !status.is_success() {
            // Rejected credentials are terminal even though 401 normally
            // marks an expired session.
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    SourceError::Terminal(format!("credentials rejected: {}", status))
                }
                _ => SourceError::Transient(format!("auth failed: {}", status)),
            });
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| transport_error("auth response decode", e))?;
        Ok(SessionState(auth.token.into_bytes()))
    }

    async fn is_session_valid(&self, session: &SessionState) -> Result<bool, SourceError> {
        let token = Self::token(session)?;
        let response = self
            .client
            .get(format!("{}/session", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error("session check", e))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            status => Err(SourceError::Transient(format!("session check: {}", status))),
        }
    }

    async fn list_members(
        &self,
        session: &SessionState,
        relation: Relation,
        page: Option<PageToken>,
    ) -> Result<MemberPage, SourceError> {
        let token = Self::token(session)?;
        let mut request = self
            .client
            .get(format!("{}/members", self.base_url))
            .bearer_auth(token)
            .query(&[("relation", relation.key_fragment())]);
        if let Some(PageToken(ref cursor)) = page {
            request = request.query(&[("page", cursor.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error("members request", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::classify_status(status, "members request"));
        }

        let body: PageResponse = response.json().await.map_err(|e| SourceError::MalformedPage {
            relation,
            detail: e.to_string(),
        })?;

        let mut members = Vec::with_capacity(body.members.len());
        for raw in &body.members {
            match Self::parse_member(raw) {
                Some(member) => members.push(member),
                None => warn!(%relation, record = %raw, "skipping malformed member record"),
            }
        }

        Ok(MemberPage {
            members,
            next: body.next_page.map(PageToken),
        })
    }
}
