//! PostgREST client for the hosted database.
//!
//! Tables live under `{base}/rest/v1/{table}`, RPCs under
//! `{base}/rest/v1/rpc/{name}`. Every request carries the project API key;
//! the bearer token is the user's access token when one is configured.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use url::Url;

use super::{IntervalRecord, LeaderboardEntry, RemoteStore, TaskSessionStats, UserTotal};
use crate::error::RemoteError;
use crate::settings::UserSettings;
use crate::tasks::TaskRow;

pub struct RestStore {
    base: Url,
    api_key: String,
    access_token: Option<String>,
    http: Client,
}

#[derive(Serialize)]
struct SettingsRow<'a> {
    id: &'a str,
    #[serde(flatten)]
    settings: &'a UserSettings,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, RemoteError> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            base: Url::parse(&base)?,
            api_key: api_key.to_string(),
            access_token: None,
            http: Client::new(),
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn table(&self, name: &str) -> Result<Url, RemoteError> {
        Ok(self.base.join(&format!("rest/v1/{name}"))?)
    }

    fn rpc(&self, name: &str) -> Result<Url, RemoteError> {
        Ok(self.base.join(&format!("rest/v1/rpc/{name}"))?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn check(resp: Response, operation: &'static str) -> Result<Response, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            operation,
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(resp: Response, operation: &'static str) -> Result<T, RemoteError> {
        let resp = Self::check(resp, operation).await?;
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| RemoteError::Decode {
            operation,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn fetch_settings(&self, user_id: &str) -> Result<Option<UserSettings>, RemoteError> {
        let resp = self
            .request(Method::GET, self.table("user_settings")?)
            .query(&[("id", format!("eq.{user_id}")), ("select", "*".to_string())])
            .send()
            .await?;
        let rows: Vec<UserSettings> = Self::decode(resp, "fetch settings").await?;
        Ok(rows.into_iter().next().map(UserSettings::normalized))
    }

    async fn upsert_settings(&self, user_id: &str, settings: &UserSettings) -> Result<(), RemoteError> {
        let resp = self
            .request(Method::POST, self.table("user_settings")?)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&SettingsRow { id: user_id, settings })
            .send()
            .await?;
        Self::check(resp, "upsert settings").await?;
        Ok(())
    }

    async fn append_interval(&self, record: &IntervalRecord) -> Result<(), RemoteError> {
        let resp = self
            .request(Method::POST, self.table("pomodoro_sessions")?)
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=ignore-duplicates,return=minimal")
            .json(record)
            .send()
            .await?;
        Self::check(resp, "append interval").await?;
        Ok(())
    }

    async fn list_intervals(&self, user_id: &str) -> Result<Vec<IntervalRecord>, RemoteError> {
        let resp = self
            .request(Method::GET, self.table("pomodoro_sessions")?)
            .query(&[
                ("user_id", format!("eq.{user_id}")),
                ("order", "start_time.desc".to_string()),
            ])
            .send()
            .await?;
        Self::decode(resp, "list intervals").await
    }

    async fn list_tasks(&self, user_id: &str) -> Result<Vec<TaskRow>, RemoteError> {
        let resp = self
            .request(Method::GET, self.table("tasks")?)
            .query(&[
                ("user_id", format!("eq.{user_id}")),
                ("order", "created_at.asc".to_string()),
            ])
            .send()
            .await?;
        Self::decode(resp, "list tasks").await
    }

    async fn insert_task(
        &self,
        user_id: &str,
        name: &str,
        completed_pomodoros: u32,
    ) -> Result<TaskRow, RemoteError> {
        let resp = self
            .request(Method::POST, self.table("tasks")?)
            .header("Prefer", "return=representation")
            .json(&json!({
                "user_id": user_id,
                "name": name,
                "completed_pomodoros": completed_pomodoros,
            }))
            .send()
            .await?;
        let rows: Vec<TaskRow> = Self::decode(resp, "insert task").await?;
        rows.into_iter().next().ok_or(RemoteError::Decode {
            operation: "insert task",
            message: "no row returned".into(),
        })
    }

    async fn update_task_count(&self, task_id: &str, completed_pomodoros: u32) -> Result<(), RemoteError> {
        let resp = self
            .request(Method::PATCH, self.table("tasks")?)
            .query(&[("id", format!("eq.{task_id}"))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "completed_pomodoros": completed_pomodoros }))
            .send()
            .await?;
        Self::check(resp, "update task").await?;
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), RemoteError> {
        let resp = self
            .request(Method::DELETE, self.table("tasks")?)
            .query(&[("id", format!("eq.{task_id}"))])
            .send()
            .await?;
        Self::check(resp, "delete task").await?;
        Ok(())
    }

    async fn total_focus_sessions(&self, user_id: &str) -> Result<u64, RemoteError> {
        let resp = self
            .request(Method::POST, self.rpc("get_total_pomodoros_per_user")?)
            .json(&json!({}))
            .send()
            .await?;
        let totals: Vec<UserTotal> = Self::decode(resp, "total focus sessions").await?;
        Ok(totals
            .into_iter()
            .find(|t| t.user_id == user_id)
            .map(|t| t.total_pomodoro_sessions)
            .unwrap_or(0))
    }

    async fn task_session_counts(&self, user_id: &str) -> Result<Vec<TaskSessionStats>, RemoteError> {
        let resp = self
            .request(Method::POST, self.rpc("get_task_sessions")?)
            .json(&json!({ "p_user_id": user_id }))
            .send()
            .await?;
        Self::decode(resp, "task session counts").await
    }

    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, RemoteError> {
        let resp = self
            .request(Method::POST, self.rpc("get_leaderboard")?)
            .json(&json!({}))
            .send()
            .await?;
        let mut entries: Vec<LeaderboardEntry> = Self::decode(resp, "leaderboard").await?;
        entries.sort_by(|a, b| b.total_pomodoro_sessions.cmp(&a.total_pomodoro_sessions));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::Phase;
    use chrono::{Duration, Utc};
    use mockito::Matcher;

    #[tokio::test]
    async fn fetch_settings_reads_first_row() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/user_settings")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.u1".into()))
            .match_header("apikey", "anon")
            .with_status(200)
            .with_body(r#"[{"focus_duration": 1800, "short_break_duration": 300, "long_break_duration": 900, "auto_start_break": true}]"#)
            .create_async()
            .await;

        let store = RestStore::new(&server.url(), "anon").unwrap();
        let settings = store.fetch_settings("u1").await.unwrap().unwrap();
        mock.assert_async().await;
        assert_eq!(settings.focus_duration, 1800);
        assert!(settings.auto_start_break);
        assert_eq!(settings.long_break_interval, 4);
    }

    #[tokio::test]
    async fn fetch_settings_missing_row_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/user_settings")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let store = RestStore::new(&server.url(), "anon").unwrap();
        assert!(store.fetch_settings("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn append_interval_is_idempotent_insert() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/pomodoro_sessions")
            .match_query(Matcher::UrlEncoded("on_conflict".into(), "id".into()))
            .match_header("prefer", Matcher::Regex("ignore-duplicates".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "user_id": "u1",
                "type": "focus",
            })))
            .with_status(201)
            .create_async()
            .await;

        let store = RestStore::new(&server.url(), "anon").unwrap();
        let start = Utc::now();
        let rec = IntervalRecord::new("u1", None, Phase::Focus, start, start + Duration::minutes(25));
        store.append_interval(&rec).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_surfaces_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/rest/v1/tasks")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("JWT expired")
            .create_async()
            .await;

        let store = RestStore::new(&server.url(), "anon").unwrap();
        let err = store.update_task_count("t1", 3).await.unwrap_err();
        match err {
            RemoteError::Status { status, body, .. } => {
                assert_eq!(status, 401);
                assert_eq!(body, "JWT expired");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn insert_task_returns_stored_row() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/tasks")
            .match_header("prefer", "return=representation")
            .with_status(201)
            .with_body(r#"[{"id": "t-9", "user_id": "u1", "name": "Write", "completed_pomodoros": 0, "created_at": "2026-03-02T09:00:00+00:00"}]"#)
            .create_async()
            .await;

        let store = RestStore::new(&server.url(), "anon").unwrap();
        let row = store.insert_task("u1", "Write", 0).await.unwrap();
        assert_eq!(row.id, "t-9");
        assert_eq!(row.name, "Write");
    }

    #[tokio::test]
    async fn total_focus_sessions_picks_user() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/rpc/get_total_pomodoros_per_user")
            .with_status(200)
            .with_body(r#"[{"user_id": "u0", "total_pomodoro_sessions": 9}, {"user_id": "u1", "total_pomodoro_sessions": 4}]"#)
            .create_async()
            .await;

        let store = RestStore::new(&server.url(), "anon").unwrap();
        assert_eq!(store.total_focus_sessions("u1").await.unwrap(), 4);
        assert_eq!(store.total_focus_sessions("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn leaderboard_sorted_descending() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/rpc/get_leaderboard")
            .with_status(200)
            .with_body(r#"[{"user_id": "a", "username": "ann", "total_pomodoro_sessions": 2}, {"user_id": "b", "total_pomodoro_sessions": 7}]"#)
            .create_async()
            .await;

        let store = RestStore::new(&server.url(), "anon").unwrap();
        let board = store.leaderboard().await.unwrap();
        assert_eq!(board[0].user_id, "b");
        assert_eq!(board[1].display_name.as_deref(), Some("ann"));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/tasks")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{not json")
            .create_async()
            .await;

        let store = RestStore::new(&server.url(), "anon").unwrap();
        assert!(matches!(
            store.list_tasks("u1").await,
            Err(RemoteError::Decode { .. })
        ));
    }
}
