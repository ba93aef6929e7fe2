use std::time::Duration;

use anyhow::{bail, Result};

use focuslog_api_types::*;

/// Typed HTTP client for the focuslog API.
///
/// One method per endpoint; the tracker daemon and tests are the callers.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new client with the given base URL and timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    // ── Health ────────────────────────────────────────────────────────────

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self.client.get(self.url("/health")).send().await?;
        parse_response(resp).await
    }

    // ── Users ─────────────────────────────────────────────────────────────

    pub async fn register(&self, nickname: &str) -> Result<RegisterResponse> {
        let resp = self
            .client
            .post(self.url("/user/register"))
            .json(&serde_json::json!({ "nickname": nickname }))
            .send()
            .await?;
        parse_response(resp).await
    }

    // ── Groups ────────────────────────────────────────────────────────────

    pub async fn create_group(&self, req: &CreateGroupRequest) -> Result<GroupResponse> {
        let resp = self
            .client
            .post(self.url("/group/create"))
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn join_group(&self, req: &JoinGroupRequest) -> Result<GroupResponse> {
        let resp = self
            .client
            .post(self.url("/group/join"))
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn my_groups(&self, user_id: &str) -> Result<MyGroupsResponse> {
        let resp = self
            .client
            .get(self.url(&format!("/group/my-groups/{user_id}")))
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn leave_group(&self, req: &LeaveGroupRequest) -> Result<OkResponse> {
        let resp = self
            .client
            .post(self.url("/group/leave"))
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    // ── Leaderboard ───────────────────────────────────────────────────────

    pub async fn leaderboard(&self, group_code: &str) -> Result<LeaderboardResponse> {
        let resp = self
            .client
            .get(self.url(&format!("/leaderboard/{group_code}")))
            .send()
            .await?;
        parse_response(resp).await
    }

    // ── Stats sync ────────────────────────────────────────────────────────

    pub async fn sync_stats(&self, req: &SyncRequest) -> Result<SyncResponse> {
        let resp = self
            .client
            .post(self.url("/stats/sync"))
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    /// Raw sync returning the response for retry-policy callers that need
    /// to inspect the status themselves.
    pub async fn sync_stats_raw(&self, req: &SyncRequest) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(self.url("/stats/sync"))
            .json(req)
            .send()
            .await?)
    }

    // ── AI coach ──────────────────────────────────────────────────────────

    pub async fn ai(&self, req: &AiRequest) -> Result<AiResponse> {
        let resp = self.client.post(self.url("/ai")).json(req).send().await?;
        parse_response(resp).await
    }
}

/// Parse an HTTP response: return the deserialized body on 2xx,
/// or an error containing the status and body text.
async fn parse_response<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("{status}: {body}");
    }
    Ok(resp.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let api = ApiClient::new("http://localhost:3000/", Duration::from_secs(5)).unwrap();
        assert_eq!(api.base_url(), "http://localhost:3000");
        assert_eq!(api.url("/health"), "http://localhost:3000/api/health");
    }
}
