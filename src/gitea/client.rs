//! Gitea REST 客户端
//!
//! 基址 `<uri>/api/v1`，认证头 `Authorization: token <token>`。
//! 非 2xx 响应转为 ActionError::Provider（状态码 + 响应摘录），空响应体视为 `{"result":"success"}`。

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Map, Value};

use crate::core::ActionError;

/// 错误信息中保留的响应体字符数
const BODY_EXCERPT_CHARS: usize = 300;

/// list_issues 的过滤条件
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IssueFilter {
    pub state: Option<String>,
    /// 逗号分隔的标签名
    pub labels: Option<String>,
    pub page: Option<i64>,
    pub q: Option<String>,
}

#[derive(Clone, Debug)]
pub struct GiteaClient {
    http: Client,
    api_base: String,
    token: String,
}

fn success() -> Value {
    json!({ "result": "success" })
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() > BODY_EXCERPT_CHARS {
        format!("{}...", body.chars().take(BODY_EXCERPT_CHARS).collect::<String>())
    } else {
        body.to_string()
    }
}

impl GiteaClient {
    pub fn new(uri: &str, token: &str, timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("geris/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_base: format!("{}/api/v1", uri.trim_end_matches('/')),
            token: token.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, "application/json")
    }

    async fn send(&self, req: RequestBuilder) -> Result<Value, ActionError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ActionError::Provider(format!("request failed: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ActionError::Provider(format!("read body: {e}")))?;
        if !status.is_success() {
            return Err(ActionError::Provider(format!("HTTP {status}: {}", excerpt(&text))));
        }
        if text.trim().is_empty() {
            return Ok(success());
        }
        serde_json::from_str(&text)
            .map_err(|e| ActionError::Provider(format!("invalid JSON from Gitea: {e}")))
    }

    async fn get(&self, path: &str) -> Result<Value, ActionError> {
        self.send(self.request(Method::GET, path)).await
    }

    async fn delete(&self, path: &str) -> Result<Value, ActionError> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(success())
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ActionError> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    // users / orgs / repos

    pub async fn current_user(&self) -> Result<Value, ActionError> {
        self.get("/user").await
    }

    pub async fn list_users(&self) -> Result<Value, ActionError> {
        self.get("/admin/users").await
    }

    pub async fn list_orgs(&self) -> Result<Value, ActionError> {
        self.get("/admin/orgs").await
    }

    pub async fn list_repos(&self, owner: &str) -> Result<Value, ActionError> {
        self.get(&format!("/users/{owner}/repos")).await
    }

    // labels

    pub async fn list_labels(&self, owner: &str, repo: &str) -> Result<Value, ActionError> {
        self.get(&format!("/repos/{owner}/{repo}/labels")).await
    }

    pub async fn get_label(&self, owner: &str, repo: &str, id: i64) -> Result<Value, ActionError> {
        self.get(&format!("/repos/{owner}/{repo}/labels/{id}")).await
    }

    pub async fn issue_labels(&self, owner: &str, repo: &str, index: i64) -> Result<Value, ActionError> {
        self.get(&format!("/repos/{owner}/{repo}/issues/{index}/labels")).await
    }

    pub async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        index: i64,
        labels: &[i64],
    ) -> Result<Value, ActionError> {
        self.post(
            &format!("/repos/{owner}/{repo}/issues/{index}/labels"),
            &json!({ "labels": labels }),
        )
        .await
    }

    /// Gitea 每次只能移除一个标签，逐个删除
    pub async fn remove_labels(
        &self,
        owner: &str,
        repo: &str,
        index: i64,
        labels: &[i64],
    ) -> Result<Value, ActionError> {
        for id in labels {
            self.delete(&format!("/repos/{owner}/{repo}/issues/{index}/labels/{id}"))
                .await?;
        }
        Ok(success())
    }

    pub async fn create_label(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        color: &str,
        description: Option<String>,
    ) -> Result<Value, ActionError> {
        let mut body = Map::new();
        body.insert("name".into(), json!(name));
        body.insert("color".into(), json!(color));
        if let Some(d) = description {
            body.insert("description".into(), json!(d));
        }
        self.post(&format!("/repos/{owner}/{repo}/labels"), &Value::Object(body))
            .await
    }

    pub async fn delete_label(&self, owner: &str, repo: &str, id: i64) -> Result<Value, ActionError> {
        self.delete(&format!("/repos/{owner}/{repo}/labels/{id}")).await
    }

    // milestones

    pub async fn list_milestones(&self, owner: &str, repo: &str, state: &str) -> Result<Value, ActionError> {
        let req = self
            .request(Method::GET, &format!("/repos/{owner}/{repo}/milestones"))
            .query(&[("state", state)]);
        self.send(req).await
    }

    pub async fn get_milestone(&self, owner: &str, repo: &str, id: i64) -> Result<Value, ActionError> {
        self.get(&format!("/repos/{owner}/{repo}/milestones/{id}")).await
    }

    pub async fn create_milestone(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        description: Option<String>,
        due_on: Option<String>,
    ) -> Result<Value, ActionError> {
        let mut body = Map::new();
        body.insert("title".into(), json!(title));
        if let Some(d) = description {
            body.insert("description".into(), json!(d));
        }
        if let Some(due) = due_on {
            body.insert("due_on".into(), json!(due));
        }
        self.post(&format!("/repos/{owner}/{repo}/milestones"), &Value::Object(body))
            .await
    }

    pub async fn delete_milestone(&self, owner: &str, repo: &str, id: i64) -> Result<Value, ActionError> {
        self.delete(&format!("/repos/{owner}/{repo}/milestones/{id}")).await
    }

    // issues

    pub async fn list_issues(&self, owner: &str, repo: &str, filter: &IssueFilter) -> Result<Value, ActionError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(state) = &filter.state {
            query.push(("state", state.clone()));
        }
        if let Some(labels) = &filter.labels {
            query.push(("labels", labels.clone()));
        }
        if let Some(page) = filter.page.filter(|p| *p > 0) {
            query.push(("page", page.to_string()));
        }
        if let Some(q) = &filter.q {
            query.push(("q", q.clone()));
        }
        let req = self
            .request(Method::GET, &format!("/repos/{owner}/{repo}/issues"))
            .query(&query);
        self.send(req).await
    }

    pub async fn get_issue(&self, owner: &str, repo: &str, index: i64) -> Result<Value, ActionError> {
        self.get(&format!("/repos/{owner}/{repo}/issues/{index}")).await
    }

    pub async fn close_issue(&self, owner: &str, repo: &str, index: i64) -> Result<Value, ActionError> {
        let req = self
            .request(Method::PATCH, &format!("/repos/{owner}/{repo}/issues/{index}"))
            .json(&json!({ "state": "closed" }));
        self.send(req).await
    }

    /// body 为 CreateIssueOption 形状的对象，调用方只放入已给出的字段
    pub async fn create_issue(&self, owner: &str, repo: &str, body: &Value) -> Result<Value, ActionError> {
        self.post(&format!("/repos/{owner}/{repo}/issues"), body).await
    }

    // comments

    pub async fn list_comments(&self, owner: &str, repo: &str, index: i64) -> Result<Value, ActionError> {
        self.get(&format!("/repos/{owner}/{repo}/issues/{index}/comments"))
            .await
    }

    pub async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        index: i64,
        body: &str,
    ) -> Result<Value, ActionError> {
        self.post(
            &format!("/repos/{owner}/{repo}/issues/{index}/comments"),
            &json!({ "body": body }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_sends_token_and_parses_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/user")
            .match_header("authorization", "token t0k")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"login":"admin","id":1}"#)
            .create_async()
            .await;

        let client = GiteaClient::new(&format!("{}/", server.url()), "t0k", 5).unwrap();
        let user = client.current_user().await.unwrap();
        mock.assert_async().await;
        assert_eq!(user["login"], "admin");
    }

    #[tokio::test]
    async fn test_http_error_becomes_provider_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/repos/acme/web/issues/99")
            .with_status(404)
            .with_body(r#"{"message":"issue does not exist"}"#)
            .create_async()
            .await;

        let client = GiteaClient::new(&server.url(), "t", 5).unwrap();
        let err = client.get_issue("acme", "web", 99).await.unwrap_err();
        let ActionError::Provider(msg) = err else {
            panic!("expected provider error");
        };
        assert!(msg.starts_with("HTTP 404"));
        assert!(msg.contains("issue does not exist"));
    }

    #[tokio::test]
    async fn test_close_issue_patches_state() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/api/v1/repos/acme/web/issues/3")
            .match_body(Matcher::Json(json!({"state": "closed"})))
            .with_status(201)
            .with_body(r#"{"number":3,"state":"closed"}"#)
            .create_async()
            .await;

        let client = GiteaClient::new(&server.url(), "t", 5).unwrap();
        let issue = client.close_issue("acme", "web", 3).await.unwrap();
        mock.assert_async().await;
        assert_eq!(issue["state"], "closed");
    }

    #[tokio::test]
    async fn test_remove_labels_deletes_each_and_reports_success() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("DELETE", "/api/v1/repos/acme/web/issues/3/labels/7")
            .with_status(204)
            .create_async()
            .await;
        let second = server
            .mock("DELETE", "/api/v1/repos/acme/web/issues/3/labels/8")
            .with_status(204)
            .create_async()
            .await;

        let client = GiteaClient::new(&server.url(), "t", 5).unwrap();
        let out = client.remove_labels("acme", "web", 3, &[7, 8]).await.unwrap();
        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(out, json!({"result": "success"}));
    }

    #[tokio::test]
    async fn test_list_issues_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/repos/acme/web/issues")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("state".into(), "closed".into()),
                Matcher::UrlEncoded("labels".into(), "Kind/Bug".into()),
            ]))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = GiteaClient::new(&server.url(), "t", 5).unwrap();
        let filter = IssueFilter {
            state: Some("closed".into()),
            labels: Some("Kind/Bug".into()),
            page: Some(0),
            q: None,
        };
        assert_eq!(client.list_issues("acme", "web", &filter).await.unwrap(), json!([]));
        mock.assert_async().await;
    }

    #[test]
    fn test_excerpt_truncates() {
        assert_eq!(excerpt("  short "), "short");
        assert_eq!(excerpt(&"y".repeat(400)).chars().count(), BODY_EXCERPT_CHARS + 3);
    }
}
