//! 对话集成测试：脚本回放的模型 + mockito 模拟的 Gitea

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geris::actions::{ActionRegistry, Dispatcher};
    use geris::core::{Orchestrator, OrchestratorConfig, Outcome};
    use geris::gitea::{GiteaActions, GiteaClient};
    use geris::llm::{Role, ScriptedTransport, ToolCall};
    use geris::transcript::{FanoutSink, FileTranscriptSink, TracingSink};
    use serde_json::{json, Value};

    fn registry(uri: &str) -> Arc<ActionRegistry> {
        let client = GiteaClient::new(uri, "t0k", 5).unwrap();
        Arc::new(ActionRegistry::from_provider(&GiteaActions::new(client)).unwrap())
    }

    #[tokio::test]
    async fn test_label_then_create_issue() {
        let mut server = mockito::Server::new_async().await;
        let labels = server
            .mock("GET", "/api/v1/repos/acme/web/labels")
            .match_header("authorization", "token t0k")
            .with_status(200)
            .with_body(r#"[{"id":1,"name":"Agent/Review"},{"id":2,"name":"Kind/Bug"}]"#)
            .create_async()
            .await;
        let user = server
            .mock("GET", "/api/v1/user")
            .with_status(200)
            .with_body(r#"{"login":"admin"}"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/api/v1/repos/acme/web/issues")
            .match_body(mockito::Matcher::PartialJson(json!({
                "title": "socket interface causing segfault",
                "assignee": "admin",
                "labels": [1, 2],
            })))
            .with_status(201)
            .with_body(r#"{"number":42,"title":"socket interface causing segfault"}"#)
            .create_async()
            .await;

        let transport = Arc::new(
            ScriptedTransport::new()
                .reply_tool_calls(vec![
                    ToolCall::new("c1", "list_labels", r#"{"owner":"acme","repo":"web"}"#),
                    ToolCall::new("c2", "default_user", ""),
                ])
                .reply_tool_calls(vec![ToolCall::new(
                    "c3",
                    "create_issue",
                    r#"{"owner":"acme","repo":"web","title":"socket interface causing segfault","assignee":"admin","labels":[1,2]}"#,
                )])
                .reply_text("Created issue **#42**."),
        );

        let dir = tempfile::tempdir().unwrap();
        let sink = FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(Arc::new(FileTranscriptSink::new(dir.path()).unwrap()));
        let orch = Orchestrator::new(
            transport.clone(),
            Dispatcher::new(registry(&server.url()), 5),
            OrchestratorConfig::default(),
        )
        .with_sink(Arc::new(sink));

        let mut conv = orch.begin("create a bug issue on acme/web titled 'socket interface causing segfault'");
        let outcome = orch.drive(&mut conv).await;

        labels.assert_async().await;
        user.assert_async().await;
        create.assert_async().await;

        let Outcome::Finalized { answer, rendered } = outcome else {
            panic!("expected a final answer");
        };
        assert_eq!(answer, "Created issue **#42**.");
        assert!(rendered.starts_with("# Prompt\n- `Input`: **create a bug issue"));

        // system, user, (assistant, tool, tool), (assistant, tool)
        let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Tool,
                Role::Assistant,
                Role::Tool,
            ]
        );
        let created: Value = serde_json::from_str(conv.messages()[6].content_str()).unwrap();
        assert_eq!(created["number"], 42);

        for turn in 1..=3 {
            assert!(dir.path().join(format!("req-{turn:05}.json")).exists());
            assert!(dir.path().join(format!("choices-{turn:05}.json")).exists());
        }
        assert_eq!(transport.requests().len(), 3);
        assert_eq!(transport.requests()[0].tools.len(), 22);
    }

    #[tokio::test]
    async fn test_gitea_error_is_reported_to_model_not_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/api/v1/repos/acme/web/issues/9")
            .with_status(403)
            .with_body(r#"{"message":"token does not have write access"}"#)
            .create_async()
            .await;

        let transport = Arc::new(
            ScriptedTransport::new()
                .reply_tool_calls(vec![ToolCall::new(
                    "c1",
                    "close_issue",
                    r#"{"owner":"acme","repo":"web","index":9}"#,
                )])
                .reply_text("I could not close #9: permission denied."),
        );
        let orch = Orchestrator::new(
            transport.clone(),
            Dispatcher::new(registry(&server.url()), 5),
            OrchestratorConfig::default(),
        );
        let outcome = orch.run("close issue 9 on acme/web").await;
        assert!(outcome.is_finalized());

        let history = &transport.requests()[1].messages;
        let result: Value = serde_json::from_str(history[3].content_str()).unwrap();
        let msg = result["error"].as_str().unwrap();
        assert!(msg.starts_with("close_issue raised an error: HTTP 403"));
        assert!(msg.contains("write access"));
    }

    #[tokio::test]
    async fn test_missing_required_argument_is_contained() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .reply_tool_calls(vec![ToolCall::new("c1", "get_issue", r#"{"owner":"acme"}"#)])
                .reply_text("Which repository?"),
        );
        let orch = Orchestrator::new(
            transport.clone(),
            Dispatcher::new(registry("http://127.0.0.1:9"), 5),
            OrchestratorConfig::default(),
        );
        assert!(orch.run("show issue 1").await.is_finalized());
        let history = &transport.requests()[1].messages;
        assert_eq!(
            history[3].content_str(),
            r#"{"error":"get_issue raised an error: missing required argument `repo`"}"#
        );
    }
}
