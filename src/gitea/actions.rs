//! Gitea 动作目录
//!
//! 每个动作：名称 + 类型化形参 + 文档块 + 调用 GiteaClient 的处理函数。
//! 文档块语法见 actions::schema。

use std::future::Future;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::actions::{Action, ActionArgs, ActionProvider, FnAction, FormalParam};
use crate::core::ActionError;
use crate::gitea::{GiteaClient, IssueFilter};

/// 以 ActionProvider 形式暴露 Gitea 操作
pub struct GiteaActions {
    client: Arc<GiteaClient>,
}

impl GiteaActions {
    pub fn new(client: GiteaClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    fn action<F, Fut>(&self, name: &str, params: Vec<FormalParam>, doc: &str, handler: F) -> Arc<dyn Action>
    where
        F: Fn(Arc<GiteaClient>, ActionArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        let client = self.client.clone();
        Arc::new(FnAction::new(name, params, doc, move |args| {
            handler(client.clone(), args)
        }))
    }
}

fn string(name: &str) -> FormalParam {
    FormalParam::of::<String>(name)
}

fn int(name: &str) -> FormalParam {
    FormalParam::of::<i64>(name)
}

fn repo_params(extra: Vec<FormalParam>) -> Vec<FormalParam> {
    let mut params = vec![string("owner"), string("repo")];
    params.extend(extra);
    params
}

/// 把已给出的可选参数放进请求体
fn put<T: Into<Value>>(body: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(v) = value {
        body.insert(key.to_string(), v.into());
    }
}

impl ActionProvider for GiteaActions {
    fn actions(&self) -> Vec<Arc<dyn Action>> {
        vec![
            // users and orgs
            self.action(
                "default_user",
                vec![],
                "description:Return the current user",
                |c, _a| async move { c.current_user().await },
            ),
            self.action(
                "list_users",
                vec![],
                "description:Return a list of all users",
                |c, _a| async move { c.list_users().await },
            ),
            self.action(
                "list_orgs",
                vec![],
                "description:Return a list of all orgs",
                |c, _a| async move { c.list_orgs().await },
            ),
            // repos
            self.action(
                "list_repos",
                vec![string("owner")],
                "description:List repos for an owner
                 owner:Owner of the repositories to list
                 required:owner",
                |c, a| async move { c.list_repos(&a.str("owner")?).await },
            ),
            // labels
            self.action(
                "list_labels",
                repo_params(vec![]),
                "description:List issue labels for a repository
                 owner:Owner of the repository
                 repo:Name of the repository
                 required:owner,repo",
                |c, a| async move { c.list_labels(&a.str("owner")?, &a.str("repo")?).await },
            ),
            self.action(
                "get_label",
                repo_params(vec![int("id")]),
                "description:Get a single label from a repository
                 owner:Owner of the repository
                 repo:Name of the repository
                 id:ID of the label to get
                 required:owner,repo,id",
                |c, a| async move {
                    c.get_label(&a.str("owner")?, &a.str("repo")?, a.i64("id")?).await
                },
            ),
            self.action(
                "get_labels",
                repo_params(vec![int("index")]),
                "description:Get all labels on an issue
                 owner:Owner of the repository
                 repo:Name of the repository
                 index:Index of the issue to get the labels from
                 required:owner,repo,index",
                |c, a| async move {
                    c.issue_labels(&a.str("owner")?, &a.str("repo")?, a.i64("index")?).await
                },
            ),
            self.action(
                "add_labels",
                repo_params(vec![int("index"), FormalParam::of::<Vec<i64>>("labels")]),
                "description:Add one or more labels to an issue
                 owner:Owner of the repository
                 repo:Name of the repository
                 index:Index of the issue to add label(s) to
                 labels:List of label IDs to add to the issue
                 required:owner,repo,index,labels",
                |c, a| async move {
                    c.add_labels(
                        &a.str("owner")?,
                        &a.str("repo")?,
                        a.i64("index")?,
                        &a.i64_list("labels")?,
                    )
                    .await
                },
            ),
            self.action(
                "remove_labels",
                repo_params(vec![int("index"), FormalParam::of::<Vec<i64>>("labels")]),
                "description:Remove one or more labels from an issue
                 owner:Owner of the repository
                 repo:Name of the repository
                 index:Index of the issue to remove label(s) from
                 labels:List of label IDs to remove from the issue
                 required:owner,repo,index,labels",
                |c, a| async move {
                    c.remove_labels(
                        &a.str("owner")?,
                        &a.str("repo")?,
                        a.i64("index")?,
                        &a.i64_list("labels")?,
                    )
                    .await
                },
            ),
            self.action(
                "create_label",
                repo_params(vec![string("name"), string("color"), string("descr")]),
                "description:Create a label on a repository
                 owner:Owner of the repository
                 repo:Name of the repository
                 name:Name of the label, scoped labels use a slash (e.g. Kind/Bug)
                 color:Hex color of the label, e.g. #e11d21
                 descr:Short description of what the label means
                 required:owner,repo,name,color",
                |c, a| async move {
                    c.create_label(
                        &a.str("owner")?,
                        &a.str("repo")?,
                        &a.str("name")?,
                        &a.str("color")?,
                        a.opt_str("descr")?,
                    )
                    .await
                },
            ),
            self.action(
                "delete_label",
                repo_params(vec![int("id")]),
                "description:Delete a label from a repository
                 owner:Owner of the repository
                 repo:Name of the repository
                 id:ID of the label to delete
                 required:owner,repo,id",
                |c, a| async move {
                    c.delete_label(&a.str("owner")?, &a.str("repo")?, a.i64("id")?).await
                },
            ),
            // milestones
            self.action(
                "list_milestones",
                repo_params(vec![string("state")]),
                "description:List milestones for a repository
                 owner:Owner of the repository
                 repo:Name of the repository
                 state:State of the milestones; enum:open,closed,all; default:open
                 required:owner,repo",
                |c, a| async move {
                    c.list_milestones(&a.str("owner")?, &a.str("repo")?, &a.str_or("state", "open")?)
                        .await
                },
            ),
            self.action(
                "get_milestone",
                repo_params(vec![int("id")]),
                "description:Get a single milestone from a repository
                 owner:Owner of the repository
                 repo:Name of the repository
                 id:ID of the milestone to get
                 required:owner,repo,id",
                |c, a| async move {
                    c.get_milestone(&a.str("owner")?, &a.str("repo")?, a.i64("id")?).await
                },
            ),
            self.action(
                "create_milestone",
                repo_params(vec![string("descr"), string("due_on"), string("title")]),
                "description:Create a milestone on a repository
                 owner:Owner of the repository
                 repo:Name of the repository
                 descr:The description of the milestone
                 due_on:Due date as an RFC 3339 timestamp
                 title:Title of the milestone
                 required:owner,repo,title",
                |c, a| async move {
                    c.create_milestone(
                        &a.str("owner")?,
                        &a.str("repo")?,
                        &a.str("title")?,
                        a.opt_str("descr")?,
                        a.opt_str("due_on")?,
                    )
                    .await
                },
            ),
            self.action(
                "delete_milestone",
                repo_params(vec![int("id")]),
                "description:Delete a milestone from a repository
                 owner:Owner of the repository
                 repo:Name of the repository
                 id:ID of the milestone to delete
                 required:owner,repo,id",
                |c, a| async move {
                    c.delete_milestone(&a.str("owner")?, &a.str("repo")?, a.i64("id")?).await
                },
            ),
            // issues
            self.action(
                "list_issues",
                repo_params(vec![string("labels"), int("page"), string("q"), string("state")]),
                "description:List open and/or closed issues on a repository
                 owner:Owner of the repository
                 repo:Name of the repository
                 state:State of the issues to list; enum:open,closed,all; default:open
                 labels:Comma separated list of labels to filter by
                 page:Page number of requested issues; default:0;
                 q:Search string
                 required:owner,repo",
                |c, a| async move {
                    let filter = IssueFilter {
                        state: Some(a.str_or("state", "open")?),
                        labels: a.opt_str("labels")?,
                        page: a.opt_i64("page")?,
                        q: a.opt_str("q")?,
                    };
                    c.list_issues(&a.str("owner")?, &a.str("repo")?, &filter).await
                },
            ),
            self.action(
                "get_issue",
                repo_params(vec![int("index")]),
                "description:Get a single issue from a repository
                 owner:Owner of the repository
                 repo:Name of the repository
                 index:Index of the issue to get
                 required:owner,repo,index",
                |c, a| async move {
                    c.get_issue(&a.str("owner")?, &a.str("repo")?, a.i64("index")?).await
                },
            ),
            self.action(
                "close_issue",
                repo_params(vec![int("index")]),
                "description:Close a given issue
                 owner:Owner of the repository
                 repo:Name of the repository
                 index:Index of the issue to close
                 required:owner,repo,index",
                |c, a| async move {
                    c.close_issue(&a.str("owner")?, &a.str("repo")?, a.i64("index")?).await
                },
            ),
            self.action(
                "close_issues",
                repo_params(vec![FormalParam::of::<Vec<i64>>("indexes")]),
                "description:Close multiple issues
                 owner:Owner of the repository
                 repo:Name of the repository
                 indexes:Indexes of the issues to close
                 required:owner,repo,indexes",
                |c, a| async move {
                    let (owner, repo) = (a.str("owner")?, a.str("repo")?);
                    let mut closed = Vec::new();
                    for index in a.i64_list("indexes")? {
                        closed.push(c.close_issue(&owner, &repo, index).await?);
                    }
                    Ok::<_, ActionError>(Value::Array(closed))
                },
            ),
            self.action(
                "create_issue",
                repo_params(vec![
                    string("assignee"),
                    FormalParam::of::<Vec<String>>("assignees"),
                    string("body"),
                    FormalParam::of::<bool>("closed"),
                    string("due_date"),
                    FormalParam::of::<Vec<i64>>("labels"),
                    int("milestone"),
                    string("title"),
                ]),
                "description:Create an issue on a repository
                 owner:Owner of the repository
                 repo:Name of the repository
                 assignee:Name of the assigned user
                 assignees:Any additional assigned users
                 body:Description of the issue and success criteria
                 closed:Whether the issue starts closed; default:false
                 due_date:Due date as an RFC 3339 timestamp
                 labels:IDs of all labels to apply to this issue
                 milestone:ID of the milestone this issue belongs to
                 title:The title, a one-line description of the issue
                 required:owner,repo,title",
                |c, a| async move {
                    let mut body = Map::new();
                    body.insert("title".into(), json!(a.str("title")?));
                    put(&mut body, "assignee", a.opt_str("assignee")?);
                    put(&mut body, "assignees", a.opt_str_list("assignees")?);
                    put(&mut body, "body", a.opt_str("body")?);
                    put(&mut body, "closed", a.opt_bool("closed")?);
                    put(&mut body, "due_date", a.opt_str("due_date")?);
                    put(&mut body, "labels", a.opt_i64_list("labels")?);
                    put(&mut body, "milestone", a.opt_i64("milestone")?);
                    c.create_issue(&a.str("owner")?, &a.str("repo")?, &Value::Object(body))
                        .await
                },
            ),
            // comments
            self.action(
                "list_comments",
                repo_params(vec![int("index")]),
                "description:List all comments on an issue
                 owner:Owner of the repository
                 repo:Name of the repository
                 index:Index of the issue
                 required:owner,repo,index",
                |c, a| async move {
                    c.list_comments(&a.str("owner")?, &a.str("repo")?, a.i64("index")?).await
                },
            ),
            self.action(
                "create_comment",
                repo_params(vec![int("index"), string("body")]),
                "description:Add a comment to an issue
                 owner:Owner of the repository
                 repo:Name of the repository
                 index:Index of the issue to comment on
                 body:Markdown text of the comment
                 required:owner,repo,index,body",
                |c, a| async move {
                    c.create_comment(&a.str("owner")?, &a.str("repo")?, a.i64("index")?, &a.str("body")?)
                        .await
                },
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionRegistry, Dispatcher};
    use crate::llm::ToolCall;

    fn provider(uri: &str) -> GiteaActions {
        GiteaActions::new(GiteaClient::new(uri, "t", 5).unwrap())
    }

    #[test]
    fn test_catalog_compiles() {
        let registry = ActionRegistry::from_provider(&provider("http://localhost:3000")).unwrap();
        assert_eq!(registry.len(), 22);
        for d in registry.descriptors() {
            let props = d.to_function_json()["parameters"]["properties"].clone();
            for r in &d.required {
                assert!(props.get(r).is_some(), "{} requires undeclared {r}", d.name);
            }
            for p in &d.parameters {
                assert!(p.description.is_some(), "{}.{} has no description", d.name, p.name);
            }
        }
    }

    #[test]
    fn test_close_issue_descriptor() {
        let registry = ActionRegistry::from_provider(&provider("http://localhost:3000")).unwrap();
        let d = registry.descriptor("close_issue").unwrap();
        assert_eq!(d.description, "Close a given issue");
        assert_eq!(d.required, vec!["owner", "repo", "index"]);
        let f = d.to_function_json();
        assert_eq!(f["parameters"]["properties"]["index"]["type"], "integer");
        assert_eq!(f["parameters"]["properties"]["owner"]["type"], "string");

        let issues = registry.descriptor("list_issues").unwrap().to_function_json();
        let props = &issues["parameters"]["properties"];
        assert_eq!(props["state"]["enum"], json!(["open", "closed", "all"]));
        assert_eq!(props["state"]["default"], "open");
        assert_eq!(props["page"]["default"], 0);

        let create = registry.descriptor("create_issue").unwrap().to_function_json();
        assert_eq!(create["parameters"]["properties"]["closed"]["default"], false);
        assert_eq!(create["parameters"]["properties"]["labels"]["items"]["type"], "integer");
    }

    #[tokio::test]
    async fn test_close_issues_dispatch() {
        let mut server = mockito::Server::new_async().await;
        for n in [4, 5] {
            server
                .mock("PATCH", format!("/api/v1/repos/acme/web/issues/{n}").as_str())
                .with_status(201)
                .with_body(format!(r#"{{"number":{n},"state":"closed"}}"#))
                .create_async()
                .await;
        }
        let registry = Arc::new(ActionRegistry::from_provider(&provider(&server.url())).unwrap());
        let out = Dispatcher::new(registry, 5)
            .dispatch(&ToolCall::new(
                "c",
                "close_issues",
                r#"{"owner":"acme","repo":"web","indexes":[4,5]}"#,
            ))
            .await;
        assert!(out.ok);
        assert_eq!(out.value[1]["number"], 5);
    }

    #[tokio::test]
    async fn test_create_issue_sends_only_given_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/repos/acme/web/issues")
            .match_body(mockito::Matcher::Json(json!({
                "title": "socket interface causing segfault",
                "labels": [1, 2],
            })))
            .with_status(201)
            .with_body(r#"{"number":12}"#)
            .create_async()
            .await;
        let registry = Arc::new(ActionRegistry::from_provider(&provider(&server.url())).unwrap());
        let out = Dispatcher::new(registry, 5)
            .dispatch(&ToolCall::new(
                "c",
                "create_issue",
                r#"{"owner":"acme","repo":"web","title":"socket interface causing segfault","labels":[1,2]}"#,
            ))
            .await;
        mock.assert_async().await;
        assert_eq!(out.value["number"], 12);
    }
}
