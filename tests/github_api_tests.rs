//! Drives the octocrab-backed client against a local mock of the GitHub REST API.

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use team_wrapped::github::GitHubApi;
use team_wrapped::metrics::LineCount;
use team_wrapped::throttle::Unthrottled;
use team_wrapped::types::RepoId;
use team_wrapped::{calculate_metrics, AppConfig, Collector, Error, GitHubClient, RepoState};

#[derive(Clone, Debug)]
struct RecordedRequest {
    path_and_query: String,
    authorization: Option<String>,
    api_version: Option<String>,
}

#[derive(Clone)]
struct MockGitHub {
    base: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockGitHub {
    fn requested(&self, fragment: &str) -> bool {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.path_and_query.contains(fragment))
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn config(&self) -> AppConfig {
        AppConfig {
            github_token: "test-token".to_string(),
            github_org: "acme".to_string(),
            team_members: ["alice", "bob"].iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
            since_date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            github_api_version: "2022-11-28".to_string(),
            github_api_url: Some(self.base.clone()),
            per_page: 100,
            repo_pacing_seconds: 0,
            output_dir: PathBuf::from("data"),
            web_stats_path: PathBuf::from("web/stats.json"),
        }
    }
}

async fn spawn_mock() -> MockGitHub {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mock = MockGitHub {
        base: format!("http://{addr}"),
        requests: Arc::default(),
    };

    let app = Router::new()
        .route("/orgs/{org}/repos", get(org_repos))
        .route("/repos/{owner}/{repo}/pulls", get(pulls))
        .route("/repos/{owner}/{repo}/pulls/{number}/comments", get(review_comments))
        .route("/repos/{owner}/{repo}/issues/{number}/comments", get(issue_comments))
        .route("/repos/{owner}/{repo}/pulls/{number}/commits", get(pr_commits))
        .route("/repos/{owner}/{repo}/commits/{sha}", get(commit_detail))
        .route("/repos/{owner}/{repo}/actions/workflows", get(workflows))
        .route("/repos/{owner}/{repo}/actions/runs", get(workflow_runs))
        .layer(middleware::from_fn_with_state(mock.clone(), record))
        .with_state(mock.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    mock
}

async fn record(State(mock): State<MockGitHub>, request: Request, next: Next) -> Response {
    // Borrows of the request must end before the await so the future stays Send.
    let recorded = {
        let header_value = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        RecordedRequest {
            path_and_query: request
                .uri()
                .path_and_query()
                .map(|pq| pq.to_string())
                .unwrap_or_default(),
            authorization: header_value("authorization"),
            api_version: header_value("x-github-api-version"),
        }
    };
    mock.requests.lock().unwrap().push(recorded);

    next.run(request).await
}

fn page_number(query: &HashMap<String, String>) -> u32 {
    query
        .get("page")
        .and_then(|page| page.parse().ok())
        .unwrap_or(1)
}

fn paged(items: Value, next: Option<String>) -> Response {
    match next {
        Some(url) => (
            [(header::LINK, format!("<{url}>; rel=\"next\""))],
            Json(items),
        )
            .into_response(),
        None => Json(items).into_response(),
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "message": "Not Found",
            "documentation_url": "https://docs.github.com/rest"
        })),
    )
        .into_response()
}

fn repo_json(name: &str, created_at: &str) -> Value {
    json!({ "full_name": format!("acme/{name}"), "name": name, "created_at": created_at })
}

fn pr_json(base: &str, repo: &str, number: u64, login: &str, created_at: &str) -> Value {
    let api = format!("{base}/repos/acme/{repo}");
    json!({
        "id": 1000 + number,
        "number": number,
        "url": format!("{api}/pulls/{number}"),
        "user": { "login": login },
        "title": format!("Change #{number}"),
        "created_at": created_at,
        "comments_url": format!("{api}/issues/{number}/comments"),
        "review_comments_url": format!("{api}/pulls/{number}/comments"),
        "commits_url": format!("{api}/pulls/{number}/commits"),
    })
}

fn comment_json(base: &str, repo: &str, id: u64, login: &str, body: &str) -> Value {
    json!({
        "id": id,
        "url": format!("{base}/repos/acme/{repo}/issues/comments/{id}"),
        "user": { "login": login },
        "body": body,
        "created_at": "2025-06-02T08:00:00Z",
    })
}

fn commit_json(base: &str, repo: &str, sha: &str) -> Value {
    json!({
        "sha": sha,
        "url": format!("{base}/repos/acme/{repo}/commits/{sha}"),
        "author": { "login": "alice" },
        "committer": { "login": "web-flow" },
    })
}

async fn org_repos(
    State(mock): State<MockGitHub>,
    Path(org): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    match page_number(&query) {
        1 => paged(
            json!([
                repo_json("alpha", "2019-05-01T00:00:00Z"),
                repo_json("beta", "2020-05-01T00:00:00Z"),
            ]),
            Some(format!("{}/orgs/{org}/repos?page=2", mock.base)),
        ),
        _ => paged(json!([repo_json("gamma", "2025-04-01T00:00:00Z")]), None),
    }
}

async fn pulls(
    State(mock): State<MockGitHub>,
    Path((_owner, repo)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let base = &mock.base;
    let next = |page: u32| Some(format!("{base}/repos/acme/{repo}/pulls?page={page}"));

    match (repo.as_str(), page_number(&query)) {
        ("alpha", 1) => paged(
            json!([
                pr_json(base, "alpha", 4, "alice", "2025-06-01T10:00:00Z"),
                pr_json(base, "alpha", 3, "mallory", "2025-05-01T10:00:00Z"),
            ]),
            next(2),
        ),
        ("alpha", 2) => paged(
            json!([
                pr_json(base, "alpha", 2, "alice", "2025-03-01T10:00:00Z"),
                pr_json(base, "alpha", 1, "alice", "2024-12-01T10:00:00Z"),
            ]),
            next(3),
        ),
        ("alpha", _) => paged(
            json!([pr_json(base, "alpha", 0, "alice", "2024-01-01T10:00:00Z")]),
            None,
        ),
        ("beta", _) => not_found(),
        ("gamma", _) => paged(
            json!([pr_json(base, "gamma", 1, "bob", "2025-02-02T10:00:00Z")]),
            None,
        ),
        _ => paged(json!([]), None),
    }
}

async fn issue_comments(
    State(mock): State<MockGitHub>,
    Path((_owner, repo, number)): Path<(String, String, u64)>,
) -> Response {
    match (repo.as_str(), number) {
        ("alpha", 4) => paged(json!([comment_json(&mock.base, "alpha", 1, "bob", "LGTM")]), None),
        _ => paged(json!([]), None),
    }
}

async fn review_comments(
    State(mock): State<MockGitHub>,
    Path((_owner, repo, number)): Path<(String, String, u64)>,
) -> Response {
    match (repo.as_str(), number) {
        ("alpha", 4) => paged(
            json!([comment_json(&mock.base, "alpha", 2, "carol", "Looks good, one nit")]),
            None,
        ),
        _ => paged(json!([]), None),
    }
}

async fn pr_commits(
    State(mock): State<MockGitHub>,
    Path((_owner, repo, number)): Path<(String, String, u64)>,
) -> Response {
    let base = &mock.base;
    match (repo.as_str(), number) {
        ("alpha", 4) => paged(json!([commit_json(base, "alpha", "a4")]), None),
        ("alpha", 2) => paged(json!([commit_json(base, "alpha", "a2")]), None),
        ("gamma", 1) => paged(json!([commit_json(base, "gamma", "g1")]), None),
        _ => paged(json!([]), None),
    }
}

async fn commit_detail(
    State(mock): State<MockGitHub>,
    Path((_owner, repo, sha)): Path<(String, String, String)>,
) -> Response {
    if sha == "g1" {
        return not_found();
    }
    Json(json!({
        "sha": sha,
        "url": format!("{}/repos/acme/{repo}/commits/{sha}", mock.base),
        "stats": { "additions": 10, "deletions": 2, "total": 12 },
    }))
    .into_response()
}

async fn workflows(
    State(mock): State<MockGitHub>,
    Path((_owner, repo)): Path<(String, String)>,
) -> Response {
    if repo != "alpha" {
        return Json(json!({ "total_count": 0, "workflows": [] })).into_response();
    }
    Json(json!({
        "total_count": 1,
        "workflows": [{
            "id": 77,
            "url": format!("{}/repos/acme/alpha/actions/workflows/77", mock.base),
            "name": "CI",
            "path": ".github/workflows/ci.yml",
            "state": "active",
        }],
    }))
    .into_response()
}

async fn workflow_runs(
    State(mock): State<MockGitHub>,
    Path((_owner, repo)): Path<(String, String)>,
) -> Response {
    let run = |id: u64, conclusion: &str| {
        json!({
            "id": id,
            "url": format!("{}/repos/acme/{repo}/actions/runs/{id}", mock.base),
            "name": "CI",
            "status": "completed",
            "conclusion": conclusion,
            "created_at": "2025-06-01T11:00:00Z",
        })
    };
    match repo.as_str() {
        "alpha" => Json(json!({
            "total_count": 2,
            "workflow_runs": [run(1, "success"), run(2, "failure")],
        }))
        .into_response(),
        // gamma's workflow file was deleted, its runs remain.
        "gamma" => Json(json!({ "total_count": 1, "workflow_runs": [run(3, "success")] }))
            .into_response(),
        _ => Json(json!({ "total_count": 0, "workflow_runs": [] })).into_response(),
    }
}

#[tokio::test]
async fn test_pagination_follows_next_links() {
    let mock = spawn_mock().await;
    let client = GitHubClient::new(&mock.config()).expect("Failed to build client");

    let repos = client.fetch_org_repos("acme").await.unwrap();

    let names: Vec<&str> = repos.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    assert_eq!(repos[0].full_name, RepoId::new("acme", "alpha"));
    assert!(mock.requested("/orgs/acme/repos?page=2"));
    assert_eq!(mock.requests().len(), 2);
}

#[tokio::test]
async fn test_fetch_prs_stops_at_page_older_than_since() {
    let mock = spawn_mock().await;
    let client = GitHubClient::new(&mock.config()).expect("Failed to build client");

    let prs = client.fetch_prs(&RepoId::new("acme", "alpha")).await.unwrap();

    // The second page is kept whole, including the PR before the window.
    let numbers: Vec<u64> = prs.iter().map(|pr| pr.number).collect();
    assert_eq!(numbers, vec![4, 3, 2, 1]);
    assert!(mock.requested("direction=desc"));
    assert!(mock.requested("/repos/acme/alpha/pulls?page=2"));
    assert!(!mock.requested("/repos/acme/alpha/pulls?page=3"));
}

#[tokio::test]
async fn test_http_error_propagates() {
    let mock = spawn_mock().await;
    let client = GitHubClient::new(&mock.config()).expect("Failed to build client");

    let result = client.fetch_prs(&RepoId::new("acme", "beta")).await;

    assert!(matches!(result, Err(Error::GitHub(_))));
}

#[tokio::test]
async fn test_requests_carry_auth_and_version_headers() {
    let mock = spawn_mock().await;
    let client = GitHubClient::new(&mock.config()).expect("Failed to build client");

    client.fetch_org_repos("acme").await.unwrap();

    for request in mock.requests() {
        let authorization = request.authorization.expect("missing authorization header");
        assert!(authorization.contains("test-token"));
        assert_eq!(request.api_version.as_deref(), Some("2022-11-28"));
    }
}

#[tokio::test]
async fn test_enveloped_workflow_runs() {
    let mock = spawn_mock().await;
    let client = GitHubClient::new(&mock.config()).expect("Failed to build client");
    let alpha = RepoId::new("acme", "alpha");

    let workflows = client.fetch_workflows(&alpha).await.unwrap();
    let runs = client.fetch_workflow_runs(&alpha).await.unwrap();

    assert_eq!(workflows.len(), 1);
    assert_eq!(workflows[0].path, ".github/workflows/ci.yml");
    assert_eq!(runs.len(), 2);
    assert!(runs[0].succeeded());
    assert!(runs[1].failed());
    assert!(mock.requested("created=%3E%3D2025-01-01"));
}

#[tokio::test]
async fn test_collect_end_to_end_with_failing_repository() {
    let mock = spawn_mock().await;
    let config = mock.config();
    let client = GitHubClient::new(&config).expect("Failed to build client");

    let data = Collector::new(&client, &Unthrottled, &config)
        .collect()
        .await
        .unwrap();

    let repos: Vec<&str> = data.repos.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(repos, vec!["alpha", "gamma"]);
    assert_eq!(data.outcome(&RepoId::new("acme", "beta")), Some(RepoState::Errored));

    let prs: Vec<(String, u64)> = data
        .pull_requests
        .iter()
        .map(|pr| (pr.repo.repo.clone(), pr.number))
        .collect();
    assert_eq!(
        prs,
        vec![
            ("alpha".to_string(), 4),
            ("alpha".to_string(), 2),
            ("gamma".to_string(), 1)
        ]
    );
    assert_eq!(data.comments.len(), 2);
    assert_eq!(data.commits.len(), 3);
    // g1's details fail and are skipped.
    assert_eq!(data.commit_stats.len(), 2);
    assert_eq!(data.workflow_runs.len(), 3);
    assert!(mock.requested("/repos/acme/gamma/actions/runs"));
    assert!(!mock.requested("/actions/workflows"));

    let metrics = calculate_metrics(&data, config.since_date);
    assert_eq!(metrics.total_repos, 2);
    assert_eq!(metrics.total_prs, 3);
    assert_eq!(metrics.lgtm_count, 2);
    assert_eq!(metrics.total_additions, LineCount::Lines(20));
    assert_eq!(metrics.total_deletions, LineCount::Lines(4));
    assert_eq!(metrics.new_repos, vec!["gamma".to_string()]);
    assert_eq!(metrics.top_5_pr_openers.to_string(), "alice: 2, bob: 1");
    assert_eq!(metrics.total_workflow_runs, 3);
    assert_eq!(metrics.successful_workflow_runs, 2);
    assert_eq!(metrics.failed_workflow_runs, 1);
}
