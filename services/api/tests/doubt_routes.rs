use api_lib::{
    config::Config,
    web::{router, state::AppState},
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::TimeZone;
use doubt_forum_core::{
    AnswerGenerationService, EscalationEngine, EscalationPolicy, InMemoryDoubtStore, ManualClock,
    PortResult,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct CannedAnswer;

#[async_trait]
impl AnswerGenerationService for CannedAnswer {
    async fn generate(&self, _prompt: &str) -> PortResult<String> {
        Ok("A hash collision is two keys mapping to one bucket.".to_string())
    }
}

struct Harness {
    app: Router,
    engine: Arc<EscalationEngine>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let config = Config::from_lookup(|_| None).expect("default config");
    let clock = Arc::new(ManualClock::new(
        chrono::Utc.with_ymd_and_hms(2024, 9, 2, 10, 0, 0).unwrap(),
    ));
    let engine = Arc::new(EscalationEngine::new(
        Arc::new(InMemoryDoubtStore::new()),
        Arc::new(CannedAnswer),
        clock.clone(),
        config.escalation_policy(),
    ));
    let app = router(Arc::new(AppState {
        engine: engine.clone(),
        config: Arc::new(config),
    }))
    .expect("router");
    Harness { app, engine, clock }
}

/// (user id, role)
type Caller<'a> = Option<(&'a str, &'a str)>;

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    caller: Caller<'_>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user_id, role)) = caller {
        builder = builder
            .header("x-user-id", user_id)
            .header("x-user-name", format!("User {}", user_id))
            .header("x-user-role", role);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

async fn get(app: &Router, uri: &str, caller: Caller<'_>) -> (StatusCode, Value) {
    send(app, Method::GET, uri, caller, None).await
}

async fn post(app: &Router, uri: &str, caller: Caller<'_>, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, caller, Some(body)).await
}

const ADA: Caller<'static> = Some(("s-ada", "student"));
const BEN: Caller<'static> = Some(("s-ben", "student"));
const SENIOR: Caller<'static> = Some(("s-sam", "senior"));
const PROFESSOR: Caller<'static> = Some(("p-rao", "professor"));

async fn ask(h: &Harness, caller: Caller<'_>, body: Value) -> Value {
    let (status, doubt) = post(&h.app, "/doubts", caller, body).await;
    assert_eq!(status, StatusCode::CREATED);
    doubt
}

fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_is_public_but_doubts_need_identity() {
    let h = harness();

    let (status, body) = get(&h.app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = get(&h.app, "/doubts", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(&h.app, "/doubts", Some(("s-ada", "dean"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn doubt_travels_from_ai_to_professor_resolution() {
    let h = harness();
    let doubt = ask(&h, ADA, json!({ "content": "What is a hash collision?" })).await;
    let id = doubt["id"].as_str().unwrap().to_string();
    assert_eq!(doubt["status"], "AI");
    assert_eq!(doubt["courseId"], "general");
    assert_eq!(doubt["askedBy"]["name"], "User s-ada");
    assert!(doubt["aiAnswer"].as_str().unwrap().contains("collision"));

    let action = format!("/doubts/{}/action", id);
    let (status, _) = post(&h.app, &action, BEN, json!({ "action": "CONFUSED" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = post(&h.app, &action, ADA, json!({ "action": "MAYBE" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, opened) = post(&h.app, &action, ADA, json!({ "action": "CONFUSED" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opened["status"], "OPEN");
    assert!(opened["lastEscalatedAt"].is_string());

    let (status, _) = post(&h.app, &action, ADA, json!({ "action": "SOLVED" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Seniors' turn.
    h.clock.advance(chrono::Duration::minutes(31));
    assert_eq!(h.engine.run_escalation_sweep(h.engine.now()).await, 1);

    let (_, for_ben) = get(&h.app, "/doubts", BEN).await;
    assert!(ids(&for_ben).is_empty());
    let (_, for_senior) = get(&h.app, "/doubts", SENIOR).await;
    assert_eq!(ids(&for_senior), vec![id.clone()]);
    let (_, for_ada) = get(&h.app, "/doubts", ADA).await;
    assert_eq!(for_ada[0]["status"], "SENIOR_VISIBLE");

    // A senior's reply does not resolve.
    let replies = format!("/doubts/{}/replies", id);
    let (status, replied) =
        post(&h.app, &replies, SENIOR, json!({ "content": "Think of buckets." })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(replied["status"], "SENIOR_VISIBLE");
    assert_eq!(replied["replies"][0]["role"], "STUDENT");

    // Faculty's turn.
    h.clock.advance(chrono::Duration::hours(2));
    assert_eq!(h.engine.run_escalation_sweep(h.engine.now()).await, 1);

    let (status, _) = get(&h.app, "/professor/doubts", SENIOR).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, queue) = get(&h.app, "/professor/doubts?courseId=general", PROFESSOR).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&queue), vec![id.clone()]);

    let (status, resolved) =
        post(&h.app, &replies, PROFESSOR, json!({ "content": "Two keys, one slot." })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resolved["status"], "RESOLVED");
    assert_eq!(resolved["resolved"], true);
    assert_eq!(resolved["replies"][1]["role"], "PROFESSOR");
    assert_eq!(resolved["replies"][1]["isAccepted"], true);
    let statuses: Vec<&str> = resolved["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["AI", "OPEN", "SENIOR_VISIBLE", "PROFESSOR", "RESOLVED"]);

    let (status, _) = post(&h.app, &replies, ADA, json!({ "content": "Thanks!" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, report) = get(&h.app, "/analytics/general", ADA).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["totalDoubts"], 1);
    assert_eq!(report["resolvedDoubts"], 1);
    assert_eq!(report["resolutionRate"], 100.0);
}

#[tokio::test]
async fn fetching_by_id_respects_tier_visibility() {
    let h = harness();
    let doubt = ask(&h, ADA, json!({ "content": "Why is Dijkstra greedy-safe?" })).await;
    let uri = format!("/doubts/{}", doubt["id"].as_str().unwrap());
    post(&h.app, &format!("{}/action", uri), ADA, json!({ "action": "CONFUSED" })).await;

    h.clock.advance(chrono::Duration::minutes(31));
    h.engine.run_escalation_sweep(h.engine.now()).await;
    h.clock.advance(chrono::Duration::hours(2));
    assert_eq!(h.engine.run_escalation_sweep(h.engine.now()).await, 1);

    // PROFESSOR tier: hidden from other students and seniors, open to the asker.
    let (status, _) = get(&h.app, &uri, BEN).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = get(&h.app, &uri, SENIOR).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, own) = get(&h.app, &uri, ADA).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own["status"], "PROFESSOR");
    let (status, _) = get(&h.app, &uri, PROFESSOR).await;
    assert_eq!(status, StatusCode::OK);

    // Once resolved it is public again.
    post(&h.app, &format!("{}/replies", uri), PROFESSOR, json!({ "content": "Cut property." }))
        .await;
    let (status, _) = get(&h.app, &uri, BEN).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn scope_all_is_reserved_for_professors() {
    let h = harness();
    let doubt = ask(&h, ADA, json!({ "content": "Is P = NP?", "courseId": "cs-theory" })).await;
    let id = doubt["id"].as_str().unwrap().to_string();
    post(
        &h.app,
        &format!("/doubts/{}/action", id),
        ADA,
        json!({ "action": "CONFUSED" }),
    )
    .await;

    let (status, _) = get(&h.app, "/doubts?scope=all", BEN).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get(&h.app, "/doubts?scope=mine", PROFESSOR).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The professor's own view hides OPEN doubts; scope=all shows them.
    let (_, scoped) = get(&h.app, "/doubts?courseId=cs-theory", PROFESSOR).await;
    assert!(ids(&scoped).is_empty());
    let (status, all) = get(&h.app, "/doubts?courseId=cs-theory&scope=all", PROFESSOR).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&all), vec![id]);

    let (_, other_course) = get(&h.app, "/doubts?courseId=algo&scope=all", PROFESSOR).await;
    assert!(ids(&other_course).is_empty());
}

#[tokio::test]
async fn insights_rank_topics_for_professors() {
    let h = harness();
    for (content, tags) in [
        ("Why does quicksort degrade?", json!(["sorting", "complexity"])),
        ("Is heapsort stable?", json!(["sorting"])),
        ("What is amortized cost?", json!(["complexity", "sorting"])),
    ] {
        ask(&h, BEN, json!({ "content": content, "courseId": "algo", "tags": tags })).await;
    }

    let (status, _) = get(&h.app, "/professor/insights/algo", BEN).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, insights) = get(&h.app, "/professor/insights/algo", PROFESSOR).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        insights,
        json!([
            { "topic": "sorting", "count": 3 },
            { "topic": "complexity", "count": 2 }
        ])
    );

    let (_, top) = get(&h.app, "/professor/insights/algo?limit=1", PROFESSOR).await;
    assert_eq!(top.as_array().unwrap().len(), 1);

    let (status, _) = get(&h.app, "/professor/insights/algo?limit=0", PROFESSOR).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_input_maps_to_client_errors() {
    let h = harness();

    let (status, _) = post(&h.app, "/doubts", ADA, json!({ "content": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = format!("/doubts/{}", uuid::Uuid::new_v4());
    let (status, _) = get(&h.app, &missing, ADA).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let replies = format!("{}/replies", missing);
    let (status, _) = post(&h.app, &replies, PROFESSOR, json!({ "content": "Hello?" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let doubt = ask(&h, ADA, json!({ "content": "Big-O of binary search?" })).await;
    let replies = format!("/doubts/{}/replies", doubt["id"].as_str().unwrap());
    let (status, _) = post(&h.app, &replies, BEN, json!({ "content": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[test]
fn default_policy_matches_production_profile() {
    let config = Config::from_lookup(|_| None).unwrap();
    assert_eq!(config.escalation_policy(), EscalationPolicy::default());
}
