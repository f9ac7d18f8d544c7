use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::Filter;

use log::o;
use posttest::environment::{Config, Environment};
use posttest::response::{BriefCope, Pss4, Who5};
use posttest::routes;
use posttest::store::mock::MockStore;

static SLOG_SCOPE_GUARD: OnceCell<slog_scope::GlobalLoggerGuard> = OnceCell::new();

const BASE_PATH: &str = "posttest";

#[tokio::test]
async fn control_participants_can_submit_once() {
    let store = make_store();
    let filter = make_filter("control_participants_can_submit_once", store.clone());

    let session = create_session(&filter).await;

    let response = send(&filter, "POST", &participant_path(&session, "/check"), json!({ "value": "42" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let view = parse(response.body());
    assert_eq!(view["participant"]["status"], "valid");
    assert_eq!(view["participant"]["intervention_group"], false);
    assert_eq!(view["app_feedback_required"], false);
    assert_eq!(view["can_submit"], true);

    let response = send(&filter, "POST", &session_path(&session, "/submission"), complete_form("42")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().contains_key("server-timing"));

    let body = parse(response.body());
    let response_id = body["response_id"].as_i64().expect("response ID");

    let responses = store.responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].0, response_id);
    assert_eq!(responses[0].1.app_feedback, None);

    let response = send(&filter, "POST", &session_path(&session, "/submission"), complete_form("42")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        parse(response.body())["message"],
        "This post-test has already been submitted."
    );

    let view = get_view(&filter, &session).await;
    assert_eq!(view["submission"]["status"], "submitted");
    assert_eq!(view["submission"]["response_id"], response_id);
    assert_eq!(view["can_submit"], false);
}

#[tokio::test]
async fn unknown_sessions_are_not_found() {
    let filter = make_filter("unknown_sessions_are_not_found", make_store());
    let id = uuid::Uuid::new_v4().to_string();

    let response = warp::test::request()
        .path(&format!("/{}/sessions/{}", BASE_PATH, id))
        .method("GET")
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = parse(response.body());
    assert_eq!(body["session"], id.as_str());
    assert!(body["message"].as_str().unwrap().contains(&id));
}

#[tokio::test]
async fn invalid_participants_see_why() {
    let store = make_store();
    store.add_existing_response(7);
    let filter = make_filter("invalid_participants_see_why", store.clone());

    let session = create_session(&filter).await;

    for (input, message) in &[
        ("1000", "Invalid participant number. Please check your participant number and try again."),
        ("9", "Invalid participant number. Please check your participant number and try again."),
        ("7", "You have already submitted a post-test. Each participant can only submit once."),
        ("abc", "Please enter a valid participant number."),
    ] {
        let response = send(&filter, "POST", &participant_path(&session, "/check"), json!({ "value": input })).await;
        assert_eq!(response.status(), StatusCode::OK);

        let view = parse(response.body());
        assert_eq!(view["participant"]["status"], "invalid", "input {}", input);
        assert_eq!(view["participant"]["message"], *message, "input {}", input);
        assert_eq!(view["can_submit"], false, "input {}", input);
    }

    let response = send(&filter, "POST", &session_path(&session, "/submission"), complete_form("1000")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = send(&filter, "POST", &session_path(&session, "/submission"), complete_form("7")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = parse(response.body());
    assert_eq!(body["participant_number"], "7");
    assert_eq!(
        body["message"],
        "You have already submitted a post-test. Each participant can only submit once."
    );

    assert!(store.responses().is_empty());
}

#[tokio::test]
async fn intervention_participants_must_give_app_feedback() {
    let store = make_store();
    let filter = make_filter("intervention_participants_must_give_app_feedback", store.clone());

    let session = create_session(&filter).await;

    let view = parse(
        send(&filter, "POST", &participant_path(&session, "/check"), json!({ "value": 7 }))
            .await
            .body(),
    );
    assert_eq!(view["participant"]["intervention_group"], true);
    assert_eq!(view["app_feedback_required"], true);

    let response = send(&filter, "POST", &session_path(&session, "/submission"), complete_form("7")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(parse(response.body())["message"]
        .as_str()
        .unwrap()
        .contains("app_helpful_features"));

    let response = send(
        &filter,
        "POST",
        &session_path(&session, "/submission"),
        with_app_feedback(complete_form("7")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let responses = store.responses();
    assert_eq!(responses.len(), 1);
    assert!(responses[0].1.app_feedback.is_some());
}

#[tokio::test]
async fn anonymous_self_reported_users_can_submit() {
    let store = make_store();
    let filter = make_filter("anonymous_self_reported_users_can_submit", store.clone());

    let session = create_session(&filter).await;

    let response = send(
        &filter,
        "PUT",
        &session_path(&session, "/self-reported-intervention"),
        json!({ "value": true }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let view = parse(response.body());
    assert_eq!(view["self_reported_intervention"], true);
    assert_eq!(view["app_feedback_required"], true);
    assert_eq!(view["can_submit"], true);

    let response = send(
        &filter,
        "POST",
        &session_path(&session, "/submission"),
        with_app_feedback(complete_form("")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let responses = store.responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].1.participant_number, None);
    assert!(responses[0].1.app_feedback.is_some());
}

#[tokio::test(start_paused = true)]
async fn typed_numbers_are_validated_after_a_pause() {
    let store = make_store();
    let filter = make_filter("typed_numbers_are_validated_after_a_pause", store.clone());

    let session = create_session(&filter).await;

    for input in &["4", "42"] {
        let response = send(&filter, "PUT", &participant_path(&session, ""), json!({ "value": input })).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(parse(response.body())["participant"]["status"], "unvalidated");
    }

    assert_eq!(store.calls(), 0);

    tokio::time::sleep(Duration::from_secs(1)).await;

    let view = get_view(&filter, &session).await;
    assert_eq!(view["participant"]["status"], "valid");
    assert_eq!(view["participant"]["participant_number"], 42);
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn failed_saves_are_retryable() {
    let store = make_store();
    let filter = make_filter("failed_saves_are_retryable", store.clone());

    let session = create_session(&filter).await;

    store.fail_inserts(true);
    let response = send(&filter, "POST", &session_path(&session, "/submission"), complete_form("42")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        parse(response.body())["message"],
        "Failed to save your responses. Please try again."
    );

    store.fail_inserts(false);
    let response = send(&filter, "POST", &session_path(&session, "/submission"), complete_form("42")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(store.responses().len(), 1);
}

#[tokio::test]
async fn incomplete_forms_are_rejected() {
    let store = make_store();
    let filter = make_filter("incomplete_forms_are_rejected", store.clone());

    let session = create_session(&filter).await;

    let mut form = complete_form("");
    form["who5_calm"] = json!("");

    let response = send(&filter, "POST", &session_path(&session, "/submission"), form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(parse(response.body())["message"]
        .as_str()
        .unwrap()
        .contains("who5_calm"));

    let mut form = complete_form("");
    form["burnout_level"] = json!("");

    let response = send(&filter, "POST", &session_path(&session, "/submission"), form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        parse(response.body())["message"],
        "Please choose a burnout level."
    );

    assert!(store.responses().is_empty());
}

fn make_store() -> Arc<MockStore> {
    Arc::new(
        MockStore::new()
            .with_participant(42, "Control", true)
            .with_participant(7, "Intervention", true)
            .with_participant(9, "Intervention", false),
    )
}

fn make_filter(
    test_name: &str,
    store: Arc<MockStore>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone + 'static {
    initialize_global_logger();

    let logger = slog_scope::logger().new(o!("test" => test_name.to_owned()));
    let config = Config::new(
        BASE_PATH,
        Duration::from_millis(400),
        Duration::from_secs(60 * 60),
    );

    routes::make_api_routes(Environment::new(Arc::new(logger), store, config))
}

async fn create_session<F>(filter: &F) -> String
where
    F: Filter + Clone + Send + Sync + 'static,
    F::Extract: warp::Reply + Send,
{
    let response = warp::test::request()
        .path(&format!("/{}/sessions", BASE_PATH))
        .method("POST")
        .reply(filter)
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);

    let view = parse(response.body());
    assert_eq!(view["participant"]["status"], "unvalidated");
    assert_eq!(view["submission"]["status"], "idle");

    view["id"].as_str().expect("session ID").to_owned()
}

async fn get_view<F>(filter: &F, session: &str) -> Value
where
    F: Filter + Clone + Send + Sync + 'static,
    F::Extract: warp::Reply + Send,
{
    let response = warp::test::request()
        .path(&session_path(session, ""))
        .method("GET")
        .reply(filter)
        .await;

    assert_eq!(response.status(), StatusCode::OK);

    parse(response.body())
}

async fn send<F>(filter: &F, method: &str, path: &str, body: Value) -> warp::http::Response<Bytes>
where
    F: Filter + Clone + Send + Sync + 'static,
    F::Extract: warp::Reply + Send,
{
    let body = serde_json::to_vec(&body).expect("serialize request body");

    warp::test::request()
        .path(path)
        .method(method)
        .header("content-type", "application/json")
        .body(body)
        .reply(filter)
        .await
}

fn session_path(session: &str, suffix: &str) -> String {
    format!("/{}/sessions/{}{}", BASE_PATH, session, suffix)
}

fn participant_path(session: &str, suffix: &str) -> String {
    session_path(session, &format!("/participant-number{}", suffix))
}

fn parse(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("parse response as JSON")
}

fn complete_form(participant_number: &str) -> Value {
    let mut form = json!({
        "participant_number": participant_number,
        "burnout_level": "no_burnout",
        "additional_comments": "Thanks!",
    });

    let answers = form.as_object_mut().expect("form object");

    for column in Who5::COLUMNS.iter().chain(Pss4::COLUMNS) {
        answers.insert(column.to_string(), json!("1"));
    }

    for column in BriefCope::COLUMNS {
        answers.insert(column.to_string(), json!("2"));
    }

    form
}

fn with_app_feedback(mut form: Value) -> Value {
    form["app_helpful_features"] = json!("Daily check-ins");
    form["app_technical_issues"] = json!("None");
    form["app_suggestions"] = json!("Dark mode");
    form
}

fn initialize_global_logger() {
    SLOG_SCOPE_GUARD.get_or_init(|| slog_envlogger::init().expect("initialize slog-envlogger"));
}
