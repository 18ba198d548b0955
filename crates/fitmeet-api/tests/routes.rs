use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use fitmeet_api::auth::{AppState, AppStateInner, create_token};
use fitmeet_db::{Database, NewUserOutcome};
use fitmeet_types::UserId;

const SECRET: &str = "integration-test-secret";

struct TestApp {
    state: AppState,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: SECRET.into(),
            token_ttl: Duration::days(1),
        });
        let router = fitmeet_api::router(state.clone());
        Self { state, router }
    }

    /// Insert a user straight into the database and mint a token for them,
    /// skipping the password hash cost of going through /auth/register.
    fn user(&self, name: &str) -> (UserId, String) {
        let id = UserId::generate();
        let outcome = self
            .state
            .db
            .create_user(id, name, &format!("{}@example.com", name), "unused", name, Utc::now())
            .unwrap();
        assert!(matches!(outcome, NewUserOutcome::Created(_)));
        let token = create_token(SECRET, Duration::days(1), id, name).unwrap();
        (id, token)
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_event(&self, token: &str, max_participants: u32) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/events",
                Some(token),
                Some(json!({
                    "name": "Sunrise run",
                    "activity_type": "running",
                    "starts_at": (Utc::now() + Duration::days(2)).to_rfc3339(),
                    "duration_minutes": 45,
                    "location": "Riverside park",
                    "max_participants": max_participants,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_then_login() {
    let app = TestApp::new();
    let creds = json!({ "username": "dana", "email": "dana@example.com", "password": "correct horse" });

    let (status, registered) = app.call(Method::POST, "/auth/register", None, Some(creds.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(registered["username"], "dana");
    assert!(registered["token"].as_str().is_some_and(|t| !t.is_empty()));

    let (status, body) = app.call(Method::POST, "/auth/register", None, Some(creds)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "username already taken");

    let (status, logged_in) = app
        .call(Method::POST, "/auth/login", None, Some(json!({ "username": "dana", "password": "correct horse" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logged_in["user_id"], registered["user_id"]);

    // The issued token opens protected routes
    let token = logged_in["token"].as_str().unwrap();
    let (status, profile) = app.call(Method::GET, "/users/profile", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], "dana@example.com");
    assert_eq!(profile["role"], "member");

    let (status, _) = app
        .call(Method::POST, "/auth/login", None, Some(json!({ "username": "dana", "password": "wrong password" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_input_is_validated() {
    let app = TestApp::new();
    let cases = [
        json!({ "username": "ab", "email": "ab@example.com", "password": "long enough" }),
        json!({ "username": "dana", "email": "not-an-email", "password": "long enough" }),
        json!({ "username": "dana", "email": "dana@example.com", "password": "short" }),
        json!({ "username": "dana", "email": "dana@example.com", "password": "long enough", "role": "trainer" }),
    ];
    for body in cases {
        let (status, err) = app.call(Method::POST, "/auth/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(err["error"].is_string());
    }
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new();

    let (status, body) = app.call(Method::GET, "/users/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication required");

    let forged = create_token("some-other-secret", Duration::days(1), UserId::generate(), "mallory").unwrap();
    let (status, _) = app.call(Method::GET, "/messages/conversations", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Listings stay public
    let (status, body) = app.call(Method::GET, "/events", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn joining_respects_capacity() {
    let app = TestApp::new();
    let (_, host) = app.user("host");
    let (ann_id, ann) = app.user("ann");
    let (_, ben) = app.user("ben");
    let (_, cal) = app.user("cal");
    let event = app.create_event(&host, 2).await;
    let join = format!("/events/{}/join", event);

    let (status, body) = app.call(Method::POST, &join, Some(&ann), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participant_count"], 1);
    assert_eq!(body["participants"], json!([ann_id]));

    let (status, body) = app.call(Method::POST, &join, Some(&ann), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "already joined this event");

    let (status, _) = app.call(Method::POST, &join, Some(&ben), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.call(Method::POST, &join, Some(&cal), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "event is full");

    // Leaving frees the slot
    let (status, body) = app.call(Method::POST, &format!("/events/{}/leave", event), Some(&ann), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participant_count"], 1);

    let (status, body) = app.call(Method::POST, &join, Some(&cal), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participant_count"], 2);

    let (status, _) = app
        .call(Method::POST, &format!("/events/{}/join", UserId::generate()), Some(&cal), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_fill_exactly_to_capacity() {
    let app = Arc::new(TestApp::new());
    let (_, host) = app.user("host");
    let event = app.create_event(&host, 3).await;

    let tokens: Vec<String> = (0..20).map(|i| app.user(&format!("runner{}", i)).1).collect();
    let handles: Vec<_> = tokens
        .into_iter()
        .map(|token| {
            let app = app.clone();
            let uri = format!("/events/{}/join", event);
            tokio::spawn(async move { app.call(Method::POST, &uri, Some(&token), None).await.0 })
        })
        .collect();

    let mut joined = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => joined += 1,
            StatusCode::BAD_REQUEST => {}
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(joined, 3);

    let (_, body) = app.call(Method::GET, &format!("/events/{}", event), None, None).await;
    assert_eq!(body["participant_count"], 3);
    assert_eq!(body["participants"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn only_the_host_changes_an_event() {
    let app = TestApp::new();
    let (_, host) = app.user("host");
    let (_, other) = app.user("other");
    let event = app.create_event(&host, 10).await;
    let uri = format!("/events/{}", event);

    let (status, _) = app.call(Method::PUT, &uri, Some(&other), Some(json!({ "name": "Hijacked" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.call(Method::DELETE, &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.call(Method::PUT, &uri, Some(&host), Some(json!({ "name": "Sunset run" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Sunset run");
    assert_eq!(body["location"], "Riverside park");

    // Fields outside the whitelist are rejected, not ignored
    let (status, _) = app
        .call(Method::PUT, &uri, Some(&host), Some(json!({ "participant_count": 0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.call(Method::DELETE, &uri, Some(&host), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "event not found");
}

#[tokio::test]
async fn update_checks_target_and_owner_before_the_body() {
    let app = TestApp::new();
    let (host_id, host) = app.user("host");
    let (_, other) = app.user("other");
    let event = format!("/events/{}", app.create_event(&host, 10).await);

    // Whatever a stranger sends, the answer is the same
    for body in [
        json!({ "max_participants": 0 }),
        json!({ "host_id": host_id }),
        json!({ "name": "" }),
        json!("not an object"),
    ] {
        let (status, err) = app.call(Method::PUT, &event, Some(&other), Some(body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(err["error"], "not authorized to modify this resource");
    }

    let missing_event = format!("/events/{}", UserId::generate());
    let (status, err) = app
        .call(Method::PUT, &missing_event, Some(&host), Some(json!({ "name": "" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "event not found");

    // The host still gets told what is wrong with the body
    let (status, err) = app
        .call(Method::PUT, &event, Some(&host), Some(json!({ "max_participants": 0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "max_participants must be between 1 and 10000");

    let (status, plan) = app
        .call(
            Method::POST,
            "/workout-plans",
            Some(&host),
            Some(json!({ "name": "Core", "exercises": [{ "name": "Plank", "sets": 3, "reps": 1 }] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let plan = format!("/workout-plans/{}", plan["id"].as_str().unwrap());

    let (status, _) = app
        .call(Method::PUT, &plan, Some(&other), Some(json!({ "exercises": [], "creator_id": host_id })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .call(Method::PUT, &format!("/workout-plans/{}", UserId::generate()), Some(&host), Some(json!({ "exercises": [] })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call(Method::PUT, &plan, Some(&host), Some(json!({ "exercises": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn event_creation_is_validated() {
    let app = TestApp::new();
    let (_, host) = app.user("host");
    let base = json!({
        "name": "Track intervals",
        "starts_at": (Utc::now() + Duration::days(1)).to_rfc3339(),
        "duration_minutes": 60,
        "location": "City stadium",
        "max_participants": 8,
    });

    let (status, _) = app.call(Method::POST, "/events", Some(&host), Some(base.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let cases = [
        ("max_participants", json!(0), "max_participants must be between 1 and 10000"),
        ("duration_minutes", json!(0), "duration_minutes must be between 1 and 1440"),
        ("latitude", json!(91.0), "latitude must be between -90 and 90"),
        ("longitude", json!(-181.0), "longitude must be between -180 and 180"),
        ("name", json!("   "), "name is required"),
    ];
    for (field, value, message) in cases {
        let mut body = base.clone();
        body[field] = value;
        let (status, err) = app.call(Method::POST, "/events", Some(&host), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", field);
        assert_eq!(err["error"], message);
    }
}

#[tokio::test]
async fn upcoming_filter_leaves_out_past_events() {
    let app = TestApp::new();
    let (_, host) = app.user("host");
    let upcoming = app.create_event(&host, 5).await;
    let (status, past) = app
        .call(
            Method::POST,
            "/events",
            Some(&host),
            Some(json!({
                "name": "Last week's ride",
                "activity_type": "cycling",
                "starts_at": (Utc::now() - Duration::days(7)).to_rfc3339(),
                "duration_minutes": 90,
                "location": "Harbour loop",
                "max_participants": 12,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, all) = app.call(Method::GET, "/events", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&Value> = all.as_array().unwrap().iter().map(|e| &e["id"]).collect();
    assert_eq!(ids, vec![&past["id"], &json!(upcoming)]);

    let (status, soon) = app.call(Method::GET, "/events?upcoming=true", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let soon = soon.as_array().unwrap();
    assert_eq!(soon.len(), 1);
    assert_eq!(soon[0]["id"], json!(upcoming));

    let (_, cycling) = app.call(Method::GET, "/events?activity_type=cycling", None, None).await;
    assert_eq!(cycling.as_array().unwrap().len(), 1);
    assert_eq!(cycling[0]["id"], past["id"]);
}

#[tokio::test]
async fn malformed_ids_and_bodies_are_validation_errors() {
    let app = TestApp::new();
    let (_, token) = app.user("ann");

    let (status, body) = app.call(Method::GET, "/events/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = app
        .call(Method::POST, "/workout-plans", Some(&token), Some(json!({ "name": "Empty", "exercises": [] })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.call(Method::PUT, "/users/profile", Some(&token), Some(json!({ "role": "trainer" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn workout_plan_lifecycle() {
    let app = TestApp::new();
    let (coach_id, coach) = app.user("coach");
    let (_, other) = app.user("other");

    let (status, plan) = app
        .call(
            Method::POST,
            "/workout-plans",
            Some(&coach),
            Some(json!({
                "name": "Push day",
                "difficulty": "beginner",
                "exercises": [
                    { "name": "Push-up", "sets": 3, "reps": 12 },
                    { "name": "Plank", "sets": 3, "reps": 1, "duration_seconds": 45 },
                ],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(plan["creator_id"], json!(coach_id));
    assert_eq!(plan["exercises"][1]["duration_seconds"], 45);
    let uri = format!("/workout-plans/{}", plan["id"].as_str().unwrap());

    let (status, _) = app.call(Method::PUT, &uri, Some(&other), Some(json!({ "name": "Mine now" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, listed) = app.call(Method::GET, &format!("/workout-plans?creator={}", coach_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = app.call(Method::DELETE, &uri, Some(&coach), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn trainer_directory() {
    let app = TestApp::new();
    let (coach_id, coach) = app.user("coach");
    let (_, other) = app.user("other");

    let (status, body) = app
        .call(
            Method::POST,
            "/trainers",
            Some(&coach),
            Some(json!({ "specialties": ["yoga", "mobility"], "hourly_rate": 40.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["specialties"], json!(["yoga", "mobility"]));

    let (status, _) = app
        .call(Method::POST, "/trainers", Some(&coach), Some(json!({ "specialties": ["yoga"] })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, listed) = app.call(Method::GET, "/trainers?specialty=yoga", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["id"], json!(coach_id));
    let (_, listed) = app.call(Method::GET, "/trainers?specialty=boxing", None, None).await;
    assert_eq!(listed, json!([]));

    let uri = format!("/trainers/{}", coach_id);
    let (status, _) = app.call(Method::PUT, &uri, Some(&other), Some(json!({ "hourly_rate": 1.0 }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call(Method::DELETE, &uri, Some(&coach), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ratings_average_and_reject_duplicates() {
    let app = TestApp::new();
    let (coach_id, coach) = app.user("coach");
    let (_, ann) = app.user("ann");
    let (_, ben) = app.user("ben");

    let app_ref = &app;
    let rate = move |token: String, score: u8| {
        let app = app_ref;
        async move {
            app.call(
                Method::POST,
                "/ratings",
                Some(&token),
                Some(json!({ "rated_user_id": coach_id, "score": score, "comment": "Solid session" })),
            )
            .await
        }
    };

    let (status, body) = rate(ann.clone(), 5).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["average_rating"], 5.0);

    let (status, body) = rate(ben.clone(), 3).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["average_rating"], 4.0);
    assert_eq!(body["rating_count"], 2);

    let (status, body) = rate(ann, 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "you have already rated this user");

    let (status, _) = rate(coach, 5).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = rate(ben, 6).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.call(Method::GET, &format!("/ratings/{}", coach_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["average_rating"], 4.0);
    assert_eq!(body["rating_count"], 2);
    assert_eq!(body["ratings"].as_array().unwrap().len(), 2);
    assert!(body["ratings"][0]["rater"]["display_name"].is_string());

    let (status, _) = app.call(Method::GET, &format!("/ratings/{}", UserId::generate()), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn conversations_list_latest_partner_first() {
    let app = TestApp::new();
    let (me_id, me) = app.user("me");
    let (a_id, a) = app.user("alex");
    let (b_id, b) = app.user("blair");

    let app_ref = &app;
    let send = move |token: String, to: UserId, content: &'static str| {
        let app = app_ref;
        async move {
            app.call(Method::POST, "/messages", Some(&token), Some(json!({ "recipient_id": to, "content": content })))
                .await
        }
    };

    assert_eq!(send(me.clone(), a_id, "hi alex").await.0, StatusCode::CREATED);
    assert_eq!(send(b.clone(), me_id, "hi there").await.0, StatusCode::CREATED);
    assert_eq!(send(a.clone(), me_id, "hey!").await.0, StatusCode::CREATED);
    let (status, last) = send(me.clone(), b_id, "run tomorrow?").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, inbox) = app.call(Method::GET, "/messages/conversations", Some(&me), None).await;
    assert_eq!(status, StatusCode::OK);
    let partners: Vec<&Value> = inbox.as_array().unwrap().iter().map(|c| &c["partner"]["id"]).collect();
    assert_eq!(partners, vec![&json!(b_id), &json!(a_id)]);
    assert_eq!(inbox[0]["last_message"]["id"], last["id"]);

    let (status, thread) = app
        .call(Method::GET, &format!("/messages/conversation/{}", a_id), Some(&me), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread[0]["content"], "hey!");
    assert_eq!(thread[1]["content"], "hi alex");

    // Page through the same thread one message at a time
    let (_, first) = app
        .call(Method::GET, &format!("/messages/conversation/{}?limit=1", a_id), Some(&me), None)
        .await;
    assert_eq!(first.as_array().unwrap().len(), 1);
    let uri = format!(
        "/messages/conversation/{}?limit=10&before={}&before_id={}",
        a_id,
        first[0]["created_at"].as_str().unwrap().replace('+', "%2B"),
        first[0]["id"].as_str().unwrap(),
    );
    let (status, older) = app.call(Method::GET, &uri, Some(&me), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(older.as_array().unwrap().len(), 1);
    assert_eq!(older[0]["content"], "hi alex");

    let (status, _) = send(me.clone(), me_id, "note to self").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(me.clone(), UserId::generate(), "anyone?").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(me, a_id, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn buddies_come_from_shared_events() {
    let app = TestApp::new();
    let (_, host) = app.user("host");
    let (ann_id, ann) = app.user("ann");
    let (_, ben) = app.user("ben");

    let first = app.create_event(&host, 5).await;
    let second = app.create_event(&host, 5).await;
    for event in [&first, &second] {
        let (status, _) = app.call(Method::POST, &format!("/events/{}/join", event), Some(&ann), None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = app.call(Method::POST, &format!("/events/{}/join", first), Some(&ben), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, buddies) = app.call(Method::GET, "/users/buddies", Some(&host), None).await;
    assert_eq!(status, StatusCode::OK);
    let buddies = buddies.as_array().unwrap();
    assert_eq!(buddies.len(), 2);
    assert_eq!(buddies[0]["id"], json!(ann_id));
    assert_eq!(buddies[0]["shared_events"], 2);
    assert_eq!(buddies[1]["shared_events"], 1);
}
