use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use futures_util::StreamExt;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;
use uuid::Uuid;

use pigeon_api::{AppState, AppStateInner, router};
use pigeon_db::Database;
use pigeon_gateway::dispatcher::Dispatcher;
use pigeon_types::events::GatewayEvent;

const SECRET: &str = "integration-test-secret";
const PASSWORD: &str = "hunter2hunter2";

struct TestApp {
    _dir: TempDir,
    state: AppState,
    router: Router,
}

struct TestUser {
    id: Uuid,
    token: String,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("pigeon.db")).unwrap();
        let state: AppState = Arc::new(AppStateInner {
            db,
            jwt_secret: SECRET.into(),
            token_ttl: chrono::Duration::days(1),
            dispatcher: Dispatcher::new(),
        });
        let router = router(state.clone());
        Self {
            _dir: dir,
            state,
            router,
        }
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, token);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn get(&self, uri: &str, user: &TestUser) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(&user.token), None).await
    }

    async fn post(&self, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(&user.token), Some(body)).await
    }

    async fn register(&self, username: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/register",
            None,
            Some(json!({
                "firstName": "Test",
                "lastName": username,
                "username": username,
                "email": format!("{username}@example.com"),
                "password": PASSWORD,
            })),
        )
        .await
    }

    /// Register and log in; the token is sent bare, the way the mobile client does.
    async fn user(&self, username: &str) -> TestUser {
        let (status, _) = self.register(username).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .call(
                Method::POST,
                "/login",
                None,
                Some(json!({ "identifier": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        TestUser {
            id: body["user_id"].as_str().unwrap().parse().unwrap(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }
}

fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|v| v["_id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn friend_chat_scenario() {
    let app = TestApp::new();
    let bob = app.user("bob").await;
    let alice = app.user("alice").await;

    let (status, body) = app.get("/search_users?username=BO", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["users"]), vec![bob.id.to_string()]);
    assert_eq!(body["users"][0]["is_friend"], false);

    let (status, body) = app.post("/users/add-friend", &alice, json!({ "friend_id": bob.id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Friend added");

    let (status, body) = app
        .post("/messages", &alice, json!({ "recipient_id": bob.id, "content": "hello" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"]["type"], "private");
    assert_eq!(body["message"]["sender_name"], "alice");

    let (status, from_alice) = app.get(&format!("/messages/{}", bob.id), &alice).await;
    assert_eq!(status, StatusCode::OK);
    let (status, from_bob) = app.get(&format!("/messages/{}", alice.id), &bob).await;
    assert_eq!(status, StatusCode::OK);

    for view in [&from_alice, &from_bob] {
        let messages = view["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["sender_id"], alice.id.to_string());
        assert_eq!(messages[0]["content"], "hello");
    }
    assert_eq!(from_alice["messages"][0]["_id"], from_bob["messages"][0]["_id"]);
}

#[tokio::test]
async fn group_chat_scenario() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let carol = app.user("carol").await;

    let (status, body) = app
        .post("/groups/create", &alice, json!({ "name": "  team  ", "members": [bob.id] }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["group"]["name"], "team");
    let group_id = body["group"]["_id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post("/messages", &alice, json!({ "group_id": group_id, "content": "hi team" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.get(&format!("/messages/{group_id}"), &bob).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "hi team");
    assert_eq!(messages[0]["type"], "group");
    assert_eq!(messages[0]["group_id"], group_id);

    let (status, body) = app.get(&format!("/messages/{group_id}"), &carol).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn creator_is_always_a_member() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    let (_, body) = app
        .post("/groups/create", &alice, json!({ "name": "pair", "members": [bob.id, bob.id] }))
        .await;
    let members: HashSet<String> = body["group"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(members, HashSet::from([alice.id.to_string(), bob.id.to_string()]));

    let (status, body) = app.get("/groups", &bob).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groups"].as_array().unwrap().len(), 1);

    let group_id = body["groups"][0]["_id"].as_str().unwrap().to_string();
    let (status, body) = app.get(&format!("/group/{group_id}"), &alice).await;
    assert_eq!(status, StatusCode::OK);
    let mut usernames: Vec<&str> = body["group"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["username"].as_str().unwrap())
        .collect();
    usernames.sort();
    assert_eq!(usernames, vec!["alice", "bob"]);
    assert!(body["group"]["members"][0].get("password").is_none());
}

#[tokio::test]
async fn group_creation_validation() {
    let app = TestApp::new();
    let alice = app.user("alice").await;

    let (status, body) = app.post("/groups/create", &alice, json!({ "name": "   ", "members": [alice.id] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Group name must not be empty");

    let (status, body) = app.post("/groups/create", &alice, json!({ "name": "team", "members": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Select at least one member");

    let (status, _) = app
        .post("/groups/create", &alice, json!({ "name": "team", "members": [Uuid::new_v4()] }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get("/groups", &alice).await;
    assert!(body["groups"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn adding_members() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let carol = app.user("carol").await;

    let (_, body) = app.post("/groups/create", &alice, json!({ "name": "team", "members": [bob.id] })).await;
    let group_id = body["group"]["_id"].as_str().unwrap().to_string();
    let add_uri = format!("/groups/{group_id}/add_user");

    // Outsiders cannot add themselves
    let (status, _) = app.post(&add_uri, &carol, json!({ "user_id": carol.id })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post(&add_uri, &bob, json!({ "user_id": carol.id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Member added");

    let (status, body) = app.post(&add_uri, &alice, json!({ "user_id": carol.id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Already a member");

    let (status, _) = app.post(&add_uri, &alice, json!({ "user_id": Uuid::new_v4() })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let missing_group = format!("/groups/{}/add_user", Uuid::new_v4());
    let (status, _) = app.post(&missing_group, &alice, json!({ "user_id": carol.id })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get(&format!("/messages/{group_id}"), &carol).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn registration_and_login_errors() {
    let app = TestApp::new();
    app.user("alice").await;

    let (status, body) = app.register("ALICE").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Username or email already exists");

    let (status, body) = app
        .call(
            Method::POST,
            "/login",
            None,
            Some(json!({ "identifier": "alice", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, _) = app
        .call(
            Method::POST,
            "/login",
            None,
            Some(json!({ "identifier": "nobody", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(
            Method::POST,
            "/login",
            None,
            Some(json!({ "identifier": "Alice@Example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new();
    let alice = app.user("alice").await;

    let (status, body) = app.call(Method::GET, "/friends", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    // The old scheme sent the raw user id as the credential
    let user_id = alice.id.to_string();
    let (status, _) = app.call(Method::GET, "/friends", Some(&user_id), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let bearer = format!("Bearer {}", alice.token);
    let (status, body) = app.call(Method::GET, "/users/me", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["_id"], alice.id.to_string());

    let (status, _) = app.call(Method::GET, "/gateway", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn search_semantics() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let malice = app.user("malice").await;

    let (status, body) = app.get("/search_users?username=", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["users"].as_array().unwrap().is_empty());

    let (_, body) = app.get("/search_users?username=%20%20", &alice).await;
    assert!(body["users"].as_array().unwrap().is_empty());

    let (_, body) = app.get("/search_users?username=lic", &alice).await;
    assert_eq!(ids(&body["users"]), vec![malice.id.to_string()]);

    let (_, body) = app.get("/search_users?username=lic&exclude_self=false", &alice).await;
    assert_eq!(ids(&body["users"]), vec![alice.id.to_string(), malice.id.to_string()]);

    app.post("/add_friend", &alice, json!({ "friend_id": malice.id })).await;
    let (_, body) = app.get("/search_users?username=mal", &alice).await;
    assert_eq!(body["users"][0]["is_friend"], true);
}

#[tokio::test]
async fn add_friend_is_idempotent_and_symmetric() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    let (status, _) = app.post("/users/add-friend", &alice, json!({ "friend_id": bob.id })).await;
    assert_eq!(status, StatusCode::OK);
    let (_, once) = app.get("/friends", &alice).await;

    let (status, body) = app.post("/users/add-friend", &alice, json!({ "friend_id": bob.id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Already friends");
    let (_, twice) = app.get("/friends", &alice).await;
    assert_eq!(ids(&once["friends"]), ids(&twice["friends"]));

    let (_, bobs) = app.get("/friends", &bob).await;
    assert_eq!(ids(&bobs["friends"]), vec![alice.id.to_string()]);

    let (status, _) = app.post("/users/add-friend", &alice, json!({ "friend_id": alice.id })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/users/add-friend", &alice, json!({ "friend_id": Uuid::new_v4() })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn send_message_validation() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let carol = app.user("carol").await;

    let (status, body) = app.post("/messages", &alice, json!({ "recipient_id": bob.id, "content": "  \n " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message content must not be empty");

    let (status, _) = app.post("/messages", &alice, json!({ "content": "to nobody" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/messages", &alice, json!({ "recipient_id": bob.id, "group_id": bob.id, "content": "both" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/messages", &alice, json!({ "recipient_id": Uuid::new_v4(), "content": "hi" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.post("/groups/create", &alice, json!({ "name": "team", "members": [bob.id] })).await;
    let group_id = body["group"]["_id"].as_str().unwrap().to_string();
    let (status, _) = app.post("/messages", &carol, json!({ "group_id": group_id, "content": "let me in" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get(&format!("/messages/{}", Uuid::new_v4()), &alice).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Conversation not found");
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let app = TestApp::new();
    let alice = app.user("alice").await;

    let (status, body) = app.post("/users/add-friend", &alice, json!({ "friend_id": "not-a-uuid" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.get("/messages/not-a-uuid", &alice).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn incremental_sync_with_after() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    for content in ["one", "two", "three"] {
        app.post("/messages", &alice, json!({ "recipient_id": bob.id, "content": content })).await;
    }

    let uri = format!("/messages/{}", alice.id);
    let (_, all) = app.get(&uri, &bob).await;
    let first_seq = all["messages"][0]["seq"].as_i64().unwrap();

    let (_, rest) = app.get(&format!("{uri}?after={first_seq}"), &bob).await;
    let contents: Vec<&str> = rest["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["two", "three"]);

    let (_, page) = app.get(&format!("{uri}?limit=1"), &bob).await;
    assert_eq!(page["messages"].as_array().unwrap().len(), 1);
    assert_eq!(page["messages"][0]["content"], "one");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sends_are_totally_ordered() {
    let app = Arc::new(TestApp::new());
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let app = app.clone();
        let token = if i % 2 == 0 { alice.token.clone() } else { bob.token.clone() };
        let recipient = if i % 2 == 0 { bob.id } else { alice.id };
        handles.push(tokio::spawn(async move {
            let sender = TestUser { id: Uuid::nil(), token };
            let (status, _) = app
                .post("/messages", &sender, json!({ "recipient_id": recipient, "content": format!("msg {i}") }))
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let (_, body) = app.get(&format!("/messages/{}", bob.id), &alice).await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 20);

    let seqs: Vec<i64> = messages.iter().map(|m| m["seq"].as_i64().unwrap()).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));

    let timestamps: Vec<chrono::DateTime<chrono::Utc>> = messages
        .iter()
        .map(|m| m["timestamp"].as_str().unwrap().parse().unwrap())
        .collect();
    assert!(timestamps.windows(2).all(|w| w[0] < w[1]));

    let unique: HashSet<&str> = messages.iter().map(|m| m["_id"].as_str().unwrap()).collect();
    assert_eq!(unique.len(), 20);
}

#[tokio::test]
async fn participants_are_notified_of_new_messages() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let carol = app.user("carol").await;

    let (_, mut bob_rx) = app.state.dispatcher.register_user_channel(bob.id).await;
    let (_, mut carol_rx) = app.state.dispatcher.register_user_channel(carol.id).await;

    app.post("/messages", &alice, json!({ "recipient_id": bob.id, "content": "ping" })).await;

    match bob_rx.recv().await {
        Some(GatewayEvent::MessageCreate { message }) => {
            assert_eq!(message.content, "ping");
            assert_eq!(message.sender_id, alice.id);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(carol_rx.try_recv().is_err());
}

#[tokio::test]
async fn group_detail_is_members_only() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let carol = app.user("carol").await;

    let (_, body) = app.post("/groups/create", &alice, json!({ "name": "team", "members": [bob.id] })).await;
    let group_id = body["group"]["_id"].as_str().unwrap().to_string();

    let (status, body) = app.get(&format!("/group/{group_id}"), &carol).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You are not a member of this group");

    let (status, body) = app.get(&format!("/groups/{}", Uuid::new_v4()), &alice).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Group not found");

    let (status, _) = app.get(&format!("/groups/{group_id}"), &bob).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn overlong_content_is_rejected() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    let (status, body) = app
        .post("/messages", &alice, json!({ "recipient_id": bob.id, "content": "x".repeat(4001) }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message content must be at most 4000 characters");

    let (status, _) = app
        .post("/messages", &alice, json!({ "recipient_id": bob.id, "content": "x".repeat(4000) }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn media_messages_keep_url_and_caption() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    let (status, body) = app
        .post(
            "/messages",
            &alice,
            json!({
                "recipient_id": bob.id,
                "content": "",
                "media_url": "https://cdn.example.com/cat.png",
                "caption": "  my cat  ",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"]["media_url"], "https://cdn.example.com/cat.png");

    let (_, history) = app.get(&format!("/messages/{}", alice.id), &bob).await;
    let message = &history["messages"][0];
    assert_eq!(message["media_url"], "https://cdn.example.com/cat.png");
    assert_eq!(message["caption"], "my cat");
    assert_eq!(message["content"], "");

    let (_, body) = app.post("/messages", &alice, json!({ "recipient_id": bob.id, "content": "plain" })).await;
    assert!(body["message"]["media_url"].is_null());
    assert!(body["message"]["caption"].is_null());

    // A caption alone is not a message
    let (status, _) = app
        .post("/messages", &alice, json!({ "recipient_id": bob.id, "content": " ", "caption": "lonely" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn next_event(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("gateway event within 5s")
            .expect("socket open")
            .unwrap();
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn gateway_sends_ready_then_pushes_new_messages() {
    let app = TestApp::new();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_router = app.router.clone();
    let server = tokio::spawn(async move { axum::serve(listener, server_router).await });

    assert!(connect_async(format!("ws://{addr}/gateway?token=not-a-jwt")).await.is_err());

    let (mut socket, _) = connect_async(format!("ws://{addr}/gateway?token={}", bob.token)).await.unwrap();
    let ready = next_event(&mut socket).await;
    assert_eq!(ready["type"], "Ready");
    assert_eq!(ready["data"]["user_id"], bob.id.to_string());
    assert_eq!(ready["data"]["username"], "bob");

    let (status, _) = app
        .post("/messages", &alice, json!({ "recipient_id": bob.id, "content": "over the wire" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let event = next_event(&mut socket).await;
    assert_eq!(event["type"], "MessageCreate");
    assert_eq!(event["data"]["message"]["content"], "over the wire");
    assert_eq!(event["data"]["message"]["sender_id"], alice.id.to_string());

    server.abort();
}
