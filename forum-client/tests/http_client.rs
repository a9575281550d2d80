use std::path::PathBuf;

use forum_client::{ForumClient, ForumClientError, ForumClientHttp, ListOptions};
use serde_json::{Value, json};
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_file() -> PathBuf {
    std::env::temp_dir().join(format!("forum-client-{}.token", Uuid::new_v4()))
}

async fn client(server: &MockServer) -> (ForumClientHttp, PathBuf) {
    let file = token_file();
    let client = ForumClientHttp::connect(&server.uri())
        .await
        .unwrap()
        .with_token_file(&file);
    (client, file)
}

fn user_json(id: Uuid, username: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "email": format!("{username}@example.com"),
        "first_name": "",
        "last_name": "",
        "is_staff": false,
        "is_superuser": false,
        "date_joined": "2024-05-01T10:00:00Z"
    })
}

fn post_json(id: Uuid, parent: Option<Uuid>, text: &str) -> Value {
    json!({
        "id": id,
        "author_id": Uuid::nil(),
        "parent_post_id": parent,
        "username": "alice",
        "email": "alice@example.com",
        "text": text,
        "timestamp": "2024-05-01T10:00:00Z",
        "image": null,
        "text_file": null
    })
}

fn auth_json(token: &str, username: &str) -> Value {
    json!({
        "access_token": token,
        "expires_in": 3600,
        "token_type": "Bearer",
        "user": user_json(Uuid::new_v4(), username)
    })
}

#[tokio::test]
async fn login_stores_token_and_sends_it_on_writes() {
    let server = MockServer::start().await;
    let (mut client, file) = client(&server).await;
    let post_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"username": "alice", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_json("tok-1", "alice")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(post_json(post_id, None, "hello")))
        .expect(1)
        .mount(&server)
        .await;

    let user = client.login("alice".into(), "pw".into()).await.unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(client.token(), Some("tok-1"));
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "tok-1");

    let post = client.create_post("hello".into(), None).await.unwrap();
    assert_eq!(post.id, post_id);
    assert_eq!(post.text, "hello");

    let _ = std::fs::remove_file(file);
}

#[tokio::test]
async fn token_is_read_back_from_file() {
    let server = MockServer::start().await;
    let file = token_file();
    std::fs::write(&file, "saved-token\n").unwrap();
    let mut client = ForumClientHttp::connect(&server.uri())
        .await
        .unwrap()
        .with_token_file(&file);
    let id = Uuid::new_v4();

    Mock::given(method("DELETE"))
        .and(path(format!("/api/posts/{id}")))
        .and(header("Authorization", "Bearer saved-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deleted": [id]})))
        .mount(&server)
        .await;

    let deleted = client.delete_post(id).await.unwrap();
    assert_eq!(deleted, vec![id]);

    let _ = std::fs::remove_file(file);
}

#[tokio::test]
async fn writes_without_token_fail_locally() {
    let server = MockServer::start().await;
    let (mut client, _file) = client(&server).await;

    let err = client.create_post("hello".into(), None).await.unwrap_err();
    assert!(matches!(err, ForumClientError::Unauthorized));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn error_bodies_map_to_variants() {
    let server = MockServer::start().await;
    let (mut client, _file) = client(&server).await;
    let missing = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/api/posts/{missing}")))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"error": format!("post not found: {missing}")})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({"error": "A user with that username already exists."})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/search/suggest"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    match client.get_post(missing).await.unwrap_err() {
        ForumClientError::NotFound(message) => assert!(message.contains("post not found")),
        other => panic!("unexpected error: {other:?}"),
    }
    match client
        .register("alice".into(), "alice@example.com".into(), "pw".into())
        .await
        .unwrap_err()
    {
        ForumClientError::Conflict(message) => assert!(message.contains("already exists")),
        other => panic!("unexpected error: {other:?}"),
    }
    match client.suggest("he".into()).await.unwrap_err() {
        ForumClientError::Server { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn threads_carry_depth_and_paging() {
    let server = MockServer::start().await;
    let (mut client, _file) = client(&server).await;
    let root = Uuid::new_v4();
    let reply = Uuid::new_v4();

    let mut root_entry = post_json(root, None, "root");
    root_entry["depth"] = json!(0);
    root_entry["is_leaf"] = json!(false);
    let mut reply_entry = post_json(reply, Some(root), "reply");
    reply_entry["depth"] = json!(2);
    reply_entry["is_leaf"] = json!(true);

    Mock::given(method("GET"))
        .and(path("/api/posts/threads"))
        .and(query_param("page", "2"))
        .and(query_param("sort_by", "username"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [root_entry, reply_entry],
            "page": 2,
            "page_size": 25,
            "total": 27,
            "sort_by": "username",
            "order": "desc"
        })))
        .mount(&server)
        .await;

    let page = client
        .list_threads(ListOptions {
            sort_by: Some("username".into()),
            page: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(page.total, 27);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].depth, 0);
    assert_eq!(page.items[1].depth, 2);
    assert_eq!(page.items[1].post.parent_post_id, Some(root));
    assert!(page.items[1].is_leaf);
}

#[tokio::test]
async fn search_reports_engine_errors() {
    let server = MockServer::start().await;
    let (mut client, _file) = client(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("q", "rust"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": [],
            "total": 0,
            "aggregations": {"usernames": [], "dates": []},
            "query": "rust",
            "filters": {},
            "error": "search engine unavailable"
        })))
        .mount(&server)
        .await;

    let results = client.search(Some("rust".into()), None, None).await.unwrap();
    assert!(results.hits.is_empty());
    assert_eq!(results.error.as_deref(), Some("search engine unavailable"));
}

#[tokio::test]
async fn logout_forgets_token() {
    let server = MockServer::start().await;
    let (mut client, file) = client(&server).await;
    client.set_token("tok-2".into()).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(header("Authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    client.logout().await.unwrap();
    assert!(client.token().is_none());
    assert!(!file.exists());
}
