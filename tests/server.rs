//! End-to-end test against a real listener.

use serde_json::{json, Value};
use todo_api::{db, router, serve, AppConfig, Services};
use tokio::net::TcpListener;

#[tokio::test]
async fn test_full_flow_over_http() {
    let pool = db::connect_in_memory().await.unwrap();
    let app = router(Services::new(pool, &AppConfig::default()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        if let Err(e) = serve(listener, app).await {
            eprintln!("server error: {:?}", e);
        }
    });

    let client = reqwest::Client::new();

    // unauthenticated access is refused
    let response = client.get(format!("{base}/todos")).send().await.unwrap();
    assert_eq!(response.status(), 401);

    for email in ["alice@example.com", "mallory@example.com"] {
        let response = client
            .post(format!("{base}/users"))
            .json(&json!({ "email": email, "password": "hunter2hunter2" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
    }

    let mut tokens = Vec::new();
    for email in ["alice@example.com", "mallory@example.com"] {
        let body: Value = client
            .post(format!("{base}/users/login"))
            .json(&json!({ "email": email, "password": "hunter2hunter2" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        tokens.push(body["token"].as_str().unwrap().to_string());
    }
    let (alice, mallory) = (&tokens[0], &tokens[1]);

    let created: Value = client
        .post(format!("{base}/todos"))
        .bearer_auth(alice)
        .json(&json!({ "title": "buy milk" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created, json!({ "id": 1, "title": "buy milk" }));

    // broken access control is closed: another user can neither read nor delete it
    let response = client
        .get(format!("{base}/todos/1"))
        .bearer_auth(mallory)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .delete(format!("{base}/todos/1"))
        .bearer_auth(mallory)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let todos: Vec<Value> = client
        .get(format!("{base}/todos"))
        .bearer_auth(alice)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(todos, vec![json!({ "id": 1, "title": "buy milk" })]);
}
