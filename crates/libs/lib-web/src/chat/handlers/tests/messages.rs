//! # Message History Tests

use super::*;

#[tokio::test]
async fn test_list_without_credential_is_unauthorized() {
    let (app, _) = test_app(ScriptedGateway::replying("unused")).await;

    let response = send(&app, get_request("/messages", None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "Unauthorized");
}

#[tokio::test]
async fn test_list_with_tampered_token_is_unauthorized() {
    let (app, _) = test_app(ScriptedGateway::replying("unused")).await;
    let mut auth = bearer(1);
    auth.push('x');

    let response = send(&app, get_request("/messages", Some(auth.as_str()))).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_post_then_list_returns_the_message() {
    // Arrange
    let (app, _) = test_app(ScriptedGateway::replying("unused")).await;
    let auth = bearer(1);

    // Act
    let created = send(
        &app,
        json_request("POST", "/messages", Some(auth.as_str()), json!({ "text": "Hi", "sender": "user" })),
    )
    .await;
    let listed = send(&app, get_request("/messages", Some(auth.as_str()))).await;

    // Assert
    assert_eq!(created.status(), StatusCode::CREATED);
    let stored = body_json(created).await;
    assert_eq!(stored["text"], "Hi");
    assert_eq!(stored["sender"], "user");

    assert_eq!(listed.status(), StatusCode::OK);
    let history = body_json(listed).await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["text"], "Hi");
    assert_eq!(history[0]["sender"], "user");
    assert_eq!(history[0]["id"], stored["id"]);
}

#[tokio::test]
async fn test_history_is_scoped_to_caller() {
    let (app, _) = test_app(ScriptedGateway::replying("unused")).await;

    send(
        &app,
        json_request("POST", "/messages", Some(bearer(1).as_str()), json!({ "text": "mine", "sender": "user" })),
    )
    .await;

    let other = body_json(send(&app, get_request("/messages", Some(bearer(2).as_str()))).await).await;
    assert_eq!(other, json!([]));
}

#[tokio::test]
async fn test_assistant_alias_is_stored_as_ai() {
    let (app, _) = test_app(ScriptedGateway::replying("unused")).await;

    let response = send(
        &app,
        json_request("POST", "/messages", Some(bearer(1).as_str()), json!({ "text": "Hello!", "sender": "assistant" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["sender"], "ai");
}

#[tokio::test]
async fn test_invalid_message_bodies_are_rejected() {
    let (app, _) = test_app(ScriptedGateway::replying("unused")).await;
    let auth = bearer(1);
    let long = "x".repeat(10_001);

    let cases = [
        json!({ "text": "   ", "sender": "user" }),
        json!({ "text": long, "sender": "user" }),
        json!({ "text": "Hi", "sender": "robot" }),
        json!({ "sender": "user" }),
    ];

    for body in cases {
        let response = send(&app, json_request("POST", "/messages", Some(auth.as_str()), body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let history = body_json(send(&app, get_request("/messages", Some(auth.as_str()))).await).await;
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn test_post_pushes_to_owner_connection() {
    let (app, state) = test_app(ScriptedGateway::replying("unused")).await;
    let mut subscription = state.hub.register(Some(1)).await;

    send(
        &app,
        json_request("POST", "/messages", Some(bearer(1).as_str()), json!({ "text": "Hi", "sender": "user" })),
    )
    .await;

    let event = serde_json::to_value(subscription.recv().await.unwrap()).unwrap();
    assert_eq!(event["type"], "message");
    assert_eq!(event["data"]["text"], "Hi");
}
