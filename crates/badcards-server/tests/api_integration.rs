#[allow(dead_code)]
mod common;

use common::{TestServer, approve_join, create_session, request_join};
use uuid::Uuid;

use badcards_core::net::messages::SessionSnapshot;
use badcards_core::session::SessionPhase;

#[tokio::test]
async fn create_join_approve_flow() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let owner = Uuid::new_v4();

    let created = create_session(&client, &server.base_url(), owner, "Alice", None).await;
    assert_eq!(created.state_version, 1);
    assert_eq!(created.owner_guid, owner);
    assert_eq!(created.players.len(), 1);
    assert_eq!(created.phase, SessionPhase::Active);

    let bob = Uuid::new_v4();
    let joined = request_join(&client, &server.base_url(), &created.session_id, bob, "Bob").await;
    assert_eq!(joined.state_version, 2);
    assert_eq!(joined.pending.len(), 1);
    assert_eq!(joined.players.len(), 1);

    let approved = approve_join(&client, &server.base_url(), &created.session_id, owner, bob).await;
    assert_eq!(approved.state_version, 3);
    assert!(approved.pending.is_empty());
    assert_eq!(approved.players.len(), 2);
    assert_eq!(approved.players[1].guid, bob);
}

#[tokio::test]
async fn approve_requires_owner_and_pending_target() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let owner = Uuid::new_v4();

    let created = create_session(&client, &server.base_url(), owner, "Alice", None).await;
    let bob = Uuid::new_v4();
    request_join(&client, &server.base_url(), &created.session_id, bob, "Bob").await;

    // Bob cannot approve himself
    let resp = client
        .post(format!(
            "{}/api/v1/sessions/{}/approve",
            server.base_url(),
            created.session_id
        ))
        .json(&serde_json::json!({ "guid": bob, "target": bob }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "unauthorized");

    // Approving a guid that never asked to join is a conflict
    let resp = client
        .post(format!(
            "{}/api/v1/sessions/{}/approve",
            server.base_url(),
            created.session_id
        ))
        .json(&serde_json::json!({ "guid": owner, "target": Uuid::new_v4() }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "not_pending");
}

#[tokio::test]
async fn unknown_session_is_404() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/v1/sessions/ZZZZ-0000", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn invalid_nickname_is_400() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/v1/sessions", server.base_url()))
        .json(&serde_json::json!({ "owner_guid": Uuid::new_v4(), "nickname": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn win_freezes_scoring_and_owner_restart_resets() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let owner = Uuid::new_v4();

    let created = create_session(&client, &server.base_url(), owner, "Alice", Some(1)).await;
    let id = created.session_id;

    // One win finishes the session at threshold 1
    let resp = client
        .post(format!("{}/api/v1/sessions/{id}/round-win", server.base_url()))
        .json(&serde_json::json!({ "guid": owner, "target": owner }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let finished: SessionSnapshot = resp.json().await.unwrap();
    assert_eq!(finished.phase, SessionPhase::Finished);
    assert_eq!(finished.winner_guid, Some(owner));

    // Further scoring is rejected
    let resp = client
        .post(format!("{}/api/v1/sessions/{id}/round-win", server.base_url()))
        .json(&serde_json::json!({ "guid": owner, "target": owner }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "command_rejected");

    // Owner restart brings back a fresh round
    let resp = client
        .post(format!("{}/api/v1/sessions/{id}/restart", server.base_url()))
        .json(&serde_json::json!({ "guid": owner }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let fresh: SessionSnapshot = resp.json().await.unwrap();
    assert_eq!(fresh.phase, SessionPhase::Active);
    assert_eq!(fresh.winner_guid, None);
    assert!(fresh.players.iter().all(|p| p.wins == 0));
    assert!(fresh.state_version > finished.state_version);

    // Restarting an active session is rejected
    let resp = client
        .post(format!("{}/api/v1/sessions/{id}/restart", server.base_url()))
        .json(&serde_json::json!({ "guid": owner }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn spectate_and_leave_flow() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let owner = Uuid::new_v4();

    let created = create_session(&client, &server.base_url(), owner, "Alice", None).await;
    let id = created.session_id;
    let bob = Uuid::new_v4();
    request_join(&client, &server.base_url(), &id, bob, "Bob").await;
    approve_join(&client, &server.base_url(), &id, owner, bob).await;

    let resp = client
        .post(format!("{}/api/v1/sessions/{id}/spectate", server.base_url()))
        .json(&serde_json::json!({ "guid": bob }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let snap: SessionSnapshot = resp.json().await.unwrap();
    assert_eq!(snap.players.len(), 1);
    assert_eq!(snap.spectators.len(), 1);

    // Owner spectating their own session is rejected
    let resp = client
        .post(format!("{}/api/v1/sessions/{id}/spectate", server.base_url()))
        .json(&serde_json::json!({ "guid": owner }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let resp = client
        .post(format!("{}/api/v1/sessions/{id}/leave", server.base_url()))
        .json(&serde_json::json!({ "guid": bob }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Owner leave closes the whole session
    let resp = client
        .post(format!("{}/api/v1/sessions/{id}/leave", server.base_url()))
        .json(&serde_json::json!({ "guid": owner }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(format!("{}/api/v1/sessions/{id}", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn chat_eligibility_endpoint() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let owner = Uuid::new_v4();

    let created = create_session(&client, &server.base_url(), owner, "Alice", None).await;

    let resp = client
        .get(format!(
            "{}/api/v1/sessions/{}/chat-eligible?guid={}",
            server.base_url(),
            created.session_id,
            owner
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["eligible"], true);

    // A stranger is not chat-eligible
    let resp = client
        .get(format!(
            "{}/api/v1/sessions/{}/chat-eligible?guid={}",
            server.base_url(),
            created.session_id,
            Uuid::new_v4()
        ))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["eligible"], false);
}

#[tokio::test]
async fn health_reports_sessions() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();

    create_session(&client, &server.base_url(), Uuid::new_v4(), "Alice", None).await;

    let resp = client
        .get(format!("{}/health", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["sessions"]["active"], 1);

    let resp = client
        .get(format!("{}/ready", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "ready");
}
