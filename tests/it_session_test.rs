//! Integration tests for login, logout and session persistence

mod common;

use campus_rs_client::{
    ApiClient, AuthClientConfig, AuthClientHttp, ClientError, FileBackend, PublicClient, Session,
    SessionState, TokenPair, TokenStore,
};
use common::{access_token, bearer, client_for};
use mockito::{Matcher, Server};
use serde_json::json;

#[tokio::test]
async fn login_establishes_session() {
    //* Given
    let mut server = Server::new_async().await;
    let a1 = access_token(21, "a1");

    let login_mock = server
        .mock("POST", "/token/")
        .match_body(Matcher::Json(json!({
            "email": "test@test.com",
            "password": "password"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "access": a1, "refresh": "R1" }).to_string())
        .expect(1)
        .create_async()
        .await;
    let profile_mock = server
        .mock("GET", "/usuarios/21")
        .match_header("authorization", bearer(&a1).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":21,"username":"test"}"#)
        .expect(1)
        .create_async()
        .await;

    let store = TokenStore::in_memory();
    let (client, _logout) = client_for(&server, store.clone());
    let mut watcher = client.session().subscribe();

    //* When
    let state = client
        .login("test@test.com", "password")
        .await
        .expect("login should succeed");
    let user_id = state.user_id.expect("token carries a user id");
    let profile: serde_json::Value = client
        .send(client.get(&format!("usuarios/{user_id}")).unwrap())
        .await
        .expect("profile request should succeed")
        .json()
        .await
        .unwrap();

    //* Then
    login_mock.assert_async().await;
    profile_mock.assert_async().await;
    assert_eq!(
        state,
        SessionState {
            user_id: Some(21),
            access_token: Some(a1.clone()),
        }
    );
    assert!(watcher.has_changed().unwrap());
    assert_eq!(watcher.borrow_and_update().user_id, Some(21));
    assert_eq!(store.load(), Some(TokenPair::new(a1, "R1")));
    assert_eq!(profile["username"], "test");
}

#[tokio::test]
async fn failed_login_leaves_session_untouched() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/token/")
        .with_status(401)
        .with_body(r#"{"detail":"No active account found with the given credentials"}"#)
        .create_async()
        .await;

    let store = TokenStore::in_memory();
    let (client, logout) = client_for(&server, store.clone());

    //* When
    let result = client.login("test@test.com", "wrong").await;

    //* Then
    match result {
        Err(ClientError::Authentication(message)) => {
            assert!(message.contains("401"), "unexpected message: {message}");
        }
        other => panic!("expected authentication error, got {other:?}"),
    }
    assert!(store.load().is_none());
    assert_eq!(client.session().current(), SessionState::default());
    assert_eq!(logout.calls(), 0);
}

#[tokio::test]
async fn logout_clears_store_and_session() {
    //* Given
    let server = Server::new_async().await;
    let store = TokenStore::in_memory();
    store.save(&TokenPair::new(access_token(22, "a1"), "R1"));

    let (client, logout) = client_for(&server, store.clone());
    assert!(client.session().is_authenticated());
    let mut watcher = client.session().subscribe();

    //* When
    client.logout();

    //* Then
    assert_eq!(logout.calls(), 1);
    assert!(store.load().is_none());
    assert!(watcher.has_changed().unwrap());
    assert_eq!(*watcher.borrow_and_update(), SessionState::default());
}

#[tokio::test]
async fn session_survives_restart_with_file_store() {
    //* Given
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let a1 = access_token(23, "a1");

    server
        .mock("POST", "/token/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "access": a1, "refresh": "R1" }).to_string())
        .create_async()
        .await;
    let catalog_mock = server
        .mock("GET", "/catalogos/")
        .match_header("authorization", bearer(&a1).as_str())
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let config = AuthClientConfig::new(&server.url())
        .unwrap()
        .with_credentials_dir(dir.path());

    let first = AuthClientHttp::new(config.clone()).unwrap();
    first.login("test@test.com", "password").await.unwrap();
    drop(first);

    //* When
    let restarted = AuthClientHttp::new(config).unwrap();
    let result = restarted.send(restarted.get("catalogos/").unwrap()).await;

    //* Then
    assert_eq!(restarted.session().user_id(), Some(23));
    assert!(result.is_ok());
    catalog_mock.assert_async().await;
}

#[tokio::test]
async fn corrupted_file_store_means_no_session() {
    //* Given
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tokens.json"), "invalid-json").unwrap();

    //* When
    let session = Session::restore(TokenStore::new(FileBackend::new(dir.path()), "tokens"));

    //* Then
    assert_eq!(session.current(), SessionState::default());
}

#[tokio::test]
async fn public_client_sends_no_credentials() {
    //* Given
    let mut server = Server::new_async().await;
    let schools_mock = server
        .mock("GET", "/escuelasprofesionales/")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/facultades/")
        .with_status(404)
        .create_async()
        .await;

    let client = PublicClient::new(AuthClientConfig::new(&server.url()).unwrap());

    //* When
    let schools = client.send(client.get("escuelasprofesionales/").unwrap()).await;
    let faculties = client.send(client.get("facultades/").unwrap()).await;

    //* Then
    schools_mock.assert_async().await;
    assert!(schools.is_ok());
    assert!(matches!(
        faculties,
        Err(ClientError::RequestFailed { status }) if status == reqwest::StatusCode::NOT_FOUND
    ));
}
