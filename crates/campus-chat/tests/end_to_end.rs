use std::sync::Arc;
use std::time::Duration;

use campus_api::AppStateInner;
use campus_chat::{ChatClient, ChatConfig, DeliveryState, Error, HttpBackend, Message};
use campus_db::Database;
use campus_types::api::RegisterRequest;

const PASSWORD: &str = "correct-horse";

async fn spawn_server() -> String {
    let db = Database::open_in_memory().unwrap();
    let state = Arc::new(AppStateInner {
        db,
        jwt_secret: "test-secret".into(),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, campus_api::router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

fn config(base_url: &str) -> ChatConfig {
    ChatConfig {
        base_url: base_url.to_string(),
        poll_interval: Duration::from_millis(100),
        ..ChatConfig::default()
    }
}

async fn register(config: &ChatConfig, name: &str, login: &str) -> uuid::Uuid {
    HttpBackend::new(config)
        .unwrap()
        .register(&RegisterRequest {
            name: name.into(),
            surname: "Tester".into(),
            login: login.into(),
            password: PASSWORD.into(),
            role: None,
        })
        .await
        .unwrap()
}

/// Poll `client`'s visible log until `done` holds or a few seconds pass.
async fn wait_for(client: &ChatClient, done: impl Fn(&[Message]) -> bool) -> Vec<Message> {
    for _ in 0..50 {
        let log = client.messages().await;
        if done(&log) {
            return log;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    client.messages().await
}

#[tokio::test]
async fn two_users_chat_over_http() {
    let base_url = spawn_server().await;
    let config = config(&base_url);
    let alice_id = register(&config, "Alice", "alice").await;
    let bob_id = register(&config, "Bob", "bob").await;

    let mut alice = ChatClient::connect(&config, "alice", PASSWORD).await.unwrap();
    let mut bob = ChatClient::connect(&config, "bob", PASSWORD).await.unwrap();
    assert_eq!(alice.session().user_id(), alice_id);

    let others = alice.available_users().await.unwrap();
    assert_eq!(others.len(), 1);
    assert_eq!(others[0].id, bob_id);

    alice.load_chats().await.unwrap();
    bob.load_chats().await.unwrap();

    // Both open the conversation at the same time; there is still one chat.
    let (a, b) = tokio::join!(alice.start_chat(bob_id), bob.start_chat(alice_id));
    let chat_id = a.unwrap();
    assert_eq!(b.unwrap(), chat_id);
    assert_eq!(alice.chats().await.len(), 1);
    assert_eq!(alice.chats().await[0].peer_name, "Bob Tester");

    let sent = alice.send("  hello bob  ").await.unwrap();
    assert_eq!(sent.content, "hello bob");

    let seen_by_bob = wait_for(&bob, |log| !log.is_empty()).await;
    assert_eq!(seen_by_bob.len(), 1);
    assert_eq!(seen_by_bob[0].id, sent.id);

    // Give Alice's own poll time to echo the message back.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let own = alice.messages().await;
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].id, sent.id);
    assert_eq!(own[0].delivery_state, DeliveryState::Confirmed);

    let chats = bob.refresh_chats().await.unwrap();
    assert_eq!(
        chats[0].last_message.as_ref().map(|m| m.content.as_str()),
        Some("hello bob")
    );

    alice.logout().await;
    bob.logout().await;
}

#[tokio::test]
async fn blank_message_never_reaches_the_server() {
    let base_url = spawn_server().await;
    let config = config(&base_url);
    register(&config, "Carol", "carol").await;
    let dave_id = register(&config, "Dave", "dave").await;

    let mut carol = ChatClient::connect(&config, "carol", PASSWORD).await.unwrap();
    carol.load_chats().await.unwrap();
    carol.start_chat(dave_id).await.unwrap();

    assert!(matches!(carol.send("   ").await, Err(Error::Validation(_))));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(carol.messages().await.is_empty());
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let base_url = spawn_server().await;
    let config = config(&base_url);
    register(&config, "Erin", "erin").await;

    let err = ChatClient::connect(&config, "erin", "not-the-password")
        .await
        .err()
        .unwrap();
    assert_eq!(err, Error::Unauthorized);
}
