use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use snapfeed::auth::spawn_profile_sync;
use snapfeed::client::memory::MemoryBackend;
use snapfeed::client::query::SelectRequest;
use snapfeed::{AuthEvent, Client, Settings};

fn test_client() -> (Arc<Client>, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let settings = Settings::new("https://example.supabase.co", "test-anon-key", "images").unwrap();
    (Arc::new(Client::new(settings, backend.clone())), backend)
}

async fn wait_for_profile(client: &Client, user_id: Uuid) -> serde_json::Value {
    timeout(Duration::from_secs(5), async {
        loop {
            let rows = client
                .backend()
                .select(SelectRequest::new("profiles").eq("id", json!(user_id)))
                .await
                .unwrap();
            if let Some(row) = rows.into_iter().next() {
                return row;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("profile row created by sync task")
}

#[tokio::test]
async fn sign_in_creates_a_profile_row() {
    let (client, backend) = test_client();
    let task = spawn_profile_sync(client.clone());

    let user_id = Uuid::new_v4();
    backend.sign_in_as(user_id, "ada@example.com");

    let row = wait_for_profile(&client, user_id).await;
    assert_eq!(row["username"], json!("ada"));

    task.abort();
}

#[tokio::test]
async fn repeated_sign_ins_do_not_duplicate_the_profile() {
    let (client, backend) = test_client();
    let task = spawn_profile_sync(client.clone());

    let user_id = Uuid::new_v4();
    backend.sign_in_as(user_id, "grace@example.com");
    wait_for_profile(&client, user_id).await;

    backend.sign_out();
    backend.sign_in_as(user_id, "grace@example.com");
    // Give the second event time to be handled.
    sleep(Duration::from_millis(50)).await;

    let rows = client
        .backend()
        .select(SelectRequest::new("profiles"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    task.abort();
}

#[tokio::test]
async fn auth_events_fan_out_to_subscribers() {
    let (client, backend) = test_client();
    let mut events = client.auth_events();

    let user_id = Uuid::new_v4();
    backend.sign_in_as(user_id, "ada@example.com");
    backend.sign_out();

    match events.recv().await.unwrap() {
        AuthEvent::SignedIn(session) => {
            assert_eq!(session.user_id, user_id);
            assert_eq!(session.email.as_deref(), Some("ada@example.com"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedOut));
}
