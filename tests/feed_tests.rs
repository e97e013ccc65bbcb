use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use snapfeed::client::memory::MemoryBackend;
use snapfeed::client::query::InsertRequest;
use snapfeed::feed::actions::{following_feed, public_feed};
use snapfeed::{follows, posts};
use snapfeed::{AppError, Client, Settings};

fn test_client() -> (Client, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let settings = Settings::new("https://example.supabase.co", "test-anon-key", "images").unwrap();
    (Client::new(settings, backend.clone()), backend)
}

fn stamp(second: usize) -> String {
    format!("2026-01-01T00:{:02}:{:02}Z", second / 60, second % 60)
}

async fn seed_post(client: &Client, user_id: Uuid, second: usize) -> Uuid {
    let rows = client
        .backend()
        .insert(InsertRequest::new(
            "posts",
            json!({
                "user_id": user_id,
                "image_url": "memory://images/seed.jpg",
                "caption": format!("post {second}"),
                "created_at": stamp(second),
            }),
        ))
        .await
        .unwrap();
    serde_json::from_value(rows[0]["id"].clone()).unwrap()
}

#[tokio::test]
async fn public_feed_is_newest_first_and_bounded() {
    let (client, _backend) = test_client();
    let author = Uuid::new_v4();
    for second in 0..7 {
        seed_post(&client, author, second).await;
    }

    let page = public_feed(&client, 5, 0).await.unwrap();
    assert_eq!(page.len(), 5);
    for pair in page.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
    assert_eq!(page[0].caption.as_deref(), Some("post 6"));
}

#[tokio::test]
async fn pagination_has_no_duplicates_or_gaps() {
    let (client, _backend) = test_client();
    let author = Uuid::new_v4();
    for second in 0..12 {
        seed_post(&client, author, second).await;
    }

    let first = public_feed(&client, 5, 0).await.unwrap();
    let second = public_feed(&client, 5, 5).await.unwrap();
    let joined: Vec<Uuid> = first.iter().chain(second.iter()).map(|p| p.id).collect();

    let whole: Vec<Uuid> = public_feed(&client, 10, 0)
        .await
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(joined, whole);
}

#[tokio::test]
async fn ties_on_created_at_order_deterministically() {
    let (client, _backend) = test_client();
    let author = Uuid::new_v4();
    for _ in 0..4 {
        seed_post(&client, author, 0).await;
    }

    let once: Vec<Uuid> = public_feed(&client, 4, 0).await.unwrap().iter().map(|p| p.id).collect();
    let again: Vec<Uuid> = public_feed(&client, 4, 0).await.unwrap().iter().map(|p| p.id).collect();
    assert_eq!(once, again);

    let paged: Vec<Uuid> = public_feed(&client, 2, 0)
        .await
        .unwrap()
        .iter()
        .chain(public_feed(&client, 2, 2).await.unwrap().iter())
        .map(|p| p.id)
        .collect();
    assert_eq!(paged, once);
}

#[tokio::test]
async fn empty_store_yields_empty_page() {
    let (client, _backend) = test_client();
    assert!(public_feed(&client, 5, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn following_feed_requires_a_session() {
    let (client, _backend) = test_client();
    let err = following_feed(&client, 5, 0).await.unwrap_err();
    assert!(matches!(err, AppError::NotAuthenticated));
}

#[tokio::test]
async fn following_feed_with_no_follows_shows_only_own_posts() {
    let (client, backend) = test_client();
    let me = Uuid::new_v4();
    seed_post(&client, Uuid::new_v4(), 0).await;

    backend.sign_in_as(me, "me@example.com");
    assert!(following_feed(&client, 5, 0).await.unwrap().is_empty());

    seed_post(&client, me, 1).await;
    let page = following_feed(&client, 5, 0).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].user_id, me);
}

#[tokio::test]
async fn follow_and_unfollow_reshape_the_following_feed() {
    let (client, backend) = test_client();
    let me = Uuid::new_v4();
    let friend = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    seed_post(&client, friend, 0).await;
    seed_post(&client, stranger, 1).await;

    backend.sign_in_as(me, "me@example.com");
    follows::actions::follow(&client, friend).await.unwrap();

    let page = following_feed(&client, 5, 0).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].user_id, friend);

    follows::actions::unfollow(&client, friend).await.unwrap();
    assert!(following_feed(&client, 5, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn feed_posts_carry_engagement_membership() {
    let (client, backend) = test_client();
    let author = Uuid::new_v4();
    let viewer = Uuid::new_v4();
    let post = seed_post(&client, author, 0).await;

    backend.sign_in_as(viewer, "viewer@example.com");
    posts::actions::like(&client, post).await.unwrap();
    posts::actions::repost(&client, post).await.unwrap();
    snapfeed::comments::actions::add_comment(&client, post, "hello")
        .await
        .unwrap();

    let page = public_feed(&client, 5, 0).await.unwrap();
    let loaded = &page[0];
    assert_eq!(loaded.likes_count(), 1);
    assert_eq!(loaded.comments_count(), 1);
    assert_eq!(loaded.reposts_count(), 1);
    assert!(loaded.liked_by(viewer));
    assert!(loaded.reposted_by(viewer));
    assert!(!loaded.liked_by(author));
}
