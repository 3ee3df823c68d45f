use clearwell_server::domain::user::Role;
use clearwell_server::storage::RefreshTokenStore;
use uuid::Uuid;

mod common;

/// Two concurrent rotations of the same token value: exactly one may win,
/// and the subject ends up with exactly one live record, never two.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotation_has_exactly_one_winner() {
    let harness = common::setup();
    let user_id = Uuid::new_v4();

    for _ in 0..50 {
        let session = harness.service.create_session(user_id, Role::User).await.unwrap();
        assert_eq!(harness.store.count_for_user(user_id).await.unwrap(), 1);

        let service_a = harness.service.clone();
        let service_b = harness.service.clone();
        let token_a = session.refresh_token.clone();
        let token_b = session.refresh_token.clone();

        let (a, b) = tokio::join!(
            tokio::spawn(async move { service_a.refresh_session(token_a).await }),
            tokio::spawn(async move { service_b.refresh_session(token_b).await }),
        );
        let a = a.unwrap();
        let b = b.unwrap();

        let successes = usize::from(a.is_ok()) + usize::from(b.is_ok());
        assert_eq!(successes, 1, "exactly one concurrent rotation may succeed");

        // Net effect of one consumed record and one replacement.
        assert_eq!(harness.store.count_for_user(user_id).await.unwrap(), 1);

        // Keep the store clean between iterations.
        let winner = if let Ok(s) = a { s } else { b.unwrap() };
        harness.service.logout(Some(winner.refresh_token)).await.unwrap();
    }
}

/// The sequential flavor of the same property, across a longer chain.
#[tokio::test]
async fn test_each_token_in_a_chain_is_consumable_once() {
    let harness = common::setup();
    let user_id = Uuid::new_v4();

    let mut spent = Vec::new();
    let mut current = harness.service.create_session(user_id, Role::User).await.unwrap();

    for _ in 0..5 {
        spent.push(current.refresh_token.clone());
        current = harness.service.refresh_session(current.refresh_token).await.unwrap();
    }

    for token in spent {
        assert!(harness.service.refresh_session(token).await.is_err());
    }

    // The head of the chain is still live.
    harness.service.refresh_session(current.refresh_token).await.unwrap();
}
