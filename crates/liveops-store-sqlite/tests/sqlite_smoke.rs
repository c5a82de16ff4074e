use chrono::{DateTime, Duration, Utc};
use liveops_storage::{
    CreateCredentialParams, CreatePrincipalParams, CredentialStore, EventParams, EventStore,
    Role, StoreError,
};
use liveops_store_sqlite::SqliteStore;

fn at(offset_hours: i64) -> DateTime<Utc> {
    let base = DateTime::from_timestamp_micros(1_750_000_000_000_000).unwrap();
    base + Duration::hours(offset_hours)
}

fn event(title: &str, start: i64, end: i64) -> EventParams {
    EventParams {
        title: title.to_string(),
        description: Some(format!("{title} description")),
        start_time: at(start),
        end_time: at(end),
        rewards: Some(r#"{"gems":10}"#.to_string()),
    }
}

#[tokio::test]
async fn event_lifecycle_and_active_window() {
    let s = SqliteStore::open_in_memory().await.unwrap();

    let past = s.create_event(&event("past", -10, -5)).await.unwrap();
    let live = s.create_event(&event("live", -1, 1)).await.unwrap();
    let starts_now = s.create_event(&event("starts-now", 0, 3)).await.unwrap();
    let ends_now = s.create_event(&event("ends-now", -2, 0)).await.unwrap();
    let future = s.create_event(&event("future", 5, 6)).await.unwrap();

    let all = s.list_events(None).await.unwrap();
    let titles: Vec<_> = all.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["past", "ends-now", "live", "starts-now", "future"]
    );

    // [start, end): an event ending exactly now is no longer active.
    let active = s.list_events(Some(at(0))).await.unwrap();
    let ids: Vec<_> = active.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![live.id, starts_now.id]);
    assert!(!ids.contains(&ends_now.id));
    assert!(!ids.contains(&past.id));
    assert!(!ids.contains(&future.id));

    let mut replacement = event("renamed", 5, 7);
    replacement.description = None;
    replacement.rewards = None;
    let updated = s.update_event(&future.id, &replacement).await.unwrap();
    assert_eq!(updated.id, future.id);
    assert_eq!(updated.title, "renamed");
    assert_eq!(updated.description, None);
    assert_eq!(updated.rewards, None);
    assert_eq!(s.get_event(&future.id).await.unwrap(), updated);

    s.delete_event(&future.id).await.unwrap();
    assert!(matches!(
        s.get_event(&future.id).await.unwrap_err(),
        StoreError::NotFound
    ));
}

#[tokio::test]
async fn principal_and_credential_lifecycle() {
    let s = SqliteStore::open_in_memory().await.unwrap();

    let bob = s
        .create_principal(&CreatePrincipalParams {
            name: "bob".into(),
            role: Role::Viewer,
        })
        .await
        .unwrap();
    let alice = s
        .create_principal(&CreatePrincipalParams {
            name: "alice".into(),
            role: Role::Admin,
        })
        .await
        .unwrap();

    let names: Vec<_> = s
        .list_principals()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["alice", "bob"]);
    assert_eq!(s.get_principal_by_name("alice").await.unwrap(), alice);

    let older = s
        .create_credential(&CreateCredentialParams {
            principal_id: alice.id,
            token: "token-older".into(),
            created_at: at(0),
            expires_at: at(24),
        })
        .await
        .unwrap();
    let newer = s
        .create_credential(&CreateCredentialParams {
            principal_id: alice.id,
            token: "token-newer".into(),
            created_at: at(1),
            expires_at: at(25),
        })
        .await
        .unwrap();
    assert_eq!(older.last_used_at, older.created_at);

    let listed = s.list_credentials(&alice.id).await.unwrap();
    assert_eq!(
        listed.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![newer.id, older.id]
    );
    assert!(s.list_credentials(&bob.id).await.unwrap().is_empty());

    // Tokens are unique across principals.
    let dup = s
        .create_credential(&CreateCredentialParams {
            principal_id: bob.id,
            token: "token-older".into(),
            created_at: at(0),
            expires_at: at(1),
        })
        .await
        .unwrap_err();
    assert!(matches!(dup, StoreError::AlreadyExists));

    s.touch_credential(&older.id, at(2)).await.unwrap();
    let touched = s.get_credential_by_token("token-older").await.unwrap();
    assert_eq!(touched.last_used_at, at(2));

    s.delete_credential(&older.id).await.unwrap();
    assert!(matches!(
        s.get_credential_by_token("token-older").await.unwrap_err(),
        StoreError::NotFound
    ));

    // Deleting a principal cascades to its credentials.
    s.delete_principal(&alice.id).await.unwrap();
    assert!(matches!(
        s.get_credential_by_token("token-newer").await.unwrap_err(),
        StoreError::NotFound
    ));
    assert!(matches!(
        s.get_principal(&alice.id).await.unwrap_err(),
        StoreError::NotFound
    ));
}
