mod common;

use url_shortener_core::domain::entities::ShortenedUrl;
use url_shortener_core::domain::repositories::Storage;
use url_shortener_core::error::{AppError, UniqueKey};
use url_shortener_core::utils::key_generator::{KEY_LENGTH, is_valid_key};
use uuid::Uuid;

#[tokio::test]
async fn test_create_then_get_round_trip() {
    let (_, service) = common::memory_service(common::service_config(20, common::LONG_INTERVAL));

    let created = service
        .create_shortened_url(None, "https://example.com/a")
        .await
        .unwrap()
        .conflict()
        .unwrap();

    let found = service.get_shortened_url(&created.short_url).await.unwrap();

    assert_eq!(found.original_url, "https://example.com/a");
    assert!(!found.is_deleted);
}

#[tokio::test]
async fn test_generated_keys_are_url_safe() {
    let (_, service) = common::memory_service(common::service_config(20, common::LONG_INTERVAL));

    for i in 0..50 {
        let created = service
            .create_shortened_url(None, &format!("https://example.com/{i}"))
            .await
            .unwrap();
        let key = &created.url().short_url;
        assert_eq!(key.len(), KEY_LENGTH);
        assert!(is_valid_key(key), "{key} is not URL-safe");
    }
}

#[tokio::test]
async fn test_create_is_idempotent_per_original_url() {
    let (_, service) = common::memory_service(common::service_config(20, common::LONG_INTERVAL));

    let first = service
        .create_shortened_url(None, "https://example.com")
        .await
        .unwrap();
    let second = service
        .create_shortened_url(None, "https://example.com")
        .await
        .unwrap();

    assert!(!first.is_existing());
    assert!(second.is_existing());
    assert_eq!(first.url().short_url, second.url().short_url);
    assert!(matches!(
        second.conflict().unwrap_err(),
        AppError::Conflict { .. }
    ));
}

#[tokio::test]
async fn test_existing_url_is_linked_to_second_user() {
    let (_, service) = common::memory_service(common::service_config(20, common::LONG_INTERVAL));
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    service
        .create_shortened_url(Some(alice), "https://shared.example")
        .await
        .unwrap();
    let again = service
        .create_shortened_url(Some(bob), "https://shared.example")
        .await
        .unwrap();

    assert!(again.is_existing());
    let bobs = service.get_user_shortened_urls(bob).await.unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].original_url, "https://shared.example");
}

#[tokio::test]
async fn test_existing_lookup_matches_original_url_only() {
    let (storage, service) =
        common::memory_service(common::service_config(20, common::LONG_INTERVAL));

    // A record whose short key equals another record's original URL.
    let keyed = common::record("ab12CD34", "https://keyed.example");
    let target = common::record("zz99YY88", "ab12CD34");
    storage.write_shortened_url(&keyed).await.unwrap();
    storage.write_shortened_url(&target).await.unwrap();

    let result = service.create_shortened_url(None, "ab12CD34").await.unwrap();

    assert!(result.is_existing());
    assert_eq!(result.into_inner(), target);
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let (_, service) = common::memory_service(common::service_config(20, common::LONG_INTERVAL));

    let result = service.get_shortened_url("nothere1").await;

    assert!(matches!(result.unwrap_err(), AppError::NotFound { .. }));
}

#[tokio::test]
async fn test_batch_preserves_order_and_correlation_ids() {
    let (_, service) = common::memory_service(common::service_config(20, common::LONG_INTERVAL));

    let input = vec![
        ShortenedUrl::for_batch("https://a.example", Some("1".to_string())),
        ShortenedUrl::for_batch("https://b.example", Some("2".to_string())),
        ShortenedUrl::for_batch("https://c.example", Some("3".to_string())),
    ];

    let output = service.batch_create_shortened_urls(input).await.unwrap();

    let ids: Vec<_> = output
        .iter()
        .map(|u| u.correlation_id.as_deref().unwrap())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3"]);

    for url in &output {
        assert!(is_valid_key(&url.short_url));
        let found = service.get_shortened_url(&url.short_url).await.unwrap();
        assert_eq!(found.original_url, url.original_url);
    }
}

#[tokio::test]
async fn test_batch_with_known_url_stores_nothing() {
    let (_, service) = common::memory_service(common::service_config(20, common::LONG_INTERVAL));
    service
        .create_shortened_url(None, "https://taken.example")
        .await
        .unwrap();

    let err = service
        .batch_create_shortened_urls(vec![
            ShortenedUrl::for_batch("https://fresh.example", None),
            ShortenedUrl::for_batch("https://taken.example", None),
        ])
        .await
        .unwrap_err();

    assert!(err.is_unique_violation_on(UniqueKey::OriginalUrl));
    assert!(matches!(
        service.get_shortened_url("https://fresh.example").await,
        Err(AppError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_user_history_includes_deleted() {
    let (_, service) = common::memory_service(common::service_config(20, common::LONG_INTERVAL));
    let user = Uuid::new_v4();

    let keep = service
        .create_shortened_url(Some(user), "https://keep.example")
        .await
        .unwrap()
        .into_inner();
    let gone = service
        .create_shortened_url(Some(user), "https://drop.example")
        .await
        .unwrap()
        .into_inner();

    service
        .delete_user_shortened_urls(user, vec![gone.short_url.clone()])
        .await
        .unwrap();
    service.shutdown().await;

    let history = service.get_user_shortened_urls(user).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().any(|u| u.uuid == keep.uuid && !u.is_deleted));
    assert!(history.iter().any(|u| u.uuid == gone.uuid && u.is_deleted));
}

#[tokio::test]
async fn test_unknown_user_has_empty_history() {
    let (_, service) = common::memory_service(common::service_config(20, common::LONG_INTERVAL));

    let history = service.get_user_shortened_urls(Uuid::new_v4()).await.unwrap();

    assert!(history.is_empty());
}

#[tokio::test]
async fn test_short_url_rendering() {
    let (_, service) = common::memory_service(common::service_config(20, common::LONG_INTERVAL));

    assert_eq!(service.short_url("ab12CD34"), "http://localhost:8080/ab12CD34");
}
