use remote_modules::{Error, ModuleLoadState};

use crate::fixture::{canonical_manifest, ok_json, sdk_loader, server_error, MockFetcher};

#[tokio::test]
async fn test_server_error_clears_pending_state() {
    let fetcher = MockFetcher::serving(server_error());
    let (loader, runtime) = sdk_loader(fetcher.clone());

    let err = loader.load_module("sdk", "./X").await.unwrap_err();

    assert!(matches!(err, Error::Network(_)));
    assert!(err.to_string().contains("500"));
    assert_eq!(runtime.register_calls(), 0);

    let snapshot = loader.snapshot();
    assert!(snapshot.pending_injections.is_empty());
    assert!(snapshot.pending_loads.is_empty());
    assert!(snapshot.known_scopes.is_empty());
    assert!(snapshot.cached_modules.is_empty());
    assert_eq!(loader.module_state("sdk", "./X"), ModuleLoadState::Idle);
}

#[tokio::test]
async fn test_retry_after_server_error_succeeds() {
    let fetcher = MockFetcher::sequence(vec![server_error()], ok_json(canonical_manifest("sdk")));
    let (loader, _runtime) = sdk_loader(fetcher.clone());

    assert!(loader.load_module("sdk", "./X").await.is_err());

    let module = loader.load_module("sdk", "./X").await.unwrap();

    assert_eq!(module.get::<String>("name").map(String::as_str), Some("X"));
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(loader.snapshot().cached_modules, vec!["sdk#./X".to_string()]);
}

#[tokio::test]
async fn test_invalid_json_is_retryable() {
    let fetcher = MockFetcher::sequence(
        vec![remote_modules::HttpResponse::new(200, "OK", b"<html>".to_vec())],
        ok_json(canonical_manifest("sdk")),
    );
    let (loader, _runtime) = sdk_loader(fetcher.clone());

    let err = loader.load_module("sdk", "./X").await.unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert!(loader.snapshot().pending_injections.is_empty());

    assert!(loader.load_module("sdk", "./X").await.is_ok());
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_execution_error_reruns_whole_pipeline() {
    let fetcher = MockFetcher::serving(ok_json(canonical_manifest("sdk")));
    let (loader, runtime) = sdk_loader(fetcher.clone());
    runtime.fail_next_registrations(1);

    let err = loader.load_module("sdk", "./X").await.unwrap_err();
    assert!(matches!(err, Error::Execution(_)));
    assert!(!loader.is_scope_known("sdk"));

    loader.load_module("sdk", "./X").await.unwrap();

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(runtime.register_calls(), 2);
    assert!(loader.is_scope_known("sdk"));
}

#[tokio::test]
async fn test_failed_injection_fails_every_joined_module() {
    let fetcher = MockFetcher::gated(server_error());
    let (loader, runtime) = sdk_loader(fetcher.clone());

    let x = loader.request_module("sdk", "./X", None);
    let y = loader.request_module("sdk", "./Y", None);
    fetcher.release();

    let (x, y) = tokio::join!(x.wait(), y.wait());
    assert!(matches!(x, Err(Error::Network(_))));
    assert!(matches!(y, Err(Error::Network(_))));
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(runtime.export_calls(), 0);
}

#[tokio::test]
async fn test_panicking_export_is_retryable() {
    let fetcher = MockFetcher::serving(ok_json(canonical_manifest("sdk")));
    let (loader, runtime) = sdk_loader(fetcher.clone());
    runtime.panic_next_exports(1);

    let err = loader.load_module("sdk", "./X").await.unwrap_err();
    assert!(matches!(err, Error::Execution(_)));
    assert!(loader.snapshot().pending_loads.is_empty());
    assert_eq!(loader.module_state("sdk", "./X"), ModuleLoadState::Idle);

    let module = loader.load_module("sdk", "./X").await.unwrap();

    assert_eq!(module.get::<String>("name").map(String::as_str), Some("X"));
    assert_eq!(runtime.export_calls(), 2);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_panicking_registration_clears_injection() {
    let fetcher = MockFetcher::gated(ok_json(canonical_manifest("sdk")));
    let (loader, runtime) = sdk_loader(fetcher.clone());
    runtime.panic_next_registrations(1);

    let x = loader.request_module("sdk", "./X", None);
    let y = loader.request_module("sdk", "./Y", None);
    fetcher.release();

    let (x, y) = tokio::join!(x.wait(), y.wait());
    assert!(matches!(x, Err(Error::Execution(_))));
    assert!(matches!(y, Err(Error::Execution(_))));

    let snapshot = loader.snapshot();
    assert!(snapshot.pending_injections.is_empty());
    assert!(snapshot.pending_loads.is_empty());
    assert!(snapshot.known_scopes.is_empty());

    loader.load_module("sdk", "./Y").await.unwrap();
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(runtime.register_calls(), 2);
}
