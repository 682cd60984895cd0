use std::sync::Arc;

use remote_modules::{Error, ModuleLoadState};

use crate::fixture::{canonical_manifest, ok_json, sdk_loader, server_error, MockFetcher};

#[tokio::test]
async fn test_concurrent_requests_share_one_load() {
    let fetcher = MockFetcher::gated(ok_json(canonical_manifest("sdk")));
    let (loader, runtime) = sdk_loader(fetcher.clone());

    let first = loader.request_module("sdk", "./X", None);
    let second = loader.request_module("sdk", "./X", None);

    assert!(first.same_operation(&second));
    assert_eq!(loader.module_state("sdk", "./X"), ModuleLoadState::Loading);

    fetcher.release();
    let (a, b) = tokio::join!(first.wait(), second.wait());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(runtime.register_calls(), 1);
    assert_eq!(runtime.export_calls(), 1);
}

#[tokio::test]
async fn test_coalesced_callers_share_failure() {
    let fetcher = MockFetcher::gated(server_error());
    let (loader, _runtime) = sdk_loader(fetcher.clone());

    let first = loader.request_module("sdk", "./X", None);
    let second = loader.request_module("sdk", "./X", None);
    fetcher.release();

    let (a, b) = tokio::join!(first.wait(), second.wait());
    let (a, b) = (a.unwrap_err(), b.unwrap_err());

    assert!(matches!(a, Error::Network(_)));
    assert_eq!(a, b);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_modules_of_one_scope_share_injection() {
    let fetcher = MockFetcher::gated(ok_json(canonical_manifest("sdk")));
    let (loader, runtime) = sdk_loader(fetcher.clone());

    let x = loader.request_module("sdk", "./X", None);
    let y = loader.request_module("sdk", "./Y", None);
    assert!(!x.same_operation(&y));
    assert_eq!(loader.snapshot().pending_injections, vec!["sdk".to_string()]);
    assert_eq!(loader.snapshot().pending_loads.len(), 2);

    fetcher.release();
    let (x, y) = tokio::join!(x.wait(), y.wait());

    assert_eq!(x.unwrap().get::<String>("name").map(String::as_str), Some("X"));
    assert_eq!(y.unwrap().get::<String>("name").map(String::as_str), Some("Y"));
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(runtime.register_calls(), 1);
    assert_eq!(runtime.export_calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_callers_load_once() {
    let fetcher = MockFetcher::serving(ok_json(canonical_manifest("sdk")));
    let (loader, runtime) = sdk_loader(fetcher.clone());

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let loader = loader.clone();
            let module = if i % 2 == 0 { "./X" } else { "./Y" };
            tokio::spawn(async move { loader.load_module("sdk", module).await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(runtime.register_calls(), 1);
    assert_eq!(runtime.export_calls(), 2);
}

#[tokio::test]
async fn test_dropped_caller_does_not_cancel_load() {
    let fetcher = MockFetcher::gated(ok_json(canonical_manifest("sdk")));
    let (loader, runtime) = sdk_loader(fetcher.clone());

    drop(loader.request_module("sdk", "./X", None));
    fetcher.release();

    let module = loader.load_module("sdk", "./X").await.unwrap();

    assert_eq!(module.get::<String>("name").map(String::as_str), Some("X"));
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(runtime.export_calls(), 1);
}

#[tokio::test]
async fn test_reset_during_load() {
    let fetcher = MockFetcher::gated(ok_json(canonical_manifest("sdk")));
    let (loader, _runtime) = sdk_loader(fetcher.clone());

    let in_flight = loader.request_module("sdk", "./X", None);
    loader.reset();
    assert!(loader.snapshot().pending_loads.is_empty());

    fetcher.release();
    assert!(in_flight.wait().await.is_ok());

    // The stale load settled its caller without touching the fresh state.
    let snapshot = loader.snapshot();
    assert!(snapshot.cached_modules.is_empty());
    assert!(snapshot.known_scopes.is_empty());
}
