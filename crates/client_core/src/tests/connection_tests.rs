use super::*;
use crate::test_support::TestBackend;

fn event_bus() -> broadcast::Sender<ClientEvent> {
    broadcast::channel(64).0
}

#[tokio::test]
async fn first_successful_poll_connects_and_selects_first_model() {
    let backend = TestBackend::new();
    backend.set_connected(true).await;
    backend.set_models(&["llama3", "mistral"]).await;
    let monitor = ConnectionMonitor::new(backend.clone(), event_bus());

    assert_eq!(monitor.state().await, ConnectionState::Checking);

    monitor.poll_once().await;

    let snapshot = monitor.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert_eq!(snapshot.models.len(), 2);
    assert_eq!(snapshot.selected_model.as_deref(), Some("llama3"));
}

#[tokio::test]
async fn liveness_failure_keeps_stale_models_and_selection() {
    let backend = TestBackend::new();
    backend.set_connected(true).await;
    backend.set_models(&["llama3"]).await;
    let monitor = ConnectionMonitor::new(backend.clone(), event_bus());
    monitor.poll_once().await;

    backend.set_connected(false).await;
    monitor.poll_once().await;

    let snapshot = monitor.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert_eq!(snapshot.models.len(), 1);
    assert_eq!(snapshot.selected_model.as_deref(), Some("llama3"));
}

#[tokio::test]
async fn reconnect_never_overrides_an_explicit_selection() {
    let backend = TestBackend::new();
    backend.set_connected(true).await;
    backend.set_models(&["llama3", "mistral"]).await;
    let monitor = ConnectionMonitor::new(backend.clone(), event_bus());
    monitor.poll_once().await;
    monitor.select_model("mistral").await;

    backend.set_connected(false).await;
    monitor.poll_once().await;
    backend.set_connected(true).await;
    monitor.poll_once().await;

    assert_eq!(
        monitor.selected_model().await.as_deref(),
        Some("mistral")
    );
}

#[tokio::test]
async fn reconnect_fills_selection_only_when_unset() {
    let backend = TestBackend::new();
    backend.set_connected(false).await;
    let monitor = ConnectionMonitor::new(backend.clone(), event_bus());
    monitor.poll_once().await;
    assert_eq!(monitor.selected_model().await, None);

    backend.set_connected(true).await;
    backend.set_models(&["mistral", "llama3"]).await;
    monitor.poll_once().await;

    assert_eq!(
        monitor.selected_model().await.as_deref(),
        Some("mistral")
    );
}

#[tokio::test]
async fn empty_model_list_leaves_selection_unset() {
    let backend = TestBackend::new();
    backend.set_connected(true).await;
    let monitor = ConnectionMonitor::new(backend.clone(), event_bus());
    monitor.poll_once().await;

    let snapshot = monitor.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert!(snapshot.models.is_empty());
    assert_eq!(snapshot.selected_model, None);
}

#[tokio::test]
async fn duplicate_model_names_collapse_to_first_occurrence() {
    let backend = TestBackend::new();
    backend.set_connected(true).await;
    backend.set_models(&["llama3", "llama3", "mistral"]).await;
    let monitor = ConnectionMonitor::new(backend.clone(), event_bus());
    monitor.poll_once().await;

    let snapshot = monitor.snapshot().await;
    assert_eq!(snapshot.models.len(), 2);
    assert_eq!(snapshot.models[0].name, "llama3");
    assert_eq!(snapshot.models[1].name, "mistral");
}

#[tokio::test]
async fn model_list_failure_counts_as_a_failed_poll() {
    let backend = TestBackend::new();
    backend.set_connected(true).await;
    backend.set_models(&["llama3"]).await;
    let monitor = ConnectionMonitor::new(backend.clone(), event_bus());
    monitor.poll_once().await;

    backend.fail("list_models").await;
    monitor.poll_once().await;

    let snapshot = monitor.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert_eq!(snapshot.models.len(), 1);
}

#[tokio::test]
async fn poll_after_stop_mutates_nothing() {
    let backend = TestBackend::new();
    backend.set_connected(true).await;
    backend.set_models(&["llama3"]).await;
    let monitor = ConnectionMonitor::new(backend.clone(), event_bus());

    monitor.stop().await;
    monitor.poll_once().await;

    let snapshot = monitor.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Checking);
    assert!(snapshot.models.is_empty());
}

#[tokio::test]
async fn in_flight_poll_result_is_discarded_after_stop() {
    let backend = TestBackend::new();
    backend.set_connected(true).await;
    backend.set_models(&["llama3"]).await;
    let gate = backend.hold("check_connection").await;
    let monitor = ConnectionMonitor::new(backend.clone(), event_bus());

    let polling = {
        let monitor = Arc::clone(&monitor);
        tokio::spawn(async move { monitor.poll_once().await })
    };
    for _ in 0..200 {
        if backend.called("check_connection").await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    monitor.stop().await;
    gate.notify_one();
    polling.await.expect("poll task");

    let snapshot = monitor.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Checking);
    assert!(snapshot.models.is_empty());
}

#[tokio::test(start_paused = true)]
async fn started_monitor_polls_periodically_until_stopped() {
    let backend = TestBackend::new();
    backend.set_connected(true).await;
    backend.set_models(&["llama3"]).await;
    let monitor =
        ConnectionMonitor::with_poll_interval(backend.clone(), event_bus(), Duration::from_secs(5));

    monitor.start().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(monitor.state().await, ConnectionState::Connected);

    backend.set_connected(false).await;
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(monitor.state().await, ConnectionState::Disconnected);

    monitor.stop().await;
    backend.set_connected(true).await;
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(monitor.state().await, ConnectionState::Disconnected);
}
