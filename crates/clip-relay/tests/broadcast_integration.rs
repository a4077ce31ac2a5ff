//! Integration tests for the broadcast core.
//!
//! These drive [`ClipboardHub`] through its public API with in-process
//! [`ChannelClient`]s standing in for peers.  They cover:
//!
//! - Fan-in: a value pushed by one client reaches the others after one
//!   `step()`, and is never written back to its sender.
//! - Newcomer convergence: a client registered later starts from the
//!   current value.
//! - Last write wins: two values pushed at nearly the same time end with
//!   every client holding whichever the hub applied last.
//! - Isolation: a failing client is evicted without affecting delivery to
//!   the rest.
//! - Eviction is final: a removed client is closed and can no longer
//!   change the shared value.
//! - Serialization under load: many clients pushing concurrently never
//!   leave the hub holding a value nobody sent.

use std::sync::Arc;
use std::time::Duration;

use clip_core::ClipboardValue;
use clip_relay::application::client::{ChannelClient, ClipboardClient};
use clip_relay::application::hub::{ClipboardHub, HubConfig};
use tokio_test::assert_ok;

fn text(s: &str) -> ClipboardValue {
    ClipboardValue::from_text(s).unwrap()
}

async fn register(hub: &ClipboardHub, label: &str) -> Arc<ChannelClient> {
    let client = Arc::new(ChannelClient::new(label));
    assert_ok!(
        hub.add_client(Arc::clone(&client) as Arc<dyn ClipboardClient>)
            .await
    );
    client
}

/// Polls `check` until it returns `true` or five seconds pass.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_pushed_value_reaches_all_clients_after_one_step() {
    // Arrange
    let hub = ClipboardHub::default();
    let a = register(&hub, "a").await;
    let b = register(&hub, "b").await;

    // Act
    assert_ok!(a.push(text("foo")).await);
    assert_ok!(hub.step().await);

    // Assert
    assert_eq!(a.last_known(), text("foo"));
    assert_eq!(b.last_known(), text("foo"));
    assert_eq!(b.delivered(), vec![text("foo")]);
    assert!(a.delivered().is_empty(), "sender must receive no echo write");
}

#[tokio::test]
async fn test_newcomer_observes_state_at_registration() {
    // Arrange
    let hub = ClipboardHub::default();
    let a = register(&hub, "a").await;
    assert_ok!(a.push(text("before-c")).await);
    assert_ok!(hub.step().await);

    // Act
    let c = register(&hub, "c").await;

    // Assert
    assert_eq!(c.delivered(), vec![text("before-c")]);
    assert_eq!(c.last_known(), hub.clipboard().await);
}

#[tokio::test]
async fn test_near_simultaneous_values_converge_on_last_applied() {
    // Arrange
    let hub = ClipboardHub::default();
    let a = register(&hub, "a").await;
    let b = register(&hub, "b").await;
    let observer = register(&hub, "observer").await;

    // Act – both peers change their clipboard before the hub runs.
    assert_ok!(a.push(text("from-a")).await);
    assert_ok!(b.push(text("from-b")).await);
    assert_ok!(hub.step().await);
    assert_ok!(hub.step().await);

    // Assert
    let last = observer.delivered().last().cloned().expect("observer saw updates");
    assert_eq!(hub.clipboard().await, last);
    for client in [&a, &b, &observer] {
        assert_eq!(
            client.last_known(),
            last,
            "{} diverged from the final state",
            client.label()
        );
    }
}

#[tokio::test]
async fn test_failing_client_does_not_block_others() {
    // Arrange
    let hub = ClipboardHub::default();
    let sender = register(&hub, "sender").await;
    let broken = register(&hub, "broken").await;
    let healthy = register(&hub, "healthy").await;
    broken.set_failing(true);

    // Act
    assert_ok!(sender.push(text("payload")).await);
    assert_ok!(hub.step().await);

    // Assert
    assert_eq!(healthy.delivered(), vec![text("payload")]);
    let ids = hub.client_ids().await;
    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&broken.id()));
}

#[tokio::test]
async fn test_evicted_client_is_cut_off() {
    // Arrange
    let hub = Arc::new(ClipboardHub::default());
    let sender = register(&hub, "sender").await;
    let evicted = register(&hub, "evicted").await;
    let runner = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move { hub.run().await })
    };
    evicted.set_failing(true);
    hub.set_clipboard(text("v1"), None).await;

    // Act
    let late_push = evicted.push(text("from-evicted")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Assert
    assert!(late_push.is_err(), "an evicted client must not reach the hub");
    assert!(evicted.is_closed());
    assert_eq!(hub.clipboard().await, text("v1"));
    assert_eq!(sender.delivered(), vec![text("v1")]);
    runner.abort();
}

#[tokio::test]
async fn test_disconnected_client_is_removed_eagerly() {
    // Arrange
    let hub = Arc::new(ClipboardHub::default());
    let a = register(&hub, "a").await;
    let _b = register(&hub, "b").await;
    let runner = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move { hub.run().await })
    };

    // Act
    a.disconnect();

    // Assert – removal happens without any broadcast taking place.
    let hub_ref = Arc::clone(&hub);
    assert!(eventually(|| {
        let hub = Arc::clone(&hub_ref);
        async move { hub.client_count().await == 1 }
    })
    .await);
    runner.abort();
}

#[tokio::test]
async fn test_concurrent_pushes_never_tear_state() {
    // Arrange
    let hub = Arc::new(ClipboardHub::new(HubConfig {
        inbound_queue_capacity: 4,
        max_concurrent_updates: 2,
    }));
    let mut clients = Vec::new();
    for i in 0..5 {
        clients.push(register(&hub, &format!("peer-{i}")).await);
    }
    let runner = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move { hub.run().await })
    };

    // Act – every client pushes ten distinct values at once.
    let mut sent = Vec::new();
    let mut pushers = Vec::new();
    for (i, client) in clients.iter().enumerate() {
        let values: Vec<ClipboardValue> =
            (0..10).map(|n| text(&format!("peer-{i}-value-{n}"))).collect();
        sent.extend(values.iter().cloned());
        let client = Arc::clone(client);
        pushers.push(tokio::spawn(async move {
            for value in values {
                client.push(value).await.expect("push must succeed");
            }
        }));
    }
    for pusher in pushers {
        pusher.await.expect("pusher panicked");
    }

    // Assert – everyone converges on a value that was actually sent.
    let hub_ref = Arc::clone(&hub);
    let clients_ref = clients.clone();
    let converged = eventually(|| {
        let hub = Arc::clone(&hub_ref);
        let clients = clients_ref.clone();
        async move {
            let current = hub.clipboard().await;
            clients.iter().all(|c| c.last_known() == current)
        }
    })
    .await;
    assert!(converged, "clients did not converge");
    assert!(sent.contains(&hub.clipboard().await));
    assert_eq!(hub.client_count().await, 5);
    runner.abort();
}
