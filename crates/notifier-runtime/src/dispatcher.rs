//! Fan-out of one snapshot to every configured sink.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use notifier_core::models::EntitySnapshot;
use notifier_core::traits::NotificationSink;

use crate::guard::guarded;
use crate::report::{CycleFailure, FailureStage};

/// Result of broadcasting one snapshot.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failures: Vec<CycleFailure>,
}

/// Delivers snapshots to all sinks concurrently.
///
/// Each sink call is bounded by `timeout` and isolated from the others: one
/// sink failing, hanging or panicking never stops delivery to the rest.
pub struct Dispatcher {
    sinks: Vec<Arc<dyn NotificationSink>>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>, timeout: Duration) -> Self {
        Self { sinks, timeout }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub async fn broadcast(&self, snapshot: &EntitySnapshot) -> DispatchReport {
        let results = join_all(self.sinks.iter().map(|sink| async move {
            let operation = format!("deliver via {}", sink.name());
            let result = guarded(&operation, self.timeout, sink.deliver(snapshot)).await;
            (sink.name(), result)
        }))
        .await;

        let mut report = DispatchReport::default();
        for (sink, result) in results {
            match result {
                Ok(()) => {
                    tracing::debug!(sink, platform = %snapshot.platform, entity = %snapshot.unique_id, "notification delivered");
                    report.delivered += 1;
                }
                Err(e) => {
                    tracing::error!(
                        sink,
                        platform = %snapshot.platform,
                        entity = %snapshot.unique_id,
                        error = %e,
                        "notification failed"
                    );
                    report.failures.push(CycleFailure::new(
                        FailureStage::Delivery,
                        format!("{sink} ({}/{})", snapshot.platform, snapshot.unique_id),
                        e.to_string(),
                    ));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use notifier_core::error::{NotifierError, Result};
    use std::sync::Mutex;

    enum Behaviour {
        Accept,
        Reject,
        Hang,
        Panic,
    }

    struct FakeSink {
        name: &'static str,
        behaviour: Behaviour,
        received: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NotificationSink for FakeSink {
        fn name(&self) -> &str {
            self.name
        }

        async fn deliver(&self, snapshot: &EntitySnapshot) -> Result<()> {
            match self.behaviour {
                Behaviour::Accept => {
                    self.received.lock().unwrap().push(snapshot.version.clone());
                    Ok(())
                }
                Behaviour::Reject => Err(NotifierError::DeliveryRejected {
                    sink: self.name.to_string(),
                    reason: "nope".to_string(),
                }),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                }
                Behaviour::Panic => panic!("boom"),
            }
        }
    }

    fn sink(name: &'static str, behaviour: Behaviour) -> (Arc<dyn NotificationSink>, Arc<Mutex<Vec<String>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = FakeSink {
            name,
            behaviour,
            received: Arc::clone(&received),
        };
        (Arc::new(sink), received)
    }

    fn snapshot() -> EntitySnapshot {
        EntitySnapshot {
            platform: "Steam".to_string(),
            display_name: "Counter-Strike 2".to_string(),
            unique_id: "730".to_string(),
            version: "101".to_string(),
            update_time: "2024-03-01".to_string(),
            update_timestamp: 1_709_251_200,
            image_url: String::new(),
            patch_notes_url: String::new(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_sink() {
        let (a, a_seen) = sink("a", Behaviour::Accept);
        let (b, b_seen) = sink("b", Behaviour::Accept);
        let dispatcher = Dispatcher::new(vec![a, b], Duration::from_secs(1));

        let report = dispatcher.broadcast(&snapshot()).await;
        assert_eq!(report.delivered, 2);
        assert!(report.failures.is_empty());
        assert_eq!(*a_seen.lock().unwrap(), vec!["101"]);
        assert_eq!(*b_seen.lock().unwrap(), vec!["101"]);
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failing_sinks() {
        let (good, seen) = sink("good", Behaviour::Accept);
        let (bad, _) = sink("bad", Behaviour::Reject);
        let (slow, _) = sink("slow", Behaviour::Hang);
        let (crash, _) = sink("crash", Behaviour::Panic);
        let dispatcher =
            Dispatcher::new(vec![bad, slow, crash, good], Duration::from_millis(50));

        let report = dispatcher.broadcast(&snapshot()).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(report.failures.len(), 3);
        assert!(report
            .failures
            .iter()
            .all(|f| f.stage == FailureStage::Delivery));
        assert!(report.failures.iter().any(|f| f.message.contains("timed out")));
        assert!(report.failures.iter().any(|f| f.message.contains("panicked")));
    }

    #[tokio::test]
    async fn test_broadcast_without_sinks_is_noop() {
        let dispatcher = Dispatcher::new(Vec::new(), Duration::from_secs(1));
        let report = dispatcher.broadcast(&snapshot()).await;
        assert_eq!(report.delivered, 0);
        assert!(report.failures.is_empty());
        assert_eq!(dispatcher.sink_count(), 0);
    }
}
