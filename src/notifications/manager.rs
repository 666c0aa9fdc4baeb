use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::core::sync::lock_recovering;
use crate::notifications::error::NotificationError;
use crate::notifications::event::{EventFilter, SyncEvent};

struct SubscriberInfo {
    filter: EventFilter,
    source: String,
    sender: UnboundedSender<SyncEvent>,
}

/// Fan-out of sync events to filtered subscribers
///
/// Publishing never blocks; subscribers whose receiver was dropped are
/// removed on the next publish.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<String, SubscriberInfo>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        subscriber_id: impl Into<String>,
        filter: EventFilter,
        source: impl Into<String>,
    ) -> UnboundedReceiver<SyncEvent> {
        let subscriber_id = subscriber_id.into();
        let source = source.into();
        let (sender, receiver) = unbounded_channel();

        let info = SubscriberInfo {
            filter,
            source: source.clone(),
            sender,
        };
        if let Some(existing) =
            lock_recovering(&self.subscribers, "subscribers").insert(subscriber_id.clone(), info)
        {
            log::warn!(
                "Subscriber '{}' replaced existing subscription (source: {} -> {})",
                subscriber_id,
                existing.source,
                source
            );
        }

        receiver
    }

    pub fn unsubscribe(&self, subscriber_id: &str) -> bool {
        lock_recovering(&self.subscribers, "subscribers")
            .remove(subscriber_id)
            .is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        lock_recovering(&self.subscribers, "subscribers").len()
    }

    pub fn publish(&self, event: SyncEvent) -> Result<(), NotificationError> {
        log::trace!("Publishing {} event for {}", event.kind_name(), event.project);
        let mut subscribers = lock_recovering(&self.subscribers, "subscribers");

        let failed_subscribers: Vec<String> = subscribers
            .iter()
            .filter(|(_, info)| info.filter.accepts(&event))
            .filter(|(_, info)| info.sender.send(event.clone()).is_err())
            .map(|(id, _)| id.clone())
            .collect();

        for subscriber_id in &failed_subscribers {
            subscribers.remove(subscriber_id);
        }

        if failed_subscribers.is_empty() {
            Ok(())
        } else {
            Err(NotificationError::PublishFailed {
                event_type: event.kind_name().to_string(),
                failed_subscribers,
            })
        }
    }

    /// Publish and only log failures
    pub fn emit(&self, event: SyncEvent) {
        if let Err(e) = self.publish(event) {
            log::debug!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ProjectId;
    use crate::notifications::event::{SyncEventKind, WarningKey};

    #[tokio::test]
    async fn test_publish_reaches_matching_subscribers() {
        let bus = EventBus::new();
        let mut all = bus.subscribe("all", EventFilter::All, "test");
        let mut warnings = bus.subscribe("warnings", EventFilter::WarningsOnly, "test");

        bus.publish(SyncEvent::new(ProjectId::new("p"), SyncEventKind::RefreshRequested))
            .unwrap();
        bus.publish(SyncEvent::warning(
            ProjectId::new("p"),
            WarningKey::UploadFailed,
            "upload failed",
        ))
        .unwrap();

        assert_eq!(all.recv().await.unwrap().kind, SyncEventKind::RefreshRequested);
        assert!(matches!(
            all.recv().await.unwrap().kind,
            SyncEventKind::Warning { .. }
        ));
        assert!(matches!(
            warnings.recv().await.unwrap().kind,
            SyncEventKind::Warning {
                key: WarningKey::UploadFailed,
                ..
            }
        ));
        assert!(warnings.try_recv().is_err());
    }

    #[test]
    fn test_closed_subscribers_are_removed() {
        let bus = EventBus::new();
        let receiver = bus.subscribe("gone", EventFilter::All, "test");
        drop(receiver);

        let result = bus.publish(SyncEvent::new(
            ProjectId::new("p"),
            SyncEventKind::FullRescanRequested,
        ));

        assert!(matches!(result, Err(NotificationError::PublishFailed { .. })));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_project_filter() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe("p", EventFilter::Project(ProjectId::new("p")), "test");

        bus.emit(SyncEvent::new(ProjectId::new("q"), SyncEventKind::RefreshRequested));
        bus.emit(SyncEvent::new(ProjectId::new("p"), SyncEventKind::LoginRequired));

        assert_eq!(receiver.try_recv().unwrap().kind, SyncEventKind::LoginRequired);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_resubscribe_replaces() {
        let bus = EventBus::new();
        let _first = bus.subscribe("ui", EventFilter::All, "a");
        let _second = bus.subscribe("ui", EventFilter::All, "b");

        assert_eq!(bus.subscriber_count(), 1);
        assert!(bus.unsubscribe("ui"));
    }
}
