//! Site resolution notifications
//!
//! Collaborators that need to react to a resolved site (per-site caches,
//! audit hooks) subscribe to [`SiteEvents`]. Publishing never blocks; with no
//! subscribers the event is dropped.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::domain::Site;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct SiteFound {
    pub site: Arc<Site>,
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct SiteEvents {
    tx: broadcast::Sender<SiteFound>,
}

impl SiteEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SiteFound> {
        self.tx.subscribe()
    }

    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: SiteFound) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for SiteEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn found(host: &str) -> SiteFound {
        SiteFound {
            site: Arc::new(Site::new("foo", "Foo", vec![], HashMap::new(), vec![])),
            host: host.to_string(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let events = SiteEvents::new();
        let mut rx = events.subscribe();

        assert_eq!(events.publish(found("foo.test")), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.site.name(), "foo");
        assert_eq!(event.host, "foo.test");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let events = SiteEvents::new();
        assert_eq!(events.publish(found("foo.test")), 0);
    }
}
