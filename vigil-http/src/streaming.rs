use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, error};
use vigil_core::{EventRecord, Subscription};

/// Gap between `: heartbeat` comments on an idle stream
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Keeps the hub subscription alive for as long as the response stream exists
/// When the transport drops the stream (client gone), the subscription goes with it
struct StreamLifecycle {
    subscription: Subscription,
    client: String,
}

impl Drop for StreamLifecycle {
    fn drop(&mut self) {
        debug!(
            client = %self.client,
            subscriber = self.subscription.id(),
            "log stream closed, unsubscribing"
        );
    }
}

fn to_sse<T: Serialize>(record: &T, client: &str) -> Option<Event> {
    match serde_json::to_string(record) {
        Ok(json) => Some(Event::default().data(json)),
        Err(e) => {
            error!(client, error = %e, "failed to serialize log event");
            None
        }
    }
}

/// SSE stream: replay `history`, then forward live events from `subscription`
/// Ends when the subscription is closed
pub fn log_event_stream(
    history: Vec<EventRecord>,
    subscription: Subscription,
    client: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let replay_client = client.clone();
    let replay = stream::iter(history)
        .filter_map(move |record| futures::future::ready(to_sse(&record, &replay_client)))
        .map(Ok::<_, Infallible>);

    let live = stream::unfold(
        StreamLifecycle {
            subscription,
            client,
        },
        |mut lifecycle| async move {
            loop {
                let record = lifecycle.subscription.recv().await?;
                if let Some(event) = to_sse(record.as_ref(), &lifecycle.client) {
                    return Some((Ok::<_, Infallible>(event), lifecycle));
                }
            }
        },
    );

    replay.chain(live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{EventHub, Severity};

    #[tokio::test]
    async fn test_history_then_live() {
        let hub = EventHub::new();
        hub.publish(EventRecord::new(Severity::Info, "old"));
        let subscription = hub.subscribe();
        let history = hub.history();

        let stream = log_event_stream(history, subscription, "test".to_string());
        futures::pin_mut!(stream);

        assert!(stream.next().await.is_some());
        hub.publish(EventRecord::new(Severity::Warn, "new"));
        assert!(stream.next().await.is_some());
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let hub = EventHub::new();
        let stream = log_event_stream(hub.history(), hub.subscribe(), "test".to_string());
        assert_eq!(hub.subscriber_count(), 1);

        drop(stream);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_ends_after_unsubscribe() {
        let hub = EventHub::new();
        let subscription = hub.subscribe();
        hub.unsubscribe(&subscription);

        let stream = log_event_stream(Vec::new(), subscription, "test".to_string());
        futures::pin_mut!(stream);
        assert!(stream.next().await.is_none());
    }
}
