use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};

use crate::errors::AppError;

pub(crate) enum FeedMessage<S> {
    Snapshot(S),
    Failed(String),
}

/// Callbacks for a feed that forward into a channel drained by an SSE
/// response.
pub(crate) fn forward<S: Send + 'static>() -> (
    impl FnMut(S) + Send + 'static,
    impl FnOnce(AppError) + Send + 'static,
    mpsc::UnboundedReceiver<FeedMessage<S>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let err_tx = tx.clone();
    let on_update = move |snapshot: S| {
        let _ = tx.send(FeedMessage::Snapshot(snapshot));
    };
    let on_error = move |e: AppError| {
        let _ = err_tx.send(FeedMessage::Failed(e.to_string()));
    };
    (on_update, on_error, rx)
}

/// Stream every snapshot as a named SSE event. The stream owns `feed`, so
/// the subscription is cancelled when the client disconnects. A failed feed
/// drops its callbacks, which closes the channel and ends the response after
/// the `feed_error` event.
pub(crate) fn into_sse<S, G>(
    rx: mpsc::UnboundedReceiver<FeedMessage<S>>,
    name: &'static str,
    feed: G,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Serialize + Send + 'static,
    G: Send + 'static,
{
    let live_stream = UnboundedReceiverStream::new(rx).map(move |message| {
        let _ = &feed;
        let event = match message {
            FeedMessage::Snapshot(snapshot) => {
                let data = serde_json::to_string(&snapshot).unwrap_or_default();
                Event::default().data(data).event(name)
            }
            FeedMessage::Failed(message) => {
                tracing::warn!(stream = name, error = %message, "feed failed");
                Event::default().data(message).event("feed_error")
            }
        };
        Ok::<_, Infallible>(event)
    });

    Sse::new(live_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keepalive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn test_forward_delivers_snapshots_then_error() {
        let (mut on_update, on_error, mut rx) = forward::<Vec<u32>>();
        on_update(vec![1, 2]);
        on_error(AppError::Subscription("gone".to_string()));

        assert!(matches!(rx.recv().await, Some(FeedMessage::Snapshot(v)) if v == vec![1, 2]));
        assert!(matches!(rx.recv().await, Some(FeedMessage::Failed(m)) if m.contains("gone")));
    }

    #[tokio::test]
    async fn test_stream_ends_after_feed_error() {
        let (mut on_update, on_error, rx) = forward::<Vec<u32>>();
        on_update(vec![7]);
        on_error(AppError::Subscription("listener closed".to_string()));
        drop(on_update);

        let response = into_sse(rx, "numbers", ()).into_response();
        let body = tokio::time::timeout(
            Duration::from_secs(2),
            axum::body::to_bytes(response.into_body(), usize::MAX),
        )
        .await
        .expect("stream kept running after the feed failed")
        .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains("event: numbers"));
        assert!(text.contains("data: [7]"));
        assert!(text.contains("event: feed_error"));
        assert!(text.contains("listener closed"));
    }
}
