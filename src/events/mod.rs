use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::schemas::Event;

/// Default channel depth; a slow consumer applies backpressure to the
/// producing run once this many events are queued.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Create a connected emitter/stream pair sharing `cancellation`.
///
/// Cancelling the stream cancels the token, which the producing run
/// observes at its next suspension point.
pub fn event_channel(cancellation: CancellationToken) -> (EventEmitter, EventStream) {
    let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (
        EventEmitter {
            sender: Some(sender),
        },
        EventStream {
            receiver: ReceiverStream::new(receiver),
            cancellation,
        },
    )
}

/// Producer half of the event stream.
///
/// Emission after the consumer is gone is silently discarded — late
/// yields must never fail the run.
#[derive(Clone)]
pub struct EventEmitter {
    sender: Option<mpsc::Sender<Event>>,
}

impl EventEmitter {
    /// An emitter with no consumer; every emission is discarded. Used by
    /// `run`, which reads the result directly instead of the stream.
    pub fn discard() -> Self {
        Self { sender: None }
    }

    pub async fn emit(&self, event: Event) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event).await;
        }
    }
}

/// Cancellable, single-consumer sequence of [`Event`]s for one run.
///
/// Finishes after the producer emits its terminal event and drops the
/// sender. [`EventStream::cancel`] requests cooperative cancellation;
/// the stream then ends with a `Cancelled` event.
pub struct EventStream {
    receiver: ReceiverStream<Event>,
    cancellation: CancellationToken,
}

impl EventStream {
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Drain the stream, returning every event in emission order.
    pub async fn collect_events(mut self) -> Vec<Event> {
        use futures::StreamExt;

        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}
