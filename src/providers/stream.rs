//! Single-pass completion stream
//!
//! Wraps the normalized provider event stream, assigns fragment ordinals,
//! skips empty deltas and guarantees the stream terminates exactly once:
//! with the usage summary, or with an error.

use crate::domain::UsageSummary;
use crate::providers::{ProviderError, ProviderEvent};
use futures_core::Stream;
use futures_util::stream;
use pin_project_lite::pin_project;
use serde::Serialize;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// One piece of generated text with its 0-based ordinal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamFragment {
    pub index: u32,
    pub text: String,
}

/// What a [`CompletionStream`] yields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(StreamFragment),
    /// Terminal; nothing follows it
    Finished(UsageSummary),
}

type BoxedEvents = Pin<Box<dyn Stream<Item = Result<ProviderEvent, ProviderError>> + Send>>;

pin_project! {
    /// Lazily pulled completion output
    ///
    /// Fragments arrive in ordinal order starting at zero. The final item is
    /// either `Ok(StreamEvent::Finished(_))` or an `Err`; an upstream that
    /// ends without reporting usage yields [`ProviderError::StreamEndedEarly`].
    /// After the final item the stream returns `None` forever.
    pub struct CompletionStream {
        #[pin]
        events: BoxedEvents,
        next_index: u32,
        finished: bool,
    }
}

impl CompletionStream {
    pub fn new<S>(events: S) -> Self
    where
        S: Stream<Item = Result<ProviderEvent, ProviderError>> + Send + 'static,
    {
        Self {
            events: Box::pin(events),
            next_index: 0,
            finished: false,
        }
    }

    /// Stream over a fixed list of events
    pub fn from_events(events: Vec<Result<ProviderEvent, ProviderError>>) -> Self {
        Self::new(stream::iter(events))
    }

    /// Number of fragments handed out so far
    pub fn fragments_emitted(&self) -> u32 {
        self.next_index
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("next_index", &self.next_index)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Stream for CompletionStream {
    type Item = Result<StreamEvent, ProviderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.finished {
            return Poll::Ready(None);
        }

        loop {
            let item = match ready!(this.events.as_mut().poll_next(cx)) {
                Some(Ok(ProviderEvent::Delta(text))) => {
                    if text.is_empty() {
                        continue;
                    }
                    let index = *this.next_index;
                    *this.next_index += 1;
                    Ok(StreamEvent::Fragment(StreamFragment { index, text }))
                }
                Some(Ok(ProviderEvent::Completed(usage))) => {
                    *this.finished = true;
                    Ok(StreamEvent::Finished(usage))
                }
                Some(Err(error)) => {
                    *this.finished = true;
                    Err(error)
                }
                None => {
                    *this.finished = true;
                    Err(ProviderError::StreamEndedEarly)
                }
            };
            return Poll::Ready(Some(item));
        }
    }
}
