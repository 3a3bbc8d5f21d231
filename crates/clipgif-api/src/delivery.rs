//! Response bodies that report when they are finished.
//!
//! Purging a job must wait until its GIF has been handed to the client.
//! [`CompletionStream`] wraps the file stream and calls a hook exactly once,
//! either at end of stream or when the body is dropped early because the
//! client went away. The wrapped stream, and with it the open file, is
//! dropped before the hook runs.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;

/// How a body ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Every byte was handed to the transport.
    Completed { bytes: u64 },
    /// The body was dropped before all bytes were sent.
    Interrupted { bytes: u64 },
    /// Reading the underlying source failed.
    Failed { bytes: u64 },
}

impl DeliveryOutcome {
    pub fn bytes(&self) -> u64 {
        match *self {
            Self::Completed { bytes } | Self::Interrupted { bytes } | Self::Failed { bytes } => {
                bytes
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Interrupted { .. } => "interrupted",
            Self::Failed { .. } => "failed",
        }
    }
}

type CompletionHook = Box<dyn FnOnce(DeliveryOutcome) + Send + 'static>;

/// Stream adapter with a run-once completion hook.
pub struct CompletionStream<S> {
    inner: Option<S>,
    hook: Option<CompletionHook>,
    expected_len: Option<u64>,
    bytes: u64,
}

impl<S> CompletionStream<S> {
    pub fn new<F>(inner: S, hook: F) -> Self
    where
        F: FnOnce(DeliveryOutcome) + Send + 'static,
    {
        Self {
            inner: Some(inner),
            hook: Some(Box::new(hook)),
            expected_len: None,
            bytes: 0,
        }
    }

    /// Total body length, when known.
    ///
    /// The server may stop polling once it has written `Content-Length`
    /// bytes and drop the body without waiting for end of stream. With a
    /// known length such a drop still counts as completed.
    pub fn with_expected_len(mut self, len: u64) -> Self {
        self.expected_len = Some(len);
        self
    }

    fn finish(&mut self, outcome: DeliveryOutcome) {
        // Close the source before anyone deletes it.
        self.inner = None;
        if let Some(hook) = self.hook.take() {
            hook(outcome);
        }
    }

    fn fully_sent(&self) -> bool {
        self.expected_len.is_some_and(|len| self.bytes >= len)
    }
}

impl<S, B, E> Stream for CompletionStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    type Item = Result<B, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match Pin::new(inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes += chunk.as_ref().len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                let bytes = this.bytes;
                this.finish(DeliveryOutcome::Failed { bytes });
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                let bytes = this.bytes;
                this.finish(DeliveryOutcome::Completed { bytes });
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S> Drop for CompletionStream<S> {
    fn drop(&mut self) {
        if self.hook.is_none() {
            return;
        }
        let bytes = self.bytes;
        let outcome = if self.fully_sent() {
            DeliveryOutcome::Completed { bytes }
        } else {
            DeliveryOutcome::Interrupted { bytes }
        };
        self.finish(outcome);
    }
}
