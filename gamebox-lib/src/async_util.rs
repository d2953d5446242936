//! Driving a blocking or async job while consuming its event channel.
//!
//! Imports report through an [`ImportEventSender`](crate::import::ImportEventSender);
//! frontends run the import and feed every event to a display callback with
//! [`run_with_events`].

use std::future::Future;

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

/// How long to keep draining after the job finishes, in case a sender
/// clone outlives it.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Common interface of bounded and unbounded tokio receivers.
#[allow(async_fn_in_trait)]
pub trait EventReceiver<E> {
    /// The next event, or `None` once every sender is gone.
    async fn recv(&mut self) -> Option<E>;
}

impl<E> EventReceiver<E> for mpsc::Receiver<E> {
    async fn recv(&mut self) -> Option<E> {
        mpsc::Receiver::recv(self).await
    }
}

impl<E> EventReceiver<E> for mpsc::UnboundedReceiver<E> {
    async fn recv(&mut self) -> Option<E> {
        mpsc::UnboundedReceiver::recv(self).await
    }
}

/// Run `job` to completion, handing each event from `events` to `on_event`.
///
/// Events still queued when the job finishes are delivered before this
/// returns, so a terminal event sent last is always seen.
pub async fn run_with_events<F, E, R, Rx>(job: F, mut events: Rx, mut on_event: impl FnMut(E)) -> R
where
    F: Future<Output = R>,
    Rx: EventReceiver<E> + Unpin,
{
    tokio::pin!(job);
    let mut seen: u64 = 0;

    let result = loop {
        tokio::select! {
            r = &mut job => break Some(r),
            event = events.recv() => match event {
                Some(e) => {
                    seen += 1;
                    on_event(e);
                }
                None => break None,
            },
        }
    };

    let Some(result) = result else {
        log::debug!("Event channel closed after {} event(s); waiting for job", seen);
        return job.await;
    };

    let deadline = Instant::now() + DRAIN_TIMEOUT;
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Some(e)) => {
                seen += 1;
                on_event(e);
            }
            Ok(None) => break,
            Err(_) => {
                log::warn!(
                    "Stopped draining events after {}s; a sender is still alive",
                    DRAIN_TIMEOUT.as_secs()
                );
                break;
            }
        }
    }
    log::debug!("Job finished, {} event(s) handled", seen);
    result
}
