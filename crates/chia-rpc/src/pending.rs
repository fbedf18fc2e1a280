//! Pending request table
//!
//! Maps a request id to the oneshot sender of the caller waiting for its
//! reply. An id is present exactly while someone is waiting on it: the
//! dispatcher removes it on arrival, dropping the caller's [`PendingReply`]
//! removes it otherwise, and closing the connection drains the table.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chia_protocol::{Envelope, RequestId};
use dashmap::DashMap;
use tokio::sync::oneshot;

#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    waiters: DashMap<RequestId, oneshot::Sender<Envelope>>,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `id` and return the receiver its reply will be delivered on.
    pub(crate) fn register(&self, id: RequestId) -> oneshot::Receiver<Envelope> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id, tx);
        rx
    }

    /// Register `id` and return a handle that forgets it when dropped.
    pub(crate) fn watch(self: &Arc<Self>, id: RequestId) -> PendingReply {
        let reply = self.register(id.clone());
        PendingReply {
            id,
            reply,
            table: Arc::clone(self),
        }
    }

    /// Hand `envelope` to the caller waiting on its request id.
    ///
    /// Returns the envelope back when nobody is waiting for it.
    pub(crate) fn resolve(&self, envelope: Envelope) -> Result<(), Envelope> {
        match self.waiters.remove(&envelope.request_id) {
            // A send error means the caller gave up between removal and send.
            Some((_, tx)) => tx.send(envelope).or(Ok(())),
            None => Err(envelope),
        }
    }

    /// Drop the entry for a caller that stopped waiting.
    pub(crate) fn forget(&self, id: &RequestId) -> bool {
        self.waiters.remove(id).is_some()
    }

    /// Drop every waiter; their receivers observe a closed channel.
    pub(crate) fn fail_all(&self) -> usize {
        let count = self.waiters.len();
        self.waiters.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }
}

/// A caller's wait for one reply
///
/// Resolves with the reply, or with an error once the table drops the
/// sender. However the wait ends (reply, timeout, cancellation) dropping
/// the handle removes the entry.
#[derive(Debug)]
pub(crate) struct PendingReply {
    id: RequestId,
    reply: oneshot::Receiver<Envelope>,
    table: Arc<PendingRequests>,
}

impl PendingReply {
    pub(crate) fn id(&self) -> &RequestId {
        &self.id
    }
}

impl Future for PendingReply {
    type Output = Result<Envelope, oneshot::error::RecvError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.reply).poll(cx)
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.table.forget(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chia_protocol::Payload;

    fn reply_to(id: &RequestId) -> Envelope {
        let mut envelope = Envelope::request("daemon", "chia_repl", "ping", Payload::new());
        envelope.request_id = id.clone();
        envelope
    }

    #[tokio::test]
    async fn resolve_delivers_to_matching_waiter_and_removes_entry() {
        let pending = PendingRequests::new();
        let id = RequestId::generate();
        let rx = pending.register(id.clone());
        assert_eq!(pending.len(), 1);

        assert!(pending.resolve(reply_to(&id)).is_ok());
        assert_eq!(pending.len(), 0);
        assert_eq!(rx.await.unwrap().request_id, id);
    }

    #[test]
    fn unmatched_envelope_is_returned() {
        let pending = PendingRequests::new();
        let _rx = pending.register(RequestId::generate());

        let stray = reply_to(&RequestId::generate());
        let returned = pending.resolve(stray.clone()).unwrap_err();
        assert_eq!(returned, stray);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn resolving_after_waiter_dropped_is_not_an_error() {
        let pending = PendingRequests::new();
        let id = RequestId::generate();
        drop(pending.register(id.clone()));

        assert!(pending.resolve(reply_to(&id)).is_ok());
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn forget_removes_only_the_given_id() {
        let pending = PendingRequests::new();
        let a = RequestId::generate();
        let b = RequestId::generate();
        let _ra = pending.register(a.clone());
        let _rb = pending.register(b.clone());

        assert!(pending.forget(&a));
        assert!(!pending.forget(&a));
        assert_eq!(pending.len(), 1);
        assert!(pending.resolve(reply_to(&b)).is_ok());
    }

    #[tokio::test]
    async fn fail_all_closes_every_receiver() {
        let pending = PendingRequests::new();
        let r1 = pending.register(RequestId::generate());
        let r2 = pending.register(RequestId::generate());

        assert_eq!(pending.fail_all(), 2);
        assert_eq!(pending.len(), 0);
        assert!(r1.await.is_err());
        assert!(r2.await.is_err());
    }

    #[tokio::test]
    async fn dropping_a_watch_removes_its_entry() {
        let pending = Arc::new(PendingRequests::new());
        let waiting = pending.watch(RequestId::generate());
        let abandoned = pending.watch(RequestId::generate());
        assert_eq!(pending.len(), 2);

        drop(abandoned);
        assert_eq!(pending.len(), 1);

        let id = waiting.id().clone();
        assert!(pending.resolve(reply_to(&id)).is_ok());
        assert_eq!(waiting.await.unwrap().request_id, id);
        assert_eq!(pending.len(), 0);
    }

    #[tokio::test]
    async fn watch_cancelled_by_timeout_is_forgotten() {
        let pending = Arc::new(PendingRequests::new());
        let waiting = pending.watch(RequestId::generate());

        let outcome = tokio::time::timeout(std::time::Duration::from_millis(10), waiting).await;
        assert!(outcome.is_err());
        assert_eq!(pending.len(), 0);
    }
}
