//! Transport abstraction for oracle requests.
//!
//! The transport layer only moves bytes. Implementations may use HTTP, a
//! relayer, or an in-process channel. Encoding, timeouts and reply
//! validation belong to the [`OracleClient`](crate::OracleClient).

use async_trait::async_trait;

use crate::error::Result;

/// Transport trait for one request/reply exchange with an oracle.
///
/// Implementations must be thread-safe (Send + Sync) and should map every
/// delivery failure to [`OracleError::Unavailable`](crate::OracleError::Unavailable).
#[async_trait]
pub trait OracleTransport: Send + Sync {
    /// Send encoded request bytes and wait for the encoded reply.
    async fn exchange(&self, request: Vec<u8>) -> Result<Vec<u8>>;
}

#[async_trait]
impl<T: OracleTransport + ?Sized> OracleTransport for std::sync::Arc<T> {
    async fn exchange(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        (**self).exchange(request).await
    }
}

/// In-memory transports for testing.
///
/// [`ChannelTransport`](memory::ChannelTransport) runs a [`LocalOracle`](crate::LocalOracle)
/// on its own task and talks to it over channels. The other types inject
/// latency, outages and arbitrary replies.
pub mod memory {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot};

    use sealnote_store::CapabilityStore;

    use crate::error::OracleError;
    use crate::local::LocalOracle;

    /// Request envelope for internal routing.
    struct Envelope {
        request: Vec<u8>,
        reply: oneshot::Sender<Result<Vec<u8>>>,
    }

    /// Transport to an oracle task spawned on the current runtime.
    #[derive(Clone)]
    pub struct ChannelTransport {
        sender: mpsc::Sender<Envelope>,
    }

    impl ChannelTransport {
        /// Spawn `oracle` on its own task and return a transport to it.
        ///
        /// The task ends once every transport clone is dropped.
        pub fn spawn<S>(oracle: Arc<LocalOracle<S>>) -> Self
        where
            S: CapabilityStore + 'static,
        {
            let (sender, mut receiver) = mpsc::channel::<Envelope>(64);

            tokio::spawn(async move {
                while let Some(envelope) = receiver.recv().await {
                    let reply = oracle.handle_bytes(&envelope.request).await;
                    // The caller may have timed out and gone away.
                    let _ = envelope.reply.send(reply);
                }
            });

            Self { sender }
        }
    }

    #[async_trait]
    impl OracleTransport for ChannelTransport {
        async fn exchange(&self, request: Vec<u8>) -> Result<Vec<u8>> {
            let (reply, receiver) = oneshot::channel();
            self.sender
                .send(Envelope { request, reply })
                .await
                .map_err(|_| OracleError::Unavailable("oracle task stopped".into()))?;

            receiver
                .await
                .map_err(|_| OracleError::Unavailable("oracle dropped request".into()))?
        }
    }

    /// Delays every exchange of an inner transport.
    pub struct DelayedTransport<T> {
        inner: T,
        delay: Duration,
    }

    impl<T> DelayedTransport<T> {
        pub fn new(inner: T, delay: Duration) -> Self {
            Self { inner, delay }
        }
    }

    #[async_trait]
    impl<T: OracleTransport> OracleTransport for DelayedTransport<T> {
        async fn exchange(&self, request: Vec<u8>) -> Result<Vec<u8>> {
            tokio::time::sleep(self.delay).await;
            self.inner.exchange(request).await
        }
    }

    /// A transport whose oracle can never be reached.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct UnreachableTransport;

    #[async_trait]
    impl OracleTransport for UnreachableTransport {
        async fn exchange(&self, _request: Vec<u8>) -> Result<Vec<u8>> {
            Err(OracleError::Unavailable("connection refused".into()))
        }
    }

    /// A transport that answers with whatever a closure returns.
    pub struct FnTransport<F> {
        respond: F,
    }

    impl<F> FnTransport<F>
    where
        F: Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync,
    {
        pub fn new(respond: F) -> Self {
            Self { respond }
        }
    }

    #[async_trait]
    impl<F> OracleTransport for FnTransport<F>
    where
        F: Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync,
    {
        async fn exchange(&self, request: Vec<u8>) -> Result<Vec<u8>> {
            (self.respond)(&request)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::*;
    use super::*;
    use crate::error::OracleError;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fn_transport_echo() {
        let transport = FnTransport::new(|req: &[u8]| Ok(req.to_vec()));
        assert_eq!(transport.exchange(b"ping".to_vec()).await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_unreachable() {
        assert!(matches!(
            UnreachableTransport.exchange(vec![]).await,
            Err(OracleError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_delayed_transport_waits() {
        let transport = DelayedTransport::new(
            FnTransport::new(|_: &[u8]| Ok(vec![1])),
            Duration::from_millis(50),
        );
        let start = tokio::time::Instant::now();
        transport.exchange(vec![]).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
