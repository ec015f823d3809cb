//! Client facade: query, subscribe and query-first over one transport.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use linkdns_protocol::{
    wire, Message, MessageSender, MulticastTransport, Query, Record, SendReport, Transport,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcaster::{Broadcaster, Subscription};
use crate::config::Config;
use crate::error::ClientError;
use crate::state::{ClientState, StateCell};

/// An mDNS client owning one transport and one broadcaster.
///
/// Inbound messages reach subscribers through a single fan-out task,
/// started on the first [`subscribe`](Self::subscribe).
pub struct Client {
    transport: Arc<dyn Transport>,
    sender: MessageSender,
    broadcaster: Broadcaster<Message>,
    state: StateCell,
    fanout_started: AtomicBool,
    fanout: Mutex<Option<JoinHandle<()>>>,
    close_lock: tokio::sync::Mutex<()>,
}

impl Client {
    /// Bind a multicast transport per `config` and wrap it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &Config) -> Result<Self, ClientError> {
        let transport = MulticastTransport::bind(config.transport_config()?)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            config.client.subscriber_depth,
        ))
    }

    /// Wrap an existing transport. Subscriber queues hold
    /// `subscriber_depth` messages.
    pub fn with_transport(transport: Arc<dyn Transport>, subscriber_depth: usize) -> Self {
        Self {
            sender: MessageSender::new(Arc::clone(&transport)),
            transport,
            broadcaster: Broadcaster::new(subscriber_depth),
            state: StateCell::new(ClientState::Open),
            fanout_started: AtomicBool::new(false),
            fanout: Mutex::new(None),
            close_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> ClientState {
        self.state.get()
    }

    /// Multicast `msg` without waiting for a response.
    pub async fn query(&self, msg: &Message) -> Result<SendReport, ClientError> {
        if !self.state().is_open() {
            return Err(ClientError::Closed);
        }
        Ok(self.sender.multicast(msg).await?)
    }

    /// Send `msg` to a single address.
    pub async fn send_to(&self, msg: &Message, addr: SocketAddr) -> Result<(), ClientError> {
        if !self.state().is_open() {
            return Err(ClientError::Closed);
        }
        Ok(self.sender.unicast(msg, addr).await?)
    }

    /// A continuous stream of every inbound message.
    ///
    /// After close this returns a subscription that is already closed.
    pub fn subscribe(&self) -> Subscription<Message> {
        let subscription = self.broadcaster.subscribe();
        self.start_fanout();
        subscription
    }

    fn start_fanout(&self) {
        if self
            .fanout_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        // Checked under the handle lock so close() either sees the handle
        // or this sees Closing.
        let mut fanout = self.fanout.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.state().is_open() {
            return;
        }
        let Some(mut inbound) = self.transport.take_inbound() else {
            warn!("transport inbound queue already taken; subscribers will see no traffic");
            return;
        };
        let broadcaster = self.broadcaster.clone();
        *fanout = Some(tokio::spawn(async move {
            while let Some(msg) = inbound.recv().await {
                broadcaster.publish(&msg);
            }
            debug!("fan-out task stopped");
        }));
        debug!("fan-out task started");
    }

    /// Send a single-question query and wait up to `deadline` for the first
    /// answer record matching it exactly.
    pub async fn query_first(
        &self,
        question: Query,
        deadline: Duration,
    ) -> Result<Record, ClientError> {
        let expiry = tokio::time::Instant::now() + deadline;
        self.first_answer(question, async move {
            tokio::time::sleep_until(expiry).await;
            ClientError::DeadlineExceeded
        })
        .await
    }

    /// Like [`query_first`](Self::query_first), but waits until `cancel`
    /// fires instead of a fixed deadline.
    pub async fn query_first_until(
        &self,
        question: Query,
        cancel: &CancellationToken,
    ) -> Result<Record, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        self.first_answer(question, async move {
            cancel.cancelled().await;
            ClientError::Cancelled
        })
        .await
    }

    async fn first_answer(
        &self,
        question: Query,
        stop: impl Future<Output = ClientError>,
    ) -> Result<Record, ClientError> {
        // Subscribe before sending so a fast answer is not missed.
        let mut subscription = self.subscribe();
        self.query(&wire::query_message(question.clone())).await?;

        tokio::pin!(stop);
        loop {
            tokio::select! {
                biased;
                msg = subscription.recv() => {
                    let Some(msg) = msg else {
                        return Err(ClientError::Closed);
                    };
                    if let Some(record) = wire::find_answer(&msg, &question) {
                        debug!(name = %question.name(), "answer received");
                        return Ok(record.clone());
                    }
                }
                err = &mut stop => return Err(err),
            }
        }
    }

    /// Close the broadcaster and the transport, then join the fan-out task.
    ///
    /// Idempotent. A concurrent caller returns only once teardown has
    /// finished; later calls return `Ok(())`.
    pub async fn close(&self) -> Result<(), ClientError> {
        let _guard = self.close_lock.lock().await;
        if self.state() == ClientState::Closed {
            return Ok(());
        }
        self.state.set(ClientState::Closing);

        self.broadcaster.close();
        let result = self.transport.close().await;

        let fanout = self
            .fanout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = fanout {
            if let Err(e) = handle.await {
                warn!(error = %e, "fan-out task failed");
            }
        }

        self.state.set(ClientState::Closed);
        info!("client closed");
        result.map_err(ClientError::from)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.broadcaster.close();
    }
}
