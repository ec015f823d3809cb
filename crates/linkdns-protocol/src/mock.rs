//! In-memory transport for testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use hickory_proto::op::Message;
use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::queue::{self, Offer};
use crate::transport::{FamilyReport, SendReport, Transport};
use crate::wire;

/// Where a recorded packet was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Multicast,
    Unicast(SocketAddr),
}

/// A packet handed to the mock transport.
#[derive(Debug, Clone)]
pub struct SentPacket {
    pub destination: Destination,
    pub bytes: Vec<u8>,
}

impl SentPacket {
    /// Decode the recorded bytes.
    pub fn message(&self) -> Result<Message, ProtocolError> {
        wire::decode_message(&self.bytes)
    }
}

#[derive(Debug)]
struct MockState {
    sent: Vec<SentPacket>,
    inbound_tx: Option<mpsc::Sender<Message>>,
    failing: bool,
    closed: bool,
}

/// Mock transport backend for testing.
///
/// Multicast sends always report a single IPv4 interface. Inbound traffic
/// is whatever the test injects through the [`MockTransportHandle`].
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Message>>>,
}

impl MockTransport {
    /// Create a mock transport with an inbound queue of `depth`, plus a
    /// handle for driving it.
    pub fn new(depth: usize) -> (Self, MockTransportHandle) {
        let (inbound_tx, inbound_rx) = queue::bounded(depth);
        let state = Arc::new(Mutex::new(MockState {
            sent: Vec::new(),
            inbound_tx: Some(inbound_tx),
            failing: false,
            closed: false,
        }));
        let handle = MockTransportHandle {
            state: Arc::clone(&state),
        };
        let transport = Self {
            state,
            inbound_rx: Mutex::new(Some(inbound_rx)),
        };
        (transport, handle)
    }

    fn record(&self, destination: Destination, packet: &[u8]) -> Result<(), ProtocolError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(ProtocolError::Closed);
        }
        if state.failing {
            return Err(ProtocolError::NothingSent { attempted: 1 });
        }
        state.sent.push(SentPacket {
            destination,
            bytes: packet.to_vec(),
        });
        Ok(())
    }
}

/// Clonable handle for injecting inbound messages and observing sends.
#[derive(Clone)]
pub struct MockTransportHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockTransportHandle {
    /// Deliver `msg` as if it had arrived from the network.
    pub fn inject(&self, msg: Message) -> Offer {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &state.inbound_tx {
            Some(tx) => queue::offer(tx, msg),
            None => Offer::Closed,
        }
    }

    /// Snapshot of every packet sent so far.
    pub fn sent(&self) -> Vec<SentPacket> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }

    /// Make subsequent sends fail as if no interface accepted the write.
    pub fn set_failing(&self, failing: bool) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failing = failing;
    }

    pub fn is_closed(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn multicast(&self, packet: &[u8]) -> Result<SendReport, ProtocolError> {
        self.record(Destination::Multicast, packet)?;
        Ok(SendReport {
            v4: FamilyReport {
                attempted: 1,
                sent: 1,
            },
            v6: FamilyReport::default(),
        })
    }

    async fn unicast(&self, packet: &[u8], addr: SocketAddr) -> Result<(), ProtocolError> {
        self.record(Destination::Unicast(addr), packet)
    }

    fn take_inbound(&self) -> Option<mpsc::Receiver<Message>> {
        self.inbound_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn close(&self) -> Result<(), ProtocolError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        // Dropping the sender ends the inbound stream once it drains.
        state.inbound_tx = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::Query;
    use hickory_proto::rr::{Name, RecordType};

    fn query(name: &str) -> Message {
        wire::query_message(Query::query(Name::from_ascii(name).unwrap(), RecordType::A))
    }

    #[tokio::test]
    async fn injected_messages_reach_inbound() {
        let (transport, handle) = MockTransport::new(4);
        let mut inbound = transport.take_inbound().unwrap();
        assert_eq!(handle.inject(query("a.local.")), Offer::Enqueued);

        let msg = inbound.recv().await.unwrap();
        assert_eq!(msg.queries()[0].name().to_ascii(), "a.local.");
    }

    #[tokio::test]
    async fn sends_are_recorded_until_close() {
        let (transport, handle) = MockTransport::new(4);
        let packet = wire::encode_message(&query("b.local.")).unwrap();
        transport.multicast(&packet).await.unwrap();

        let sent = handle.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination, Destination::Multicast);
        assert_eq!(
            sent[0].message().unwrap().queries()[0].name().to_ascii(),
            "b.local."
        );

        transport.close().await.unwrap();
        assert!(handle.is_closed());
        assert!(matches!(
            transport.multicast(&packet).await.unwrap_err(),
            ProtocolError::Closed
        ));
        assert_eq!(handle.inject(query("c.local.")), Offer::Closed);
    }
}
