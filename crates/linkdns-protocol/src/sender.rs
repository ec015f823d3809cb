//! Send path: serialise once, hand the bytes to the transport.

use std::net::SocketAddr;
use std::sync::Arc;

use hickory_proto::op::Message;
use tracing::debug;

use crate::error::ProtocolError;
use crate::transport::{SendReport, Transport};
use crate::wire;

/// Encodes messages and sends them over a shared transport.
///
/// No retry and no queueing: a failed send is reported to the caller.
#[derive(Clone)]
pub struct MessageSender {
    transport: Arc<dyn Transport>,
}

impl MessageSender {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Multicast a message on every joined interface.
    pub async fn multicast(&self, msg: &Message) -> Result<SendReport, ProtocolError> {
        let packet = wire::encode_message(msg)?;
        let report = self.transport.multicast(&packet).await?;
        debug!(
            questions = msg.queries().len(),
            answers = msg.answers().len(),
            names = ?wire::message_names(msg),
            sent = report.sent(),
            "sent DNS message"
        );
        Ok(report)
    }

    /// Send a message to a single address.
    pub async fn unicast(&self, msg: &Message, addr: SocketAddr) -> Result<(), ProtocolError> {
        let packet = wire::encode_message(msg)?;
        self.transport.unicast(&packet, addr).await?;
        debug!(
            to = %addr,
            questions = msg.queries().len(),
            answers = msg.answers().len(),
            names = ?wire::message_names(msg),
            "sent DNS message"
        );
        Ok(())
    }
}
