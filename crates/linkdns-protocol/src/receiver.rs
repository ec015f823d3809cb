//! Receive path: one task per socket, decoding datagrams onto the inbound
//! queue.

use std::io;
use std::sync::Arc;

use hickory_proto::op::Message;
use linkdns_types::Family;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::queue::{self, Offer};
use crate::wire;

/// Read datagrams from `socket` until `shutdown` fires or the inbound queue
/// is gone.
///
/// Undecodable datagrams are logged and discarded. A full inbound queue
/// drops the message rather than stalling the read loop.
pub(crate) async fn receive_loop(
    socket: Arc<UdpSocket>,
    family: Family,
    inbound: mpsc::Sender<Message>,
    buf_size: usize,
    shutdown: CancellationToken,
) {
    let mut buf = vec![0u8; buf_size];

    loop {
        let result = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            result = socket.recv_from(&mut buf) => result,
        };

        let (len, from) = match result {
            Ok(received) => received,
            Err(e) if is_closed(&e) => break,
            Err(e) => {
                warn!(%family, error = %e, "error receiving UDP datagram");
                continue;
            }
        };

        let msg = match wire::decode_message(&buf[..len]) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(%family, from = %from, error = %e, "discarding undecodable datagram");
                continue;
            }
        };

        debug!(
            from = %from,
            questions = msg.queries().len(),
            answers = msg.answers().len(),
            names = ?wire::message_names(&msg),
            "received DNS message"
        );

        match queue::offer(&inbound, msg) {
            Offer::Enqueued => {}
            Offer::Dropped => trace!(%family, "inbound queue full; dropping message"),
            Offer::Closed => break,
        }
    }

    trace!(%family, "receive loop stopped");
}

/// Errors that mean the socket will never yield another datagram.
fn is_closed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe
    )
}
