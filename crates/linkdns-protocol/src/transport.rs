//! Multicast transport: one UDP socket per address family, joined to the
//! mDNS group on every capable interface.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use hickory_proto::op::Message;
use linkdns_discovery::{InterfaceSource, SystemInterfaces};
use linkdns_types::{
    AddressFamilies, BindStrategy, Capability, Family, InterfaceDescriptor, DEFAULT_QUEUE_DEPTH,
    MIN_RECV_BUFFER_SIZE,
};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::error::ProtocolError;
use crate::{queue, receiver, socket};

/// A datagram transport for mDNS messages.
///
/// Inbound datagrams arrive already decoded on a single bounded queue that
/// drops on overflow.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send `packet` to the mDNS group on every joined interface of every
    /// active family.
    async fn multicast(&self, packet: &[u8]) -> Result<SendReport, ProtocolError>;

    /// Send `packet` to a single address on the socket of its family.
    async fn unicast(&self, packet: &[u8], addr: SocketAddr) -> Result<(), ProtocolError>;

    /// Take the inbound queue. Returns `None` once taken.
    fn take_inbound(&self) -> Option<mpsc::Receiver<Message>>;

    /// Close every socket and join the receive tasks. Idempotent.
    async fn close(&self) -> Result<(), ProtocolError>;
}

/// Transport construction parameters.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub families: AddressFamilies,
    pub bind: BindStrategy,
    /// Interfaces to join on. Empty means every multicast-capable interface.
    pub interfaces: Vec<InterfaceDescriptor>,
    /// Per-read buffer size in bytes, clamped to [`MIN_RECV_BUFFER_SIZE`].
    pub recv_buffer_size: usize,
    /// Inbound queue depth.
    pub queue_depth: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            families: AddressFamilies::default(),
            bind: BindStrategy::default(),
            interfaces: Vec::new(),
            recv_buffer_size: MIN_RECV_BUFFER_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl TransportConfig {
    pub fn recv_buffer_size(&self) -> usize {
        self.recv_buffer_size.max(MIN_RECV_BUFFER_SIZE)
    }
}

/// Per-family outcome of a multicast send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FamilyReport {
    pub attempted: usize,
    pub sent: usize,
}

/// Outcome of a multicast send across both families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendReport {
    pub v4: FamilyReport,
    pub v6: FamilyReport,
}

impl SendReport {
    pub fn family(&self, family: Family) -> FamilyReport {
        match family {
            Family::V4 => self.v4,
            Family::V6 => self.v6,
        }
    }

    fn family_mut(&mut self, family: Family) -> &mut FamilyReport {
        match family {
            Family::V4 => &mut self.v4,
            Family::V6 => &mut self.v6,
        }
    }

    pub fn attempted(&self) -> usize {
        self.v4.attempted + self.v6.attempted
    }

    pub fn sent(&self) -> usize {
        self.v4.sent + self.v6.sent
    }
}

/// Group membership of one interface on one family's socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Joined; the interface receives group traffic and is used for sends.
    Joined,
    /// Capable, but the join failed; excluded from sends.
    JoinFailed,
    /// No address in this family; never attempted.
    Incapable,
}

/// An interface as seen by one family's socket.
#[derive(Debug, Clone)]
pub struct Member {
    pub interface: InterfaceDescriptor,
    pub membership: Membership,
}

/// One family's socket with its outgoing-interface selection.
struct FamilySocket {
    family: Family,
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    /// Index of the interface currently selected for multicast egress.
    /// Held for the whole select-then-write sequence.
    selected: tokio::sync::Mutex<Option<u32>>,
}

impl FamilySocket {
    async fn send_via(&self, iface: &InterfaceDescriptor, packet: &[u8]) -> std::io::Result<()> {
        let mut selected = self.selected.lock().await;
        if *selected != Some(iface.index) {
            socket::select_interface(&self.socket, self.family, iface)?;
            *selected = Some(iface.index);
        }
        self.socket.send_to(packet, self.family.group_addr()).await?;
        Ok(())
    }
}

#[derive(Default)]
struct Sockets {
    v4: Option<Arc<FamilySocket>>,
    v6: Option<Arc<FamilySocket>>,
}

impl Sockets {
    fn get(&self, family: Family) -> Option<&Arc<FamilySocket>> {
        match family {
            Family::V4 => self.v4.as_ref(),
            Family::V6 => self.v6.as_ref(),
        }
    }

    fn slot(&mut self, family: Family) -> &mut Option<Arc<FamilySocket>> {
        match family {
            Family::V4 => &mut self.v4,
            Family::V6 => &mut self.v6,
        }
    }
}

/// The mDNS multicast transport over real sockets.
pub struct MulticastTransport {
    sockets: RwLock<Sockets>,
    /// Interfaces with their capability, probed once at construction.
    interfaces: Vec<(InterfaceDescriptor, Capability)>,
    members_v4: Vec<Member>,
    members_v6: Vec<Member>,
    inbound: Mutex<Option<mpsc::Receiver<Message>>>,
    shutdown: CancellationToken,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    span: Span,
}

impl MulticastTransport {
    /// Bind a transport, discovering interfaces from the host when the
    /// config names none.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: TransportConfig) -> Result<Self, ProtocolError> {
        Self::bind_with(config, &SystemInterfaces)
    }

    /// Bind a transport using `source` for interface discovery and probing.
    pub fn bind_with(
        config: TransportConfig,
        source: &dyn InterfaceSource,
    ) -> Result<Self, ProtocolError> {
        let span = info_span!("mdns_transport", families = %config.families, bind = %config.bind);
        let entered = span.enter();

        let interfaces = if config.interfaces.is_empty() {
            linkdns_discovery::discover_from(source)?
        } else {
            config.interfaces.clone()
        };
        let interfaces: Vec<_> = interfaces
            .into_iter()
            .map(|iface| {
                let capability = source.probe(&iface).unwrap_or_else(|e| {
                    debug!(interface = %iface, error = %e, "capability probe failed; treating as incapable");
                    Capability::NONE
                });
                (iface, capability)
            })
            .collect();

        let mut sockets = Sockets::default();
        let mut members_v4 = Vec::new();
        let mut members_v6 = Vec::new();
        let mut failures: [Option<String>; 2] = [None, None];

        for family in config.families.iter() {
            let slot = family_slot(family);
            match socket::open(family, config.bind) {
                Ok(udp) => {
                    let members = join_all(&udp, family, &interfaces);
                    let local_addr = udp.local_addr()?;
                    *sockets.slot(family) = Some(Arc::new(FamilySocket {
                        family,
                        socket: Arc::new(udp),
                        local_addr,
                        selected: tokio::sync::Mutex::new(None),
                    }));
                    match family {
                        Family::V4 => members_v4 = members,
                        Family::V6 => members_v6 = members,
                    }
                }
                Err(e) => {
                    failures[slot] = Some(e.to_string());
                }
            }
        }

        if sockets.v4.is_none() && sockets.v6.is_none() {
            let [ipv4, ipv6] =
                failures.map(|failure| failure.unwrap_or_else(|| "not requested".to_string()));
            debug!(%ipv4, %ipv6, "failed to open a socket for any family");
            return Err(ProtocolError::NoTransport { ipv4, ipv6 });
        }
        for family in config.families.iter() {
            if let Some(reason) = &failures[family_slot(family)] {
                warn!(%family, error = %reason, "failed to open socket; continuing without it");
            }
        }

        let (inbound_tx, inbound_rx) = queue::bounded(config.queue_depth);
        let shutdown = CancellationToken::new();
        let mut tasks = Vec::new();
        for family_socket in [&sockets.v4, &sockets.v6].into_iter().flatten() {
            let task = receiver::receive_loop(
                Arc::clone(&family_socket.socket),
                family_socket.family,
                inbound_tx.clone(),
                config.recv_buffer_size(),
                shutdown.clone(),
            );
            tasks.push(tokio::spawn(task.instrument(span.clone())));
        }

        info!(
            ipv4 = ?sockets.v4.as_ref().map(|s| s.local_addr),
            ipv6 = ?sockets.v6.as_ref().map(|s| s.local_addr),
            "mDNS transport bound"
        );

        drop(entered);
        Ok(Self {
            sockets: RwLock::new(sockets),
            interfaces,
            members_v4,
            members_v6,
            inbound: Mutex::new(Some(inbound_rx)),
            shutdown,
            tasks: tokio::sync::Mutex::new(tasks),
            span,
        })
    }

    fn socket(&self, family: Family) -> Option<Arc<FamilySocket>> {
        self.sockets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(family)
            .cloned()
    }

    /// Families with an open socket.
    pub fn active_families(&self) -> Vec<Family> {
        Family::ALL
            .into_iter()
            .filter(|f| self.socket(*f).is_some())
            .collect()
    }

    /// The local address of `family`'s socket, if open.
    pub fn local_addr(&self, family: Family) -> Option<SocketAddr> {
        self.socket(family).map(|s| s.local_addr)
    }

    /// Every interface considered at construction, with its capability.
    pub fn interfaces(&self) -> &[(InterfaceDescriptor, Capability)] {
        &self.interfaces
    }

    /// The cached capability of the interface with `index`.
    pub fn capability(&self, index: u32) -> Option<Capability> {
        self.interfaces
            .iter()
            .find(|(iface, _)| iface.index == index)
            .map(|(_, cap)| *cap)
    }

    /// Group membership per interface on `family`'s socket. Empty when that
    /// family has no socket.
    pub fn membership(&self, family: Family) -> &[Member] {
        match family {
            Family::V4 => &self.members_v4,
            Family::V6 => &self.members_v6,
        }
    }

    fn send_targets(&self, family: Family) -> impl Iterator<Item = &InterfaceDescriptor> {
        self.membership(family)
            .iter()
            .filter(|m| m.membership == Membership::Joined)
            .map(|m| &m.interface)
    }
}

fn family_slot(family: Family) -> usize {
    match family {
        Family::V4 => 0,
        Family::V6 => 1,
    }
}

/// Join the group on every interface capable of `family`.
fn join_all(
    udp: &UdpSocket,
    family: Family,
    interfaces: &[(InterfaceDescriptor, Capability)],
) -> Vec<Member> {
    let mut joined = 0usize;
    let members: Vec<_> = interfaces
        .iter()
        .map(|(iface, capability)| {
            let membership = if !capability.supports(family) {
                Membership::Incapable
            } else if let Err(e) = socket::join(udp, family, iface) {
                debug!(%family, interface = %iface, error = %e, "failed to join multicast group; skipping");
                Membership::JoinFailed
            } else {
                joined += 1;
                Membership::Joined
            };
            Member {
                interface: iface.clone(),
                membership,
            }
        })
        .collect();

    if joined == 0 {
        warn!(%family, total = interfaces.len(), "no interface joined the mDNS group; expect little inbound traffic");
    } else {
        debug!(%family, joined, total = interfaces.len(), "joined mDNS group");
    }
    members
}

#[async_trait]
impl Transport for MulticastTransport {
    async fn multicast(&self, packet: &[u8]) -> Result<SendReport, ProtocolError> {
        let mut report = SendReport::default();
        let mut any_socket = false;

        for family in Family::ALL {
            let Some(family_socket) = self.socket(family) else {
                continue;
            };
            any_socket = true;
            for iface in self.send_targets(family) {
                let counts = report.family_mut(family);
                counts.attempted += 1;
                match family_socket.send_via(iface, packet).await {
                    Ok(()) => counts.sent += 1,
                    Err(e) => {
                        debug!(parent: &self.span, %family, interface = %iface, error = %e, "multicast write failed; skipping");
                    }
                }
            }
        }

        if !any_socket {
            return Err(ProtocolError::Closed);
        }
        if report.sent() == 0 {
            return Err(ProtocolError::NothingSent {
                attempted: report.attempted(),
            });
        }
        debug!(parent: &self.span, sent4 = report.v4.sent, sent6 = report.v6.sent, "multicast message sent");
        Ok(report)
    }

    async fn unicast(&self, packet: &[u8], addr: SocketAddr) -> Result<(), ProtocolError> {
        if self.shutdown.is_cancelled() {
            return Err(ProtocolError::Closed);
        }
        let family = Family::of(&addr.ip());
        let addr = match addr {
            SocketAddr::V6(v6) if family == Family::V4 => v6
                .ip()
                .to_ipv4_mapped()
                .map_or(addr, |ip| SocketAddr::new(ip.into(), v6.port())),
            _ => addr,
        };
        let family_socket = self
            .socket(family)
            .ok_or(ProtocolError::FamilyUnavailable(family))?;

        if let Err(e) = family_socket.socket.send_to(packet, addr).await {
            debug!(parent: &self.span, address = %addr, error = %e, "unicast write failed");
            return Err(e.into());
        }
        debug!(parent: &self.span, address = %addr, "unicast message sent");
        Ok(())
    }

    fn take_inbound(&self) -> Option<mpsc::Receiver<Message>> {
        self.inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn close(&self) -> Result<(), ProtocolError> {
        // Held for the whole teardown so a concurrent caller returns only
        // after the tasks are joined.
        let mut tasks = self.tasks.lock().await;
        if tasks.is_empty() && self.shutdown.is_cancelled() {
            return Ok(());
        }

        self.shutdown.cancel();
        let closed = std::mem::take(&mut *self.sockets.write().unwrap_or_else(PoisonError::into_inner));

        let mut failures = Vec::new();
        for handle in tasks.drain(..) {
            if let Err(e) = handle.await {
                failures.push(e.to_string());
            }
        }
        drop(closed);
        info!(parent: &self.span, "mDNS transport closed");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::Other(anyhow::anyhow!(
                "receive task failed: {}",
                failures.join("; ")
            )))
        }
    }
}

impl Drop for MulticastTransport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkdns_discovery::StaticInterfaces;
    use linkdns_types::InterfaceFlags;
    use std::net::Ipv4Addr;

    fn no_interfaces() -> StaticInterfaces {
        StaticInterfaces(Vec::new())
    }

    fn v4_only() -> TransportConfig {
        TransportConfig {
            families: AddressFamilies::Ipv4,
            ..TransportConfig::default()
        }
    }

    #[test]
    fn recv_buffer_is_clamped() {
        let config = TransportConfig {
            recv_buffer_size: 512,
            ..TransportConfig::default()
        };
        assert_eq!(config.recv_buffer_size(), MIN_RECV_BUFFER_SIZE);

        let config = TransportConfig {
            recv_buffer_size: 9000,
            ..TransportConfig::default()
        };
        assert_eq!(config.recv_buffer_size(), 9000);
    }

    #[test]
    fn send_report_totals() {
        let report = SendReport {
            v4: FamilyReport {
                attempted: 2,
                sent: 1,
            },
            v6: FamilyReport {
                attempted: 3,
                sent: 3,
            },
        };
        assert_eq!(report.attempted(), 5);
        assert_eq!(report.sent(), 4);
        assert_eq!(report.family(Family::V6).sent, 3);
    }

    #[tokio::test]
    async fn only_requested_family_is_opened() {
        let transport = MulticastTransport::bind_with(v4_only(), &no_interfaces()).unwrap();
        assert_eq!(transport.active_families(), vec![Family::V4]);
        assert!(transport.local_addr(Family::V6).is_none());
        assert!(transport.membership(Family::V6).is_empty());
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn ipv6_group_address_transport_opens() {
        let config = TransportConfig {
            families: AddressFamilies::Ipv6,
            bind: BindStrategy::GroupAddress,
            ..TransportConfig::default()
        };
        let transport = MulticastTransport::bind_with(config, &no_interfaces()).unwrap();
        assert_eq!(transport.active_families(), vec![Family::V6]);
        assert_eq!(
            transport.local_addr(Family::V6).map(|addr| addr.port()),
            Some(linkdns_types::MDNS_PORT)
        );
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn incapable_interface_is_never_joined() {
        let mut v6_only_iface = InterfaceDescriptor::new("fake6", 4000);
        v6_only_iface.flags = InterfaceFlags {
            up: true,
            multicast: true,
            loopback: false,
        };
        v6_only_iface.ipv6.push("fe80::1234".parse().unwrap());

        let config = TransportConfig {
            interfaces: vec![v6_only_iface],
            ..v4_only()
        };
        let transport = MulticastTransport::bind_with(config, &no_interfaces()).unwrap();

        let members = transport.membership(Family::V4);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].membership, Membership::Incapable);
        assert_eq!(
            transport.capability(4000),
            Some(Capability {
                ipv4: false,
                ipv6: true
            })
        );
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_join_is_not_fatal() {
        let mut bogus = InterfaceDescriptor::new("bogus0", 4001);
        bogus.ipv4.push(Ipv4Addr::new(203, 0, 113, 77));

        let config = TransportConfig {
            interfaces: vec![bogus],
            ..v4_only()
        };
        let transport = MulticastTransport::bind_with(config, &no_interfaces()).unwrap();
        assert_eq!(
            transport.membership(Family::V4)[0].membership,
            Membership::JoinFailed
        );
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn multicast_with_no_targets_fails() {
        let transport = MulticastTransport::bind_with(v4_only(), &no_interfaces()).unwrap();
        let err = transport.multicast(b"payload").await.unwrap_err();
        assert!(matches!(err, ProtocolError::NothingSent { attempted: 0 }));
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent_and_stops_sends() {
        let transport = MulticastTransport::bind_with(v4_only(), &no_interfaces()).unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        assert!(transport.active_families().is_empty());
        let err = transport
            .unicast(b"x", "127.0.0.1:5353".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Closed));
        assert!(matches!(
            transport.multicast(b"x").await.unwrap_err(),
            ProtocolError::Closed
        ));
    }

    #[tokio::test]
    async fn unicast_to_missing_family_fails() {
        let transport = MulticastTransport::bind_with(v4_only(), &no_interfaces()).unwrap();
        let err = transport
            .unicast(b"x", "[::1]:5353".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::FamilyUnavailable(Family::V6)));
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn inbound_queue_is_taken_once() {
        let transport = MulticastTransport::bind_with(v4_only(), &no_interfaces()).unwrap();
        assert!(transport.take_inbound().is_some());
        assert!(transport.take_inbound().is_none());
        transport.close().await.unwrap();
    }
}
