//! Socket construction and multicast options for mDNS.
//!
//! Sockets are built with `socket2` so reuse options can be set before
//! binding, then handed to tokio. Group membership and outgoing-interface
//! selection are per interface.

use std::io;
use std::net::SocketAddr;

use linkdns_types::{
    BindStrategy, Family, InterfaceDescriptor, MDNS_IPV4_GROUP, MDNS_IPV6_GROUP,
    MULTICAST_HOP_LIMIT,
};
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::net::UdpSocket;
use tracing::debug;

/// Open a UDP socket of `family` bound per `bind`, with multicast TTL/hop
/// limit 255 and loopback enabled.
///
/// Must be called from within a tokio runtime.
pub(crate) fn open(family: Family, bind: BindStrategy) -> io::Result<UdpSocket> {
    let addr = bind.bind_addr(family);
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;

    if family == Family::V6 {
        socket.set_only_v6(true)?;
    }
    if bind.shares_port() {
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
        socket.set_reuse_port(true)?;
    }
    socket.set_nonblocking(true)?;
    bind_socket(&socket, addr)?;

    let (hops, looped) = match family {
        Family::V4 => (
            socket.set_multicast_ttl_v4(MULTICAST_HOP_LIMIT),
            socket.set_multicast_loop_v4(true),
        ),
        Family::V6 => (
            socket.set_multicast_hops_v6(MULTICAST_HOP_LIMIT),
            socket.set_multicast_loop_v6(true),
        ),
    };
    if let Err(e) = hops {
        debug!(%family, error = %e, "failed to set multicast hop limit; continuing");
    }
    if let Err(e) = looped {
        debug!(%family, error = %e, "failed to enable multicast loopback; continuing");
    }

    UdpSocket::from_std(socket.into())
}

/// On unixes, binding to the IPv4 group address filters out unrelated
/// traffic. `ff02::fb` is link-local scoped and cannot be bound without a
/// scope id, so IPv6 binds the wildcard on the same port.
#[cfg(not(windows))]
fn bind_socket(socket: &Socket, addr: SocketAddr) -> io::Result<()> {
    let addr = match addr {
        SocketAddr::V6(v6) if v6.ip().is_multicast() => {
            SocketAddr::new(Family::V6.unspecified(), v6.port())
        }
        _ => addr,
    };
    socket.bind(&addr.into())
}

/// Windows refuses to bind a multicast address; bind the wildcard on the
/// same port instead.
#[cfg(windows)]
fn bind_socket(socket: &Socket, addr: SocketAddr) -> io::Result<()> {
    let addr = if addr.ip().is_multicast() {
        SocketAddr::new(Family::of(&addr.ip()).unspecified(), addr.port())
    } else {
        addr
    };
    socket.bind(&addr.into())
}

/// Join the mDNS group of `family` on `iface`.
pub(crate) fn join(socket: &UdpSocket, family: Family, iface: &InterfaceDescriptor) -> io::Result<()> {
    match family {
        Family::V4 => socket.join_multicast_v4(MDNS_IPV4_GROUP, ipv4_of(iface)?),
        Family::V6 => socket.join_multicast_v6(&MDNS_IPV6_GROUP, iface.index),
    }
}

/// Make `iface` the outgoing interface for multicast on `socket`.
///
/// This is socket-wide state; callers serialise it with the write that
/// depends on it.
pub(crate) fn select_interface(
    socket: &UdpSocket,
    family: Family,
    iface: &InterfaceDescriptor,
) -> io::Result<()> {
    let sock = SockRef::from(socket);
    match family {
        Family::V4 => sock.set_multicast_if_v4(&ipv4_of(iface)?),
        Family::V6 => sock.set_multicast_if_v6(iface.index),
    }
}

fn ipv4_of(iface: &InterfaceDescriptor) -> io::Result<std::net::Ipv4Addr> {
    iface.primary_ipv4().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("interface {} has no IPv4 address", iface.name),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkdns_types::MDNS_PORT;

    #[tokio::test]
    async fn zero_address_binds_ephemeral_port() {
        let socket = open(Family::V4, BindStrategy::ZeroAddress).unwrap();
        let local = socket.local_addr().unwrap();
        assert!(local.ip().is_unspecified());
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn multicast_options_are_applied() {
        let socket = open(Family::V4, BindStrategy::ZeroAddress).unwrap();
        assert_eq!(socket.multicast_ttl_v4().unwrap(), MULTICAST_HOP_LIMIT);
        assert!(socket.multicast_loop_v4().unwrap());
    }

    #[tokio::test]
    async fn group_address_binds_for_both_families() {
        let v4 = open(Family::V4, BindStrategy::GroupAddress).unwrap();
        assert_eq!(v4.local_addr().unwrap().port(), MDNS_PORT);

        let v6 = open(Family::V6, BindStrategy::GroupAddress).unwrap();
        let local = v6.local_addr().unwrap();
        assert!(local.is_ipv6());
        assert!(local.ip().is_unspecified());
        assert_eq!(local.port(), MDNS_PORT);
    }

    #[tokio::test]
    async fn join_without_ipv4_address_fails() {
        let socket = open(Family::V4, BindStrategy::ZeroAddress).unwrap();
        let bare = InterfaceDescriptor::new("bare0", 4242);
        let err = join(&socket, Family::V4, &bare).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrNotAvailable);
    }
}
