use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use crate::tracking::config::PayloadFormat;

/// Fire-and-forget sink for encoded payloads.
///
/// The transport variant is chosen once at startup together with the
/// encoder mode and held for the process lifetime: the binary encoder rides
/// the broadcast transport for its low-overhead companion, JSON goes to the
/// local consumer over a plain datagram socket. No acknowledgement, no
/// retry, no ordering guarantee: a stale pose is worse than a dropped one.
pub(crate) enum Broadcaster {
    Native { socket: UdpSocket, target: SocketAddrV4 },
    Datagram { socket: UdpSocket, target: SocketAddrV4 },
}

impl Broadcaster {
    pub(crate) fn bind(format: PayloadFormat, port: u16) -> io::Result<Self> {
        match format {
            PayloadFormat::Binary => Self::bind_native(port),
            PayloadFormat::Json => Self::bind_datagram(port),
        }
    }

    pub(crate) fn bind_native(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_broadcast(true)?;
        Ok(Self::Native {
            socket,
            target: SocketAddrV4::new(Ipv4Addr::BROADCAST, port),
        })
    }

    pub(crate) fn bind_datagram(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        Ok(Self::Datagram {
            socket,
            target: SocketAddrV4::new(Ipv4Addr::LOCALHOST, port),
        })
    }

    pub(crate) fn send(&self, payload: &[u8]) -> io::Result<usize> {
        match self {
            Self::Native { socket, target } | Self::Datagram { socket, target } => {
                socket.send_to(payload, *target)
            }
        }
    }

    pub(crate) fn target(&self) -> SocketAddrV4 {
        match self {
            Self::Native { target, .. } | Self::Datagram { target, .. } => *target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datagram_reaches_a_local_listener() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = receiver.local_addr().unwrap().port();

        let sink = Broadcaster::bind_datagram(port).unwrap();
        assert_eq!(sink.target().port(), port);
        assert_eq!(sink.send(b"pose").unwrap(), 4);

        let mut buf = [0u8; 16];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"pose");
    }

    #[test]
    fn binary_format_selects_the_native_transport() {
        let sink = Broadcaster::bind(PayloadFormat::Binary, 8787).unwrap();
        assert!(matches!(sink, Broadcaster::Native { .. }));
        assert_eq!(*sink.target().ip(), Ipv4Addr::BROADCAST);
    }

    #[test]
    fn json_format_targets_loopback() {
        let sink = Broadcaster::bind(PayloadFormat::Json, 8787).unwrap();
        assert!(matches!(sink, Broadcaster::Datagram { .. }));
        assert_eq!(*sink.target().ip(), Ipv4Addr::LOCALHOST);
        assert_eq!(sink.target().port(), 8787);
    }
}
