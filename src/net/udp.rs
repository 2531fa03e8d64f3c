//! Non-blocking UDP datagram transmitter

use log::{debug, error, info};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{DatagramTransmitter, SendOutcome};

/// Fire-and-forget UDP sender bound to one remote endpoint.
///
/// The socket is non-blocking: a full send buffer surfaces as a transient
/// rejection, never as a stalled pipeline thread. Cumulative byte/packet
/// counters are monotonic for the lifetime of the transmitter and feed the
/// stats snapshot directly.
pub struct UdpTransmitter {
    socket: UdpSocket,
    remote: SocketAddr,
    bytes: AtomicU64,
    packets: AtomicU64,
    rejects: AtomicU64,
}

impl UdpTransmitter {
    /// Bind an ephemeral local port and aim at `remote`.
    pub fn connect(remote: SocketAddr) -> anyhow::Result<Self> {
        let bind_addr: SocketAddr = if remote.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(remote)?;
        socket.set_nonblocking(true)?;

        info!("udp transmitter: {} -> {}", socket.local_addr()?, remote);

        Ok(Self {
            socket,
            remote,
            bytes: AtomicU64::new(0),
            packets: AtomicU64::new(0),
            rejects: AtomicU64::new(0),
        })
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Transient rejections seen so far (full send buffer or similar).
    pub fn rejected_sends(&self) -> u64 {
        self.rejects.load(Ordering::Relaxed)
    }
}

impl DatagramTransmitter for UdpTransmitter {
    fn send(&self, payload: &[u8]) -> SendOutcome {
        match self.socket.send(payload) {
            Ok(sent) => {
                self.bytes.fetch_add(sent as u64, Ordering::Relaxed);
                self.packets.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Sent
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                self.rejects.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Rejected
            }
            Err(e) => {
                // Anything else (unreachable peer, interface down) is still
                // transient for a lossy sender; keep it at debug once counted.
                let rejects = self.rejects.fetch_add(1, Ordering::Relaxed) + 1;
                if rejects == 1 || rejects % 500 == 0 {
                    error!("udp send to {} failed ({} rejects): {}", self.remote, rejects, e);
                } else {
                    debug!("udp send to {} failed: {}", self.remote, e);
                }
                SendOutcome::Rejected
            }
        }
    }

    fn bytes_sent(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    fn packets_sent(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }
}
