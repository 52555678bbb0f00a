use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Well-known server port.
pub const DEFAULT_PORT: u16 = 3107;

/// Resolve a host name (or literal address) to socket addresses.
///
/// Resolution failure is distinct from connect failure; the client state
/// machine transitions through them separately.
pub fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| TransportError::Resolve {
            host: host.to_string(),
            source: e,
        })?
        .collect();

    if addrs.is_empty() {
        return Err(TransportError::NoAddresses {
            host: host.to_string(),
        });
    }

    debug!(host, count = addrs.len(), "resolved peer address");
    Ok(addrs)
}

/// Connect to the first address that accepts, trying each in order.
pub fn connect_any(addrs: &[SocketAddr]) -> Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                info!(%addr, "connected");
                return Ok(stream);
            }
            Err(e) => {
                debug!(%addr, error = %e, "connect attempt failed");
                last_err = Some(TransportError::Connect {
                    addr: *addr,
                    source: e,
                });
            }
        }
    }
    // `addrs` is non-empty per `resolve`, so an error was recorded.
    Err(last_err.unwrap_or_else(|| TransportError::Io(std::io::Error::other("no addresses"))))
}

/// TCP/IPv4 listening socket.
///
/// The listener is non-blocking so the owning accept loop can interleave
/// shutdown checks; std offers no portable way to unblock a blocking
/// `accept`.
pub struct TcpAcceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpAcceptor {
    /// Bind and listen on the given port on all IPv4 interfaces.
    pub fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .map_err(|e| TransportError::Bind { port, source: e })?;
        listener
            .set_nonblocking(true)
            .map_err(|e| TransportError::Bind { port, source: e })?;
        let local_addr = listener.local_addr().map_err(TransportError::Io)?;

        info!(%local_addr, "listening");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept a pending connection, if any.
    ///
    /// Returns `Ok(None)` when no connection is waiting. Accepted streams
    /// are switched back to blocking mode before being handed out.
    pub fn poll_accept(&self) -> Result<Option<TcpStream>> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(false).map_err(TransportError::Io)?;
                debug!(%peer, "accepted connection");
                Ok(Some(stream))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(TransportError::Accept(e)),
        }
    }

    /// The address this acceptor is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    #[test]
    fn bind_poll_accept_connect() {
        let acceptor = TcpAcceptor::bind(0).unwrap();
        let port = acceptor.local_addr().port();

        let handle = std::thread::spawn(move || {
            let addrs = resolve("127.0.0.1", port).unwrap();
            let mut client = connect_any(&addrs).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut accepted = None;
        for _ in 0..500 {
            if let Some(stream) = acceptor.poll_accept().unwrap() {
                accepted = Some(stream);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        let mut server = accepted.expect("connection should arrive");

        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn poll_accept_empty_returns_none() {
        let acceptor = TcpAcceptor::bind(0).unwrap();
        assert!(acceptor.poll_accept().unwrap().is_none());
    }

    #[test]
    fn resolve_rejects_unknown_host() {
        let result = resolve("host.invalid.wirelink.test", DEFAULT_PORT);
        assert!(result.is_err());
    }

    #[test]
    fn connect_any_reports_refused() {
        // Bind then drop to get a port that refuses connections.
        let port = {
            let acceptor = TcpAcceptor::bind(0).unwrap();
            acceptor.local_addr().port()
        };
        let addrs = resolve("127.0.0.1", port).unwrap();
        let result = connect_any(&addrs);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
