use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use wirelink_frame::{Message, MessageReader};
use wirelink_transport::{Result as TransportResult, TcpAcceptor, DEFAULT_PORT};

use crate::error::Result;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Delivery callback, invoked synchronously on the session's thread.
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// Inbound endpoint: acceptor plus at most one active session.
///
/// Each accepted connection starts a fresh session and displaces the
/// previous one; only the newest connection is served. A session owns a
/// strong reference to the shared state and carries a generation token, so
/// a displaced session that wakes up late recognizes it is retired and
/// exits without side effects.
pub struct Server {
    shared: Arc<ServerShared>,
    acceptor_thread: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

struct ServerShared {
    running: AtomicBool,
    /// Generation of the currently active session.
    generation: AtomicU64,
    active: Mutex<Option<ActiveSession>>,
}

struct ActiveSession {
    generation: u64,
    /// Clone of the session socket, used only to force its read loop awake.
    socket: TcpStream,
    thread: JoinHandle<()>,
}

impl Server {
    /// Bind the well-known port and start accepting.
    pub fn start(handler: impl Fn(Message) + Send + Sync + 'static) -> Result<Self> {
        Self::start_on(DEFAULT_PORT, handler)
    }

    /// Bind an explicit port and start accepting.
    pub fn start_on(port: u16, handler: impl Fn(Message) + Send + Sync + 'static) -> Result<Self> {
        let acceptor = TcpAcceptor::bind(port)?;
        let local_addr = acceptor.local_addr();
        let handler: MessageHandler = Arc::new(handler);

        let shared = Arc::new(ServerShared {
            running: AtomicBool::new(true),
            generation: AtomicU64::new(0),
            active: Mutex::new(None),
        });

        let acceptor_thread = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || accept_loop(acceptor, shared, handler))
        };

        Ok(Self {
            shared,
            acceptor_thread: Some(acceptor_thread),
            local_addr,
        })
    }

    /// The address the acceptor is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.acceptor_thread.take() {
            let _ = thread.join();
        }
        if let Some(active) = self.shared.active.lock().unwrap().take() {
            let _ = active.socket.shutdown(Shutdown::Both);
            let _ = active.thread.join();
        }
    }
}

fn accept_loop(acceptor: TcpAcceptor, shared: Arc<ServerShared>, handler: MessageHandler) {
    info!("server started");

    while shared.running.load(Ordering::SeqCst) {
        match acceptor.poll_accept() {
            Ok(Some(stream)) => {
                if let Err(err) = install_session(&shared, &handler, stream) {
                    error!(error = %err, "session setup failed");
                }
            }
            Ok(None) => std::thread::sleep(ACCEPT_POLL_INTERVAL),
            Err(err) => {
                error!(error = %err, "accept failed");
                break;
            }
        }
    }

    info!("server finished");
}

fn install_session(
    shared: &Arc<ServerShared>,
    handler: &MessageHandler,
    stream: TcpStream,
) -> TransportResult<()> {
    let shutdown_handle = stream.try_clone()?;
    // Bump the active generation first: from here on the previous session
    // is retired even if it is mid-read.
    let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

    let session = Session {
        generation,
        shared: Arc::clone(shared),
        handler: Arc::clone(handler),
    };
    let thread = std::thread::Builder::new()
        .name(format!("wirelink-session-{generation}"))
        .spawn(move || session.run(stream))?;

    let previous = shared.active.lock().unwrap().replace(ActiveSession {
        generation,
        socket: shutdown_handle,
        thread,
    });

    if let Some(previous) = previous {
        debug!(generation = previous.generation, "displacing session");
        let _ = previous.socket.shutdown(Shutdown::Both);
        let _ = previous.thread.join();
    }

    Ok(())
}

/// One accepted connection: header → body → validate → dispatch, looping
/// until a read error ends it.
struct Session {
    generation: u64,
    shared: Arc<ServerShared>,
    handler: MessageHandler,
}

impl Session {
    fn run(self, stream: TcpStream) {
        info!(generation = self.generation, "session started");
        let mut reader = MessageReader::new(stream);

        loop {
            let header = match reader.read_header() {
                Ok(header) => header,
                Err(err) => return self.end(err),
            };
            let msg = match reader.read_body(header) {
                Ok(msg) => msg,
                Err(err) => return self.end(err),
            };

            if self.retired() {
                debug!(
                    generation = self.generation,
                    sequence = msg.sequence,
                    "retired session; dropping message"
                );
                return;
            }

            if !msg.valid {
                warn!(sequence = msg.sequence, "payload checksum mismatch");
            }
            (self.handler)(msg);
        }
    }

    fn retired(&self) -> bool {
        self.shared.generation.load(Ordering::SeqCst) != self.generation
    }

    fn end(&self, err: wirelink_frame::WireError) {
        if self.retired() || !self.shared.running.load(Ordering::SeqCst) {
            debug!(generation = self.generation, "session closed: {err}");
        } else {
            error!(generation = self.generation, error = %err, "session read failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Instant;

    use wirelink_frame::MessageWriter;

    use super::*;

    fn sealed(sequence: u32, payload: Vec<u16>) -> Message {
        let mut msg = Message::new(sequence, 1_700_000_000, payload);
        msg.seal();
        msg
    }

    fn collecting_server() -> (Server, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel();
        let server = Server::start_on(0, move |msg| {
            let _ = tx.send(msg);
        })
        .unwrap();
        (server, rx)
    }

    fn connect(server: &Server) -> TcpStream {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match TcpStream::connect(server.local_addr()) {
                Ok(stream) => return stream,
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(10))
                }
                Err(err) => panic!("connect failed: {err}"),
            }
        }
    }

    #[test]
    fn delivers_messages_in_order() {
        let (server, rx) = collecting_server();
        let mut writer = MessageWriter::new(connect(&server));

        for i in 1..=5u32 {
            writer.write_message(&sealed(i, vec![i as u16; 3])).unwrap();
        }

        for expected in 1..=5u32 {
            let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(msg.sequence, expected);
            assert_eq!(msg.payload, vec![expected as u16; 3]);
            assert!(msg.valid);
        }
    }

    #[test]
    fn corrupted_message_is_delivered_invalid() {
        let (server, rx) = collecting_server();
        let mut msg = sealed(7, vec![1, 2, 3]);
        // Corrupt after sealing: digest no longer matches.
        msg.payload[0] ^= 0x0100;

        let mut writer = MessageWriter::new(connect(&server));
        writer.write_message(&msg).unwrap();

        let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(got.sequence, 7);
        assert!(!got.valid);
    }

    #[test]
    fn empty_payload_is_dispatched() {
        let (server, rx) = collecting_server();
        let mut writer = MessageWriter::new(connect(&server));
        writer.write_message(&sealed(1, Vec::new())).unwrap();

        let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(got.payload.is_empty());
        assert!(got.valid);
    }

    #[test]
    fn session_survives_across_messages_on_one_connection() {
        let (server, rx) = collecting_server();
        let mut writer = MessageWriter::new(connect(&server));

        writer.write_message(&sealed(1, vec![1])).unwrap();
        let _ = rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // Same connection, later message: same session keeps reading.
        std::thread::sleep(Duration::from_millis(50));
        writer.write_message(&sealed(2, vec![2])).unwrap();
        let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(got.sequence, 2);
    }

    #[test]
    fn new_connection_displaces_previous_session() {
        let (server, rx) = collecting_server();

        let mut first = MessageWriter::new(connect(&server));
        first.write_message(&sealed(1, vec![1])).unwrap();
        let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(got.sequence, 1);

        // Second connection takes over; the first socket gets shut down.
        let mut second = MessageWriter::new(connect(&server));

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut delivered = None;
        while Instant::now() < deadline {
            second.write_message(&sealed(100, vec![9])).unwrap();
            match rx.recv_timeout(Duration::from_millis(200)) {
                Ok(msg) => {
                    delivered = Some(msg);
                    break;
                }
                Err(_) => continue,
            }
        }
        let delivered = delivered.expect("newest connection should be served");
        assert_eq!(delivered.sequence, 100);

        // The displaced writer errors out sooner or later.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if first.write_message(&sealed(2, vec![0u16; 2048])).is_err() {
                break;
            }
            assert!(Instant::now() < deadline, "first connection never failed");
        }
    }

    #[test]
    fn drop_stops_acceptor_and_session() {
        use std::io::Read;

        let (server, _rx) = collecting_server();
        let mut stream = connect(&server);
        std::thread::sleep(Duration::from_millis(100));

        // Joins the acceptor and the active session without hanging.
        drop(server);

        // The session socket was shut down: the client sees EOF (or reset).
        let mut buf = [0u8; 1];
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => {}
            Ok(n) => panic!("unexpected {n} bytes from closed server"),
        }
    }
}
