use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info};
use wirelink_frame::{Message, MessageWriter};
use wirelink_transport::{connect_any, resolve, DEFAULT_PORT};

use crate::error::{PeerError, Result};

/// Client connection lifecycle.
///
/// `Resolving` and `Connecting` precede `Connected`; resolution or connect
/// failure skips straight to `Closed`. `Stopping` covers the drain between
/// keep-alive release and loop exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    Resolving = 0,
    Connecting = 1,
    Connected = 2,
    Stopping = 3,
    Closed = 4,
}

impl LinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LinkState::Resolving,
            1 => LinkState::Connecting,
            2 => LinkState::Connected,
            3 => LinkState::Stopping,
            _ => LinkState::Closed,
        }
    }
}

/// Outbound connection: ordered send queue plus a single worker thread.
///
/// The worker is the connection's event loop: it resolves, connects, then
/// drains the queue one message at a time, fully framing each before the
/// next. [`send`] is the only cross-thread handoff; the digest is computed
/// on the caller's thread before the message enters the queue.
///
/// [`send`]: Client::send
pub struct Client {
    shared: Arc<ClientShared>,
    /// Keep-alive marker: the only long-lived queue sender. Dropping it
    /// lets the worker exit once the queue is drained.
    keep_alive: Mutex<Option<Sender<Message>>>,
    worker: Option<JoinHandle<()>>,
}

struct ClientShared {
    state: AtomicU8,
    finished: AtomicBool,
    shutdown: AtomicBool,
    /// Clone of the connected socket, kept for force-close on drop.
    socket: Mutex<Option<TcpStream>>,
}

impl ClientShared {
    fn state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: LinkState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

impl Client {
    /// Start connecting to `host` on the well-known port.
    ///
    /// Returns immediately; the worker thread drives the state machine.
    pub fn connect(host: impl Into<String>) -> Self {
        Self::connect_to(host, DEFAULT_PORT)
    }

    /// Start connecting to `host` on an explicit port.
    pub fn connect_to(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let shared = Arc::new(ClientShared {
            state: AtomicU8::new(LinkState::Resolving as u8),
            finished: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            socket: Mutex::new(None),
        });

        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || run(shared, rx, host, port))
        };

        Self {
            shared,
            keep_alive: Mutex::new(Some(tx)),
            worker: Some(worker),
        }
    }

    /// Queue a message for transmission.
    ///
    /// Rejected with [`PeerError::NotConnected`] before the connected state
    /// is reached or after `stop`; nothing is queued in that case. On
    /// success the digest is computed here, on the caller's thread, and the
    /// message is handed to the worker.
    pub fn send(&self, mut msg: Message) -> Result<()> {
        if self.shared.state() != LinkState::Connected {
            return Err(PeerError::NotConnected);
        }
        msg.seal();

        let guard = self.keep_alive.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => tx.send(msg).map_err(|_| PeerError::NotConnected),
            None => Err(PeerError::NotConnected),
        }
    }

    /// Release the keep-alive marker.
    ///
    /// The worker flushes everything already queued, then transitions
    /// through `Stopping` to `Closed`.
    pub fn stop(&self) {
        drop(self.keep_alive.lock().unwrap().take());
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state() == LinkState::Connected
    }

    /// True only once the worker loop has fully exited.
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }
}

impl Drop for Client {
    /// Force-close: shut the socket down, release the keep-alive, and wait
    /// for the worker. Pending writes surface as errors to the loop before
    /// it exits.
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        drop(self.keep_alive.lock().unwrap().take());
        if let Some(socket) = self.shared.socket.lock().unwrap().take() {
            let _ = socket.shutdown(Shutdown::Both);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Worker body: the connection's single-threaded event loop.
fn run(shared: Arc<ClientShared>, rx: Receiver<Message>, host: String, port: u16) {
    run_loop(&shared, rx, &host, port);
    shared.set_state(LinkState::Closed);
    // Last store before the thread returns: observable `finished` implies
    // the loop has exited.
    shared.finished.store(true, Ordering::SeqCst);
}

fn run_loop(shared: &ClientShared, rx: Receiver<Message>, host: &str, port: u16) {
    info!(host, port, "connecting");
    let addrs = match resolve(host, port) {
        Ok(addrs) => addrs,
        Err(err) => {
            error!(host, error = %err, "address resolution failed");
            return;
        }
    };

    shared.set_state(LinkState::Connecting);
    let stream = match connect_any(&addrs) {
        Ok(stream) => stream,
        Err(err) => {
            error!(host, error = %err, "connect failed");
            return;
        }
    };

    match stream.try_clone() {
        Ok(clone) => *shared.socket.lock().unwrap() = Some(clone),
        Err(err) => debug!(error = %err, "socket clone failed; force-close unavailable"),
    }

    let mut writer = MessageWriter::new(stream);
    shared.set_state(LinkState::Connected);

    // One write in flight at a time; the iterator ends once the keep-alive
    // sender is gone and the queue is drained.
    for msg in rx.iter() {
        if shared.shutdown.load(Ordering::SeqCst) {
            debug!("shutdown requested; abandoning queued messages");
            return;
        }
        if let Err(err) = writer.write_message(&msg) {
            error!(sequence = msg.sequence, error = %err, "send failed");
            return;
        }
    }

    shared.set_state(LinkState::Stopping);
    debug!("outbound queue drained; stopping");
}
