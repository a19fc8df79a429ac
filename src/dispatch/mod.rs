//! Address-keyed delivery of inbound OSC messages, plus the outbound send path.
//!
//! A [`Dispatcher`] owns one transport. Once started, a background thread reads packets from it,
//! decodes them and hands each message to the registered handlers. Sends and handler
//! registration can happen from any thread at the same time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use log::{debug, error, info, warn};

use crate::config::DispatcherConfig;
use crate::error::{DispatchError, TransportError};
use crate::osc::{Message, decode_packet, encode_bundle, encode_message};
use crate::traits::PacketIO;

mod registry;

pub use registry::{Handler, HandlerRegistry};

/// Lifecycle of a dispatcher. `Stopped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    /// A `stop()` is in progress: the receive thread has been signalled but not yet joined.
    Stopping,
    Stopped,
}

/// Counters kept by the receive thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub packets_received: u64,
    pub messages_dispatched: u64,
    pub malformed_packets: u64,
    pub receive_errors: u64,
}

#[derive(Default)]
struct Counters {
    packets_received: AtomicU64,
    messages_dispatched: AtomicU64,
    malformed_packets: AtomicU64,
    receive_errors: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            malformed_packets: self.malformed_packets.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }
}

struct Worker {
    // Never sent on; dropping it is the stop signal.
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn thread_id(&self) -> ThreadId {
        self.handle.thread().id()
    }

    fn shutdown(self, timeout: Duration) {
        let Worker {
            stop_tx,
            done_rx,
            handle,
        } = self;
        drop(stop_tx);

        if handle.thread().id() == thread::current().id() {
            // stop() called from inside a handler: the loop exits once the handler returns.
            warn!("dispatcher stopped from its own receive thread; not joining");
            return;
        }

        if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout) {
            warn!(
                "receive thread still running {:?} after stop, waiting for it",
                timeout
            );
        }
        if handle.join().is_err() {
            error!("receive thread panicked");
        }
    }
}

enum Lifecycle {
    Idle,
    Running(Worker),
    Stopping { receive_thread: Option<ThreadId> },
    Stopped,
}

/// The background half: reads, decodes, dispatches.
struct ReceiveLoop<T: PacketIO> {
    transport: Arc<T>,
    handlers: HandlerRegistry,
    counters: Arc<Counters>,
    stop_rx: Receiver<()>,
    buffer_size: usize,
    poll_interval: Duration,
}

impl<T: PacketIO> ReceiveLoop<T> {
    fn run(self) {
        let mut buf = vec![0u8; self.buffer_size];
        while !self.stop_requested() {
            match self.transport.receive_packet(&mut buf) {
                Ok(0) => self.backoff(),
                Ok(len) => self.handle_packet(&buf[..len]),
                Err(TransportError::Closed) => {
                    info!("transport closed, receive loop exiting");
                    break;
                }
                Err(err) => {
                    self.counters.receive_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("receive failed: {}", err);
                    self.backoff();
                }
            }
        }
        debug!("receive loop finished");
    }

    fn stop_requested(&self) -> bool {
        !matches!(self.stop_rx.try_recv(), Err(TryRecvError::Empty))
    }

    /// Sleeps for the poll interval, waking early if stop is requested.
    fn backoff(&self) {
        let _ = self.stop_rx.recv_timeout(self.poll_interval);
    }

    fn handle_packet(&self, packet: &[u8]) {
        self.counters.packets_received.fetch_add(1, Ordering::Relaxed);
        match decode_packet(packet) {
            Ok(messages) => {
                debug!(
                    "dispatching {} message(s) from a {} byte packet",
                    messages.len(),
                    packet.len()
                );
                for msg in &messages {
                    // A handler may have stopped the dispatcher mid-bundle.
                    if self.stop_requested() {
                        debug!("stop requested, dropping rest of packet");
                        break;
                    }
                    self.handlers.dispatch(msg);
                    self.counters
                        .messages_dispatched
                        .fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(err) => {
                self.counters
                    .malformed_packets
                    .fetch_add(1, Ordering::Relaxed);
                warn!("dropping malformed {} byte packet: {}", packet.len(), err);
            }
        }
    }
}

/// Routes inbound OSC messages to handlers by exact address and sends outbound ones.
///
/// Starts `Idle`. [`start`](Self::start) opens the transport and spawns the receive thread;
/// [`stop`](Self::stop) (or dropping the dispatcher) joins that thread and closes the transport.
/// A stopped dispatcher cannot be restarted.
pub struct Dispatcher<T: PacketIO + 'static> {
    transport: Arc<T>,
    handlers: HandlerRegistry,
    config: DispatcherConfig,
    counters: Arc<Counters>,
    lifecycle: Mutex<Lifecycle>,
    stopped: Condvar,
}

impl<T: PacketIO + 'static> Dispatcher<T> {
    pub fn new(transport: T, config: DispatcherConfig) -> Self {
        Dispatcher {
            transport: Arc::new(transport),
            handlers: HandlerRegistry::new(),
            config,
            counters: Arc::new(Counters::default()),
            lifecycle: Mutex::new(Lifecycle::Idle),
            stopped: Condvar::new(),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> State {
        match *self.lifecycle() {
            Lifecycle::Idle => State::Idle,
            Lifecycle::Running(_) => State::Running,
            Lifecycle::Stopping { .. } => State::Stopping,
            Lifecycle::Stopped => State::Stopped,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// The handler table. Clones share it, so it can be handed to other threads.
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Registers `handler` for exactly `address`. A previous handler for the same address is
    /// replaced (with a warning); returns true when that happened.
    pub fn register_handler<F>(&self, address: &str, handler: F) -> bool
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.handlers.register(address, handler)
    }

    /// Registers `handler` for exactly `address`, failing with
    /// [`DispatchError::DuplicateHandlerAddress`] if one is already there.
    pub fn try_register_handler<F>(&self, address: &str, handler: F) -> Result<(), DispatchError>
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.handlers.try_register(address, handler)
    }

    pub fn unregister_handler(&self, address: &str) -> bool {
        self.handlers.unregister(address)
    }

    /// Sets the handler that sees every inbound message, before any address handler.
    pub fn register_catch_all<F>(&self, handler: F)
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.handlers.set_catch_all(handler)
    }

    pub fn clear_catch_all(&self) {
        self.handlers.clear_catch_all()
    }

    /// Opens the transport if needed and spawns the receive thread.
    pub fn start(&self) -> Result<(), DispatchError> {
        let mut lifecycle = self.lifecycle();
        match *lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running(_) => return Err(DispatchError::AlreadyRunning),
            Lifecycle::Stopping { .. } | Lifecycle::Stopped => {
                return Err(DispatchError::Stopped);
            }
        }

        let opened_here = !self.transport.is_open();
        if opened_here {
            self.transport.open()?;
        }

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded::<()>(1);
        let receiver = ReceiveLoop {
            transport: self.transport.clone(),
            handlers: self.handlers.clone(),
            counters: self.counters.clone(),
            stop_rx,
            buffer_size: self.config.receive_buffer_size,
            poll_interval: self.config.poll_interval,
        };

        let handle = thread::Builder::new()
            .name("osc-receive".to_string())
            .spawn(move || {
                receiver.run();
                let _ = done_tx.send(());
            })
            .map_err(|err| {
                if opened_here {
                    self.transport.close();
                }
                DispatchError::Spawn(err)
            })?;

        *lifecycle = Lifecycle::Running(Worker {
            stop_tx,
            done_rx,
            handle,
        });
        info!("dispatcher started");
        Ok(())
    }

    /// Stops the receive thread and closes the transport.
    ///
    /// Once this returns no handler is running or will run, unless it was called from a handler
    /// on the receive thread itself; then the loop ends as soon as that handler returns. A call
    /// racing another `stop()` waits for that one to finish. Calling it again is a no-op.
    pub fn stop(&self) {
        let worker = {
            let mut lifecycle = self.lifecycle();
            loop {
                let in_progress = match &*lifecycle {
                    Lifecycle::Stopped => return,
                    Lifecycle::Stopping { receive_thread } => *receive_thread,
                    Lifecycle::Idle | Lifecycle::Running(_) => break,
                };
                // The other stopper is joining this very thread; waiting would deadlock.
                if in_progress == Some(thread::current().id()) {
                    return;
                }
                lifecycle = self
                    .stopped
                    .wait(lifecycle)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            let receive_thread = match &*lifecycle {
                Lifecycle::Running(worker) => Some(worker.thread_id()),
                _ => None,
            };
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopping { receive_thread }) {
                Lifecycle::Running(worker) => Some(worker),
                _ => None,
            }
        };

        // The lock is released here so handlers can still query or stop the dispatcher.
        if let Some(worker) = worker {
            worker.shutdown(self.config.stop_timeout);
        }
        if self.transport.is_open() {
            self.transport.close();
        }

        *self.lifecycle() = Lifecycle::Stopped;
        self.stopped.notify_all();
        info!("dispatcher stopped");
    }

    /// Encodes and sends one message.
    pub fn send(&self, msg: &Message) -> Result<(), DispatchError> {
        let mut buf = vec![0u8; self.config.send_buffer_size];
        let len = encode_message(msg, &mut buf)?;
        self.write(&buf, len)
    }

    /// Sends several messages as one packet: a bundle, or a bare message if there is only one.
    /// An empty batch sends nothing.
    pub fn send_batch(&self, messages: &[Message]) -> Result<(), DispatchError> {
        if messages.is_empty() {
            return Ok(());
        }
        let mut buf = vec![0u8; self.config.send_buffer_size];
        let len = encode_bundle(messages, &mut buf)?;
        self.write(&buf, len)
    }

    fn write(&self, buf: &[u8], len: usize) -> Result<(), DispatchError> {
        if !self.transport.is_open() {
            return Err(TransportError::NotOpen.into());
        }
        let packet = if self.config.pad_to_buffer {
            buf
        } else {
            &buf[..len]
        };
        self.transport.send_packet(packet)?;
        debug!("sent {} byte packet ({} encoded)", packet.len(), len);
        Ok(())
    }
}

impl<T: PacketIO + 'static> Drop for Dispatcher<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
