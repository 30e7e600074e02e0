//! mio event loop implementation.
//!
//! Readiness-based model: poll tells us when sockets are ready, then we
//! perform non-blocking accept/read/write syscalls. Uses epoll on Linux,
//! kqueue on macOS. Everything runs on one thread, one ready channel at a
//! time, so the single transfer buffer needs no synchronization.
//!
//! Readiness is edge-triggered: a ready listener is accepted until it would
//! block, and a ready connection is read until it would block, each read
//! being one message for the port's handler.

use super::buffer::{Fill, TransferBuffer};
use super::connection::{ConnectionRegistry, PortRole, ReadInterest};
use super::error::DispatchError;
use super::shutdown::ShutdownHandle;
use super::token::{self, TokenKind};
use super::listener;
use crate::config::Config;
use crate::protocols::control::{self, ControlAction};
use crate::protocols::echo;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Registry, Token};
use std::io::{self, Write};
use std::net::SocketAddr;
use tracing::{debug, info, trace};

/// A bound listening endpoint.
struct Listener {
    socket: TcpListener,
    role: PortRole,
    /// Actual bound address (the port is resolved when binding port 0).
    addr: SocketAddr,
}

impl Listener {
    fn bind(registry: &Registry, addr: SocketAddr, backlog: i32, role: PortRole) -> io::Result<Self> {
        let mut socket = TcpListener::from_std(listener::bind(addr, backlog)?);
        registry.register(&mut socket, token::listener(role), Interest::READABLE)?;
        let addr = socket.local_addr()?;
        Ok(Self { socket, role, addr })
    }
}

fn slot(role: PortRole) -> usize {
    match role {
        PortRole::Command => 0,
        PortRole::Echo => 1,
    }
}

/// Single-threaded reactor serving the command and echo ports.
pub struct Reactor {
    events: Events,
    dispatcher: Dispatcher,
    shutdown: ShutdownHandle,
}

/// Everything a readiness event may touch.
struct Dispatcher {
    poll: Poll,
    /// Indexed by [`slot`].
    listeners: [Listener; 2],
    connections: ConnectionRegistry,
    buffer: TransferBuffer,
}

/// What to do with a connection after one read.
enum Step {
    /// Read again.
    Continue,
    /// Nothing more to read this cycle.
    Drained,
    Close,
    Control(ControlAction),
}

impl Reactor {
    /// Create the poll and bind both listeners.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let poll = Poll::new()?;
        let shutdown = ShutdownHandle::new(poll.registry())?;

        let command = Listener::bind(
            poll.registry(),
            config.addr(config.command_port),
            config.backlog,
            PortRole::Command,
        )?;
        let echo = Listener::bind(
            poll.registry(),
            config.addr(config.echo_port),
            config.backlog,
            PortRole::Echo,
        )?;

        info!(
            bind = %config.bind,
            command_port = command.addr.port(),
            echo_port = echo.addr.port(),
            buffer_size = config.buffer_size,
            "Tcp data flow started"
        );

        Ok(Self {
            events: Events::with_capacity(config.events_capacity),
            dispatcher: Dispatcher {
                poll,
                listeners: [command, echo],
                connections: ConnectionRegistry::new(),
                buffer: TransferBuffer::new(config.buffer_size),
            },
            shutdown,
        })
    }

    /// Bound address of the listener for `role`.
    #[cfg(test)]
    pub fn local_addr(&self, role: PortRole) -> SocketAddr {
        self.dispatcher.listeners[slot(role)].addr
    }

    /// Handle that stops [`Reactor::run`] from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serve until shutdown is requested.
    ///
    /// Only a failure of the poll itself is returned; per-channel failures
    /// are reported and absorbed.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            if self.shutdown.is_requested() {
                info!(
                    connections = self.dispatcher.connections.len(),
                    "Shutting down"
                );
                return Ok(());
            }

            trace!("Wait new events");
            match self.dispatcher.poll.poll(&mut self.events, None) {
                Ok(()) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            for event in self.events.iter() {
                self.dispatcher.dispatch(event.token());
            }
        }
    }
}

impl Dispatcher {
    fn dispatch(&mut self, token: Token) {
        match token::classify(token) {
            TokenKind::Waker => trace!("Woken for shutdown"),
            TokenKind::Listener(role) => self.accept(role),
            TokenKind::Connection(conn_id) => self.service(conn_id),
        }
    }

    fn role_of(&self, local_port: u16) -> Option<PortRole> {
        self.listeners
            .iter()
            .find(|l| l.addr.port() == local_port)
            .map(|l| l.role)
    }

    fn accept(&mut self, role: PortRole) {
        let listener = &self.listeners[slot(role)];
        let port = listener.addr.port();

        loop {
            match listener.socket.accept() {
                Ok((stream, peer)) => {
                    match self
                        .connections
                        .insert(self.poll.registry(), stream, port, peer)
                    {
                        Ok(conn_id) => {
                            info!(conn_id, port, peer = %peer, "New connection accepted")
                        }
                        Err(source) => DispatchError::Register { port, source }.report(None),
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    DispatchError::Accept { port, source }.report(None);
                    break;
                }
            }
        }
    }

    fn service(&mut self, conn_id: usize) {
        let Some(conn) = self.connections.get(conn_id) else {
            trace!(conn_id, "Event for closed connection");
            return;
        };
        // Disabled earlier in this cycle; the event was already collected.
        if conn.interest() == ReadInterest::Disabled {
            trace!(conn_id, "Reads disabled, event skipped");
            return;
        }
        let port = conn.local_port();
        let Some(role) = self.role_of(port) else {
            return;
        };

        loop {
            let Some(conn) = self.connections.get_mut(conn_id) else {
                return;
            };

            let step = match self.buffer.fill(conn.stream_mut()) {
                Ok(Fill::Message(mut message)) => {
                    debug!(conn_id, port, bytes = message.len(), "Handle READ event");
                    match role {
                        PortRole::Echo => {
                            if let Err(source) = echo::handle(&mut message, conn.stream_mut()) {
                                DispatchError::Write { port, source }.report(Some(conn_id));
                            }
                            Step::Continue
                        }
                        PortRole::Command => Step::Control(control::handle(&message)),
                    }
                }
                Ok(Fill::Eof) => Step::Close,
                Err(e) => match e.kind() {
                    io::ErrorKind::WouldBlock => Step::Drained,
                    io::ErrorKind::Interrupted => Step::Continue,
                    io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                        DispatchError::Read { port, source: e }.report(Some(conn_id));
                        Step::Close
                    }
                    _ => {
                        DispatchError::Read { port, source: e }.report(Some(conn_id));
                        Step::Drained
                    }
                },
            };

            match step {
                Step::Continue => {}
                Step::Drained => return,
                Step::Close => {
                    self.close(conn_id);
                    return;
                }
                Step::Control(action) => self.apply(conn_id, port, action),
            }
        }
    }

    fn apply(&mut self, conn_id: usize, port: u16, action: ControlAction) {
        match action {
            ControlAction::Reply(bytes) => {
                let Some(conn) = self.connections.get_mut(conn_id) else {
                    return;
                };
                if let Err(source) = conn.stream_mut().write_all(bytes) {
                    DispatchError::Write { port, source }.report(Some(conn_id));
                }
            }
            ControlAction::SetEchoInterest(interest) => {
                let echo_port = self.listeners[slot(PortRole::Echo)].addr.port();
                let update =
                    self.connections
                        .set_group_interest(self.poll.registry(), echo_port, interest);
                for (failed_id, source) in update.failed {
                    DispatchError::Register {
                        port: echo_port,
                        source,
                    }
                    .report(Some(failed_id));
                }
                info!(
                    interest = ?interest,
                    changed = update.changed,
                    group = self.connections.group(echo_port).len(),
                    "Echo group interest updated"
                );
            }
        }
    }

    /// Close a connection; it is deregistered before the stream is dropped.
    fn close(&mut self, conn_id: usize) {
        if let Some(conn) = self.connections.remove(self.poll.registry(), conn_id) {
            info!(
                conn_id,
                port = conn.local_port(),
                peer = %conn.peer(),
                "The connection was closed"
            );
        }
    }
}
