//! Connection registry.
//!
//! Owns every accepted client connection and groups them by the local port
//! they were accepted on. The registry is the only place read interest is
//! changed: a connection is registered with the poll while its reads are
//! enabled and deregistered while they are disabled, and removing a
//! connection deregisters it in the same step.

use super::error::DispatchError;
use super::token;
use mio::net::TcpStream;
use mio::{Interest, Registry};
use slab::Slab;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;

/// Which protocol a listening port speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortRole {
    /// Accepts stop-read / start-read commands.
    Command,
    /// Uppercases and echoes data.
    Echo,
}

/// Whether the poll reports read readiness for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadInterest {
    Enabled,
    Disabled,
}

/// A live client connection.
#[derive(Debug)]
pub struct ClientConnection {
    stream: TcpStream,
    /// Port of the listener that accepted this connection.
    local_port: u16,
    peer: SocketAddr,
    interest: ReadInterest,
}

impl ClientConnection {
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn interest(&self) -> ReadInterest {
        self.interest
    }

    /// Apply `interest` to the poll registration.
    ///
    /// Returns `false` when the connection was already in that state. The
    /// stored flag only changes once the registration call succeeds.
    fn set_interest(
        &mut self,
        registry: &Registry,
        conn_id: usize,
        interest: ReadInterest,
    ) -> io::Result<bool> {
        if self.interest == interest {
            return Ok(false);
        }
        match interest {
            ReadInterest::Enabled => registry.register(
                &mut self.stream,
                token::connection(conn_id),
                Interest::READABLE,
            )?,
            ReadInterest::Disabled => registry.deregister(&mut self.stream)?,
        }
        self.interest = interest;
        Ok(true)
    }
}

/// Result of a bulk interest change on a connection group.
#[derive(Debug, Default)]
pub struct GroupUpdate {
    /// Connections whose registration changed.
    pub changed: usize,
    /// Connections whose registration call failed; they keep their state.
    pub failed: Vec<(usize, io::Error)>,
}

/// Registry of live connections keyed by slab id and grouped by local port.
pub struct ConnectionRegistry {
    connections: Slab<ClientConnection>,
    groups: HashMap<u16, Vec<usize>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Slab::new(),
            groups: HashMap::new(),
        }
    }

    /// Take ownership of an accepted stream and register it for reads.
    ///
    /// Returns the connection id, which is also its poll token. Nothing is
    /// inserted if registration fails.
    pub fn insert(
        &mut self,
        registry: &Registry,
        mut stream: TcpStream,
        local_port: u16,
        peer: SocketAddr,
    ) -> io::Result<usize> {
        let entry = self.connections.vacant_entry();
        let conn_id = entry.key();

        registry.register(
            &mut stream,
            token::connection(conn_id),
            Interest::READABLE,
        )?;

        entry.insert(ClientConnection {
            stream,
            local_port,
            peer,
            interest: ReadInterest::Enabled,
        });
        self.groups.entry(local_port).or_default().push(conn_id);

        Ok(conn_id)
    }

    pub fn get(&self, conn_id: usize) -> Option<&ClientConnection> {
        self.connections.get(conn_id)
    }

    pub fn get_mut(&mut self, conn_id: usize) -> Option<&mut ClientConnection> {
        self.connections.get_mut(conn_id)
    }

    /// Deregister and remove a connection.
    ///
    /// A failed deregistration is reported and the connection is removed
    /// anyway. The stream is closed when the returned value is dropped.
    pub fn remove(&mut self, registry: &Registry, conn_id: usize) -> Option<ClientConnection> {
        let mut conn = self.connections.try_remove(conn_id)?;

        if conn.interest == ReadInterest::Enabled {
            if let Err(source) = registry.deregister(&mut conn.stream) {
                DispatchError::Register {
                    port: conn.local_port,
                    source,
                }
                .report(Some(conn_id));
            }
        }
        if let Some(group) = self.groups.get_mut(&conn.local_port) {
            group.retain(|&id| id != conn_id);
        }

        Some(conn)
    }

    /// Ids of the connections accepted on `local_port`.
    pub fn group(&self, local_port: u16) -> &[usize] {
        self.groups
            .get(&local_port)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Set read interest for every connection accepted on `local_port`.
    ///
    /// Only registrations change; no connection is closed or removed.
    pub fn set_group_interest(
        &mut self,
        registry: &Registry,
        local_port: u16,
        interest: ReadInterest,
    ) -> GroupUpdate {
        let mut update = GroupUpdate::default();
        let Some(group) = self.groups.get(&local_port) else {
            return update;
        };

        for &conn_id in group {
            let Some(conn) = self.connections.get_mut(conn_id) else {
                continue;
            };
            match conn.set_interest(registry, conn_id, interest) {
                Ok(true) => update.changed += 1,
                Ok(false) => {}
                Err(e) => update.failed.push((conn_id, e)),
            }
        }

        update
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::Poll;

    /// Connected (server side, client side) pair over loopback.
    fn stream_pair() -> (TcpStream, std::net::TcpStream) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        (TcpStream::from_std(server), client)
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:1".parse().unwrap()
    }

    #[test]
    fn test_insert_groups_by_port() {
        let poll = Poll::new().unwrap();
        let mut registry = ConnectionRegistry::new();
        let (s1, _c1) = stream_pair();
        let (s2, _c2) = stream_pair();
        let (s3, _c3) = stream_pair();

        let id1 = registry.insert(poll.registry(), s1, 5555, peer()).unwrap();
        let id2 = registry.insert(poll.registry(), s2, 5555, peer()).unwrap();
        let id3 = registry.insert(poll.registry(), s3, 4444, peer()).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.group(5555), [id1, id2]);
        assert_eq!(registry.group(4444), [id3]);
        assert!(registry.group(1234).is_empty());
        assert_eq!(registry.get(id1).unwrap().interest(), ReadInterest::Enabled);
        assert_eq!(registry.get(id3).unwrap().local_port(), 4444);
    }

    #[test]
    fn test_group_interest_is_idempotent() {
        let poll = Poll::new().unwrap();
        let mut registry = ConnectionRegistry::new();
        let (s1, _c1) = stream_pair();
        let (s2, _c2) = stream_pair();
        let (s3, _c3) = stream_pair();

        let id1 = registry.insert(poll.registry(), s1, 5555, peer()).unwrap();
        let _id2 = registry.insert(poll.registry(), s2, 5555, peer()).unwrap();
        let id3 = registry.insert(poll.registry(), s3, 4444, peer()).unwrap();

        let update = registry.set_group_interest(poll.registry(), 5555, ReadInterest::Disabled);
        assert_eq!(update.changed, 2);
        assert!(update.failed.is_empty());
        assert_eq!(registry.get(id1).unwrap().interest(), ReadInterest::Disabled);
        // Other group untouched.
        assert_eq!(registry.get(id3).unwrap().interest(), ReadInterest::Enabled);

        let update = registry.set_group_interest(poll.registry(), 5555, ReadInterest::Disabled);
        assert_eq!(update.changed, 0);

        let update = registry.set_group_interest(poll.registry(), 5555, ReadInterest::Enabled);
        assert_eq!(update.changed, 2);
        assert!(update.failed.is_empty());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_remove_prunes_group() {
        let poll = Poll::new().unwrap();
        let mut registry = ConnectionRegistry::new();
        let (s1, _c1) = stream_pair();
        let (s2, _c2) = stream_pair();

        let id1 = registry.insert(poll.registry(), s1, 5555, peer()).unwrap();
        let id2 = registry.insert(poll.registry(), s2, 5555, peer()).unwrap();

        registry.set_group_interest(poll.registry(), 5555, ReadInterest::Disabled);
        assert!(registry.remove(poll.registry(), id1).is_some());
        assert!(registry.remove(poll.registry(), id1).is_none());

        assert_eq!(registry.group(5555), [id2]);
        assert!(registry.get(id1).is_none());
        assert_eq!(registry.len(), 1);

        // Re-enabling only touches the survivor.
        let update = registry.set_group_interest(poll.registry(), 5555, ReadInterest::Enabled);
        assert_eq!(update.changed, 1);
    }

    #[test]
    fn test_remove_survives_failed_deregister() {
        let poll = Poll::new().unwrap();
        let mut registry = ConnectionRegistry::new();
        let (s1, _c1) = stream_pair();
        let (s2, _c2) = stream_pair();

        let id1 = registry.insert(poll.registry(), s1, 5555, peer()).unwrap();
        let id2 = registry.insert(poll.registry(), s2, 5555, peer()).unwrap();

        // Deregistered behind the registry's back, so removal's own
        // deregister call fails.
        let stream = registry.get_mut(id1).unwrap().stream_mut();
        poll.registry().deregister(stream).unwrap();

        let removed = registry.remove(poll.registry(), id1).unwrap();
        assert_eq!(removed.local_port(), 5555);
        assert!(registry.get(id1).is_none());
        assert_eq!(registry.group(5555), [id2]);
    }
}
