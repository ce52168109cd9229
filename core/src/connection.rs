//! Per-client connection state and its lifecycle registry.
//!
//! The registry and everything in it are owned by the tick thread. The link
//! reader never touches a `Connection` directly; it posts [`LinkEvent`]s
//! which `ProcessConnections` applies at the top of each tick. `pending`
//! holds ids that have been created but not yet welcomed, `dead` ids that
//! are reaped on the next tick.

use crate::link::LinkEvent;
use crate::objects::ObjectId;
use crate::protocol::{ClientMessage, ProtocolCapabilities};
use chrono::{DateTime, Utc};
use slog::{info, warn, Logger};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Instant;

#[derive(Debug)]
pub struct Connection {
    pub id: i64,
    pub capabilities: ProtocolCapabilities,
    /// Account the connection has authenticated to, if any.
    pub account: Option<i64>,
    pub admin_level: i64,
    /// The play session this connection is attached to, if any.
    pub session: Option<ObjectId>,
    pub(crate) inbound: VecDeque<ClientMessage>,
    pub connected_at: DateTime<Utc>,
    pub last_activity: Instant,
}

impl Connection {
    pub fn new(id: i64, capabilities: ProtocolCapabilities) -> Self {
        Connection {
            id,
            capabilities,
            account: None,
            admin_level: 0,
            session: None,
            inbound: VecDeque::new(),
            connected_at: Utc::now(),
            last_activity: Instant::now(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.account.is_some()
    }
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    pub(crate) live: HashMap<i64, Connection>,
    pub(crate) pending: BTreeSet<i64>,
    pub(crate) dead: BTreeSet<i64>,
}

impl ConnectionRegistry {
    /// Fold one link event into the registry.
    pub fn apply(&mut self, event: LinkEvent, logger: &Logger) {
        match event {
            LinkEvent::ClientAttached { id, capabilities } => {
                if let Some(existing) = self.live.get_mut(&id) {
                    // the roster after a reconnect re-announces known clients
                    existing.capabilities = capabilities;
                } else {
                    info!(logger, "new client"; "client" => id);
                    self.live.insert(id, Connection::new(id, capabilities));
                    self.pending.insert(id);
                }
            }
            LinkEvent::ClientCapabilities { id, capabilities } => match self.live.get_mut(&id) {
                Some(conn) => conn.capabilities = capabilities,
                None => warn!(logger, "capabilities for unknown client"; "client" => id),
            },
            LinkEvent::ClientData { id, messages } => match self.live.get_mut(&id) {
                Some(conn) => conn.inbound.extend(messages),
                None => info!(logger, "data for unknown client"; "client" => id),
            },
            LinkEvent::ClientGone { id } => {
                self.dead.insert(id);
            }
        }
    }

    pub fn get(&self, id: i64) -> Option<&Connection> {
        self.live.get(&id)
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut Connection> {
        self.live.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.live.keys().copied().collect();
        ids.sort();
        ids
    }

    pub(crate) fn take_pending(&mut self) -> Vec<i64> {
        let pending: Vec<i64> = self.pending.iter().copied().collect();
        self.pending.clear();
        pending
    }

    pub(crate) fn take_dead(&mut self) -> Vec<i64> {
        let dead: Vec<i64> = self.dead.iter().copied().collect();
        self.dead.clear();
        dead
    }

    /// Pull every queued inbound message, per connection, in arrival order.
    pub(crate) fn drain_inbound(&mut self) -> Vec<(i64, Vec<ClientMessage>)> {
        let mut ids: Vec<i64> = self.live.keys().copied().collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| {
                let conn = self.live.get_mut(&id)?;
                if conn.inbound.is_empty() {
                    None
                } else {
                    Some((id, conn.inbound.drain(..).collect()))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::test_logger;

    #[test]
    fn attach_data_disconnect_lifecycle() {
        let mut registry = ConnectionRegistry::default();
        let logger = test_logger();

        registry.apply(
            LinkEvent::ClientAttached {
                id: 7,
                capabilities: ProtocolCapabilities::default(),
            },
            &logger,
        );
        assert!(registry.pending.contains(&7));
        assert_eq!(registry.len(), 1);

        registry.apply(
            LinkEvent::ClientData {
                id: 7,
                messages: vec![ClientMessage::text("hello")],
            },
            &logger,
        );
        let drained = registry.drain_inbound();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].0, 7);
        assert_eq!(drained[0].1.len(), 1);
        // drained means drained
        assert!(registry.drain_inbound().is_empty());

        registry.apply(LinkEvent::ClientGone { id: 7 }, &logger);
        assert_eq!(registry.take_dead(), vec![7]);
        assert!(registry.take_dead().is_empty());
    }

    #[test]
    fn reattach_updates_capabilities_in_place() {
        let mut registry = ConnectionRegistry::default();
        let logger = test_logger();
        registry.apply(
            LinkEvent::ClientAttached {
                id: 1,
                capabilities: ProtocolCapabilities::default(),
            },
            &logger,
        );
        registry.take_pending();

        let mut caps = ProtocolCapabilities::default();
        caps.width = 132;
        registry.apply(
            LinkEvent::ClientAttached {
                id: 1,
                capabilities: caps,
            },
            &logger,
        );
        // no second welcome
        assert!(registry.take_pending().is_empty());
        assert_eq!(registry.get(1).unwrap().capabilities.width, 132);
    }
}
