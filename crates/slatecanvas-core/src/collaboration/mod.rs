//! Collaboration gateway boundary.
//!
//! The gateway is the transport: it joins a room, broadcasts encoded
//! document updates at least once to the other members, carries ephemeral
//! presence, and reports connection status. [`CollaborationRoom`] owns the
//! room's [`Document`] and runs the optimistic loop: local edits apply
//! immediately, then go out as pending updates whenever the gateway is
//! connected. Updates that could not be sent stay pending until the next
//! successful broadcast.

mod loopback;

pub use loopback::{LoopbackGateway, LoopbackHub};

use crate::codec::BoardSnapshot;
use crate::document::Document;
use crate::element::Color;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Identity of a room member as assigned by the gateway.
pub type PeerId = String;

/// Connection state of the replication channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The channel is down; the gateway will come back on its own.
    #[error("replication channel unavailable")]
    Unavailable,
    #[error("not connected to a room")]
    NotConnected,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Display identity shown next to a peer's cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    pub color: Color,
}

/// Ephemeral per-peer state. Never stored in the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

/// Something the gateway observed since the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Status(ConnectionStatus),
    /// Encoded document update from another member.
    Operation { from: PeerId, update: Vec<u8> },
    Presence { from: PeerId, state: PresenceState },
    PeerLeft(PeerId),
}

/// A room-scoped replication channel.
///
/// Implementations deliver each broadcast at least once to every current
/// member, replay the room's update history to late joiners, and queue
/// incoming events until [`Gateway::poll`] drains them.
pub trait Gateway {
    fn connect(&mut self, room_id: &str) -> Result<(), GatewayError>;

    fn broadcast_operation(&mut self, update: &[u8]) -> Result<(), GatewayError>;

    fn broadcast_presence(&mut self, state: &PresenceState) -> Result<(), GatewayError>;

    /// Drain received events in arrival order.
    fn poll(&mut self) -> Vec<GatewayEvent>;

    fn status(&self) -> ConnectionStatus;

    fn disconnect(&mut self);
}

/// One open room: the replicated document plus the gateway feeding it.
pub struct CollaborationRoom<G: Gateway> {
    room_id: String,
    document: Document,
    gateway: G,
    status: ConnectionStatus,
    presence: PresenceState,
    peers: HashMap<PeerId, PresenceState>,
}

impl<G: Gateway> CollaborationRoom<G> {
    /// Join `room_id` with an empty document.
    pub fn open(room_id: &str, mut gateway: G) -> Result<Self, GatewayError> {
        gateway.connect(room_id)?;
        let status = gateway.status();
        log::info!("opened room {room_id} ({status:?})");
        Ok(Self {
            room_id: room_id.to_string(),
            document: Document::new(room_id),
            gateway,
            status,
            presence: PresenceState::default(),
            peers: HashMap::new(),
        })
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The document, for local edits. Call [`Self::flush`] or
    /// [`Self::pump`] afterwards to send them.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Latest presence of each peer in the room.
    pub fn peers(&self) -> &HashMap<PeerId, PresenceState> {
        &self.peers
    }

    pub fn presence(&self) -> &PresenceState {
        &self.presence
    }

    /// Process gateway events, then send outstanding local updates.
    /// Returns how many remote updates were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        for event in self.gateway.poll() {
            match event {
                GatewayEvent::Status(status) => self.set_status(status),
                GatewayEvent::Operation { from, update } => {
                    match self.document.apply_remote(&update) {
                        Ok(()) => applied += 1,
                        Err(err) => log::warn!("dropped update from {from}: {err}"),
                    }
                }
                GatewayEvent::Presence { from, state } => {
                    log::debug!("presence from {from}: {state:?}");
                    self.peers.insert(from, state);
                }
                GatewayEvent::PeerLeft(peer) => {
                    log::debug!("peer {peer} left room {}", self.room_id);
                    self.peers.remove(&peer);
                }
            }
        }
        self.flush();
        applied
    }

    /// Broadcast local updates not yet delivered. Does nothing unless
    /// connected; returns whether anything was sent.
    pub fn flush(&mut self) -> bool {
        if self.status != ConnectionStatus::Connected {
            return false;
        }
        let pending = match self.document.pending_update() {
            Ok(Some(pending)) => pending,
            Ok(None) => return false,
            Err(err) => {
                log::warn!("failed to encode pending updates for {}: {err}", self.room_id);
                return false;
            }
        };
        match self.gateway.broadcast_operation(&pending.bytes) {
            Ok(()) => {
                self.document.acknowledge(pending.version);
                true
            }
            Err(err) => {
                log::warn!("broadcast to {} failed, will retry: {err}", self.room_id);
                false
            }
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if status == self.status {
            return;
        }
        log::info!("room {}: {:?} -> {status:?}", self.room_id, self.status);
        self.status = status;
        if status == ConnectionStatus::Connected && self.presence != PresenceState::default() {
            self.publish_presence();
        }
    }

    pub fn set_cursor(&mut self, cursor: Point) {
        self.presence.cursor = Some(cursor);
        self.publish_presence();
    }

    /// The pointer left the canvas.
    pub fn clear_cursor(&mut self) {
        self.presence.cursor = None;
        self.publish_presence();
    }

    pub fn set_user(&mut self, user: UserInfo) {
        self.presence.user = Some(user);
        self.publish_presence();
    }

    /// Presence is best effort: it is only sent while connected and a
    /// failed send is not retried.
    fn publish_presence(&mut self) {
        if self.status != ConnectionStatus::Connected {
            return;
        }
        if let Err(err) = self.gateway.broadcast_presence(&self.presence) {
            log::debug!("presence not sent: {err}");
        }
    }

    /// Send what is still pending, leave the room and hand back the final
    /// board content.
    pub fn close(mut self) -> BoardSnapshot {
        self.flush();
        self.gateway.disconnect();
        log::info!("closed room {}", self.room_id);
        self.document.snapshot()
    }
}
