//! In-process relay for running several replicas against each other.

use super::{ConnectionStatus, Gateway, GatewayError, GatewayEvent, PeerId, PresenceState};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

#[derive(Default)]
struct RoomState {
    members: Vec<PeerId>,
    /// Every update broadcast in the room, replayed to joiners.
    history: Vec<(PeerId, Vec<u8>)>,
}

struct PeerState {
    room: Option<String>,
    online: bool,
    inbox: VecDeque<GatewayEvent>,
}

#[derive(Default)]
struct HubState {
    rooms: HashMap<String, RoomState>,
    peers: HashMap<PeerId, PeerState>,
}

impl HubState {
    fn peer(&mut self, peer: &str) -> Result<&mut PeerState, GatewayError> {
        self.peers.get_mut(peer).ok_or(GatewayError::NotConnected)
    }

    /// Queue `event` for every member of `room` except `from`.
    fn deliver(&mut self, room: &str, from: &str, event: GatewayEvent) {
        let Some(room) = self.rooms.get(room) else {
            return;
        };
        for member in room.members.iter().filter(|m| m.as_str() != from) {
            if let Some(peer) = self.peers.get_mut(member) {
                peer.inbox.push_back(event.clone());
            }
        }
    }
}

/// A relay shared by all gateways created from it, like a server that
/// every client in the process talks to. Delivery is synchronous; events
/// wait in each peer's inbox until its gateway is polled.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    state: Rc<RefCell<HubState>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the gateway for a new peer.
    pub fn gateway(&self, peer: &str) -> LoopbackGateway {
        self.state.borrow_mut().peers.insert(
            peer.to_string(),
            PeerState {
                room: None,
                online: true,
                inbox: VecDeque::new(),
            },
        );
        LoopbackGateway {
            state: Rc::clone(&self.state),
            peer: peer.to_string(),
        }
    }

    /// Simulate a peer's network dropping or returning.
    ///
    /// While offline the peer cannot broadcast and receives only status
    /// events; traffic addressed to it is held until it is back.
    pub fn set_online(&self, peer: &str, online: bool) {
        let mut state = self.state.borrow_mut();
        let Some(peer_state) = state.peers.get_mut(peer) else {
            return;
        };
        if peer_state.online == online {
            return;
        }
        peer_state.online = online;
        if peer_state.room.is_some() {
            let status = if online {
                ConnectionStatus::Connected
            } else {
                ConnectionStatus::Reconnecting
            };
            peer_state.inbox.push_back(GatewayEvent::Status(status));
        }
    }

    /// Current members of a room, in join order.
    pub fn members(&self, room: &str) -> Vec<PeerId> {
        self.state
            .borrow()
            .rooms
            .get(room)
            .map(|r| r.members.clone())
            .unwrap_or_default()
    }

    /// Number of updates broadcast in a room so far.
    pub fn history_len(&self, room: &str) -> usize {
        self.state
            .borrow()
            .rooms
            .get(room)
            .map_or(0, |r| r.history.len())
    }
}

/// One peer's connection to a [`LoopbackHub`].
pub struct LoopbackGateway {
    state: Rc<RefCell<HubState>>,
    peer: PeerId,
}

impl LoopbackGateway {
    pub fn peer_id(&self) -> &str {
        &self.peer
    }

    /// Room the peer can currently broadcast to.
    fn membership(&self) -> Result<String, GatewayError> {
        let mut state = self.state.borrow_mut();
        let peer = state.peer(&self.peer)?;
        let room = peer.room.clone().ok_or(GatewayError::NotConnected)?;
        if !peer.online {
            return Err(GatewayError::Unavailable);
        }
        Ok(room)
    }
}

impl Gateway for LoopbackGateway {
    fn connect(&mut self, room_id: &str) -> Result<(), GatewayError> {
        let online = self.state.borrow_mut().peer(&self.peer)?.online;
        if !online {
            return Err(GatewayError::Unavailable);
        }
        self.disconnect();

        let mut state = self.state.borrow_mut();
        let room = state.rooms.entry(room_id.to_string()).or_default();
        room.members.push(self.peer.clone());
        let replay: Vec<GatewayEvent> = room
            .history
            .iter()
            .map(|(from, update)| GatewayEvent::Operation {
                from: from.clone(),
                update: update.clone(),
            })
            .collect();

        let peer = state.peer(&self.peer)?;
        peer.room = Some(room_id.to_string());
        peer.inbox.extend(replay);
        Ok(())
    }

    fn broadcast_operation(&mut self, update: &[u8]) -> Result<(), GatewayError> {
        let room_id = self.membership()?;
        let mut state = self.state.borrow_mut();
        if let Some(room) = state.rooms.get_mut(&room_id) {
            room.history.push((self.peer.clone(), update.to_vec()));
        }
        let event = GatewayEvent::Operation {
            from: self.peer.clone(),
            update: update.to_vec(),
        };
        state.deliver(&room_id, &self.peer, event);
        Ok(())
    }

    fn broadcast_presence(&mut self, presence: &PresenceState) -> Result<(), GatewayError> {
        let room_id = self.membership()?;
        let event = GatewayEvent::Presence {
            from: self.peer.clone(),
            state: presence.clone(),
        };
        self.state.borrow_mut().deliver(&room_id, &self.peer, event);
        Ok(())
    }

    fn poll(&mut self) -> Vec<GatewayEvent> {
        let mut state = self.state.borrow_mut();
        let Some(peer) = state.peers.get_mut(&self.peer) else {
            return Vec::new();
        };
        if peer.online {
            return peer.inbox.drain(..).collect();
        }
        let (status, held): (Vec<_>, Vec<_>) = peer
            .inbox
            .drain(..)
            .partition(|event| matches!(event, GatewayEvent::Status(_)));
        peer.inbox.extend(held);
        status
    }

    fn status(&self) -> ConnectionStatus {
        let state = self.state.borrow();
        match state.peers.get(&self.peer) {
            Some(PeerState { room: Some(_), online: true, .. }) => ConnectionStatus::Connected,
            Some(PeerState { room: Some(_), online: false, .. }) => ConnectionStatus::Reconnecting,
            _ => ConnectionStatus::Disconnected,
        }
    }

    fn disconnect(&mut self) {
        let mut state = self.state.borrow_mut();
        let Some(room_id) = state.peers.get_mut(&self.peer).and_then(|p| p.room.take()) else {
            return;
        };
        if let Some(room) = state.rooms.get_mut(&room_id) {
            room.members.retain(|m| *m != self.peer);
        }
        state.deliver(&room_id, &self.peer, GatewayEvent::PeerLeft(self.peer.clone()));
    }
}
