//! Loopback replication bus.
//!
//! Every client gets an inbox; publishing serializes the update to JSON and
//! sends it to every other client, the way a real host would put it on the
//! wire. Ownership is a single shared slot: requests are always granted.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};
use pmotvcontrol::{AccessControl, Ownership, ReplicatedUpdate, Replicator};
use pmotvsource::PlayerId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetMessage {
    Update {
        from: PlayerId,
        update: ReplicatedUpdate,
    },
    ResyncRequest {
        from: PlayerId,
    },
}

#[derive(Default)]
struct BusInner {
    owner: Option<PlayerId>,
    peers: Vec<(PlayerId, Sender<String>)>,
}

#[derive(Clone, Default)]
pub struct LoopbackBus {
    inner: Arc<Mutex<BusInner>>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client and returns its endpoint.
    pub fn join(&self, player: PlayerId, admin: bool) -> Peer {
        let (tx, rx) = unbounded();
        self.inner.lock().unwrap().peers.push((player, tx));
        Peer {
            bus: self.clone(),
            player,
            admin,
            inbox: rx,
        }
    }

    pub fn owner(&self) -> Option<PlayerId> {
        self.inner.lock().unwrap().owner
    }

    pub fn set_owner(&self, owner: Option<PlayerId>) {
        self.inner.lock().unwrap().owner = owner;
    }

    fn broadcast(&self, message: &NetMessage, from: PlayerId) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to serialize message");
                return;
            }
        };
        let mut inner = self.inner.lock().unwrap();
        inner.peers.retain(|(player, tx)| {
            if *player == from {
                return true;
            }
            tx.send(payload.clone()).is_ok()
        });
    }
}

/// One client's view of the bus.
pub struct Peer {
    bus: LoopbackBus,
    player: PlayerId,
    admin: bool,
    inbox: Receiver<String>,
}

impl Peer {
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Decodes everything received since the last call.
    pub fn receive(&self) -> Vec<NetMessage> {
        self.inbox
            .try_iter()
            .filter_map(|payload| match serde_json::from_str(&payload) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(player = self.player.0, error = %e, "Dropping undecodable message");
                    None
                }
            })
            .collect()
    }
}

impl Ownership for Peer {
    fn local_player(&self) -> PlayerId {
        self.player
    }

    fn is_admin(&self) -> bool {
        self.admin
    }

    fn is_owner(&self) -> bool {
        self.bus.owner() == Some(self.player)
    }

    fn request_ownership(&self) -> bool {
        debug!(player = self.player.0, previous = ?self.bus.owner(), "Ownership transferred");
        self.bus.set_owner(Some(self.player));
        true
    }
}

impl Replicator for Peer {
    fn publish(&self, update: ReplicatedUpdate) {
        self.bus.broadcast(
            &NetMessage::Update {
                from: self.player,
                update,
            },
            self.player,
        );
    }

    fn request_resync(&self) {
        self.bus
            .broadcast(&NetMessage::ResyncRequest { from: self.player }, self.player);
    }
}

/// Session whitelist.
pub struct Whitelist(pub Vec<PlayerId>);

impl AccessControl for Whitelist {
    fn has_access(&self, player: PlayerId) -> bool {
        self.0.contains(&player)
    }
}
