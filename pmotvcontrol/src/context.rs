//! Host collaborators injected into the controller.
//!
//! Everything the controller needs from the outside world (shared clock,
//! identity, ownership arbitration, replication, access control, presence,
//! URL remapping) goes through [`AuthorityContext`], so tests can drive a
//! controller with a fake clock and a fake network.

use std::sync::Arc;

use pmotvsource::PlayerId;

use crate::record::ReplicatedUpdate;

/// Shared monotonic network time, in seconds.
pub trait NetworkClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Identity of the local client and the host's ownership primitive.
pub trait Ownership: Send + Sync {
    fn local_player(&self) -> PlayerId;

    /// Session administrators bypass the lock.
    fn is_admin(&self) -> bool {
        false
    }

    /// Is the local client the current authority?
    fn is_owner(&self) -> bool;

    /// Asks the host to make the local client the authority. Returns `true`
    /// when granted.
    fn request_ownership(&self) -> bool;
}

/// Yes/no authorization oracle.
pub trait AccessControl: Send + Sync {
    fn has_access(&self, player: PlayerId) -> bool;
}

/// Host replication primitive: fire-and-forget, eventually delivered.
pub trait Replicator: Send + Sync {
    fn publish(&self, update: ReplicatedUpdate);

    /// Asks the authority to publish its state again.
    fn request_resync(&self);
}

/// Whether the local client is in the active playback zone.
pub trait PresenceGate: Send + Sync {
    fn is_present(&self) -> bool;
}

/// Rewrites URLs before they reach the backend.
pub trait UrlRemapper: Send + Sync {
    fn remap(&self, url: &str) -> String;
}

#[derive(Clone)]
pub struct AuthorityContext {
    pub clock: Arc<dyn NetworkClock>,
    pub ownership: Arc<dyn Ownership>,
    pub replicator: Arc<dyn Replicator>,
    pub access: Option<Arc<dyn AccessControl>>,
    pub presence: Option<Arc<dyn PresenceGate>>,
    pub remapper: Option<Arc<dyn UrlRemapper>>,
}

impl AuthorityContext {
    pub fn new(
        clock: Arc<dyn NetworkClock>,
        ownership: Arc<dyn Ownership>,
        replicator: Arc<dyn Replicator>,
    ) -> Self {
        Self {
            clock,
            ownership,
            replicator,
            access: None,
            presence: None,
            remapper: None,
        }
    }

    pub fn with_access(mut self, access: Arc<dyn AccessControl>) -> Self {
        self.access = Some(access);
        self
    }

    pub fn with_presence(mut self, presence: Arc<dyn PresenceGate>) -> Self {
        self.presence = Some(presence);
        self
    }

    pub fn with_remapper(mut self, remapper: Arc<dyn UrlRemapper>) -> Self {
        self.remapper = Some(remapper);
        self
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn local_player(&self) -> PlayerId {
        self.ownership.local_player()
    }

    pub fn is_owner(&self) -> bool {
        self.ownership.is_owner()
    }

    /// Administrator, or granted by the access-control delegate.
    pub fn is_authorized(&self) -> bool {
        self.ownership.is_admin()
            || self
                .access
                .as_ref()
                .is_some_and(|a| a.has_access(self.local_player()))
    }

    pub fn is_present(&self) -> bool {
        self.presence.as_ref().is_none_or(|p| p.is_present())
    }

    pub fn remap(&self, url: &str) -> String {
        match &self.remapper {
            Some(remapper) => remapper.remap(url),
            None => url.to_string(),
        }
    }
}
