//! Deterministic fakes: a manual clock, a scriptable backend and an
//! in-memory session network.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use pmotvcontrol::{
    AccessControl, AuthorityContext, BackendEvent, BackendKind, MediaBackend, NetworkClock,
    Ownership, PlaybackController, PlayerSettings, PresenceGate, ReplicatedUpdate, Replicator,
};
use pmotvsource::{PlayerId, SourceManager};

// ============================================================================
// Clock
// ============================================================================

#[derive(Clone, Default)]
pub struct FakeClock {
    now: Arc<Mutex<f64>>,
}

impl FakeClock {
    pub fn set(&self, t: f64) {
        *self.now.lock().unwrap() = t;
    }

    pub fn advance(&self, dt: f64) {
        *self.now.lock().unwrap() += dt;
    }
}

impl NetworkClock for FakeClock {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap()
    }
}

// ============================================================================
// Backend
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Load(String, BackendKind),
    Play,
    Pause,
    Stop,
    SetTime(f64),
}

#[derive(Default)]
struct BackendInner {
    calls: Vec<Call>,
    time: f64,
    duration: f64,
    playing: bool,
    frozen: bool,
    pending: Vec<BackendEvent>,
}

/// Records calls; the test decides when events fire. Clones share state.
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Mutex<BackendInner>>,
}

impl FakeBackend {
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn play_count(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Play).count()
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Load(url, _) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn set_duration(&self, duration: f64) {
        self.inner.lock().unwrap().duration = duration;
    }

    pub fn set_position(&self, t: f64) {
        self.inner.lock().unwrap().time = t;
    }

    /// A frozen decoder ignores seeks and never advances.
    pub fn freeze(&self, frozen: bool) {
        self.inner.lock().unwrap().frozen = frozen;
    }

    /// Moves the playhead like a running decoder would.
    pub fn advance(&self, dt: f64) {
        let mut inner = self.inner.lock().unwrap();
        if inner.playing && !inner.frozen {
            inner.time += dt;
        }
    }

    pub fn time_now(&self) -> f64 {
        self.inner.lock().unwrap().time
    }

    pub fn is_playing_now(&self) -> bool {
        self.inner.lock().unwrap().playing
    }

    /// Queues an event delivered on the next `tick`.
    pub fn emit(&self, event: BackendEvent) {
        self.inner.lock().unwrap().pending.push(event);
    }
}

impl MediaBackend for FakeBackend {
    fn load(&mut self, url: &str, kind: BackendKind) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Load(url.to_string(), kind));
        inner.time = 0.0;
        inner.playing = false;
    }

    fn play(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Play);
        inner.playing = true;
    }

    fn pause(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Pause);
        inner.playing = false;
    }

    fn stop(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Stop);
        inner.playing = false;
    }

    fn set_time(&mut self, seconds: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::SetTime(seconds));
        if !inner.frozen {
            inner.time = seconds;
        }
    }

    fn time(&self) -> f64 {
        self.inner.lock().unwrap().time
    }

    fn duration(&self) -> f64 {
        self.inner.lock().unwrap().duration
    }

    fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().playing
    }

    fn drain_events(&mut self) -> Vec<BackendEvent> {
        std::mem::take(&mut self.inner.lock().unwrap().pending)
    }
}

// ============================================================================
// Session network
// ============================================================================

#[derive(Default)]
struct SessionInner {
    owner: Option<PlayerId>,
    outbox: Vec<(PlayerId, ReplicatedUpdate)>,
    resync_requests: Vec<PlayerId>,
}

/// Ownership arbitration and a replication outbox shared by every client.
#[derive(Clone, Default)]
pub struct FakeSession {
    inner: Arc<Mutex<SessionInner>>,
}

impl FakeSession {
    pub fn owner(&self) -> Option<PlayerId> {
        self.inner.lock().unwrap().owner
    }

    pub fn set_owner(&self, owner: Option<PlayerId>) {
        self.inner.lock().unwrap().owner = owner;
    }

    /// Everything published since the last call.
    pub fn take_published(&self) -> Vec<(PlayerId, ReplicatedUpdate)> {
        std::mem::take(&mut self.inner.lock().unwrap().outbox)
    }

    pub fn take_resync_requests(&self) -> Vec<PlayerId> {
        std::mem::take(&mut self.inner.lock().unwrap().resync_requests)
    }

    /// Latest playback record published, if any.
    pub fn records(updates: &[(PlayerId, ReplicatedUpdate)]) -> Vec<pmotvcontrol::PlaybackRecord> {
        updates
            .iter()
            .filter_map(|(_, u)| match u {
                ReplicatedUpdate::Playback(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }
}

pub struct FakeIdentity {
    session: FakeSession,
    me: PlayerId,
    admin: bool,
}

impl Ownership for FakeIdentity {
    fn local_player(&self) -> PlayerId {
        self.me
    }

    fn is_admin(&self) -> bool {
        self.admin
    }

    fn is_owner(&self) -> bool {
        self.session.owner() == Some(self.me)
    }

    fn request_ownership(&self) -> bool {
        self.session.set_owner(Some(self.me));
        true
    }
}

pub struct FakeReplicator {
    session: FakeSession,
    me: PlayerId,
}

impl Replicator for FakeReplicator {
    fn publish(&self, update: ReplicatedUpdate) {
        self.session.inner.lock().unwrap().outbox.push((self.me, update));
    }

    fn request_resync(&self) {
        self.session.inner.lock().unwrap().resync_requests.push(self.me);
    }
}

pub struct Whitelist(pub Vec<PlayerId>);

impl AccessControl for Whitelist {
    fn has_access(&self, player: PlayerId) -> bool {
        self.0.contains(&player)
    }
}

/// Toggleable playback zone.
#[derive(Default)]
pub struct Presence(AtomicBool);

impl Presence {
    pub fn set(&self, present: bool) {
        self.0.store(present, Ordering::SeqCst);
    }
}

impl PresenceGate for Presence {
    fn is_present(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Clients
// ============================================================================

pub struct Client {
    pub id: PlayerId,
    pub backend: FakeBackend,
    pub controller: PlaybackController<FakeBackend>,
}

pub struct ClientBuilder {
    pub id: PlayerId,
    pub admin: bool,
    pub whitelist: Option<Vec<PlayerId>>,
    pub presence: Option<Arc<Presence>>,
    pub sources: SourceManager,
    pub settings: PlayerSettings,
}

impl ClientBuilder {
    pub fn new(id: u32) -> Self {
        Self {
            id: PlayerId(id),
            admin: false,
            whitelist: None,
            presence: None,
            sources: SourceManager::new(),
            settings: PlayerSettings::default(),
        }
    }

    pub fn admin(mut self) -> Self {
        self.admin = true;
        self
    }

    pub fn whitelist(mut self, players: Vec<PlayerId>) -> Self {
        self.whitelist = Some(players);
        self
    }

    pub fn presence(mut self, presence: Arc<Presence>) -> Self {
        self.presence = Some(presence);
        self
    }

    pub fn sources(mut self, sources: SourceManager) -> Self {
        self.sources = sources;
        self
    }

    pub fn settings(mut self, settings: PlayerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self, clock: &FakeClock, session: &FakeSession) -> Client {
        let mut ctx = AuthorityContext::new(
            Arc::new(clock.clone()),
            Arc::new(FakeIdentity {
                session: session.clone(),
                me: self.id,
                admin: self.admin,
            }),
            Arc::new(FakeReplicator {
                session: session.clone(),
                me: self.id,
            }),
        );
        if let Some(players) = self.whitelist {
            ctx = ctx.with_access(Arc::new(Whitelist(players)));
        }
        if let Some(presence) = self.presence {
            ctx = ctx.with_presence(presence);
        }
        let backend = FakeBackend::default();
        backend.set_duration(120.0);
        let controller =
            PlaybackController::new(ctx, backend.clone(), self.sources, self.settings);
        Client {
            id: self.id,
            backend,
            controller,
        }
    }
}

/// Delivers published updates to every other client, in publish order.
pub fn deliver(session: &FakeSession, clients: &mut [&mut Client]) -> usize {
    let updates = session.take_published();
    let count = updates.len();
    for (from, update) in updates {
        for client in clients.iter_mut() {
            if client.id != from {
                client.controller.apply_update(update.clone());
            }
        }
    }
    for requester in session.take_resync_requests() {
        for client in clients.iter_mut() {
            if client.id != requester {
                client.controller.handle_resync_request();
            }
        }
    }
    count
}

/// Fires `Ready` then `Start` on a client, one tick each.
pub fn ready_and_start(client: &mut Client, duration: f64) {
    client.backend.set_duration(duration);
    client.backend.emit(BackendEvent::Ready { duration });
    client.controller.tick();
    client.backend.emit(BackendEvent::Start);
    client.controller.tick();
}
