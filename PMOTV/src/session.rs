//! Simulated session: N clients, each with its own controller, decoder and
//! bus endpoint, all stepped from the same loop.
//!
//! Client 1 is the session admin and the initial authority. A few seconds
//! in, the last client queues the configured URLs, taking control of the
//! session the way a guest adding to the queue would.

use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::Receiver;
use pmotvconfig::Config;
use pmotvcontrol::{
    AuthorityContext, NetworkClock, PlaybackController, PlayerConfigExt, PlayerEvent, PlayerState,
};
use pmotvsource::{
    MediaUrl, PlayerId, PlaylistDefaults, PlaylistSource, QueueLimits, QueueSource, Source,
    SourceConfigExt, SourceManager, StreamRetryPolicy, StreamSource,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use tracing::{info, warn};

use crate::backend::SimBackend;
use crate::network::{LoopbackBus, NetMessage, Peer, Whitelist};

const QUEUE_INDEX: usize = 0;
/// Session time at which the guest queues its URLs.
const QUEUE_DELAY: f64 = 3.0;

/// Content of the `session` configuration section.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SessionPlan {
    pub seed: u64,
    pub error_rate: f64,
    pub playlist: Vec<String>,
    /// Playlist in text form (`@url`, `^alt`, `#tags`, title lines); takes
    /// precedence over `playlist` when set.
    pub playlist_text: String,
    pub queue: Vec<String>,
    pub stream_url: String,
}

struct SourceSettings {
    stream: StreamRetryPolicy,
    queue: QueueLimits,
    playlist: PlaylistDefaults,
}

pub struct SimClient {
    peer: Arc<Peer>,
    controller: PlaybackController<SimBackend>,
    state_events: Receiver<PlayerEvent>,
    last_state: PlayerState,
}

impl SimClient {
    pub fn player(&self) -> PlayerId {
        self.peer.player()
    }

    pub fn controller(&self) -> &PlaybackController<SimBackend> {
        &self.controller
    }

    fn pump_network(&mut self) {
        for message in self.peer.receive() {
            match message {
                NetMessage::Update { update, .. } => self.controller.apply_update(update),
                NetMessage::ResyncRequest { from } => {
                    if self.controller.is_owner() {
                        info!(player = self.player().0, from = from.0, "Resync requested");
                    }
                    self.controller.handle_resync_request();
                }
            }
        }
    }

    fn log_transitions(&mut self) {
        if self.state_events.try_iter().count() == 0 {
            return;
        }
        let state = self.controller.state();
        if state == self.last_state {
            return;
        }
        self.last_state = state;
        let record = self.controller.record();
        match state {
            PlayerState::Error => warn!(
                player = self.player().0,
                video_number = record.video_number,
                error = ?self.controller.last_error(),
                url = %record.url,
                "Playback error"
            ),
            _ => info!(
                player = self.player().0,
                state = state.as_str(),
                owner = self.controller.is_owner(),
                video_number = record.video_number,
                url = %record.url,
                "State changed"
            ),
        }
    }
}

pub struct Simulation {
    bus: LoopbackBus,
    clock: Arc<dyn NetworkClock>,
    clients: Vec<SimClient>,
    queue: Vec<String>,
    queued: bool,
}

impl Simulation {
    pub fn new(config: &Config, clock: Arc<dyn NetworkClock>, clients: usize) -> Result<Self> {
        let plan: SessionPlan = config.get_section(&["session"])?;
        let settings = config.player_settings();
        let source_settings = SourceSettings {
            stream: config.stream_retry_policy(),
            queue: config.queue_limits(),
            playlist: config.playlist_defaults(),
        };

        let bus = LoopbackBus::new();
        let admin = PlayerId(1);
        bus.set_owner(Some(admin));

        let mut sim_clients = Vec::with_capacity(clients);
        for n in 1..=clients.max(1) {
            let player = PlayerId(n as u32);
            let peer = Arc::new(bus.join(player, player == admin));
            let ctx = AuthorityContext::new(clock.clone(), peer.clone(), peer.clone())
                .with_access(Arc::new(Whitelist(vec![admin])));
            let backend = SimBackend::new(clock.clone(), plan.seed + n as u64, plan.error_rate);
            let sources = build_sources(&plan, &source_settings, player == admin)?;
            let controller = PlaybackController::new(ctx, backend, sources, settings.clone());
            let state_events = controller.events().subscribe_to(PlayerEvent::VideoStateUpdate);
            sim_clients.push(SimClient {
                peer,
                controller,
                state_events,
                last_state: PlayerState::Stopped,
            });
        }

        info!(
            clients = sim_clients.len(),
            playlist = plan.playlist.len(),
            queue = plan.queue.len(),
            stream = !plan.stream_url.is_empty(),
            "Session created"
        );

        Ok(Self {
            bus,
            clock,
            clients: sim_clients,
            queue: plan.queue,
            queued: false,
        })
    }

    pub fn clients(&self) -> &[SimClient] {
        &self.clients
    }

    pub fn owner(&self) -> Option<PlayerId> {
        self.bus.owner()
    }

    /// Lets the authority start the source chain.
    pub fn start(&mut self) {
        for client in &mut self.clients {
            if let Err(e) = client.controller.start() {
                warn!(player = client.player().0, error = %e, "Autoplay failed");
            }
        }
    }

    /// One frame for every client.
    pub fn step(&mut self) {
        if !self.queued && self.clock.now() >= QUEUE_DELAY {
            self.queued = true;
            self.enqueue_guest_urls();
        }
        for client in &mut self.clients {
            client.pump_network();
            client.controller.tick();
            client.log_transitions();
        }
    }

    fn enqueue_guest_urls(&mut self) {
        let Some(guest) = self.clients.last_mut() else {
            return;
        };
        for url in &self.queue {
            match guest.controller.enqueue(QUEUE_INDEX, MediaUrl::new(url.as_str())) {
                Ok(()) => info!(player = guest.player().0, url = %url, "Queued"),
                Err(e) => warn!(player = guest.player().0, url = %url, error = %e, "Queue refused"),
            }
        }
    }

    /// Final state of every client.
    pub fn report(&self) {
        for client in &self.clients {
            let controller = &client.controller;
            info!(
                player = client.player().0,
                owner = controller.is_owner(),
                state = controller.state().as_str(),
                video_number = controller.record().video_number,
                loaded = controller.loaded_video_number(),
                position = controller.track_position(),
                url = %controller.record().url,
                "Final state"
            );
        }
    }
}

/// Queue, playlist and (optionally) stream, identical on every client so
/// that replicated snapshots line up index by index.
fn build_sources(plan: &SessionPlan, settings: &SourceSettings, authority: bool) -> Result<SourceManager> {
    let mut manager = SourceManager::new();
    manager.push(Source::Queue(QueueSource::new("queue").with_limits(settings.queue)));

    let mut playlist = PlaylistSource::new("playlist");
    if plan.playlist_text.trim().is_empty() {
        playlist.load(plan.playlist.iter().map(|url| MediaUrl::new(url.as_str())).collect());
    } else {
        playlist.load_text(&plan.playlist_text)?;
    }
    playlist.set_auto_advance(settings.playlist.auto_advance);
    // Only the authority shuffles; followers receive its order.
    if settings.playlist.shuffle_on_load && authority {
        playlist.shuffle(&mut StdRng::seed_from_u64(plan.seed));
    }
    manager.push(Source::Playlist(playlist));

    if !plan.stream_url.trim().is_empty() {
        manager.push(Source::Stream(
            StreamSource::new("stream", MediaUrl::new(plan.stream_url.as_str()))
                .with_policy(settings.stream),
        ));
    }
    Ok(manager)
}
