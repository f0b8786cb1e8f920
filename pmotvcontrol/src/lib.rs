//! # pmotvcontrol - Playback authority for shared video sessions
//!
//! Every client of a session runs one [`PlaybackController`]. At any time a
//! single client is the *authority*: it drives the source chain, writes the
//! replicated [`PlaybackRecord`] and publishes it. The others are
//! *followers*: they load what the record says, play when the authority
//! plays, and periodically reconcile their position against the shared
//! network clock.
//!
//! # Architecture
//!
//! - **AuthorityContext** : injected host collaborators (clock, ownership,
//!   replication, access control, presence, URL remapping)
//! - **MediaBackend** : the decoder being driven, reporting back through
//!   [`BackendEvent`]s
//! - **PlaybackController** : the state machine; deferred work goes through a
//!   [`Scheduler`] drained once per tick
//! - **PlayerEventBus** : payload-free notifications for observers
//!
//! Source selection itself lives in `pmotvsource`.
//!
//! # Exemple d'utilisation
//!
//! ```ignore
//! let mut controller = PlaybackController::new(ctx, backend, sources, settings);
//! let events = controller.events().subscribe();
//! controller.play_url(MediaUrl::new("https://example.com/movie.mp4"))?;
//! loop {
//!     for update in network.receive() {
//!         controller.apply_update(update);
//!     }
//!     controller.tick();
//! }
//! ```

pub mod backend;
pub mod context;
pub mod controller;
pub mod errors;
pub mod events;
pub mod model;
pub mod record;
pub mod scheduler;
pub mod settings;
pub mod sync;
pub mod url;

#[cfg(feature = "pmotvconfig")]
pub mod config_ext;

pub use backend::{BackendEvent, MediaBackend};
pub use context::{
    AccessControl, AuthorityContext, NetworkClock, Ownership, PresenceGate, Replicator,
    UrlRemapper,
};
pub use controller::PlaybackController;
pub use errors::{ControllerError, Result};
pub use events::{PlayerEvent, PlayerEventBus};
pub use model::{BackendKind, PlayerState, RepeatMode, ScreenFit};
pub use record::{PlaybackRecord, ReplicatedUpdate};
pub use scheduler::{Delay, Scheduler};
pub use settings::PlayerSettings;

#[cfg(feature = "pmotvconfig")]
pub use config_ext::PlayerConfigExt;
