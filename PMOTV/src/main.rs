mod backend;
mod clock;
mod logging;
mod network;
mod session;

use std::sync::Arc;
use std::time::Duration;

use pmotvconfig::get_config;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

use crate::clock::SessionClock;
use crate::session::Simulation;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ========== PHASE 1 : Configuration et logs ==========
    let config = get_config();
    logging::init_logging(&config);

    let session_id = config.get_client_id("session")?;
    let clients = config.get_session_clients()?;
    let duration = Duration::from_secs(config.get_session_duration_secs()?);
    let tick = Duration::from_millis(config.get_session_tick_ms()?.max(1));
    info!(
        session = %session_id,
        config_dir = %config.directory(),
        clients,
        duration_secs = duration.as_secs(),
        "📺 Starting PMOTV session simulation"
    );

    // ========== PHASE 2 : Session ==========
    let clock = SessionClock::start();
    let mut simulation = Simulation::new(&config, Arc::new(clock), clients)?;
    simulation.start();

    // ========== PHASE 3 : Boucle de simulation ==========
    let deadline = Instant::now() + duration;
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
        if Instant::now() >= deadline {
            break;
        }
        simulation.step();
    }

    simulation.report();
    info!(owner = ?simulation.owner(), "✅ Session finished");
    Ok(())
}
