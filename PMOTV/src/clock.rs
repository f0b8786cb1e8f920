use std::time::Instant;

use pmotvcontrol::NetworkClock;

/// Session time in seconds since the simulation started. All simulated
/// clients share the same origin, like a host-synchronized network clock.
#[derive(Clone, Copy, Debug)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl NetworkClock for SessionClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}
