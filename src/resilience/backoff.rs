//! Respawn delay: exponential growth with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before the `crashes`-th consecutive respawn.
///
/// The first respawn waits `base`; each further crash doubles the delay up to `max`.
/// Up to 10% jitter is added so several supervised daemons do not restart in lockstep.
pub fn respawn_delay(crashes: u32, base: Duration, max: Duration) -> Duration {
    let exponent = crashes.saturating_sub(1).min(16);
    let delay = base.saturating_mul(1u32 << exponent).min(max);

    let jitter_range = delay.as_millis() as u64 / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };
    delay + Duration::from_millis(jitter)
}
