//! BUGGIFY - FoundationDB-Style Fault Injection
//!
//! Every fault decision draws from a caller-supplied `Rng`, so a seed replays
//! the exact same fault sequence.
//!
//! ```ignore
//! if buggify!(&mut rng, faults::object_store::TIMEOUT, 0.10) {
//!     return Err(simulated_timeout());
//! }
//! ```

pub mod faults;

use tracing::trace;

/// Roll for `fault_id`; probabilities outside `[0, 1]` are clamped
#[inline]
pub fn should_buggify<R: crate::io::Rng>(rng: &mut R, fault_id: &str, probability: f64) -> bool {
    if probability <= 0.0 {
        return false;
    }
    let triggered = roll(rng) < probability.min(1.0);
    if triggered {
        trace!(fault = fault_id, "buggify triggered");
    }
    triggered
}

#[inline]
fn roll<R: crate::io::Rng>(rng: &mut R) -> f64 {
    rng.gen_range(0, 1_000_000) as f64 / 1_000_000.0
}

#[macro_export]
macro_rules! buggify {
    ($rng:expr, $fault_id:expr, $prob:expr) => {
        $crate::buggify::should_buggify($rng, $fault_id, $prob)
    };
}
