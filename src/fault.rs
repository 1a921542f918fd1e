//! Crash probe for durability testing. Compiled to a no-op unless the
//! `fault-injection` feature is enabled, keeping it off the hot path.

#[cfg(feature = "fault-injection")]
pub(crate) fn maybe_crash(probability: f64) {
    use rand::Rng;

    if probability > 0.0 && rand::thread_rng().gen::<f64>() < probability {
        std::process::abort();
    }
}

#[cfg(not(feature = "fault-injection"))]
#[inline(always)]
pub(crate) fn maybe_crash(_probability: f64) {}
