//! Click-through, conversion and click-position probabilities.
//!
//! Everything here is pure: randomness comes in through the `rng` argument,
//! so a seeded RNG makes every decision reproducible in tests.

use std::num::NonZeroU32;

use rand::Rng;

use crate::choice::WeightedChoice;
use crate::error::Result;

/// Peak height of the click-position bell curve above its floor of 1.
pub const CLICK_DISTRIBUTION_APOGEE: f64 = 20.0;

/// Probability (as a fraction, possibly > 1) that a turn triggers an event.
///
/// `base`, `term_override` and `boost` are percentages. A present override
/// replaces `base`; the boost is added only when the search was served by the
/// favored experiment variant.
pub fn effective_rate(
    base: f64,
    term_override: Option<f64>,
    boost: f64,
    variant_matches: bool,
) -> f64 {
    let mut rate = term_override.unwrap_or(base) / 100.0;
    if variant_matches {
        rate += boost / 100.0;
    }
    rate.max(0.0)
}

/// Draw once from `[0, 1)` and compare against `rate`.
pub fn decide<R: Rng + ?Sized>(rng: &mut R, rate: f64) -> bool {
    rng.gen::<f64>() < rate
}

/// Term override if set and non-zero, otherwise the global default.
pub fn resolve_click_position(term_override: Option<u32>, default: NonZeroU32) -> NonZeroU32 {
    term_override.and_then(NonZeroU32::new).unwrap_or(default)
}

/// Weight of the result at 0-based `position` for a user whose preferred
/// position is `click_position`.
///
/// `1 + A * exp(-(position - p)^2 / (2p))`, truncated to an integer.
pub fn click_position_weight(position: usize, click_position: NonZeroU32) -> u64 {
    let p = click_position.get() as f64;
    let distance = position as f64 - p;
    (1.0 + CLICK_DISTRIBUTION_APOGEE * (-(distance * distance) / (2.0 * p)).exp()) as u64
}

/// Pick a 0-based result position among `result_count` results.
///
/// # Errors
///
/// Returns [`crate::GeneratorError::EmptyChoiceSet`] when `result_count` is 0.
pub fn pick_position<R: Rng + ?Sized>(
    rng: &mut R,
    result_count: usize,
    click_position: NonZeroU32,
) -> Result<usize> {
    let choice = WeightedChoice::new(
        "result positions",
        (0..result_count).map(|i| (i, click_position_weight(i, click_position))),
    )?;
    Ok(*choice.pick(rng))
}
