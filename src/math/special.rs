//! Special functions used by the count likelihoods.
//!
//! `ln Γ` and `ψ` come from `statrs`; `statrs` has no trigamma, so `ψ₁` is
//! evaluated here with the usual recurrence + asymptotic expansion.

pub use statrs::function::gamma::{digamma, ln_gamma};

/// Below this argument we shift upwards with `ψ₁(x) = ψ₁(x + 1) + 1/x²`.
const TRIGAMMA_SHIFT: f64 = 10.0;

/// Trigamma function `ψ₁(x) = d²/dx² ln Γ(x)` for `x > 0`.
///
/// Returns `NaN` for non-positive or non-finite input.
pub fn trigamma(x: f64) -> f64 {
    if !(x.is_finite() && x > 0.0) {
        return f64::NAN;
    }

    let mut x = x;
    let mut acc = 0.0;
    while x < TRIGAMMA_SHIFT {
        acc += 1.0 / (x * x);
        x += 1.0;
    }

    // ψ₁(x) ~ 1/x + 1/(2x²) + 1/(6x³) - 1/(30x⁵) + 1/(42x⁷) - 1/(30x⁹)
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    let series = inv
        + inv2 / 2.0
        + inv * inv2 * (1.0 / 6.0 - inv2 * (1.0 / 30.0 - inv2 * (1.0 / 42.0 - inv2 / 30.0)));
    acc + series
}

/// `ln(y!)` for a non-negative count.
pub fn ln_factorial(y: f64) -> f64 {
    ln_gamma(y + 1.0)
}
