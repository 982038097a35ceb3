use crate::error::{IntegrandError, QuadError, QuadResult};
use crate::integrand::Integrand;
use crate::interval::Interval;

/// Estimate the integral of `f` over `[a, b]` with the left-rectangle rule.
///
/// The interval is cut into `n_iter` equal steps and `f` is sampled once at
/// the left edge of each, accumulating `f(x) * step` in order. The error
/// shrinks linearly with the step width.
///
/// `a > b` is accepted and yields the negated integral. `a == b` returns
/// `0.0` without evaluating `f`.
pub fn integrate<I: Integrand + ?Sized>(f: &I, a: f64, b: f64, n_iter: u64) -> QuadResult<f64> {
    let interval = Interval::new(a, b);
    interval.validate()?;
    if n_iter == 0 {
        return Err(QuadError::invalid("n_iter must be at least 1"));
    }
    if interval.is_degenerate() {
        return Ok(0.0);
    }

    let step = interval.width() / n_iter as f64;
    let mut acc = 0.0;
    for i in 0..n_iter {
        let x = a + i as f64 * step;
        let value = f.eval(x)?;
        if !value.is_finite() {
            return Err(IntegrandError::NonFinite { x, value }.into());
        }
        acc += value * step;
    }
    Ok(acc)
}

/// Same as [`integrate`] over an [`Interval`].
pub fn integrate_interval<I: Integrand + ?Sized>(
    f: &I,
    interval: Interval,
    n_iter: u64,
) -> QuadResult<f64> {
    integrate(f, interval.low, interval.high, n_iter)
}
