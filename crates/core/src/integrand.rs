use crate::error::IntegrandError;

/// A pure real function of one variable.
///
/// Implementations are shared by reference across worker threads, so they
/// must not rely on interior mutability to produce their values.
pub trait Integrand: Send + Sync {
    fn eval(&self, x: f64) -> Result<f64, IntegrandError>;
}

impl<F> Integrand for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn eval(&self, x: f64) -> Result<f64, IntegrandError> {
        Ok(self(x))
    }
}

/// Adapter for closures that can reject an input.
///
/// ```
/// use quadra_core::{Fallible, IntegrandError, integrate};
///
/// let f = Fallible(|x: f64| {
///     if x < 0.0 {
///         Err(IntegrandError::Custom("negative input".into()))
///     } else {
///         Ok(x)
///     }
/// });
/// assert!(integrate(&f, -1.0, 1.0, 10).is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Fallible<F>(pub F);

impl<F> Integrand for Fallible<F>
where
    F: Fn(f64) -> Result<f64, IntegrandError> + Send + Sync,
{
    fn eval(&self, x: f64) -> Result<f64, IntegrandError> {
        (self.0)(x)
    }
}
