//! Quadrature kernel and shared types for partitioned numerical integration.

pub mod config;
pub mod error;
pub mod function;
pub mod integrand;
pub mod interval;
pub mod kernel;

pub use config::{Config, StrategyKind};
pub use error::*;
pub use function::Function;
pub use integrand::{Fallible, Integrand};
pub use interval::{Interval, PartitionPlan, PartitionTask};
pub use kernel::{integrate, integrate_interval};
