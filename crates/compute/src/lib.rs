pub mod executor;
pub mod strategy;
pub mod wire;
pub mod worker;

pub use executor::{
    integrate_partitioned, reduce, Executor, PartialResult, ProcessPoolExecutor,
    SequentialExecutor, ThreadPoolExecutor, WorkerCommand,
};
pub use strategy::{integrate_concurrent, Strategy};
