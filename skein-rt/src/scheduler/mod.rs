//! The worker pool: work-stealing scheduling of actor resumptions.

pub mod pool;
mod worker;

pub use pool::SchedulerPolicy;
pub(crate) use pool::{Resumable, SchedulerPool};
