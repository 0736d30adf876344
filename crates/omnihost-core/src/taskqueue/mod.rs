//! Task Queue: a persisted queue of mutating zone/host operations, serialized
//! per zone, claimed strictly FIFO within a priority class (§4.6).

pub mod worker;

pub use worker::{TaskQueue, TaskQueueConfig};
