//! Concurrent in-memory queues.

mod blocking;
mod mpmc;
mod spsc;

pub use blocking::BlockingQueue;
pub use mpmc::MpmcQueue;
pub use spsc::SpscRing;
