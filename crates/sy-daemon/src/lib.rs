//! Background daemon for the switchyard dispatcher.
//!
//! The daemon owns the long-running side of the system:
//! - The rebalancer loop, sweeping load off overloaded agents on a timer
//! - Cooperative shutdown so the loop drains instead of being dropped mid-sweep
//!
//! Everything else (assignment, completion, feedback) is request-driven and
//! lives in `sy-dispatch`.

pub mod rebalancer;
pub mod shutdown;

pub use rebalancer::spawn_rebalancer;
pub use shutdown::ShutdownSignal;
