pub mod feedback;
pub mod ledger;
pub mod matcher;
pub mod metrics;
pub mod orchestrator;
pub mod rebalance;
pub mod registry;
pub mod scoring;
pub mod selector;
