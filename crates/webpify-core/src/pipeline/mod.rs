//! Batch conversion pipeline.
//!
//! Stages, in the order a batch runs them:
//! - **discovery**: find source images in the input folder
//! - **plan**: map each source to its two output paths
//! - **staleness**: skip sources whose outputs are up to date
//! - **dispatcher**: bounded worker pool calling the codec
//! - **writer**: atomic commit of both outputs
//! - **aggregator**: fold outcomes into totals and the failure list
//! - **batch**: wires the stages together

pub mod aggregator;
pub mod batch;
pub mod discovery;
pub mod dispatcher;
pub mod plan;
pub mod staleness;
pub mod writer;

// Re-exports for convenient access
pub use aggregator::ResultAggregator;
pub use batch::{BatchConverter, BatchReport, PreparedBatch};
pub use discovery::{FileDiscovery, SUPPORTED_EXTENSIONS};
pub use dispatcher::{DispatchOptions, DispatchSummary, Dispatcher};
pub use plan::{plan_tasks, targets_for, PlanRoots, TaskPlan};
pub use staleness::{decide, is_up_to_date, Decision, Freshness};
