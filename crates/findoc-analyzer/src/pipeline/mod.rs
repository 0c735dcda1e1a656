//! Pipeline orchestration over the stage graph

mod graph;
mod orchestrator;

pub use graph::StageGraph;
pub use orchestrator::{NoopObserver, Pipeline, PipelineObserver, PipelineState, STAGE_SEPARATOR};
