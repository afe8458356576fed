//! The adaptive per-display render timer and the multi-display transition
//! readiness barrier (spec.md §4.E, §4.F).

pub mod barrier;
pub mod error;
pub mod metrics;
pub mod state;
pub mod timer;

pub use barrier::TransitionBarrier;
pub use error::Error;
pub use metrics::RenderTimerMetrics;
pub use state::RenderState;
pub use timer::{AdaptiveRenderTimer, DEFAULT_TARGET_FPS, PAUSED_IDLE_TIMEOUT};
