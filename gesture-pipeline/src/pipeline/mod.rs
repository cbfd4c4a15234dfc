//! Pipeline Plumbing
//!
//! - `channel`: Bounded SPSC channels between tasks
//! - `history`: Sample history ring
//! - `stage`: Per-sample processing (history, fusion, features, classifier)
//! - `runtime`: Thread wiring and lifecycle

pub mod channel;
pub mod history;
pub mod runtime;
pub mod stage;

pub use channel::{bounded, ChannelSnapshot, ChannelStats, Receiver, Sender};
pub use history::{HistoryBuffer, HistoryStats};
pub use runtime::{PipelineBuilder, PipelineHandle, PipelineStats};
pub use stage::{ProcessingStage, StageStats};
