//! Wire schema shared by the supervisor and every worker process: message
//! envelopes, shared-memory headers, per-worker tuning, health status, and
//! the settings façade boundary (spec.md §3, §4.G, §6).

pub mod error;
pub mod health;
pub mod message;
pub mod rss;
pub mod settings;
pub mod shm;
pub mod tuning;
pub mod worker;

pub use error::Error;
pub use health::HealthStatus;
pub use message::{MessageType, WorkerMessage, WorkerResponse};
pub use settings::{MapSettings, SettingsFacade};
pub use shm::{FftHeader, RgbaHeader, SharedMemoryHeader};
pub use tuning::{default_tuning, BackpressurePolicy, WorkerTuningConfig};
pub use worker::{WorkerKind, WorkerState};
