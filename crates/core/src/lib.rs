pub mod captions;
pub mod catalog;
pub mod compose;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod format;
pub mod jobs;
pub mod media;
pub mod queues;
pub mod routes;
pub mod telemetry;
pub mod text;
pub mod timeline;
pub mod types;
pub mod workers;
pub mod workspace;

pub use captions::{StyleSheet, SubtitleDocument, Theme};
pub use catalog::{AlQuranCloud, DEFAULT_RECITER, ScriptureCatalog};
pub use compose::{CompositionInputs, EncodePlan, Strategy};
pub use config::{QualityPreset, ReciterPosition, RenderConfig, Resolution, ServiceConfig};
pub use error::{Result, TartilError};
pub use fetch::{HttpFetcher, MediaFetcher};
pub use format::{ass_time, parse_ass_time};
pub use jobs::{
    AyahRequest, Collaborators, Health, Job, JobService, JobStatus, JobStore, JobTicket,
    SubmitRequest,
};
pub use media::{FfmpegTool, MediaTool};
pub use text::CleanPolicy;
pub use types::{CaptionUnit, Timeline};
pub use workspace::{MediaSource, Workspace};
