pub mod build_captions;
pub mod compose_video;
pub mod events;
pub mod fetch_media;
pub mod job_ledger;
pub mod wiring;
pub mod worker;
pub mod worker_inputs;

pub use build_captions::*;
pub use compose_video::*;
pub use events::*;
pub use fetch_media::*;
pub use job_ledger::*;
pub use wiring::*;
pub use worker::*;
pub use worker_inputs::*;
