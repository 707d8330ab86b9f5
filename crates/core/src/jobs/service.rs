use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    catalog::{AlQuranCloud, DEFAULT_RECITER, ScriptureCatalog},
    config::{RenderConfig, ServiceConfig},
    error::{Result, TartilError},
    events::BusConfig,
    fetch::{HttpFetcher, MediaFetcher},
    jobs::{
        Job, JobStore,
        pipeline::{PipelineHandle, PipelineParts, start_pipeline},
    },
    media::{FfmpegTool, MediaTool},
    workers::{JobSpec, JobSubmitted},
    workspace::{Workspace, sanitize_output_name},
};

/// Rough wall-clock estimate handed back to callers, in seconds.
pub const ESTIMATED_SECONDS: u64 = 120;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub verse_text: String,
    pub audio_url: String,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub output_name: Option<String>,
    #[serde(default)]
    pub config: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AyahRequest {
    pub surah: u32,
    pub ayah: u32,
    #[serde(default)]
    pub reciter: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub output_name: Option<String>,
    #[serde(default)]
    pub config: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTicket {
    pub job_id: String,
    pub status_url: String,
    pub estimated_time: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
    pub jobs_count: usize,
}

/// External collaborators of the pipeline.
pub struct Collaborators {
    pub media: Arc<dyn MediaTool>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub catalog: Arc<dyn ScriptureCatalog>,
}

impl Collaborators {
    /// ffmpeg, reqwest and alquran.cloud.
    pub fn production(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            media: Arc::new(FfmpegTool::new(config)),
            fetcher: Arc::new(HttpFetcher::new(config.download_timeout)?),
            catalog: Arc::new(AlQuranCloud::new(config.download_timeout)?),
        })
    }
}

/// Submit, poll and fetch entry points over a running pipeline.
pub struct JobService {
    config: ServiceConfig,
    workspace: Workspace,
    store: Arc<JobStore>,
    catalog: Arc<dyn ScriptureCatalog>,
    pipeline: PipelineHandle,
}

impl JobService {
    pub async fn start(config: ServiceConfig) -> Result<Self> {
        let collaborators = Collaborators::production(&config)?;
        Self::start_with(config, collaborators).await
    }

    pub async fn start_with(config: ServiceConfig, collaborators: Collaborators) -> Result<Self> {
        let workspace = Workspace::new(&config.root_dir);
        workspace.prepare().await?;

        let store = Arc::new(JobStore::new(config.job_ttl, config.max_retained_jobs));
        let pipeline = start_pipeline(
            BusConfig::default(),
            PipelineParts {
                store: Arc::clone(&store),
                media: collaborators.media,
                fetcher: collaborators.fetcher,
                workspace: workspace.clone(),
                download_prefix: config.download_prefix.clone(),
                capacity: config.max_pending_jobs,
            },
        )?;

        tracing::info!(root = %workspace.root().display(), "job service ready");

        Ok(Self {
            config,
            workspace,
            store,
            catalog: collaborators.catalog,
            pipeline,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Validate and enqueue a render. Returns as soon as the job is queued.
    pub fn submit(&self, request: SubmitRequest) -> Result<JobTicket> {
        let verse_text = request.verse_text.trim();
        let audio_url = request.audio_url.trim();
        if verse_text.is_empty() {
            return Err(TartilError::Validation("verse_text is required".to_string()));
        }
        if audio_url.is_empty() {
            return Err(TartilError::Validation("audio_url is required".to_string()));
        }

        let config = RenderConfig::merged(&request.config)?;

        let job_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let audio = self.workspace.resolve_audio(audio_url, &job_id)?;
        let background = self
            .workspace
            .resolve_background(request.background.as_deref(), &job_id)?;
        let output_name = sanitize_output_name(
            request.output_name.as_deref().unwrap_or(&job_id),
            &job_id,
        );

        self.store
            .admit(Job::new(&job_id, verse_text), self.config.max_pending_jobs)?;

        let spec = JobSpec {
            job_id: job_id.clone(),
            verse_text: verse_text.to_string(),
            audio,
            background,
            output_name,
            config,
        };
        if !self.pipeline.bus.publish(Arc::new(JobSubmitted::new(spec))) {
            self.store.remove(&job_id);
            return Err(TartilError::QueueFull {
                capacity: self.config.max_pending_jobs,
            });
        }

        tracing::info!(%job_id, "job queued");
        Ok(JobTicket {
            status_url: format!("/api/status/{job_id}"),
            job_id,
            estimated_time: ESTIMATED_SECONDS,
        })
    }

    /// Look the verse up in the catalog and render it with its recitation.
    pub async fn submit_ayah(&self, request: AyahRequest) -> Result<JobTicket> {
        if request.surah == 0 || request.ayah == 0 {
            return Err(TartilError::Validation(
                "surah and ayah are required".to_string(),
            ));
        }

        let config = RenderConfig::merged(&request.config)?;
        let verse_text = self.catalog.verse_text(request.surah, request.ayah).await?;
        let reciter = [request.reciter.as_deref(), Some(config.reciter.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|r| !r.is_empty())
            .unwrap_or(DEFAULT_RECITER);
        let audio_url = self
            .catalog
            .recitation_url(reciter, request.surah, request.ayah);

        self.submit(SubmitRequest {
            verse_text,
            audio_url,
            background: request.background,
            output_name: Some(
                request
                    .output_name
                    .unwrap_or_else(|| format!("surah_{}_ayah_{}", request.surah, request.ayah)),
            ),
            config: request.config,
        })
    }

    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.store.get(job_id)
    }

    /// Bytes of a rendered video, by file name (`<output_name>.mp4`).
    pub async fn read_output(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.workspace.output_file(filename)?;
        Ok(tokio::fs::read(path).await?)
    }

    pub fn health(&self) -> Health {
        Health {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            jobs_count: self.store.len(),
        }
    }

    /// Stop the stage workers. Jobs still in flight stay in their last state.
    pub async fn shutdown(self) {
        let _ = self.pipeline.shutdown_tx.send(());
        for task in self.pipeline.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "worker exited with error"),
                Err(e) => tracing::warn!(error = %e, "worker task panicked"),
            }
        }
        tracing::info!("job service stopped");
    }
}
