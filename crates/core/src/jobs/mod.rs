//! Job records and their state machine.

pub mod pipeline;
pub mod service;

pub use service::*;

use std::{
    collections::HashMap,
    fmt,
    path::PathBuf,
    sync::RwLock,
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, TartilError},
    text::preview,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Downloading,
    GeneratingSubtitles,
    GeneratingVideo,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Progress hint reported while in this state. `Error` keeps whatever the
    /// job had reached.
    pub fn progress(&self) -> Option<u8> {
        match self {
            JobStatus::Downloading => Some(0),
            JobStatus::GeneratingSubtitles => Some(30),
            JobStatus::GeneratingVideo => Some(60),
            JobStatus::Completed => Some(100),
            JobStatus::Error => None,
        }
    }

    pub fn can_move_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Downloading, GeneratingSubtitles)
                | (GeneratingSubtitles, GeneratingVideo)
                | (GeneratingVideo, Completed)
                | (Downloading | GeneratingSubtitles | GeneratingVideo, Error)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Downloading => "downloading",
            JobStatus::GeneratingSubtitles => "generating_subtitles",
            JobStatus::GeneratingVideo => "generating_video",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    /// Preview of the submitted text.
    pub verse_text: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub output_path: Option<PathBuf>,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<String>, verse_text: &str) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Downloading,
            progress: 0,
            verse_text: preview(verse_text),
            started_at: Utc::now(),
            finished_at: None,
            output_path: None,
            download_url: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_move_to(next) {
            return Err(TartilError::InvalidTransition {
                job_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        if let Some(progress) = next.progress() {
            self.progress = self.progress.max(progress);
        }
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Shared job map with bounded retention.
///
/// Terminal jobs are evicted once older than the TTL, or oldest first when the
/// map grows past its capacity. Active jobs are never evicted.
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
    ttl: TimeDelta,
    capacity: usize,
}

impl JobStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            capacity: capacity.max(1),
        }
    }

    /// Insert a new job unless `max_active` non-terminal jobs already exist.
    pub fn admit(&self, job: Job, max_active: usize) -> Result<()> {
        let mut jobs = self.jobs.write().expect("JobStore poisoned");
        Self::evict(&mut jobs, Utc::now(), self.ttl, self.capacity);

        let active = jobs.values().filter(|j| !j.is_terminal()).count();
        if active >= max_active {
            return Err(TartilError::QueueFull {
                capacity: max_active,
            });
        }

        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.jobs.read().expect("JobStore poisoned").get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Job> {
        self.jobs.write().expect("JobStore poisoned").remove(id)
    }

    /// Move a job to the next non-terminal stage.
    pub fn advance(&self, id: &str, next: JobStatus) -> Result<Job> {
        self.update(id, |job| job.transition(next))
    }

    pub fn complete(&self, id: &str, output_path: PathBuf, download_url: String) -> Result<Job> {
        self.update(id, |job| {
            job.transition(JobStatus::Completed)?;
            job.output_path = Some(output_path);
            job.download_url = Some(download_url);
            Ok(())
        })
    }

    pub fn fail(&self, id: &str, message: impl Into<String>) -> Result<Job> {
        let message = message.into();
        self.update(id, |job| {
            job.transition(JobStatus::Error)?;
            job.error = Some(message);
            Ok(())
        })
    }

    pub fn len(&self) -> usize {
        self.jobs.read().expect("JobStore poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_count(&self) -> usize {
        self.jobs
            .read()
            .expect("JobStore poisoned")
            .values()
            .filter(|j| !j.is_terminal())
            .count()
    }

    // Works on a copy so a rejected transition leaves the record untouched.
    fn update(&self, id: &str, apply: impl FnOnce(&mut Job) -> Result<()>) -> Result<Job> {
        let mut jobs = self.jobs.write().expect("JobStore poisoned");
        let current = jobs
            .get(id)
            .ok_or_else(|| TartilError::JobNotFound(id.to_string()))?;

        let mut next = current.clone();
        apply(&mut next)?;
        jobs.insert(id.to_string(), next.clone());
        Ok(next)
    }

    fn evict(jobs: &mut HashMap<String, Job>, now: DateTime<Utc>, ttl: TimeDelta, capacity: usize) {
        jobs.retain(|_, job| match job.finished_at {
            Some(finished) if job.is_terminal() => now.signed_duration_since(finished) <= ttl,
            _ => true,
        });

        if jobs.len() <= capacity {
            return;
        }

        let mut terminal: Vec<(DateTime<Utc>, String)> = jobs
            .values()
            .filter(|j| j.is_terminal())
            .map(|j| (j.finished_at.unwrap_or(j.started_at), j.id.clone()))
            .collect();
        terminal.sort();

        let excess = jobs.len() - capacity;
        for (_, id) in terminal.into_iter().take(excess) {
            jobs.remove(&id);
        }
    }

    #[cfg(test)]
    fn evict_at(&self, now: DateTime<Utc>) {
        let mut jobs = self.jobs.write().expect("JobStore poisoned");
        Self::evict(&mut jobs, now, self.ttl, self.capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> JobStore {
        JobStore::new(Duration::from_secs(60), 100)
    }

    #[test]
    fn test_new_job_starts_downloading() {
        let job = Job::new("ab12cd34", &"ب".repeat(80));
        assert_eq!(job.status, JobStatus::Downloading);
        assert_eq!(job.progress, 0);
        assert!(job.verse_text.ends_with("..."));
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn test_happy_path_progress() {
        let store = store();
        store.admit(Job::new("j1", "text"), 8).unwrap();

        assert_eq!(store.advance("j1", JobStatus::GeneratingSubtitles).unwrap().progress, 30);
        assert_eq!(store.advance("j1", JobStatus::GeneratingVideo).unwrap().progress, 60);

        let done = store
            .complete("j1", PathBuf::from("/out/j1.mp4"), "/api/download/j1.mp4".to_string())
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 100);
        assert!(done.finished_at.is_some());
        assert_eq!(done.download_url.as_deref(), Some("/api/download/j1.mp4"));
    }

    #[test]
    fn test_failure_freezes_progress() {
        let store = store();
        store.admit(Job::new("j1", "text"), 8).unwrap();
        store.advance("j1", JobStatus::GeneratingSubtitles).unwrap();

        let failed = store.fail("j1", "video generation failed").unwrap();
        assert_eq!(failed.status, JobStatus::Error);
        assert_eq!(failed.progress, 30);
        assert_eq!(failed.error.as_deref(), Some("video generation failed"));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let store = store();
        store.admit(Job::new("j1", "text"), 8).unwrap();
        store.fail("j1", "boom").unwrap();

        let err = store.advance("j1", JobStatus::GeneratingSubtitles).unwrap_err();
        assert!(matches!(err, TartilError::InvalidTransition { .. }));
        assert!(store.fail("j1", "again").is_err());
        assert_eq!(store.get("j1").unwrap().error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_stages_cannot_be_skipped() {
        assert!(!JobStatus::Downloading.can_move_to(JobStatus::GeneratingVideo));
        assert!(!JobStatus::Downloading.can_move_to(JobStatus::Completed));
        assert!(!JobStatus::GeneratingVideo.can_move_to(JobStatus::GeneratingSubtitles));
        assert!(JobStatus::GeneratingVideo.can_move_to(JobStatus::Error));
    }

    #[test]
    fn test_unknown_job_is_reported() {
        let err = store().advance("missing", JobStatus::GeneratingVideo).unwrap_err();
        assert!(matches!(err, TartilError::JobNotFound(_)));
    }

    #[test]
    fn test_admission_counts_only_active_jobs() {
        let store = store();
        store.admit(Job::new("a", "t"), 2).unwrap();
        store.admit(Job::new("b", "t"), 2).unwrap();

        let err = store.admit(Job::new("c", "t"), 2).unwrap_err();
        assert!(matches!(err, TartilError::QueueFull { capacity: 2 }));
        assert!(store.get("c").is_none());

        store.fail("a", "boom").unwrap();
        store.admit(Job::new("c", "t"), 2).unwrap();
        assert_eq!(store.active_count(), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_expired_terminal_jobs_are_evicted() {
        let store = store();
        store.admit(Job::new("done", "t"), 8).unwrap();
        store.admit(Job::new("running", "t"), 8).unwrap();
        store.fail("done", "boom").unwrap();

        store.evict_at(Utc::now() + TimeDelta::hours(1));
        assert!(store.get("done").is_none());
        assert!(store.get("running").is_some());
    }

    #[test]
    fn test_capacity_evicts_oldest_terminal_first() {
        let store = JobStore::new(Duration::from_secs(3600), 2);
        for id in ["old", "new"] {
            store.admit(Job::new(id, "t"), 8).unwrap();
            store.fail(id, "boom").unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }
        store.admit(Job::new("active", "t"), 8).unwrap();

        // Admission evicts before inserting, so the third record pushes one out
        // only on the next pass.
        store.evict_at(Utc::now());
        assert_eq!(store.len(), 2);
        assert!(store.get("old").is_none());
        assert!(store.get("new").is_some());
        assert!(store.get("active").is_some());
    }

    #[test]
    fn test_active_jobs_survive_any_eviction() {
        let store = JobStore::new(Duration::from_secs(1), 1);
        for id in ["a", "b", "c"] {
            store.admit(Job::new(id, "t"), 8).unwrap();
        }
        store.evict_at(Utc::now() + TimeDelta::days(365));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_value(JobStatus::GeneratingSubtitles).unwrap();
        assert_eq!(json, "generating_subtitles");
        assert_eq!(JobStatus::GeneratingVideo.to_string(), "generating_video");
    }
}
