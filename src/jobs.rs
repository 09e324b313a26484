//! Async job runner (§4.J): job lifecycle, concurrent submission,
//! thread-safe status, result persistence.
//!
//! The job map and the in-flight counter are guarded by **separate** locks,
//! per the concurrency design note — a transition that both mutates a job
//! and decrements the counter must never hold both at once, to avoid a
//! lock-order inversion.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorReport, MeshlinkError};
use crate::export::{build_path_rows, build_spider_rows, ExportConfig, ExportSink};
use crate::pathfinder::find_connections;
use crate::spider::spider;
use crate::store::{BipartiteStore, UnipartiteStore};

pub const INVALID_JOB_ID: &str = "invalid-guid";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobState {
    NotStarted,
    InProgress,
    CompleteResults,
    CompleteNoResults,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::CompleteResults | JobState::CompleteNoResults | JobState::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub state: JobState,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// What kind of query a job runs, and its parameters (§4.J submission).
#[derive(Debug, Clone)]
pub enum JobRequest {
    Path {
        sets: BTreeMap<String, std::collections::BTreeSet<String>>,
        hop_budget: u32,
    },
    Spider {
        seeds: std::collections::BTreeSet<String>,
        step_budget: u32,
    },
}

impl JobRequest {
    fn validate(&self) -> Result<(), MeshlinkError> {
        match self {
            JobRequest::Path { sets, hop_budget } => {
                if sets.is_empty() || sets.values().any(|s| s.is_empty()) {
                    return Err(MeshlinkError::ConfigInvalid(
                        "entity sets must be non-empty".to_string(),
                    ));
                }
                if !(1..=5).contains(hop_budget) {
                    return Err(MeshlinkError::ConfigInvalid(
                        "hop budget must be in [1, 5]".to_string(),
                    ));
                }
            }
            JobRequest::Spider { seeds, step_budget } => {
                if !(0..=3).contains(step_budget) {
                    return Err(MeshlinkError::ConfigInvalid(
                        "step budget must be in [0, 3]".to_string(),
                    ));
                }
                if seeds.is_empty() || seeds.iter().any(|s| s.trim().is_empty()) {
                    return Err(MeshlinkError::ConfigInvalid(
                        "seeds must be non-empty, printable ids".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub progress: Progress,
    pub result_file: Option<PathBuf>,
    pub message: Option<String>,
    pub error: Option<ErrorReport>,
}

pub struct JobRunner {
    bipartite: Arc<dyn BipartiteStore>,
    unipartite: Arc<dyn UnipartiteStore>,
    /// Loaded from the path-mode export-config file (§6); drives path job rows.
    export_config_path: ExportConfig,
    /// Loaded from the spider-mode export-config file (§6); drives spider job rows.
    export_config_spider: ExportConfig,
    sink: Arc<dyn ExportSink + Send + Sync>,
    output_folder: PathBuf,
    jobs: RwLock<BTreeMap<String, Job>>,
    in_flight: RwLock<usize>,
}

impl JobRunner {
    pub fn new(
        bipartite: Arc<dyn BipartiteStore>,
        unipartite: Arc<dyn UnipartiteStore>,
        export_config_path: ExportConfig,
        export_config_spider: ExportConfig,
        sink: Arc<dyn ExportSink + Send + Sync>,
        output_folder: PathBuf,
    ) -> Arc<Self> {
        Arc::new(JobRunner {
            bipartite,
            unipartite,
            export_config_path,
            export_config_spider,
            sink,
            output_folder,
            jobs: RwLock::new(BTreeMap::new()),
            in_flight: RwLock::new(0),
        })
    }

    pub fn in_flight_count(&self) -> usize {
        *self.in_flight.read()
    }

    /// Validates `request`, registers a `NotStarted` job, and schedules a
    /// worker task to execute it. Returns the assigned id, or the sentinel
    /// `"invalid-guid"` plus the validation error.
    pub fn submit(self: &Arc<Self>, request: JobRequest) -> Result<String, MeshlinkError> {
        if let Err(e) = request.validate() {
            return Err(e);
        }
        let id = Uuid::new_v4().to_string();
        let job = Job {
            id: id.clone(),
            progress: Progress {
                state: JobState::NotStarted,
                start_time: Utc::now(),
                end_time: None,
            },
            result_file: None,
            message: None,
            error: None,
        };
        self.jobs.write().insert(id.clone(), job);
        *self.in_flight.write() += 1;

        let runner = self.clone();
        let job_id = id.clone();
        tokio::spawn(async move {
            runner.execute(job_id, request).await;
        });

        Ok(id)
    }

    async fn execute(self: Arc<Self>, id: String, request: JobRequest) {
        self.transition(&id, |job| job.progress.state = JobState::InProgress);

        let outcome = self.run(&id, &request).await;

        match outcome {
            Ok(RowOutcome::Empty) => {
                self.transition(&id, |job| {
                    job.progress.state = JobState::CompleteNoResults;
                    job.progress.end_time = Some(Utc::now());
                    job.message = Some("no results".to_string());
                });
            }
            Ok(RowOutcome::Written(path)) => {
                self.transition(&id, |job| {
                    job.progress.state = JobState::CompleteResults;
                    job.progress.end_time = Some(Utc::now());
                    job.result_file = Some(path);
                });
            }
            Err(e) => {
                self.transition(&id, |job| {
                    job.progress.state = JobState::Failed;
                    job.progress.end_time = Some(Utc::now());
                    job.error = Some(ErrorReport::from(&e));
                });
            }
        }

        *self.in_flight.write() -= 1;
    }

    async fn run(&self, id: &str, request: &JobRequest) -> Result<RowOutcome, MeshlinkError> {
        match request {
            JobRequest::Path { sets, hop_budget } => {
                let connections = find_connections(self.unipartite.as_ref(), sets, *hop_budget)?;
                if connections.is_empty() {
                    return Ok(RowOutcome::Empty);
                }
                let set_order: Vec<String> = sets.keys().cloned().collect();
                let rows = build_path_rows(
                    &connections,
                    &set_order,
                    sets,
                    self.bipartite.as_ref(),
                    &self.export_config_path,
                )?;
                if rows.is_empty() {
                    return Ok(RowOutcome::Empty);
                }
                let path = self.result_path(id);
                self.sink.write_path_rows(&rows, &path)?;
                Ok(RowOutcome::Written(path))
            }
            JobRequest::Spider { seeds, step_budget } => {
                let result = spider(self.unipartite.as_ref(), seeds, *step_budget)?;
                if result.edges.is_empty() {
                    return Ok(RowOutcome::Empty);
                }
                let rows = build_spider_rows(&result, self.bipartite.as_ref(), &self.export_config_spider)?;
                let path = self.result_path(id);
                self.sink.write_spider_rows(&rows, &path)?;
                Ok(RowOutcome::Written(path))
            }
        }
    }

    /// `<output_folder>/<job-id>.xlsx` — the job's own assigned id, not a
    /// freshly minted one, so the download route can find the file by id.
    fn result_path(&self, id: &str) -> PathBuf {
        self.output_folder.join(format!("{id}.xlsx"))
    }

    fn transition(&self, id: &str, f: impl FnOnce(&mut Job)) {
        if let Some(job) = self.jobs.write().get_mut(id) {
            f(job);
        }
    }

    pub fn get_job(&self, id: &str) -> Result<Job, MeshlinkError> {
        self.jobs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| MeshlinkError::JobNotFound(id.to_string()))
    }

    pub fn is_job_finished(&self, id: &str) -> Result<bool, MeshlinkError> {
        Ok(self.get_job(id)?.progress.state.is_terminal())
    }
}

enum RowOutcome {
    Empty,
    Written(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entity;
    use crate::store::{MemoryBipartiteStore, MemoryUnipartiteStore};
    use std::collections::BTreeSet;

    struct NullSink;
    impl ExportSink for NullSink {
        fn write_path_rows(
            &self,
            _rows: &[crate::export::PathExportRow],
            path: &std::path::Path,
        ) -> Result<(), MeshlinkError> {
            std::fs::write(path, b"")?;
            Ok(())
        }
        fn write_spider_rows(
            &self,
            _rows: &[crate::export::SpiderExportRow],
            path: &std::path::Path,
        ) -> Result<(), MeshlinkError> {
            std::fs::write(path, b"")?;
            Ok(())
        }
    }

    fn runner(dir: &tempfile::TempDir) -> Arc<JobRunner> {
        let bipartite = Arc::new(MemoryBipartiteStore::new());
        for id in ["e1", "e2", "e3", "e4"] {
            bipartite.add_entity(Entity::new(id, "person")).unwrap();
        }
        let unipartite = Arc::new(MemoryUnipartiteStore::new());
        unipartite.add_undirected("e1", "e2").unwrap();
        unipartite.add_undirected("e1", "e3").unwrap();
        unipartite.add_undirected("e3", "e4").unwrap();
        JobRunner::new(
            bipartite,
            unipartite,
            ExportConfig::default(),
            ExportConfig::default(),
            Arc::new(NullSink),
            dir.path().to_path_buf(),
        )
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn rejects_invalid_hop_budget() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&dir);
        let mut sets = BTreeMap::new();
        sets.insert("A".to_string(), set(&["e1"]));
        sets.insert("B".to_string(), set(&["e4"]));
        let err = runner
            .submit(JobRequest::Path {
                sets,
                hop_budget: 6,
            })
            .unwrap_err();
        assert!(matches!(err, MeshlinkError::ConfigInvalid(_)));
    }

    #[tokio::test]
    async fn completes_with_no_results_when_hop_budget_too_small() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&dir);
        let mut sets = BTreeMap::new();
        sets.insert("A".to_string(), set(&["e1"]));
        sets.insert("B".to_string(), set(&["e4"]));
        let id = runner
            .submit(JobRequest::Path {
                sets,
                hop_budget: 1,
            })
            .unwrap();

        for _ in 0..200 {
            if runner.is_job_finished(&id).unwrap() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let job = runner.get_job(&id).unwrap();
        assert!(matches!(job.progress.state, JobState::CompleteNoResults));
    }

    #[tokio::test]
    async fn completes_with_results_when_path_exists() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&dir);
        let mut sets = BTreeMap::new();
        sets.insert("A".to_string(), set(&["e1"]));
        sets.insert("B".to_string(), set(&["e4"]));
        let id = runner
            .submit(JobRequest::Path {
                sets,
                hop_budget: 2,
            })
            .unwrap();

        for _ in 0..200 {
            if runner.is_job_finished(&id).unwrap() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let job = runner.get_job(&id).unwrap();
        assert!(matches!(job.progress.state, JobState::CompleteResults));
        assert!(job.result_file.is_some());
    }

    #[tokio::test]
    async fn result_file_name_matches_job_id() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&dir);
        let mut sets = BTreeMap::new();
        sets.insert("A".to_string(), set(&["e1"]));
        sets.insert("B".to_string(), set(&["e4"]));
        let id = runner
            .submit(JobRequest::Path {
                sets,
                hop_budget: 2,
            })
            .unwrap();

        for _ in 0..200 {
            if runner.is_job_finished(&id).unwrap() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let job = runner.get_job(&id).unwrap();
        let result_file = job.result_file.unwrap();
        assert_eq!(result_file, dir.path().join(format!("{id}.xlsx")));
    }

    #[tokio::test]
    async fn unknown_job_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&dir);
        let err = runner.get_job("nonexistent").unwrap_err();
        assert!(matches!(err, MeshlinkError::JobNotFound(_)));
    }
}
