//! Thin HTTP facade (§4.L, §6): the minimal invocation surface an external
//! form/template layer sits behind. Form parsing and rendered status pages
//! are out of scope here — this module only submits jobs and serves their
//! status/result.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::jobs::{JobRequest, JobRunner};

#[derive(Clone)]
pub struct FacadeState {
    pub runner: Arc<JobRunner>,
    /// Static content read once at start-up from the configured index-message
    /// file (§6). Rendering it into a page is the template layer's job; this
    /// facade only hands the raw content back.
    pub index_message: Arc<str>,
}

pub fn router(runner: Arc<JobRunner>, index_message: String) -> Router {
    Router::new()
        .route("/", get(get_index_message))
        .route("/jobs/path", post(submit_path))
        .route("/jobs/spider", post(submit_spider))
        .route("/jobs/:id", get(get_job_status))
        .route("/jobs/:id/finished", get(get_job_finished))
        .route("/jobs/:id/download", get(download_result))
        .layer(TraceLayer::new_for_http())
        .with_state(FacadeState {
            runner,
            index_message: index_message.into(),
        })
}

async fn get_index_message(State(state): State<FacadeState>) -> Response {
    (StatusCode::OK, state.index_message.to_string()).into_response()
}

#[derive(Debug, Deserialize)]
pub struct PathJobBody {
    pub sets: BTreeMap<String, std::collections::BTreeSet<String>>,
    #[serde(rename = "hopBudget")]
    pub hop_budget: u32,
}

#[derive(Debug, Deserialize)]
pub struct SpiderJobBody {
    pub seeds: std::collections::BTreeSet<String>,
    #[serde(rename = "stepBudget")]
    pub step_budget: u32,
}

async fn submit_path(State(state): State<FacadeState>, Json(body): Json<PathJobBody>) -> Response {
    let request = JobRequest::Path {
        sets: body.sets,
        hop_budget: body.hop_budget,
    };
    submit(state, request)
}

async fn submit_spider(
    State(state): State<FacadeState>,
    Json(body): Json<SpiderJobBody>,
) -> Response {
    let request = JobRequest::Spider {
        seeds: body.seeds,
        step_budget: body.step_budget,
    };
    submit(state, request)
}

fn submit(state: FacadeState, request: JobRequest) -> Response {
    match state.runner.submit(request) {
        Ok(id) => Redirect::to(&format!("/jobs/{id}")).into_response(),
        Err(e) => (e.status_code(), e.to_string()).into_response(),
    }
}

#[derive(Debug, Serialize)]
struct JobStatusBody {
    id: String,
    state: String,
    message: Option<String>,
    error: Option<String>,
}

async fn get_job_status(State(state): State<FacadeState>, AxumPath(id): AxumPath<String>) -> Response {
    match state.runner.get_job(&id) {
        Ok(job) => Json(JobStatusBody {
            id: job.id,
            state: format!("{:?}", job.progress.state),
            message: job.message,
            error: job.error.map(|e| e.message),
        })
        .into_response(),
        Err(e) => (e.status_code(), e.to_string()).into_response(),
    }
}

async fn get_job_finished(
    State(state): State<FacadeState>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    match state.runner.is_job_finished(&id) {
        Ok(finished) => Json(finished).into_response(),
        Err(e) => (e.status_code(), e.to_string()).into_response(),
    }
}

async fn download_result(
    State(state): State<FacadeState>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    let job = match state.runner.get_job(&id) {
        Ok(job) => job,
        Err(e) => return (e.status_code(), e.to_string()).into_response(),
    };
    let Some(result_file) = job.result_file else {
        return (StatusCode::NOT_FOUND, "job has no result file").into_response();
    };
    match tokio::fs::read(&result_file).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            )],
            bytes,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "result file missing").into_response(),
    }
}
