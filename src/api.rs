//! API server for contact-harvester.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::harvester::Harvester;
use crate::history::{JobHistory, JsonlHistory, NoopHistory};
use crate::input::{parse_url_list, validate_batch};
use crate::jobs::{JobStore, run_job};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Largest accepted upload body.
const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub harvester: Arc<Harvester>,
    pub jobs: Arc<JobStore>,
    pub history: Arc<dyn JobHistory>,
}

impl AppState {
    pub fn new(config: Config, harvester: Harvester, history: Arc<dyn JobHistory>) -> Self {
        let jobs = Arc::new(JobStore::new(config.job_ttl, config.max_jobs));
        Self {
            config: Arc::new(config),
            harvester: Arc::new(harvester),
            jobs,
            history,
        }
    }
}

/// Identity and entitlement of the caller, as supplied by the auth layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Caller {
    pub user_id: Option<i64>,
    /// Per-caller batch cap; the configured default applies when absent.
    pub scrape_limit: Option<usize>,
}

#[derive(Deserialize)]
struct ManualRequest {
    urls: Vec<String>,
}

#[derive(Deserialize)]
struct UploadQuery {
    filename: String,
}

#[derive(Serialize)]
struct SubmitResponse {
    success: bool,
    job_id: String,
    message: String,
    total_urls: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct ApiResponse {
    success: bool,
    message: String,
}

fn error_reply(status: StatusCode, message: impl Into<String>) -> Response {
    warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            error: message.into(),
        }),
        status,
    )
    .into_response()
}

fn app_error_reply(err: &AppError) -> Response {
    let status = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        match err {
            AppError::JobNotFound(_) | AppError::ResultsNotReady(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    };
    error_reply(status, err.to_string())
}

/// Validates a batch, registers a job and starts it in the background.
///
/// Returns the job id and the number of URLs accepted. Nothing is created
/// when validation fails.
pub fn submit_batch(state: &AppState, caller: Caller, urls: Vec<String>) -> Result<(String, usize)> {
    let limit = caller
        .scrape_limit
        .unwrap_or(state.config.max_urls_per_batch);
    let targets = validate_batch(urls, limit)?;
    let total = targets.len();

    let handle = state.jobs.create(total, caller.user_id);
    let job_id = handle.job_id();

    let harvester = Arc::clone(&state.harvester);
    let history = Arc::clone(&state.history);
    let workers = state.config.workers;
    let results_dir = state.config.results_dir.clone();
    tokio::spawn(async move {
        run_job(handle, targets, harvester, workers, &results_dir, history).await;
    });

    Ok((job_id, total))
}

fn submit_reply(state: &AppState, caller: Caller, urls: Vec<String>) -> Response {
    match submit_batch(state, caller, urls) {
        Ok((job_id, total_urls)) => warp::reply::with_status(
            warp::reply::json(&SubmitResponse {
                success: true,
                job_id,
                message: "Scraping job started".to_string(),
                total_urls,
            }),
            StatusCode::ACCEPTED,
        )
        .into_response(),
        Err(e) => {
            tracing::info!("Rejected batch: {}", e);
            app_error_reply(&e)
        }
    }
}

async fn handle_manual(
    request: ManualRequest,
    caller: Caller,
    state: AppState,
) -> std::result::Result<Response, Rejection> {
    tracing::info!("Manual batch of {} URLs", request.urls.len());
    Ok(submit_reply(&state, caller, request.urls))
}

async fn handle_upload(
    query: UploadQuery,
    body: Bytes,
    caller: Caller,
    state: AppState,
) -> std::result::Result<Response, Rejection> {
    tracing::info!("Upload '{}' ({} bytes)", query.filename, body.len());
    match parse_url_list(&query.filename, &body) {
        Ok(urls) => Ok(submit_reply(&state, caller, urls)),
        Err(e) => Ok(app_error_reply(&e)),
    }
}

async fn handle_job_status(job_id: String, state: AppState) -> std::result::Result<Response, Rejection> {
    match state.jobs.snapshot(&job_id) {
        Some(snapshot) => Ok(warp::reply::json(&snapshot).into_response()),
        None => Ok(app_error_reply(&AppError::JobNotFound(job_id))),
    }
}

async fn handle_list_jobs(state: AppState) -> std::result::Result<Response, Rejection> {
    Ok(warp::reply::json(&state.jobs.list()).into_response())
}

async fn handle_results(job_id: String, state: AppState) -> std::result::Result<Response, Rejection> {
    match state.jobs.results(&job_id) {
        Ok(results) => Ok(warp::reply::json(&results).into_response()),
        Err(e) => Ok(app_error_reply(&e)),
    }
}

async fn handle_download(job_id: String, state: AppState) -> std::result::Result<Response, Rejection> {
    let path = match state.jobs.result_file(&job_id) {
        Ok(path) => path,
        Err(e) => return Ok(app_error_reply(&e)),
    };
    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::error!("Cannot read result file {}: {}", path.display(), e);
            return Ok(error_reply(StatusCode::NOT_FOUND, "Result file not found"));
        }
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("scrape_results_{}.csv", job_id));

    let reply = warp::reply::with_header(content, "content-type", "text/csv; charset=utf-8");
    let reply = warp::reply::with_header(
        reply,
        "content-disposition",
        format!("attachment; filename=\"{}\"", file_name),
    );
    Ok(reply.into_response())
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn with_caller() -> impl Filter<Extract = (Caller,), Error = Rejection> + Clone {
    warp::header::optional::<i64>("x-user-id")
        .and(warp::header::optional::<usize>("x-scrape-limit"))
        .map(|user_id, scrape_limit| Caller {
            user_id,
            scrape_limit,
        })
}

/// All API routes, with rejections turned into JSON errors.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health").and(warp::get()).map(|| {
        warp::reply::json(&ApiResponse {
            success: true,
            message: "Contact Harvester API is running".to_string(),
        })
    });

    let manual = warp::path!("api" / "manual")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_caller())
        .and(with_state(state.clone()))
        .and_then(handle_manual);

    let upload = warp::path!("api" / "upload")
        .and(warp::post())
        .and(warp::query::<UploadQuery>())
        .and(warp::body::content_length_limit(MAX_UPLOAD_BYTES))
        .and(warp::body::bytes())
        .and(with_caller())
        .and(with_state(state.clone()))
        .and_then(handle_upload);

    let job_status = warp::path!("api" / "jobs" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_job_status);

    let list_jobs = warp::path!("api" / "jobs")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_list_jobs);

    let results = warp::path!("api" / "results" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_results);

    let download = warp::path!("api" / "download" / String)
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_download);

    health
        .or(manual)
        .or(upload)
        .or(job_status)
        .or(list_jobs)
        .or(results)
        .or(download)
        .recover(handle_rejection)
}

/// Start the API server
pub async fn start_api_server(config: Config) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.results_dir)?;

    let harvester = Harvester::new(&config)?;
    let history: Arc<dyn JobHistory> = match &config.history_file {
        Some(path) => {
            tracing::info!("Recording job history in {}", path.display());
            Arc::new(JsonlHistory::new(path))
        }
        None => Arc::new(NoopHistory),
    };
    let port = config.port;
    let state = AppState::new(config, harvester, history);

    let routes = routes(state).with(warp::cors().allow_any_origin());

    tracing::info!("Starting API server on port {}", port);
    warp::serve(routes).run(([0, 0, 0, 0], port)).await;

    Ok(())
}

/// Handle API rejections
pub async fn handle_rejection(err: Rejection) -> std::result::Result<Response, Infallible> {
    if err.is_not_found() {
        Ok(error_reply(StatusCode::NOT_FOUND, "Not Found"))
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        Ok(error_reply(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e)))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        Ok(error_reply(StatusCode::PAYLOAD_TOO_LARGE, "Uploaded file is too large"))
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        Ok(error_reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"))
    } else {
        tracing::debug!("Rejected request: {:?}", err);
        Ok(error_reply(StatusCode::BAD_REQUEST, "Bad request"))
    }
}
