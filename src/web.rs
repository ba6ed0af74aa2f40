use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer, Result};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::allocation::engine::{Allocation, Allocator};
use crate::allocation::types::Slot;
use crate::calendar::{CalendarData, CalendarSet};
use crate::config::AllocatorConfig;
use crate::display::{report_rows, schedule_rows, ReportRow, ScheduleRow};
use crate::roster::{Person, Roster};
use crate::writeback::MemoryWriteBack;

/// The last finished run, kept in memory.
pub struct LastRun {
    pub roster: Roster,
    pub allocation: Allocation,
}

pub struct AppState {
    pub last_run: Mutex<Option<LastRun>>,
    pub config: AllocatorConfig,
    pub admin_password: String,
}

impl AppState {
    pub fn new(config: AllocatorConfig, admin_password: String) -> Self {
        Self {
            last_run: Mutex::new(None),
            config,
            admin_password,
        }
    }
}

#[derive(Deserialize)]
pub struct AllocateRequest {
    people: Vec<Person>,
    slots: Vec<Slot>,
    #[serde(default)]
    calendars: CalendarData,
    /// Replaces the server's configuration for this run only.
    #[serde(default)]
    config: Option<AllocatorConfig>,
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    viable: usize,
    slots: Vec<ScheduleRow>,
}

#[derive(Serialize)]
pub struct ReportResponse {
    levels: Vec<u32>,
    people: Vec<ReportRow>,
}

fn is_admin(req: &HttpRequest, state: &AppState) -> bool {
    let password = req
        .headers()
        .get("X-Admin-Password")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    password == state.admin_password
}

fn lock_poisoned<T>(_: T) -> actix_web::Error {
    actix_web::error::ErrorInternalServerError("state lock poisoned")
}

fn schedule_response(run: &LastRun) -> ScheduleResponse {
    ScheduleResponse {
        viable: run.allocation.viable_count(),
        slots: schedule_rows(&run.roster, &run.allocation),
    }
}

// Runs an allocation from the request body and keeps the result
async fn allocate(
    req: HttpRequest,
    body: web::Json<AllocateRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if !is_admin(&req, &state) {
        warn!("Rejected allocation request with bad password");
        return Ok(HttpResponse::Unauthorized().json(serde_json::json!({"success": false, "error": "Unauthorized"})));
    }

    let AllocateRequest {
        people,
        slots,
        calendars,
        config,
    } = body.into_inner();
    let config = config.unwrap_or_else(|| state.config.clone());
    if let Err(e) = config.validate() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({"success": false, "error": e.to_string()})));
    }
    let calendars = match CalendarSet::from_data(calendars) {
        Ok(calendars) => calendars,
        Err(e) => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({"success": false, "error": e.to_string()})))
        }
    };

    let roster = Roster::new(people);
    let mut sink = MemoryWriteBack::default();
    let allocation = match Allocator::new(slots, &roster, &config).allocate(&calendars, &mut sink) {
        Ok(allocation) => allocation,
        Err(e) => {
            return Ok(HttpResponse::InternalServerError()
                .json(serde_json::json!({"success": false, "error": e.to_string()})))
        }
    };
    info!(viable = allocation.viable_count(), "Allocation finished over HTTP");

    let run = LastRun { roster, allocation };
    let response = schedule_response(&run);
    *state.last_run.lock().map_err(lock_poisoned)? = Some(run);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "outcomes": sink.outcomes,
        "schedule": response,
    })))
}

async fn get_schedule(state: web::Data<AppState>) -> Result<HttpResponse> {
    let last_run = state.last_run.lock().map_err(lock_poisoned)?;
    match last_run.as_ref() {
        Some(run) => Ok(HttpResponse::Ok().json(schedule_response(run))),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({"error": "No allocation has run yet"}))),
    }
}

async fn get_report(state: web::Data<AppState>) -> Result<HttpResponse> {
    let last_run = state.last_run.lock().map_err(lock_poisoned)?;
    match last_run.as_ref() {
        Some(run) => Ok(HttpResponse::Ok().json(ReportResponse {
            levels: run.allocation.levels.iter().map(|l| l.0).collect(),
            people: report_rows(&run.roster, &run.allocation),
        })),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({"error": "No allocation has run yet"}))),
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/allocate", web::post().to(allocate))
        .route("/api/schedule", web::get().to(get_schedule))
        .route("/api/report", web::get().to(get_report));
}

pub async fn start_server(port: u16, admin_password: String, config: AllocatorConfig) -> std::io::Result<()> {
    let app_state = web::Data::new(AppState::new(config, admin_password));

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
