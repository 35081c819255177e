use crate::{
    models::TelemetrySample,
    services::{SyncComponents, live_sync::SyncError},
};
use actix_web::{HttpResponse, Responder, get, post, web};
use serde::Deserialize;

/// Reading pushed directly by a device
#[derive(Deserialize, Debug)]
pub struct IotInputRequest {
    pub user_id: i32,
    pub device_label: String,
    pub voltase: f64,
    pub ampere: f64,
    pub watt: f64,
}

#[derive(Deserialize, Debug)]
pub struct CommandQuery {
    pub device_label: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ManualSyncQuery {
    pub user_id: Option<i32>,
    pub device_label: Option<String>,
}

fn sync_error_response(err: &SyncError) -> HttpResponse {
    HttpResponse::InternalServerError().body(err.to_string())
}

/// Reconcile a reading posted by a device and notify on transitions
#[post("/input")]
pub async fn iot_input(
    components: web::Data<SyncComponents>,
    body: web::Json<IotInputRequest>,
) -> impl Responder {
    let body = body.into_inner();

    if body.device_label.trim().is_empty() {
        return HttpResponse::BadRequest().body("device_label is required");
    }

    let sample = TelemetrySample::new(body.ampere, body.watt, body.voltase);
    if let Err(msg) = sample.validate() {
        return HttpResponse::BadRequest().body(msg);
    }

    let live_sync = components.engine.live_sync();
    match live_sync
        .sync_detached(body.user_id, body.device_label, sample)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "device_status": outcome.status
        })),
        Err(e) => sync_error_response(&e),
    }
}

/// Command polling for devices. Remote commands are not supported yet, so
/// the answer is always NONE.
#[get("/command")]
pub async fn iot_command(query: web::Query<CommandQuery>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "command": "NONE",
        "device_label": query.device_label.clone().unwrap_or_default()
    }))
}

/// Fetch the sensor once and sync it for a single user
#[get("/sync")]
pub async fn manual_sync(
    components: web::Data<SyncComponents>,
    query: web::Query<ManualSyncQuery>,
) -> impl Responder {
    let engine = &components.engine;
    let user_id = query.user_id.unwrap_or_else(|| engine.default_user_id());
    let device_label = query
        .device_label
        .clone()
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| engine.device_label().to_string());

    let sample = match engine.source().fetch().await {
        Ok(sample) => sample,
        Err(e) => {
            log::error!("Manual sync fetch failed: {}", e);
            return HttpResponse::BadGateway().body(e.to_string());
        }
    };

    match engine
        .live_sync()
        .sync_detached(user_id, device_label.clone(), sample)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "user_id": user_id,
            "device_label": device_label,
            "device_status": outcome.status,
            "notified": outcome.notified()
        })),
        Err(e) => sync_error_response(&e),
    }
}
