use crate::services::SyncComponents;
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct UpdateTokenRequest {
    #[serde(default)]
    pub user_id: i32,
    #[serde(default)]
    pub fcm_token: String,
}

/// Register or replace the push token of a user.
///
/// Mounted on both `/update-token` and `/update-token/`.
pub async fn update_token(
    components: web::Data<SyncComponents>,
    body: web::Json<UpdateTokenRequest>,
) -> impl Responder {
    let body = body.into_inner();
    let token = body.fcm_token.trim();

    if body.user_id == 0 || token.is_empty() {
        return HttpResponse::BadRequest().body("User ID and Token required");
    }

    match components.directory.set_push_token(body.user_id, token).await {
        Ok(0) => HttpResponse::NotFound().body("User not found"),
        Ok(_) => {
            log::info!("Push token updated for user {}", body.user_id);
            HttpResponse::Ok().json(serde_json::json!({
                "status": "success",
                "message": "Token updated"
            }))
        }
        Err(e) => {
            log::error!("Failed to update push token for user {}: {}", body.user_id, e);
            HttpResponse::InternalServerError().body("Database error")
        }
    }
}
