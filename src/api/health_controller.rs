use actix_web::{web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;
use tokio::time::{timeout, Duration};

use crate::{api::AppState, config::db::Pool, constants, error::ServiceError, models::response::ResponseBody};

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Healthy,
    Unhealthy,
}

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: Status,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<Status>,
}

fn check_database_health(pool: &Pool) -> Result<(), String> {
    let mut conn = pool.get().map_err(|e| e.to_string())?;
    diesel::sql_query("SELECT 1")
        .execute(&mut conn)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

async fn database_status(pool: Pool) -> Status {
    let check = tokio::task::spawn_blocking(move || check_database_health(&pool));
    match timeout(Duration::from_secs(5), check).await {
        Ok(Ok(Ok(()))) => Status::Healthy,
        Ok(Ok(Err(e))) => {
            log::error!("Database health check failed: {}", e);
            Status::Unhealthy
        }
        Ok(Err(e)) => {
            log::error!("Database health check task failed: {}", e);
            Status::Unhealthy
        }
        Err(_) => {
            log::error!("Database health check timeout");
            Status::Unhealthy
        }
    }
}

// GET api/health
pub async fn health(state: web::Data<AppState>) -> Result<HttpResponse, ServiceError> {
    log::debug!("Health check requested");
    let database = match state.pool.clone() {
        Some(pool) => Some(database_status(pool).await),
        None => None,
    };
    let status = if database == Some(Status::Unhealthy) {
        Status::Unhealthy
    } else {
        Status::Healthy
    };

    let body = ResponseBody::new(
        constants::MESSAGE_OK,
        HealthResponse {
            status,
            timestamp: Utc::now().to_rfc3339(),
            database,
        },
    );
    Ok(match status {
        Status::Healthy => HttpResponse::Ok().json(body),
        Status::Unhealthy => HttpResponse::ServiceUnavailable().json(body),
    })
}
