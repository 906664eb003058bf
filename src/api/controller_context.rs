use std::collections::HashMap;

use actix_web::{web, HttpRequest};
use uuid::Uuid;

use crate::{
    constants,
    error::{ServiceError, ServiceResult},
    models::fiscal_document::{DocumentFilter, DocumentStatus},
    services::nfe_document_service::PaginationParams,
};

/// The caller, as identified by the upstream authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserContext {
    user_id: Uuid,
}

impl UserContext {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }

    pub fn from_request(req: &HttpRequest) -> ServiceResult<Self> {
        req.headers()
            .get(constants::USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(Self::new)
            .ok_or_else(|| {
                ServiceError::bad_request(constants::MESSAGE_USER_HEADER_MISSING)
                    .with_context(|ctx| ctx.with_tag("auth").with_metadata("header", constants::USER_ID_HEADER))
            })
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }
}

/// Listing query string: `limit`, `offset`, `company_id`, `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationContext {
    params: PaginationParams,
    filter: DocumentFilter,
}

impl PaginationContext {
    pub fn from_query_map(query: &HashMap<String, String>) -> ServiceResult<Self> {
        let params = PaginationParams::from_query(
            query.get("limit").map(String::as_str),
            query.get("offset").map(String::as_str),
        );

        let company_id = query
            .get("company_id")
            .map(|raw| {
                Uuid::parse_str(raw.trim()).map_err(|_| {
                    ServiceError::bad_request("company_id must be a UUID").with_metadata("field", "company_id")
                })
            })
            .transpose()?;
        let status = query
            .get("status")
            .map(|raw| {
                raw.trim().parse::<DocumentStatus>().map_err(|e| {
                    ServiceError::bad_request(e).with_metadata("field", "status")
                })
            })
            .transpose()?;

        Ok(Self {
            params,
            filter: DocumentFilter { company_id, status },
        })
    }

    pub fn pagination(&self) -> PaginationParams {
        self.params
    }

    pub fn filter(&self) -> &DocumentFilter {
        &self.filter
    }
}

/// Runs synchronous service code on the blocking thread pool.
pub async fn run_blocking<T, F>(f: F) -> ServiceResult<T>
where
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    web::block(f).await.map_err(|e| {
        log::error!("Blocking call failed: {}", e);
        ServiceError::internal_server_error(constants::MESSAGE_INTERNAL_SERVER_ERROR)
            .with_detail(e.to_string())
    })?
}
