use std::collections::HashMap;

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::{
    api::{
        controller_context::{run_blocking, PaginationContext, UserContext},
        AppState,
    },
    constants,
    error::ServiceError,
    models::{
        fiscal_document::dto::{CancelRequest, CreateDraftRequest, ItemRequest},
        response::ResponseBody,
    },
};

// POST api/nfes
pub async fn create_draft(
    state: web::Data<AppState>,
    payload: web::Json<CreateDraftRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, ServiceError> {
    let user = UserContext::from_request(&req)?;
    let request = payload.into_inner();
    let service = state.documents.clone();
    let view = run_blocking(move || service.create_draft(user.user_id(), request)).await?;
    Ok(HttpResponse::Created().json(ResponseBody::new(constants::MESSAGE_DRAFT_CREATED, view)))
}

// GET api/nfes
pub async fn list_documents(
    state: web::Data<AppState>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, ServiceError> {
    let context = PaginationContext::from_query_map(&query)?;
    let service = state.documents.clone();
    let documents =
        run_blocking(move || service.list_documents(context.filter(), context.pagination())).await?;
    Ok(HttpResponse::Ok().json(ResponseBody::new(constants::MESSAGE_OK, documents)))
}

// GET api/nfes/{id}
pub async fn get_document(state: web::Data<AppState>, id: web::Path<Uuid>) -> Result<HttpResponse, ServiceError> {
    let id = id.into_inner();
    let service = state.documents.clone();
    let view = run_blocking(move || service.get_document(id)).await?;
    Ok(HttpResponse::Ok().json(ResponseBody::new(constants::MESSAGE_OK, view)))
}

// PUT api/nfes/{id}/items
pub async fn replace_items(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
    payload: web::Json<Vec<ItemRequest>>,
) -> Result<HttpResponse, ServiceError> {
    let id = id.into_inner();
    let items = payload.into_inner();
    let service = state.documents.clone();
    let view = run_blocking(move || service.replace_draft_items(id, items)).await?;
    Ok(HttpResponse::Ok().json(ResponseBody::new(constants::MESSAGE_DRAFT_UPDATED, view)))
}

// POST api/nfes/{id}/authorize
pub async fn authorize(state: web::Data<AppState>, id: web::Path<Uuid>) -> Result<HttpResponse, ServiceError> {
    let document = state.documents.authorize(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseBody::new(constants::MESSAGE_AUTHORIZED, document)))
}

// POST api/nfes/{id}/cancel
pub async fn cancel(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
    payload: web::Json<CancelRequest>,
) -> Result<HttpResponse, ServiceError> {
    let document = state
        .documents
        .cancel(id.into_inner(), payload.into_inner().justification)
        .await?;
    Ok(HttpResponse::Ok().json(ResponseBody::new(constants::MESSAGE_CANCELLED, document)))
}

// GET api/nfes/{id}/xml
pub async fn download_xml(state: web::Data<AppState>, id: web::Path<Uuid>) -> Result<HttpResponse, ServiceError> {
    let id = id.into_inner();
    let service = state.documents.clone();
    let signed = run_blocking(move || service.download_signed_document(id)).await?;
    Ok(HttpResponse::Ok()
        .content_type("application/xml")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}-nfe.xml\"", signed.access_key),
        ))
        .body(signed.content))
}

// GET api/companies/{id}/sefaz-status
pub async fn sefaz_status(state: web::Data<AppState>, id: web::Path<Uuid>) -> Result<HttpResponse, ServiceError> {
    let status = state.documents.service_status(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ResponseBody::new(constants::MESSAGE_OK, status)))
}
