use actix_web::{web, HttpResponse};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{controller_context::run_blocking, AppState},
    constants,
    error::ServiceError,
    models::response::ResponseBody,
    services::certificate_service::CertificateUpload,
};

/// Upload body: the `.pfx` file travels base64 encoded.
#[derive(Deserialize)]
pub struct UploadCertificateRequest {
    pub name: String,
    pub content: String,
    pub password: String,
}

impl TryFrom<UploadCertificateRequest> for CertificateUpload {
    type Error = ServiceError;

    fn try_from(request: UploadCertificateRequest) -> Result<Self, Self::Error> {
        let content = STANDARD.decode(request.content.trim()).map_err(|e| {
            ServiceError::bad_request("certificate content must be base64")
                .with_context(|ctx| ctx.with_tag("certificate").with_metadata("field", "content").with_detail(e.to_string()))
        })?;
        Ok(CertificateUpload {
            name: request.name,
            content,
            password: request.password,
        })
    }
}

// POST api/companies/{id}/certificates
pub async fn upload(
    state: web::Data<AppState>,
    company_id: web::Path<Uuid>,
    payload: web::Json<UploadCertificateRequest>,
) -> Result<HttpResponse, ServiceError> {
    let company_id = company_id.into_inner();
    let upload = CertificateUpload::try_from(payload.into_inner())?;
    let vault = state.certificates.clone();
    let certificate = run_blocking(move || vault.upload(company_id, upload)).await?;
    Ok(HttpResponse::Created().json(ResponseBody::new(constants::MESSAGE_CERTIFICATE_UPLOADED, certificate)))
}

// GET api/companies/{id}/certificates
pub async fn list(state: web::Data<AppState>, company_id: web::Path<Uuid>) -> Result<HttpResponse, ServiceError> {
    let company_id = company_id.into_inner();
    let vault = state.certificates.clone();
    let certificates = run_blocking(move || vault.list_for_company(company_id)).await?;
    Ok(HttpResponse::Ok().json(ResponseBody::new(constants::MESSAGE_OK, certificates)))
}

// DELETE api/certificates/{id}
pub async fn delete(state: web::Data<AppState>, id: web::Path<Uuid>) -> Result<HttpResponse, ServiceError> {
    let id = id.into_inner();
    let vault = state.certificates.clone();
    let removed = run_blocking(move || vault.delete(id)).await?;
    Ok(HttpResponse::Ok().json(ResponseBody::new(constants::MESSAGE_CERTIFICATE_DELETED, removed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_must_be_base64() {
        let request = UploadCertificateRequest {
            name: "A1".to_string(),
            content: "***".to_string(),
            password: "x".to_string(),
        };
        assert!(CertificateUpload::try_from(request).is_err());

        let request = UploadCertificateRequest {
            name: "A1".to_string(),
            content: STANDARD.encode([1u8, 2, 3]),
            password: "x".to_string(),
        };
        assert_eq!(CertificateUpload::try_from(request).unwrap().content, vec![1, 2, 3]);
    }
}
