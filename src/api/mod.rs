use crate::{
    config::db::Pool,
    services::{certificate_service::CertificateVault, nfe_document_service::NfeDocumentService},
};

pub mod certificate_controller;
pub mod controller_context;
pub mod health_controller;
pub mod nfe_controller;

/// Services shared by every worker, registered as `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub documents: NfeDocumentService,
    pub certificates: CertificateVault,
    /// Absent when the stores are not database backed.
    pub pool: Option<Pool>,
}

impl AppState {
    pub fn new(documents: NfeDocumentService, certificates: CertificateVault) -> Self {
        Self {
            documents,
            certificates,
            pool: None,
        }
    }

    pub fn with_pool(mut self, pool: Pool) -> Self {
        self.pool = Some(pool);
        self
    }
}
