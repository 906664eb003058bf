//! Storage seams used by the services.
//!
//! Each trait is implemented by [`pg::PgStore`] over the diesel pool and by
//! [`memory::InMemoryStore`] for tests and local runs. Implementations are
//! synchronous; async callers hop through `web::block` or `spawn_blocking`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::ServiceResult,
    models::{
        account::Account,
        certificate::Certificate,
        company::Company,
        fiscal_document::{
            AuthorizationChanges, CancellationChanges, ClaimOutcome, ClaimRequest, DocumentFilter,
            DocumentTotals, FiscalDocument, LineItem, RejectionChanges,
        },
    },
};

pub mod memory;
pub mod pg;

pub use memory::InMemoryStore;
pub use pg::PgStore;

pub trait DocumentStore: Send + Sync {
    /// Persists a draft and its lines atomically.
    fn insert_draft(&self, document: FiscalDocument, items: Vec<LineItem>) -> ServiceResult<FiscalDocument>;

    fn find_document(&self, document_id: Uuid) -> ServiceResult<FiscalDocument>;

    /// Lines ordered by item number.
    fn find_items(&self, document_id: Uuid) -> ServiceResult<Vec<LineItem>>;

    fn list_documents(&self, filter: &DocumentFilter, limit: i64, offset: i64) -> ServiceResult<Vec<FiscalDocument>>;

    /// Claims a draft for submission to the gateway. The monthly cap is checked
    /// in the same atomic step, counting authorized and cancelled documents of
    /// the period plus live claims. A conflict if the document left draft or
    /// another live claim holds it.
    fn claim_submission(&self, request: &ClaimRequest) -> ServiceResult<ClaimOutcome>;

    /// Drops the claim of a submission that never reached the gateway.
    fn release_submission(&self, document_id: Uuid) -> ServiceResult<()>;

    /// Replaces the lines of a document still in draft and not claimed.
    fn replace_items(
        &self,
        document_id: Uuid,
        items: Vec<LineItem>,
        totals: DocumentTotals,
        at: DateTime<Utc>,
    ) -> ServiceResult<FiscalDocument>;

    /// `draft -> authorized`, releasing the submission claim; a conflict if the
    /// document left draft meanwhile.
    fn mark_authorized(&self, document_id: Uuid, changes: &AuthorizationChanges) -> ServiceResult<FiscalDocument>;

    /// `draft -> rejected`, releasing the submission claim; a conflict if the
    /// document left draft meanwhile.
    fn mark_rejected(&self, document_id: Uuid, changes: &RejectionChanges) -> ServiceResult<FiscalDocument>;

    /// `authorized -> cancelled`; a conflict if the document is no longer authorized.
    fn mark_cancelled(&self, document_id: Uuid, changes: &CancellationChanges) -> ServiceResult<FiscalDocument>;
}

pub trait CompanyDirectory: Send + Sync {
    fn find_company(&self, company_id: Uuid) -> ServiceResult<Company>;

    fn find_account(&self, account_id: Uuid) -> ServiceResult<Account>;
}

pub trait SequenceStore: Send + Sync {
    /// Returns the current counter for `(company, series)` and advances it, atomically.
    fn next_number(&self, company_id: Uuid, series: i32, at: DateTime<Utc>) -> ServiceResult<i32>;
}

pub trait CertificateStore: Send + Sync {
    /// Deactivates the company's current certificates, stores `certificate` as
    /// active and points the company at it, in one step.
    fn activate(&self, certificate: Certificate) -> ServiceResult<Certificate>;

    fn find_certificate(&self, certificate_id: Uuid) -> ServiceResult<Certificate>;

    fn find_active(&self, company_id: Uuid) -> ServiceResult<Option<Certificate>>;

    /// Newest first.
    fn list_by_company(&self, company_id: Uuid) -> ServiceResult<Vec<Certificate>>;

    fn count_active(&self, company_id: Uuid) -> ServiceResult<i64>;

    /// Marks active certificates past their expiry as expired. `only` narrows
    /// the sweep to one certificate.
    fn expire(&self, now: DateTime<Utc>, only: Option<Uuid>) -> ServiceResult<usize>;

    /// Active certificates expiring in `[now, until]`, soonest first.
    fn find_expiring(&self, now: DateTime<Utc>, until: DateTime<Utc>) -> ServiceResult<Vec<Certificate>>;

    /// Removes the certificate and clears the company pointer if it pointed at it.
    fn delete(&self, certificate_id: Uuid, at: DateTime<Utc>) -> ServiceResult<Certificate>;
}
