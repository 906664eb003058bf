use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT},
    error::{ServiceError, ServiceResult},
    models::{
        account::Account,
        certificate::{Certificate, CertificateStatus},
        company::Company,
        fiscal_document::{
            claim::already_claimed, AuthorizationChanges, CancellationChanges, ClaimOutcome, ClaimRequest,
            DocumentFilter, DocumentStatus, DocumentTotals, FiscalDocument, LineItem, RejectionChanges,
            SubmissionClaim,
        },
    },
    repository::{CertificateStore, CompanyDirectory, DocumentStore, SequenceStore},
};

/// Process-local store with the same guarantees as the Postgres one: one lock
/// around all state stands in for row locks and transactions.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<InMemoryState>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    accounts: HashMap<Uuid, Account>,
    companies: HashMap<Uuid, Company>,
    documents: HashMap<Uuid, FiscalDocument>,
    items: HashMap<Uuid, Vec<LineItem>>,
    sequences: HashMap<(Uuid, i32), i32>,
    certificates: HashMap<Uuid, Certificate>,
    claims: HashMap<Uuid, SubmissionClaim>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> ServiceResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|_| {
            ServiceError::internal_server_error("In-memory store lock poisoned").with_tag("database")
        })
    }

    pub fn insert_account(&self, account: Account) -> ServiceResult<()> {
        self.state()?.accounts.insert(account.id, account);
        Ok(())
    }

    pub fn insert_company(&self, company: Company) -> ServiceResult<()> {
        self.state()?.companies.insert(company.id, company);
        Ok(())
    }

    /// Replaces a stored document as is. Lets tests age or corrupt records.
    pub fn overwrite_document(&self, document: FiscalDocument) -> ServiceResult<()> {
        self.state()?.documents.insert(document.id, document);
        Ok(())
    }

    /// Plants a claim as is. Lets tests simulate an abandoned submission.
    pub fn insert_claim(&self, claim: SubmissionClaim) -> ServiceResult<()> {
        self.state()?.claims.insert(claim.document_id, claim);
        Ok(())
    }

    /// Replaces a stored certificate as is.
    pub fn overwrite_certificate(&self, certificate: Certificate) -> ServiceResult<()> {
        self.state()?.certificates.insert(certificate.id, certificate);
        Ok(())
    }
}

fn document_not_found(document_id: Uuid) -> ServiceError {
    ServiceError::not_found(format!("Fiscal document {} not found", document_id)).with_tag("nfe")
}

fn certificate_not_found(certificate_id: Uuid) -> ServiceError {
    ServiceError::not_found(format!("Certificate {} not found", certificate_id)).with_tag("certificate")
}

fn company_not_found(company_id: Uuid) -> ServiceError {
    ServiceError::not_found(format!("Company {} not found", company_id)).with_tag("company")
}

fn stale(document_id: Uuid, expected: DocumentStatus) -> ServiceError {
    ServiceError::conflict(format!("Document {} is no longer {}", document_id, expected)).with_context(|ctx| {
        ctx.with_tag("nfe")
            .with_metadata("document_id", document_id.to_string())
            .with_metadata("expected_status", expected.as_str())
    })
}

impl InMemoryState {
    /// Runs `apply` only when the document is currently in `expected`.
    fn transition<F>(&mut self, document_id: Uuid, expected: DocumentStatus, apply: F) -> ServiceResult<FiscalDocument>
    where
        F: FnOnce(&mut FiscalDocument),
    {
        let document = self
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| stale(document_id, expected))?;
        if document.status != expected {
            return Err(stale(document_id, expected));
        }
        apply(document);
        Ok(document.clone())
    }

    fn belongs_to(&self, document: &FiscalDocument, account_id: Uuid) -> bool {
        self.companies
            .get(&document.company_id)
            .map(|company| company.account_id == account_id)
            .unwrap_or(false)
    }

    fn created_in(document: &FiscalDocument, request: &ClaimRequest) -> bool {
        document.created_at >= request.period_start && document.created_at < request.period_end
    }

    fn count_issued(&self, request: &ClaimRequest) -> i64 {
        self.documents
            .values()
            .filter(|document| document.status.is_issued())
            .filter(|document| Self::created_in(document, request))
            .filter(|document| self.belongs_to(document, request.claim.account_id))
            .count() as i64
    }

    fn count_live_claims(&self, request: &ClaimRequest) -> i64 {
        self.claims
            .values()
            .filter(|claim| claim.account_id == request.claim.account_id && claim.is_live(request.live_after))
            .filter(|claim| {
                self.documents
                    .get(&claim.document_id)
                    .map(|document| Self::created_in(document, request))
                    .unwrap_or(false)
            })
            .count() as i64
    }
}

impl DocumentStore for InMemoryStore {
    fn insert_draft(&self, document: FiscalDocument, items: Vec<LineItem>) -> ServiceResult<FiscalDocument> {
        let mut state = self.state()?;
        if !state.companies.contains_key(&document.company_id) {
            return Err(ServiceError::bad_request("Unknown company").with_tag("nfe"));
        }
        let duplicate = state.documents.values().any(|existing| {
            existing.company_id == document.company_id
                && existing.series == document.series
                && existing.number == document.number
                && existing.model == document.model
        });
        if duplicate {
            return Err(
                ServiceError::conflict("Document number already used for this company and series").with_tag("nfe"),
            );
        }
        state.items.insert(document.id, items);
        state.documents.insert(document.id, document.clone());
        Ok(document)
    }

    fn find_document(&self, document_id: Uuid) -> ServiceResult<FiscalDocument> {
        self.state()?
            .documents
            .get(&document_id)
            .cloned()
            .ok_or_else(|| document_not_found(document_id))
    }

    fn find_items(&self, document_id: Uuid) -> ServiceResult<Vec<LineItem>> {
        let mut items = self.state()?.items.get(&document_id).cloned().unwrap_or_default();
        items.sort_by_key(|item| item.item_number);
        Ok(items)
    }

    fn list_documents(&self, filter: &DocumentFilter, limit: i64, offset: i64) -> ServiceResult<Vec<FiscalDocument>> {
        let safe_limit = if limit <= 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            limit.min(MAX_PAGE_LIMIT)
        };
        let mut documents: Vec<FiscalDocument> = self
            .state()?
            .documents
            .values()
            .filter(|document| filter.matches(document))
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(safe_limit as usize)
            .collect())
    }

    fn claim_submission(&self, request: &ClaimRequest) -> ServiceResult<ClaimOutcome> {
        let mut state = self.state()?;
        let claim = &request.claim;
        if !state.accounts.contains_key(&claim.account_id) {
            return Err(
                ServiceError::not_found(format!("Account {} not found", claim.account_id)).with_tag("account"),
            );
        }
        let document = state
            .documents
            .get(&claim.document_id)
            .ok_or_else(|| document_not_found(claim.document_id))?;
        if document.status != DocumentStatus::Draft {
            return Err(stale(claim.document_id, DocumentStatus::Draft));
        }
        if let Some(existing) = state.claims.get(&claim.document_id) {
            if existing.is_live(request.live_after) {
                return Err(already_claimed(claim.document_id));
            }
        }

        if request.monthly_cap.is_some() {
            let issued = state.count_issued(request);
            let in_flight = state.count_live_claims(request);
            if request.cap_reached(issued, in_flight) {
                return Ok(ClaimOutcome::CapReached { issued, in_flight });
            }
        }

        state.claims.insert(claim.document_id, claim.clone());
        Ok(ClaimOutcome::Claimed)
    }

    fn release_submission(&self, document_id: Uuid) -> ServiceResult<()> {
        self.state()?.claims.remove(&document_id);
        Ok(())
    }

    fn replace_items(
        &self,
        document_id: Uuid,
        items: Vec<LineItem>,
        totals: DocumentTotals,
        at: DateTime<Utc>,
    ) -> ServiceResult<FiscalDocument> {
        let mut state = self.state()?;
        if state.claims.contains_key(&document_id) {
            return Err(already_claimed(document_id));
        }
        let updated = state.transition(document_id, DocumentStatus::Draft, |document| {
            totals.apply_to(document);
            document.updated_at = at;
        })?;
        state.items.insert(document_id, items);
        Ok(updated)
    }

    fn mark_authorized(&self, document_id: Uuid, changes: &AuthorizationChanges) -> ServiceResult<FiscalDocument> {
        let mut state = self.state()?;
        let authorized = state.transition(document_id, DocumentStatus::Draft, |document| changes.apply_to(document))?;
        state.claims.remove(&document_id);
        Ok(authorized)
    }

    fn mark_rejected(&self, document_id: Uuid, changes: &RejectionChanges) -> ServiceResult<FiscalDocument> {
        let mut state = self.state()?;
        let rejected = state.transition(document_id, DocumentStatus::Draft, |document| changes.apply_to(document))?;
        state.claims.remove(&document_id);
        Ok(rejected)
    }

    fn mark_cancelled(&self, document_id: Uuid, changes: &CancellationChanges) -> ServiceResult<FiscalDocument> {
        self.state()?
            .transition(document_id, DocumentStatus::Authorized, |document| changes.apply_to(document))
    }
}

impl CompanyDirectory for InMemoryStore {
    fn find_company(&self, company_id: Uuid) -> ServiceResult<Company> {
        self.state()?
            .companies
            .get(&company_id)
            .cloned()
            .ok_or_else(|| company_not_found(company_id))
    }

    fn find_account(&self, account_id: Uuid) -> ServiceResult<Account> {
        self.state()?
            .accounts
            .get(&account_id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("Account {} not found", account_id)).with_tag("account"))
    }
}

impl SequenceStore for InMemoryStore {
    fn next_number(&self, company_id: Uuid, series: i32, _at: DateTime<Utc>) -> ServiceResult<i32> {
        let mut state = self.state()?;
        let next = state.sequences.entry((company_id, series)).or_insert(1);
        let current = *next;
        *next += 1;
        Ok(current)
    }
}

impl CertificateStore for InMemoryStore {
    fn activate(&self, certificate: Certificate) -> ServiceResult<Certificate> {
        let mut state = self.state()?;
        if !state.companies.contains_key(&certificate.company_id) {
            return Err(company_not_found(certificate.company_id));
        }
        for existing in state.certificates.values_mut() {
            if existing.company_id == certificate.company_id && existing.is_active() {
                existing.status = CertificateStatus::Inactive;
                existing.updated_at = certificate.created_at;
            }
        }
        state.certificates.insert(certificate.id, certificate.clone());
        if let Some(company) = state.companies.get_mut(&certificate.company_id) {
            company.certificate_id = Some(certificate.id);
            company.updated_at = certificate.created_at;
        }
        Ok(certificate)
    }

    fn find_certificate(&self, certificate_id: Uuid) -> ServiceResult<Certificate> {
        self.state()?
            .certificates
            .get(&certificate_id)
            .cloned()
            .ok_or_else(|| certificate_not_found(certificate_id))
    }

    fn find_active(&self, company_id: Uuid) -> ServiceResult<Option<Certificate>> {
        Ok(self
            .state()?
            .certificates
            .values()
            .find(|certificate| certificate.company_id == company_id && certificate.is_active())
            .cloned())
    }

    fn list_by_company(&self, company_id: Uuid) -> ServiceResult<Vec<Certificate>> {
        let mut certificates: Vec<Certificate> = self
            .state()?
            .certificates
            .values()
            .filter(|certificate| certificate.company_id == company_id)
            .cloned()
            .collect();
        certificates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(certificates)
    }

    fn count_active(&self, company_id: Uuid) -> ServiceResult<i64> {
        Ok(self
            .state()?
            .certificates
            .values()
            .filter(|certificate| certificate.company_id == company_id && certificate.is_active())
            .count() as i64)
    }

    fn expire(&self, now: DateTime<Utc>, only: Option<Uuid>) -> ServiceResult<usize> {
        let mut state = self.state()?;
        let mut expired = 0;
        for certificate in state.certificates.values_mut() {
            let selected = only.map_or(true, |id| certificate.id == id);
            if selected && certificate.is_active() && certificate.expires_at < now {
                certificate.status = CertificateStatus::Expired;
                certificate.updated_at = now;
                expired += 1;
            }
        }
        Ok(expired)
    }

    fn find_expiring(&self, now: DateTime<Utc>, until: DateTime<Utc>) -> ServiceResult<Vec<Certificate>> {
        let mut certificates: Vec<Certificate> = self
            .state()?
            .certificates
            .values()
            .filter(|certificate| certificate.is_active())
            .filter(|certificate| certificate.expires_at >= now && certificate.expires_at <= until)
            .cloned()
            .collect();
        certificates.sort_by_key(|certificate| certificate.expires_at);
        Ok(certificates)
    }

    fn delete(&self, certificate_id: Uuid, at: DateTime<Utc>) -> ServiceResult<Certificate> {
        let mut state = self.state()?;
        let certificate = state
            .certificates
            .remove(&certificate_id)
            .ok_or_else(|| certificate_not_found(certificate_id))?;
        if let Some(company) = state.companies.get_mut(&certificate.company_id) {
            if company.certificate_id == Some(certificate_id) {
                company.certificate_id = None;
                company.updated_at = at;
            }
        }
        Ok(certificate)
    }
}
