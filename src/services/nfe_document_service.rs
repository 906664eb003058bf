//! NFe Lifecycle Manager.
//!
//! `draft -> authorized | rejected` and `authorized -> cancelled`, nothing else.
//! Validation and state checks happen before anything is written. A draft is
//! claimed before it goes to the gateway, so it is submitted at most once and
//! in-flight submissions count toward the account's monthly cap. Once the
//! gateway has been called, its outcome is always recorded: a transport
//! failure rejects the draft instead of leaving it to be retried blindly.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, SUBMISSION_CLAIM_GRACE_SECS, TRANSPORT_ERROR_STATUS_CODE},
    error::{ServiceError, ServiceResult},
    fiscal::{
        sefaz_status::{classify, format_error, SefazStatus},
        tax_calculator::TaxInput,
        validators::is_access_key,
        BrazilianState, TaxCalculator,
    },
    gateway::{
        AuthorizeRequest, AuthorizeResponse, CancellationRequest, CancellationResponse, FiscalGateway, GatewayError,
        ServiceStatusRequest,
    },
    models::{
        company::{Company, SefazEnvironment},
        fiscal_document::{
            dto::{CreateDraftRequest, CustomerSnapshot, DocumentView, ItemRequest},
            validators as document_validators, AuthorizationChanges, CancellationChanges, ClaimOutcome,
            ClaimRequest, DocumentFilter, DocumentStatus, DocumentTotals, FiscalDocument, LineItem,
            RejectionChanges, SubmissionClaim,
        },
    },
    repository::{CompanyDirectory, DocumentStore},
    services::{certificate_service::CertificateVault, numbering_service::NumberingAllocator},
    utils::clock::Clock,
};

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Pagination parameters with functional validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    pub limit: i64,
    pub offset: i64,
}

impl PaginationParams {
    /// Create pagination params with functional validation and clamping
    pub fn from_query(limit_str: Option<&str>, offset_str: Option<&str>) -> Self {
        let limit = limit_str
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);

        let offset = offset_str
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
            .max(0);

        Self { limit, offset }
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// The stored signed XML of an issued document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedDocument {
    pub access_key: String,
    pub content: String,
}

/// Result of a SEFAZ availability check for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SefazServiceStatus {
    pub state: BrazilianState,
    pub environment: SefazEnvironment,
    pub online: bool,
    pub status: SefazStatus,
    pub message: String,
    pub checked_at: DateTime<Utc>,
}

struct AuthorizationPlan {
    document: FiscalDocument,
    request: AuthorizeRequest,
}

struct CancellationPlan {
    document: FiscalDocument,
    justification: String,
    requested_at: DateTime<Utc>,
    request: CancellationRequest,
}

async fn blocking<T, F>(f: F) -> ServiceResult<T>
where
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        log::error!("Blocking task failed: {}", e);
        ServiceError::internal_server_error("Background task failed").with_detail(e.to_string())
    })?
}

/// First instant of the month of `now` and of the following month, in UTC.
fn month_bounds(now: DateTime<Utc>) -> ServiceResult<(DateTime<Utc>, DateTime<Utc>)> {
    let (next_year, next_month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let start = Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0).single();
    let end = Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0).single();
    start
        .zip(end)
        .ok_or_else(|| ServiceError::internal_server_error("Could not compute the current month"))
}

/// Gateway message and error list folded into one line.
fn raw_message(message: &str, errors: &[String]) -> String {
    let parts: Vec<&str> = std::iter::once(message)
        .chain(errors.iter().map(String::as_str))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        "sem mensagem do gateway".to_string()
    } else {
        parts.join("; ")
    }
}

fn status_code_of(code: Option<&str>) -> String {
    code.map(str::trim)
        .filter(|code| !code.is_empty())
        .unwrap_or(TRANSPORT_ERROR_STATUS_CODE)
        .to_string()
}

fn document_tag(document_id: Uuid) -> impl FnOnce(crate::error::ErrorContext) -> crate::error::ErrorContext {
    move |ctx| ctx.with_tag("nfe").with_metadata("document_id", document_id.to_string())
}

fn wrong_status(document: &FiscalDocument, action: &str, expected: DocumentStatus) -> ServiceError {
    ServiceError::conflict(format!(
        "Cannot {} document {} in status {}",
        action, document.id, document.status
    ))
    .with_context(|ctx| {
        ctx.with_tag("nfe")
            .with_metadata("document_id", document.id.to_string())
            .with_metadata("status", document.status.as_str())
            .with_metadata("expected_status", expected.as_str())
    })
}

#[derive(Clone)]
pub struct NfeDocumentService {
    documents: Arc<dyn DocumentStore>,
    companies: Arc<dyn CompanyDirectory>,
    numbering: NumberingAllocator,
    vault: CertificateVault,
    gateway: Arc<dyn FiscalGateway>,
    clock: Arc<dyn Clock>,
    calculator: TaxCalculator,
    gateway_timeout: Duration,
}

impl NfeDocumentService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        companies: Arc<dyn CompanyDirectory>,
        numbering: NumberingAllocator,
        vault: CertificateVault,
        gateway: Arc<dyn FiscalGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            documents,
            companies,
            numbering,
            vault,
            gateway,
            clock,
            calculator: TaxCalculator::default(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_calculator(mut self, calculator: TaxCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    /// Upper bound for one gateway call, on top of the client's own timeout.
    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    fn active_company(&self, company_id: Uuid) -> ServiceResult<Company> {
        let company = self.companies.find_company(company_id)?;
        if !company.is_active() {
            return Err(ServiceError::conflict(format!("Company {} is not active", company.id))
                .with_context(|ctx| ctx.with_tag("company").with_metadata("company_id", company.id.to_string())));
        }
        Ok(company)
    }

    fn customer_of(document: &FiscalDocument) -> ServiceResult<CustomerSnapshot> {
        serde_json::from_value(document.customer.clone()).map_err(|e| {
            log::error!("Document {} has an unreadable customer snapshot: {}", document.id, e);
            ServiceError::internal_server_error("Stored customer data is unreadable")
                .with_context(|ctx| document_tag(document.id)(ctx).with_detail(e.to_string()))
        })
    }

    /// Taxes every line against the issuer and customer states.
    fn build_lines(
        &self,
        document_id: Uuid,
        company: &Company,
        customer: &CustomerSnapshot,
        items: &[ItemRequest],
    ) -> ServiceResult<(Vec<LineItem>, DocumentTotals)> {
        let lines = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let tax = self.calculator.calculate_item(&TaxInput {
                    regime: company.tax_regime,
                    issuer_state: company.state,
                    customer_state: customer.state,
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                    ipi_rate: item.ipi_rate,
                })?;
                LineItem::build(document_id, index as i32 + 1, item, &tax)
            })
            .collect::<ServiceResult<Vec<LineItem>>>()
            .map_err(|e| e.with_tag("item"))?;
        let totals = DocumentTotals::from_items(&lines);
        totals.ensure_storable()?;
        Ok((lines, totals))
    }

    /// Validates, taxes and numbers a new draft. Nothing is written, and no
    /// number is spent, unless every check passes.
    pub fn create_draft(&self, user_id: Uuid, request: CreateDraftRequest) -> ServiceResult<DocumentView> {
        let company = self.active_company(request.company_id)?;
        document_validators::validate_issuer(&company)?;
        let customer = document_validators::validate_customer(&request.customer)?;
        let items = document_validators::validate_items(request.items)?;

        let document_id = Uuid::new_v4();
        let (lines, totals) = self.build_lines(document_id, &company, &customer, &items)?;
        let customer_json = serde_json::to_value(&customer).map_err(|e| {
            ServiceError::internal_server_error("Failed to serialize customer").with_detail(e.to_string())
        })?;

        let series = company.series_for(request.model);
        let number = self.numbering.allocate(company.id, series)?;
        let now = self.clock.now();

        let document = FiscalDocument {
            id: document_id,
            company_id: company.id,
            user_id,
            customer_id: customer.id,
            customer: customer_json,
            number,
            series,
            model: request.model,
            status: DocumentStatus::Draft,
            total_products: totals.total_products,
            total_discount: totals.total_discount,
            total_freight: totals.total_freight,
            total_insurance: totals.total_insurance,
            total_other_expenses: totals.total_other_expenses,
            total_icms: totals.total_icms,
            total_pis: totals.total_pis,
            total_cofins: totals.total_cofins,
            total_ipi: totals.total_ipi,
            total_document: totals.total_document,
            access_key: None,
            protocol: None,
            status_code: None,
            status_message: None,
            signed_document: None,
            rejection_reason: None,
            cancellation_reason: None,
            cancellation_protocol: None,
            cancellation_document: None,
            issued_at: None,
            authorized_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        let stored = self.documents.insert_draft(document, lines.clone())?;
        log::info!(
            "Draft {} created for company {} as {} series {} number {}",
            stored.id,
            company.id,
            stored.model,
            stored.series,
            stored.number
        );
        Ok(DocumentView {
            document: stored,
            items: lines,
        })
    }

    /// Replaces every line of a draft and recomputes its taxes and totals.
    pub fn replace_draft_items(&self, document_id: Uuid, items: Vec<ItemRequest>) -> ServiceResult<DocumentView> {
        let document = self.documents.find_document(document_id)?;
        if document.status != DocumentStatus::Draft {
            return Err(wrong_status(&document, "edit", DocumentStatus::Draft));
        }
        let company = self.companies.find_company(document.company_id)?;
        let customer = Self::customer_of(&document)?;
        let items = document_validators::validate_items(items)?;

        let (lines, totals) = self.build_lines(document.id, &company, &customer, &items)?;
        let updated = self
            .documents
            .replace_items(document.id, lines.clone(), totals, self.clock.now())?;
        log::info!("Draft {} now has {} item(s)", updated.id, lines.len());
        Ok(DocumentView {
            document: updated,
            items: lines,
        })
    }

    pub fn get_document(&self, document_id: Uuid) -> ServiceResult<DocumentView> {
        let document = self.documents.find_document(document_id)?;
        let items = self.documents.find_items(document_id)?;
        Ok(DocumentView { document, items })
    }

    pub fn list_documents(
        &self,
        filter: &DocumentFilter,
        pagination: PaginationParams,
    ) -> ServiceResult<Vec<FiscalDocument>> {
        self.documents
            .list_documents(filter, pagination.limit, pagination.offset)
    }

    /// The signed XML exactly as the gateway returned it.
    pub fn download_signed_document(&self, document_id: Uuid) -> ServiceResult<SignedDocument> {
        let document = self.documents.find_document(document_id)?;
        if !document.status.is_issued() {
            return Err(wrong_status(&document, "download", DocumentStatus::Authorized));
        }
        match (document.access_key, document.signed_document) {
            (Some(access_key), Some(content)) => Ok(SignedDocument { access_key, content }),
            _ => Err(ServiceError::not_found(format!("Document {} has no signed XML", document_id))
                .with_context(document_tag(document_id))),
        }
    }

    /// How long a submission claim stays live: the gateway deadline plus a grace period.
    fn claim_lease(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.gateway_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_GATEWAY_TIMEOUT.as_secs() as i64))
            + chrono::Duration::seconds(SUBMISSION_CLAIM_GRACE_SECS)
    }

    /// Takes the submission claim on a draft. The monthly cap is checked in the
    /// same atomic step, so concurrent submissions of one account cannot
    /// overshoot it.
    fn claim_submission(&self, company: &Company, document: &FiscalDocument) -> ServiceResult<()> {
        let account = self.companies.find_account(company.account_id)?;
        if !account.is_active() {
            return Err(ServiceError::conflict(format!("Account {} is {}", account.id, account.status))
                .with_context(|ctx| ctx.with_tag("account").with_metadata("account_id", account.id.to_string())));
        }

        let now = self.clock.now();
        let (period_start, period_end) = month_bounds(now)?;
        let request = ClaimRequest {
            claim: SubmissionClaim {
                document_id: document.id,
                account_id: account.id,
                claimed_at: now,
            },
            monthly_cap: account.monthly_cap(),
            period_start,
            period_end,
            live_after: now - self.claim_lease(),
        };

        match self.documents.claim_submission(&request)? {
            ClaimOutcome::Claimed => Ok(()),
            ClaimOutcome::CapReached { issued, in_flight } => Err(ServiceError::limit_exceeded(format!(
                "Monthly limit of {} documents reached",
                account.max_nfes_per_month
            ))
            .with_context(|ctx| {
                ctx.with_tag("account")
                    .with_metadata("account_id", account.id.to_string())
                    .with_metadata("issued", issued.to_string())
                    .with_metadata("in_flight", in_flight.to_string())
            })),
        }
    }

    fn build_authorization(&self, company: &Company, document: FiscalDocument) -> ServiceResult<AuthorizationPlan> {
        let certificate = self
            .vault
            .get_active_decrypted(company.id)
            .map_err(|e| e.with_context(document_tag(document.id)))?;
        let items = self.documents.find_items(document.id)?;
        let customer = Self::customer_of(&document)?;
        let request = AuthorizeRequest::build(company, &document, &customer, &items, certificate);

        Ok(AuthorizationPlan { document, request })
    }

    fn prepare_authorization(&self, document_id: Uuid) -> ServiceResult<AuthorizationPlan> {
        let document = self.documents.find_document(document_id)?;
        if document.status != DocumentStatus::Draft {
            return Err(wrong_status(&document, "authorize", DocumentStatus::Draft));
        }
        let company = self.companies.find_company(document.company_id)?;
        self.claim_submission(&company, &document)?;

        // Nothing was sent yet, so a failure here gives the draft back untouched.
        self.build_authorization(&company, document).map_err(|err| {
            if let Err(release) = self.documents.release_submission(document_id) {
                log::error!("Failed to release submission claim on {}: {}", document_id, release);
            }
            err
        })
    }

    fn reject(&self, document: &FiscalDocument, code: &str, raw: &str) -> ServiceResult<FiscalDocument> {
        let status = classify(code);
        let changes = RejectionChanges::new(
            status.code.clone(),
            status.description.clone(),
            format_error(code, raw),
            self.clock.now(),
        );
        let rejected = self.documents.mark_rejected(document.id, &changes)?;
        log::warn!("Document {} rejected: {}", document.id, changes.rejection_reason);
        Ok(rejected)
    }

    fn record_authorization(
        &self,
        document: FiscalDocument,
        outcome: Result<AuthorizeResponse, GatewayError>,
    ) -> ServiceResult<FiscalDocument> {
        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                log::error!("Fiscal gateway failed while authorizing {}: {}", document.id, err);
                self.reject(&document, TRANSPORT_ERROR_STATUS_CODE, &err.to_string())?;
                return Err(ServiceError::gateway_transport(err.to_string()).with_context(|ctx| {
                    document_tag(document.id)(ctx).with_metadata("status_code", TRANSPORT_ERROR_STATUS_CODE)
                }));
            }
        };

        let code = status_code_of(response.status_code.as_deref());
        let status = classify(&code);
        let raw = raw_message(&response.message, &response.errors);

        if response.success && status.is_success() {
            let access_key = response.access_key.filter(|key| is_access_key(key));
            if let (Some(access_key), Some(protocol), Some(signed)) =
                (access_key, response.protocol, response.signed_document)
            {
                let now = self.clock.now();
                let message = if response.message.trim().is_empty() {
                    status.description.clone()
                } else {
                    response.message.trim().to_string()
                };
                let changes = AuthorizationChanges::new(access_key, protocol, code, message, signed, now, now);
                let authorized = self.documents.mark_authorized(document.id, &changes)?;
                log::info!(
                    "Document {} authorized with key {}",
                    authorized.id,
                    changes.access_key
                );
                return Ok(authorized);
            }

            let incomplete = format!("Resposta de autorização incompleta ({})", raw);
            self.reject(&document, TRANSPORT_ERROR_STATUS_CODE, &incomplete)?;
            let fallback = classify(TRANSPORT_ERROR_STATUS_CODE);
            return Err(
                ServiceError::gateway_rejected(fallback.code, fallback.user_message, incomplete)
                    .with_context(document_tag(document.id)),
            );
        }

        self.reject(&document, &code, &raw)?;
        Err(ServiceError::gateway_rejected(status.code, status.user_message, raw).with_context(document_tag(document.id)))
    }

    async fn call_gateway<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        tokio::time::timeout(self.gateway_timeout, call)
            .await
            .unwrap_or(Err(GatewayError::Timeout))
    }

    /// Submits a draft to SEFAZ through the gateway and records the outcome.
    pub async fn authorize(&self, document_id: Uuid) -> ServiceResult<FiscalDocument> {
        let service = self.clone();
        let AuthorizationPlan { document, request } =
            blocking(move || service.prepare_authorization(document_id)).await?;

        log::info!(
            "Submitting document {} (series {} number {}) for authorization",
            document.id,
            document.series,
            document.number
        );
        let outcome = self.call_gateway(self.gateway.authorize(request)).await;

        let service = self.clone();
        blocking(move || service.record_authorization(document, outcome)).await
    }

    fn prepare_cancellation(&self, document_id: Uuid, justification: &str) -> ServiceResult<CancellationPlan> {
        let document = self.documents.find_document(document_id)?;
        if document.status != DocumentStatus::Authorized {
            return Err(wrong_status(&document, "cancel", DocumentStatus::Authorized));
        }
        let justification = document_validators::validate_justification(justification)?;

        let requested_at = self.clock.now();
        if !document.within_cancellation_window(requested_at) {
            let deadline = document
                .cancellation_deadline()
                .map(|at| at.to_rfc3339())
                .unwrap_or_default();
            return Err(ServiceError::deadline_exceeded(
                "The 24-hour cancellation window for this document has closed",
            )
            .with_context(|ctx| document_tag(document_id)(ctx).with_metadata("deadline", deadline)));
        }

        let (access_key, protocol) = match (document.access_key.clone(), document.protocol.clone()) {
            (Some(access_key), Some(protocol)) => (access_key, protocol),
            _ => {
                return Err(ServiceError::internal_server_error(
                    "Authorized document is missing its access key or protocol",
                )
                .with_context(document_tag(document_id)))
            }
        };

        let company = self.companies.find_company(document.company_id)?;
        let certificate = self
            .vault
            .get_active_decrypted(company.id)
            .map_err(|e| e.with_context(document_tag(document_id)))?;

        Ok(CancellationPlan {
            request: CancellationRequest {
                access_key,
                reason: justification.clone(),
                protocol,
                certificate,
                environment: company.environment,
            },
            document,
            justification,
            requested_at,
        })
    }

    fn record_cancellation(
        &self,
        document: FiscalDocument,
        justification: String,
        requested_at: DateTime<Utc>,
        outcome: Result<CancellationResponse, GatewayError>,
    ) -> ServiceResult<FiscalDocument> {
        let response = outcome.map_err(|err| {
            log::error!("Fiscal gateway failed while cancelling {}: {}", document.id, err);
            ServiceError::gateway_transport(err.to_string()).with_context(document_tag(document.id))
        })?;

        let raw = raw_message(&response.message, &response.errors);
        let confirmed = match response.status_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => response.success && classify(code).is_success(),
            None => response.success,
        };
        if !confirmed {
            let code = status_code_of(response.status_code.as_deref());
            let status = classify(&code);
            log::warn!(
                "Cancellation of {} refused, document stays authorized: {}",
                document.id,
                format_error(&code, &raw)
            );
            return Err(
                ServiceError::gateway_rejected(status.code, status.user_message, raw)
                    .with_context(document_tag(document.id)),
            );
        }

        // The window was checked at request time; that instant is the cancellation time.
        let changes = CancellationChanges::new(
            justification,
            response.cancellation_protocol,
            response.signed_document,
            requested_at,
        );
        let cancelled = self.documents.mark_cancelled(document.id, &changes)?;
        log::info!("Document {} cancelled", cancelled.id);
        Ok(cancelled)
    }

    /// Cancels an authorized document within 24 hours of its authorization.
    pub async fn cancel(&self, document_id: Uuid, justification: String) -> ServiceResult<FiscalDocument> {
        let service = self.clone();
        let CancellationPlan {
            document,
            justification,
            requested_at,
            request,
        } = blocking(move || service.prepare_cancellation(document_id, &justification)).await?;

        let outcome = self.call_gateway(self.gateway.cancel(request)).await;

        let service = self.clone();
        blocking(move || service.record_cancellation(document, justification, requested_at, outcome)).await
    }

    /// Asks SEFAZ, through the gateway, whether the company's authorizer is up.
    pub async fn service_status(&self, company_id: Uuid) -> ServiceResult<SefazServiceStatus> {
        let service = self.clone();
        let (company, certificate) = blocking(move || {
            let company = service.companies.find_company(company_id)?;
            let certificate = service.vault.get_active_decrypted(company.id)?;
            Ok((company, certificate))
        })
        .await?;

        let request = ServiceStatusRequest {
            state: company.state.as_str().to_string(),
            environment: company.environment,
            certificate,
        };
        let response = self
            .call_gateway(self.gateway.service_status(request))
            .await
            .map_err(|err| {
                log::error!("Fiscal gateway failed on status check for {}: {}", company.id, err);
                ServiceError::gateway_transport(err.to_string())
                    .with_context(|ctx| ctx.with_tag("sefaz").with_metadata("company_id", company.id.to_string()))
            })?;

        let status = classify(&status_code_of(response.status_code.as_deref()));
        let message = response
            .status_description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| raw_message(&response.message, &[]));
        Ok(SefazServiceStatus {
            state: company.state,
            environment: company.environment,
            online: response.success && status.is_success(),
            status,
            message,
            checked_at: self.clock.now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        assert_eq!(
            PaginationParams::from_query(Some("0"), Some("-5")),
            PaginationParams { limit: 1, offset: 0 }
        );
        assert_eq!(PaginationParams::from_query(Some("10000"), None).limit, MAX_PAGE_LIMIT);
        assert_eq!(PaginationParams::from_query(Some("abc"), None).limit, DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn month_bounds_roll_over_the_year() {
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
        let (start, end) = month_bounds(now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn raw_message_joins_message_and_errors() {
        assert_eq!(
            raw_message(" Rejeicao ", &["campo x".to_string(), " ".to_string()]),
            "Rejeicao; campo x"
        );
        assert_eq!(raw_message("", &[]), "sem mensagem do gateway");
    }

    #[test]
    fn missing_status_code_falls_back_to_uncatalogued_error() {
        assert_eq!(status_code_of(None), "999");
        assert_eq!(status_code_of(Some("  ")), "999");
        assert_eq!(status_code_of(Some(" 100 ")), "100");
    }
}
