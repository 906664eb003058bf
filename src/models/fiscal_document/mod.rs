//! NFe / NFC-e documents, their lifecycle states and the change sets applied on
//! each transition.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    constants::CANCELLATION_WINDOW_HOURS,
    error::{ServiceError, ServiceResult},
    fiscal::{max_money, round_money},
    schema::fiscal_documents,
};

text_enum! {
    pub enum DocumentStatus {
        Draft => "draft",
        Pending => "pending",
        Authorized => "authorized",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
}

impl DocumentStatus {
    /// `draft -> authorized | rejected`, `authorized -> cancelled`. Nothing else.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (DocumentStatus::Draft, DocumentStatus::Authorized)
                | (DocumentStatus::Draft, DocumentStatus::Rejected)
                | (DocumentStatus::Authorized, DocumentStatus::Cancelled)
        )
    }

    /// Authorized and cancelled documents carry an access key and a signed blob.
    pub fn is_issued(&self) -> bool {
        matches!(self, DocumentStatus::Authorized | DocumentStatus::Cancelled)
    }
}

text_enum! {
    pub enum DocumentModel {
        /// NF-e
        Nfe => "55",
        /// NFC-e
        Nfce => "65",
    }
}

impl Default for DocumentModel {
    fn default() -> Self {
        DocumentModel::Nfe
    }
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = fiscal_documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FiscalDocument {
    pub id: Uuid,
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub customer_id: Option<Uuid>,
    /// Normalized customer data captured at draft time.
    pub customer: serde_json::Value,
    pub number: i32,
    pub series: i32,
    pub model: DocumentModel,
    pub status: DocumentStatus,
    pub total_products: Decimal,
    pub total_discount: Decimal,
    pub total_freight: Decimal,
    pub total_insurance: Decimal,
    pub total_other_expenses: Decimal,
    pub total_icms: Decimal,
    pub total_pis: Decimal,
    pub total_cofins: Decimal,
    pub total_ipi: Decimal,
    pub total_document: Decimal,
    pub access_key: Option<String>,
    pub protocol: Option<String>,
    pub status_code: Option<String>,
    pub status_message: Option<String>,
    #[serde(skip_serializing)]
    pub signed_document: Option<String>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancellation_protocol: Option<String>,
    #[serde(skip_serializing)]
    pub cancellation_document: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FiscalDocument {
    /// Last instant a cancellation is accepted, if the document was authorized.
    pub fn cancellation_deadline(&self) -> Option<DateTime<Utc>> {
        self.authorized_at
            .map(|at| at + Duration::hours(CANCELLATION_WINDOW_HOURS))
    }

    pub fn within_cancellation_window(&self, now: DateTime<Utc>) -> bool {
        self.cancellation_deadline()
            .map(|deadline| now <= deadline)
            .unwrap_or(false)
    }
}

/// Monetary totals derived from the line items. Never edited by hand.
#[derive(AsChangeset, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[diesel(table_name = fiscal_documents)]
pub struct DocumentTotals {
    pub total_products: Decimal,
    pub total_discount: Decimal,
    pub total_freight: Decimal,
    pub total_insurance: Decimal,
    pub total_other_expenses: Decimal,
    pub total_icms: Decimal,
    pub total_pis: Decimal,
    pub total_cofins: Decimal,
    pub total_ipi: Decimal,
    pub total_document: Decimal,
}

impl DocumentTotals {
    pub fn from_items(items: &[LineItem]) -> Self {
        let mut totals = items.iter().fold(DocumentTotals::default(), |mut acc, item| {
            acc.total_products += item.total_gross;
            acc.total_discount += item.discount;
            acc.total_freight += item.freight;
            acc.total_insurance += item.insurance;
            acc.total_other_expenses += item.other_expenses;
            acc.total_icms += item.icms_value;
            acc.total_pis += item.pis_value;
            acc.total_cofins += item.cofins_value;
            acc.total_ipi += item.ipi_value;
            acc.total_document += item.total_net;
            acc
        });
        totals.total_document += totals.total_ipi;
        totals.round()
    }

    /// Checks the document-level sums still fit their columns.
    pub fn ensure_storable(&self) -> ServiceResult<()> {
        let limit = max_money();
        let too_large = [
            ("total_products", self.total_products),
            ("total_discount", self.total_discount),
            ("total_document", self.total_document),
        ]
        .into_iter()
        .find(|(_, value)| *value > limit);
        match too_large {
            Some((field, value)) => Err(ServiceError::bad_request(format!(
                "Document {} of {} exceeds the maximum of {}",
                field, value, limit
            ))
            .with_context(|ctx| ctx.with_tag("nfe").with_metadata("field", field))),
            None => Ok(()),
        }
    }

    fn round(self) -> Self {
        Self {
            total_products: round_money(self.total_products),
            total_discount: round_money(self.total_discount),
            total_freight: round_money(self.total_freight),
            total_insurance: round_money(self.total_insurance),
            total_other_expenses: round_money(self.total_other_expenses),
            total_icms: round_money(self.total_icms),
            total_pis: round_money(self.total_pis),
            total_cofins: round_money(self.total_cofins),
            total_ipi: round_money(self.total_ipi),
            total_document: round_money(self.total_document),
        }
    }

    pub fn apply_to(&self, document: &mut FiscalDocument) {
        document.total_products = self.total_products;
        document.total_discount = self.total_discount;
        document.total_freight = self.total_freight;
        document.total_insurance = self.total_insurance;
        document.total_other_expenses = self.total_other_expenses;
        document.total_icms = self.total_icms;
        document.total_pis = self.total_pis;
        document.total_cofins = self.total_cofins;
        document.total_ipi = self.total_ipi;
        document.total_document = self.total_document;
    }
}

/// Applied on `draft -> authorized`.
#[derive(AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = fiscal_documents)]
pub struct AuthorizationChanges {
    pub status: DocumentStatus,
    pub access_key: String,
    pub protocol: String,
    pub status_code: String,
    pub status_message: String,
    pub signed_document: String,
    pub issued_at: DateTime<Utc>,
    pub authorized_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuthorizationChanges {
    pub fn new(
        access_key: String,
        protocol: String,
        status_code: String,
        status_message: String,
        signed_document: String,
        issued_at: DateTime<Utc>,
        authorized_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: DocumentStatus::Authorized,
            access_key,
            protocol,
            status_code,
            status_message,
            signed_document,
            issued_at,
            authorized_at,
            updated_at: authorized_at,
        }
    }

    pub fn apply_to(&self, document: &mut FiscalDocument) {
        document.status = self.status;
        document.access_key = Some(self.access_key.clone());
        document.protocol = Some(self.protocol.clone());
        document.status_code = Some(self.status_code.clone());
        document.status_message = Some(self.status_message.clone());
        document.signed_document = Some(self.signed_document.clone());
        document.issued_at = Some(self.issued_at);
        document.authorized_at = Some(self.authorized_at);
        document.updated_at = self.updated_at;
    }
}

/// Applied on `draft -> rejected`.
#[derive(AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = fiscal_documents)]
pub struct RejectionChanges {
    pub status: DocumentStatus,
    pub status_code: String,
    pub status_message: String,
    pub rejection_reason: String,
    pub updated_at: DateTime<Utc>,
}

impl RejectionChanges {
    pub fn new(status_code: String, status_message: String, rejection_reason: String, at: DateTime<Utc>) -> Self {
        Self {
            status: DocumentStatus::Rejected,
            status_code,
            status_message,
            rejection_reason,
            updated_at: at,
        }
    }

    pub fn apply_to(&self, document: &mut FiscalDocument) {
        document.status = self.status;
        document.status_code = Some(self.status_code.clone());
        document.status_message = Some(self.status_message.clone());
        document.rejection_reason = Some(self.rejection_reason.clone());
        document.updated_at = self.updated_at;
    }
}

/// Applied on `authorized -> cancelled`.
#[derive(AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = fiscal_documents)]
pub struct CancellationChanges {
    pub status: DocumentStatus,
    pub cancellation_reason: String,
    pub cancellation_protocol: Option<String>,
    pub cancellation_document: Option<String>,
    pub cancelled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CancellationChanges {
    pub fn new(
        cancellation_reason: String,
        cancellation_protocol: Option<String>,
        cancellation_document: Option<String>,
        cancelled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: DocumentStatus::Cancelled,
            cancellation_reason,
            cancellation_protocol,
            cancellation_document,
            cancelled_at,
            updated_at: cancelled_at,
        }
    }

    pub fn apply_to(&self, document: &mut FiscalDocument) {
        document.status = self.status;
        document.cancellation_reason = Some(self.cancellation_reason.clone());
        if self.cancellation_protocol.is_some() {
            document.cancellation_protocol = self.cancellation_protocol.clone();
        }
        if self.cancellation_document.is_some() {
            document.cancellation_document = self.cancellation_document.clone();
        }
        document.cancelled_at = Some(self.cancelled_at);
        document.updated_at = self.updated_at;
    }
}

/// Listing filter; `None` fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub company_id: Option<Uuid>,
    pub status: Option<DocumentStatus>,
}

impl DocumentFilter {
    pub fn matches(&self, document: &FiscalDocument) -> bool {
        self.company_id.map_or(true, |id| document.company_id == id)
            && self.status.map_or(true, |status| document.status == status)
    }
}

pub mod claim;
pub mod dto;
pub mod item;
pub mod operations;
pub mod validators;

pub use claim::{ClaimOutcome, ClaimRequest, SubmissionClaim};
pub use item::LineItem;
