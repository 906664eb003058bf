use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    config::db::Pool,
    error::ServiceResult,
    models::{
        account::{self, Account},
        certificate::{operations as certificate_ops, Certificate},
        company::{operations as company_ops, Company},
        fiscal_document::{
            operations as document_ops, AuthorizationChanges, CancellationChanges, ClaimOutcome, ClaimRequest,
            DocumentFilter, DocumentTotals, FiscalDocument, LineItem, RejectionChanges,
        },
        numbering,
    },
    repository::{CertificateStore, CompanyDirectory, DocumentStore, SequenceStore},
    services::functional_patterns::{run_query, QueryReader},
};

/// Postgres-backed store. Every call checks a connection out of the pool for
/// the duration of one reader.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    fn run<T>(&self, reader: QueryReader<T>) -> ServiceResult<T> {
        run_query(reader, &self.pool)
    }
}

impl DocumentStore for PgStore {
    fn insert_draft(&self, document: FiscalDocument, items: Vec<LineItem>) -> ServiceResult<FiscalDocument> {
        self.run(
            QueryReader::new(move |conn| {
                document_ops::insert_document_with_items(document.clone(), items.clone(), conn)
            })
            .transaction(),
        )
    }

    fn find_document(&self, document_id: Uuid) -> ServiceResult<FiscalDocument> {
        self.run(QueryReader::new(move |conn| document_ops::find_document_by_id(document_id, conn)))
    }

    fn find_items(&self, document_id: Uuid) -> ServiceResult<Vec<LineItem>> {
        self.run(QueryReader::new(move |conn| document_ops::find_items_by_document(document_id, conn)))
    }

    fn list_documents(&self, filter: &DocumentFilter, limit: i64, offset: i64) -> ServiceResult<Vec<FiscalDocument>> {
        let filter = filter.clone();
        self.run(QueryReader::new(move |conn| {
            document_ops::list_documents(&filter, limit, offset, conn)
        }))
    }

    fn claim_submission(&self, request: &ClaimRequest) -> ServiceResult<ClaimOutcome> {
        let request = request.clone();
        self.run(QueryReader::new(move |conn| document_ops::claim_submission(&request, conn)).transaction())
    }

    fn release_submission(&self, document_id: Uuid) -> ServiceResult<()> {
        self.run(QueryReader::new(move |conn| document_ops::release_submission(document_id, conn)))
    }

    fn replace_items(
        &self,
        document_id: Uuid,
        items: Vec<LineItem>,
        totals: DocumentTotals,
        at: DateTime<Utc>,
    ) -> ServiceResult<FiscalDocument> {
        self.run(
            QueryReader::new(move |conn| {
                document_ops::replace_draft_items(document_id, items.clone(), totals.clone(), at, conn)
            })
            .transaction(),
        )
    }

    fn mark_authorized(&self, document_id: Uuid, changes: &AuthorizationChanges) -> ServiceResult<FiscalDocument> {
        let changes = changes.clone();
        let reader = QueryReader::new(move |conn| document_ops::apply_authorization(document_id, &changes, conn))
            .zip(QueryReader::new(move |conn| document_ops::release_submission(document_id, conn)))
            .map(|(document, _)| document)
            .transaction();
        self.run(reader)
    }

    fn mark_rejected(&self, document_id: Uuid, changes: &RejectionChanges) -> ServiceResult<FiscalDocument> {
        let changes = changes.clone();
        let reader = QueryReader::new(move |conn| document_ops::apply_rejection(document_id, &changes, conn))
            .zip(QueryReader::new(move |conn| document_ops::release_submission(document_id, conn)))
            .map(|(document, _)| document)
            .transaction();
        self.run(reader)
    }

    fn mark_cancelled(&self, document_id: Uuid, changes: &CancellationChanges) -> ServiceResult<FiscalDocument> {
        let changes = changes.clone();
        self.run(QueryReader::new(move |conn| {
            document_ops::apply_cancellation(document_id, &changes, conn)
        }))
    }
}

impl CompanyDirectory for PgStore {
    fn find_company(&self, company_id: Uuid) -> ServiceResult<Company> {
        self.run(QueryReader::new(move |conn| company_ops::find_company_by_id(company_id, conn)))
    }

    fn find_account(&self, account_id: Uuid) -> ServiceResult<Account> {
        self.run(QueryReader::new(move |conn| account::find_account_by_id(account_id, conn)))
    }
}

impl SequenceStore for PgStore {
    fn next_number(&self, company_id: Uuid, series: i32, at: DateTime<Utc>) -> ServiceResult<i32> {
        self.run(
            QueryReader::new(move |conn| numbering::reserve_next_number(company_id, series, at, conn)).transaction(),
        )
    }
}

impl CertificateStore for PgStore {
    fn activate(&self, certificate: Certificate) -> ServiceResult<Certificate> {
        let company_id = certificate.company_id;
        let at = certificate.created_at;

        let reader = QueryReader::new(move |conn| company_ops::lock_company(company_id, conn))
            .followed_by(QueryReader::new(move |conn| {
                certificate_ops::deactivate_company_certificates(company_id, at, conn)
            }))
            .followed_by(QueryReader::new(move |conn| {
                certificate_ops::insert_certificate(certificate.clone(), conn)
            }))
            .and_then(|stored: Certificate| {
                QueryReader::new(move |conn| {
                    company_ops::set_active_certificate(stored.company_id, stored.id, stored.created_at, conn)
                        .map(|_| stored.clone())
                })
            })
            .transaction();

        self.run(reader)
    }

    fn find_certificate(&self, certificate_id: Uuid) -> ServiceResult<Certificate> {
        self.run(QueryReader::new(move |conn| {
            certificate_ops::find_certificate_by_id(certificate_id, conn)
        }))
    }

    fn find_active(&self, company_id: Uuid) -> ServiceResult<Option<Certificate>> {
        self.run(QueryReader::new(move |conn| {
            certificate_ops::find_active_certificate(company_id, conn)
        }))
    }

    fn list_by_company(&self, company_id: Uuid) -> ServiceResult<Vec<Certificate>> {
        self.run(QueryReader::new(move |conn| {
            certificate_ops::list_certificates_by_company(company_id, conn)
        }))
    }

    fn count_active(&self, company_id: Uuid) -> ServiceResult<i64> {
        self.run(QueryReader::new(move |conn| {
            certificate_ops::count_active_by_company(company_id, conn)
        }))
    }

    fn expire(&self, now: DateTime<Utc>, only: Option<Uuid>) -> ServiceResult<usize> {
        self.run(QueryReader::new(move |conn| certificate_ops::expire_certificates(now, only, conn)))
    }

    fn find_expiring(&self, now: DateTime<Utc>, until: DateTime<Utc>) -> ServiceResult<Vec<Certificate>> {
        self.run(QueryReader::new(move |conn| {
            certificate_ops::find_expiring_certificates(now, until, conn)
        }))
    }

    fn delete(&self, certificate_id: Uuid, at: DateTime<Utc>) -> ServiceResult<Certificate> {
        let reader = QueryReader::new(move |conn| certificate_ops::find_certificate_by_id(certificate_id, conn))
            .and_then(move |certificate: Certificate| {
                QueryReader::new(move |conn| {
                    company_ops::lock_company(certificate.company_id, conn)?;
                    company_ops::clear_active_certificate(certificate.company_id, certificate.id, at, conn)?;
                    certificate_ops::delete_certificate(certificate.id, conn)?;
                    Ok(certificate.clone())
                })
            })
            .transaction();

        self.run(reader)
    }
}
