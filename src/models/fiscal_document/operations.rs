//! Database operations for fiscal documents and their lines.
//!
//! Every state change is a conditional update on the expected current status.
//! When no row matches, another caller already moved the document and the
//! operation reports a conflict instead of overwriting.

use chrono::{DateTime, Utc};
use diesel::{prelude::*, result::DatabaseErrorKind};
use uuid::Uuid;

use crate::{
    config::db::Connection,
    constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT},
    error::ServiceError,
    models::fiscal_document::{
        claim::already_claimed, AuthorizationChanges, CancellationChanges, ClaimOutcome, ClaimRequest,
        DocumentFilter, DocumentStatus, DocumentTotals, FiscalDocument, LineItem, RejectionChanges,
        SubmissionClaim,
    },
    schema::{accounts, companies, fiscal_document_items, fiscal_documents, submission_claims},
};

fn query_error(action: &str, err: diesel::result::Error) -> ServiceError {
    log::error!("Failed to {} fiscal document: {}", action, err);
    ServiceError::internal_server_error(format!("Failed to {} fiscal document", action))
        .with_context(|ctx| ctx.with_tag("nfe").with_detail(err.to_string()))
}

fn write_error(action: &str, err: diesel::result::Error) -> ServiceError {
    if let diesel::result::Error::DatabaseError(kind, info) = &err {
        let constraint = info.constraint_name().map(str::to_owned);
        let service_error = match kind {
            DatabaseErrorKind::UniqueViolation => {
                ServiceError::conflict("Document number already used for this company and series")
            }
            DatabaseErrorKind::ForeignKeyViolation
            | DatabaseErrorKind::CheckViolation
            | DatabaseErrorKind::NotNullViolation => ServiceError::bad_request(info.message().to_string()),
            _ => return query_error(action, err),
        };
        log::warn!("Rejected write on fiscal document: {}", err);
        return service_error.with_context(|ctx| {
            let ctx = ctx.with_tag("nfe");
            match constraint {
                Some(name) => ctx.with_metadata("constraint", name),
                None => ctx,
            }
        });
    }
    query_error(action, err)
}

fn stale(document_id: Uuid, expected: DocumentStatus) -> ServiceError {
    ServiceError::conflict(format!("Document {} is no longer {}", document_id, expected)).with_context(|ctx| {
        ctx.with_tag("nfe")
            .with_metadata("document_id", document_id.to_string())
            .with_metadata("expected_status", expected.as_str())
    })
}

/// Inserts a draft and its lines. Callers wrap this in a transaction.
pub fn insert_document_with_items(
    document: FiscalDocument,
    items: Vec<LineItem>,
    conn: &mut Connection,
) -> Result<FiscalDocument, ServiceError> {
    let created = diesel::insert_into(fiscal_documents::table)
        .values(&document)
        .returning(FiscalDocument::as_returning())
        .get_result(conn)
        .map_err(|err| write_error("create", err))?;

    diesel::insert_into(fiscal_document_items::table)
        .values(&items)
        .execute(conn)
        .map_err(|err| write_error("create items of", err))?;

    Ok(created)
}

pub fn find_document_by_id(document_id: Uuid, conn: &mut Connection) -> Result<FiscalDocument, ServiceError> {
    fiscal_documents::table
        .find(document_id)
        .select(FiscalDocument::as_select())
        .first(conn)
        .map_err(|err| match err {
            diesel::result::Error::NotFound => not_found(document_id),
            _ => query_error("find", err),
        })
}

pub fn find_items_by_document(document_id: Uuid, conn: &mut Connection) -> Result<Vec<LineItem>, ServiceError> {
    fiscal_document_items::table
        .filter(fiscal_document_items::document_id.eq(document_id))
        .order(fiscal_document_items::item_number.asc())
        .select(LineItem::as_select())
        .load(conn)
        .map_err(|err| query_error("load items of", err))
}

/// Newest first. Pagination inputs are clamped to `1..=MAX_PAGE_LIMIT` and `offset >= 0`.
pub fn list_documents(
    filter: &DocumentFilter,
    limit: i64,
    offset: i64,
    conn: &mut Connection,
) -> Result<Vec<FiscalDocument>, ServiceError> {
    let safe_limit = if limit <= 0 {
        DEFAULT_PAGE_LIMIT
    } else {
        limit.min(MAX_PAGE_LIMIT)
    };

    let mut query = fiscal_documents::table.into_boxed();
    if let Some(company) = filter.company_id {
        query = query.filter(fiscal_documents::company_id.eq(company));
    }
    if let Some(current) = filter.status {
        query = query.filter(fiscal_documents::status.eq(current));
    }

    query
        .order(fiscal_documents::created_at.desc())
        .limit(safe_limit)
        .offset(offset.max(0))
        .select(FiscalDocument::as_select())
        .load(conn)
        .map_err(|err| query_error("list", err))
}

/// Authorized or cancelled documents created in `[start, end)` across every
/// company of the account.
fn count_issued_in_period(
    account: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    conn: &mut Connection,
) -> Result<i64, ServiceError> {
    fiscal_documents::table
        .inner_join(companies::table)
        .filter(companies::account_id.eq(account))
        .filter(
            fiscal_documents::status
                .eq(DocumentStatus::Authorized)
                .or(fiscal_documents::status.eq(DocumentStatus::Cancelled)),
        )
        .filter(fiscal_documents::created_at.ge(start))
        .filter(fiscal_documents::created_at.lt(end))
        .count()
        .get_result(conn)
        .map_err(|err| query_error("count", err))
}

fn not_found(document_id: Uuid) -> ServiceError {
    ServiceError::not_found(format!("Fiscal document {} not found", document_id)).with_tag("nfe")
}

/// Locks the document row for the rest of the transaction and returns its status.
fn lock_document(document_id: Uuid, conn: &mut Connection) -> Result<DocumentStatus, ServiceError> {
    fiscal_documents::table
        .find(document_id)
        .select(fiscal_documents::status)
        .for_update()
        .first::<DocumentStatus>(conn)
        .optional()
        .map_err(|err| query_error("lock", err))?
        .ok_or_else(|| not_found(document_id))
}

fn find_claim(document_id: Uuid, conn: &mut Connection) -> Result<Option<SubmissionClaim>, ServiceError> {
    submission_claims::table
        .find(document_id)
        .select(SubmissionClaim::as_select())
        .first(conn)
        .optional()
        .map_err(|err| query_error("load the submission claim of", err))
}

/// Live claims of the account on documents created in `[start, end)`.
fn count_live_claims(request: &ClaimRequest, conn: &mut Connection) -> Result<i64, ServiceError> {
    submission_claims::table
        .inner_join(fiscal_documents::table)
        .filter(submission_claims::account_id.eq(request.claim.account_id))
        .filter(submission_claims::claimed_at.ge(request.live_after))
        .filter(fiscal_documents::created_at.ge(request.period_start))
        .filter(fiscal_documents::created_at.lt(request.period_end))
        .count()
        .get_result(conn)
        .map_err(|err| query_error("count submission claims of", err))
}

/// Claims a draft for submission. Must run inside a transaction: the account
/// row lock serializes every claim of the account, so the cap check and the
/// insert cannot interleave with a concurrent submission.
pub fn claim_submission(request: &ClaimRequest, conn: &mut Connection) -> Result<ClaimOutcome, ServiceError> {
    let claim = &request.claim;
    accounts::table
        .find(claim.account_id)
        .select(accounts::id)
        .for_update()
        .first::<Uuid>(conn)
        .map_err(|err| match err {
            diesel::result::Error::NotFound => {
                ServiceError::not_found(format!("Account {} not found", claim.account_id)).with_tag("account")
            }
            _ => query_error("lock the account of", err),
        })?;

    if lock_document(claim.document_id, conn)? != DocumentStatus::Draft {
        return Err(stale(claim.document_id, DocumentStatus::Draft));
    }
    if let Some(existing) = find_claim(claim.document_id, conn)? {
        if existing.is_live(request.live_after) {
            return Err(already_claimed(claim.document_id));
        }
        log::warn!(
            "Taking over abandoned submission claim on {} from {}",
            claim.document_id,
            existing.claimed_at
        );
    }

    if request.monthly_cap.is_some() {
        let issued = count_issued_in_period(claim.account_id, request.period_start, request.period_end, conn)?;
        let in_flight = count_live_claims(request, conn)?;
        if request.cap_reached(issued, in_flight) {
            return Ok(ClaimOutcome::CapReached { issued, in_flight });
        }
    }

    diesel::insert_into(submission_claims::table)
        .values(claim)
        .on_conflict(submission_claims::document_id)
        .do_update()
        .set((
            submission_claims::account_id.eq(claim.account_id),
            submission_claims::claimed_at.eq(claim.claimed_at),
        ))
        .execute(conn)
        .map_err(|err| write_error("claim", err))?;

    Ok(ClaimOutcome::Claimed)
}

pub fn release_submission(document_id: Uuid, conn: &mut Connection) -> Result<(), ServiceError> {
    diesel::delete(submission_claims::table.filter(submission_claims::document_id.eq(document_id)))
        .execute(conn)
        .map(|_| ())
        .map_err(|err| query_error("release the submission claim of", err))
}

/// Swaps the lines of a draft and rewrites its totals. Callers wrap this in a
/// transaction so a lost race leaves the old lines in place. A draft under a
/// submission claim is not editable.
pub fn replace_draft_items(
    document_id: Uuid,
    items: Vec<LineItem>,
    totals: DocumentTotals,
    at: DateTime<Utc>,
    conn: &mut Connection,
) -> Result<FiscalDocument, ServiceError> {
    if lock_document(document_id, conn)? != DocumentStatus::Draft {
        return Err(stale(document_id, DocumentStatus::Draft));
    }
    if find_claim(document_id, conn)?.is_some() {
        return Err(already_claimed(document_id));
    }

    let updated = diesel::update(
        fiscal_documents::table
            .filter(fiscal_documents::id.eq(document_id))
            .filter(fiscal_documents::status.eq(DocumentStatus::Draft)),
    )
    .set((&totals, fiscal_documents::updated_at.eq(at)))
    .returning(FiscalDocument::as_returning())
    .get_result(conn)
    .optional()
    .map_err(|err| query_error("update", err))?
    .ok_or_else(|| stale(document_id, DocumentStatus::Draft))?;

    diesel::delete(fiscal_document_items::table.filter(fiscal_document_items::document_id.eq(document_id)))
        .execute(conn)
        .map_err(|err| query_error("delete items of", err))?;
    diesel::insert_into(fiscal_document_items::table)
        .values(&items)
        .execute(conn)
        .map_err(|err| write_error("create items of", err))?;

    Ok(updated)
}

pub fn apply_authorization(
    document_id: Uuid,
    changes: &AuthorizationChanges,
    conn: &mut Connection,
) -> Result<FiscalDocument, ServiceError> {
    diesel::update(
        fiscal_documents::table
            .filter(fiscal_documents::id.eq(document_id))
            .filter(fiscal_documents::status.eq(DocumentStatus::Draft)),
    )
    .set(changes)
    .returning(FiscalDocument::as_returning())
    .get_result(conn)
    .optional()
    .map_err(|err| write_error("authorize", err))?
    .ok_or_else(|| stale(document_id, DocumentStatus::Draft))
}

pub fn apply_rejection(
    document_id: Uuid,
    changes: &RejectionChanges,
    conn: &mut Connection,
) -> Result<FiscalDocument, ServiceError> {
    diesel::update(
        fiscal_documents::table
            .filter(fiscal_documents::id.eq(document_id))
            .filter(fiscal_documents::status.eq(DocumentStatus::Draft)),
    )
    .set(changes)
    .returning(FiscalDocument::as_returning())
    .get_result(conn)
    .optional()
    .map_err(|err| write_error("reject", err))?
    .ok_or_else(|| stale(document_id, DocumentStatus::Draft))
}

pub fn apply_cancellation(
    document_id: Uuid,
    changes: &CancellationChanges,
    conn: &mut Connection,
) -> Result<FiscalDocument, ServiceError> {
    diesel::update(
        fiscal_documents::table
            .filter(fiscal_documents::id.eq(document_id))
            .filter(fiscal_documents::status.eq(DocumentStatus::Authorized)),
    )
    .set(changes)
    .returning(FiscalDocument::as_returning())
    .get_result(conn)
    .optional()
    .map_err(|err| write_error("cancel", err))?
    .ok_or_else(|| stale(document_id, DocumentStatus::Authorized))
}
