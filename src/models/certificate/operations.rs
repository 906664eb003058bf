use chrono::{DateTime, Utc};
use diesel::{prelude::*, result::DatabaseErrorKind};
use uuid::Uuid;

use crate::{
    config::db::Connection,
    error::ServiceError,
    models::certificate::{Certificate, CertificateStatus},
    schema::certificates::dsl::*,
};

fn query_error(action: &str, err: diesel::result::Error) -> ServiceError {
    log::error!("Failed to {} certificate: {}", action, err);
    ServiceError::internal_server_error(format!("Failed to {} certificate", action))
        .with_context(|ctx| ctx.with_tag("certificate").with_detail(err.to_string()))
}

pub fn insert_certificate(certificate: Certificate, conn: &mut Connection) -> Result<Certificate, ServiceError> {
    diesel::insert_into(certificates)
        .values(&certificate)
        .returning(Certificate::as_returning())
        .get_result(conn)
        .map_err(|err| match &err {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                ServiceError::conflict("Company already has an active certificate").with_context(|ctx| {
                    ctx.with_tag("certificate")
                        .with_metadata("constraint", info.constraint_name().unwrap_or_default())
                })
            }
            _ => query_error("create", err),
        })
}

pub fn find_certificate_by_id(certificate_id: Uuid, conn: &mut Connection) -> Result<Certificate, ServiceError> {
    certificates
        .find(certificate_id)
        .select(Certificate::as_select())
        .first(conn)
        .map_err(|err| match err {
            diesel::result::Error::NotFound => {
                ServiceError::not_found(format!("Certificate {} not found", certificate_id))
                    .with_tag("certificate")
            }
            _ => query_error("find", err),
        })
}

pub fn find_active_certificate(company: Uuid, conn: &mut Connection) -> Result<Option<Certificate>, ServiceError> {
    certificates
        .filter(company_id.eq(company))
        .filter(status.eq(CertificateStatus::Active))
        .select(Certificate::as_select())
        .first(conn)
        .optional()
        .map_err(|err| query_error("find", err))
}

pub fn list_certificates_by_company(company: Uuid, conn: &mut Connection) -> Result<Vec<Certificate>, ServiceError> {
    certificates
        .filter(company_id.eq(company))
        .order(created_at.desc())
        .select(Certificate::as_select())
        .load(conn)
        .map_err(|err| query_error("list", err))
}

pub fn count_active_by_company(company: Uuid, conn: &mut Connection) -> Result<i64, ServiceError> {
    certificates
        .filter(company_id.eq(company))
        .filter(status.eq(CertificateStatus::Active))
        .count()
        .get_result(conn)
        .map_err(|err| query_error("count", err))
}

pub fn deactivate_company_certificates(
    company: Uuid,
    at: DateTime<Utc>,
    conn: &mut Connection,
) -> Result<usize, ServiceError> {
    diesel::update(
        certificates
            .filter(company_id.eq(company))
            .filter(status.eq(CertificateStatus::Active)),
    )
    .set((status.eq(CertificateStatus::Inactive), updated_at.eq(at)))
    .execute(conn)
    .map_err(|err| query_error("deactivate", err))
}

/// Flips `active` rows whose expiry is before `now` to `expired`.
pub fn expire_certificates(
    now: DateTime<Utc>,
    only: Option<Uuid>,
    conn: &mut Connection,
) -> Result<usize, ServiceError> {
    let mut query = diesel::update(certificates)
        .filter(status.eq(CertificateStatus::Active))
        .filter(expires_at.lt(now))
        .into_boxed();
    if let Some(certificate_id) = only {
        query = query.filter(id.eq(certificate_id));
    }
    query
        .set((status.eq(CertificateStatus::Expired), updated_at.eq(now)))
        .execute(conn)
        .map_err(|err| query_error("expire", err))
}

pub fn find_expiring_certificates(
    now: DateTime<Utc>,
    until: DateTime<Utc>,
    conn: &mut Connection,
) -> Result<Vec<Certificate>, ServiceError> {
    certificates
        .filter(status.eq(CertificateStatus::Active))
        .filter(expires_at.ge(now))
        .filter(expires_at.le(until))
        .order(expires_at.asc())
        .select(Certificate::as_select())
        .load(conn)
        .map_err(|err| query_error("list", err))
}

pub fn delete_certificate(certificate_id: Uuid, conn: &mut Connection) -> Result<usize, ServiceError> {
    let deleted = diesel::delete(certificates.find(certificate_id))
        .execute(conn)
        .map_err(|err| query_error("delete", err))?;
    if deleted == 0 {
        Err(ServiceError::not_found(format!("Certificate {} not found", certificate_id))
            .with_tag("certificate"))
    } else {
        Ok(deleted)
    }
}
