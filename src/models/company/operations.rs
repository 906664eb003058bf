use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    config::db::Connection,
    error::ServiceError,
    models::company::Company,
    schema::companies::{self, dsl::*},
};

fn company_error(action: &str, err: diesel::result::Error, company: Uuid) -> ServiceError {
    match err {
        diesel::result::Error::NotFound => {
            ServiceError::not_found(format!("Company {} not found", company)).with_tag("company")
        }
        _ => {
            log::error!("Failed to {} company {}: {}", action, company, err);
            ServiceError::internal_server_error(format!("Failed to {} company", action))
                .with_context(|ctx| ctx.with_tag("company").with_detail(err.to_string()))
        }
    }
}

pub fn find_company_by_id(company_id: Uuid, conn: &mut Connection) -> Result<Company, ServiceError> {
    companies
        .find(company_id)
        .select(Company::as_select())
        .first(conn)
        .map_err(|err| company_error("find", err, company_id))
}

/// Takes the company row lock so certificate swaps for one company serialize.
pub fn lock_company(company_id: Uuid, conn: &mut Connection) -> Result<Uuid, ServiceError> {
    companies
        .find(company_id)
        .select(companies::id)
        .for_update()
        .first::<Uuid>(conn)
        .map_err(|err| company_error("lock", err, company_id))
}

pub fn set_active_certificate(
    company_id: Uuid,
    certificate: Uuid,
    at: DateTime<Utc>,
    conn: &mut Connection,
) -> Result<(), ServiceError> {
    diesel::update(companies.find(company_id))
        .set((certificate_id.eq(Some(certificate)), updated_at.eq(at)))
        .execute(conn)
        .map_err(|err| company_error("update", err, company_id))
        .map(|_| ())
}

/// Clears the pointer only if it still points at `certificate`.
pub fn clear_active_certificate(
    company_id: Uuid,
    certificate: Uuid,
    at: DateTime<Utc>,
    conn: &mut Connection,
) -> Result<bool, ServiceError> {
    diesel::update(
        companies
            .find(company_id)
            .filter(certificate_id.eq(Some(certificate))),
    )
    .set((certificate_id.eq(None::<Uuid>), updated_at.eq(at)))
    .execute(conn)
    .map_err(|err| company_error("update", err, company_id))
    .map(|rows| rows > 0)
}
