//! Per-(company, series) document counters.
//!
//! `next_number` is the number the next allocation returns. The row is only
//! ever written by [`reserve_next_number`], inside one transaction holding the
//! row lock.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    config::db::Connection,
    error::ServiceError,
    schema::numbering_sequences::{self, dsl::*},
};

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = numbering_sequences)]
struct NewSequence {
    company_id: Uuid,
    series: i32,
    next_number: i32,
    updated_at: DateTime<Utc>,
}

fn sequence_error(err: diesel::result::Error, company: Uuid, serie: i32) -> ServiceError {
    log::error!(
        "Numbering sequence failure for company {} series {}: {}",
        company,
        serie,
        err
    );
    ServiceError::internal_server_error("Failed to allocate document number").with_context(|ctx| {
        ctx.with_tag("numbering")
            .with_detail(err.to_string())
            .with_metadata("company_id", company.to_string())
            .with_metadata("series", serie.to_string())
    })
}

/// Returns the current counter and advances it by one.
///
/// Must run inside a transaction: the `FOR UPDATE` lock is what keeps two
/// callers for the same (company, series) from reading the same value.
pub fn reserve_next_number(
    company: Uuid,
    serie: i32,
    at: DateTime<Utc>,
    conn: &mut Connection,
) -> Result<i32, ServiceError> {
    diesel::insert_into(numbering_sequences::table)
        .values(NewSequence {
            company_id: company,
            series: serie,
            next_number: 1,
            updated_at: at,
        })
        .on_conflict_do_nothing()
        .execute(conn)
        .map_err(|err| sequence_error(err, company, serie))?;

    let current = numbering_sequences
        .filter(company_id.eq(company).and(series.eq(serie)))
        .select(next_number)
        .for_update()
        .first::<i32>(conn)
        .map_err(|err| sequence_error(err, company, serie))?;

    diesel::update(numbering_sequences.filter(company_id.eq(company).and(series.eq(serie))))
        .set((next_number.eq(current + 1), updated_at.eq(at)))
        .execute(conn)
        .map_err(|err| sequence_error(err, company, serie))?;

    Ok(current)
}
