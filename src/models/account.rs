//! Account limits consulted at authorization time.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{config::db::Connection, error::ServiceError, schema::accounts};

text_enum! {
    pub enum AccountStatus {
        Active => "active",
        Suspended => "suspended",
        Cancelled => "cancelled",
    }
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    /// Zero means no monthly cap.
    pub max_nfes_per_month: i32,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn monthly_cap(&self) -> Option<i64> {
        (self.max_nfes_per_month > 0).then_some(i64::from(self.max_nfes_per_month))
    }
}

pub fn find_account_by_id(account_id: Uuid, conn: &mut Connection) -> Result<Account, ServiceError> {
    accounts::table
        .find(account_id)
        .select(Account::as_select())
        .first(conn)
        .map_err(|err| match err {
            diesel::result::Error::NotFound => {
                ServiceError::not_found(format!("Account {} not found", account_id))
                    .with_tag("account")
            }
            _ => {
                log::error!("Failed to find account: {}", err);
                ServiceError::internal_server_error("Failed to find account")
                    .with_context(|ctx| ctx.with_tag("account").with_detail(err.to_string()))
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(cap: i32) -> Account {
        Account {
            id: Uuid::new_v4(),
            name: "Escritorio".to_string(),
            max_nfes_per_month: cap,
            status: AccountStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn positive_cap_is_reported() {
        assert_eq!(account(3).monthly_cap(), Some(3));
    }

    #[test]
    fn zero_cap_is_unlimited() {
        assert_eq!(account(0).monthly_cap(), None);
        assert_eq!(account(-1).monthly_cap(), None);
    }
}
