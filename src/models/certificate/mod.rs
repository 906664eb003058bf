//! Encrypted signing certificates bound to a company.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::certificates;

text_enum! {
    pub enum CertificateStatus {
        Active => "active",
        Inactive => "inactive",
        Expired => "expired",
    }
}

/// A stored certificate. Content and password are sealed with the vault cipher
/// and never serialized.
#[derive(Queryable, Selectable, Identifiable, Insertable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = certificates)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Certificate {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub subject: String,
    #[serde(skip_serializing)]
    pub encrypted_content: Vec<u8>,
    #[serde(skip_serializing)]
    pub encrypted_password: Vec<u8>,
    pub not_before: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: CertificateStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Certificate {
    pub fn is_active(&self) -> bool {
        self.status == CertificateStatus::Active
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_days()
    }
}

pub mod operations;
