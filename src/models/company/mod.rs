//! Issuing companies: fiscal identity, series configuration and the pointer
//! to their active signing certificate.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    fiscal::{BrazilianState, TaxRegime},
    models::fiscal_document::DocumentModel,
    schema::companies,
};

text_enum! {
    pub enum CompanyStatus {
        Active => "active",
        Inactive => "inactive",
    }
}

text_enum! {
    /// SEFAZ environment a company issues against.
    pub enum SefazEnvironment {
        Production => "producao",
        Homologation => "homologacao",
    }
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = companies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Company {
    pub id: Uuid,
    pub account_id: Uuid,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub document: String,
    pub state_registration: String,
    pub street: String,
    pub address_number: String,
    pub district: String,
    pub city: String,
    pub city_code: String,
    pub state: BrazilianState,
    pub zip_code: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub tax_regime: TaxRegime,
    pub environment: SefazEnvironment,
    pub status: CompanyStatus,
    pub certificate_id: Option<Uuid>,
    pub nfe_series: i32,
    pub nfce_series: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    pub fn is_active(&self) -> bool {
        self.status == CompanyStatus::Active
    }

    pub fn series_for(&self, model: DocumentModel) -> i32 {
        match model {
            DocumentModel::Nfe => self.nfe_series,
            DocumentModel::Nfce => self.nfce_series,
        }
    }
}

pub mod operations;
