use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    fiscal::BrazilianState,
    models::fiscal_document::{DocumentModel, FiscalDocument, LineItem},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonType {
    Individual,
    Legal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRequest {
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    /// IBGE municipality code.
    pub city_code: String,
    pub state: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    /// CPF or CNPJ, punctuation allowed.
    pub document: String,
    #[serde(default)]
    pub state_registration: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: AddressRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRequest {
    #[serde(default)]
    pub product_id: Option<Uuid>,
    pub code: String,
    pub description: String,
    pub ncm: String,
    pub cfop: String,
    #[serde(default)]
    pub cest: Option<String>,
    #[serde(default)]
    pub gtin: Option<String>,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub freight: Decimal,
    #[serde(default)]
    pub insurance: Decimal,
    #[serde(default)]
    pub other_expenses: Decimal,
    /// IPI rate in percent, when the product is subject to IPI.
    #[serde(default)]
    pub ipi_rate: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDraftRequest {
    pub company_id: Uuid,
    #[serde(default)]
    pub model: DocumentModel,
    pub customer: CustomerRequest,
    pub items: Vec<ItemRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub justification: String,
}

/// Customer data as validated and stored with the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub id: Option<Uuid>,
    pub person_type: PersonType,
    pub name: String,
    pub document: String,
    pub state_registration: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    pub city_code: String,
    pub state: BrazilianState,
    pub zip_code: String,
}

/// A document with its lines, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub document: FiscalDocument,
    pub items: Vec<LineItem>,
}
