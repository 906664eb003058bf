//! Contract with the external Fiscal Gateway, the service that builds, signs
//! and transmits the XML to SEFAZ.
//!
//! A structured answer from the gateway, success or rejection, is an `Ok`.
//! Only transport problems are a [`GatewayError`], so callers never confuse
//! "SEFAZ said no" with "we could not ask".

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    fiscal::TaxRegime,
    models::{
        company::{Company, SefazEnvironment},
        fiscal_document::{
            dto::{CustomerSnapshot, PersonType},
            DocumentModel, FiscalDocument, LineItem,
        },
    },
};

pub mod http;

pub use http::HttpFiscalGateway;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Fiscal gateway did not answer in time")]
    Timeout,
    #[error("Could not reach the fiscal gateway: {0}")]
    Connection(String),
    #[error("Fiscal gateway answered HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("Fiscal gateway response could not be decoded: {0}")]
    Decode(String),
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Decrypted PKCS#12 bundle and its password, as sent to the gateway.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMaterial {
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
    pub password: String,
}

impl std::fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("content", &format_args!("<{} bytes redacted>", self.content.len()))
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressData {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    pub city_code: String,
    pub state: String,
    pub zip_code: String,
    pub country_code: String,
    pub country: String,
}

impl AddressData {
    #[allow(clippy::too_many_arguments)]
    fn brazilian(
        street: &str,
        number: &str,
        complement: Option<&str>,
        district: &str,
        city: &str,
        city_code: &str,
        state: &str,
        zip_code: &str,
    ) -> Self {
        Self {
            street: street.to_string(),
            number: number.to_string(),
            complement: complement.map(str::to_string),
            district: district.to_string(),
            city: city.to_string(),
            city_code: city_code.to_string(),
            state: state.to_string(),
            zip_code: zip_code.to_string(),
            country_code: "1058".to_string(),
            country: "Brasil".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerData {
    pub document: String,
    pub name: String,
    pub trade_name: String,
    pub state_registration: String,
    /// 1 Simples Nacional (and MEI), 2 Lucro Presumido, 3 Lucro Real.
    pub tax_regime: u8,
    pub address: AddressData,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<&Company> for IssuerData {
    fn from(company: &Company) -> Self {
        let tax_regime = match company.tax_regime {
            TaxRegime::SimplesNacional | TaxRegime::Mei => 1,
            TaxRegime::LucroPresumido => 2,
            TaxRegime::LucroReal => 3,
        };
        Self {
            document: company.document.clone(),
            name: company.legal_name.clone(),
            trade_name: company
                .trade_name
                .clone()
                .unwrap_or_else(|| company.legal_name.clone()),
            state_registration: company.state_registration.clone(),
            tax_regime,
            address: AddressData::brazilian(
                &company.street,
                &company.address_number,
                None,
                &company.district,
                &company.city,
                &company.city_code,
                company.state.as_str(),
                &company.zip_code,
            ),
            email: company.email.clone(),
            phone: company.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerData {
    /// `fisica` or `juridica`.
    pub person_type: String,
    pub document: String,
    pub name: String,
    pub state_registration: Option<String>,
    /// `contribuinte`, `isento` or `nao_contribuinte`.
    pub state_registration_type: String,
    pub address: AddressData,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<&CustomerSnapshot> for CustomerData {
    fn from(customer: &CustomerSnapshot) -> Self {
        let state_registration_type = match customer.state_registration.as_deref() {
            Some("ISENTO") => "isento",
            Some(_) => "contribuinte",
            None => "nao_contribuinte",
        };
        Self {
            person_type: match customer.person_type {
                PersonType::Individual => "fisica",
                PersonType::Legal => "juridica",
            }
            .to_string(),
            document: customer.document.clone(),
            name: customer.name.clone(),
            state_registration: customer.state_registration.clone(),
            state_registration_type: state_registration_type.to_string(),
            address: AddressData::brazilian(
                &customer.street,
                &customer.number,
                customer.complement.as_deref(),
                &customer.district,
                &customer.city,
                &customer.city_code,
                customer.state.as_str(),
                &customer.zip_code,
            ),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxLineData {
    pub cst: String,
    pub base_calc: Decimal,
    pub rate: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcmsData {
    /// CST for normal regimes, empty for the simplified ones.
    pub cst: String,
    pub csosn: Option<String>,
    pub base_calc: Decimal,
    pub rate: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxData {
    pub icms: IcmsData,
    pub ipi: Option<TaxLineData>,
    pub pis: TaxLineData,
    pub cofins: TaxLineData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemData {
    pub item_number: i32,
    pub code: String,
    pub description: String,
    pub ncm: String,
    pub cfop: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_value: Decimal,
    pub total_value: Decimal,
    pub barcode: Option<String>,
    pub cest: Option<String>,
    pub origin: i16,
    pub tax: TaxData,
}

impl From<&LineItem> for ItemData {
    fn from(item: &LineItem) -> Self {
        let ipi = item.ipi_cst.as_ref().map(|cst| TaxLineData {
            cst: cst.clone(),
            base_calc: item.ipi_base,
            rate: item.ipi_rate,
            value: item.ipi_value,
        });
        Self {
            item_number: item.item_number,
            code: item.code.clone(),
            description: item.description.clone(),
            ncm: item.ncm.clone(),
            cfop: item.cfop.clone(),
            unit: item.unit.clone(),
            quantity: item.quantity,
            unit_value: item.unit_price,
            total_value: item.total_gross,
            barcode: item.gtin.clone(),
            cest: item.cest.clone(),
            origin: item.icms_origin,
            tax: TaxData {
                icms: IcmsData {
                    cst: item.icms_cst.clone().unwrap_or_default(),
                    csosn: item.icms_csosn.clone(),
                    base_calc: item.icms_base,
                    rate: item.icms_rate,
                    value: item.icms_value,
                },
                ipi,
                pis: TaxLineData {
                    cst: item.pis_cst.clone(),
                    base_calc: item.pis_base,
                    rate: item.pis_rate,
                    value: item.pis_value,
                },
                cofins: TaxLineData {
                    cst: item.cofins_cst.clone(),
                    base_calc: item.cofins_base,
                    rate: item.cofins_rate,
                    value: item.cofins_value,
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    pub company: IssuerData,
    pub customer: CustomerData,
    pub items: Vec<ItemData>,
    pub certificate: CertificateMaterial,
    pub environment: SefazEnvironment,
    pub series: i32,
    pub number: i32,
    pub model: DocumentModel,
    pub operation_nature: String,
    /// 1 outbound, 0 inbound.
    pub operation_type: u8,
    /// 1 normal issuance.
    pub purpose: u8,
    /// 1 when the buyer is the final consumer.
    pub consumer_operation: u8,
    /// 1 in person, 2 internet.
    pub presence_indicator: u8,
}

impl AuthorizeRequest {
    pub fn build(
        company: &Company,
        document: &FiscalDocument,
        customer: &CustomerSnapshot,
        items: &[LineItem],
        certificate: CertificateMaterial,
    ) -> Self {
        let final_consumer = document.model == DocumentModel::Nfce || customer.person_type == PersonType::Individual;
        Self {
            company: IssuerData::from(company),
            customer: CustomerData::from(customer),
            items: items.iter().map(ItemData::from).collect(),
            certificate,
            environment: company.environment,
            series: document.series,
            number: document.number,
            model: document.model,
            operation_nature: "Venda de mercadoria".to_string(),
            operation_type: 1,
            purpose: 1,
            consumer_operation: u8::from(final_consumer),
            presence_indicator: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    /// Signed XML as returned by SEFAZ.
    #[serde(default, rename = "xml")]
    pub signed_document: Option<String>,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub authorized_at: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationRequest {
    pub access_key: String,
    pub reason: String,
    pub protocol: String,
    pub certificate: CertificateMaterial,
    pub environment: SefazEnvironment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub cancellation_protocol: Option<String>,
    #[serde(default, rename = "xml")]
    pub signed_document: Option<String>,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub cancelled_at: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatusRequest {
    pub state: String,
    pub environment: SefazEnvironment,
    pub certificate: CertificateMaterial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatusResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub status_description: Option<String>,
    #[serde(default)]
    pub response_time: Option<String>,
}

/// The three calls the issuer makes. Implementations own their timeout.
#[async_trait]
pub trait FiscalGateway: Send + Sync {
    async fn authorize(&self, request: AuthorizeRequest) -> Result<AuthorizeResponse, GatewayError>;

    async fn cancel(&self, request: CancellationRequest) -> Result<CancellationResponse, GatewayError>;

    async fn service_status(&self, request: ServiceStatusRequest) -> Result<ServiceStatusResponse, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certificate_material_is_base64_on_the_wire_and_redacted_in_logs() {
        let material = CertificateMaterial {
            content: vec![0x30, 0x82, 0x01],
            password: "segredo".to_string(),
        };
        let json = serde_json::to_value(&material).unwrap();
        assert_eq!(json["content"], "MIIB");

        let debug = format!("{:?}", material);
        assert!(!debug.contains("segredo"));
        assert!(debug.contains("3 bytes redacted"));

        let back: CertificateMaterial = serde_json::from_value(json).unwrap();
        assert_eq!(back, material);
    }

    #[test]
    fn rejection_body_decodes_with_missing_fields() {
        let body = r#"{"success":false,"message":"Rejeicao: Duplicidade de NF-e","statusCode":"539","errors":["dup"]}"#;
        let response: AuthorizeResponse = serde_json::from_str(body).unwrap();
        assert!(!response.success);
        assert_eq!(response.status_code.as_deref(), Some("539"));
        assert_eq!(response.access_key, None);
        assert_eq!(response.errors, vec!["dup".to_string()]);
    }
}
