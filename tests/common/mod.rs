#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use openssl::{
    asn1::Asn1Time,
    ec::{EcGroup, EcKey},
    hash::MessageDigest,
    nid::Nid,
    pkcs12::Pkcs12,
    pkey::PKey,
    x509::{X509NameBuilder, X509},
};
use rust_decimal::Decimal;
use uuid::Uuid;

use nfe_issuer::{
    fiscal::{BrazilianState, TaxRegime},
    gateway::{
        AuthorizeRequest, AuthorizeResponse, CancellationRequest, CancellationResponse, FiscalGateway, GatewayError,
        ServiceStatusRequest, ServiceStatusResponse,
    },
    models::{
        account::{Account, AccountStatus},
        company::{Company, CompanyStatus, SefazEnvironment},
        fiscal_document::{
            dto::{AddressRequest, CreateDraftRequest, CustomerRequest, ItemRequest},
            DocumentModel,
        },
    },
    repository::InMemoryStore,
    services::{
        certificate_service::{CertificateUpload, CertificateVault},
        nfe_document_service::NfeDocumentService,
        numbering_service::NumberingAllocator,
    },
    utils::{cipher::SecretCipher, clock::FixedClock},
};

pub const CERT_PASSWORD: &str = "a1-senha";
pub const ACCESS_KEY: &str = "35250611222333000181550010000000011000000019";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
}

/// Self-signed EC credential packed as PKCS#12 DER.
pub fn pkcs12_bundle(not_before: DateTime<Utc>, not_after: DateTime<Utc>, password: &str) -> Vec<u8> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let pkey = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, "EMPRESA TESTE LTDA:11222333000181")
        .unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&pkey).unwrap();
    builder
        .set_not_before(&Asn1Time::from_unix(not_before.timestamp()).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::from_unix(not_after.timestamp()).unwrap())
        .unwrap();
    builder.sign(&pkey, MessageDigest::sha256()).unwrap();
    let cert = builder.build();

    Pkcs12::builder()
        .name("a1")
        .pkey(&pkey)
        .cert(&cert)
        .build2(password)
        .unwrap()
        .to_der()
        .unwrap()
}

pub fn account(max_nfes_per_month: i32) -> Account {
    Account {
        id: Uuid::new_v4(),
        name: "Conta Teste".to_string(),
        max_nfes_per_month,
        status: AccountStatus::Active,
        created_at: start_time(),
        updated_at: start_time(),
    }
}

pub fn company(account_id: Uuid, state: BrazilianState) -> Company {
    Company {
        id: Uuid::new_v4(),
        account_id,
        legal_name: "Empresa Teste LTDA".to_string(),
        trade_name: Some("Empresa Teste".to_string()),
        document: "11222333000181".to_string(),
        state_registration: "123456789".to_string(),
        street: "Avenida Paulista".to_string(),
        address_number: "1000".to_string(),
        district: "Bela Vista".to_string(),
        city: "Sao Paulo".to_string(),
        city_code: "3550308".to_string(),
        state,
        zip_code: "01310100".to_string(),
        phone: None,
        email: None,
        tax_regime: TaxRegime::LucroPresumido,
        environment: SefazEnvironment::Homologation,
        status: CompanyStatus::Active,
        certificate_id: None,
        nfe_series: 1,
        nfce_series: 2,
        created_at: start_time(),
        updated_at: start_time(),
    }
}

pub fn customer(state: &str) -> CustomerRequest {
    CustomerRequest {
        id: None,
        name: "Maria da Silva".to_string(),
        document: "529.982.247-25".to_string(),
        state_registration: None,
        email: Some("maria@example.com".to_string()),
        phone: None,
        address: AddressRequest {
            street: "Rua das Flores".to_string(),
            number: "10".to_string(),
            complement: None,
            district: "Centro".to_string(),
            city: "Cidade".to_string(),
            city_code: "3304557".to_string(),
            state: state.to_string(),
            zip_code: "20040-020".to_string(),
        },
    }
}

pub fn item(unit_price: i64, quantity: i64) -> ItemRequest {
    ItemRequest {
        product_id: None,
        code: "SKU-1".to_string(),
        description: "Parafuso sextavado".to_string(),
        ncm: "73181500".to_string(),
        cfop: "5102".to_string(),
        cest: None,
        gtin: None,
        unit: "un".to_string(),
        quantity: Decimal::from(quantity),
        unit_price: Decimal::from(unit_price),
        discount: Decimal::ZERO,
        freight: Decimal::ZERO,
        insurance: Decimal::ZERO,
        other_expenses: Decimal::ZERO,
        ipi_rate: None,
    }
}

pub fn draft_request(company_id: Uuid, customer_state: &str) -> CreateDraftRequest {
    CreateDraftRequest {
        company_id,
        model: DocumentModel::Nfe,
        customer: customer(customer_state),
        items: vec![item(100, 2)],
    }
}

pub fn authorized_response() -> AuthorizeResponse {
    AuthorizeResponse {
        success: true,
        message: "Autorizado o uso da NF-e".to_string(),
        access_key: Some(ACCESS_KEY.to_string()),
        protocol: Some("135250000000001".to_string()),
        signed_document: Some("<nfeProc>assinado</nfeProc>".to_string()),
        status_code: Some("100".to_string()),
        authorized_at: None,
        errors: Vec::new(),
    }
}

pub fn rejected_response(code: &str, message: &str) -> AuthorizeResponse {
    AuthorizeResponse {
        success: false,
        message: message.to_string(),
        access_key: None,
        protocol: None,
        signed_document: None,
        status_code: Some(code.to_string()),
        authorized_at: None,
        errors: Vec::new(),
    }
}

pub fn cancelled_response() -> CancellationResponse {
    CancellationResponse {
        success: true,
        message: "Evento registrado".to_string(),
        cancellation_protocol: Some("135250000000002".to_string()),
        signed_document: Some("<procEventoNFe/>".to_string()),
        status_code: Some("135".to_string()),
        cancelled_at: None,
        errors: Vec::new(),
    }
}

/// Gateway double that replays queued answers and records what it was sent.
#[derive(Default)]
pub struct ScriptedGateway {
    authorize: Mutex<VecDeque<Result<AuthorizeResponse, GatewayError>>>,
    cancel: Mutex<VecDeque<Result<CancellationResponse, GatewayError>>>,
    status: Mutex<VecDeque<Result<ServiceStatusResponse, GatewayError>>>,
    delay: Mutex<Option<StdDuration>>,
    pub authorize_requests: Mutex<Vec<AuthorizeRequest>>,
    pub cancel_requests: Mutex<Vec<CancellationRequest>>,
    pub status_requests: Mutex<Vec<ServiceStatusRequest>>,
}

impl ScriptedGateway {
    pub fn push_authorize(&self, outcome: Result<AuthorizeResponse, GatewayError>) {
        self.authorize.lock().unwrap().push_back(outcome);
    }

    pub fn push_cancel(&self, outcome: Result<CancellationResponse, GatewayError>) {
        self.cancel.lock().unwrap().push_back(outcome);
    }

    pub fn push_status(&self, outcome: Result<ServiceStatusResponse, GatewayError>) {
        self.status.lock().unwrap().push_back(outcome);
    }

    pub fn delay_by(&self, delay: StdDuration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.authorize_requests.lock().unwrap().len()
            + self.cancel_requests.lock().unwrap().len()
            + self.status_requests.lock().unwrap().len()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl FiscalGateway for ScriptedGateway {
    async fn authorize(&self, request: AuthorizeRequest) -> Result<AuthorizeResponse, GatewayError> {
        self.authorize_requests.lock().unwrap().push(request);
        self.pause().await;
        let next = self.authorize.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(GatewayError::Connection("no scripted answer".to_string())))
    }

    async fn cancel(&self, request: CancellationRequest) -> Result<CancellationResponse, GatewayError> {
        self.cancel_requests.lock().unwrap().push(request);
        self.pause().await;
        let next = self.cancel.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(GatewayError::Connection("no scripted answer".to_string())))
    }

    async fn service_status(&self, request: ServiceStatusRequest) -> Result<ServiceStatusResponse, GatewayError> {
        self.status_requests.lock().unwrap().push(request);
        self.pause().await;
        let next = self.status.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(GatewayError::Connection("no scripted answer".to_string())))
    }
}

/// Everything a lifecycle test needs, wired against in-memory state.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub gateway: Arc<ScriptedGateway>,
    pub vault: CertificateVault,
    pub service: NfeDocumentService,
    pub account: Account,
    pub company: Company,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_account(account(0), BrazilianState::Sp)
    }

    pub fn with_account(account: Account, state: BrazilianState) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(start_time()));
        let gateway = Arc::new(ScriptedGateway::default());
        let company = company(account.id, state);
        store.insert_account(account.clone()).unwrap();
        store.insert_company(company.clone()).unwrap();

        let cipher = SecretCipher::derive("integration-operator-secret", "integration-salt").unwrap();
        let vault = CertificateVault::new(store.clone(), store.clone(), cipher, clock.clone());
        let numbering = NumberingAllocator::new(store.clone(), clock.clone());
        let service = NfeDocumentService::new(
            store.clone(),
            store.clone(),
            numbering,
            vault.clone(),
            gateway.clone(),
            clock.clone(),
        );

        Self {
            store,
            clock,
            gateway,
            vault,
            service,
            account,
            company,
        }
    }

    /// Uploads a certificate valid for a year around the start time.
    pub fn with_certificate(self) -> Self {
        let der = pkcs12_bundle(
            start_time() - Duration::days(30),
            start_time() + Duration::days(365),
            CERT_PASSWORD,
        );
        self.vault
            .upload(
                self.company.id,
                CertificateUpload {
                    name: "A1 2025".to_string(),
                    content: der,
                    password: CERT_PASSWORD.to_string(),
                },
            )
            .unwrap();
        self
    }
}
