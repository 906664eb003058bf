//! Certificate Vault: stores A1 signing certificates encrypted at rest and
//! hands the decrypted material to the lifecycle only when it is usable.

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::{
    error::{CertificateProblem, ServiceError, ServiceResult},
    gateway::CertificateMaterial,
    models::certificate::{Certificate, CertificateStatus},
    repository::{CertificateStore, CompanyDirectory},
    services::functional_patterns::{validation_rules, Validator},
    utils::{
        cipher::{CipherError, SecretCipher},
        clock::Clock,
        pkcs12::{self, CredentialError},
    },
};

/// An uploaded `.pfx` / `.p12` file and its password.
#[derive(Clone)]
pub struct CertificateUpload {
    pub name: String,
    pub content: Vec<u8>,
    pub password: String,
}

impl std::fmt::Debug for CertificateUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateUpload")
            .field("name", &self.name)
            .field("content", &format_args!("<{} bytes>", self.content.len()))
            .field("password", &"<redacted>")
            .finish()
    }
}

fn upload_validator() -> Validator<CertificateUpload> {
    Validator::new()
        .rule(|upload: &CertificateUpload| validation_rules::required("certificate name")(&upload.name))
        .rule(|upload: &CertificateUpload| validation_rules::max_length("certificate name", 120)(&upload.name))
        .rule(|upload: &CertificateUpload| {
            if upload.content.is_empty() {
                Err(ServiceError::bad_request("certificate file is required").with_metadata("field", "content"))
            } else {
                Ok(())
            }
        })
}

fn credential_problem(err: CredentialError) -> ServiceError {
    let problem = match err {
        CredentialError::WrongPassword => CertificateProblem::WrongPassword,
        CredentialError::Corrupt | CredentialError::Incomplete(_) | CredentialError::InvalidValidity(_) => {
            CertificateProblem::CorruptPayload
        }
    };
    ServiceError::certificate_unusable(problem, err.to_string()).with_tag("certificate")
}

fn sealing_error(err: CipherError) -> ServiceError {
    log::error!("Failed to seal certificate secret: {}", err);
    ServiceError::internal_server_error("Failed to encrypt certificate")
        .with_context(|ctx| ctx.with_tag("certificate").with_detail(err.to_string()))
}

fn unsealing_error(certificate: &Certificate, err: CipherError) -> ServiceError {
    log::error!("Certificate {} failed integrity check: {}", certificate.id, err);
    ServiceError::certificate_unusable(
        CertificateProblem::IntegrityFailure,
        "Stored certificate could not be decrypted",
    )
    .with_context(|ctx| {
        ctx.with_tag("certificate")
            .with_metadata("certificate_id", certificate.id.to_string())
    })
}

#[derive(Clone)]
pub struct CertificateVault {
    store: Arc<dyn CertificateStore>,
    companies: Arc<dyn CompanyDirectory>,
    cipher: SecretCipher,
    clock: Arc<dyn Clock>,
}

impl CertificateVault {
    pub fn new(
        store: Arc<dyn CertificateStore>,
        companies: Arc<dyn CompanyDirectory>,
        cipher: SecretCipher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            companies,
            cipher,
            clock,
        }
    }

    /// Validates the archive, seals it and makes it the company's only active certificate.
    pub fn upload(&self, company_id: Uuid, upload: CertificateUpload) -> ServiceResult<Certificate> {
        upload_validator()
            .validate(&upload)
            .map_err(|e| e.with_tag("certificate"))?;
        self.companies.find_company(company_id)?;

        let info = pkcs12::inspect(&upload.content, &upload.password).map_err(credential_problem)?;
        let now = self.clock.now();
        if now < info.not_before {
            return Err(ServiceError::certificate_unusable(
                CertificateProblem::NotYetValid,
                format!("Certificate is only valid from {}", info.not_before),
            )
            .with_tag("certificate"));
        }
        if now > info.not_after {
            return Err(ServiceError::certificate_unusable(
                CertificateProblem::Expired,
                format!("Certificate expired at {}", info.not_after),
            )
            .with_tag("certificate"));
        }

        let certificate = Certificate {
            id: Uuid::new_v4(),
            company_id,
            name: upload.name.trim().to_string(),
            subject: info.subject,
            encrypted_content: self.cipher.encrypt(&upload.content).map_err(sealing_error)?,
            encrypted_password: self.cipher.encrypt(upload.password.as_bytes()).map_err(sealing_error)?,
            not_before: info.not_before,
            expires_at: info.not_after,
            status: CertificateStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.activate(certificate)?;
        log::info!(
            "Certificate {} activated for company {} (expires {})",
            stored.id,
            company_id,
            stored.expires_at
        );
        Ok(stored)
    }

    /// Decrypted material of the active certificate. An expired certificate is
    /// flipped to `expired` on the way out.
    pub fn get_active_decrypted(&self, company_id: Uuid) -> ServiceResult<CertificateMaterial> {
        let certificate = self.store.find_active(company_id)?.ok_or_else(|| {
            ServiceError::certificate_unusable(CertificateProblem::Missing, "Company has no active certificate")
                .with_context(|ctx| ctx.with_tag("certificate").with_metadata("company_id", company_id.to_string()))
        })?;

        let now = self.clock.now();
        if certificate.is_expired_at(now) {
            self.store.expire(now, Some(certificate.id))?;
            log::warn!("Certificate {} of company {} expired at {}", certificate.id, company_id, certificate.expires_at);
            return Err(ServiceError::certificate_unusable(
                CertificateProblem::Expired,
                format!("Certificate expired at {}", certificate.expires_at),
            )
            .with_context(|ctx| {
                ctx.with_tag("certificate")
                    .with_metadata("certificate_id", certificate.id.to_string())
            }));
        }

        let content = self
            .cipher
            .decrypt(&certificate.encrypted_content)
            .map_err(|e| unsealing_error(&certificate, e))?;
        let password = self
            .cipher
            .decrypt(&certificate.encrypted_password)
            .map_err(|e| unsealing_error(&certificate, e))
            .and_then(|bytes| {
                String::from_utf8(bytes).map_err(|_| unsealing_error(&certificate, CipherError::Integrity))
            })?;

        Ok(CertificateMaterial { content, password })
    }

    /// Removes a certificate. The company loses signing capability if it was the active one.
    pub fn delete(&self, certificate_id: Uuid) -> ServiceResult<Certificate> {
        let removed = self.store.delete(certificate_id, self.clock.now())?;
        log::info!("Certificate {} of company {} deleted", removed.id, removed.company_id);
        Ok(removed)
    }

    pub fn list_for_company(&self, company_id: Uuid) -> ServiceResult<Vec<Certificate>> {
        self.companies.find_company(company_id)?;
        self.store.list_by_company(company_id)
    }

    pub fn count_active_by_company(&self, company_id: Uuid) -> ServiceResult<i64> {
        self.store.count_active(company_id)
    }

    /// Flips every active certificate past its expiry to `expired`.
    pub fn expire_sweep(&self) -> ServiceResult<usize> {
        let expired = self.store.expire(self.clock.now(), None)?;
        if expired > 0 {
            log::info!("Certificate sweep expired {} certificate(s)", expired);
        }
        Ok(expired)
    }

    /// Active certificates that expire within `days` from now.
    pub fn expiring_within(&self, days: i64) -> ServiceResult<Vec<Certificate>> {
        if days < 0 {
            return Err(ServiceError::bad_request("days must not be negative").with_tag("certificate"));
        }
        let now = self.clock.now();
        self.store.find_expiring(now, now + Duration::days(days))
    }
}
