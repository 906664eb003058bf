//! Inspection of PKCS#12 (A1) signing certificates.

use chrono::{DateTime, TimeZone, Utc};
use openssl::{
    asn1::{Asn1Time, Asn1TimeRef},
    nid::Nid,
    pkcs12::Pkcs12,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Payload is not a PKCS#12 archive")]
    Corrupt,
    #[error("Wrong password for PKCS#12 archive")]
    WrongPassword,
    #[error("PKCS#12 archive has no {0}")]
    Incomplete(&'static str),
    #[error("Unreadable certificate validity: {0}")]
    InvalidValidity(String),
}

/// What the vault needs to know about an uploaded credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialInfo {
    pub subject: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CredentialInfo {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.not_before && now <= self.not_after
    }
}

pub fn inspect(der: &[u8], password: &str) -> Result<CredentialInfo, CredentialError> {
    let archive = Pkcs12::from_der(der).map_err(|_| CredentialError::Corrupt)?;
    let parsed = archive
        .parse2(password)
        .map_err(|_| CredentialError::WrongPassword)?;

    if parsed.pkey.is_none() {
        return Err(CredentialError::Incomplete("private key"));
    }
    let cert = parsed.cert.ok_or(CredentialError::Incomplete("certificate"))?;

    let subject = cert
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|cn| cn.to_string())
        .unwrap_or_default();

    Ok(CredentialInfo {
        subject,
        not_before: asn1_to_utc(cert.not_before())?,
        not_after: asn1_to_utc(cert.not_after())?,
    })
}

fn asn1_to_utc(time: &Asn1TimeRef) -> Result<DateTime<Utc>, CredentialError> {
    let invalid = |e: openssl::error::ErrorStack| CredentialError::InvalidValidity(e.to_string());
    let epoch = Asn1Time::from_unix(0).map_err(invalid)?;
    let diff = epoch.diff(time).map_err(invalid)?;
    let seconds = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| CredentialError::InvalidValidity(format!("timestamp {} out of range", seconds)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::{
        ec::{EcGroup, EcKey},
        hash::MessageDigest,
        pkey::PKey,
        x509::{X509NameBuilder, X509},
    };

    fn bundle(not_before: i64, not_after: i64, password: &str) -> Vec<u8> {
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
            .set_not_before(&Asn1Time::from_unix(not_before).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::from_unix(not_after).unwrap())
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

    #[test]
    fn reads_subject_and_validity_window() {
        let der = bundle(1_700_000_000, 1_800_000_000, "s3cret");
        let info = inspect(&der, "s3cret").unwrap();
        assert_eq!(info.subject, "EMPRESA TESTE LTDA:11222333000181");
        assert_eq!(info.not_before.timestamp(), 1_700_000_000);
        assert_eq!(info.not_after.timestamp(), 1_800_000_000);
        assert!(info.is_valid_at(Utc.timestamp_opt(1_750_000_000, 0).unwrap()));
        assert!(!info.is_valid_at(Utc.timestamp_opt(1_800_000_001, 0).unwrap()));
        assert!(!info.is_valid_at(Utc.timestamp_opt(1_699_999_999, 0).unwrap()));
    }

    #[test]
    fn wrong_password_is_distinguished_from_garbage() {
        let der = bundle(1_700_000_000, 1_800_000_000, "s3cret");
        assert_eq!(inspect(&der, "wrong"), Err(CredentialError::WrongPassword));
        assert_eq!(inspect(b"definitely not der", "s3cret"), Err(CredentialError::Corrupt));
    }
}
