//! Structural validation of Brazilian fiscal identifiers and classification codes.
//!
//! Everything here is pure. Punctuation is stripped before digit checks, so
//! `"11.222.333/0001-81"` and `"11222333000181"` are the same CNPJ. Successful
//! checks return the normalized value that should be persisted.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    constants::ACCESS_KEY_LENGTH,
    error::{ServiceError, ServiceResult},
    fiscal::state::BrazilianState,
};

const CNPJ_FIRST_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_SECOND_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const VALID_CFOP_PREFIXES: [char; 6] = ['1', '2', '3', '5', '6', '7'];
const GTIN_LENGTHS: [usize; 4] = [8, 12, 13, 14];
pub const NO_GTIN: &str = "SEM GTIN";
pub const EXEMPT_STATE_REGISTRATION: &str = "ISENTO";

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

static STATE_REGISTRATION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{8,14}$").expect("valid state registration regex"));

/// A taxpayer identifier, told apart by digit count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxpayerId {
    Cpf(String),
    Cnpj(String),
}

impl TaxpayerId {
    pub fn digits(&self) -> &str {
        match self {
            TaxpayerId::Cpf(digits) | TaxpayerId::Cnpj(digits) => digits,
        }
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ServiceError {
    ServiceError::bad_request(message).with_context(|ctx| ctx.with_tag("fiscal").with_metadata("field", field))
}

pub fn only_digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

fn digit_values(digits: &str) -> Vec<u32> {
    digits.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|pair| pair[0] == pair[1])
}

fn mod11_check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        remainder if remainder < 2 => 0,
        remainder => 11 - remainder,
    }
}

pub fn is_valid_cpf(value: &str) -> bool {
    let digits = digit_values(&only_digits(value));
    if digits.len() != 11 || all_same(&digits) {
        return false;
    }
    let first_weights: Vec<u32> = (2..=10).rev().collect();
    let second_weights: Vec<u32> = (2..=11).rev().collect();
    mod11_check_digit(&digits[..9], &first_weights) == digits[9]
        && mod11_check_digit(&digits[..10], &second_weights) == digits[10]
}

pub fn is_valid_cnpj(value: &str) -> bool {
    let digits = digit_values(&only_digits(value));
    if digits.len() != 14 || all_same(&digits) {
        return false;
    }
    mod11_check_digit(&digits[..12], &CNPJ_FIRST_WEIGHTS) == digits[12]
        && mod11_check_digit(&digits[..13], &CNPJ_SECOND_WEIGHTS) == digits[13]
}

pub fn validate_cpf(value: &str) -> ServiceResult<String> {
    if is_valid_cpf(value) {
        Ok(only_digits(value))
    } else {
        Err(invalid("cpf", format!("Invalid CPF: {}", value)))
    }
}

pub fn validate_cnpj(value: &str) -> ServiceResult<String> {
    if is_valid_cnpj(value) {
        Ok(only_digits(value))
    } else {
        Err(invalid("cnpj", format!("Invalid CNPJ: {}", value)))
    }
}

/// Accepts either a CPF or a CNPJ.
pub fn validate_taxpayer_id(value: &str) -> ServiceResult<TaxpayerId> {
    let digits = only_digits(value);
    match digits.len() {
        11 => validate_cpf(&digits).map(TaxpayerId::Cpf),
        14 => validate_cnpj(&digits).map(TaxpayerId::Cnpj),
        _ => Err(invalid(
            "document",
            format!("Document must be a CPF (11 digits) or CNPJ (14 digits): {}", value),
        )),
    }
}

pub fn validate_state(value: &str) -> ServiceResult<BrazilianState> {
    value
        .trim()
        .to_uppercase()
        .parse::<BrazilianState>()
        .map_err(|_| invalid("state", format!("Invalid state code: {}", value)))
}

pub fn validate_zip_code(value: &str) -> ServiceResult<String> {
    let digits = only_digits(value);
    if digits.len() == 8 {
        Ok(digits)
    } else {
        Err(invalid("zip_code", format!("CEP must have 8 digits: {}", value)))
    }
}

/// `ISENTO`, or 8 to 14 alphanumerics once punctuation is removed.
pub fn validate_state_registration(value: &str) -> ServiceResult<String> {
    let normalized: String = value
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if normalized == EXEMPT_STATE_REGISTRATION || STATE_REGISTRATION_REGEX.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(invalid(
            "state_registration",
            format!("Invalid state registration: {}", value),
        ))
    }
}

pub fn validate_ncm(value: &str) -> ServiceResult<String> {
    let digits = only_digits(value);
    if digits.len() == 8 {
        Ok(digits)
    } else {
        Err(invalid("ncm", format!("NCM must have 8 digits: {}", value)))
    }
}

pub fn validate_cfop(value: &str) -> ServiceResult<String> {
    let digits = only_digits(value);
    let starts_ok = digits
        .chars()
        .next()
        .map(|first| VALID_CFOP_PREFIXES.contains(&first))
        .unwrap_or(false);
    if digits.len() == 4 && starts_ok {
        Ok(digits)
    } else {
        Err(invalid(
            "cfop",
            format!("CFOP must have 4 digits starting with 1, 2, 3, 5, 6 or 7: {}", value),
        ))
    }
}

pub fn validate_cest(value: Option<&str>) -> ServiceResult<Option<String>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => {
            let digits = only_digits(raw);
            if digits.len() == 7 {
                Ok(Some(digits))
            } else {
                Err(invalid("cest", format!("CEST must have 7 digits: {}", raw)))
            }
        }
    }
}

pub fn is_valid_gtin(value: &str) -> bool {
    if !value.chars().all(|c| c.is_ascii_digit()) || !GTIN_LENGTHS.contains(&value.len()) {
        return false;
    }
    let digits = digit_values(value);
    let (body, check) = digits.split_at(digits.len() - 1);
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(position, d)| if position % 2 == 0 { d * 3 } else { *d })
        .sum();
    (10 - sum % 10) % 10 == check[0]
}

/// Missing barcodes are written as `SEM GTIN` on the document.
pub fn validate_gtin(value: Option<&str>) -> ServiceResult<Option<String>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) if raw.eq_ignore_ascii_case(NO_GTIN) => Ok(Some(NO_GTIN.to_string())),
        Some(raw) if is_valid_gtin(raw) => Ok(Some(raw.to_string())),
        Some(raw) => Err(invalid("gtin", format!("Invalid GTIN: {}", raw))),
    }
}

pub fn validate_email(value: Option<&str>) -> ServiceResult<Option<String>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) if EMAIL_REGEX.is_match(raw) => Ok(Some(raw.to_lowercase())),
        Some(raw) => Err(invalid("email", format!("Invalid e-mail: {}", raw))),
    }
}

pub fn validate_phone(value: Option<&str>) -> ServiceResult<Option<String>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => {
            let digits = only_digits(raw);
            if digits.len() == 10 || digits.len() == 11 {
                Ok(Some(digits))
            } else {
                Err(invalid("phone", format!("Phone must have 10 or 11 digits: {}", raw)))
            }
        }
    }
}

pub fn is_access_key(value: &str) -> bool {
    value.len() == ACCESS_KEY_LENGTH && value.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpf_check_digits() {
        assert!(is_valid_cpf("529.982.247-25"));
        assert!(is_valid_cpf("52998224725"));
        assert!(!is_valid_cpf("52998224724"));
        assert!(!is_valid_cpf("111.111.111-11"));
        assert!(!is_valid_cpf("5299822472"));
        assert_eq!(validate_cpf("529.982.247-25").unwrap(), "52998224725");
    }

    #[test]
    fn cnpj_check_digits() {
        assert!(is_valid_cnpj("11.222.333/0001-81"));
        assert!(!is_valid_cnpj("11.222.333/0001-82"));
        assert!(!is_valid_cnpj("00000000000000"));
        assert!(!is_valid_cnpj("1122233300018"));
    }

    #[test]
    fn taxpayer_id_is_detected_by_length() {
        assert_eq!(
            validate_taxpayer_id("11.222.333/0001-81").unwrap(),
            TaxpayerId::Cnpj("11222333000181".to_string())
        );
        assert_eq!(
            validate_taxpayer_id("529.982.247-25").unwrap().digits(),
            "52998224725"
        );
        let err = validate_taxpayer_id("123").unwrap_err();
        assert_eq!(err.context().metadata.get("field").map(String::as_str), Some("document"));
    }

    #[test]
    fn state_codes_are_case_insensitive_and_closed() {
        assert_eq!(validate_state(" sp ").unwrap(), BrazilianState::Sp);
        assert!(validate_state("XX").is_err());
        assert!(validate_state("").is_err());
    }

    #[test]
    fn zip_code_needs_eight_digits() {
        assert_eq!(validate_zip_code("01310-100").unwrap(), "01310100");
        assert!(validate_zip_code("0131010").is_err());
    }

    #[test]
    fn state_registration_accepts_exempt_marker() {
        assert_eq!(validate_state_registration("isento").unwrap(), "ISENTO");
        assert_eq!(validate_state_registration("110.042.490.114").unwrap(), "110042490114");
        assert!(validate_state_registration("1234").is_err());
    }

    #[test]
    fn ncm_cfop_and_cest_shapes() {
        assert_eq!(validate_ncm("1234.56.78").unwrap(), "12345678");
        assert!(validate_ncm("1234567").is_err());

        assert_eq!(validate_cfop("5102").unwrap(), "5102");
        assert_eq!(validate_cfop("6.102").unwrap(), "6102");
        assert!(validate_cfop("4102").is_err());
        assert!(validate_cfop("8102").is_err());
        assert!(validate_cfop("510").is_err());

        assert_eq!(validate_cest(None).unwrap(), None);
        assert_eq!(validate_cest(Some("  ")).unwrap(), None);
        assert_eq!(validate_cest(Some("28.038.00")).unwrap(), Some("2803800".to_string()));
        assert!(validate_cest(Some("123")).is_err());
    }

    #[test]
    fn gtin_check_digit() {
        assert!(is_valid_gtin("4006381333931"));
        assert!(!is_valid_gtin("4006381333932"));
        assert!(!is_valid_gtin("400638133393"));
        assert_eq!(validate_gtin(Some("sem gtin")).unwrap(), Some(NO_GTIN.to_string()));
        assert_eq!(validate_gtin(None).unwrap(), None);
        assert!(validate_gtin(Some("abc")).is_err());
    }

    #[test]
    fn optional_contact_fields() {
        assert_eq!(validate_email(None).unwrap(), None);
        assert_eq!(
            validate_email(Some("Fiscal@Empresa.com.br")).unwrap(),
            Some("fiscal@empresa.com.br".to_string())
        );
        assert!(validate_email(Some("not-an-email")).is_err());

        assert_eq!(validate_phone(Some("(11) 98765-4321")).unwrap(), Some("11987654321".to_string()));
        assert!(validate_phone(Some("98765-4321")).is_err());
    }

    #[test]
    fn access_key_shape() {
        assert!(is_access_key(&"3".repeat(44)));
        assert!(!is_access_key(&"3".repeat(43)));
        assert!(!is_access_key(&format!("{}A", "3".repeat(43))));
    }
}
