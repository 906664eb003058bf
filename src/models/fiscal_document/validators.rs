use once_cell::sync::OnceCell;
use rust_decimal::Decimal;

use crate::{
    constants::{MAX_ITEMS_PER_DOCUMENT, MAX_JUSTIFICATION_LENGTH, MIN_JUSTIFICATION_LENGTH},
    error::{ServiceError, ServiceResult},
    fiscal::{max_money, max_unit_value, validators as fiscal},
    models::{
        company::Company,
        fiscal_document::{
            dto::{CustomerRequest, CustomerSnapshot, ItemRequest, PersonType},
            item::ItemAmounts,
        },
    },
    services::functional_patterns::{validation_rules, Pipeline, Validator},
};

fn non_negative(field: &'static str, value: Decimal) -> ServiceResult<()> {
    if value < Decimal::ZERO {
        Err(ServiceError::bad_request(format!("{} must not be negative", field)).with_metadata("field", field))
    } else {
        Ok(())
    }
}

fn positive(field: &'static str, value: Decimal) -> ServiceResult<()> {
    if value <= Decimal::ZERO {
        Err(ServiceError::bad_request(format!("{} must be greater than zero", field)).with_metadata("field", field))
    } else {
        Ok(())
    }
}

fn at_most(field: &'static str, value: Decimal, max: Decimal) -> ServiceResult<()> {
    if value > max {
        Err(ServiceError::bad_request(format!("{} must not exceed {}", field, max)).with_metadata("field", field))
    } else {
        Ok(())
    }
}

/// Trims text and normalizes the fiscal codes of an item.
pub fn item_normalizer() -> Pipeline<ItemRequest> {
    Pipeline::new()
        .then(|mut item: ItemRequest| {
            item.code = item.code.trim().to_string();
            item.description = item.description.trim().to_string();
            item.unit = item.unit.trim().to_uppercase();
            Ok(item)
        })
        .then(|mut item: ItemRequest| {
            item.ncm = fiscal::validate_ncm(&item.ncm)?;
            item.cfop = fiscal::validate_cfop(&item.cfop)?;
            item.cest = fiscal::validate_cest(item.cest.as_deref())?;
            item.gtin = fiscal::validate_gtin(item.gtin.as_deref())?;
            Ok(item)
        })
}

pub fn item_validator() -> Validator<ItemRequest> {
    Validator::new()
        .rule(|item: &ItemRequest| validation_rules::required("code")(&item.code))
        .rule(|item: &ItemRequest| validation_rules::max_length("code", 60)(&item.code))
        .rule(|item: &ItemRequest| validation_rules::required("description")(&item.description))
        .rule(|item: &ItemRequest| validation_rules::max_length("description", 120)(&item.description))
        .rule(|item: &ItemRequest| validation_rules::required("unit")(&item.unit))
        .rule(|item: &ItemRequest| validation_rules::max_length("unit", 6)(&item.unit))
        .rule(|item: &ItemRequest| positive("quantity", item.quantity))
        .rule(|item: &ItemRequest| at_most("quantity", item.quantity, max_unit_value()))
        .rule(|item: &ItemRequest| positive("unit_price", item.unit_price))
        .rule(|item: &ItemRequest| at_most("unit_price", item.unit_price, max_unit_value()))
        .rule(|item: &ItemRequest| non_negative("discount", item.discount))
        .rule(|item: &ItemRequest| at_most("discount", item.discount, max_money()))
        .rule(|item: &ItemRequest| non_negative("freight", item.freight))
        .rule(|item: &ItemRequest| at_most("freight", item.freight, max_money()))
        .rule(|item: &ItemRequest| non_negative("insurance", item.insurance))
        .rule(|item: &ItemRequest| at_most("insurance", item.insurance, max_money()))
        .rule(|item: &ItemRequest| non_negative("other_expenses", item.other_expenses))
        .rule(|item: &ItemRequest| at_most("other_expenses", item.other_expenses, max_money()))
        .rule(|item: &ItemRequest| {
            item.ipi_rate.map_or(Ok(()), |rate| {
                validation_rules::range("ipi_rate", Decimal::ZERO, Decimal::ONE_HUNDRED)(&rate)
            })
        })
        .rule(|item: &ItemRequest| {
            let amounts = ItemAmounts::of(item)?;
            at_most("item gross total", amounts.total_gross, max_money())?;
            positive("item net total", amounts.total_net)
        })
}

fn customer_validator() -> Validator<CustomerRequest> {
    Validator::new()
        .rule(|c: &CustomerRequest| validation_rules::required("customer name")(&c.name))
        .rule(|c: &CustomerRequest| validation_rules::max_length("customer name", 60)(&c.name))
        .rule(|c: &CustomerRequest| validation_rules::required("street")(&c.address.street))
        .rule(|c: &CustomerRequest| validation_rules::required("address number")(&c.address.number))
        .rule(|c: &CustomerRequest| validation_rules::required("district")(&c.address.district))
        .rule(|c: &CustomerRequest| validation_rules::required("city")(&c.address.city))
        .rule(|c: &CustomerRequest| validation_rules::pattern("city_code", r"^\d{7}$")(&c.address.city_code))
}

/// Validates one item and returns it normalized. Errors name the item position.
pub fn validate_item(position: usize, item: ItemRequest) -> ServiceResult<ItemRequest> {
    static ITEM_VALIDATOR: OnceCell<Validator<ItemRequest>> = OnceCell::new();
    static ITEM_NORMALIZER: OnceCell<Pipeline<ItemRequest>> = OnceCell::new();

    ITEM_NORMALIZER
        .get_or_init(item_normalizer)
        .execute(item)
        .and_then(|item| {
            ITEM_VALIDATOR
                .get_or_init(item_validator)
                .validate(&item)
                .map(|_| item)
        })
        .map_err(|e| e.with_context(|ctx| ctx.with_tag("item").with_metadata("item", position.to_string())))
}

pub fn validate_items(items: Vec<ItemRequest>) -> ServiceResult<Vec<ItemRequest>> {
    if items.is_empty() {
        return Err(ServiceError::bad_request("A document needs at least one item").with_tag("item"));
    }
    if items.len() > MAX_ITEMS_PER_DOCUMENT {
        return Err(ServiceError::bad_request(format!(
            "A document holds at most {} items",
            MAX_ITEMS_PER_DOCUMENT
        ))
        .with_tag("item"));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| validate_item(index + 1, item))
        .collect()
}

/// Validates the customer and produces the snapshot stored with the document.
pub fn validate_customer(customer: &CustomerRequest) -> ServiceResult<CustomerSnapshot> {
    static CUSTOMER_VALIDATOR: OnceCell<Validator<CustomerRequest>> = OnceCell::new();

    let tag = |e: ServiceError| e.with_tag("customer");
    CUSTOMER_VALIDATOR
        .get_or_init(customer_validator)
        .validate(customer)
        .map_err(tag)?;

    let taxpayer = fiscal::validate_taxpayer_id(&customer.document).map_err(tag)?;
    let person_type = match taxpayer {
        fiscal::TaxpayerId::Cpf(_) => PersonType::Individual,
        fiscal::TaxpayerId::Cnpj(_) => PersonType::Legal,
    };
    let state_registration = customer
        .state_registration
        .as_deref()
        .map(str::trim)
        .filter(|ie| !ie.is_empty())
        .map(fiscal::validate_state_registration)
        .transpose()
        .map_err(tag)?;

    Ok(CustomerSnapshot {
        id: customer.id,
        person_type,
        name: customer.name.trim().to_string(),
        document: taxpayer.digits().to_string(),
        state_registration,
        email: fiscal::validate_email(customer.email.as_deref()).map_err(tag)?,
        phone: fiscal::validate_phone(customer.phone.as_deref()).map_err(tag)?,
        street: customer.address.street.trim().to_string(),
        number: customer.address.number.trim().to_string(),
        complement: customer
            .address
            .complement
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
        district: customer.address.district.trim().to_string(),
        city: customer.address.city.trim().to_string(),
        city_code: customer.address.city_code.clone(),
        state: fiscal::validate_state(&customer.address.state).map_err(tag)?,
        zip_code: fiscal::validate_zip_code(&customer.address.zip_code).map_err(tag)?,
    })
}

/// Checks the fiscal identity the issuer will sign with.
pub fn validate_issuer(company: &Company) -> ServiceResult<()> {
    let tag = |e: ServiceError| {
        e.with_context(|ctx| ctx.with_tag("issuer").with_metadata("company_id", company.id.to_string()))
    };
    fiscal::validate_cnpj(&company.document).map_err(tag)?;
    fiscal::validate_state_registration(&company.state_registration).map_err(tag)?;
    fiscal::validate_zip_code(&company.zip_code).map_err(tag)?;
    Ok(())
}

pub fn validate_justification(justification: &str) -> ServiceResult<String> {
    let trimmed = justification.trim().to_string();
    validation_rules::min_length("justification", MIN_JUSTIFICATION_LENGTH)(&trimmed)
        .and_then(|_| validation_rules::max_length("justification", MAX_JUSTIFICATION_LENGTH)(&trimmed))
        .map(|_| trimmed)
        .map_err(|e| e.with_tag("cancellation"))
}
