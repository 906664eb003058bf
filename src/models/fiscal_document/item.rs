use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ServiceResult,
    fiscal::{amount_overflow, round_money, TaxBreakdown},
    models::fiscal_document::dto::ItemRequest,
    schema::fiscal_document_items,
};

/// Gross and net value of one line. Always computed together, with checked
/// arithmetic: an overflow is a validation error, never a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemAmounts {
    pub total_gross: Decimal,
    pub total_net: Decimal,
}

impl ItemAmounts {
    pub fn compute(
        quantity: Decimal,
        unit_price: Decimal,
        discount: Decimal,
        freight: Decimal,
        insurance: Decimal,
        other_expenses: Decimal,
    ) -> ServiceResult<Self> {
        let total_gross = quantity
            .checked_mul(unit_price)
            .map(round_money)
            .ok_or_else(|| amount_overflow("item gross total"))?;
        let total_net = total_gross
            .checked_sub(discount)
            .and_then(|value| value.checked_add(freight))
            .and_then(|value| value.checked_add(insurance))
            .and_then(|value| value.checked_add(other_expenses))
            .map(round_money)
            .ok_or_else(|| amount_overflow("item net total"))?;
        Ok(Self {
            total_gross,
            total_net,
        })
    }

    pub fn of(request: &ItemRequest) -> ServiceResult<Self> {
        Self::compute(
            request.quantity,
            request.unit_price,
            request.discount,
            request.freight,
            request.insurance,
            request.other_expenses,
        )
    }
}

#[derive(Queryable, Selectable, Identifiable, Insertable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = fiscal_document_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LineItem {
    pub id: Uuid,
    pub document_id: Uuid,
    pub item_number: i32,
    pub product_id: Option<Uuid>,
    pub code: String,
    pub description: String,
    pub ncm: String,
    pub cfop: String,
    pub cest: Option<String>,
    pub gtin: Option<String>,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_gross: Decimal,
    pub discount: Decimal,
    pub freight: Decimal,
    pub insurance: Decimal,
    pub other_expenses: Decimal,
    pub total_net: Decimal,
    pub icms_origin: i16,
    pub icms_cst: Option<String>,
    pub icms_csosn: Option<String>,
    pub icms_base: Decimal,
    pub icms_rate: Decimal,
    pub icms_value: Decimal,
    pub pis_cst: String,
    pub pis_base: Decimal,
    pub pis_rate: Decimal,
    pub pis_value: Decimal,
    pub cofins_cst: String,
    pub cofins_base: Decimal,
    pub cofins_rate: Decimal,
    pub cofins_value: Decimal,
    pub ipi_cst: Option<String>,
    pub ipi_base: Decimal,
    pub ipi_rate: Decimal,
    pub ipi_value: Decimal,
}

impl LineItem {
    /// Builds a line from a validated request and its computed taxes.
    pub fn build(
        document_id: Uuid,
        item_number: i32,
        request: &ItemRequest,
        tax: &TaxBreakdown,
    ) -> ServiceResult<Self> {
        let amounts = ItemAmounts::of(request)?;
        let (ipi_cst, ipi_base, ipi_rate, ipi_value) = match &tax.ipi {
            Some(ipi) => (Some(ipi.cst.clone()), ipi.base, ipi.rate, ipi.value),
            None => (None, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        };

        Ok(Self {
            id: Uuid::new_v4(),
            document_id,
            item_number,
            product_id: request.product_id,
            code: request.code.clone(),
            description: request.description.clone(),
            ncm: request.ncm.clone(),
            cfop: request.cfop.clone(),
            cest: request.cest.clone(),
            gtin: request.gtin.clone(),
            unit: request.unit.clone(),
            quantity: request.quantity,
            unit_price: request.unit_price,
            total_gross: amounts.total_gross,
            discount: request.discount,
            freight: request.freight,
            insurance: request.insurance,
            other_expenses: request.other_expenses,
            total_net: amounts.total_net,
            icms_origin: tax.icms.origin,
            icms_cst: tax.icms.cst.clone(),
            icms_csosn: tax.icms.csosn.clone(),
            icms_base: tax.icms.base,
            icms_rate: tax.icms.rate,
            icms_value: tax.icms.value,
            pis_cst: tax.pis.cst.clone(),
            pis_base: tax.pis.base,
            pis_rate: tax.pis.rate,
            pis_value: tax.pis.value,
            cofins_cst: tax.cofins.cst.clone(),
            cofins_base: tax.cofins.base,
            cofins_rate: tax.cofins.rate,
            cofins_value: tax.cofins.value,
            ipi_cst,
            ipi_base,
            ipi_rate,
            ipi_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_adds_charges_and_subtracts_discount() {
        let amounts = ItemAmounts::compute(
            Decimal::from(3),
            Decimal::new(1999, 2),
            Decimal::new(500, 2),
            Decimal::new(1000, 2),
            Decimal::new(250, 2),
            Decimal::new(100, 2),
        )
        .unwrap();
        assert_eq!(amounts.total_gross, Decimal::new(5997, 2));
        assert_eq!(amounts.total_net, Decimal::new(6847, 2));
    }

    #[test]
    fn fractional_quantities_round_to_cents() {
        let amounts = ItemAmounts::compute(
            Decimal::new(1_5005, 4),
            Decimal::new(333, 2),
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
        )
        .unwrap();
        // 1.5005 * 3.33 = 4.996665
        assert_eq!(amounts.total_gross, Decimal::new(500, 2));
        assert_eq!(amounts.total_net, amounts.total_gross);
    }

    #[test]
    fn overflowing_amounts_are_a_validation_error() {
        let err = ItemAmounts::compute(
            Decimal::MAX,
            Decimal::from(2),
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "validation_failed");
        assert_eq!(err.context().metadata.get("field").map(String::as_str), Some("item gross total"));

        let err = ItemAmounts::compute(
            Decimal::ONE,
            Decimal::MAX,
            Decimal::ZERO,
            Decimal::MAX,
            Decimal::ZERO,
            Decimal::ZERO,
        )
        .unwrap_err();
        assert_eq!(err.context().metadata.get("field").map(String::as_str), Some("item net total"));
    }
}
