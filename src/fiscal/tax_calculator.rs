//! Per-item ICMS, PIS, COFINS and IPI computation.
//!
//! The calculator is a pure function of its inputs and of a static rate table.
//! The only structural branch is intrastate vs interstate ICMS, derived again
//! for every item from the issuer and customer states.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::ServiceResult,
    fiscal::{amount_overflow, round_money, state::BrazilianState},
};

text_enum! {
    pub enum TaxRegime {
        SimplesNacional => "simples_nacional",
        Mei => "mei",
        LucroPresumido => "lucro_presumido",
        LucroReal => "lucro_real",
    }
}

impl TaxRegime {
    /// Simples Nacional and MEI do not itemize ICMS, PIS or COFINS.
    pub fn is_simplified(&self) -> bool {
        matches!(self, TaxRegime::SimplesNacional | TaxRegime::Mei)
    }
}

/// National goods, the only origin this issuer emits.
pub const ORIGIN_NATIONAL: i16 = 0;
/// Fully taxed ICMS.
pub const ICMS_CST_TAXED: &str = "00";
/// Simples Nacional without credit permission.
pub const ICMS_CSOSN_SIMPLIFIED: &str = "102";
pub const PIS_COFINS_CST_BASIC_RATE: &str = "01";
pub const PIS_COFINS_CST_OTHER: &str = "99";
pub const IPI_CST_TAXED_EXIT: &str = "50";

/// Static rate configuration, all values in percent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxRates {
    pub cumulative_pis: Decimal,
    pub cumulative_cofins: Decimal,
    pub non_cumulative_pis: Decimal,
    pub non_cumulative_cofins: Decimal,
    pub reduced_interstate_icms: Decimal,
    pub standard_interstate_icms: Decimal,
}

impl Default for TaxRates {
    fn default() -> Self {
        Self {
            cumulative_pis: Decimal::new(65, 2),
            cumulative_cofins: Decimal::from(3),
            non_cumulative_pis: Decimal::new(165, 2),
            non_cumulative_cofins: Decimal::new(76, 1),
            reduced_interstate_icms: Decimal::from(7),
            standard_interstate_icms: Decimal::from(12),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmsLine {
    pub origin: i16,
    pub cst: Option<String>,
    pub csosn: Option<String>,
    pub base: Decimal,
    pub rate: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLine {
    pub cst: String,
    pub base: Decimal,
    pub rate: Decimal,
    pub value: Decimal,
}

impl TaxLine {
    fn zero(cst: &str) -> Self {
        Self {
            cst: cst.to_string(),
            base: Decimal::ZERO,
            rate: Decimal::ZERO,
            value: Decimal::ZERO,
        }
    }

    fn levied(cst: &str, base: Decimal, rate: Decimal) -> ServiceResult<Self> {
        Ok(Self {
            cst: cst.to_string(),
            base,
            rate,
            value: percent_of(base, rate)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub total_product: Decimal,
    pub icms: IcmsLine,
    pub pis: TaxLine,
    pub cofins: TaxLine,
    pub ipi: Option<TaxLine>,
    pub total_taxes: Decimal,
}

/// Everything the calculator needs for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxInput {
    pub regime: TaxRegime,
    pub issuer_state: BrazilianState,
    pub customer_state: BrazilianState,
    pub unit_price: Decimal,
    pub quantity: Decimal,
    /// IPI rate in percent; `None` or zero means IPI does not apply.
    pub ipi_rate: Option<Decimal>,
}

fn percent_of(base: Decimal, rate: Decimal) -> ServiceResult<Decimal> {
    base.checked_mul(rate)
        .and_then(|value| value.checked_div(Decimal::ONE_HUNDRED))
        .map(round_money)
        .ok_or_else(|| amount_overflow("tax value"))
}

#[derive(Debug, Clone, Default)]
pub struct TaxCalculator {
    rates: TaxRates,
}

impl TaxCalculator {
    pub fn new(rates: TaxRates) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> &TaxRates {
        &self.rates
    }

    pub fn calculate(
        &self,
        regime: TaxRegime,
        issuer_state: BrazilianState,
        customer_state: BrazilianState,
        unit_price: Decimal,
        quantity: Decimal,
    ) -> ServiceResult<TaxBreakdown> {
        self.calculate_item(&TaxInput {
            regime,
            issuer_state,
            customer_state,
            unit_price,
            quantity,
            ipi_rate: None,
        })
    }

    /// Fails only when an amount leaves the decimal range, which validated
    /// item input never does.
    pub fn calculate_item(&self, input: &TaxInput) -> ServiceResult<TaxBreakdown> {
        let total_product = input
            .unit_price
            .checked_mul(input.quantity)
            .map(round_money)
            .ok_or_else(|| amount_overflow("item gross total"))?;

        let (icms, pis, cofins) = match input.regime {
            TaxRegime::SimplesNacional | TaxRegime::Mei => (
                IcmsLine {
                    origin: ORIGIN_NATIONAL,
                    cst: None,
                    csosn: Some(ICMS_CSOSN_SIMPLIFIED.to_string()),
                    base: Decimal::ZERO,
                    rate: Decimal::ZERO,
                    value: Decimal::ZERO,
                },
                TaxLine::zero(PIS_COFINS_CST_OTHER),
                TaxLine::zero(PIS_COFINS_CST_OTHER),
            ),
            TaxRegime::LucroPresumido => (
                self.normal_icms(input, total_product)?,
                TaxLine::levied(PIS_COFINS_CST_BASIC_RATE, total_product, self.rates.cumulative_pis)?,
                TaxLine::levied(
                    PIS_COFINS_CST_BASIC_RATE,
                    total_product,
                    self.rates.cumulative_cofins,
                )?,
            ),
            TaxRegime::LucroReal => (
                self.normal_icms(input, total_product)?,
                TaxLine::levied(
                    PIS_COFINS_CST_BASIC_RATE,
                    total_product,
                    self.rates.non_cumulative_pis,
                )?,
                TaxLine::levied(
                    PIS_COFINS_CST_BASIC_RATE,
                    total_product,
                    self.rates.non_cumulative_cofins,
                )?,
            ),
        };

        let ipi = input
            .ipi_rate
            .filter(|rate| *rate > Decimal::ZERO)
            .map(|rate| TaxLine::levied(IPI_CST_TAXED_EXIT, total_product, rate))
            .transpose()?;

        let total_taxes = icms
            .value
            .checked_add(pis.value)
            .and_then(|sum| sum.checked_add(cofins.value))
            .and_then(|sum| sum.checked_add(ipi.as_ref().map(|line| line.value).unwrap_or(Decimal::ZERO)))
            .ok_or_else(|| amount_overflow("total taxes"))?;

        Ok(TaxBreakdown {
            total_product,
            icms,
            pis,
            cofins,
            ipi,
            total_taxes,
        })
    }

    /// ICMS rate in percent for an operation between two states.
    pub fn icms_rate(&self, issuer_state: BrazilianState, customer_state: BrazilianState) -> Decimal {
        if issuer_state == customer_state {
            issuer_state.internal_icms_rate()
        } else if issuer_state.is_south_or_southeast_except_es()
            && customer_state.pays_reduced_interstate_rate_from()
        {
            self.rates.reduced_interstate_icms
        } else {
            self.rates.standard_interstate_icms
        }
    }

    fn normal_icms(&self, input: &TaxInput, base: Decimal) -> ServiceResult<IcmsLine> {
        let rate = self.icms_rate(input.issuer_state, input.customer_state);
        Ok(IcmsLine {
            origin: ORIGIN_NATIONAL,
            cst: Some(ICMS_CST_TAXED.to_string()),
            csosn: None,
            base,
            rate,
            value: percent_of(base, rate)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BrazilianState::*;

    fn money(units: i64, cents: u32) -> Decimal {
        Decimal::new(units * 100 + i64::from(cents), 2)
    }

    #[test]
    fn presumed_intrastate_sao_paulo_item() {
        let calc = TaxCalculator::default();
        let tax = calc.calculate(TaxRegime::LucroPresumido, Sp, Sp, money(100, 0), Decimal::from(2)).unwrap();

        assert_eq!(tax.total_product, money(200, 0));
        assert_eq!(tax.icms.cst.as_deref(), Some("00"));
        assert_eq!(tax.icms.rate, Decimal::from(18));
        assert_eq!(tax.icms.value, money(36, 0));
        assert_eq!(tax.pis.value, money(1, 30));
        assert_eq!(tax.cofins.value, money(6, 0));
        assert_eq!(tax.total_taxes, money(43, 30));
        assert!(tax.ipi.is_none());
    }

    #[test]
    fn real_profit_uses_non_cumulative_pis_and_cofins() {
        let calc = TaxCalculator::default();
        let tax = calc.calculate(TaxRegime::LucroReal, Mg, Mg, money(1000, 0), Decimal::ONE).unwrap();

        assert_eq!(tax.pis.rate, Decimal::new(165, 2));
        assert_eq!(tax.pis.value, money(16, 50));
        assert_eq!(tax.cofins.rate, Decimal::new(76, 1));
        assert_eq!(tax.cofins.value, money(76, 0));
        assert_eq!(tax.icms.value, money(180, 0));
    }

    #[test]
    fn simplified_regimes_are_zero_for_every_state_pair() {
        let calc = TaxCalculator::default();
        for regime in [TaxRegime::SimplesNacional, TaxRegime::Mei] {
            for issuer in BrazilianState::ALL {
                for customer in BrazilianState::ALL {
                    let tax = calc.calculate(regime, *issuer, *customer, money(57, 33), Decimal::from(3)).unwrap();
                    assert_eq!(tax.icms.value, Decimal::ZERO);
                    assert_eq!(tax.pis.value, Decimal::ZERO);
                    assert_eq!(tax.cofins.value, Decimal::ZERO);
                    assert_eq!(tax.icms.csosn.as_deref(), Some("102"));
                    assert_eq!(tax.pis.cst, "99");
                }
            }
        }
    }

    #[test]
    fn interstate_rates() {
        let calc = TaxCalculator::default();
        // South/Southeast (except ES) to North, Northeast, Central-West or ES.
        assert_eq!(calc.icms_rate(Sp, Ba), Decimal::from(7));
        assert_eq!(calc.icms_rate(Rs, Es), Decimal::from(7));
        assert_eq!(calc.icms_rate(Pr, Df), Decimal::from(7));
        // Every other interstate pair.
        assert_eq!(calc.icms_rate(Sp, Rs), Decimal::from(12));
        assert_eq!(calc.icms_rate(Ba, Sp), Decimal::from(12));
        assert_eq!(calc.icms_rate(Es, Ba), Decimal::from(12));
        // Intrastate uses the state's own table.
        assert_eq!(calc.icms_rate(Rs, Rs), Decimal::from(18));
        assert_eq!(calc.icms_rate(Ro, Ro), Decimal::new(175, 1));
    }

    #[test]
    fn presumed_south_to_north_item_uses_reduced_rate() {
        let tax = TaxCalculator::default().calculate(
            TaxRegime::LucroPresumido,
            Sp,
            Ba,
            money(100, 0),
            Decimal::from(2),
        )
        .unwrap();
        assert_eq!(tax.icms.rate, Decimal::from(7));
        assert_eq!(tax.icms.value, money(14, 0));
    }

    #[test]
    fn ipi_is_added_only_when_rate_is_positive() {
        let calc = TaxCalculator::default();
        let mut input = TaxInput {
            regime: TaxRegime::SimplesNacional,
            issuer_state: Sp,
            customer_state: Rj,
            unit_price: money(50, 0),
            quantity: Decimal::from(4),
            ipi_rate: Some(Decimal::from(10)),
        };
        let tax = calc.calculate_item(&input).unwrap();
        let ipi = tax.ipi.expect("ipi applies");
        assert_eq!(ipi.cst, "50");
        assert_eq!(ipi.base, money(200, 0));
        assert_eq!(ipi.value, money(20, 0));
        assert_eq!(tax.total_taxes, money(20, 0));

        input.ipi_rate = Some(Decimal::ZERO);
        assert!(calc.calculate_item(&input).unwrap().ipi.is_none());
    }

    #[test]
    fn values_round_half_away_from_zero_to_cents() {
        let tax = TaxCalculator::default().calculate(
            TaxRegime::LucroPresumido,
            Sp,
            Sp,
            Decimal::new(1, 2),
            Decimal::from(50),
        )
        .unwrap();
        // 0.50 * 0.65% = 0.00325
        assert_eq!(tax.pis.value, Decimal::ZERO);
        // 0.50 * 3% = 0.015
        assert_eq!(tax.cofins.value, Decimal::new(2, 2));
    }

    #[test]
    fn calculation_is_deterministic() {
        let calc = TaxCalculator::default();
        let first = calc.calculate(TaxRegime::LucroReal, Pe, Sc, Decimal::new(123_4567, 4), Decimal::new(35, 1)).unwrap();
        for _ in 0..10 {
            let again = calc.calculate(TaxRegime::LucroReal, Pe, Sc, Decimal::new(123_4567, 4), Decimal::new(35, 1)).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn out_of_range_amounts_fail_instead_of_panicking() {
        let calc = TaxCalculator::default();
        let err = calc
            .calculate(TaxRegime::LucroReal, Sp, Sp, Decimal::MAX, Decimal::from(2))
            .unwrap_err();
        assert_eq!(err.kind(), "validation_failed");

        // The product fits, the rate multiplication does not.
        let err = calc
            .calculate(TaxRegime::LucroReal, Sp, Sp, Decimal::MAX, Decimal::ONE)
            .unwrap_err();
        assert_eq!(err.context().metadata.get("field").map(String::as_str), Some("tax value"));
    }

    #[test]
    fn unknown_regime_text_is_an_error() {
        assert!("lucro_arbitrado".parse::<TaxRegime>().is_err());
        assert_eq!("mei".parse::<TaxRegime>(), Ok(TaxRegime::Mei));
    }
}
