//! Brazilian federative units and the regional grouping used by ICMS.

use rust_decimal::Decimal;

text_enum! {
    /// One of the 27 federative units (26 states plus the Federal District).
    pub enum BrazilianState {
        Ac => "AC",
        Al => "AL",
        Ap => "AP",
        Am => "AM",
        Ba => "BA",
        Ce => "CE",
        Df => "DF",
        Es => "ES",
        Go => "GO",
        Ma => "MA",
        Mt => "MT",
        Ms => "MS",
        Mg => "MG",
        Pa => "PA",
        Pb => "PB",
        Pr => "PR",
        Pe => "PE",
        Pi => "PI",
        Rj => "RJ",
        Rn => "RN",
        Rs => "RS",
        Ro => "RO",
        Rr => "RR",
        Sc => "SC",
        Sp => "SP",
        Se => "SE",
        To => "TO",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    North,
    Northeast,
    CentralWest,
    Southeast,
    South,
}

impl BrazilianState {
    pub fn region(&self) -> Region {
        use BrazilianState::*;
        match self {
            Ac | Ap | Am | Pa | Ro | Rr | To => Region::North,
            Al | Ba | Ce | Ma | Pb | Pe | Pi | Rn | Se => Region::Northeast,
            Df | Go | Mt | Ms => Region::CentralWest,
            Es | Mg | Rj | Sp => Region::Southeast,
            Pr | Rs | Sc => Region::South,
        }
    }

    /// Senate Resolution 22/89: South and Southeast issuers, except ES, pay the
    /// reduced interstate rate when shipping to these destinations.
    pub fn pays_reduced_interstate_rate_from(&self) -> bool {
        matches!(
            self.region(),
            Region::North | Region::Northeast | Region::CentralWest
        ) || *self == BrazilianState::Es
    }

    pub fn is_south_or_southeast_except_es(&self) -> bool {
        matches!(self.region(), Region::South | Region::Southeast) && *self != BrazilianState::Es
    }

    /// Internal (intrastate) ICMS rate, in percent.
    pub fn internal_icms_rate(&self) -> Decimal {
        use BrazilianState::*;
        match self {
            Ro => Decimal::new(175, 1),
            Ac | Es | Go | Mt | Ms | Pa | Rr | Sc => Decimal::from(17),
            Al | Ap | Am | Ba | Ce | Df | Ma | Mg | Pb | Pr | Pe | Pi | Rj | Rn | Rs | Sp | Se
            | To => Decimal::from(18),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn there_are_27_units_and_each_round_trips_through_text() {
        assert_eq!(BrazilianState::ALL.len(), 27);
        for state in BrazilianState::ALL {
            assert_eq!(state.as_str().parse::<BrazilianState>(), Ok(*state));
        }
        assert!("XX".parse::<BrazilianState>().is_err());
        assert!("sp".parse::<BrazilianState>().is_err());
    }

    #[test]
    fn espirito_santo_is_grouped_with_the_reduced_rate_destinations() {
        assert_eq!(BrazilianState::Es.region(), Region::Southeast);
        assert!(BrazilianState::Es.pays_reduced_interstate_rate_from());
        assert!(!BrazilianState::Es.is_south_or_southeast_except_es());
        assert!(BrazilianState::Sp.is_south_or_southeast_except_es());
        assert!(BrazilianState::Rs.is_south_or_southeast_except_es());
        assert!(!BrazilianState::Rs.pays_reduced_interstate_rate_from());
    }

    #[test]
    fn internal_rates_follow_the_state_table() {
        assert_eq!(BrazilianState::Sp.internal_icms_rate(), Decimal::from(18));
        assert_eq!(BrazilianState::Sc.internal_icms_rate(), Decimal::from(17));
        assert_eq!(BrazilianState::Ro.internal_icms_rate(), Decimal::new(175, 1));
    }
}
