use rust_decimal::Decimal;

/// Largest quantity a single line, order item or stock change may carry.
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Units that accept fractional quantities (weight and volume).
pub const DECIMAL_UNITS: [&str; 4] = ["kg", "g", "l", "ml"];

/// Count-based units (pcs, box, pack, ...) only take whole quantities.
pub fn is_decimal_unit(unit: &str) -> bool {
    DECIMAL_UNITS.iter().any(|u| *u == unit)
}

/// Whole quantities for count units, anything for weight and volume.
pub fn fits_unit(unit: &str, quantity: Decimal) -> bool {
    is_decimal_unit(unit) || quantity.fract().is_zero()
}

pub fn unit_label(unit: &str) -> &str {
    match unit {
        "l" => "L",
        "dozen" => "dz",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_and_volume_units_are_decimal() {
        for unit in ["kg", "g", "l", "ml"] {
            assert!(is_decimal_unit(unit), "{unit}");
        }
        for unit in ["pcs", "box", "pack", "dozen", "KG"] {
            assert!(!is_decimal_unit(unit), "{unit}");
        }
    }

    #[test]
    fn count_units_take_whole_quantities() {
        use rust_decimal_macros::dec;

        assert!(fits_unit("pcs", dec!(3)));
        assert!(fits_unit("pcs", dec!(-2.000)));
        assert!(!fits_unit("pcs", dec!(1.5)));
        assert!(fits_unit("kg", dec!(1.25)));
    }

    #[test]
    fn labels() {
        assert_eq!(unit_label("l"), "L");
        assert_eq!(unit_label("dozen"), "dz");
        assert_eq!(unit_label("kg"), "kg");
        assert_eq!(unit_label("bundle"), "bundle");
    }
}
