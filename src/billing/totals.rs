use rust_decimal::Decimal;
use serde::Serialize;

/// The three numbers a line contributes to a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub gst_percent: Decimal,
}

impl LineAmounts {
    pub fn gross(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    /// GST on the undiscounted line.
    pub fn gross_gst(&self) -> Decimal {
        self.gross() * self.gst_percent / Decimal::ONE_HUNDRED
    }
}

/// Limits a discount percentage to `0..=100`.
pub fn clamp_discount(percent: Decimal) -> Decimal {
    percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

/// Bill-level totals.
///
/// GST is charged on the discounted value: each line's GST is scaled by
/// `1 - discount/100`, so `total == taxable_amount + gst_amount` always holds.
/// Nothing is rounded here; amounts are rounded only when printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BillTotals {
    pub subtotal: Decimal,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub taxable_amount: Decimal,
    pub gst_amount: Decimal,
    pub total: Decimal,
}

impl BillTotals {
    pub fn compute<I>(lines: I, discount_percent: Decimal) -> Self
    where
        I: IntoIterator<Item = LineAmounts>,
    {
        let discount_percent = clamp_discount(discount_percent);
        let multiplier = Decimal::ONE - discount_percent / Decimal::ONE_HUNDRED;

        let (subtotal, gross_gst) = lines
            .into_iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(subtotal, gst), line| {
                (subtotal + line.gross(), gst + line.gross_gst())
            });

        let discount_amount = subtotal * discount_percent / Decimal::ONE_HUNDRED;
        let taxable_amount = subtotal - discount_amount;
        let gst_amount = gross_gst * multiplier;

        Self {
            subtotal,
            discount_percent,
            discount_amount,
            taxable_amount,
            gst_amount,
            total: taxable_amount + gst_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn line(quantity: Decimal, unit_price: Decimal, gst_percent: Decimal) -> LineAmounts {
        LineAmounts {
            quantity,
            unit_price,
            gst_percent,
        }
    }

    #[test]
    fn empty_cart_is_all_zero() {
        let totals = BillTotals::compute(Vec::new(), dec!(25));
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.discount_amount, Decimal::ZERO);
        assert_eq!(totals.taxable_amount, Decimal::ZERO);
        assert_eq!(totals.gst_amount, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn computes_discounted_gst_bill() {
        let lines = vec![
            line(dec!(2), dec!(100), dec!(18)),
            line(dec!(1.5), dec!(40), dec!(5)),
            line(dec!(3), dec!(10), dec!(0)),
        ];
        let totals = BillTotals::compute(lines, dec!(10));

        assert_eq!(totals.subtotal, dec!(290));
        assert_eq!(totals.discount_amount, dec!(29));
        assert_eq!(totals.taxable_amount, dec!(261));
        // (36 + 3) * 0.9
        assert_eq!(totals.gst_amount, dec!(35.1));
        assert_eq!(totals.total, dec!(296.1));
    }

    #[test]
    fn discount_is_clamped() {
        let lines = vec![line(dec!(1), dec!(50), dec!(12))];

        let over = BillTotals::compute(lines.clone(), dec!(150));
        assert_eq!(over.discount_percent, dec!(100));
        assert_eq!(over.total, Decimal::ZERO);

        let under = BillTotals::compute(lines, dec!(-5));
        assert_eq!(under.discount_percent, Decimal::ZERO);
        assert_eq!(under.total, dec!(56));
    }

    fn amount() -> impl Strategy<Value = Decimal> {
        (0i64..1_000_000, 0u32..3).prop_map(|(units, scale)| Decimal::new(units, scale))
    }

    fn gst() -> impl Strategy<Value = Decimal> {
        prop_oneof![Just(dec!(0)), Just(dec!(5)), Just(dec!(12)), Just(dec!(18)), Just(dec!(28))]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn total_is_taxable_plus_gst(
            lines in prop::collection::vec((amount(), amount(), gst()), 0..12),
            discount in -50i64..200,
        ) {
            let lines = lines.into_iter().map(|(q, p, g)| line(q, p, g));
            let totals = BillTotals::compute(lines, Decimal::from(discount));

            prop_assert_eq!(totals.total, totals.taxable_amount + totals.gst_amount);
            prop_assert!(totals.discount_percent >= Decimal::ZERO);
            prop_assert!(totals.discount_percent <= Decimal::ONE_HUNDRED);
            prop_assert!(totals.total >= Decimal::ZERO);
            prop_assert!(totals.taxable_amount <= totals.subtotal);
        }
    }
}
