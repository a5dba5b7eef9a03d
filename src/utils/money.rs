use rust_decimal::{Decimal, RoundingStrategy};

/// Ceiling for any single price or cost (Rs. 10 crore).
pub const MAX_PRICE: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// Formats an amount the way Indian receipts print it: two decimals and
/// lakh/crore digit grouping (`12,34,567.80`).
pub fn format_inr(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let grouped = group_indian(whole);
    if negative {
        format!("-{}.{}", grouped, fraction)
    } else {
        format!("{}.{}", grouped, fraction)
    }
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();

    format!("{},{}", groups.join(","), tail)
}

/// Quantity without trailing zeros (`2.500` -> `2.5`, `3.000` -> `3`).
pub fn format_quantity(quantity: Decimal) -> String {
    quantity.normalize().to_string()
}

pub fn format_percent(percent: Decimal) -> String {
    percent.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn groups_digits_in_lakhs_and_crores() {
        assert_eq!(format_inr(dec!(0)), "0.00");
        assert_eq!(format_inr(dec!(999)), "999.00");
        assert_eq!(format_inr(dec!(1000)), "1,000.00");
        assert_eq!(format_inr(dec!(123456.78)), "1,23,456.78");
        assert_eq!(format_inr(dec!(12345678.9)), "1,23,45,678.90");
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(format_inr(dec!(10.005)), "10.01");
        assert_eq!(format_inr(dec!(10.004)), "10.00");
        assert_eq!(format_inr(dec!(-1234.565)), "-1,234.57");
        assert_eq!(format_inr(dec!(-0.001)), "0.00");
    }

    #[test]
    fn trims_quantity_zeros() {
        assert_eq!(format_quantity(dec!(2.500)), "2.5");
        assert_eq!(format_quantity(dec!(3.000)), "3");
        assert_eq!(format_percent(dec!(18.00)), "18");
    }
}
