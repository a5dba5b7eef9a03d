use std::{borrow::Borrow, fmt::Display};

use askama::Result;

// `{{ "-"|rule(width) }}` repeats the pattern across the receipt width.
#[allow(clippy::unnecessary_wraps)]
pub fn rule<S: Display, W: Borrow<usize>>(pattern: S, width: W) -> Result<String> {
    Ok(pattern.to_string().repeat(*width.borrow()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_repeats_pattern() {
        assert_eq!(rule("-", 5).unwrap(), "-----");
        assert_eq!(rule(&"=", &3).unwrap(), "===");
    }
}
