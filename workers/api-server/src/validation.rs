//! Boundary validation for the write surface
//!
//! Rejections here are `invalid-input`: no state is touched and the reason
//! is surfaced verbatim to the caller

use common::types::now_millis;
use constants::{ADDRESS_LEN, ADDRESS_PREFIX, MAX_SYMBOL_LEN};

/// Validate a compliance-whitelisted account or asset address
pub fn validate_address(address: &str) -> Result<(), String> {
    if address.len() != ADDRESS_LEN || !address.starts_with(ADDRESS_PREFIX) {
        return Err(format!(
            "invalid address: expected {ADDRESS_LEN} characters beginning with '{ADDRESS_PREFIX}'"
        ));
    }
    Ok(())
}

/// Validate an asset symbol and return it uppercased
pub fn validate_symbol(symbol: &str) -> Result<String, String> {
    if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN {
        return Err(format!("invalid symbol: expected 1..={MAX_SYMBOL_LEN} characters"));
    }
    Ok(symbol.to_uppercase())
}

/// Parse a positive scaled integer amount from its decimal string
pub fn parse_amount(value: &str, field: &str) -> Result<u128, String> {
    let parsed =
        value.parse::<u128>().map_err(|_| format!("invalid {field}: expected a decimal integer"))?;
    if parsed == 0 {
        return Err(format!("invalid {field}: must be positive"));
    }
    Ok(parsed)
}

/// Validate an order expiry deadline against the current clock
pub fn validate_expiry(expiry_ms: u64) -> Result<(), String> {
    if expiry_ms <= now_millis() {
        return Err("invalid expiry: deadline is in the past".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    /// A well-formed address for tests
    const GOOD_ADDRESS: &str = "CBQHNAXSI55GX2GN6D67GK7BHVPSLJUGZQEU7WJ5LKR5PNUCGLIMAO4K";

    /// Tests the address format gate
    #[test]
    fn test_address_validation() {
        assert!(validate_address(GOOD_ADDRESS).is_ok());

        // Wrong prefix
        assert!(validate_address(&format!("G{}", &GOOD_ADDRESS[1..])).is_err());
        // Wrong length
        assert!(validate_address(&GOOD_ADDRESS[..55]).is_err());
        assert!(validate_address("").is_err());
    }

    /// Tests symbol length bounds and uppercasing
    #[test]
    fn test_symbol_validation() {
        assert_eq!(validate_symbol("gold").unwrap(), "GOLD");
        assert_eq!(validate_symbol("TBILL2026").unwrap(), "TBILL2026");

        assert!(validate_symbol("").is_err());
        assert!(validate_symbol("THIRTEENCHARSX").is_err());
    }

    /// Tests positive scaled-integer parsing
    #[test]
    fn test_amount_parsing() {
        assert_eq!(parse_amount("1000000000", "quantity").unwrap(), 1_000_000_000);

        assert!(parse_amount("0", "quantity").is_err());
        assert!(parse_amount("-5", "quantity").is_err());
        assert!(parse_amount("12.5", "price").is_err());
        assert!(parse_amount("abc", "price").is_err());
    }

    /// Tests that past deadlines are rejected
    #[test]
    fn test_expiry_validation() {
        assert!(validate_expiry(now_millis() + 60_000).is_ok());
        assert!(validate_expiry(now_millis().saturating_sub(1)).is_err());
    }
}
