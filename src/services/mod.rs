pub mod ingestion;
pub mod ledger;
pub mod leases;
pub mod order_status;
pub mod packing;
pub mod picking;
pub mod shipping;

/// Canonical form of a scanned code: trimmed, leading zeros stripped,
/// uppercased. Scanners and spreadsheet exports disagree on zero padding and
/// case, so every comparison goes through this.
pub fn normalize_sku(value: &str) -> String {
    value.trim().trim_start_matches('0').to_uppercase()
}

/// Bounded retry for lease acquisition races: after this many lost races the
/// caller reports "nothing currently available" instead of spinning.
pub const ASSIGN_RETRY_LIMIT: usize = 5;

#[cfg(test)]
mod tests {
    use super::normalize_sku;

    #[test]
    fn normalization_strips_padding_and_case() {
        assert_eq!(normalize_sku(" 00123ab "), "123AB");
        assert_eq!(normalize_sku("123"), "123");
        assert_eq!(normalize_sku("000"), "");
    }
}
