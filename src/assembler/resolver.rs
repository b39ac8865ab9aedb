//! Value Resolver — turns a textual token into a 64-bit signed
//! integer, honoring hex, character literals, decimal, `kb`/`mb`
//! suffixes, defined constants and defined labels.

use crate::assembler::symbol::SymbolTable;

const KB: i64 = 1024;
const MB: i64 = 1024 * 1024;

/// Resolve a token to its integer value. An empty token, or a token
/// that fails every parse rule, resolves to 0 — by design this is not
/// distinguishable from an intentionally-written zero.
pub fn resolve(token: &str, symbols: &SymbolTable) -> i64 {
    if token.is_empty() {
        return 0;
    }

    let (multiplier, stripped) = strip_unit_suffix(token);

    if let Some(value) = symbols.constant(stripped) {
        return value * multiplier;
    }
    if let Some(address) = symbols.label(stripped) {
        return address as i64;
    }
    if let Some(hex) = stripped.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).unwrap_or(0) * multiplier;
    }
    if let Some(rest) = stripped.strip_prefix('\'') {
        return rest.chars().next().map(|c| c as i64).unwrap_or(0) * multiplier;
    }
    stripped.parse::<i64>().unwrap_or(0) * multiplier
}

/// Strip a case-insensitive `kb`/`mb` suffix, returning the
/// multiplier and the remaining token.
fn strip_unit_suffix(token: &str) -> (i64, &str) {
    let lower = token.to_ascii_lowercase();
    if lower.ends_with("kb") {
        (KB, &token[..token.len() - 2])
    } else if lower.ends_with("mb") {
        (MB, &token[..token.len() - 2])
    } else {
        (1, token)
    }
}

/// Parse a register token (`x0`..`x31`) into its 0-31 index.
pub fn parse_register(token: &str) -> Option<u8> {
    let digits = token.strip_prefix('x')?;
    if digits.is_empty() {
        return None;
    }
    let n: u32 = digits.parse().ok()?;
    if n <= 31 { Some(n as u8) } else { None }
}

/// Whether a token has register *shape* (`x` followed by digits),
/// independent of whether the index is actually in range. Used to
/// route out-of-range register tokens (e.g. `x99`) to
/// [`crate::assembler::Error::UnknownRegister`] instead of silently
/// misclassifying the line as some other form.
pub fn looks_register_shaped(token: &str) -> bool {
    match token.strip_prefix('x') {
        Some(digits) => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_decimal() {
        let symbols = SymbolTable::new();
        assert_eq!(resolve("42", &symbols), 42);
        assert_eq!(resolve("-3", &symbols), -3);
    }

    #[test]
    fn resolves_hex() {
        let symbols = SymbolTable::new();
        assert_eq!(resolve("0x10", &symbols), 16);
    }

    #[test]
    fn resolves_char_literal() {
        let symbols = SymbolTable::new();
        assert_eq!(resolve("'A", &symbols), 65);
    }

    #[test]
    fn resolves_kb_and_mb_suffixes() {
        let symbols = SymbolTable::new();
        assert_eq!(resolve("2kb", &symbols), 2048);
        assert_eq!(resolve("1MB", &symbols), 1024 * 1024);
        assert_eq!(resolve("0x1kb", &symbols), 1024);
    }

    #[test]
    fn constants_resolve_scaled_labels_do_not() {
        let mut symbols = SymbolTable::new();
        symbols.define_constant("PAGE", 4, 1).unwrap();
        symbols.define_label("loop", 4096, 1).unwrap();
        assert_eq!(resolve("PAGEkb", &symbols), 4 * 1024);
        assert_eq!(resolve("loop", &symbols), 4096);
    }

    #[test]
    fn unparsable_token_falls_back_to_zero() {
        let symbols = SymbolTable::new();
        assert_eq!(resolve("not_a_number", &symbols), 0);
    }

    #[test]
    fn empty_token_is_zero() {
        let symbols = SymbolTable::new();
        assert_eq!(resolve("", &symbols), 0);
    }

    #[test]
    fn registers_parse_by_index() {
        assert_eq!(parse_register("x0"), Some(0));
        assert_eq!(parse_register("x31"), Some(31));
        assert_eq!(parse_register("x32"), None);
        assert_eq!(parse_register("y5"), None);
    }
}
