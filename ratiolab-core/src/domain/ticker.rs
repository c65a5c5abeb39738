//! Ticker symbol normalization.

use thiserror::Error;

/// Maximum number of comparison tickers per analysis.
pub const MAX_COMPARISONS: usize = 6;

/// Suffix carried by tickers listed on the Buenos Aires exchange.
pub const MERVAL_SUFFIX: &str = ".BA";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickerError {
    #[error("ticker symbol is empty")]
    Empty,

    #[error("ticker '{0}' contains whitespace")]
    Whitespace(String),
}

/// Trim and upper-case a user supplied ticker.
///
/// Tickers are case-insensitive; `ggal.ba` and `GGAL.BA` are the same symbol.
pub fn normalize_ticker(raw: &str) -> Result<String, TickerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TickerError::Empty);
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(TickerError::Whitespace(trimmed.to_string()));
    }
    Ok(trimmed.to_uppercase())
}

/// True for tickers quoted in pesos on the local market.
pub fn is_merval_ticker(ticker: &str) -> bool {
    ticker.ends_with(MERVAL_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_ticker("  ggal.ba ").unwrap(), "GGAL.BA");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(normalize_ticker("   "), Err(TickerError::Empty));
    }

    #[test]
    fn rejects_inner_whitespace() {
        assert!(matches!(
            normalize_ticker("GG AL"),
            Err(TickerError::Whitespace(_))
        ));
    }

    #[test]
    fn merval_suffix_detection() {
        assert!(is_merval_ticker("YPFD.BA"));
        assert!(!is_merval_ticker("YPF"));
    }
}
