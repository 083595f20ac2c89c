use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Fraction digits assumed for codes missing from the catalog.
pub const DEFAULT_MINOR_UNITS: u32 = 2;

/// Normalized ISO-like currency code (e.g. `INR`) carried by every expense,
/// transaction and balance entry.
///
/// Codes are trimmed and upper-cased on construction, so `" inr"` and
/// `"INR"` are the same currency.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reference data for this code, if the catalog knows it.
    pub fn currency(&self) -> Option<&'static Currency> {
        Currency::lookup(self.as_str())
    }

    /// Number of fraction digits used for rounding amounts in this currency.
    ///
    /// Unknown codes fall back to [`DEFAULT_MINOR_UNITS`].
    pub fn minor_units(&self) -> u32 {
        self.currency()
            .map_or(DEFAULT_MINOR_UNITS, |currency| currency.minor_units)
    }
}

impl From<String> for CurrencyCode {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for CurrencyCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl Borrow<str> for CurrencyCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable currency reference data.
///
/// ## Minor units
///
/// `minor_units` is how many decimal digits a currency uses between major
/// units (human input/output, e.g. `10.50 EUR`) and its smallest coin (the
/// cent). Split allocation hands out leftovers in steps of one minor unit,
/// and persisted balances are rounded to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Currency {
    pub code: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
    pub minor_units: u32,
}

const CATALOG: &[Currency] = &[
    Currency { code: "INR", symbol: "₹", name: "Indian Rupee", minor_units: 2 },
    Currency { code: "USD", symbol: "$", name: "US Dollar", minor_units: 2 },
    Currency { code: "EUR", symbol: "€", name: "Euro", minor_units: 2 },
    Currency { code: "GBP", symbol: "£", name: "British Pound", minor_units: 2 },
    Currency { code: "AUD", symbol: "A$", name: "Australian Dollar", minor_units: 2 },
    Currency { code: "CAD", symbol: "C$", name: "Canadian Dollar", minor_units: 2 },
    Currency { code: "CHF", symbol: "CHF", name: "Swiss Franc", minor_units: 2 },
    Currency { code: "CNY", symbol: "¥", name: "Chinese Yuan", minor_units: 2 },
    Currency { code: "AED", symbol: "د.إ", name: "UAE Dirham", minor_units: 2 },
    Currency { code: "SGD", symbol: "S$", name: "Singapore Dollar", minor_units: 2 },
    Currency { code: "JPY", symbol: "¥", name: "Japanese Yen", minor_units: 0 },
    Currency { code: "KRW", symbol: "₩", name: "South Korean Won", minor_units: 0 },
    Currency { code: "KWD", symbol: "KD", name: "Kuwaiti Dinar", minor_units: 3 },
];

impl Currency {
    /// Finds a currency by code (case-insensitive).
    #[must_use]
    pub fn lookup(code: &str) -> Option<&'static Currency> {
        let code = code.trim();
        CATALOG
            .iter()
            .find(|currency| currency.code.eq_ignore_ascii_case(code))
    }

    pub fn code(&self) -> CurrencyCode {
        CurrencyCode::new(self.code)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

/// Rejects codes the catalog does not know.
pub(crate) fn require_known(code: &CurrencyCode) -> ResultEngine<&'static Currency> {
    Currency::lookup(code.as_str())
        .ok_or_else(|| EngineError::UnknownCurrency(code.as_str().to_string()))
}
