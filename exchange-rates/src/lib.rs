//! Settlement-currency conversion with a declarative rate table.
//!
//! Every rate is expressed as "units of the settlement currency (IDR) for one
//! unit of the currency". Conversions go through the settlement currency:
//! `amount * rate[from] / rate[to]`, rounded to two decimal places
//! (half-up).
//!
//! The hardcoded table is only the default [`RateProvider`]; a live-rate
//! source can be injected into [`CurrencyConverter`] instead.
//!
//! # Adding a New Currency
//! Add a line to the `define_currencies!` invocation:
//! ```ignore
//! define_currencies! {
//!     // ... existing currencies ...
//!     PHP => ("PHP", "₱", 280, ["PH"]),
//! }
//! ```
//!
//! # Example
//! ```
//! use exchange_rates::CurrencyConverter;
//! use rust_decimal::Decimal;
//!
//! let converter = CurrencyConverter::default();
//! let idr = converter.to_settlement(Decimal::new(10000, 2), Some("USD"));
//! assert_eq!(idr, Decimal::new(160000000, 2));
//! ```

use std::fmt;
use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};

/// Currency every gateway amount is denominated in.
pub const SETTLEMENT_CURRENCY: &str = "IDR";

/// Decimal places kept after a conversion.
const CONVERTED_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateError {
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Rate Provider Port
// ─────────────────────────────────────────────────────────────────────────────

/// Source of settlement rates.
pub trait RateProvider: Send + Sync + 'static {
    /// Units of the settlement currency for one unit of `code`.
    /// Returns `None` for codes the provider does not know.
    fn rate_to_base(&self, code: &str) -> Option<Decimal>;

    /// Currency codes this provider can quote.
    fn supported_codes(&self) -> Vec<&'static str>;
}

// ─────────────────────────────────────────────────────────────────────────────
// THE MACRO: Defines all currencies, CurrencyCode enum, and region lookup
// ─────────────────────────────────────────────────────────────────────────────

/// Macro to define currencies with their settlement rate and home regions.
///
/// # Syntax
/// ```ignore
/// define_currencies! {
///     CurrencyName => ("CODE", "SYMBOL", rate_to_idr, ["REGION", ...]),
/// }
/// ```
#[macro_export]
macro_rules! define_currencies {
    (
        $(
            $name:ident => ($code:literal, $symbol:literal, $rate:expr, [$($region:literal),* $(,)?])
        ),* $(,)?
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
        #[serde(rename_all = "UPPERCASE")]
        pub enum CurrencyCode {
            $($name),*
        }

        impl CurrencyCode {
            pub fn code(&self) -> &'static str {
                match self {
                    $(CurrencyCode::$name => $code),*
                }
            }

            pub fn symbol(&self) -> &'static str {
                match self {
                    $(CurrencyCode::$name => $symbol),*
                }
            }

            /// Units of IDR for one unit of this currency.
            pub fn base_rate(&self) -> Decimal {
                match self {
                    $(CurrencyCode::$name => Decimal::from($rate as i64)),*
                }
            }

            pub fn all() -> &'static [CurrencyCode] {
                &[$(CurrencyCode::$name),*]
            }

            /// Looks up the default currency of a two-letter region code.
            pub fn for_region(region: &str) -> Option<CurrencyCode> {
                match region.trim().to_ascii_uppercase().as_str() {
                    $($($region)|* => Some(CurrencyCode::$name),)*
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for CurrencyCode {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.code())
            }
        }

        impl std::str::FromStr for CurrencyCode {
            type Err = RateError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($code => Ok(CurrencyCode::$name),)*
                    _ => Err(RateError::UnknownCurrency(s.to_string())),
                }
            }
        }
    };
}

// ─────────────────────────────────────────────────────────────────────────────
// CURRENCY DEFINITIONS - Add new currencies here!
// ─────────────────────────────────────────────────────────────────────────────

define_currencies! {
    IDR => ("IDR", "Rp", 1, ["ID"]),
    USD => ("USD", "$", 16000, ["US"]),
    EUR => ("EUR", "€", 17300, ["EU"]),
    GBP => ("GBP", "£", 20200, ["GB"]),
    SGD => ("SGD", "S$", 11800, ["SG"]),
    MYR => ("MYR", "RM", 3400, ["MY"]),
    AUD => ("AUD", "A$", 10500, ["AU"]),
    JPY => ("JPY", "¥", 105, ["JP"]),
    CNY => ("CNY", "¥", 2200, ["CN"]),
    HKD => ("HKD", "HK$", 2050, ["HK"]),
    KRW => ("KRW", "₩", 12, ["KR"]),
    THB => ("THB", "฿", 450, ["TH"]),
}

/// Default currency for a two-letter region code, falling back to the
/// settlement currency.
pub fn currency_for_region(region: &str) -> &'static str {
    CurrencyCode::for_region(region)
        .map(|c| c.code())
        .unwrap_or(SETTLEMENT_CURRENCY)
}

// ─────────────────────────────────────────────────────────────────────────────
// Static Rate Table
// ─────────────────────────────────────────────────────────────────────────────

/// The hardcoded approximate rate table.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticRates;

impl RateProvider for StaticRates {
    fn rate_to_base(&self, code: &str) -> Option<Decimal> {
        code.parse::<CurrencyCode>().ok().map(|c| c.base_rate())
    }

    fn supported_codes(&self) -> Vec<&'static str> {
        CurrencyCode::all().iter().map(|c| c.code()).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Converter
// ─────────────────────────────────────────────────────────────────────────────

/// Converts decimal amounts between currency codes via the settlement
/// currency.
///
/// Conversion never fails:
/// - a missing code on either side returns the amount unchanged;
/// - an unknown code is priced at rate 1, i.e. treated as if it were already
///   IDR. This is a known approximation, not a validation step;
/// - a zero target rate returns the amount unchanged.
#[derive(Clone)]
pub struct CurrencyConverter {
    rates: Arc<dyn RateProvider>,
}

impl Default for CurrencyConverter {
    fn default() -> Self {
        Self::new(StaticRates)
    }
}

impl fmt::Debug for CurrencyConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrencyConverter")
            .field("supported", &self.rates.supported_codes())
            .finish()
    }
}

impl CurrencyConverter {
    pub fn new(rates: impl RateProvider) -> Self {
        Self {
            rates: Arc::new(rates),
        }
    }

    pub fn with_provider(rates: Arc<dyn RateProvider>) -> Self {
        Self { rates }
    }

    /// Rate to the settlement currency, `1` for unknown codes.
    pub fn rate_to_base(&self, code: &str) -> Decimal {
        self.rates
            .rate_to_base(&normalize(code))
            .unwrap_or(Decimal::ONE)
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.rates.rate_to_base(&normalize(code)).is_some()
    }

    pub fn supported_currencies(&self) -> Vec<&'static str> {
        self.rates.supported_codes()
    }

    pub fn convert(&self, amount: Decimal, from: Option<&str>, to: Option<&str>) -> Decimal {
        let (Some(from), Some(to)) = (from, to) else {
            return amount;
        };

        let (from, to) = (normalize(from), normalize(to));
        if from == to {
            return amount;
        }

        let from_rate = self.rate_to_base(&from);
        let to_rate = self.rate_to_base(&to);
        if to_rate.is_zero() {
            return amount;
        }

        // Overflow is only reachable with absurd inputs; keep the amount as is.
        amount
            .checked_mul(from_rate)
            .and_then(|base| base.checked_div(to_rate))
            .map(|v| v.round_dp_with_strategy(CONVERTED_SCALE, RoundingStrategy::MidpointAwayFromZero))
            .unwrap_or(amount)
    }

    pub fn to_settlement(&self, amount: Decimal, from: Option<&str>) -> Decimal {
        self.convert(amount, from, Some(SETTLEMENT_CURRENCY))
    }

    pub fn from_settlement(&self, amount: Decimal, to: Option<&str>) -> Decimal {
        self.convert(amount, Some(SETTLEMENT_CURRENCY), to)
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
