use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::error::SchemaError;
use crate::pipeline::report::ParseWarning;
use crate::types::RawValue;

/// Bathroom descriptions that carry no digit but mean half a bathroom.
const HALF_BATH_LABELS: [&str; 3] = ["half-bath", "private half-bath", "shared half-bath"];

const CURRENCY_SYMBOLS: [char; 3] = ['$', '€', '£'];

static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.?\d*)").expect("static regex is valid"));

/// Turns one raw cell into a number, or `None` when the cell is unusable.
/// Unusable cells are never errors; they are left for imputation.
pub trait FieldNormalizer {
    fn normalize(&self, raw: &RawValue) -> Option<f64>;

    /// Short name used in logs and metrics
    fn strategy(&self) -> &'static str;
}

/// `"$1,234.56"` style prices.
pub struct CurrencyNormalizer;

/// Free-text unit descriptions such as `"1.5 shared baths"`.
pub struct UnitTextNormalizer;

/// Plain numeric text such as `"4"` or `"4.85"`.
pub struct NumericNormalizer;

impl FieldNormalizer for CurrencyNormalizer {
    fn normalize(&self, raw: &RawValue) -> Option<f64> {
        match raw {
            RawValue::Null => None,
            RawValue::Number(n) => finite(*n),
            RawValue::Text(text) => {
                let stripped: String = text
                    .chars()
                    .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',')
                    .collect();
                let stripped = stripped.trim();
                if stripped.is_empty() {
                    return None;
                }
                stripped.parse::<f64>().ok().and_then(finite)
            }
        }
    }

    fn strategy(&self) -> &'static str {
        "currency"
    }
}

impl FieldNormalizer for UnitTextNormalizer {
    fn normalize(&self, raw: &RawValue) -> Option<f64> {
        match raw {
            RawValue::Null => None,
            RawValue::Number(n) => finite(*n),
            RawValue::Text(text) => {
                let lowered = text.trim().to_lowercase();
                if lowered.is_empty() {
                    return None;
                }
                if HALF_BATH_LABELS.contains(&lowered.as_str()) {
                    return Some(0.5);
                }
                FIRST_NUMBER
                    .captures(&lowered)
                    .and_then(|caps| caps.get(1))
                    .and_then(|m| m.as_str().parse::<f64>().ok())
            }
        }
    }

    fn strategy(&self) -> &'static str {
        "unit_text"
    }
}

impl FieldNormalizer for NumericNormalizer {
    fn normalize(&self, raw: &RawValue) -> Option<f64> {
        match raw {
            RawValue::Null => None,
            RawValue::Number(n) => finite(*n),
            RawValue::Text(text) => text.trim().parse::<f64>().ok().and_then(finite),
        }
    }

    fn strategy(&self) -> &'static str {
        "numeric"
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Result of cleaning the price column: the surviving row positions and their
/// parsed prices, plus a warning when rows had to be dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedPrices {
    pub kept_rows: Vec<usize>,
    pub prices: Vec<f64>,
    pub warning: Option<ParseWarning>,
}

/// Parse every price and drop the rows where it is unusable.
///
/// Price is the prediction target, so it is never imputed. Fails when no row
/// keeps a usable price.
pub fn clean_prices<'a, I>(column: &str, values: I) -> Result<CleanedPrices, SchemaError>
where
    I: IntoIterator<Item = &'a RawValue>,
{
    let normalizer = CurrencyNormalizer;
    let mut kept_rows = Vec::new();
    let mut prices = Vec::new();
    let mut total = 0usize;

    for (idx, raw) in values.into_iter().enumerate() {
        total += 1;
        if let Some(price) = normalizer.normalize(raw) {
            kept_rows.push(idx);
            prices.push(price);
        }
    }

    if prices.is_empty() {
        return Err(SchemaError::EmptyColumn(column.to_string()));
    }

    let dropped = total - prices.len();
    let warning = (dropped > 0).then(|| {
        let warning = ParseWarning::dropped_rows(column, dropped, total);
        warn!(column = %column, dropped, total, "{}", warning);
        warning
    });

    Ok(CleanedPrices {
        kept_rows,
        prices,
        warning,
    })
}

/// Apply a normalizer to every cell of a column.
pub fn normalize_column<'a, I>(normalizer: &dyn FieldNormalizer, values: I) -> Vec<Option<f64>>
where
    I: IntoIterator<Item = &'a RawValue>,
{
    values.into_iter().map(|raw| normalizer.normalize(raw)).collect()
}
