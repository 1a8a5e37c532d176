//! Quote data validation.
//!
//! A provider result is only accepted when its primary value is present and
//! positive. Inconsistent secondary fields (high below low, open outside the
//! day range, negative volume) are logged but never cause a rejection, since
//! the price itself is still usable.

use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::{IndexRecord, QuoteRecord};

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - reject the record, try next provider.
    Hard,
    /// Soft warning - accept the record but log a warning.
    Soft,
}

#[derive(Clone, Debug)]
struct ValidationIssue {
    severity: ValidationSeverity,
    message: String,
}

impl ValidationIssue {
    fn hard(message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Hard,
            message: message.into(),
        }
    }

    fn soft(message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Soft,
            message: message.into(),
        }
    }
}

/// Quote validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Whether to reject records whose price is zero or negative.
    pub reject_non_positive_prices: bool,
    /// Maximum plausible price; anything above is logged.
    pub max_price: Option<Decimal>,
    /// Whether to warn on zero volume.
    pub warn_on_zero_volume: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_non_positive_prices: true,
            max_price: Some(Decimal::from(1_000_000_000i64)),
            warn_on_zero_volume: false,
        }
    }
}

/// Decides whether a provider record is usable.
pub struct QuoteValidator {
    config: ValidatorConfig,
}

impl QuoteValidator {
    /// Create a new validator with default configuration.
    pub fn new() -> Self {
        Self {
            config: ValidatorConfig::default(),
        }
    }

    /// Create a validator with custom configuration.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate a quote record.
    ///
    /// Returns `ValidationFailed` when the price is missing or, unless
    /// configured otherwise, not positive. Soft issues are logged.
    pub fn validate(&self, record: &QuoteRecord) -> Result<(), MarketDataError> {
        let mut issues = Vec::new();

        self.validate_price(record, &mut issues);
        Self::validate_day_range(record, &mut issues);
        self.validate_volume(record, &mut issues);

        let hard: Vec<_> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !hard.is_empty() {
            return Err(MarketDataError::ValidationFailed {
                message: hard.join("; "),
            });
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!(
                "Quote validation warning for {} from {:?}: {}",
                record.symbol, record.source, issue.message
            );
        }

        Ok(())
    }

    /// Whether an index snapshot carries its value.
    pub fn is_usable_index(&self, record: &IndexRecord) -> bool {
        record.has_value()
    }

    fn validate_price(&self, record: &QuoteRecord, issues: &mut Vec<ValidationIssue>) {
        let Some(price) = record.price else {
            issues.push(ValidationIssue::hard("Missing price"));
            return;
        };

        if self.config.reject_non_positive_prices && price <= Decimal::ZERO {
            issues.push(ValidationIssue::hard(format!("Non-positive price: {}", price)));
        }

        if let Some(max_price) = self.config.max_price {
            if price > max_price {
                issues.push(ValidationIssue::soft(format!(
                    "Price ({}) exceeds max threshold ({})",
                    price, max_price
                )));
            }
        }
    }

    fn validate_day_range(record: &QuoteRecord, issues: &mut Vec<ValidationIssue>) {
        let (Some(high), Some(low)) = (record.high, record.low) else {
            return;
        };

        if high < low {
            issues.push(ValidationIssue::soft(format!(
                "High ({}) is less than Low ({})",
                high, low
            )));
            return;
        }

        if let Some(open) = record.open {
            if open < low || open > high {
                issues.push(ValidationIssue::soft(format!(
                    "Open ({}) is outside High/Low range ({}-{})",
                    open, low, high
                )));
            }
        }
    }

    fn validate_volume(&self, record: &QuoteRecord, issues: &mut Vec<ValidationIssue>) {
        match record.volume {
            Some(volume) if volume < Decimal::ZERO => {
                issues.push(ValidationIssue::soft(format!("Negative volume: {}", volume)));
            }
            Some(volume) if volume.is_zero() && self.config.warn_on_zero_volume => {
                issues.push(ValidationIssue::soft("Zero volume"));
            }
            _ => {}
        }
    }
}

impl Default for QuoteValidator {
    fn default() -> Self {
        Self::new()
    }
}
