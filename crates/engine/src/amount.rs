use std::{fmt, str::FromStr};

use crate::EngineError;

const SCALE: i64 = 10_000;
const FRACTION_DIGITS: usize = 4;
const CURRENCY_SYMBOLS: [char; 3] = ['$', '€', '£'];

/// Signed decimal amount with four fractional digits.
///
/// Bank rows carry amounts as formatted text; this type is what every
/// comparison and conversion works on. The value is signed:
/// - positive = credit / refund
/// - negative = expense
///
/// # Examples
///
/// ```rust
/// use engine::Amount;
///
/// let amount: Amount = "-$1,204.50".parse().unwrap();
/// assert_eq!(amount.units(), -12_045_000);
/// assert_eq!(amount.to_string(), "-1204.50");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Two amounts closer than this are the same real-world amount.
    pub const TOLERANCE: Amount = Amount(100);

    /// Raw value in ten-thousandths.
    #[must_use]
    pub const fn units(self) -> i64 {
        self.0
    }

    /// Absolute difference between two amounts.
    #[must_use]
    pub fn distance(self, other: Amount) -> Amount {
        Amount(self.0.abs_diff(other.0).min(i64::MAX as u64) as i64)
    }

    /// Tolerance match: `|self - other| < 0.01`, exact.
    #[must_use]
    pub fn matches(self, other: Amount) -> bool {
        self.distance(other) < Self::TOLERANCE
    }

    /// Ledger milliunits for a categorized transaction.
    ///
    /// Every categorized row is an outflow on the credit card account, so the
    /// result is always `-round(|amount| * 1000)`, rounding half away from zero.
    #[must_use]
    pub fn to_outflow_milliunits(self) -> i64 {
        let abs = self.0.unsigned_abs();
        let milli = (abs + 5) / 10;
        -(milli.min(i64::MAX as u64) as i64)
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Sum of `amounts`, `None` as soon as the total leaves the `i64` range.
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

impl fmt::Display for Amount {
    /// Two decimals, rounding half away from zero.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = (self.0.unsigned_abs() + 50) / 100;
        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

impl FromStr for Amount {
    type Err = EngineError;

    /// Parses a bank-formatted amount.
    ///
    /// Currency symbols, spaces and `,` thousands separators are ignored; the
    /// sign may come before or after the symbol (`-$4.50`, `$-4.50`) and
    /// accounting parentheses mean negative (`(4.50)`). At most four
    /// fractional digits are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidAmount(format!("\"{s}\""));
        let overflow = || EngineError::InvalidAmount(format!("\"{s}\" is too large"));

        let cleaned: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',' && !CURRENCY_SYMBOLS.contains(c))
            .collect();
        if cleaned.is_empty() {
            return Err(EngineError::InvalidAmount("empty amount".to_string()));
        }

        let (negative, rest) = match cleaned
            .strip_prefix('(')
            .and_then(|inner| inner.strip_suffix(')'))
        {
            Some(inner) => (true, inner),
            None => match cleaned.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
            },
        };

        let (whole_str, frac_str) = match rest.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (rest, ""),
        };
        if whole_str.is_empty() && frac_str.is_empty() {
            return Err(invalid());
        }
        if !whole_str.chars().all(|c| c.is_ascii_digit())
            || !frac_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        if frac_str.len() > FRACTION_DIGITS {
            return Err(EngineError::InvalidAmount(format!(
                "\"{s}\" has too many decimals"
            )));
        }

        let whole: i64 = if whole_str.is_empty() {
            0
        } else {
            whole_str.parse().map_err(|_| overflow())?
        };
        let frac: i64 = if frac_str.is_empty() {
            0
        } else {
            let padded = format!("{frac_str:0<width$}", width = FRACTION_DIGITS);
            padded.parse().map_err(|_| invalid())?
        };

        let total = whole
            .checked_mul(SCALE)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(overflow)?;

        Ok(Amount(if negative { -total } else { total }))
    }
}
