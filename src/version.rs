//! Version comparison for update eligibility.
//!
//! Accepts the loose semantic-version grammar used by update feeds:
//!
//! - an optional leading `v`
//! - a numeric core of one to four dot-separated components, where every
//!   component after the first may be a wildcard (`x`, `X` or `*`)
//! - an optional `-` prerelease made of dot-separated `[0-9A-Za-z-]` groups
//! - an optional `+` build suffix, ignored when comparing
//!
//! Prerelease and build suffixes are only accepted after a core of at least
//! three components (`1.0.0-beta` is valid, `1.0-beta` is not).
//!
//! ## Ordering
//!
//! Cores compare component by component with missing components read as `0`.
//! A wildcard matches whatever sits at its own position, but a component the
//! other side omits is still `0` (`1.x` is older than `1.7.3`, equal to
//! `1.7`). When the cores tie, a release sorts after any prerelease of the same
//! core, and two prereleases compare token by token. A token is a number when
//! it reads as a numeric literal (`7`, `-1`, `1e2`, `0x10`, `0b1`, `0o7`,
//! `Infinity`), everything else is a string, and a number is always lower than
//! a string at the same position. Numbers compare by value; plain integers
//! compare exactly at any length.
//!
//! This is deliberately looser than semver precedence and is not guaranteed to
//! be transitive for mixed prerelease sequences. Update eligibility depends on
//! this exact behaviour, so [`Version`] does not implement [`Ord`].

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Maximum number of dot-separated components in the numeric core.
pub const MAX_CORE_COMPONENTS: usize = 4;

/// Minimum core length before a prerelease or build suffix may appear.
const MIN_CORE_FOR_SUFFIX: usize = 3;

/// A validated version string.
///
/// There is no `PartialEq`: spellings such as `v1.0.0` and `1.0.0` are the
/// same release, and wildcards make equality non-transitive. Use
/// [`Version::compare`] instead.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    core: Vec<CoreComponent>,
    prerelease: Vec<PrereleaseToken>,
}

#[derive(Debug, Clone)]
enum CoreComponent {
    Number(String),
    Wildcard,
}

#[derive(Debug, Clone)]
enum PrereleaseToken {
    Number(Numeric),
    Text(String),
}

#[derive(Debug, Clone)]
enum Numeric {
    /// Decimal integer without leading zeros, compared exactly.
    Integer { negative: bool, digits: String },
    /// Any other numeric literal, compared by value.
    Float(f64),
}

impl Numeric {
    fn parse(token: &str) -> Option<Self> {
        let (negative, unsigned) = match token.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, token),
        };

        if is_digits(unsigned) {
            let digits = trim_leading_zeros(unsigned).to_string();
            return Some(Self::Integer {
                negative: negative && digits != "0",
                digits,
            });
        }

        let magnitude = if unsigned == "Infinity" {
            f64::INFINITY
        } else if let Some(value) = parse_radix_literal(unsigned) {
            // Signed radix literals are not numbers.
            if negative {
                return None;
            }
            value
        } else {
            parse_exponent_literal(unsigned)?
        };
        Some(Self::Float(if negative { -magnitude } else { magnitude }))
    }

    fn value(&self) -> f64 {
        match self {
            Self::Integer { negative, digits } => {
                let magnitude = digits.parse::<f64>().unwrap_or(f64::INFINITY);
                if *negative {
                    -magnitude
                } else {
                    magnitude
                }
            }
            Self::Float(value) => *value,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Self::Integer {
                    negative: a_neg,
                    digits: a,
                },
                Self::Integer {
                    negative: b_neg,
                    digits: b,
                },
            ) => match (*a_neg, *b_neg) {
                (false, false) => cmp_digits(a, b),
                (true, true) => cmp_digits(b, a),
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
            },
            _ => self
                .value()
                .partial_cmp(&other.value())
                .unwrap_or(Ordering::Equal),
        }
    }
}

impl Version {
    /// Parse and validate a version string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the string does not match the
    /// version grammar.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("not a valid version: '{input}'"));

        let body = input
            .strip_prefix('v')
            .or_else(|| input.strip_prefix('V'))
            .unwrap_or(input);

        let (body, build) = match body.split_once('+') {
            Some((body, build)) => (body, Some(build)),
            None => (body, None),
        };
        if let Some(build) = build {
            if !is_identifier_list(build) {
                return Err(invalid());
            }
        }

        let (core_part, prerelease_part) = match body.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (body, None),
        };

        let mut core = Vec::new();
        for (index, component) in core_part.split('.').enumerate() {
            let parsed = if is_digits(component) {
                CoreComponent::Number(trim_leading_zeros(component).to_string())
            } else if index > 0 && matches!(component, "x" | "X" | "*") {
                CoreComponent::Wildcard
            } else {
                return Err(invalid());
            };
            core.push(parsed);
        }
        if core.len() > MAX_CORE_COMPONENTS {
            return Err(invalid());
        }

        let has_suffix = prerelease_part.is_some() || build.is_some();
        if has_suffix && core.len() < MIN_CORE_FOR_SUFFIX {
            return Err(invalid());
        }

        let prerelease = match prerelease_part {
            Some(pre) if is_identifier_list(pre) => pre
                .split('.')
                .map(|token| match Numeric::parse(token) {
                    Some(number) => PrereleaseToken::Number(number),
                    None => PrereleaseToken::Text(token.to_string()),
                })
                .collect(),
            Some(_) => return Err(invalid()),
            None => Vec::new(),
        };

        Ok(Self {
            raw: input.to_string(),
            core,
            prerelease,
        })
    }

    /// Parse a version out of an untyped JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the value is not a string or the
    /// string is not a valid version.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(s) => Self::parse(s),
            other => Err(Error::InvalidInput(format!(
                "expected a version string, got {other}"
            ))),
        }
    }

    /// The version exactly as it was supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this version carries a prerelease segment.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// Compare two versions using the update-feed ordering.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        let len = self.core.len().max(other.core.len());
        for i in 0..len {
            let ord = match (self.core.get(i), other.core.get(i)) {
                (Some(CoreComponent::Wildcard), _) | (_, Some(CoreComponent::Wildcard)) => {
                    Ordering::Equal
                }
                (a, b) => cmp_digits(core_digits(a), core_digits(b)),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }

        match (self.is_prerelease(), other.is_prerelease()) {
            (false, false) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (true, true) => compare_prerelease(&self.prerelease, &other.prerelease),
        }
    }

    /// Whether `self` is strictly older than `other`.
    #[must_use]
    pub fn is_older_than(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Less
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Compare two version strings.
///
/// `Ordering::Less` means `a` is older than `b`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if either string is not a valid version.
pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    let a = Version::parse(a)?;
    let b = Version::parse(b)?;
    Ok(a.compare(&b))
}

/// Compare two untyped JSON values that should both hold version strings.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if either value is not a string or not a
/// valid version.
pub fn compare_values(a: &serde_json::Value, b: &serde_json::Value) -> Result<Ordering> {
    let a = Version::from_value(a)?;
    let b = Version::from_value(b)?;
    Ok(a.compare(&b))
}

fn compare_prerelease(left: &[PrereleaseToken], right: &[PrereleaseToken]) -> Ordering {
    use PrereleaseToken::{Number, Text};

    for i in 0..left.len().max(right.len()) {
        // Mixed number/text takes priority over the missing-token rule.
        let ord = match (left.get(i), right.get(i)) {
            (None, _) | (Some(Number(_)), Some(Text(_))) => Ordering::Less,
            (_, None) | (Some(Text(_)), Some(Number(_))) => Ordering::Greater,
            (Some(Number(a)), Some(Number(b))) => a.compare(b),
            (Some(Text(a)), Some(Text(b))) => a.as_bytes().cmp(b.as_bytes()),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn core_digits(component: Option<&CoreComponent>) -> &str {
    match component {
        Some(CoreComponent::Number(n)) => n,
        _ => "0",
    }
}

/// Numeric comparison of digit strings without leading zeros, of any length.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// `0x`, `0o` and `0b` literals.
fn parse_radix_literal(s: &str) -> Option<f64> {
    let radix = match s.get(..2)? {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };
    let digits = s.get(2..)?;
    if digits.is_empty() {
        return None;
    }
    digits.chars().try_fold(0.0_f64, |acc, c| {
        c.to_digit(radix)
            .map(|d| acc * f64::from(radix) + f64::from(d))
    })
}

/// Unsigned decimal mantissa with an `e`/`E` exponent, e.g. `1e2` or `5E-3`.
fn parse_exponent_literal(s: &str) -> Option<f64> {
    let (mantissa, exponent) = s.split_once(['e', 'E'])?;
    let exponent = exponent.strip_prefix('-').unwrap_or(exponent);
    if !is_digits(mantissa) || !is_digits(exponent) {
        return None;
    }
    s.parse().ok()
}

fn trim_leading_zeros(digits: &str) -> &str {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0"
    } else {
        trimmed
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_identifier_list(s: &str) -> bool {
    s.split('.').all(|group| {
        !group.is_empty()
            && group
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}
