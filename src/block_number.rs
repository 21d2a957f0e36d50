//! Arbitrary-precision block numbers carried as decimal strings.
//!
//! Chain heights cross the API boundary as strings and may exceed any native
//! integer width, so ordering and the little arithmetic the viewer needs
//! (successor, predecessor, differences) work digit by digit and never go
//! through a fixed-width parse.

use crate::error::{ExplorerError, ExplorerResult};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

fn validate(s: &str) -> ExplorerResult<()> {
    if s.is_empty() {
        return Err(ExplorerError::invalid_format("block number is empty"));
    }
    if let Some(c) = s.chars().find(|c| !c.is_ascii_digit()) {
        return Err(ExplorerError::invalid_format(format!(
            "block number '{s}' contains non-digit character '{c}'"
        )));
    }
    Ok(())
}

/// Order two unsigned decimal strings.
///
/// The shorter string is left-padded with `'0'` up to the longer one's length
/// and the two are then compared byte by byte; for equal-length zero-padded
/// digit strings lexicographic order is numeric order.
pub fn compare(a: &str, b: &str) -> ExplorerResult<Ordering> {
    validate(a)?;
    validate(b)?;
    Ok(compare_digits(a, b))
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    let width = a.len().max(b.len());
    let padded = |s: &str| {
        std::iter::repeat(b'0')
            .take(width - s.len())
            .chain(s.bytes())
            .collect::<Vec<u8>>()
    };
    padded(a).cmp(&padded(b))
}

fn strip_leading_zeros(s: &str) -> &str {
    let trimmed = s.trim_start_matches('0');
    if trimmed.is_empty() {
        "0"
    } else {
        trimmed
    }
}

/// A validated, canonical (no leading zeros) block number.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockNumber(String);

impl BlockNumber {
    pub fn parse(s: &str) -> ExplorerResult<Self> {
        validate(s)?;
        Ok(BlockNumber(strip_leading_zeros(s).to_string()))
    }

    pub fn zero() -> Self {
        BlockNumber("0".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == "0"
    }

    /// `self + 1`.
    pub fn successor(&self) -> Self {
        let mut digits = self.0.clone().into_bytes();
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, b'1');
                break;
            }
            i -= 1;
            if digits[i] == b'9' {
                digits[i] = b'0';
            } else {
                digits[i] += 1;
                break;
            }
        }
        BlockNumber(String::from_utf8(digits).unwrap_or_default())
    }

    /// `self - 1`, or `None` at zero.
    pub fn predecessor(&self) -> Option<Self> {
        if self.is_zero() {
            return None;
        }
        let mut digits = self.0.clone().into_bytes();
        for d in digits.iter_mut().rev() {
            if *d == b'0' {
                *d = b'9';
            } else {
                *d -= 1;
                break;
            }
        }
        let s = String::from_utf8(digits).unwrap_or_default();
        Some(BlockNumber(strip_leading_zeros(&s).to_string()))
    }

    /// `self - other`, or `None` when `other > self`.
    pub fn checked_sub(&self, other: &BlockNumber) -> Option<BlockNumber> {
        if self < other {
            return None;
        }
        let a = self.0.as_bytes();
        let b = other.0.as_bytes();
        let mut out = vec![b'0'; a.len()];
        let mut borrow = 0u8;
        for i in 0..a.len() {
            let ai = a.len() - 1 - i;
            let da = a[ai] - b'0';
            let db = if i < b.len() { b[b.len() - 1 - i] - b'0' } else { 0 };
            let sub = db + borrow;
            if da >= sub {
                out[ai] = b'0' + (da - sub);
                borrow = 0;
            } else {
                out[ai] = b'0' + (da + 10 - sub);
                borrow = 1;
            }
        }
        let s = String::from_utf8(out).unwrap_or_default();
        Some(BlockNumber(strip_leading_zeros(&s).to_string()))
    }

    /// Native view of the number for delta arithmetic, saturating at `u64::MAX`.
    pub fn to_u64_saturating(&self) -> u64 {
        self.0.parse::<u64>().unwrap_or(u64::MAX)
    }
}

impl Ord for BlockNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_digits(&self.0, &other.0)
    }
}

impl PartialOrd for BlockNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for BlockNumber {
    type Err = ExplorerError;
    fn from_str(s: &str) -> ExplorerResult<Self> {
        BlockNumber::parse(s)
    }
}

impl From<u64> for BlockNumber {
    fn from(n: u64) -> Self {
        BlockNumber(n.to_string())
    }
}

impl AsRef<str> for BlockNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for BlockNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

// The backend emits numbers as strings, but some rows come through as JSON
// integers; accept both and never round-trip through f64.
impl<'de> Deserialize<'de> for BlockNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl<'de> de::Visitor<'de> for Visitor {
            type Value = BlockNumber;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal block number as a string or non-negative integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<BlockNumber, E> {
                BlockNumber::parse(v).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<BlockNumber, E> {
                Ok(BlockNumber::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<BlockNumber, E> {
                u64::try_from(v)
                    .map(BlockNumber::from)
                    .map_err(|_| E::custom(format!("negative block number {v}")))
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}
