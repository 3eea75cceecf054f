use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Transaction;

// ---------------------------------------------------------------------------
// Flag
// ---------------------------------------------------------------------------

/// Closed set of risk signals. Rendered as snake_case strings only at the
/// serialization edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    HighAmount,
    NewAddress,
    OffHours,
    SuspiciousPattern,
    FeeAnomaly,
    /// Diagnostic: the wallet profile could not be read, fallback was used.
    ProfileUnavailable,
}

impl Flag {
    /// Signals computed by the feature extractor, in evaluation order.
    pub const EVALUATED: [Flag; 5] = [
        Flag::HighAmount,
        Flag::NewAddress,
        Flag::OffHours,
        Flag::SuspiciousPattern,
        Flag::FeeAnomaly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::HighAmount => "high_amount",
            Flag::NewAddress => "new_address",
            Flag::OffHours => "off_hours",
            Flag::SuspiciousPattern => "suspicious_pattern",
            Flag::FeeAnomaly => "fee_anomaly",
            Flag::ProfileUnavailable => "profile_unavailable",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high_amount" => Ok(Flag::HighAmount),
            "new_address" => Ok(Flag::NewAddress),
            "off_hours" => Ok(Flag::OffHours),
            "suspicious_pattern" => Ok(Flag::SuspiciousPattern),
            "fee_anomaly" => Ok(Flag::FeeAnomaly),
            "profile_unavailable" => Ok(Flag::ProfileUnavailable),
            other => Err(anyhow::anyhow!("unknown flag: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// RiskSignal
// ---------------------------------------------------------------------------

/// One evaluated signal. The ordered list of these is the explanation trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub name: Flag,
    #[serde(with = "rust_decimal::serde::float")]
    pub weight: Decimal,
    pub triggered: bool,
    pub detail: String,
}

// ---------------------------------------------------------------------------
// RiskBucket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBucket {
    Low,
    Medium,
    High,
}

impl RiskBucket {
    pub const MEDIUM_FLOOR: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
    pub const HIGH_FLOOR: Decimal = Decimal::from_parts(75, 0, 0, false, 2);

    /// Lower bound of each bucket is inclusive: 0.75 is high, 0.5 is medium.
    pub fn from_score(score: Decimal) -> Self {
        if score >= Self::HIGH_FLOOR {
            RiskBucket::High
        } else if score >= Self::MEDIUM_FLOOR {
            RiskBucket::Medium
        } else {
            RiskBucket::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBucket::Low => "low",
            RiskBucket::Medium => "medium",
            RiskBucket::High => "high",
        }
    }
}

impl fmt::Display for RiskBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Transfer,
    Exchange,
    Defi,
    Mixing,
    Gambling,
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Transfer => "transfer",
            Category::Exchange => "exchange",
            Category::Defi => "defi",
            Category::Mixing => "mixing",
            Category::Gambling => "gambling",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transfer" => Ok(Category::Transfer),
            "exchange" => Ok(Category::Exchange),
            "defi" => Ok(Category::Defi),
            "mixing" => Ok(Category::Mixing),
            "gambling" => Ok(Category::Gambling),
            "unknown" => Ok(Category::Unknown),
            other => Err(anyhow::anyhow!("unknown category: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// ScoredResult
// ---------------------------------------------------------------------------

/// Pipeline output: the transaction plus its score, flags and category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    #[serde(flatten)]
    pub tx: Transaction,
    #[serde(with = "rust_decimal::serde::float")]
    pub score: Decimal,
    /// Triggered signal names, in evaluation order.
    pub flags: Vec<Flag>,
    pub category: Category,
    pub risk_bucket: RiskBucket,
}

impl ScoredResult {
    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }
}
