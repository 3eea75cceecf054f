pub mod alert;
pub mod batch;
pub mod risk;
pub mod transaction;
pub mod wallet;

pub use alert::AlertEnvelope;
pub use batch::{BatchItem, BatchOutcome, BatchSummary};
pub use risk::{Category, Flag, RiskBucket, RiskSignal, ScoredResult};
pub use transaction::{RawTransaction, Transaction};
pub use wallet::{ProfileSnapshot, WalletProfile};

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            other => Err(anyhow::anyhow!("unknown direction: {other}")),
        }
    }
}
