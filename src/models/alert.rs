use super::ScoredResult;

/// A scored result that crossed the alert threshold, ready for fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEnvelope {
    pub item: ScoredResult,
}

impl AlertEnvelope {
    pub fn tx(item: ScoredResult) -> Self {
        Self { item }
    }

    pub fn tx_id(&self) -> &str {
        &self.item.tx.tx_id
    }

    pub fn touches(&self, address: &str) -> bool {
        self.item.tx.touches(address)
    }
}
