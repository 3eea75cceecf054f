pub mod batch;
pub mod pipeline;

pub use batch::BatchCoordinator;
pub use pipeline::RiskEngine;
