pub mod categorizer;
pub mod explain;
pub mod features;
pub mod scorer;

pub use categorizer::{Categorizer, CategoryMatcher};
pub use explain::{ExplainabilityRecorder, ExplanationTrail};
pub use features::{Feature, FeatureExtractor, FeatureSet};
pub use scorer::{triggered_flags, RiskScorer};
