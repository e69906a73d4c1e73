pub mod analysis;
pub mod combo;
pub mod listing;
pub mod priority;
pub mod strength;
pub mod token;

mod error;

pub use analysis::{Analysis, AnalysisSummary, Metadata, analyze, validate_metadata};
pub use combo::{Combo, ComboSource, Generated, GenerationLimits};
pub use error::{Error, Result};
pub use listing::{Platform, RankingKey};
pub use priority::{ComboAnalysis, Ranked, SignalScores};
pub use strength::{Classification, ProvenanceIndex, StrengthTier};
pub use token::{Field, FieldTokens, KeywordToken};
