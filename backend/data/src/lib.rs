//! `chartforge-data`: supplies the dataset for a chart plan.

pub mod labels;
pub mod preparer;
pub mod synthetic;
pub mod transform;

pub use labels::LabelEnhancer;
pub use preparer::{DataPreparer, PreparerConfig};
pub use synthetic::{synthesize, Generator, LabelDomain, Synthesized};
