// Principal component analysis with explained-variance accounting

#![doc = include_str!("../README.md")]

pub mod analysis;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod labels;
pub mod linalg_backends;
pub mod pca;
pub mod report;
pub mod standardize;
pub mod threshold;
pub mod variance;


pub use analysis::{analyze, PcaAnalysis, PcaPipeline};
pub use config::{DecompositionMethod, PcaConfig, DEFAULT_VARIANCE_TARGETS};
pub use error::{PcaError, Result};
pub use labels::{identify_label_column, TextColumn};
pub use pca::{max_components, PcaEngine, PcaFit, PrincipalComponents};
pub use report::{write_projected_delimited, VarianceReport};
pub use standardize::{standardize, FeatureScaling, StandardizedFeatures};
pub use threshold::{components_for_variance, variance_thresholds, VarianceThreshold};
pub use variance::{explained_variance, total_variance, DatasetCondition, VarianceProfile};
