//! # hm-templates
//!
//! Template aggregation and systematics-propagation engine: routes raw
//! input distributions into analysis channels via typed merge rules,
//! accumulates them into one template per channel per plot, corrects
//! normalizations with a fraction fit (or explicit fixed fractions) and
//! external scale factors, books nominal/plus/minus systematic variants,
//! and exports merged templates under the theta naming convention.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod export;
pub mod fraction;
pub mod loader;
pub mod metadata;
pub mod pipeline;
pub mod registry;
pub mod scale;
pub mod systematics;
pub mod yields;


pub use config::{ChannelFilter, RunConfig};
pub use error::{Error, Result};
pub use export::{export, theta_channel_name, ExportOptions};
pub use fraction::{FractionFitter, LeastSquaresFitter};
pub use loader::{ChannelMap, Plots, Template, TemplateLoader};
pub use metadata::{lookup_metadata, PlotMeta};
pub use pipeline::{run, RunSummary};
pub use registry::{ChannelType, InputType, TypeRegistry};
pub use scale::ScaleMap;
pub use systematics::{
    scale_report, side_templates, Direction, ScaleRatio, SystematicKind, SystematicSpec,
    SystematicVariant, SystematicsLoader,
};
pub use yields::{yields_artifact, YieldsArtifact};
