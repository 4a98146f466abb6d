//! Per-channel yield tables (numbers-first artifact).

use serde::Serialize;

use crate::export::theta_channel_name;
use crate::loader::Plots;

/// Yield table over all loaded plots.
#[derive(Debug, Clone, Serialize)]
pub struct YieldsArtifact {
    /// Artifact schema version.
    pub schema_version: String,
    /// One table per plot.
    pub plots: Vec<PlotYields>,
}

/// Yields of one plot.
#[derive(Debug, Clone, Serialize)]
pub struct PlotYields {
    /// Fully-qualified plot path.
    pub plot: String,
    /// Per-channel yields, in channel tag order.
    pub channels: Vec<ChannelYield>,
}

/// Integral of one channel template.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelYield {
    /// Channel tag.
    pub channel: String,
    /// Exported name, when the channel has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_name: Option<String>,
    /// Summed content.
    pub value: f64,
    /// Quadrature-summed statistical error.
    pub error: f64,
}

/// Build the yield table for a loaded mapping.
pub fn yields_artifact(plots: &Plots) -> YieldsArtifact {
    let mut out = Vec::with_capacity(plots.len());

    for (plot, channels) in plots {
        let mut rows = Vec::with_capacity(channels.len());
        for (channel, template) in channels {
            let (value, error) = template.hist.integral();
            rows.push(ChannelYield {
                channel: channel.tag().to_string(),
                export_name: theta_channel_name(*channel).map(String::from),
                value,
                error,
            });
        }
        out.push(PlotYields { plot: plot.clone(), channels: rows });
    }

    YieldsArtifact { schema_version: "1".to_string(), plots: out }
}
