//! Application of fitted fractions and external scale factors.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::loader::ChannelMap;
use crate::registry::{ChannelType, TypeRegistry};

/// Per-channel scale factors.
pub type ScaleMap = BTreeMap<ChannelType, f64>;

/// Rescale channel templates in place by the product of their fitted (or
/// fixed) fraction and external scale factor; an absent factor defaults
/// to 1.
///
/// This is the single mutation point after loading: it runs strictly
/// after the loader and strictly before any consumer reads the mapping,
/// and it never touches systematic variants. A background with zero total
/// integral is skipped with a diagnostic; scaling it would be a no-op and
/// its absence must not abort the pass.
pub fn apply(channels: &mut ChannelMap, fractions: &ScaleMap, extra_scales: &ScaleMap) {
    for (channel, template) in channels.iter_mut() {
        let fraction = fractions.get(channel).copied();
        let extra = extra_scales.get(channel).copied();
        if fraction.is_none() && extra.is_none() {
            continue;
        }

        let (total, _) = template.hist.integral();
        if total == 0.0 {
            tracing::warn!(
                channel = channel.tag(),
                plot = template.plot,
                "zero-integral channel, scale not applied"
            );
            continue;
        }

        let factor = fraction.unwrap_or(1.0) * extra.unwrap_or(1.0);
        template.hist.scale(factor);
    }
}

/// Read a per-channel factor file (JSON `{channel: factor}`), validating
/// every tag against the registry.
pub fn load_scale_file(registry: &TypeRegistry, path: &Path) -> Result<ScaleMap> {
    let text = std::fs::read_to_string(path)?;
    let raw: BTreeMap<String, f64> = serde_json::from_str(&text)?;

    let mut scales = ScaleMap::new();
    for (tag, factor) in raw {
        scales.insert(registry.channel(&tag)?, factor);
    }
    Ok(scales)
}
