//! The batch pass: load, fit, scale, export.
//!
//! One synchronous pass per invocation. Every fatal condition propagates
//! to the caller; the binary reports it and exits non-zero.

use std::collections::{BTreeMap, BTreeSet};

use hm_store::HistStore;
use serde::Serialize;

use crate::config::{split_use_and_ban, ChannelFilter, RunConfig};
use crate::error::{Error, Result};
use crate::export::{export, ExportOptions};
use crate::fraction::{FractionFitter, LeastSquaresFitter};
use crate::loader::{Plots, TemplateLoader};
use crate::registry::{ChannelType, TypeRegistry};
use crate::scale::{self, ScaleMap};
use crate::systematics::{side_templates, Direction, SystematicSpec, SystematicsLoader};

/// Channels the fraction fit floats against data.
const FIT_BACKGROUNDS: &[&str] = &["mc", "qcd"];

/// Outcome of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Number of plots loaded.
    pub plots: usize,
    /// Fractions applied, per channel tag (fitted or fixed).
    pub fractions: BTreeMap<String, f64>,
    /// Number of templates written to the output store.
    pub templates_written: usize,
}

/// Execute one load-merge-fit-scale-export pass.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    config.validate()?;

    let registry = TypeRegistry::new();
    let filter = ChannelFilter::from_spec(&registry, config.channels.as_deref())?;
    if filter.effective(&registry).is_empty() {
        return Err(Error::Config("all channels are turned off".into()));
    }

    let store = HistStore::open(&config.input)?;
    let plot_paths = config.plot_paths();
    let spec = config.systematic.as_deref().map(SystematicSpec::parse).transpose()?;

    let required = fit_requirements(&registry, &filter, config)?;
    let loader =
        TemplateLoader::new(&registry, filter.clone()).require_channels(required);
    let mut plots = loader.load(&store, &plot_paths)?;
    tracing::info!(plots = plots.len(), "templates loaded");

    let fractions = resolve_fractions(&registry, config, &plots)?;
    let extra_scales = match &config.scales {
        Some(path) => scale::load_scale_file(&registry, path)?,
        None => ScaleMap::new(),
    };
    for channels in plots.values_mut() {
        scale::apply(channels, &fractions, &extra_scales);
    }

    let (save_channels, banned) = save_channel_set(&registry, config)?;
    let mut out = HistStore::open_update(&config.output)?;

    let written = match &spec {
        None => {
            let options = ExportOptions {
                channels: save_channels,
                banned,
                ..ExportOptions::all(config.theta_prefix.clone())
            };
            export(&mut out, &plots, &options)?
        }
        Some(spec) => {
            let syst_loader = SystematicsLoader::new(
                &registry,
                spec.clone(),
                filter.effective(&registry),
            )?;
            let variants = syst_loader.load(&store, &plot_paths)?;

            let mut written = 0;
            for direction in [Direction::Plus, Direction::Minus] {
                if !spec.wants(direction) {
                    continue;
                }
                let side = side_templates(&variants, direction);
                let options = ExportOptions {
                    systematic: Some((spec.name.clone(), direction)),
                    channels: save_channels.clone(),
                    banned: banned.clone(),
                    ..ExportOptions::all(config.theta_prefix.clone())
                };
                written += export(&mut out, &side, &options)?;
            }
            written
        }
    };

    out.save()?;

    Ok(RunSummary {
        plots: plots.len(),
        fractions: fractions.iter().map(|(c, f)| (c.tag().to_string(), *f)).collect(),
        templates_written: written,
    })
}

/// Channels the pass cannot do without. The dynamic fit needs observed
/// data and the combined background on the fit plot.
fn fit_requirements(
    registry: &TypeRegistry,
    filter: &ChannelFilter,
    config: &RunConfig,
) -> Result<Vec<ChannelType>> {
    if !config.use_fitter {
        return Ok(Vec::new());
    }

    let data = registry.channel("data")?;
    let mc = registry.channel("mc")?;
    if !filter.allows(data) || !filter.allows(mc) {
        return Err(Error::Config(
            "the fraction fit requires the 'data' and 'mc' channels".into(),
        ));
    }
    Ok(vec![data, mc])
}

/// Fitted or fixed per-channel fractions for this pass.
///
/// The fixed-fraction file is an explicit caller-chosen fallback; fit
/// non-convergence is never silently defaulted.
fn resolve_fractions(
    registry: &TypeRegistry,
    config: &RunConfig,
    plots: &Plots,
) -> Result<ScaleMap> {
    if let Some(path) = &config.fractions {
        let fractions = scale::load_scale_file(registry, path)?;
        tracing::info!(channels = fractions.len(), "using fixed fractions");
        return Ok(expand_mc_fraction(registry, fractions));
    }
    if !config.use_fitter {
        return Ok(ScaleMap::new());
    }

    let channels = plots
        .get(&config.fit_plot)
        .ok_or_else(|| Error::PlotNotFound(config.fit_plot.clone()))?;

    let data = channels
        .get(&registry.channel("data")?)
        .ok_or_else(|| Error::ChannelNotLoaded("data".into()))?;

    // Zero-integral backgrounds cannot constrain the fit; skip them and
    // keep going with the rest.
    let mut fit_channels = Vec::new();
    for tag in FIT_BACKGROUNDS {
        let channel = registry.channel(tag)?;
        let Some(template) = channels.get(&channel) else {
            continue;
        };
        if template.hist.integral().0 == 0.0 {
            tracing::warn!(channel = tag, "zero-integral background, dropped from fit");
            continue;
        }
        fit_channels.push((channel, template));
    }

    let backgrounds: Vec<&hm_core::Histogram> =
        fit_channels.iter().map(|(_, t)| &t.hist).collect();
    let fitted = LeastSquaresFitter::default().fit(&data.hist, &backgrounds)?;

    let mut fractions = ScaleMap::new();
    for ((channel, _), fraction) in fit_channels.iter().zip(fitted) {
        tracing::info!(channel = channel.tag(), fraction, "fitted fraction");
        fractions.insert(*channel, fraction);
    }
    Ok(expand_mc_fraction(registry, fractions))
}

/// Propagate the combined-background fraction to its constituents so the
/// stacked channels stay consistent with the fold.
fn expand_mc_fraction(registry: &TypeRegistry, mut fractions: ScaleMap) -> ScaleMap {
    let Ok(mc) = registry.channel("mc") else {
        return fractions;
    };
    let Some(fraction) = fractions.get(&mc).copied() else {
        return fractions;
    };
    for channel in registry.mc_channels() {
        fractions.entry(channel).or_insert(fraction);
    }
    fractions
}

/// Resolve the export allow/ban lists from the `save_channels` spec.
///
/// Explicitly listed channels are validated strictly at export time;
/// a ban-only spec just filters the loaded set.
#[allow(clippy::type_complexity)]
fn save_channel_set(
    registry: &TypeRegistry,
    config: &RunConfig,
) -> Result<(Option<BTreeSet<ChannelType>>, BTreeSet<ChannelType>)> {
    let Some(spec) = &config.save_channels else {
        return Ok((None, BTreeSet::new()));
    };

    let (use_tags, ban_tags) = split_use_and_ban(spec.split(','));
    let mut allowed: Option<BTreeSet<ChannelType>> = if use_tags.is_empty() {
        None
    } else {
        Some(use_tags.iter().map(|t| registry.channel(t)).collect::<Result<_>>()?)
    };
    let banned: BTreeSet<ChannelType> =
        ban_tags.iter().map(|t| registry.channel(t)).collect::<Result<_>>()?;

    if let Some(set) = &mut allowed {
        set.retain(|c| !banned.contains(c));
        if set.is_empty() {
            return Err(Error::Config("empty export channel set".into()));
        }
    }
    Ok((allowed, banned))
}
