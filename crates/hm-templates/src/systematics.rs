//! Systematic variant loading: nominal/plus/minus template triples.

use std::collections::BTreeMap;

use hm_store::HistStore;
use serde::Serialize;

use crate::config::ChannelFilter;
use crate::error::{Error, Result};
use crate::loader::{annotate, ChannelMap, Template, TemplateLoader};
use crate::registry::{ChannelType, TypeRegistry};

/// One-sided shift direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Upward shift.
    Plus,
    /// Downward shift.
    Minus,
}

impl Direction {
    /// Suffix used in store paths and export names.
    pub fn suffix(&self) -> &'static str {
        match self {
            Direction::Plus => "plus",
            Direction::Minus => "minus",
        }
    }
}

/// How variants of a systematic source are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystematicKind {
    /// Three independently-stored distributions per channel.
    Simple,
    /// Plus/minus substitute alternate samples for specific channels;
    /// everything else reuses the nominal.
    Derived,
}

/// Systematic sources with independently-stored variants.
const SIMPLE_SYSTEMATICS: &[&str] = &["jes", "jer", "pileup", "btag", "mistag"];

/// Systematic sources realized by alternate samples.
const DERIVED_SYSTEMATICS: &[&str] = &["scale", "matching"];

/// A parsed systematic request: `name` optionally suffixed with `+`/`-`.
#[derive(Debug, Clone)]
pub struct SystematicSpec {
    /// Systematic source name (e.g. "jes").
    pub name: String,
    /// Only load this direction; `None` loads both.
    pub direction: Option<Direction>,
}

impl SystematicSpec {
    /// Parse a spec string like `"jes"`, `"jes+"` or `"pileup-"`.
    ///
    /// Fails with [`Error::UnsupportedSystematic`] for an unrecognized
    /// source name.
    pub fn parse(spec: &str) -> Result<Self> {
        let (name, direction) = match spec.as_bytes().last() {
            Some(b'+') => (&spec[..spec.len() - 1], Some(Direction::Plus)),
            Some(b'-') => (&spec[..spec.len() - 1], Some(Direction::Minus)),
            _ => (spec, None),
        };

        kind_of(name)?;
        Ok(Self { name: name.to_string(), direction })
    }

    /// The loading strategy for this source.
    pub fn kind(&self) -> SystematicKind {
        // The name was validated at parse time.
        kind_of(&self.name).unwrap_or(SystematicKind::Simple)
    }

    /// Whether this spec requests `direction` to be loaded.
    pub fn wants(&self, direction: Direction) -> bool {
        self.direction.is_none() || self.direction == Some(direction)
    }
}

/// Classify a systematic source name.
pub fn kind_of(name: &str) -> Result<SystematicKind> {
    if SIMPLE_SYSTEMATICS.contains(&name) {
        Ok(SystematicKind::Simple)
    } else if DERIVED_SYSTEMATICS.contains(&name) {
        Ok(SystematicKind::Derived)
    } else {
        Err(Error::UnsupportedSystematic(name.to_string()))
    }
}

/// Nominal/plus/minus templates for one channel and one plot.
///
/// `plus`/`minus` may be absent (one-sided or filtered loads); `nominal`
/// must be present before the triple is used for yield computation.
#[derive(Debug, Clone, Default)]
pub struct SystematicVariant {
    /// Unshifted template.
    pub nominal: Option<Template>,
    /// Upward-shifted template.
    pub plus: Option<Template>,
    /// Downward-shifted template.
    pub minus: Option<Template>,
}

/// `plot -> channel -> variant triple`.
pub type SystPlots = BTreeMap<String, BTreeMap<ChannelType, SystematicVariant>>;

/// Loads variant triples for one systematic source.
pub struct SystematicsLoader<'a> {
    registry: &'a TypeRegistry,
    spec: SystematicSpec,
    channels: Vec<ChannelType>,
}

impl<'a> SystematicsLoader<'a> {
    /// Create a loader for `spec` restricted to `channels`.
    pub fn new(
        registry: &'a TypeRegistry,
        spec: SystematicSpec,
        channels: Vec<ChannelType>,
    ) -> Result<Self> {
        if channels.is_empty() {
            return Err(Error::Config("all channels are turned off".into()));
        }
        Ok(Self { registry, spec, channels })
    }

    /// Load nominal templates and the requested variant sides for every
    /// plot.
    pub fn load(&self, store: &HistStore, plots: &[String]) -> Result<SystPlots> {
        let filter = ChannelFilter::allow_only(self.channels.iter().copied());
        let nominal_loader = TemplateLoader::new(self.registry, filter).build_mc(false);
        let nominals = nominal_loader.load(store, plots)?;

        let mut out = SystPlots::new();
        for (plot, channels) in nominals {
            let mut variants: BTreeMap<ChannelType, SystematicVariant> = BTreeMap::new();
            for (channel, template) in channels {
                variants.insert(
                    channel,
                    SystematicVariant { nominal: Some(template), ..Default::default() },
                );
            }

            for direction in [Direction::Plus, Direction::Minus] {
                if !self.spec.wants(direction) {
                    continue;
                }
                match self.spec.kind() {
                    SystematicKind::Simple => {
                        self.load_simple(store, &plot, direction, &mut variants)?
                    }
                    SystematicKind::Derived => {
                        self.load_derived(store, &plot, direction, &mut variants)?
                    }
                }
            }

            out.insert(plot, variants);
        }

        Ok(out)
    }

    /// Accumulate independently-stored variant distributions, routed to
    /// channels exactly like the nominal pass.
    fn load_simple(
        &self,
        store: &HistStore,
        plot: &str,
        direction: Direction,
        variants: &mut BTreeMap<ChannelType, SystematicVariant>,
    ) -> Result<()> {
        let marker = format!("__{}__{}", self.spec.name, direction.suffix());

        let mut shifted = ChannelMap::new();
        for source in store.sources_for(plot) {
            let Some(base) = source.strip_suffix(&marker) else {
                continue;
            };
            let Ok(input) = self.registry.input(base) else {
                tracing::debug!(source, plot, "skipping unregistered variant source");
                continue;
            };

            let channel = self.registry.channel_for_input(input)?;
            if !self.channels.contains(&channel) {
                continue;
            }

            let hist = store.get(&format!("/{}{}", source, plot))?;
            match shifted.get_mut(&channel) {
                None => {
                    shifted.insert(
                        channel,
                        Template { plot: plot.to_string(), channel, hist },
                    );
                }
                Some(template) => template.hist.add(&hist)?,
            }
        }

        for (channel, mut template) in shifted {
            annotate(&mut template)?;
            let slot = variants.entry(channel).or_default();
            match direction {
                Direction::Plus => slot.plus = Some(template),
                Direction::Minus => slot.minus = Some(template),
            }
        }

        Ok(())
    }

    /// Substitute alternate samples (`<channel>_<name>_<dir>`) for the
    /// channels that have them; all other channels reuse the nominal.
    fn load_derived(
        &self,
        store: &HistStore,
        plot: &str,
        direction: Direction,
        variants: &mut BTreeMap<ChannelType, SystematicVariant>,
    ) -> Result<()> {
        for channel in &self.channels {
            let alternate_tag =
                format!("{}_{}_{}", channel.tag(), self.spec.name, direction.suffix());

            let template = if self.registry.input(&alternate_tag).is_ok()
                && store.contains(&format!("/{}{}", alternate_tag, plot))
            {
                let hist = store.get(&format!("/{}{}", alternate_tag, plot))?;
                let mut template =
                    Template { plot: plot.to_string(), channel: *channel, hist };
                annotate(&mut template)?;
                Some(template)
            } else {
                variants.get(channel).and_then(|v| v.nominal.clone())
            };

            if let Some(template) = template {
                let slot = variants.entry(*channel).or_default();
                match direction {
                    Direction::Plus => slot.plus = Some(template),
                    Direction::Minus => slot.minus = Some(template),
                }
            }
        }

        Ok(())
    }
}

/// Extract one variant side as a plain `plot -> channel -> Template`
/// mapping, e.g. for export. Channels without that side are left out.
pub fn side_templates(plots: &SystPlots, direction: Direction) -> crate::loader::Plots {
    let mut out = crate::loader::Plots::new();
    for (plot, channels) in plots {
        let mut side = ChannelMap::new();
        for (channel, variant) in channels {
            let template = match direction {
                Direction::Plus => &variant.plus,
                Direction::Minus => &variant.minus,
            };
            if let Some(template) = template {
                side.insert(*channel, template.clone());
            }
        }
        out.insert(plot.clone(), side);
    }
    out
}

/// Yield ratio of each variant side to the nominal, for one channel.
#[derive(Debug, Clone, Serialize)]
pub struct ScaleRatio {
    /// Channel tag.
    pub channel: String,
    /// `integral(plus) / integral(nominal)`, when plus is loaded.
    pub plus: Option<f64>,
    /// `integral(minus) / integral(nominal)`, when minus is loaded.
    pub minus: Option<f64>,
}

/// Per-channel variant yield ratios for one plot.
///
/// Fails with [`Error::PlotNotFound`] if `plot` was not loaded and with
/// [`Error::ChannelNotLoaded`] for a triple without a nominal.
pub fn scale_report(plots: &SystPlots, plot: &str) -> Result<Vec<ScaleRatio>> {
    let channels = plots.get(plot).ok_or_else(|| Error::PlotNotFound(plot.to_string()))?;

    let mut report = Vec::with_capacity(channels.len());
    for (channel, variant) in channels {
        let nominal = variant
            .nominal
            .as_ref()
            .ok_or_else(|| Error::ChannelNotLoaded(channel.tag().to_string()))?;
        let (nominal_yield, _) = nominal.hist.integral();

        let ratio = |side: &Option<Template>| {
            side.as_ref().map(|t| t.hist.integral().0 / nominal_yield)
        };

        report.push(ScaleRatio {
            channel: channel.tag().to_string(),
            plus: ratio(&variant.plus),
            minus: ratio(&variant.minus),
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hm_core::Histogram;

    fn put(store: &mut HistStore, path: &str, content: Vec<f64>) {
        let n = content.len();
        let hist = Histogram::new(
            "in",
            (0..=n).map(|i| i as f64).collect(),
            content,
            vec![0.0; n],
        )
        .expect("histogram");
        store.put(path, &hist);
    }

    fn empty_store() -> HistStore {
        let dir = tempfile::tempdir().expect("tempdir");
        HistStore::open_update(dir.path().join("store.json")).expect("open_update")
    }

    #[test]
    fn spec_parsing_extracts_direction() {
        let plus = SystematicSpec::parse("jes+").expect("jes+");
        assert_eq!(plus.name, "jes");
        assert_eq!(plus.direction, Some(Direction::Plus));

        let both = SystematicSpec::parse("pileup").expect("pileup");
        assert!(both.direction.is_none());

        assert!(matches!(
            SystematicSpec::parse("nonsense+"),
            Err(Error::UnsupportedSystematic(_))
        ));
    }

    #[test]
    fn simple_variants_load_both_sides() {
        let registry = TypeRegistry::new();
        let mut store = empty_store();
        put(&mut store, "/ttbar/chi2_raw", vec![10.0, 10.0]);
        put(&mut store, "/ttbar__jes__plus/chi2_raw", vec![12.0, 12.0]);
        put(&mut store, "/ttbar__jes__minus/chi2_raw", vec![8.0, 8.0]);

        let ttbar = registry.channel("ttbar").expect("ttbar");
        let loader = SystematicsLoader::new(
            &registry,
            SystematicSpec::parse("jes").expect("spec"),
            vec![ttbar],
        )
        .expect("loader");

        let plots = loader.load(&store, &["/chi2_raw".to_string()]).expect("load");
        let variant = &plots["/chi2_raw"][&ttbar];

        assert_eq!(variant.nominal.as_ref().expect("nominal").hist.content, vec![10.0, 10.0]);
        assert_eq!(variant.plus.as_ref().expect("plus").hist.content, vec![12.0, 12.0]);
        assert_eq!(variant.minus.as_ref().expect("minus").hist.content, vec![8.0, 8.0]);
    }

    #[test]
    fn direction_filter_leaves_other_side_null() {
        let registry = TypeRegistry::new();
        let mut store = empty_store();
        put(&mut store, "/ttbar/chi2_raw", vec![10.0]);
        put(&mut store, "/ttbar__jes__plus/chi2_raw", vec![12.0]);
        put(&mut store, "/ttbar__jes__minus/chi2_raw", vec![8.0]);

        let ttbar = registry.channel("ttbar").expect("ttbar");
        let loader = SystematicsLoader::new(
            &registry,
            SystematicSpec::parse("jes+").expect("spec"),
            vec![ttbar],
        )
        .expect("loader");

        let plots = loader.load(&store, &["/chi2_raw".to_string()]).expect("load");
        let variant = &plots["/chi2_raw"][&ttbar];

        assert!(variant.plus.is_some());
        assert!(variant.minus.is_none());
    }

    #[test]
    fn derived_variants_substitute_alternate_samples() {
        let registry = TypeRegistry::new();
        let mut store = empty_store();
        put(&mut store, "/ttbar/chi2_raw", vec![10.0]);
        put(&mut store, "/zjets/chi2_raw", vec![5.0]);
        put(&mut store, "/ttbar_matching_plus/chi2_raw", vec![11.0]);

        let ttbar = registry.channel("ttbar").expect("ttbar");
        let zjets = registry.channel("zjets").expect("zjets");
        let loader = SystematicsLoader::new(
            &registry,
            SystematicSpec::parse("matching+").expect("spec"),
            vec![ttbar, zjets],
        )
        .expect("loader");

        let plots = loader.load(&store, &["/chi2_raw".to_string()]).expect("load");

        let t = &plots["/chi2_raw"][&ttbar];
        assert_eq!(t.plus.as_ref().expect("plus").hist.content, vec![11.0]);

        // zjets has no alternate sample; its plus side reuses the nominal.
        let z = &plots["/chi2_raw"][&zjets];
        assert_eq!(z.plus.as_ref().expect("plus").hist.content, vec![5.0]);
    }

    #[test]
    fn scale_report_computes_yield_ratios() {
        let registry = TypeRegistry::new();
        let mut store = empty_store();
        put(&mut store, "/ttbar/chi2_raw", vec![10.0, 10.0]);
        put(&mut store, "/ttbar__jes__plus/chi2_raw", vec![11.0, 11.0]);

        let ttbar = registry.channel("ttbar").expect("ttbar");
        let loader = SystematicsLoader::new(
            &registry,
            SystematicSpec::parse("jes+").expect("spec"),
            vec![ttbar],
        )
        .expect("loader");

        let plots = loader.load(&store, &["/chi2_raw".to_string()]).expect("load");
        let report = scale_report(&plots, "/chi2_raw").expect("report");

        assert_eq!(report.len(), 1);
        assert!((report[0].plus.expect("plus") - 1.1).abs() < 1e-12);
        assert!(report[0].minus.is_none());

        assert!(matches!(
            scale_report(&plots, "/absent"),
            Err(Error::PlotNotFound(_))
        ));
    }
}
