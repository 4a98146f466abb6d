//! Template loading: accumulate raw input distributions into one template
//! per channel per plot.

use std::collections::BTreeMap;

use hm_core::Histogram;
use hm_store::HistStore;

use crate::config::ChannelFilter;
use crate::error::{Error, Result};
use crate::metadata::lookup_metadata;
use crate::registry::{ChannelType, TypeRegistry};

/// The accumulated, annotated distribution for one (plot, channel) pair.
#[derive(Debug, Clone)]
pub struct Template {
    /// Fully-qualified plot path.
    pub plot: String,
    /// Owning channel.
    pub channel: ChannelType,
    /// The accumulated distribution.
    pub hist: Histogram,
}

/// Channel map of one plot.
pub type ChannelMap = BTreeMap<ChannelType, Template>;

/// `plot -> channel -> Template`, the engine's central data model.
pub type Plots = BTreeMap<String, ChannelMap>;

/// Accumulates raw input distributions into channel templates.
pub struct TemplateLoader<'a> {
    registry: &'a TypeRegistry,
    filter: ChannelFilter,
    required: Vec<ChannelType>,
    build_mc: bool,
}

impl<'a> TemplateLoader<'a> {
    /// Create a loader over `registry` with a channel filter.
    pub fn new(registry: &'a TypeRegistry, filter: ChannelFilter) -> Self {
        Self { registry, filter, required: Vec::new(), build_mc: true }
    }

    /// Channels that must be populated for every plot; missing ones fail
    /// the load with [`Error::ChannelNotLoaded`].
    pub fn require_channels(mut self, channels: Vec<ChannelType>) -> Self {
        self.required = channels;
        self
    }

    /// Whether to derive the combined `mc` channel (default: on).
    pub fn build_mc(mut self, build: bool) -> Self {
        self.build_mc = build;
        self
    }

    /// Load and accumulate all requested plots.
    ///
    /// For each plot, every input present in the store is routed to the
    /// unique channel whose merge rule contains it; the first match is
    /// cloned into the channel's template and every further match is
    /// summed in. Accumulation order is the store's lexicographic
    /// enumeration, so results do not depend on write order. The plot's
    /// static metadata (rebin factor, units, title) is applied exactly
    /// once per template, after accumulation.
    pub fn load(&self, store: &HistStore, plots: &[String]) -> Result<Plots> {
        let mut out = Plots::new();

        for plot in plots {
            let channels = self.load_plot(store, plot)?;
            out.insert(plot.clone(), channels);
        }

        Ok(out)
    }

    fn load_plot(&self, store: &HistStore, plot: &str) -> Result<ChannelMap> {
        let sources = store.sources_for(plot);
        if sources.is_empty() {
            return Err(Error::PlotNotFound(plot.to_string()));
        }

        let mut channels = ChannelMap::new();
        let mut n_merged = 0usize;

        for source in &sources {
            // Sources that are not registered inputs (e.g. systematic
            // variant directories like `ttbar__jes__plus`) are not part of
            // the nominal pass.
            let Ok(input) = self.registry.input(source) else {
                tracing::debug!(source, plot, "skipping unregistered source");
                continue;
            };

            let channel = self.registry.channel_for_input(input)?;
            if !self.filter.allows(channel) {
                continue;
            }

            let hist = store.get(&format!("/{}{}", source, plot))?;
            accumulate(&mut channels, plot, channel, &hist)?;
            n_merged += 1;
        }

        for template in channels.values_mut() {
            annotate(template)?;
        }

        if self.build_mc {
            self.fold_mc(plot, &mut channels)?;
        }

        for required in &self.required {
            if !channels.contains_key(required) {
                return Err(Error::ChannelNotLoaded(required.tag().to_string()));
            }
        }

        tracing::debug!(plot, inputs = n_merged, channels = channels.len(), "plot loaded");

        Ok(channels)
    }

    /// Derive the combined `mc` channel as the sum of all loaded
    /// Monte-Carlo background channels.
    fn fold_mc(&self, plot: &str, channels: &mut ChannelMap) -> Result<()> {
        let mc = self.registry.channel("mc")?;
        if !self.filter.allows(mc) {
            return Ok(());
        }

        let mut folded: Option<Histogram> = None;
        for background in self.registry.mc_channels() {
            let Some(template) = channels.get(&background) else {
                continue;
            };
            match &mut folded {
                None => folded = Some(template.hist.clone()),
                Some(sum) => sum.add(&template.hist)?,
            }
        }

        if let Some(hist) = folded {
            channels.insert(mc, Template { plot: plot.to_string(), channel: mc, hist });
        }

        Ok(())
    }
}

fn accumulate(
    channels: &mut ChannelMap,
    plot: &str,
    channel: ChannelType,
    hist: &Histogram,
) -> Result<()> {
    match channels.get_mut(&channel) {
        None => {
            // Clone, never alias: later inputs are summed in place.
            channels.insert(
                channel,
                Template { plot: plot.to_string(), channel, hist: hist.clone() },
            );
        }
        Some(template) => template.hist.add(hist)?,
    }
    Ok(())
}

pub(crate) fn annotate(template: &mut Template) -> Result<()> {
    let meta = lookup_metadata(&template.plot);

    if let Some(ngroup) = meta.rebin {
        template.hist = template.hist.rebin(ngroup)?;
    }
    if let Some(units) = meta.units {
        template.hist.units = units.to_string();
    }
    if let Some(title) = meta.title {
        template.hist.title = title.to_string();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(entries: &[(&str, Vec<f64>, Vec<f64>)]) -> HistStore {
        // The store stays in memory until `save`, which these tests never
        // call, so the file itself is never created.
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = HistStore::open_update(dir.path().join("store.json")).expect("open_update");
        for (path, content, error) in entries {
            let n = content.len();
            let hist = Histogram::new(
                "in",
                (0..=n).map(|i| i as f64).collect(),
                content.clone(),
                error.clone(),
            )
            .expect("input histogram");
            store.put(path.to_string(), &hist);
        }
        store
    }

    #[test]
    fn inputs_routed_to_one_channel_accumulate() {
        let registry = TypeRegistry::new();
        let store = store_with(&[
            ("/stop_s/chi2_raw", vec![1.0, 2.0, 3.0], vec![3.0, 0.0, 1.0]),
            ("/stop_t/chi2_raw", vec![4.0, 5.0, 6.0], vec![4.0, 2.0, 1.0]),
        ]);

        let loader = TemplateLoader::new(&registry, ChannelFilter::default());
        let plots = loader.load(&store, &["/chi2_raw".to_string()]).expect("load");

        let channels = &plots["/chi2_raw"];
        let stop = registry.channel("stop").expect("stop");
        let merged = &channels[&stop].hist;

        assert_eq!(merged.content, vec![5.0, 7.0, 9.0]);
        assert_eq!(merged.error[0], 5.0);
        assert_eq!(merged.error[1], 2.0);
        assert!((merged.error[2] - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn accumulation_does_not_depend_on_write_order() {
        let registry = TypeRegistry::new();
        let forward = store_with(&[
            ("/stop_s/chi2_raw", vec![0.1, 0.2], vec![0.01, 0.02]),
            ("/stop_t/chi2_raw", vec![0.3, 0.4], vec![0.03, 0.04]),
            ("/stop_tw/chi2_raw", vec![0.5, 0.6], vec![0.05, 0.06]),
        ]);
        let reversed = store_with(&[
            ("/stop_tw/chi2_raw", vec![0.5, 0.6], vec![0.05, 0.06]),
            ("/stop_t/chi2_raw", vec![0.3, 0.4], vec![0.03, 0.04]),
            ("/stop_s/chi2_raw", vec![0.1, 0.2], vec![0.01, 0.02]),
        ]);

        let loader = TemplateLoader::new(&registry, ChannelFilter::default());
        let plot = vec!["/chi2_raw".to_string()];
        let a = loader.load(&forward, &plot).expect("load forward");
        let b = loader.load(&reversed, &plot).expect("load reversed");

        let stop = registry.channel("stop").expect("stop");
        let (ha, hb) = (&a["/chi2_raw"][&stop].hist, &b["/chi2_raw"][&stop].hist);

        // Bit-identical, not merely approximately equal.
        assert_eq!(ha.content, hb.content);
        assert_eq!(ha.error, hb.error);
    }

    #[test]
    fn metadata_is_applied_once_after_accumulation() {
        let registry = TypeRegistry::new();
        // /chi2 carries rebin=50 and a title in the metadata table.
        let store = store_with(&[("/ttbar/chi2", vec![1.0; 100], vec![1.0; 100])]);

        let loader = TemplateLoader::new(&registry, ChannelFilter::default());
        let plots = loader.load(&store, &["/chi2".to_string()]).expect("load");

        let ttbar = registry.channel("ttbar").expect("ttbar");
        let hist = &plots["/chi2"][&ttbar].hist;

        assert_eq!(hist.n_bins(), 2);
        assert_eq!(hist.content, vec![50.0, 50.0]);
        assert_eq!(hist.title, "#Chi^{2}_{t#bar{t}}");
    }

    #[test]
    fn banned_channels_are_not_loaded() {
        let registry = TypeRegistry::new();
        let store = store_with(&[
            ("/ttbar/chi2_raw", vec![1.0], vec![1.0]),
            ("/zjets/chi2_raw", vec![2.0], vec![1.0]),
        ]);

        let filter = ChannelFilter::from_spec(&registry, Some("-zjets")).expect("filter");
        let loader = TemplateLoader::new(&registry, filter);
        let plots = loader.load(&store, &["/chi2_raw".to_string()]).expect("load");

        let channels = &plots["/chi2_raw"];
        assert!(channels.contains_key(&registry.channel("ttbar").expect("ttbar")));
        assert!(!channels.contains_key(&registry.channel("zjets").expect("zjets")));
    }

    #[test]
    fn missing_required_channel_is_fatal() {
        let registry = TypeRegistry::new();
        let store = store_with(&[("/ttbar/chi2_raw", vec![1.0], vec![1.0])]);

        let data = registry.channel("data").expect("data");
        let loader =
            TemplateLoader::new(&registry, ChannelFilter::default()).require_channels(vec![data]);

        let result = loader.load(&store, &["/chi2_raw".to_string()]);
        assert!(matches!(result, Err(Error::ChannelNotLoaded(tag)) if tag == "data"));
    }

    #[test]
    fn absent_plot_is_fatal() {
        let registry = TypeRegistry::new();
        let store = store_with(&[("/ttbar/chi2_raw", vec![1.0], vec![1.0])]);

        let loader = TemplateLoader::new(&registry, ChannelFilter::default());
        let result = loader.load(&store, &["/absent".to_string()]);

        assert!(matches!(result, Err(Error::PlotNotFound(plot)) if plot == "/absent"));
    }

    #[test]
    fn mc_channel_is_the_sum_of_backgrounds() {
        let registry = TypeRegistry::new();
        let store = store_with(&[
            ("/ttbar/chi2_raw", vec![1.0, 1.0], vec![1.0, 0.0]),
            ("/zjets/chi2_raw", vec![2.0, 3.0], vec![0.0, 1.0]),
            ("/zprime_m1000_w10/chi2_raw", vec![9.0, 9.0], vec![1.0, 1.0]),
        ]);

        let loader = TemplateLoader::new(&registry, ChannelFilter::default());
        let plots = loader.load(&store, &["/chi2_raw".to_string()]).expect("load");

        let mc = registry.channel("mc").expect("mc");
        let hist = &plots["/chi2_raw"][&mc].hist;

        // Signal channels stay out of the background fold.
        assert_eq!(hist.content, vec![3.0, 4.0]);
        assert_eq!(hist.error, vec![1.0, 1.0]);
    }
}
