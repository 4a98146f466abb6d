//! Immutable per-run configuration.
//!
//! Built once by the caller (CLI) and threaded into each component; no
//! ambient mutable state.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::registry::{ChannelType, TypeRegistry};

/// Split a comma-separated channel spec into used and banned sets.
///
/// A leading `-` bans the channel; everything else selects it. An empty
/// use set means "all channels".
pub fn split_use_and_ban<'a>(
    items: impl IntoIterator<Item = &'a str>,
) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut use_set = BTreeSet::new();
    let mut ban_set = BTreeSet::new();

    for item in items {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if let Some(banned) = item.strip_prefix('-') {
            ban_set.insert(banned.to_string());
        } else {
            use_set.insert(item.to_string());
        }
    }

    (use_set, ban_set)
}

/// Channel allow/deny list resolved against the registry.
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    use_set: Option<BTreeSet<ChannelType>>,
    ban_set: BTreeSet<ChannelType>,
}

impl ChannelFilter {
    /// Parse a spec like `"ttbar,zjets,-qcd"`. Unknown tags fail with
    /// [`Error::UnknownType`]; `None` allows every channel.
    pub fn from_spec(registry: &TypeRegistry, spec: Option<&str>) -> Result<Self> {
        let Some(spec) = spec else {
            return Ok(Self::default());
        };

        let (use_tags, ban_tags) = split_use_and_ban(spec.split(','));

        let resolve = |tags: &BTreeSet<String>| -> Result<BTreeSet<ChannelType>> {
            tags.iter().map(|t| registry.channel(t)).collect()
        };

        Ok(Self {
            use_set: if use_tags.is_empty() { None } else { Some(resolve(&use_tags)?) },
            ban_set: resolve(&ban_tags)?,
        })
    }

    /// A filter that admits exactly the given channels.
    pub fn allow_only(channels: impl IntoIterator<Item = ChannelType>) -> Self {
        Self { use_set: Some(channels.into_iter().collect()), ban_set: BTreeSet::new() }
    }

    /// Whether `channel` passes the filter.
    pub fn allows(&self, channel: ChannelType) -> bool {
        if self.ban_set.contains(&channel) {
            return false;
        }
        match &self.use_set {
            Some(use_set) => use_set.contains(&channel),
            None => true,
        }
    }

    /// The effective channel set over the full registry.
    pub fn effective(&self, registry: &TypeRegistry) -> Vec<ChannelType> {
        registry.channels().filter(|c| self.allows(*c)).collect()
    }
}

/// Configuration of one batch pass.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Input store path.
    pub input: PathBuf,
    /// Output store path (export target).
    pub output: PathBuf,
    /// Plot names to load (without folder prefix).
    pub plots: Vec<String>,
    /// Folders to look for plots in; empty means the store root.
    pub folders: Vec<String>,
    /// Channel allow/deny spec (`"a,b,-c"`).
    pub channels: Option<String>,
    /// Channels to export; `None` exports all known channels.
    pub save_channels: Option<String>,
    /// Systematic spec (`name` optionally suffixed with `+`/`-`).
    pub systematic: Option<String>,
    /// Fixed-fraction override file (JSON `{channel: fraction}`).
    pub fractions: Option<PathBuf>,
    /// Extra scale-factor file (JSON `{channel: factor}`).
    pub scales: Option<PathBuf>,
    /// Run the dynamic fraction fit (disabled by `--no-fit`).
    pub use_fitter: bool,
    /// Plot the fraction fit runs on.
    pub fit_plot: String,
    /// Prefix for exported template names (analysis channel, e.g. "el").
    pub theta_prefix: String,
}

impl RunConfig {
    /// Fully-qualified plot paths: the cross product of folders and plots.
    pub fn plot_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        if self.folders.is_empty() {
            for plot in &self.plots {
                paths.push(format!("/{}", plot));
            }
        } else {
            for folder in &self.folders {
                for plot in &self.plots {
                    paths.push(format!("/{}/{}", folder, plot));
                }
            }
        }
        paths
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.plots.is_empty() {
            return Err(Error::Config("no plots requested".into()));
        }
        if self.fractions.is_some() && self.use_fitter {
            return Err(Error::Config(
                "fixed fractions and the dynamic fit are mutually exclusive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_separates_banned_channels() {
        let (use_set, ban_set) = split_use_and_ban(["ttbar", "-qcd", " zjets ", ""]);

        assert!(use_set.contains("ttbar"));
        assert!(use_set.contains("zjets"));
        assert_eq!(ban_set.len(), 1);
        assert!(ban_set.contains("qcd"));
    }

    #[test]
    fn filter_bans_win_over_uses() {
        let registry = TypeRegistry::new();
        let filter =
            ChannelFilter::from_spec(&registry, Some("ttbar,qcd,-qcd")).expect("filter");

        assert!(filter.allows(registry.channel("ttbar").expect("ttbar")));
        assert!(!filter.allows(registry.channel("qcd").expect("qcd")));
        assert!(!filter.allows(registry.channel("zjets").expect("zjets")));
    }

    #[test]
    fn ban_only_spec_allows_the_rest() {
        let registry = TypeRegistry::new();
        let filter = ChannelFilter::from_spec(&registry, Some("-qcd")).expect("filter");

        assert!(filter.allows(registry.channel("ttbar").expect("ttbar")));
        assert!(!filter.allows(registry.channel("qcd").expect("qcd")));
    }

    #[test]
    fn unknown_channel_in_spec_fails() {
        let registry = TypeRegistry::new();
        assert!(ChannelFilter::from_spec(&registry, Some("nonsense")).is_err());
    }

    #[test]
    fn plot_paths_cross_folders_and_plots() {
        let config = RunConfig {
            input: "in.json".into(),
            output: "out.json".into(),
            plots: vec!["mttbar".into(), "chi2".into()],
            folders: vec!["ltop".into()],
            channels: None,
            save_channels: None,
            systematic: None,
            fractions: None,
            scales: None,
            use_fitter: true,
            fit_plot: "/htlep_before_htlep".into(),
            theta_prefix: "el".into(),
        };

        assert_eq!(config.plot_paths(), vec!["/ltop/mttbar", "/ltop/chi2"]);
    }
}
