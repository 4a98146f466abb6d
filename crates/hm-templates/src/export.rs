//! Export of merged templates under the theta naming convention.
//!
//! Output names follow
//! `<prefix>_<plot>__<channel>[__<systematic>__<plus|minus>]`, with plot
//! paths flattened (`/a/b` -> `a_b`) and `mttbar_after_htlep` canonically
//! renamed to `mttbar`.

use std::collections::BTreeSet;

use hm_store::HistStore;

use crate::error::{Error, Result};
use crate::loader::Plots;
use crate::registry::ChannelType;
use crate::systematics::Direction;

/// The channel name used in exported template names.
///
/// Channels without an entry (the derived `mc` fold, alternate-sample
/// channels) are not exported.
pub fn theta_channel_name(channel: ChannelType) -> Option<&'static str> {
    let name = match channel.tag() {
        "ttbar" => "ttbar",
        "zjets" => "zjets",
        "wb" => "wb",
        "wc" => "wc",
        "wlight" => "wlight",
        "wjets" => "wjets",
        "stop" => "singletop",
        "qcd" => "eleqcd",
        "data" => "DATA",
        // narrow resonances
        "zprime_m1000_w10" => "zp1000",
        "zprime_m1500_w15" => "zp1500",
        "zprime_m2000_w20" => "zp2000",
        "zprime_m3000_w30" => "zp3000",
        // wide resonances
        "zprime_m1000_w100" => "zp1000wide",
        "zprime_m1500_w150" => "zp1500wide",
        "zprime_m2000_w200" => "zp2000wide",
        "zprime_m3000_w300" => "zp3000wide",
        // rsgluons
        "rsgluon_m1000" => "rsg1000",
        "rsgluon_m1500" => "rsg1500",
        "rsgluon_m2000" => "rsg2000",
        "rsgluon_m2500" => "rsg2500",
        "rsgluon_m3000" => "rsg3000",
        _ => return None,
    };
    Some(name)
}

/// Export options for one pass.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Analysis-channel prefix (e.g. "el", "mu").
    pub prefix: String,
    /// Systematic suffix to append, if this pass exports a variant side.
    pub systematic: Option<(String, Direction)>,
    /// Explicit channel allow-list; `None` writes every loaded channel
    /// with a theta name. Explicitly listed channels must be loaded.
    pub channels: Option<BTreeSet<ChannelType>>,
    /// Channels never written, regardless of the allow-list.
    pub banned: BTreeSet<ChannelType>,
}

impl ExportOptions {
    /// Export everything under `prefix`, without a systematic suffix.
    pub fn all(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            systematic: None,
            channels: None,
            banned: BTreeSet::new(),
        }
    }
}

/// Flatten a plot path into its exported name.
fn plot_export_name(plot: &str) -> String {
    let flat = plot.trim_start_matches('/').replace('/', "_");
    if flat == "mttbar_after_htlep" { "mttbar".to_string() } else { flat }
}

/// Write every exportable template into `store`.
///
/// The allow-list is validated against the loaded mapping up front: an
/// allow-listed channel missing from any plot fails with
/// [`Error::ChannelNotLoaded`] before anything is written, so the store
/// is never left partially exported. Returns the number of templates
/// written.
pub fn export(store: &mut HistStore, plots: &Plots, options: &ExportOptions) -> Result<usize> {
    if let Some(allowed) = &options.channels {
        for (plot, channels) in plots {
            for channel in allowed {
                if !channels.contains_key(channel) {
                    tracing::error!(
                        channel = channel.tag(),
                        plot,
                        "export allow-list names an unloaded channel"
                    );
                    return Err(Error::ChannelNotLoaded(channel.tag().to_string()));
                }
            }
        }
    }

    let suffix = match &options.systematic {
        Some((name, direction)) => format!("__{}__{}", name, direction.suffix()),
        None => String::new(),
    };

    let mut written = 0;
    for (plot, channels) in plots {
        let plot_name = plot_export_name(plot);

        for (channel, template) in channels {
            if options.banned.contains(channel) {
                continue;
            }
            if let Some(allowed) = &options.channels {
                if !allowed.contains(channel) {
                    continue;
                }
            }
            let Some(channel_name) = theta_channel_name(*channel) else {
                continue;
            };

            let name =
                format!("{}_{}__{}{}", options.prefix, plot_name, channel_name, suffix);
            store.put(name, &template.hist);
            written += 1;
        }
    }

    tracing::info!(templates = written, "export complete");
    Ok(written)
}
