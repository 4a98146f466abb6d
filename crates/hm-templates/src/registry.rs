//! Closed input/channel type tables and merge rules.
//!
//! Input tags identify raw samples (one Monte-Carlo process or one
//! data-taking period); channel tags identify analysis-level groupings.
//! Both tables are closed: a tag not listed here fails construction, which
//! turns misspelled-channel bugs into immediate errors instead of silently
//! empty plots.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Error, Result};

/// Raw input samples known to the production configuration.
const INPUT_TYPES: &[&str] = &[
    "ttbar",
    "ttbar_powheg",
    "zjets",
    "wb",
    "wc",
    "wlight",
    "wjets",
    // single (anti)top
    "stop_s",
    "stop_t",
    "stop_tw",
    "satop_s",
    "satop_t",
    "satop_tw",
    // data-taking periods
    "rereco_2011a_may10",
    "rereco_2011a_aug05",
    "rereco_2011a_prompt_v4",
    "rereco_2011a_prompt_v6",
    "prompt_2011b_v1",
    "qcd_from_data",
    // narrow resonances
    "zprime_m1000_w10",
    "zprime_m1500_w15",
    "zprime_m2000_w20",
    "zprime_m3000_w30",
    // wide resonances
    "zprime_m1000_w100",
    "zprime_m1500_w150",
    "zprime_m2000_w200",
    "zprime_m3000_w300",
    // rsgluons
    "rsgluon_m1000",
    "rsgluon_m1500",
    "rsgluon_m2000",
    "rsgluon_m2500",
    "rsgluon_m3000",
    // alternate samples for derived systematics
    "ttbar_matching_plus",
    "ttbar_matching_minus",
    "ttbar_scale_plus",
    "ttbar_scale_minus",
    "wjets_matching_plus",
    "wjets_matching_minus",
    "wjets_scale_plus",
    "wjets_scale_minus",
];

/// How a channel absorbs inputs.
enum MergeRule {
    /// Exact enumeration of input tags.
    Exact(&'static [&'static str]),
    /// Every input whose tag starts with one of the prefixes. Computed
    /// against the input table when the registry is built, so a new sample
    /// flows into the right channel without a rule change.
    Prefix(&'static [&'static str]),
}

/// Channel table with merge rules.
const CHANNEL_RULES: &[(&str, MergeRule)] = &[
    ("ttbar", MergeRule::Exact(&["ttbar"])),
    ("ttbar_powheg", MergeRule::Exact(&["ttbar_powheg"])),
    ("zjets", MergeRule::Exact(&["zjets"])),
    ("wb", MergeRule::Exact(&["wb"])),
    ("wc", MergeRule::Exact(&["wc"])),
    ("wlight", MergeRule::Exact(&["wlight"])),
    ("wjets", MergeRule::Exact(&["wjets"])),
    ("stop", MergeRule::Prefix(&["stop_", "satop_"])),
    ("data", MergeRule::Prefix(&["rereco_", "prompt_"])),
    ("qcd", MergeRule::Exact(&["qcd_from_data"])),
    // derived channel: sum of Monte-Carlo backgrounds, absorbs no raw input
    ("mc", MergeRule::Exact(&[])),
    // narrow resonances
    ("zprime_m1000_w10", MergeRule::Exact(&["zprime_m1000_w10"])),
    ("zprime_m1500_w15", MergeRule::Exact(&["zprime_m1500_w15"])),
    ("zprime_m2000_w20", MergeRule::Exact(&["zprime_m2000_w20"])),
    ("zprime_m3000_w30", MergeRule::Exact(&["zprime_m3000_w30"])),
    // wide resonances
    ("zprime_m1000_w100", MergeRule::Exact(&["zprime_m1000_w100"])),
    ("zprime_m1500_w150", MergeRule::Exact(&["zprime_m1500_w150"])),
    ("zprime_m2000_w200", MergeRule::Exact(&["zprime_m2000_w200"])),
    ("zprime_m3000_w300", MergeRule::Exact(&["zprime_m3000_w300"])),
    // rsgluons
    ("rsgluon_m1000", MergeRule::Exact(&["rsgluon_m1000"])),
    ("rsgluon_m1500", MergeRule::Exact(&["rsgluon_m1500"])),
    ("rsgluon_m2000", MergeRule::Exact(&["rsgluon_m2000"])),
    ("rsgluon_m2500", MergeRule::Exact(&["rsgluon_m2500"])),
    ("rsgluon_m3000", MergeRule::Exact(&["rsgluon_m3000"])),
    // alternate-sample channels for derived systematics
    ("ttbar_matching_plus", MergeRule::Exact(&["ttbar_matching_plus"])),
    ("ttbar_matching_minus", MergeRule::Exact(&["ttbar_matching_minus"])),
    ("ttbar_scale_plus", MergeRule::Exact(&["ttbar_scale_plus"])),
    ("ttbar_scale_minus", MergeRule::Exact(&["ttbar_scale_minus"])),
    ("wjets_matching_plus", MergeRule::Exact(&["wjets_matching_plus"])),
    ("wjets_matching_minus", MergeRule::Exact(&["wjets_matching_minus"])),
    ("wjets_scale_plus", MergeRule::Exact(&["wjets_scale_plus"])),
    ("wjets_scale_minus", MergeRule::Exact(&["wjets_scale_minus"])),
];

/// Monte-Carlo background channels folded into the derived `mc` channel.
pub const MC_CHANNELS: &[&str] = &["ttbar", "zjets", "wb", "wc", "wlight", "wjets", "stop"];

/// A registered raw input sample tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InputType(&'static str);

impl InputType {
    /// The canonical tag string.
    pub fn tag(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A registered analysis channel tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelType(&'static str);

impl ChannelType {
    /// The canonical tag string.
    pub fn tag(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Validates tags against the closed tables and owns the merge rules.
///
/// Built once at process start and threaded explicitly into every
/// component; prefix-wildcard rules are resolved against the input table
/// at construction time, not per call.
pub struct TypeRegistry {
    allowed: BTreeMap<ChannelType, BTreeSet<InputType>>,
    owners: BTreeMap<InputType, Vec<ChannelType>>,
}

impl TypeRegistry {
    /// Build the registry from the static production tables.
    pub fn new() -> Self {
        let mut allowed: BTreeMap<ChannelType, BTreeSet<InputType>> = BTreeMap::new();
        let mut owners: BTreeMap<InputType, Vec<ChannelType>> = BTreeMap::new();

        for (tag, rule) in CHANNEL_RULES {
            let channel = ChannelType(tag);
            let inputs: BTreeSet<InputType> = match rule {
                MergeRule::Exact(tags) => tags.iter().map(|t| InputType(t)).collect(),
                MergeRule::Prefix(prefixes) => INPUT_TYPES
                    .iter()
                    .filter(|t| prefixes.iter().any(|p| t.starts_with(p)))
                    .map(|t| InputType(t))
                    .collect(),
            };
            for input in &inputs {
                owners.entry(*input).or_default().push(channel);
            }
            allowed.insert(channel, inputs);
        }

        Self { allowed, owners }
    }

    /// Register (validate) an input tag.
    pub fn input(&self, tag: &str) -> Result<InputType> {
        INPUT_TYPES
            .iter()
            .find(|t| **t == tag)
            .map(|t| InputType(t))
            .ok_or_else(|| Error::UnknownType { kind: "input", tag: tag.to_string() })
    }

    /// Register (validate) a channel tag.
    pub fn channel(&self, tag: &str) -> Result<ChannelType> {
        self.allowed
            .keys()
            .find(|c| c.tag() == tag)
            .copied()
            .ok_or_else(|| Error::UnknownType { kind: "channel", tag: tag.to_string() })
    }

    /// Total-membership predicate over both tables.
    pub fn contains(&self, tag: &str) -> bool {
        INPUT_TYPES.contains(&tag) || self.allowed.keys().any(|c| c.tag() == tag)
    }

    /// The merge rule: inputs this channel is allowed to absorb.
    pub fn allowed_inputs(&self, channel: ChannelType) -> &BTreeSet<InputType> {
        // Channel values can only be constructed through this registry.
        &self.allowed[&channel]
    }

    /// Reverse lookup: the unique channel whose merge rule contains `input`.
    pub fn channel_for_input(&self, input: InputType) -> Result<ChannelType> {
        match self.owners.get(&input).map(Vec::as_slice) {
            None | Some([]) => Err(Error::UnmappedInput(input.tag().to_string())),
            Some([channel]) => Ok(*channel),
            Some(channels) => Err(Error::AmbiguousMerge {
                input: input.tag().to_string(),
                channels: channels.iter().map(|c| c.tag().to_string()).collect(),
            }),
        }
    }

    /// All registered channels, in tag order.
    pub fn channels(&self) -> impl Iterator<Item = ChannelType> + '_ {
        self.allowed.keys().copied()
    }

    /// The Monte-Carlo background channels summed into `mc`.
    pub fn mc_channels(&self) -> Vec<ChannelType> {
        MC_CHANNELS.iter().map(|t| ChannelType(t)).collect()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_production_tag_round_trips() {
        let registry = TypeRegistry::new();

        for tag in INPUT_TYPES {
            assert_eq!(registry.input(tag).expect("registered input").tag(), *tag);
        }
        for (tag, _) in CHANNEL_RULES {
            assert_eq!(registry.channel(tag).expect("registered channel").tag(), *tag);
        }
    }

    #[test]
    fn unregistered_tags_fail_construction() {
        let registry = TypeRegistry::new();

        assert!(matches!(
            registry.input("unknown_sample"),
            Err(Error::UnknownType { kind: "input", .. })
        ));
        assert!(matches!(
            registry.channel("unknown_channel"),
            Err(Error::UnknownType { kind: "channel", .. })
        ));
    }

    #[test]
    fn stop_wildcard_collects_top_and_antitop() {
        let registry = TypeRegistry::new();
        let stop = registry.channel("stop").expect("stop");

        let tags: Vec<&str> =
            registry.allowed_inputs(stop).iter().map(|i| i.tag()).collect();
        assert_eq!(tags, vec!["satop_s", "satop_t", "satop_tw", "stop_s", "stop_t", "stop_tw"]);
    }

    #[test]
    fn data_wildcard_collects_all_periods() {
        let registry = TypeRegistry::new();
        let data = registry.channel("data").expect("data");

        let inputs = registry.allowed_inputs(data);
        assert_eq!(inputs.len(), 5);
        assert!(inputs.iter().all(|i| {
            i.tag().starts_with("rereco_") || i.tag().starts_with("prompt_")
        }));
    }

    #[test]
    fn production_rules_are_disjoint() {
        let registry = TypeRegistry::new();

        for tag in INPUT_TYPES {
            let input = registry.input(tag).expect("input");
            registry.channel_for_input(input).expect("unique owner");
        }
    }

    #[test]
    fn mc_absorbs_no_raw_input() {
        let registry = TypeRegistry::new();
        let mc = registry.channel("mc").expect("mc");
        assert!(registry.allowed_inputs(mc).is_empty());
    }

    #[test]
    fn contains_covers_both_tables() {
        let registry = TypeRegistry::new();

        assert!(registry.contains("stop_s"));
        assert!(registry.contains("stop"));
        assert!(!registry.contains("atop"));
    }
}
