//! Static per-plot metadata consulted once at load time.

const MOMENTUM_UNITS: &str = "GeV/c";
const MASS_UNITS: &str = "GeV/c^{2}";
const MASS_TEV_UNITS: &str = "TeV/c^{2}";
const ANGLE_UNITS: &str = "rad";

/// Rebin factor, unit label and display title for one plot path.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlotMeta {
    /// Merge this many consecutive bins after accumulation.
    pub rebin: Option<usize>,
    /// Axis unit label.
    pub units: Option<&'static str>,
    /// Display title.
    pub title: Option<&'static str>,
}

/// Look up the metadata entry for a fully-qualified plot path.
///
/// Missing entries fall back to defaults: no rebin, no unit, no title.
pub fn lookup_metadata(path: &str) -> PlotMeta {
    let entry = |rebin, units, title| PlotMeta { rebin, units, title };

    match path {
        "/d0" => entry(None, Some("cm"), Some("d0")),
        "/htlep" | "/htlep_after_htlep" | "/htlep_before_htlep" => {
            entry(Some(25), Some(MOMENTUM_UNITS), Some("H_{T}^{lep}"))
        }
        "/htall" => entry(Some(25), Some(MOMENTUM_UNITS), Some("H_{T}^{all}")),
        "/mttbar_before_htlep" | "/mttbar_after_htlep" => {
            entry(Some(100), Some(MASS_TEV_UNITS), Some("M_{t#bart}"))
        }
        "/met" => entry(Some(25), Some(MASS_UNITS), Some("#slash{E}_{T}")),
        "/ttbar_pt" => entry(Some(25), Some(MOMENTUM_UNITS), Some("p_{T}^{t#bar{t}}")),
        "/wlep_mt" | "/whad_mt" => entry(None, Some(MASS_UNITS), None),
        "/wlep_mass" | "/whad_mass" => entry(Some(10), Some(MASS_UNITS), None),
        "/ltop/mass" => entry(Some(25), Some(MASS_UNITS), Some("M^{ltop}")),
        "/ltop/pt" => entry(Some(25), Some(MOMENTUM_UNITS), Some("p_{T}^{ltop}")),
        "/ltop/eta" => entry(Some(50), None, Some("#eta^{ltop}")),
        "/ltop/phi" => entry(Some(50), Some(ANGLE_UNITS), Some("#phi^{ltop}")),
        "/htop/mass" => entry(Some(25), Some(MASS_UNITS), Some("M^{htop}")),
        "/htop/pt" => entry(Some(25), Some(MOMENTUM_UNITS), Some("p_{T}^{htop}")),
        "/htop/eta" => entry(Some(50), None, Some("#eta^{htop}")),
        "/htop/phi" => entry(Some(50), Some(ANGLE_UNITS), Some("#phi^{htop}")),
        "/htop_dphi" => entry(None, Some(ANGLE_UNITS), Some("#Delta#phi(ltop,htop)")),
        "/ltop_drsum" => entry(None, None, Some("#DeltaR_{sum}^{ltop}")),
        "/htop_drsum" => entry(None, None, Some("#DeltaR_{sum}^{htop}")),
        "/chi2" => entry(Some(50), None, Some("#Chi^{2}_{t#bar{t}}")),
        _ => PlotMeta::default(),
    }
}
