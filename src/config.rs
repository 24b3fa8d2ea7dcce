//! Analysis configuration (TOML).
//!
//! One file describes where the chunk files live, which processes they
//! belong to, which branches to keep, and which cuts to apply.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::cut::{CutGroup, CutSet};
use crate::error::CutResult;

/// Label given to rows from a folder with no `[processes]` entry.
pub const UNKNOWN_PROCESS: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Worker threads for chunk loading; all cores when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Keyed by input folder name.
    #[serde(default)]
    pub processes: BTreeMap<String, ProcessConfig>,
    #[serde(default)]
    pub branches: BTreeMap<String, BranchConfig>,
    /// column → `"<op> <value>"`, combined into one cut set.
    #[serde(default)]
    pub cuts: BTreeMap<String, String>,
    /// group name → ordered `"<column> <op> <value>"` stages.
    #[serde(default)]
    pub cut_groups: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub base_path: PathBuf,
    /// Explicit chunk file names. Takes precedence over `chunk_count`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    #[serde(default = "default_chunk_extension")]
    pub chunk_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub filtered_dir: PathBuf,
    pub report_dir: PathBuf,
    pub efficiency_dir: PathBuf,
    #[serde(default = "default_report_base_name")]
    pub report_base_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Histogram binning hints for a branch, carried for the plotting side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    pub description: String,
    pub bins: usize,
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub log_y: bool,
}

fn default_chunk_extension() -> String {
    "parquet".to_string()
}

fn default_report_base_name() -> String {
    "cut_report".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            filtered_dir: PathBuf::from("output/filtered"),
            report_dir: PathBuf::from("output/reports"),
            efficiency_dir: PathBuf::from("output/efficiencies"),
            report_base_name: default_report_base_name(),
        }
    }
}

impl InputConfig {
    /// Chunk file names to read inside every process folder.
    pub fn chunk_files(&self) -> Vec<String> {
        if !self.chunks.is_empty() {
            return self.chunks.clone();
        }
        (0..self.chunk_count.unwrap_or(0))
            .map(|i| format!("chunk_{i}.{}", self.chunk_extension))
            .collect()
    }
}

impl BranchConfig {
    fn new(description: &str, bins: usize, min: f64, max: f64, unit: Option<&str>) -> Self {
        BranchConfig {
            description: description.to_string(),
            bins,
            min,
            max,
            unit: unit.map(str::to_string),
            log_y: false,
        }
    }
}

impl Default for Config {
    /// The Bs → ττ selection at √s = 91 GeV.
    fn default() -> Self {
        let processes: BTreeMap<String, ProcessConfig> = [
            (
                "p8_ee_Zbb_ecm91_EvtGen_Bs2TauTauTAUHADNU",
                "Bs -> tau tau (tau -> 3pi nu)",
                "#228B22",
            ),
            ("p8_ee_Zbb_ecm91_EvtGen_Bs2TauTau", "Bs -> tau tau (inclusive)", "#b2182b"),
            ("p8_ee_Zbb_ecm91", "Z -> b bbar (bkg)", "#2166ac"),
            ("p8_ee_Zcc_ecm91", "Z -> c cbar (bkg)", "#92c5de"),
            ("p8_ee_Zss_ecm91", "Z -> s sbar (bkg)", "#4393c3"),
            ("p8_ee_Zud_ecm91", "Z -> u dbar (bkg)", "#d1e5f0"),
        ]
        .into_iter()
        .map(|(folder, label, color)| {
            (
                folder.to_string(),
                ProcessConfig {
                    label: label.to_string(),
                    color: Some(color.to_string()),
                },
            )
        })
        .collect();

        let gev = Some("[GeV]");
        let mm = Some("[mm]");
        let mut branches: BTreeMap<String, BranchConfig> = [
            ("EVT_ThrustEmin_E", BranchConfig::new("Min. hem. total Energy", 50, 0.0, 50.0, gev)),
            ("EVT_ThrustEmax_E", BranchConfig::new("Max. hem. total Energy", 40, 20.0, 60.0, gev)),
            (
                "EVT_ThrustEmin_Echarged",
                BranchConfig::new("Min. hem. charged Energy", 50, 0.0, 50.0, gev),
            ),
            (
                "EVT_ThrustEmax_Echarged",
                BranchConfig::new("Max. hem. charged Energy", 50, 0.0, 50.0, gev),
            ),
            (
                "EVT_ThrustEmin_Eneutral",
                BranchConfig::new("Min. hem. neutral Energy", 50, 0.0, 50.0, gev),
            ),
            (
                "EVT_ThrustEmax_Eneutral",
                BranchConfig::new("Max. hem. neutral Energy", 50, 0.0, 50.0, gev),
            ),
            ("EVT_ThrustEmin_N", BranchConfig::new("Min. hem. Multiplicity", 70, 0.0, 70.0, None)),
            ("EVT_ThrustEmax_N", BranchConfig::new("Max. hem. Multiplicity", 70, 0.0, 70.0, None)),
            (
                "EVT_ThrustEmin_Ncharged",
                BranchConfig::new("Min. hem. charged Multiplicity", 25, 0.0, 25.0, None),
            ),
            (
                "EVT_ThrustEmax_Ncharged",
                BranchConfig::new("Max. hem. charged Multiplicity", 25, 0.0, 25.0, None),
            ),
            (
                "EVT_ThrustEmin_Nneutral",
                BranchConfig::new("Min. hem. neutral Multiplicity", 25, 0.0, 25.0, None),
            ),
            (
                "EVT_ThrustEmax_Nneutral",
                BranchConfig::new("Max. hem. neutral Multiplicity", 25, 0.0, 25.0, None),
            ),
            (
                "EVT_ThrustEmax_NDV",
                BranchConfig::new("Num. of secondary vertices in max hem.", 5, 0.0, 5.0, None),
            ),
            (
                "EVT_ThrustEmin_NDV",
                BranchConfig::new("Num. of secondary vertices in min hem.", 5, 0.0, 5.0, None),
            ),
            (
                "EVT_NVertex",
                BranchConfig::new("Number of reconstructed vertices", 10, 0.0, 10.0, None),
            ),
            ("EVT_NTau23Pi", BranchConfig::new("Number of 3 pion vertices", 5, 0.0, 5.0, None)),
            (
                "EVT_dPV2DVmin",
                BranchConfig::new("Min. distance between SVs to PV", 50, 0.0, 50.0, mm),
            ),
            (
                "EVT_dPV2DVmax",
                BranchConfig::new("Max. distance between SVs to PV", 100, 0.0, 100.0, mm),
            ),
            (
                "EVT_dPV2DVave",
                BranchConfig::new("Mean distance between SVs to PV", 100, 0.0, 100.0, mm),
            ),
        ]
        .into_iter()
        .map(|(name, branch)| (name.to_string(), branch))
        .collect();
        for name in ["EVT_dPV2DVmin", "EVT_dPV2DVmax", "EVT_dPV2DVave"] {
            if let Some(branch) = branches.get_mut(name) {
                branch.log_y = true;
            }
        }

        let cuts: BTreeMap<String, String> = [
            ("EVT_NTau23Pi", ">= 2"),
            ("EVT_ThrustEmin_E", "< 43"),
            ("EVT_ThrustEmin_Eneutral", "< 16"),
            ("EVT_ThrustEmin_NDV", ">= 2"),
            ("EVT_ThrustEmax_E", "< 48"),
            ("EVT_ThrustEmin_Nneutral", "< 15"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let ntau = "EVT_NTau23Pi >= 2";
        let emin_e = "EVT_ThrustEmin_E < 43";
        let emin_eneutral = "EVT_ThrustEmin_Eneutral < 16";
        let emin_ndv = "EVT_ThrustEmin_NDV >= 2";
        let emin_nneutral = "EVT_ThrustEmin_Nneutral < 15";
        let emax_e = "EVT_ThrustEmax_E < 48";
        let cut_groups: BTreeMap<String, Vec<String>> = [
            ("NTau23Pi_ThEminE_ThEminEneutral", [ntau, emin_e, emin_eneutral]),
            ("NTau23Pi_ThEminE_ThEminNDV", [ntau, emin_e, emin_ndv]),
            ("NTau23Pi_ThEminE_ThEmaxE", [ntau, emin_e, emax_e]),
            ("NTau23Pi_ThEminE_ThEminNneutral", [ntau, emin_e, emin_nneutral]),
            ("NTau23Pi_ThEminEneutral_ThEminNDV", [ntau, emin_eneutral, emin_ndv]),
            ("NTau23Pi_ThEminEneutral_ThEmaxE", [ntau, emin_eneutral, emax_e]),
            ("NTau23Pi_ThEminEneutral_ThEminNneutral", [ntau, emin_eneutral, emin_nneutral]),
            ("NTau23Pi_ThEminNDV_ThEmaxE", [ntau, emin_ndv, emax_e]),
            ("NTau23Pi_ThEminNDV_ThEminNneutral", [ntau, emin_ndv, emin_nneutral]),
            ("NTau23Pi_ThEmaxE_ThEminNneutral", [ntau, emax_e, emin_nneutral]),
        ]
        .into_iter()
        .map(|(name, stages)| (name.to_string(), stages.iter().map(|s| s.to_string()).collect()))
        .collect();

        Config {
            threads: None,
            input: InputConfig {
                base_path: PathBuf::from("fcc_stage1_output"),
                chunks: Vec::new(),
                chunk_count: Some(10),
                chunk_extension: default_chunk_extension(),
            },
            output: OutputConfig::default(),
            processes,
            branches,
            cuts,
            cut_groups,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("serialising config")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content).with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    /// The `[cuts]` table as one cut set.
    pub fn cut_set(&self) -> CutResult<CutSet> {
        CutSet::from_conditions(&self.cuts)
    }

    /// Every `[cut_groups]` entry, parsed, in name order.
    pub fn cut_groups(&self) -> CutResult<Vec<(String, CutGroup)>> {
        self.cut_groups
            .iter()
            .map(|(name, stages)| Ok((name.clone(), CutGroup::parse(stages)?)))
            .collect()
    }

    /// Process label for an input folder.
    pub fn process_label<'a>(&'a self, folder: &str) -> &'a str {
        self.processes
            .get(folder)
            .map(|p| p.label.as_str())
            .unwrap_or(UNKNOWN_PROCESS)
    }

    /// Plotting colour per process label, for labels that have one.
    pub fn process_colors(&self) -> BTreeMap<String, String> {
        self.processes
            .values()
            .filter_map(|p| Some((p.label.clone(), p.color.clone()?)))
            .collect()
    }

    /// Every (folder, chunk) pair to load.
    pub fn load_tasks(&self) -> Vec<(String, String)> {
        let chunks = self.input.chunk_files();
        self.processes
            .keys()
            .flat_map(|folder| chunks.iter().map(move |chunk| (folder.clone(), chunk.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses_its_own_cuts() {
        let config = Config::default();
        let cuts = config.cut_set().unwrap();
        assert_eq!(cuts.len(), 6);
        let groups = config.cut_groups().unwrap();
        assert_eq!(groups.len(), 10);
        assert!(groups.iter().all(|(_, g)| g.len() == 3));
        assert_eq!(config.load_tasks().len(), 6 * 10);
    }

    #[test]
    fn chunk_names_from_count() {
        let input = InputConfig {
            base_path: PathBuf::from("."),
            chunks: Vec::new(),
            chunk_count: Some(3),
            chunk_extension: "csv".into(),
        };
        assert_eq!(input.chunk_files(), ["chunk_0.csv", "chunk_1.csv", "chunk_2.csv"]);

        let explicit = InputConfig {
            chunks: vec!["a.parquet".into()],
            ..input
        };
        assert_eq!(explicit.chunk_files(), ["a.parquet"]);
    }

    #[test]
    fn toml_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.cuts, config.cuts);
        assert_eq!(back.cut_groups, config.cut_groups);
        assert_eq!(back.input.chunk_files(), config.input.chunk_files());
        assert_eq!(back.process_label("p8_ee_Zcc_ecm91"), "Z -> c cbar (bkg)");
        assert_eq!(back.process_label("elsewhere"), UNKNOWN_PROCESS);
    }

    #[test]
    fn colors_are_keyed_by_label() {
        let mut config = Config::default();
        config.processes.insert(
            "plain".into(),
            ProcessConfig {
                label: "no colour".into(),
                color: None,
            },
        );
        let colors = config.process_colors();
        assert_eq!(colors.len(), 6);
        assert_eq!(colors["Z -> b bbar (bkg)"], "#2166ac");
        assert!(!colors.contains_key("no colour"));
    }
}
