//! Universe configuration: grouped ticker lists offered for selection.
//!
//! The universe is stored as a TOML file mapping a group name to its member
//! tickers. The built-in default is the Buenos Aires list plus the dollar
//! ADRs used for CCL normalization.

use crate::domain::ticker::is_merval_ticker;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize universe: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Universe {
    pub groups: BTreeMap<String, Vec<String>>,
}

const MERVAL: &[&str] = &[
    "GGAL.BA", "YPFD.BA", "PAMP.BA", "TXAR.BA", "ALUA.BA", "CRES.BA", "SUPV.BA", "CEPU.BA",
    "BMA.BA", "TGSU2.BA", "TRAN.BA", "EDN.BA", "LOMA.BA", "MIRG.BA", "DGCU2.BA", "BBAR.BA",
    "MOLI.BA", "TGNO4.BA", "CGPA2.BA", "COME.BA", "IRSA.BA", "BYMA.BA", "TECO2.BA", "METR.BA",
    "CECO2.BA", "BHIP.BA", "AGRO.BA", "LEDE.BA", "CVH.BA", "HAVA.BA", "AUSO.BA", "VALO.BA",
    "SEMI.BA", "INVJ.BA", "CTIO.BA", "MORI.BA", "HARG.BA", "GCLA.BA", "SAMI.BA", "BOLT.BA",
    "MOLA.BA", "CAPX.BA", "OEST.BA", "LONG.BA", "GCDI.BA", "GBAN.BA", "CELU.BA", "FERR.BA",
    "CADO.BA", "GAMI.BA", "PATA.BA", "CARC.BA", "BPAT.BA", "RICH.BA", "INTR.BA", "GARO.BA",
    "FIPL.BA", "GRIM.BA", "DYCA.BA", "POLL.BA", "DOME.BA", "ROSE.BA", "MTR.BA",
];

const ADRS: &[&str] = &[
    "YPF", "GGAL", "PAM", "BMA", "TEO", "TGS", "CEPU", "SUPV", "EDN", "LOMA", "BBAR", "CRESY",
    "IRS",
];

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Every ticker across all groups, in group order, without repeats.
    pub fn all_tickers(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.groups
            .values()
            .flat_map(|tickers| tickers.iter().map(String::as_str))
            .filter(|t| seen.insert(*t))
            .collect()
    }

    pub fn group_tickers(&self, group: &str) -> Option<&[String]> {
        self.groups.get(group).map(Vec::as_slice)
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    pub fn ticker_count(&self) -> usize {
        self.all_tickers().len()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.groups.values().any(|v| v.iter().any(|t| t == ticker))
    }

    /// Tickers quoted in pesos on the Buenos Aires exchange.
    pub fn local_tickers(&self) -> Vec<&str> {
        self.all_tickers()
            .into_iter()
            .filter(|t| is_merval_ticker(t))
            .collect()
    }

    /// The Buenos Aires panel plus the ADR listings.
    pub fn default_merval() -> Self {
        let to_vec = |list: &[&str]| list.iter().map(|t| t.to_string()).collect();
        let mut groups = BTreeMap::new();
        groups.insert("MERVAL".into(), to_vec(MERVAL));
        groups.insert("ADR".into(), to_vec(ADRS));
        Self { groups }
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::default_merval()
    }
}
