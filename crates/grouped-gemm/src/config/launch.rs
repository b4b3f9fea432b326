use crate::{components::TilingScheme, scheduler::Traversal};

/// Launch defaults used by [`GroupedGemmConfig::from_global`](crate::components::GroupedGemmConfig::from_global).
#[derive(Default, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LaunchConfig {
    #[serde(default)]
    pub tiling_scheme: TilingScheme,
    #[serde(default)]
    pub max_workers: Option<u32>,
    #[serde(default)]
    pub tma: TmaMode,
    #[serde(default)]
    pub traversal: Option<Traversal>,
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TmaMode {
    #[default]
    #[serde(rename = "disabled")]
    Disabled,
    #[serde(rename = "load")]
    Load,
    #[serde(rename = "store")]
    Store,
    #[serde(rename = "full")]
    Full,
}

impl TmaMode {
    pub fn load(&self) -> bool {
        matches!(self, TmaMode::Load | TmaMode::Full)
    }

    pub fn store(&self) -> bool {
        matches!(self, TmaMode::Store | TmaMode::Full)
    }
}
