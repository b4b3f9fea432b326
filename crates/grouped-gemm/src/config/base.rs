use std::{path::Path, sync::Arc};

use super::{LaunchConfig, TmaMode};

/// Static mutex holding the global configuration, initialized as `None`.
static GROUPED_GEMM_GLOBAL_CONFIG: spin::Mutex<Option<Arc<GlobalConfig>>> =
    spin::Mutex::new(None);

/// Name of the file looked up in the current directory and its parents.
pub const CONFIG_FILE_NAME: &str = "grouped-gemm.toml";

/// Process wide configuration of the grouped GEMM.
#[derive(Default, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GlobalConfig {
    /// Defaults applied to launches built with `GroupedGemmConfig::from_global`.
    #[serde(default)]
    pub launch: LaunchConfig,
}

impl GlobalConfig {
    /// Retrieves the current global configuration, loading it if not set.
    ///
    /// The first call reads `grouped-gemm.toml` from the current directory or its parents, falling
    /// back to the default configuration, then applies the `GROUPED_GEMM_*` environment
    /// variables.
    pub fn get() -> Arc<Self> {
        let mut state = GROUPED_GEMM_GLOBAL_CONFIG.lock();
        let config = state.get_or_insert_with(|| {
            let config = Self::from_current_dir().override_from_env();
            log::debug!("Loaded grouped gemm config {config:?}");
            Arc::new(config)
        });

        config.clone()
    }

    /// Sets the global configuration to the provided value.
    ///
    /// # Panics
    /// Panics if the configuration has already been set or read, as it cannot be overridden.
    pub fn set(config: Self) {
        let mut state = GROUPED_GEMM_GLOBAL_CONFIG.lock();
        if state.is_some() {
            panic!("Cannot set the global configuration multiple times.");
        }
        *state = Some(Arc::new(config));
    }

    /// Save the current configuration to the provided file path.
    pub fn save_default<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
        let config = Self::get();
        let content = toml::to_string_pretty(config.as_ref()).map_err(std::io::Error::other)?;
        std::fs::write(path, content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Overrides configuration fields based on environment variables.
    pub fn override_from_env(self) -> Self {
        self.override_from_vars(|name| std::env::var(name).ok())
    }

    /// Overrides configuration fields with the variables returned by `lookup`.
    ///
    /// Recognized variables are `GROUPED_GEMM_MAX_WORKERS`, `GROUPED_GEMM_TMA` and
    /// `GROUPED_GEMM_TRAVERSAL`. Unrecognized values are ignored with a warning.
    pub fn override_from_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup("GROUPED_GEMM_MAX_WORKERS") {
            match val.parse::<u32>() {
                Ok(0) => self.launch.max_workers = None,
                Ok(max_workers) => self.launch.max_workers = Some(max_workers),
                Err(_) => log::warn!("Ignoring GROUPED_GEMM_MAX_WORKERS={val}, not a number"),
            }
        }

        if let Some(val) = lookup("GROUPED_GEMM_TMA") {
            match val.as_str() {
                "0" | "false" => self.launch.tma = TmaMode::Disabled,
                "1" | "true" => self.launch.tma = TmaMode::Full,
                "load" => self.launch.tma = TmaMode::Load,
                "store" => self.launch.tma = TmaMode::Store,
                _ => log::warn!("Ignoring GROUPED_GEMM_TMA={val}"),
            }
        }

        if let Some(val) = lookup("GROUPED_GEMM_TRAVERSAL") {
            match val.parse() {
                Ok(traversal) => self.launch.traversal = Some(traversal),
                Err(err) => log::warn!("Ignoring GROUPED_GEMM_TRAVERSAL: {err}"),
            }
        }

        self
    }

    // Traverses up the directory tree until a readable configuration file is found or the root
    // is reached. Returns a default configuration if no file is found.
    fn from_current_dir() -> Self {
        let Ok(mut dir) = std::env::current_dir() else {
            return Self::default();
        };

        loop {
            let path = dir.join(CONFIG_FILE_NAME);
            if path.is_file() {
                match Self::from_file_path(&path) {
                    Ok(config) => return config,
                    Err(err) => log::warn!("Skipping config file {}: {err}", path.display()),
                }
            }

            if !dir.pop() {
                break;
            }
        }

        Self::default()
    }

    fn from_file_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{components::TilingScheme, scheduler::Traversal};

    fn vars(entries: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn parses_a_partial_file() {
        let config = GlobalConfig::from_toml_str(
            r#"
            [launch]
            max_workers = 8
            tma = "load"

            [launch.tiling_scheme]
            block_m = 32
            block_n = 32
            "#,
        )
        .unwrap();

        assert_eq!(config.launch.max_workers, Some(8));
        assert_eq!(config.launch.tma, TmaMode::Load);
        assert_eq!(config.launch.tiling_scheme, TilingScheme::new(32, 32, 32));
        assert_eq!(config.launch.traversal, None);
    }

    #[test]
    fn empty_file_is_the_default() {
        assert_eq!(
            GlobalConfig::from_toml_str("").unwrap(),
            GlobalConfig::default()
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(GlobalConfig::from_toml_str("[launch]\ntma = 3").is_err());
    }

    #[test_log::test]
    fn variables_override_the_file() {
        let config = GlobalConfig::default().override_from_vars(vars(&[
            ("GROUPED_GEMM_MAX_WORKERS", "4"),
            ("GROUPED_GEMM_TMA", "1"),
            ("GROUPED_GEMM_TRAVERSAL", "cursor"),
        ]));

        assert_eq!(config.launch.max_workers, Some(4));
        assert_eq!(config.launch.tma, TmaMode::Full);
        assert_eq!(config.launch.traversal, Some(Traversal::Cursor));
    }

    #[test_log::test]
    fn invalid_variables_are_ignored() {
        let mut expected = GlobalConfig::default();
        expected.launch.tma = TmaMode::Store;

        let config = expected.clone().override_from_vars(vars(&[
            ("GROUPED_GEMM_MAX_WORKERS", "many"),
            ("GROUPED_GEMM_TMA", "sometimes"),
            ("GROUPED_GEMM_TRAVERSAL", "spiral"),
        ]));

        assert_eq!(config, expected);
    }

    #[test]
    fn zero_workers_means_no_cap() {
        let mut config = GlobalConfig::default();
        config.launch.max_workers = Some(2);

        let config = config.override_from_vars(vars(&[("GROUPED_GEMM_MAX_WORKERS", "0")]));

        assert_eq!(config.launch.max_workers, None);
    }

    #[test]
    fn tma_mode_selects_paths() {
        assert!(!TmaMode::Disabled.load() && !TmaMode::Disabled.store());
        assert!(TmaMode::Load.load() && !TmaMode::Load.store());
        assert!(!TmaMode::Store.load() && TmaMode::Store.store());
        assert!(TmaMode::Full.load() && TmaMode::Full.store());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = GlobalConfig::default();
        config.launch.traversal = Some(Traversal::GridStride);
        config.launch.max_workers = Some(6);

        let content = toml::to_string_pretty(&config).unwrap();

        assert_eq!(GlobalConfig::from_toml_str(&content).unwrap(), config);
    }
}
