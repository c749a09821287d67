//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::PathBuf;

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `CONCLAVE_`-prefixed environment variables
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./conclave.toml` or `./.conclave.toml`
    /// 4. XDG config: `$XDG_CONFIG_HOME/conclave/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        for filename in &["conclave.toml", ".conclave.toml"] {
            let path = PathBuf::from(filename);
            if path.exists() {
                figment = figment.merge(Toml::file(&path));
                break;
            }
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // CONCLAVE_GATEWAY__BASE_URL=... maps to [gateway] base_url
        figment = figment.merge(Env::prefixed("CONCLAVE_").split("__"));

        figment.extract().map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("conclave").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults_when_no_files_exist() {
        figment::Jail::expect_with(|_jail| {
            let config = ConfigLoader::load(None).unwrap();
            assert_eq!(config, FileConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_project_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "conclave.toml",
                r#"
                [channel]
                max_rounds = 12
                "#,
            )?;
            let config = ConfigLoader::load(None).unwrap();
            assert_eq!(config.channel.max_rounds, 12);
            assert_eq!(config.runner.workers, 4);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "conclave.toml",
                r#"
                [runner]
                workers = 2
                "#,
            )?;
            jail.set_env("CONCLAVE_RUNNER__WORKERS", "6");
            jail.set_env("CONCLAVE_GATEWAY__SITE_NAME", "jailbird");
            let config = ConfigLoader::load(None).unwrap();
            assert_eq!(config.runner.workers, 6);
            assert_eq!(config.gateway.site_name.as_deref(), Some("jailbird"));
            Ok(())
        });
    }
}
