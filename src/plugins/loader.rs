//! Plugin discovery: every `*.toml` manifest in the plugin directory becomes
//! one [`CommandPlugin`], identified by its file name.
//!
//! ```toml
//! [[methods]]
//! name = "battery"
//! command = "/usr/local/bin/battery-segment"
//! args = ["--short"]
//! ```

use super::command::{CommandPlugin, MethodSpec};
use super::Plugin;
use crate::error::{RelayError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const MANIFEST_EXTENSION: &str = "toml";

#[derive(Debug, Deserialize)]
struct PluginManifest {
    #[serde(default)]
    methods: Vec<MethodSpec>,
}

/// Load all plugin manifests from `dir`.
///
/// A missing directory simply means no plugins. Manifests that fail to parse
/// or declare no methods are logged and skipped.
pub fn load_plugins(dir: &Path, timeout: Duration) -> Result<Vec<CommandPlugin>> {
    if !dir.is_dir() {
        tracing::info!("no plugin directory at {}", dir.display());
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|e| {
        RelayError::Settings(format!("cannot read plugin directory {}: {}", dir.display(), e))
    })?;

    let mut plugins = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_manifest = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(MANIFEST_EXTENSION));
        if !is_manifest || !path.is_file() {
            continue;
        }
        let Some(id) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let manifest: PluginManifest = match fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| toml::from_str(&content).map_err(|e| e.to_string()))
        {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::error!("skipping plugin {} ({})", path.display(), e);
                continue;
            }
        };
        if manifest.methods.is_empty() {
            tracing::warn!("plugin {} declares no methods", path.display());
            continue;
        }

        plugins.push(CommandPlugin::new(id, manifest.methods, timeout));
    }

    plugins.sort_by(|a, b| a.id().cmp(b.id()));
    Ok(plugins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dir_means_no_plugins() {
        let plugins =
            load_plugins(Path::new("/nonexistent/plugins"), Duration::from_secs(1)).unwrap();
        assert!(plugins.is_empty());
    }

    #[test]
    fn test_loads_manifests_and_skips_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("weather.toml"),
            "[[methods]]\nname = \"now\"\ncommand = \"/bin/true\"\n\n[[methods]]\nname = \"later\"\ncommand = \"/bin/true\"\nargs = [\"-x\"]\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("battery.toml"),
            "[[methods]]\nname = \"status\"\ncommand = \"/bin/true\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("broken.toml"), "[[methods]\n").unwrap();
        fs::write(dir.path().join("empty.toml"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let plugins = load_plugins(dir.path(), Duration::from_secs(1)).unwrap();
        let ids: Vec<_> = plugins.iter().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["battery.toml", "weather.toml"]);
        assert_eq!(plugins[1].methods(), vec!["now", "later"]);
    }
}
