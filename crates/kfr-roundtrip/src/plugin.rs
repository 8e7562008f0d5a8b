//! Explicitly registered editor actions.

use crate::config::RouterConfig;
use crate::host::BoardHost;
use crate::roundtrip::{RoundTrip, RoundTripOutcome};
use kfr_common::{Error, Result};
use kfr_progress::ProgressSurface;
use tracing::info;

/// An action the embedding editor can run on the open board.
pub trait ActionPlugin {
    fn name(&self) -> &str;
    fn category(&self) -> &str;
    fn description(&self) -> &str;
    fn run(
        &self,
        host: &mut dyn BoardHost,
        surface: &mut dyn ProgressSurface,
    ) -> Result<RoundTripOutcome>;
}

/// Actions known to the embedding process. Nothing registers itself; the
/// embedder calls [`PluginRegistry::register`] for each one.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn ActionPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn ActionPlugin>) -> Result<()> {
        if self.get(plugin.name()).is_some() {
            return Err(Error::validation(format!(
                "Plugin already registered: {}",
                plugin.name()
            )));
        }
        info!(plugin = plugin.name(), category = plugin.category(), "Plugin registered");
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn ActionPlugin> {
        self.plugins
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn run(
        &self,
        name: &str,
        host: &mut dyn BoardHost,
        surface: &mut dyn ProgressSurface,
    ) -> Result<RoundTripOutcome> {
        let plugin = self
            .get(name)
            .ok_or_else(|| Error::not_found(format!("plugin {}", name)))?;
        info!(plugin = name, "Running plugin");
        plugin.run(host, surface)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

/// Freerouting round trip as an editor action.
#[derive(Debug, Clone)]
pub struct FreeroutingPlugin {
    round_trip: RoundTrip,
}

impl FreeroutingPlugin {
    pub const NAME: &'static str = "Freerouting";

    pub fn new(config: RouterConfig) -> Self {
        Self {
            round_trip: RoundTrip::new(config),
        }
    }
}

impl ActionPlugin for FreeroutingPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn category(&self) -> &str {
        "PCB auto routing"
    }

    fn description(&self) -> &str {
        "Freerouting for PCB auto routing"
    }

    fn run(
        &self,
        host: &mut dyn BoardHost,
        surface: &mut dyn ProgressSurface,
    ) -> Result<RoundTripOutcome> {
        self.round_trip.run(host, surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin() -> FreeroutingPlugin {
        let config =
            RouterConfig::load_from_string("artifact:\n  location: freerouting.jar\n").unwrap();
        FreeroutingPlugin::new(config)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(plugin())).unwrap();

        assert_eq!(registry.names(), vec!["Freerouting"]);
        let found = registry.get("Freerouting").unwrap();
        assert_eq!(found.category(), "PCB auto routing");
        assert!(registry.get("Other").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(plugin())).unwrap();
        let err = registry.register(Box::new(plugin())).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(registry.names().len(), 1);
    }

    #[test]
    fn test_run_unknown_plugin() {
        let registry = PluginRegistry::new();
        let mut host = crate::host::FileBoardHost::with_default_session("board.dsn");
        let mut surface = kfr_progress::HeadlessSurface::new();
        let err = registry.run("Missing", &mut host, &mut surface).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
