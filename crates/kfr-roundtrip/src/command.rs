//! The router command line.

use crate::config::RouterConfig;
use crate::roundtrip::RoundTripPaths;
use kfr_common::CommandLine;
use std::path::PathBuf;

/// Everything needed to start one router run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterCommand {
    pub java: String,
    pub artifact: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub host: String,
    pub disable_logging: bool,
}

impl RouterCommand {
    pub fn from_config(config: &RouterConfig, paths: &RoundTripPaths) -> Self {
        Self {
            java: config.java.path.clone(),
            artifact: config.artifact_path(),
            input: paths.router_input.clone(),
            output: paths.router_output.clone(),
            host: config.router.host.clone(),
            disable_logging: config.router.disable_logging,
        }
    }

    /// `java -jar <artifact> [-dl] -de <input> -do <output> -host <host>`
    pub fn to_command_line(&self) -> CommandLine {
        let mut args = vec!["-jar".to_string(), self.artifact.display().to_string()];
        if self.disable_logging {
            args.push("-dl".to_string());
        }
        args.extend([
            "-de".to_string(),
            self.input.display().to_string(),
            "-do".to_string(),
            self.output.display().to_string(),
            "-host".to_string(),
            self.host.clone(),
        ]);
        CommandLine::from_parts(self.java.as_str(), args)
    }
}
