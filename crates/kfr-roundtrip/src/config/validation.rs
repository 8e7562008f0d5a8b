use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &RouterConfig) -> Result<()> {
    if config.java.path.trim().is_empty() {
        return Err(anyhow!("java.path cannot be empty"));
    }

    if config.artifact.location.trim().is_empty() {
        return Err(anyhow!("artifact.location cannot be empty"));
    }

    validate_router_options(&config.router)?;
    validate_lifecycle_options(&config.lifecycle)?;

    match config.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            config.log_level
        )),
    }
}

fn validate_router_options(options: &RouterOptions) -> Result<()> {
    if options.host.trim().is_empty() {
        return Err(anyhow!("router.host cannot be empty"));
    }
    Ok(())
}

fn validate_lifecycle_options(options: &LifecycleOptions) -> Result<()> {
    if options.grace_window.is_zero() {
        return Err(anyhow!("lifecycle.grace_window must be greater than 0"));
    }

    if options.join_timeout.is_zero() {
        return Err(anyhow!("lifecycle.join_timeout must be greater than 0"));
    }

    if options.join_timeout < options.grace_window {
        return Err(anyhow!(
            "lifecycle.join_timeout ({:?}) must not be shorter than lifecycle.grace_window ({:?})",
            options.join_timeout,
            options.grace_window
        ));
    }

    Ok(())
}

/// Check that the configured Java runtime and router jar exist.
///
/// Returns the resolved Java executable.
pub fn validate_environment(config: &RouterConfig) -> Result<PathBuf> {
    let java = kfr_process::validate_executable(&config.java.path)
        .map_err(|e| anyhow!("Java runtime unusable: {}", e))?;

    let artifact = config.artifact_path();
    kfr_process::validate_file(&artifact)
        .map_err(|e| anyhow!("Router artifact unusable: {}", e))?;

    Ok(java)
}
