//! Configuration command.

use std::path::Path;

use crate::config::{self, PlayerConfig};

/// Show the effective configuration, optionally writing it back
pub fn cmd_config(config: &PlayerConfig, path: Option<&Path>, write: bool) -> anyhow::Result<()> {
    let target = match path {
        Some(path) => Some(path.to_path_buf()),
        None => config::config_path(),
    };

    match &target {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no config directory on this platform"),
    }
    println!("{}", toml::to_string_pretty(config)?);

    if write {
        let Some(path) = target else {
            anyhow::bail!("cannot determine where to write the config file");
        };
        config::save(config, &path)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}
