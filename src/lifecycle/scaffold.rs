//! First-run layout of the configuration directory and allow-list file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Document written to `sample/development.yml` on first run.
pub const DEFAULT_DOCUMENT: &str = "\
configs:
  version: 1.0
  feature_1: true
  feature_2: false
  logging_level: debug
  logging_file: development.log
  snmp_host: \"localhost\"
  snmp_port: 161
  snmp_community: \"public\"
  snmp_version: \"v2c\"
  snmp_timeout: 1
  snmp_retries: 5
  snmp_max_repetitions: 25
  snmp_non_repeaters: 0
";

#[derive(Debug, Error)]
#[error("failed to create {}: {source}", path.display())]
pub struct ScaffoldError {
    pub path: PathBuf,
    pub source: io::Error,
}

/// What `ensure_layout` had to create.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Created {
    pub config_dir: bool,
    pub allowed_ips_file: bool,
}

/// Create the config directory with a sample product if it is missing, and
/// an empty allow-list file if that is missing. Nothing existing is touched.
pub fn ensure_layout(config_dir: &Path, allowed_ips_file: &Path) -> Result<Created, ScaffoldError> {
    let mut created = Created::default();

    if config_dir.exists() {
        tracing::info!(dir = %config_dir.display(), "Configurations directory already exists");
    } else {
        tracing::info!(dir = %config_dir.display(), "Configurations directory does not exist, creating sample");
        let sample = config_dir.join("sample");
        create_dir(&sample)?;
        create_file(&sample.join("development.yml"), DEFAULT_DOCUMENT)?;
        created.config_dir = true;
    }

    if !allowed_ips_file.exists() {
        tracing::info!(file = %allowed_ips_file.display(), "Allowed IPs file does not exist, creating empty list");
        if let Some(parent) = allowed_ips_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir(parent)?;
        }
        create_file(allowed_ips_file, "")?;
        created.allowed_ips_file = true;
    }

    Ok(created)
}

fn create_dir(path: &Path) -> Result<(), ScaffoldError> {
    fs::create_dir_all(path).map_err(|source| ScaffoldError {
        path: path.to_path_buf(),
        source,
    })
}

fn create_file(path: &Path, content: &str) -> Result<(), ScaffoldError> {
    // create_new so a file appearing in the meantime is never overwritten
    let result = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .and_then(|mut file| io::Write::write_all(&mut file, content.as_bytes()));

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(source) => Err(ScaffoldError {
            path: path.to_path_buf(),
            source,
        }),
    }
}
