use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const APP_DIR_NAME: &str = "clusterbar";
const CONFIG_FILE_NAME: &str = "clusterbar.toml";
const CONFIG_ENV_VAR: &str = "CLUSTERBAR_CONFIG";
const DEFAULT_PORT: u16 = 22;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Settings as they may appear in the config file; every key is optional
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub refresh_interval_secs: Option<u64>,
    pub command_timeout_secs: Option<u64>,
    pub show_all_users: Option<bool>,
    pub no_color: Option<bool>,
}

/// Values given on the command line, which take precedence over the file
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub refresh_interval_secs: Option<u64>,
    pub command_timeout_secs: Option<u64>,
    pub show_all_users: bool,
    pub no_color: bool,
    pub local: bool,
}

/// How commands reach the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    Ssh {
        host: String,
        port: u16,
        identity_file: Option<PathBuf>,
    },
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub connection: Connection,
    /// Remote login name, and whose jobs are shown unless `show_all_users` is set
    pub user: String,
    pub refresh_interval: Duration,
    pub command_timeout: Duration,
    pub show_all_users: bool,
    pub no_color: bool,
}

/// Loads the config file (if any) and merges it with the command line
pub fn load(explicit_path: Option<&Path>, overrides: Overrides) -> Result<Config, String> {
    let file = match config_path(explicit_path) {
        Some(path) if path.exists() => read_file_config(&path)?,
        Some(path) if explicit_path.is_some() => {
            return Err(format!("Config file {} does not exist", path.display()));
        }
        _ => FileConfig::default(),
    };
    resolve(file, overrides, current_username)
}

fn config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let config_home = env::var_os("XDG_CONFIG_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(config_home.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn read_file_config(path: &Path) -> Result<FileConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
    parse_file_config(&contents).map_err(|e| format!("Invalid config file {}: {}", path.display(), e))
}

fn parse_file_config(contents: &str) -> Result<FileConfig, toml::de::Error> {
    toml::from_str(contents)
}

fn current_username() -> Option<String> {
    users::get_current_username().map(|name| name.to_string_lossy().into_owned())
}

fn resolve(
    file: FileConfig,
    overrides: Overrides,
    default_user: impl FnOnce() -> Option<String>,
) -> Result<Config, String> {
    let connection = if overrides.local {
        Connection::Local
    } else {
        let host = overrides
            .host
            .or(file.host)
            .filter(|host| !host.trim().is_empty())
            .ok_or_else(|| {
                "No cluster host configured. Pass --host, set `host` in the config file, or use --local.".to_string()
            })?;
        Connection::Ssh {
            host,
            port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
            identity_file: overrides.identity_file.or(file.identity_file),
        }
    };

    let user = overrides
        .user
        .or(file.user)
        .or_else(default_user)
        .ok_or_else(|| "Could not determine the user name; pass --user.".to_string())?;

    let refresh_interval_secs = overrides
        .refresh_interval_secs
        .or(file.refresh_interval_secs)
        .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);
    if refresh_interval_secs == 0 {
        return Err("The refresh interval must be at least one second.".to_string());
    }

    let command_timeout_secs = overrides
        .command_timeout_secs
        .or(file.command_timeout_secs)
        .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS);

    Ok(Config {
        connection,
        user,
        refresh_interval: Duration::from_secs(refresh_interval_secs),
        command_timeout: Duration::from_secs(command_timeout_secs),
        show_all_users: overrides.show_all_users || file.show_all_users.unwrap_or(false),
        no_color: overrides.no_color || file.no_color.unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_user() -> Option<String> {
        None
    }

    fn os_user() -> Option<String> {
        Some("osuser".to_string())
    }

    #[test]
    fn file_values_fill_in_defaults() {
        let file = parse_file_config(
            r#"
host = "login.cluster.example"
port = 2222
identity_file = "/home/bob/.ssh/id_ed25519"
refresh_interval_secs = 30
show_all_users = true
"#,
        )
        .unwrap();

        let config = resolve(file, Overrides::default(), os_user).unwrap();
        assert_eq!(
            config.connection,
            Connection::Ssh {
                host: "login.cluster.example".to_string(),
                port: 2222,
                identity_file: Some(PathBuf::from("/home/bob/.ssh/id_ed25519")),
            }
        );
        assert_eq!(config.user, "osuser");
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.command_timeout, Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS));
        assert!(config.show_all_users);
        assert!(!config.no_color);
    }

    #[test]
    fn command_line_wins_over_file() {
        let file = FileConfig {
            host: Some("file-host".to_string()),
            port: Some(2222),
            user: Some("fileuser".to_string()),
            ..Default::default()
        };
        let overrides = Overrides {
            host: Some("cli-host".to_string()),
            user: Some("cliuser".to_string()),
            ..Default::default()
        };

        let config = resolve(file, overrides, os_user).unwrap();
        assert_eq!(
            config.connection,
            Connection::Ssh {
                host: "cli-host".to_string(),
                port: 2222,
                identity_file: None,
            }
        );
        assert_eq!(config.user, "cliuser");
    }

    #[test]
    fn defaults() {
        let overrides = Overrides {
            host: Some("h".to_string()),
            ..Default::default()
        };
        let config = resolve(FileConfig::default(), overrides, os_user).unwrap();
        assert_eq!(
            config.connection,
            Connection::Ssh {
                host: "h".to_string(),
                port: DEFAULT_PORT,
                identity_file: None,
            }
        );
        assert_eq!(
            config.refresh_interval,
            Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS)
        );
    }

    #[test]
    fn missing_host_is_an_error_unless_local() {
        assert!(resolve(FileConfig::default(), Overrides::default(), os_user).is_err());

        let overrides = Overrides {
            local: true,
            ..Default::default()
        };
        let config = resolve(FileConfig::default(), overrides, os_user).unwrap();
        assert_eq!(config.connection, Connection::Local);
    }

    #[test]
    fn missing_user_is_an_error() {
        let overrides = Overrides {
            local: true,
            ..Default::default()
        };
        assert!(resolve(FileConfig::default(), overrides, no_user).is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let overrides = Overrides {
            local: true,
            refresh_interval_secs: Some(0),
            ..Default::default()
        };
        assert!(resolve(FileConfig::default(), overrides, os_user).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_file_config("hostname = \"x\"").is_err());
    }
}
