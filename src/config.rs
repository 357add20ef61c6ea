use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;

use crate::util::dates;
use crate::Error;

const CONFIG_FILE_NAME: &str = "tetris-scores.toml";
const CONFIG_PATH_VAR: &str = "TETRIS_SCORES_CONFIG";

#[derive(Debug, Deserialize, Clone)]
struct FileConfig {
    pub static_dir: String,
    pub server: FileServerConfig,
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
    pub log: FileLogConfig,
}

#[derive(Debug, Deserialize, Clone)]
struct FileServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
struct FileDatabaseConfig {
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
struct FileLogConfig {
    pub level: String,
    pub path: Option<String>,
    pub json_path: Option<String>,
    pub seq_endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardConfig {
    #[serde(default = "default_leaderboard_size")]
    pub size: usize,
    #[serde(default = "default_max_initials_len")]
    pub max_initials_len: usize,
    /// Treat a score of `0` as absent, the same as a missing `score` field.
    #[serde(default)]
    pub reject_zero_score: bool,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            size: default_leaderboard_size(),
            max_initials_len: default_max_initials_len(),
            reject_zero_score: false,
        }
    }
}

fn default_leaderboard_size() -> usize {
    10
}

fn default_max_initials_len() -> usize {
    3
}

fn default_max_connections() -> u32 {
    4
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub level: String,
    pub path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
    pub seq_endpoint: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub static_dir: PathBuf,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub leaderboard: LeaderboardConfig,
    pub log: LogConfig,
}

fn expand_tilde(path: &str) -> Result<PathBuf, Error> {
    if path.starts_with("~/") {
        let home = env::var("HOME")?;
        Ok(PathBuf::from(path.replacen("~", &home, 1)))
    } else {
        Ok(PathBuf::from(path))
    }
}

/// Loads the config named by `TETRIS_SCORES_CONFIG`, falling back to
/// `tetris-scores.toml` next to the executable.
pub fn load_config() -> Result<AppConfig, Error> {
    let config_path = match env::var_os(CONFIG_PATH_VAR) {
        Some(path) => PathBuf::from(path),
        None => {
            let exe_path = env::current_exe()?;
            match exe_path.parent() {
                Some(dir) => dir.join(CONFIG_FILE_NAME),
                _ => return Err("failed to determine executable directory".into()),
            }
        }
    };

    load_config_from(&config_path)
}

pub fn load_config_from(config_path: &Path) -> Result<AppConfig, Error> {
    if !config_path.exists() || !config_path.is_file() {
        return Err(format!(
            "Config file does not exist or is not a file: {}",
            config_path.display()
        )
        .into());
    }
    let s = fs::read_to_string(config_path)?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<AppConfig, Error> {
    let cfg: FileConfig = toml::from_str(s)?;

    let static_dir = expand_tilde(&cfg.static_dir)?;
    if !static_dir.is_dir() {
        return Err(format!("Static directory does not exist: {}", &cfg.static_dir).into());
    }

    Ok(AppConfig {
        static_dir,
        server: build_server_config(cfg.server)?,
        database: build_database_config(cfg.database)?,
        leaderboard: validate_leaderboard_config(cfg.leaderboard)?,
        log: build_log_config(cfg.log)?,
    })
}

fn build_server_config(file_server: FileServerConfig) -> Result<ServerConfig, Error> {
    let ip: IpAddr = file_server
        .host
        .parse()
        .map_err(|e| format!("Invalid server host {}: {}", &file_server.host, e))?;

    Ok(ServerConfig {
        addr: SocketAddr::new(ip, file_server.port),
        cors_origins: file_server.cors_origins,
    })
}

fn build_database_config(file_db: FileDatabaseConfig) -> Result<DatabaseConfig, Error> {
    let path = expand_tilde(&file_db.path)?;
    ensure_parent_exists(&path, "Database")?;
    if path.exists() && !path.is_file() {
        return Err(format!("Database path exists but is not a file: {}", &file_db.path).into());
    }
    if file_db.max_connections == 0 {
        return Err("database.max_connections must be at least 1".into());
    }

    Ok(DatabaseConfig {
        path,
        max_connections: file_db.max_connections,
    })
}

fn validate_leaderboard_config(cfg: LeaderboardConfig) -> Result<LeaderboardConfig, Error> {
    if cfg.size == 0 {
        return Err("leaderboard.size must be at least 1".into());
    }
    if cfg.max_initials_len == 0 {
        return Err("leaderboard.max_initials_len must be at least 1".into());
    }
    Ok(cfg)
}

fn build_log_config(file_log: FileLogConfig) -> Result<LogConfig, Error> {
    Ok(LogConfig {
        level: file_log.level,
        path: file_log.path.as_deref().map(build_log_path).transpose()?,
        json_path: file_log.json_path.as_deref().map(build_log_path).transpose()?,
        seq_endpoint: file_log.seq_endpoint,
    })
}

fn build_log_path(cfg_path: &str) -> Result<PathBuf, Error> {
    let path = log_file_replacements(cfg_path)?;
    ensure_parent_exists(&path, "Log file")?;
    if path.exists() && !path.is_file() {
        return Err(format!("Log path exists but is not a file: {}", cfg_path).into());
    }
    Ok(path)
}

fn ensure_parent_exists(path: &Path, what: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(format!("{} directory does not exist: {}", what, parent.display()).into());
        }
    }
    Ok(())
}

fn log_file_replacements(cfg_path: &str) -> Result<PathBuf, Error> {
    let date_str = dates::local_date_yyyy_mm_dd();
    let replaced = cfg_path.replace("{DATE}", &date_str);
    expand_tilde(&replaced)
}
