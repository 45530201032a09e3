use dotenv::dotenv;
use nix::sys::stat::Mode;
use rustyline::EditMode;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

/// `>` 新建文件时的默认权限，实际还会经过 umask
const DEFAULT_REDIRECT_MODE: u32 = 0o644;

pub struct Config {
    pub name: String,
    pub config_dir: PathBuf,
    pub theme: String,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
    pub redirect_mode: Mode,
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/tinysh")
        } else {
            env::temp_dir().join("tinysh")
        }
    }

    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from(env!("CARGO_PKG_NAME")),
            theme: String::from("default"),
            history_file: config_dir.join(".tinysh_history"),
            editor_mode: String::from("vi"),
            logger_level: String::from("info"),
            logger_dir: config_dir.join("logs"),
            redirect_mode: Mode::from_bits_truncate(DEFAULT_REDIRECT_MODE as libc::mode_t),
            config_dir,
        }
    }

    pub fn new() -> io::Result<Self> {
        // 优先加载环境变量文件
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        if let Ok(theme) = env::var("TINYSH_THEME") {
            config.theme = theme;
        }

        if let Ok(editor) = env::var("TINYSH_EDITOR") {
            config.editor_mode = editor;
        }

        if let Ok(history) = env::var("TINYSH_HISTORY") {
            config.history_file = PathBuf::from(history);
        }

        if let Ok(level) = env::var("TINYSH_LOG_LEVEL") {
            config.logger_level = level;
        }

        if let Ok(dir) = env::var("TINYSH_LOG_DIR") {
            config.logger_dir = PathBuf::from(dir);
        }

        if let Ok(mode) = env::var("TINYSH_REDIRECT_MODE") {
            config.redirect_mode = parse_mode(&mode).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("TINYSH_REDIRECT_MODE is not an octal mode: {}", mode),
                )
            })?;
        }

        // 确保历史文件目录存在
        if let Some(parent) = config.history_file.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(config)
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "emacs" => EditMode::Emacs,
            _ => EditMode::Vi,
        }
    }
}

/// 解析八进制权限，如 `644` 或 `0o600`
fn parse_mode(value: &str) -> Option<Mode> {
    let digits = value.trim().trim_start_matches("0o");
    let bits = u32::from_str_radix(digits, 8).ok()?;
    if bits > 0o7777 {
        return None;
    }
    Some(Mode::from_bits_truncate(bits as libc::mode_t))
}
