use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATE_FORMAT: &str = "%Y/%m";
pub const DEFAULT_PARTIAL_HASH_BYTES: usize = 64 * 1024;

const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    ("images", &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp", ".ico"]),
    ("videos", &[".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v"]),
    ("audio", &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a", ".wma"]),
    ("documents", &[".pdf", ".doc", ".docx", ".txt", ".rtf", ".odt"]),
    ("spreadsheets", &[".xls", ".xlsx", ".csv", ".ods"]),
    ("presentations", &[".ppt", ".pptx", ".odp"]),
    ("archives", &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2"]),
    ("code", &[".py", ".js", ".java", ".c", ".cpp", ".h", ".html", ".css", ".sh"]),
    ("data", &[".json", ".xml", ".yaml", ".yml", ".sql", ".db"]),
];

/// A named bucket of extensions. Extensions are stored lowercase with a leading dot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub extensions: Vec<String>,
}

impl Category {
    pub fn new<S: AsRef<str>>(name: &str, extensions: &[S]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|e| normalize_extension(e.as_ref())).collect(),
        }
    }
}

/// Ordered category table. Lookup walks categories in declaration order, so the
/// first category listing an extension wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    categories: Vec<Category>,
}

impl CategoryTable {
    pub fn new(categories: Vec<Category>) -> Self {
        let categories = categories
            .into_iter()
            .map(|c| Category::new(&c.name, &c.extensions))
            .collect();
        Self { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Category for a file path, or None when its extension is not listed.
    pub fn category_for(&self, path: &Path) -> Option<&str> {
        let ext = path.extension()?.to_str()?;
        let ext = normalize_extension(ext);
        self.categories
            .iter()
            .find(|c| c.extensions.iter().any(|e| *e == ext))
            .map(|c| c.name.as_str())
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|(name, exts)| Category::new(name, exts))
                .collect(),
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    let lower = ext.trim().to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Glob patterns excluded from duplicate scans.
    pub ignore_patterns: Vec<String>,
    pub date_format: String,
    pub partial_hash_bytes: usize,
    pub trash_dir: PathBuf,
    /// Overrides the default category table when present. Kept last so it
    /// serializes as trailing `[[categories]]` tables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            partial_hash_bytes: DEFAULT_PARTIAL_HASH_BYTES,
            trash_dir: default_trash_dir(),
            categories: None,
        }
    }
}

impl AppConfig {
    pub fn category_table(&self) -> CategoryTable {
        match &self.categories {
            Some(categories) => CategoryTable::new(categories.clone()),
            None => CategoryTable::default(),
        }
    }
}

fn default_trash_dir() -> PathBuf {
    match env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".tfm").join("trash"),
        None => PathBuf::from(".tfm").join("trash"),
    }
}

/// Load `Config.toml` from the working directory (optional) with `TFM_*`
/// environment overrides.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("TFM").try_parsing(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

pub fn load_configuration_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::from(path).required(true))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
