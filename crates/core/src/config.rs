use crate::naming::ColumnSelection;
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".rename_tool_config.json";
const UNSET_COLUMN: i64 = -1;

/// 前回の選択内容。列番号は0始まりで、未選択は -1。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_folder: String,
    pub col1_index: i64,
    pub col2_index: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_folder: String::new(),
            col1_index: UNSET_COLUMN,
            col2_index: UNSET_COLUMN,
        }
    }
}

impl AppConfig {
    pub fn output_folder(&self) -> Option<PathBuf> {
        let trimmed = self.output_folder.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }

    /// 空のパスでは既存の設定を消さない。
    pub fn set_output_folder(&mut self, folder: &Path) {
        let folder = folder.to_string_lossy();
        if !folder.trim().is_empty() {
            self.output_folder = folder.to_string();
        }
    }

    pub fn columns(&self) -> ColumnSelection {
        ColumnSelection::new(index_to_column(self.col1_index), index_to_column(self.col2_index))
    }

    pub fn set_columns(&mut self, columns: ColumnSelection) {
        self.col1_index = column_to_index(columns.first);
        self.col2_index = column_to_index(columns.second);
    }
}

pub fn index_to_column(index: i64) -> Option<usize> {
    usize::try_from(index).ok()
}

pub fn column_to_index(column: Option<usize>) -> i64 {
    column
        .and_then(|c| i64::try_from(c).ok())
        .unwrap_or(UNSET_COLUMN)
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let base = BaseDirs::new().context("ホームディレクトリを取得できませんでした")?;
    Ok(AppPaths {
        config_path: base.home_dir().join(CONFIG_FILE_NAME),
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    Ok(load_config_from(&paths.config_path))
}

/// 読めない・壊れている設定ファイルは既定値として扱う。
/// ファイルが無ければ既定値で作成する (失敗しても読み込みは続ける)。
pub fn load_config_from(path: &Path) -> AppConfig {
    match try_load(path) {
        Ok(Some(config)) => config,
        Ok(None) => {
            let config = AppConfig::default();
            if let Err(err) = save_config_to(path, &config) {
                log::warn!("既定の設定ファイルを作成できませんでした: {err:#}");
            }
            config
        }
        Err(err) => {
            log::warn!("設定ファイルを既定値で置き換えます: {err:#}");
            AppConfig::default()
        }
    }
}

fn try_load(path: &Path) -> Result<Option<AppConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("設定ファイルを読めませんでした: {}", path.display()))?;
    let config = serde_json::from_str::<AppConfig>(&raw)
        .with_context(|| format!("設定ファイルのパースに失敗しました: {}", path.display()))?;
    Ok(Some(config))
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            format!("設定ディレクトリを作成できませんでした: {}", parent.display())
        })?;
    }
    let body = serde_json::to_string_pretty(config).context("設定のシリアライズに失敗しました")?;
    fs::write(path, body)
        .with_context(|| format!("設定ファイルを書き込めませんでした: {}", path.display()))?;
    Ok(())
}

/// ファイル上の最新値を読み直してから変更を適用し、書き戻す。
pub fn update_config_at<F>(path: &Path, update: F) -> Result<AppConfig>
where
    F: FnOnce(&mut AppConfig),
{
    let mut config = load_config_from(path);
    update(&mut config);
    save_config_to(path, &config)?;
    log::debug!("設定を保存しました: {}", path.display());
    Ok(config)
}
