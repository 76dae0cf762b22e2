use crate::dataset::{is_spreadsheet, Dataset};
use crate::naming::{extension_with_dot, file_name_of, generate_name_for, ColumnSelection, RowValues};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewRow {
    pub original_name: String,
    pub first_value: Option<String>,
    pub second_value: Option<String>,
    pub new_name: String,
}

/// 入力ファイルと同じ位置の行から新しいファイル名を試算する。
/// 表の行数を超えたファイルは対象外。出力先の重複は考慮しない。
pub fn preview_names(
    dataset: &Dataset,
    files: &[PathBuf],
    columns: ColumnSelection,
) -> Result<Vec<PreviewRow>> {
    files
        .iter()
        .take(dataset.len())
        .enumerate()
        .map(|(index, path)| -> Result<PreviewRow> {
            let values = RowValues::from_row(dataset, index, columns).with_context(|| {
                format!("プレビューを作成できませんでした: {}", path.display())
            })?;
            let new_name = generate_name_for(&values, &extension_with_dot(path));
            Ok(PreviewRow {
                original_name: file_name_of(path),
                first_value: values.first,
                second_value: values.second,
                new_name,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectStats {
    pub scanned_files: usize,
    pub skipped_hidden: usize,
}

pub fn collect_files(
    root: &Path,
    recursive: bool,
    include_hidden: bool,
) -> Result<(Vec<PathBuf>, CollectStats)> {
    if !root.is_dir() {
        anyhow::bail!("入力フォルダが存在しません: {}", root.display());
    }

    let mut stats = CollectStats::default();
    let mut out = Vec::new();

    if recursive {
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("フォルダ走査に失敗しました: {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            stats.scanned_files += 1;
            if is_hidden(entry.path()) && !include_hidden {
                stats.skipped_hidden += 1;
                continue;
            }
            out.push(entry.into_path());
        }
    } else {
        for entry in fs::read_dir(root)
            .with_context(|| format!("フォルダを読めませんでした: {}", root.display()))?
        {
            let entry =
                entry.with_context(|| format!("エントリ読み取り失敗: {}", root.display()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            stats.scanned_files += 1;
            if is_hidden(&path) && !include_hidden {
                stats.skipped_hidden += 1;
                continue;
            }
            out.push(path);
        }
        out.sort();
    }

    log::debug!(
        "入力ファイル {}件 (隠しファイル除外 {}件)",
        out.len(),
        stats.skipped_hidden
    );
    Ok((out, stats))
}

pub fn first_spreadsheet(files: &[PathBuf]) -> Option<&Path> {
    files
        .iter()
        .map(PathBuf::as_path)
        .find(|path| is_spreadsheet(path))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
