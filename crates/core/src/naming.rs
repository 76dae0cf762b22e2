use crate::dataset::{Dataset, DatasetError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ファイル名の部品に使う列 (0始まり)。`None` はその列を使わない。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSelection {
    pub first: Option<usize>,
    pub second: Option<usize>,
}

impl ColumnSelection {
    pub fn new(first: Option<usize>, second: Option<usize>) -> Self {
        Self { first, second }
    }
}

/// 選択列から取り出した1行分の値。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowValues {
    pub first: Option<String>,
    pub second: Option<String>,
}

impl RowValues {
    pub fn from_row(
        dataset: &Dataset,
        row: usize,
        columns: ColumnSelection,
    ) -> Result<Self, DatasetError> {
        let first = columns
            .first
            .map(|col| dataset.value(row, col).map(str::to_string))
            .transpose()?;
        let second = columns
            .second
            .map(|col| dataset.value(row, col).map(str::to_string))
            .transpose()?;
        Ok(Self { first, second })
    }
}

/// `値1[_値2]拡張子` を組み立てる。ファイル名として使えない文字はそのまま残る。
pub fn generate_name(first: Option<&str>, second: Option<&str>, extension_with_dot: &str) -> String {
    let mut name = first.unwrap_or_default().to_string();
    if let Some(second) = second {
        name.push('_');
        name.push_str(second);
    }
    name.push_str(extension_with_dot);
    name
}

pub fn generate_name_for(values: &RowValues, extension_with_dot: &str) -> String {
    generate_name(
        values.first.as_deref(),
        values.second.as_deref(),
        extension_with_dot,
    )
}

/// 先頭のドットは拡張子とみなさない (`.bashrc` は拡張子なし)。
pub fn extension_with_dot(path: &Path) -> String {
    path.extension()
        .map(|v| format!(".{}", v.to_string_lossy()))
        .unwrap_or_default()
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
