use crate::collision::resolve_collision;
use crate::dataset::{load_dataset, Dataset};
use crate::naming::{extension_with_dot, file_name_of, generate_name_for, ColumnSelection, RowValues};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 各ファイルの列値をどこから取るか。
#[derive(Debug, Clone, Copy)]
pub enum RowSource<'a> {
    /// 共通の表から、入力リスト上の位置と同じ行を使う。
    Shared(&'a Dataset),
    /// 各入力ファイル自体を表として読み、先頭データ行を使う。
    PerFile,
}

#[derive(Debug, Clone)]
pub struct BatchRequest<'a> {
    pub row_source: Option<RowSource<'a>>,
    pub source_files: Vec<PathBuf>,
    pub output_folder: Option<PathBuf>,
    pub columns: ColumnSelection,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("先に表ファイルを選択してください")]
    NoDataset,
    #[error("先に出力フォルダを選択してください")]
    NoOutputFolder,
    #[error("先にリネームするファイルを選択してください")]
    NoFiles,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Renamed {
        source: PathBuf,
        original_name: String,
        new_name: String,
        target: PathBuf,
    },
    Failed {
        source: PathBuf,
        error: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Renamed { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Renamed {
                original_name,
                new_name,
                ..
            } => write!(f, "リネーム: {} -> {}", original_name, new_name),
            Outcome::Failed { source, error } => {
                write!(f, "ファイル {} の処理に失敗しました: {}", source.display(), error)
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub entries: Vec<Outcome>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    fn push(&mut self, outcome: Outcome) {
        if outcome.is_success() {
            self.succeeded += 1;
            log::info!("{outcome}");
        } else {
            self.failed += 1;
            log::warn!("{outcome}");
        }
        self.entries.push(outcome);
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}

pub fn check_preconditions(request: &BatchRequest<'_>) -> Result<(), PreconditionError> {
    validate(request).map(|_| ())
}

fn validate<'a, 'r>(
    request: &'r BatchRequest<'a>,
) -> Result<(RowSource<'a>, &'r Path), PreconditionError> {
    let row_source = request.row_source.ok_or(PreconditionError::NoDataset)?;
    let output_folder = request
        .output_folder
        .as_deref()
        .filter(|folder| !folder.as_os_str().is_empty())
        .ok_or(PreconditionError::NoOutputFolder)?;
    if request.source_files.is_empty() {
        return Err(PreconditionError::NoFiles);
    }
    Ok((row_source, output_folder))
}

/// 入力ファイルを1件ずつ出力フォルダへコピーする。
///
/// 前提条件を満たさない場合と出力フォルダを作れない場合だけ `Err` を返す。
/// 個々のファイルの失敗は `Outcome::Failed` として記録して処理を続ける。
pub fn rename_files(request: &BatchRequest<'_>) -> Result<BatchReport> {
    let (row_source, output_folder) = validate(request)?;

    fs::create_dir_all(output_folder).with_context(|| {
        format!(
            "出力フォルダを作成できませんでした: {}",
            output_folder.display()
        )
    })?;

    let mut report = BatchReport::default();
    for (index, source) in request.source_files.iter().enumerate() {
        let outcome = match process_file(row_source, index, source, output_folder, request.columns)
        {
            Ok((original_name, new_name, target)) => Outcome::Renamed {
                source: source.clone(),
                original_name,
                new_name,
                target,
            },
            Err(err) => Outcome::Failed {
                source: source.clone(),
                error: format!("{err:#}"),
            },
        };
        report.push(outcome);
    }

    log::info!(
        "処理完了: 成功 {}件 / 失敗 {}件",
        report.succeeded,
        report.failed
    );
    Ok(report)
}

fn process_file(
    row_source: RowSource<'_>,
    index: usize,
    source: &Path,
    output_folder: &Path,
    columns: ColumnSelection,
) -> Result<(String, String, PathBuf)> {
    let original_name = file_name_of(source);
    let extension = extension_with_dot(source);

    let values = match row_source {
        RowSource::Shared(dataset) => RowValues::from_row(dataset, index, columns)?,
        RowSource::PerFile => {
            let dataset = load_dataset(source)?;
            RowValues::from_row(&dataset, 0, columns)?
        }
    };

    let candidate = generate_name_for(&values, &extension);
    let new_name = resolve_collision(output_folder, &candidate);
    let target = output_folder.join(&new_name);

    copy_with_metadata(source, &target)?;
    Ok((original_name, new_name, target))
}

/// 内容と権限をコピーしたうえで、更新日時とアクセス日時を元ファイルに合わせる。
pub fn copy_with_metadata(source: &Path, target: &Path) -> Result<u64> {
    let copied = fs::copy(source, target).with_context(|| {
        format!(
            "コピーに失敗しました: {} -> {}",
            source.display(),
            target.display()
        )
    })?;

    let metadata = fs::metadata(source)
        .with_context(|| format!("属性を読めませんでした: {}", source.display()))?;
    let mut times = FileTimes::new();
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }

    // 読み取り専用の属性がコピーされている場合は書き込みで開けない
    let file = File::options()
        .write(true)
        .open(target)
        .or_else(|_| File::open(target))
        .with_context(|| format!("コピー先を開けませんでした: {}", target.display()))?;
    file.set_times(times)
        .with_context(|| format!("日時を設定できませんでした: {}", target.display()))?;

    Ok(copied)
}
