use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sheet_renamer_core::{
    app_paths, check_preconditions, collect_files, first_spreadsheet, index_to_column,
    load_config_from, load_dataset, preview_names, rename_files, update_config_at, AppConfig,
    BatchReport, BatchRequest, ColumnSelection, Dataset, PreviewRow, RowSource,
};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "sheet-renamer-cli")]
#[command(about = "表の列の値を使ってファイルを一括リネーム(コピー)します")]
struct Cli {
    /// 設定ファイルの場所 (既定: ~/.rename_tool_config.json)
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// 表の列一覧を表示する
    Columns(ColumnsArgs),
    /// 新しいファイル名を試算する (ファイルは変更しない)
    Preview(SelectionArgs),
    Rename(RenameArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ColumnsArgs {
    #[arg(long)]
    sheet: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output_format: OutputFormat,
}

#[derive(Debug, Args)]
struct SelectionArgs {
    /// 省略時は入力ファイル中の最初の表ファイルを使う
    #[arg(long)]
    sheet: Option<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
    /// 1つ目の列 (0始まり, -1で未選択)
    #[arg(long, allow_negative_numbers = true)]
    col1: Option<i64>,
    /// 2つ目の列 (0始まり, -1で未選択)
    #[arg(long, allow_negative_numbers = true)]
    col2: Option<i64>,
    #[arg(long)]
    input_dir: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    recursive: bool,
    #[arg(long, default_value_t = false)]
    include_hidden: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output_format: OutputFormat,
    files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct RenameArgs {
    #[command(flatten)]
    selection: SelectionArgs,
    /// 共通の表ではなく、各入力ファイル自体の先頭行から値を読む
    #[arg(long, default_value_t = false)]
    per_file: bool,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Set {
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, allow_negative_numbers = true)]
        col1: Option<i64>,
        #[arg(long, allow_negative_numbers = true)]
        col2: Option<i64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = match cli.config_file {
        Some(path) => path,
        None => app_paths()?.config_path,
    };

    match cli.command {
        Commands::Columns(args) => cmd_columns(args),
        Commands::Preview(args) => cmd_preview(&config_path, args),
        Commands::Rename(args) => cmd_rename(&config_path, args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(&config_path),
            ConfigAction::Set { output, col1, col2 } => {
                cmd_config_set(&config_path, output, col1, col2)
            }
        },
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn cmd_columns(args: ColumnsArgs) -> Result<()> {
    let summary = load_dataset(&args.sheet)?.summary();
    match args.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Table => {
            println!("{} ({}行)", args.sheet.display(), summary.rows);
            for label in &summary.labels {
                println!("  {label}");
            }
        }
    }
    Ok(())
}

/// コマンドライン指定と保存済みの設定を合わせた選択内容。
struct Selection {
    files: Vec<PathBuf>,
    sheet: Option<PathBuf>,
    output_folder: Option<PathBuf>,
    columns: ColumnSelection,
}

fn resolve_selection(args: &SelectionArgs, stored: &AppConfig) -> Result<Selection> {
    let mut files = args.files.clone();
    if let Some(dir) = args.input_dir.as_deref() {
        let (collected, stats) = collect_files(dir, args.recursive, args.include_hidden)?;
        log::info!(
            "{}: {}件中 {}件を対象にしました",
            dir.display(),
            stats.scanned_files,
            collected.len()
        );
        files.extend(collected);
    }

    let sheet = args
        .sheet
        .clone()
        .or_else(|| first_spreadsheet(&files).map(Path::to_path_buf));

    let stored_columns = stored.columns();
    let columns = ColumnSelection::new(
        args.col1.map_or(stored_columns.first, index_to_column),
        args.col2.map_or(stored_columns.second, index_to_column),
    );

    Ok(Selection {
        files,
        sheet,
        output_folder: args.output.clone().or_else(|| stored.output_folder()),
        columns,
    })
}

fn load_sheet(sheet: Option<&Path>) -> Result<Option<Dataset>> {
    let Some(sheet) = sheet else {
        return Ok(None);
    };
    let dataset = load_dataset(sheet)
        .with_context(|| format!("表の読み込みに失敗しました: {}", sheet.display()))?;
    eprintln!(
        "表を読み込みました: {} (列: {})",
        sheet.display(),
        dataset.column_labels().join(", ")
    );
    Ok(Some(dataset))
}

fn remember_selection(config_path: &Path, selection: &Selection) {
    let result = update_config_at(config_path, |config| {
        if let Some(folder) = selection.output_folder.as_deref() {
            config.set_output_folder(folder);
        }
        config.set_columns(selection.columns);
    });
    if let Err(err) = result {
        log::warn!("設定の保存に失敗しました: {err:#}");
    }
}

fn cmd_preview(config_path: &Path, args: SelectionArgs) -> Result<()> {
    let stored = load_config_from(config_path);
    let selection = resolve_selection(&args, &stored)?;
    let dataset = load_sheet(selection.sheet.as_deref())?;

    check_preconditions(&BatchRequest {
        row_source: dataset.as_ref().map(RowSource::Shared),
        source_files: selection.files.clone(),
        output_folder: selection.output_folder.clone(),
        columns: selection.columns,
    })?;
    remember_selection(config_path, &selection);

    let Some(dataset) = dataset else {
        return Ok(());
    };
    let rows = preview_names(&dataset, &selection.files, selection.columns)?;
    match args.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Table => print_preview(&rows),
    }

    if selection.files.len() > rows.len() {
        eprintln!(
            "表の行数が足りないため {}件はプレビュー対象外です",
            selection.files.len() - rows.len()
        );
    }
    Ok(())
}

fn cmd_rename(config_path: &Path, args: RenameArgs) -> Result<()> {
    let stored = load_config_from(config_path);
    let selection = resolve_selection(&args.selection, &stored)?;
    let dataset = if args.per_file {
        None
    } else {
        load_sheet(selection.sheet.as_deref())?
    };

    let row_source = if args.per_file {
        Some(RowSource::PerFile)
    } else {
        dataset.as_ref().map(RowSource::Shared)
    };
    let request = BatchRequest {
        row_source,
        source_files: selection.files.clone(),
        output_folder: selection.output_folder.clone(),
        columns: selection.columns,
    };

    check_preconditions(&request)?;
    remember_selection(config_path, &selection);

    let report = rename_files(&request)?;
    match args.selection.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print_report(&report),
    }
    eprintln!(
        "リネーム完了: 成功 {}件 / 失敗 {}件",
        report.succeeded, report.failed
    );
    Ok(())
}

fn cmd_config_show(config_path: &Path) -> Result<()> {
    let config = load_config_from(config_path);
    println!("設定ファイル: {}", config_path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_set(
    config_path: &Path,
    output: Option<PathBuf>,
    col1: Option<i64>,
    col2: Option<i64>,
) -> Result<()> {
    let config = update_config_at(config_path, |config| {
        if let Some(folder) = output.as_deref() {
            config.set_output_folder(folder);
        }
        let mut columns = config.columns();
        if let Some(col1) = col1 {
            columns.first = index_to_column(col1);
        }
        if let Some(col2) = col2 {
            columns.second = index_to_column(col2);
        }
        config.set_columns(columns);
    })?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn print_preview(rows: &[PreviewRow]) {
    println!("元ファイル名 | 列1の値 | 列2の値 | 新ファイル名");
    for row in rows {
        println!(
            "{} | {} | {} | {}",
            row.original_name,
            row.first_value.as_deref().unwrap_or_default(),
            row.second_value.as_deref().unwrap_or_default(),
            row.new_name
        );
    }
}

fn print_report(report: &BatchReport) {
    for line in report.log_lines() {
        println!("{line}");
    }
}
