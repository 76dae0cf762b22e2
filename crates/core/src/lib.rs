mod collision;
mod config;
mod dataset;
mod naming;
mod planner;
mod renamer;

pub use collision::resolve_collision;
pub use config::{
    app_paths, column_to_index, index_to_column, load_config, load_config_from, save_config_to,
    update_config_at, AppConfig, AppPaths,
};
pub use dataset::{is_spreadsheet, load_dataset, Dataset, DatasetError, DatasetSummary};
pub use naming::{
    extension_with_dot, file_name_of, generate_name, generate_name_for, ColumnSelection, RowValues,
};
pub use planner::{collect_files, first_spreadsheet, preview_names, CollectStats, PreviewRow};
pub use renamer::{
    check_preconditions, copy_with_metadata, rename_files, BatchReport, BatchRequest, Outcome,
    PreconditionError, RowSource,
};
