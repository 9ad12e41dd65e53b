pub mod file_operations;
pub mod time;

pub use file_operations::{delete_file, filter_files_older_than, list_files, move_file_safe};
