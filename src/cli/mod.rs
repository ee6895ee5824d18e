mod logs;
mod models;
mod root;
mod run;
mod sessions;

pub use logs::log_file_path;
pub use root::Cli;
