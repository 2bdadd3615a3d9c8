mod get_file;
mod list_files;

pub use get_file::{DownloadFileUseCase, GetFileUseCase};
pub use list_files::{ListFilesUseCase, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
