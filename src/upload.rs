//! Upload one local file into a mirrored folder path.

use std::path::Path;

use log::info;

use crate::client::DriveApi;
use crate::error::Result;
use crate::models::FileMetadata;
use crate::walker::{ensure_path, relative_dir};

/// Recreate the directory part of `filepath` under `root_folder_id`, then
/// upload the file into the deepest folder.
///
/// Folders are resolved before the file is opened, so a failed upload leaves
/// the path in place; the next run finds it by lookup instead of recreating it.
pub async fn upload_into_path<A>(
    api: &A,
    filepath: &Path,
    root_folder_id: &str,
) -> Result<FileMetadata>
where
    A: DriveApi + ?Sized,
{
    let relative_dir = relative_dir(filepath);
    let leaf_folder_id = ensure_path(api, &relative_dir, root_folder_id).await?;
    info!("Uploading {} into folder {}", filepath.display(), leaf_folder_id);

    api.upload_file(filepath, &leaf_folder_id).await
}
