//! Map a (name, parent) pair to a Drive folder id, creating the folder if absent.

use log::{debug, warn};

use crate::client::DriveApi;
use crate::error::Result;

/// Return the id of the folder called `name` under `parent_id`, creating it
/// when no such folder exists.
///
/// When several folders match, the earliest-created one wins. Lookup and
/// creation are not atomic: two concurrent callers can both miss and both
/// create.
pub async fn resolve_or_create_folder<A>(
    api: &A,
    name: &str,
    parent_id: Option<&str>,
) -> Result<String>
where
    A: DriveApi + ?Sized,
{
    let matches = api.find_folders(name, parent_id).await?;

    if let Some(first) = matches.first() {
        if matches.len() > 1 {
            warn!(
                "{} folders named '{}' under {}; using the earliest ({})",
                matches.len(),
                name,
                parent_id.unwrap_or("root"),
                first.id
            );
        }
        debug!("Reusing folder '{}' ({})", name, first.id);
        return Ok(first.id.clone());
    }

    let folder = api.create_folder(name, parent_id).await?;
    Ok(folder.id)
}
