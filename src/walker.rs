//! Mirror a local directory path as nested Drive folders.

use std::path::{Path, MAIN_SEPARATOR};

use log::debug;

use crate::client::DriveApi;
use crate::error::Result;
use crate::resolver::resolve_or_create_folder;

/// Directory part of `path`, as POSIX `dirname` computes it.
///
/// Everything before the last separator, with trailing separators removed
/// unless the whole head is separators. Empty when `path` has no separator.
pub fn relative_dir(path: &Path) -> String {
    let path = path.to_string_lossy();
    let head = match path.rfind(MAIN_SEPARATOR) {
        Some(i) => &path[..i + MAIN_SEPARATOR.len_utf8()],
        None => "",
    };

    if !head.is_empty() && !head.chars().all(|c| c == MAIN_SEPARATOR) {
        head.trim_end_matches(MAIN_SEPARATOR).to_string()
    } else {
        head.to_string()
    }
}

/// Make sure every segment of `relative_dir` exists as a folder chain below
/// `root_parent_id`, returning the id of the last one.
///
/// Segments are taken verbatim, so an empty segment (from a leading or
/// doubled separator) resolves a folder whose name is the empty string.
pub async fn ensure_path<A>(api: &A, relative_dir: &str, root_parent_id: &str) -> Result<String>
where
    A: DriveApi + ?Sized,
{
    if relative_dir.is_empty() {
        return Ok(root_parent_id.to_string());
    }

    let mut current_parent_id = root_parent_id.to_string();
    for segment in relative_dir.split(MAIN_SEPARATOR) {
        let folder_id =
            resolve_or_create_folder(api, segment, Some(current_parent_id.as_str())).await?;
        debug!("Segment '{}' -> {}", segment, folder_id);
        current_parent_id = folder_id;
    }

    Ok(current_parent_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(parts: &[&str]) -> String {
        parts.join(&MAIN_SEPARATOR.to_string())
    }

    #[test]
    fn test_relative_dir_nested() {
        let path = join(&["pr", "São José dos Pinhais", "arquivo.txt"]);
        assert_eq!(
            relative_dir(Path::new(&path)),
            join(&["pr", "São José dos Pinhais"])
        );
    }

    #[test]
    fn test_relative_dir_bare_file() {
        assert_eq!(relative_dir(Path::new("arquivo.txt")), "");
    }

    #[test]
    fn test_relative_dir_absolute() {
        let path = join(&["", "data", "arquivo.txt"]);
        assert_eq!(relative_dir(Path::new(&path)), join(&["", "data"]));

        let path = join(&["", "arquivo.txt"]);
        assert_eq!(relative_dir(Path::new(&path)), MAIN_SEPARATOR.to_string());
    }

    #[test]
    fn test_relative_dir_doubled_separator() {
        let path = join(&["pr", "", "", "arquivo.txt"]);
        assert_eq!(relative_dir(Path::new(&path)), "pr");
    }
}
