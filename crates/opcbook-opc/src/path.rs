//! Part-name and relationship-target path helpers
//!
//! Part names are stored the way they appear inside the ZIP container:
//! forward slashes, no leading `/`, no `.` or `..` segments.

use crate::error::{OpcError, OpcResult};

/// Name of the relationships part owned by the package root
pub const ROOT_RELS: &str = "_rels/.rels";

/// Name of the content types stream
pub const CONTENT_TYPES: &str = "[Content_Types].xml";

/// Normalize a part name, rejecting names that resolve to nothing or to a
/// directory.
pub fn normalize_part_name(name: &str) -> OpcResult<String> {
    let normalized = normalize(&name.replace('\\', "/"));
    if normalized.is_empty() || name.ends_with('/') {
        return Err(OpcError::InvalidPartName(name.to_string()));
    }
    Ok(normalized)
}

/// Normalize without validation; used for lookups
pub(crate) fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

/// Resolve a relationship target against its source part.
///
/// `source` is `None` for relationships owned by the package root.
pub fn resolve_target(source: Option<&str>, target: &str) -> String {
    // Part names never carry fragments
    let target = target.split('#').next().unwrap_or(target);
    if target.is_empty() {
        return source.map(normalize).unwrap_or_default();
    }
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute);
    }

    let base_dir = source
        .and_then(|s| s.rsplit_once('/'))
        .map(|(dir, _)| dir)
        .unwrap_or("");
    normalize(&format!("{base_dir}/{target}"))
}

/// Express `target_part` relative to the directory of `source`.
pub fn relative_target(source: Option<&str>, target_part: &str) -> String {
    let base: Vec<&str> = match source.and_then(|s| s.rsplit_once('/')) {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target: Vec<&str> = target_part.split('/').collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<&str> = vec![".."; base.len() - common];
    segments.extend_from_slice(&target[common..]);
    segments.join("/")
}

/// Name of the relationships part for `owner` (`None` = package root)
pub fn rels_part_name(owner: Option<&str>) -> String {
    match owner {
        None => ROOT_RELS.to_string(),
        Some(part) => match part.rsplit_once('/') {
            Some((dir, file_name)) => format!("{dir}/_rels/{file_name}.rels"),
            None => format!("_rels/{part}.rels"),
        },
    }
}

/// Inverse of [`rels_part_name`].
///
/// Returns `None` when `name` is not a relationships part, `Some(None)` for
/// the root relationships and `Some(Some(part))` otherwise.
pub fn rels_owner(name: &str) -> Option<Option<String>> {
    if name == ROOT_RELS {
        return Some(None);
    }
    let file_name = name.strip_suffix(".rels")?;
    let (dir, file) = file_name.rsplit_once("/_rels/").or_else(|| {
        file_name
            .strip_prefix("_rels/")
            .map(|file| ("", file))
    })?;
    if file.is_empty() || file.contains('/') {
        return None;
    }
    if dir.is_empty() {
        Some(Some(file.to_string()))
    } else {
        Some(Some(format!("{dir}/{file}")))
    }
}

/// Lowercase file extension of a part name
pub fn extension(name: &str) -> Option<String> {
    let file = name.rsplit('/').next().unwrap_or(name);
    file.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}
