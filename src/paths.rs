//! Flat-path helpers for the derived folder tree.
//!
//! The catalog stores each file's containing folder as a plain string
//! (`subpath`, `"."` for the project root). Folders are never materialized;
//! everything here derives them from the set of subpaths on demand.

use std::collections::BTreeSet;

pub const ROOT: &str = ".";

pub fn first_segment(path: &str) -> &str {
    path.split('/').next().unwrap_or(path)
}

pub fn depth(path: &str) -> usize {
    path.split('/').count()
}

/// Keeps at most `segments` leading path segments.
pub fn truncate_segments(path: &str, segments: usize) -> String {
    path.split('/')
        .take(segments)
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether `path` lies strictly below `folder`, at any depth. Mirrors the
/// pattern `^folder(/[^/]+)+$`: at least one extra segment, none of them
/// empty.
pub fn is_strictly_under(folder: &str, path: &str) -> bool {
    match path.strip_prefix(folder).and_then(|r| r.strip_prefix('/')) {
        Some(rest) => !rest.is_empty() && rest.split('/').all(|seg| !seg.is_empty()),
        None => false,
    }
}

/// Whether `path` is `folder` itself or exactly one segment below it. Mirrors
/// `^folder(/[^/]+)?$`, one level only, matching the narrower scope folder
/// deletion has always had.
pub fn matches_one_level(folder: &str, path: &str) -> bool {
    if path == folder {
        return true;
    }
    match path.strip_prefix(folder).and_then(|r| r.strip_prefix('/')) {
        Some(rest) => !rest.is_empty() && !rest.contains('/'),
        None => false,
    }
}

/// The distinct immediate child folders of `folder`, derived from the full set
/// of subpaths in a project. Deeper nesting collapses into the nearest child:
/// at root, only the first segment of each non-root subpath survives; below
/// root, matching subpaths are cut to one segment past `folder`.
pub fn resolve_children(subpaths: &[String], folder: &str) -> Vec<String> {
    let children: BTreeSet<String> = if folder == ROOT {
        subpaths
            .iter()
            .filter(|p| p.as_str() != ROOT)
            .map(|p| first_segment(p).to_string())
            .collect()
    } else {
        let keep = depth(folder) + 1;
        subpaths
            .iter()
            .filter(|p| is_strictly_under(folder, p))
            .map(|p| truncate_segments(p, keep))
            .collect()
    };
    children.into_iter().collect()
}
