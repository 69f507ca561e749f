//! Shared position conversion helpers.
//!
//! Tree-sitter positions are zero-based in both dimensions. The editor
//! overlay contract uses one-based lines with zero-based columns, so the
//! conversion lives in one place.

/// Converts a Tree-sitter point to a one-based line and zero-based column.
#[must_use]
pub(crate) fn point_to_location(pos: tree_sitter::Point) -> (u32, u32) {
    // Line/column numbers will realistically never exceed u32::MAX.
    let line = u32::try_from(pos.row.saturating_add(1)).unwrap_or(u32::MAX);
    let column = u32::try_from(pos.column).unwrap_or(u32::MAX);
    (line, column)
}
