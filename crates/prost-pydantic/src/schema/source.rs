use std::collections::HashMap;

use prost_types::SourceCodeInfo;
use prost_types::source_code_info::Location as ProtoLocation;

use super::model::Comments;
use crate::error::SourceSpan;

// Field numbers used to build `SourceCodeInfo` paths.
pub(crate) const FILE_MESSAGE: i32 = 4;
pub(crate) const FILE_ENUM: i32 = 5;
pub(crate) const FILE_SERVICE: i32 = 6;
pub(crate) const FILE_SYNTAX: i32 = 12;
pub(crate) const MESSAGE_FIELD: i32 = 2;
pub(crate) const MESSAGE_NESTED: i32 = 3;
pub(crate) const MESSAGE_ENUM: i32 = 4;
pub(crate) const ENUM_VALUE: i32 = 2;
pub(crate) const SERVICE_METHOD: i32 = 2;

/// Path-keyed view over a file's `SourceCodeInfo`.
pub(crate) struct SourceInfo<'a> {
    locations: HashMap<&'a [i32], &'a ProtoLocation>,
}

impl<'a> SourceInfo<'a> {
    pub fn new(info: Option<&'a SourceCodeInfo>) -> Self {
        let mut locations = HashMap::new();
        for location in info.map(|i| i.location.as_slice()).unwrap_or_default() {
            // The first location recorded for a path carries its comments.
            locations
                .entry(location.path.as_slice())
                .or_insert(location);
        }
        Self { locations }
    }

    pub fn span(&self, path: &[i32]) -> Option<SourceSpan> {
        self.locations
            .get(path)
            .and_then(|l| SourceSpan::from_proto(&l.span))
    }

    pub fn comments(&self, path: &[i32]) -> Comments {
        let Some(location) = self.locations.get(path) else {
            return Comments::default();
        };
        Comments {
            leading: comment_lines(location.leading_comments.as_deref()),
            trailing: comment_lines(location.trailing_comments.as_deref()),
        }
    }
}

/// Append `[kind, index]` to a parent path.
pub(crate) fn child_path(parent: &[i32], kind: i32, index: usize) -> Vec<i32> {
    let mut path = Vec::with_capacity(parent.len() + 2);
    path.extend_from_slice(parent);
    path.push(kind);
    path.push(i32::try_from(index).unwrap_or(i32::MAX));
    path
}

fn comment_lines(comment: Option<&str>) -> Vec<String> {
    match comment.map(str::trim) {
        None | Some("") => Vec::new(),
        Some(text) => text.lines().map(|line| line.trim().to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use prost_types::SourceCodeInfo;
    use prost_types::source_code_info::Location;

    use super::{FILE_MESSAGE, MESSAGE_FIELD, SourceInfo, child_path};
    use crate::error::SourceSpan;

    fn location(path: Vec<i32>, span: Vec<i32>, leading: Option<&str>) -> Location {
        Location {
            path,
            span,
            leading_comments: leading.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn comments_are_split_into_trimmed_lines() {
        let info = SourceCodeInfo {
            location: vec![location(
                vec![4, 0],
                vec![3, 0, 6, 1],
                Some(" A user account.\n  Second line.\n"),
            )],
        };
        let source = SourceInfo::new(Some(&info));

        let comments = source.comments(&[4, 0]);
        assert_eq!(comments.leading, vec!["A user account.", "Second line."]);
        assert!(comments.trailing.is_empty());
        assert_eq!(
            source.span(&[4, 0]),
            Some(SourceSpan { line: 4, column: 1 })
        );
    }

    #[test]
    fn missing_paths_and_missing_info_are_empty() {
        let source = SourceInfo::new(None);
        assert_eq!(source.comments(&[4, 0]).leading, Vec::<String>::new());
        assert_eq!(source.span(&[4, 0]), None);
    }

    #[test]
    fn child_path_appends_kind_and_index() {
        let message = child_path(&[], FILE_MESSAGE, 2);
        assert_eq!(message, vec![4, 2]);
        assert_eq!(child_path(&message, MESSAGE_FIELD, 1), vec![4, 2, 2, 1]);
    }
}
