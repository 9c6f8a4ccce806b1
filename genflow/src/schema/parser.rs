//! Box-drawing tree listing parser.
//!
//! Accepts the output of `tree`-style tools as well as the ASCII variants
//! models tend to produce:
//!
//! ```text
//! src/
//! ├── components/
//! │   └── Button.tsx   # shared button
//! └── index.tsx
//! ```

use super::paths::has_extension;
use super::tree::{VirtualDirectory, VirtualDirectoryNode};
use crate::errors::SchemaError;

/// Branch markers and whether each one closes its sibling list.
const BRANCH_MARKERS: &[(&str, bool)] = &[
    ("├──", false),
    ("└──", true),
    ("|--", false),
    ("+--", false),
    ("`--", true),
    ("\\--", true),
];

const TAB_WIDTH: usize = 4;
const INDENT_WIDTH: usize = 4;

/// One significant line of a listing.
#[derive(Debug)]
struct Line<'a> {
    number: usize,
    /// Connector text before the branch marker, `None` for a root line.
    prefix: Option<&'a str>,
    is_last: bool,
    name: &'a str,
}

/// Parses a tree listing into a [`VirtualDirectory`].
///
/// Comments introduced by ` #` or ` //` are dropped, as are blank lines and
/// markdown fence lines. The first line without a branch marker is the root
/// and its indentation is stripped from every following line.
///
/// # Errors
///
/// Returns a [`SchemaError`] for an empty listing, an entry before the root,
/// a second root, an entry nested under a file, or a name used for both a
/// file and a directory in the same parent.
pub fn parse_tree(listing: &str) -> Result<VirtualDirectory, SchemaError> {
    let mut root: Option<VirtualDirectoryNode> = None;
    let mut root_indent = 0usize;
    // Directory names below the root, one per open level.
    let mut open: Vec<String> = Vec::new();
    // last[level] is true when the latest entry at that level used a closing marker.
    let mut last: Vec<bool> = vec![false];

    for (idx, raw) in listing.lines().enumerate() {
        let number = idx + 1;
        let stripped = strip_comment(raw).trim_end();
        if stripped.trim().is_empty() || stripped.trim_start().starts_with("```") {
            continue;
        }

        let Some(tree_root) = root.as_mut() else {
            let line = classify(number, stripped);
            if line.prefix.is_some() {
                return Err(SchemaError::MissingRoot {
                    line: number,
                    name: line.name.to_string(),
                });
            }
            root_indent = leading_whitespace(stripped);
            root = Some(VirtualDirectoryNode::new(
                line.name.trim_end_matches('/'),
                false,
            ));
            continue;
        };

        let line = classify(number, strip_indent(stripped, root_indent));
        let Some(prefix) = line.prefix else {
            return Err(SchemaError::MultipleRoots {
                line: number,
                name: line.name.to_string(),
            });
        };

        let depth = prefix_depth(prefix, &last) + 1;
        if open.len() + 1 < depth {
            return Err(SchemaError::Orphan {
                line: number,
                name: line.name.to_string(),
            });
        }
        open.truncate(depth - 1);
        last.resize(depth, false);
        last.push(line.is_last);

        let is_file = !line.name.ends_with('/') && has_extension(line.name);
        let name = line.name.trim_end_matches('/');
        if name.is_empty() {
            continue;
        }

        let parent = directory_mut(tree_root, &open).ok_or_else(|| SchemaError::Orphan {
            line: number,
            name: name.to_string(),
        })?;
        attach(parent, name, is_file, &line)?;
        if !is_file {
            open.push(name.to_string());
        }
    }

    root.map(VirtualDirectory::from_root).ok_or(SchemaError::Empty)
}

fn strip_comment(line: &str) -> &str {
    let cut = [" #", " //"]
        .iter()
        .filter_map(|marker| line.find(marker))
        .min();
    cut.map_or(line, |idx| &line[..idx])
}

fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn strip_indent(line: &str, indent: usize) -> &str {
    let mut rest = line;
    for _ in 0..indent {
        match rest.chars().next() {
            Some(c) if c.is_whitespace() => rest = &rest[c.len_utf8()..],
            _ => break,
        }
    }
    rest
}

const fn is_connector(c: char) -> bool {
    matches!(c, '│' | '|' | ' ' | '\t' | '\u{a0}')
}

fn classify(number: usize, line: &str) -> Line<'_> {
    let marker = BRANCH_MARKERS
        .iter()
        .filter_map(|(marker, closes)| line.find(marker).map(|pos| (pos, *marker, *closes)))
        .min_by_key(|(pos, _, _)| *pos);

    if let Some((pos, marker, is_last)) = marker {
        let prefix = &line[..pos];
        if prefix.chars().all(is_connector) {
            let name = line[pos + marker.len()..]
                .trim_start_matches(|c: char| c == '─' || c.is_whitespace())
                .trim_end();
            return Line {
                number,
                prefix: Some(prefix),
                is_last,
                name,
            };
        }
    }

    Line {
        number,
        prefix: None,
        is_last: false,
        name: line.trim(),
    }
}

/// Counts the nesting levels encoded by a connector prefix.
///
/// A bar always opens a level and swallows up to three following spaces. A
/// run of blanks opens one level per indent unit, but only where the entry
/// last seen at that level closed its sibling list.
fn prefix_depth(prefix: &str, last: &[bool]) -> usize {
    let mut depth = 0usize;
    let mut blanks = 0usize;
    let mut swallow = 0usize;

    for c in prefix.chars() {
        match c {
            '│' | '|' => {
                depth = flush_blanks(depth, blanks, last);
                blanks = 0;
                depth += 1;
                swallow = INDENT_WIDTH - 1;
            }
            '\t' => {
                if swallow > 0 {
                    swallow = 0;
                } else {
                    blanks += TAB_WIDTH;
                }
            }
            _ => {
                if swallow > 0 {
                    swallow -= 1;
                } else {
                    blanks += 1;
                }
            }
        }
    }

    flush_blanks(depth, blanks, last)
}

fn flush_blanks(mut depth: usize, blanks: usize, last: &[bool]) -> usize {
    let units = (blanks + INDENT_WIDTH / 2) / INDENT_WIDTH;
    for _ in 0..units {
        if last.get(depth + 1).copied().unwrap_or(false) {
            depth += 1;
        }
    }
    depth
}

fn directory_mut<'a>(
    root: &'a mut VirtualDirectoryNode,
    path: &[String],
) -> Option<&'a mut VirtualDirectoryNode> {
    let mut node = root;
    for segment in path {
        node = node.children_mut().get_mut(segment)?;
    }
    Some(node)
}

fn attach(
    parent: &mut VirtualDirectoryNode,
    name: &str,
    is_file: bool,
    line: &Line<'_>,
) -> Result<(), SchemaError> {
    let children = parent.children_mut();
    match children.get(name) {
        Some(existing) if existing.is_file() != is_file => Err(SchemaError::ConflictingEntry {
            line: line.number,
            name: name.to_string(),
        }),
        Some(_) => Ok(()),
        None => {
            children.insert(name.to_string(), VirtualDirectoryNode::new(name, is_file));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(node: &VirtualDirectoryNode) -> Vec<&str> {
        node.children().map(VirtualDirectoryNode::name).collect()
    }

    #[test]
    fn test_parse_unicode_tree() {
        let schema = parse_tree(
            "src/\n├── components/\n│   └── Button.tsx\n├── App.tsx\n└── index.tsx\n",
        )
        .unwrap();

        assert_eq!(schema.root_name(), "src");
        assert_eq!(names(schema.root()), vec!["components", "App.tsx", "index.tsx"]);
        assert!(schema.is_file("src/components/Button.tsx"));
    }

    #[test]
    fn test_parse_ascii_tree() {
        let schema = parse_tree(
            "app/\n|-- lib/\n|   |-- util.ts\n|   `-- math.ts\n+-- main.ts\n\\-- README.md\n",
        )
        .unwrap();

        assert!(schema.is_file("app/lib/util.ts"));
        assert!(schema.is_file("app/lib/math.ts"));
        assert!(schema.is_file("app/main.ts"));
        assert!(schema.is_file("app/README.md"));
    }

    #[test]
    fn test_comments_blank_lines_and_fences_are_ignored() {
        let schema = parse_tree(
            "```\nsrc/   # project root\n\n├── api.ts // http client\n└── dotfiles/\n    └── .env # secrets\n```\n",
        )
        .unwrap();

        assert_eq!(schema.files(), vec!["src/api.ts", "src/dotfiles/.env"]);
    }

    #[test]
    fn test_indented_root_is_stripped() {
        let schema = parse_tree("    web/\n    ├── a/\n    │   └── b.ts\n    └── c.ts\n").unwrap();
        assert!(schema.is_file("web/a/b.ts"));
        assert!(schema.is_file("web/c.ts"));
    }

    #[test]
    fn test_mixed_last_sibling_patterns() {
        let listing = "\
app/
├── a/
│   ├── b/
│   │   └── c.ts
│   └── d/
│       └── e.ts
└── f/
    ├── g/
    │   └── h.ts
    └── i.ts
";
        let schema = parse_tree(listing).unwrap();

        assert_eq!(
            schema.files(),
            vec!["app/a/b/c.ts", "app/a/d/e.ts", "app/f/g/h.ts", "app/f/i.ts"]
        );
    }

    #[test]
    fn test_blank_indent_after_open_sibling_does_not_nest() {
        // `a/` is not the last child, so the blank indent cannot belong to it.
        let schema = parse_tree("app/\n├── a/\n    └── x.ts\n").unwrap();
        assert!(schema.is_file("app/x.ts"));
        assert!(schema.is_directory("app/a"));
    }

    #[test]
    fn test_deep_nesting() {
        let mut listing = String::from("root/\n");
        for level in 0..16 {
            listing.push_str(&"    ".repeat(level));
            listing.push_str(&format!("└── d{level}/\n"));
        }
        listing.push_str(&"    ".repeat(16));
        listing.push_str("└── leaf.rs\n");

        let schema = parse_tree(&listing).unwrap();
        let path: Vec<String> = (0..16).map(|level| format!("d{level}")).collect();
        assert!(schema.is_file(&format!("root/{}/leaf.rs", path.join("/"))));
    }

    #[test]
    fn test_tabs_count_as_one_level() {
        let schema = parse_tree("src/\n└── a/\n\t└── b.ts\n").unwrap();
        assert!(schema.is_file("src/a/b.ts"));
    }

    #[test]
    fn test_extensionless_names_are_directories() {
        let schema = parse_tree("src/\n├── bin\n└── .gitignore\n").unwrap();
        assert!(schema.is_directory("src/bin"));
        assert!(schema.is_file("src/.gitignore"));
    }

    #[test]
    fn test_duplicate_directories_merge() {
        let schema =
            parse_tree("src/\n├── lib/\n│   └── a.ts\n├── lib/\n│   └── b.ts\n└── lib/\n    └── a.ts\n")
                .unwrap();

        assert_eq!(schema.files(), vec!["src/lib/a.ts", "src/lib/b.ts"]);
    }

    #[test]
    fn test_empty_listing() {
        assert!(matches!(parse_tree(""), Err(SchemaError::Empty)));
        assert!(matches!(parse_tree("\n  \n # only a comment\n"), Err(SchemaError::Empty)));
    }

    #[test]
    fn test_entry_before_root() {
        let err = parse_tree("├── a.ts\n").unwrap_err();
        assert!(matches!(err, SchemaError::MissingRoot { line: 1, .. }));
    }

    #[test]
    fn test_second_root() {
        let err = parse_tree("src/\n└── a.ts\nlib/\n").unwrap_err();
        assert!(matches!(err, SchemaError::MultipleRoots { line: 3, ref name } if name == "lib/"));
    }

    #[test]
    fn test_entry_beneath_file_is_orphan() {
        let err = parse_tree("src/\n├── a.ts\n│   └── b.ts\n└── c.ts\n").unwrap_err();
        assert!(matches!(err, SchemaError::Orphan { line: 3, ref name } if name == "b.ts"));
    }

    #[test]
    fn test_file_and_directory_conflict() {
        let err = parse_tree("src/\n├── util.ts\n└── util.ts/\n    └── x.ts\n").unwrap_err();
        assert!(matches!(err, SchemaError::ConflictingEntry { line: 3, ref name } if name == "util.ts"));
    }
}
