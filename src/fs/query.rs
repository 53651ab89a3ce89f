//! Read-only queries over a built tree.

use crate::fs::tree::Entry;

/// A sibling group together with the position of one of its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub group: Vec<Entry>,
    pub index: usize,
}

/// The direct leaf children of one directory level, in sibling order.
pub fn leaf_children(entries: &[Entry]) -> Vec<Entry> {
    entries.iter().filter(|e| e.is_leaf()).cloned().collect()
}

fn subdirectories(entries: &[Entry]) -> impl Iterator<Item = &[Entry]> {
    entries.iter().filter_map(|e| match e {
        Entry::Directory { children, .. } => Some(children.as_slice()),
        Entry::Image { .. } | Entry::Video { .. } | Entry::ArchiveMember { .. } => None,
    })
}

/// First non-empty sibling group of leaves, searching depth-first.
///
/// A level that has leaves is returned without looking into its
/// subdirectories. Empty when the tree has no leaves at all.
pub fn first_viewable_group(tree: &[Entry]) -> Vec<Entry> {
    let leaves = leaf_children(tree);
    if !leaves.is_empty() {
        return leaves;
    }
    subdirectories(tree)
        .map(first_viewable_group)
        .find(|group| !group.is_empty())
        .unwrap_or_default()
}

/// Locate the leaf with the given identity and return its sibling group.
///
/// Direct leaves of a level are checked before any subdirectory is entered.
pub fn resolve(tree: &[Entry], identity: &str) -> Option<Resolved> {
    let leaves = leaf_children(tree);
    if let Some(index) = leaves
        .iter()
        .position(|e| e.identity().as_deref() == Some(identity))
    {
        return Some(Resolved {
            group: leaves,
            index,
        });
    }
    subdirectories(tree).find_map(|children| resolve(children, identity))
}

/// Every leaf of the tree in depth-first sibling order.
pub fn flatten(tree: &[Entry]) -> Vec<&Entry> {
    let mut out = Vec::new();
    flatten_into(tree, &mut out);
    out
}

fn flatten_into<'a>(entries: &'a [Entry], out: &mut Vec<&'a Entry>) {
    for entry in entries {
        match entry {
            Entry::Directory { children, .. } => flatten_into(children, out),
            Entry::Image { .. } | Entry::Video { .. } | Entry::ArchiveMember { .. } => {
                out.push(entry)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn image(path: &str) -> Entry {
        let path = PathBuf::from(path);
        Entry::Image {
            name: path.file_name().unwrap().to_string_lossy().to_string(),
            path,
        }
    }

    fn folder(path: &str, children: Vec<Entry>) -> Entry {
        let path = PathBuf::from(path);
        Entry::Directory {
            name: path.file_name().unwrap().to_string_lossy().to_string(),
            path,
            children,
        }
    }

    fn member(container: &str, name: &str) -> Entry {
        Entry::ArchiveMember {
            name: name.to_string(),
            container: PathBuf::from(container),
        }
    }

    /// /r
    /// ├── a (1.png, 2.png)
    /// ├── b (c (3.png), 4.png)
    /// └── 5.png
    fn sample() -> Vec<Entry> {
        vec![
            folder("/r/a", vec![image("/r/a/1.png"), image("/r/a/2.png")]),
            folder(
                "/r/b",
                vec![folder("/r/b/c", vec![image("/r/b/c/3.png")]), image("/r/b/4.png")],
            ),
            image("/r/5.png"),
        ]
    }

    #[test]
    fn first_group_prefers_root_leaves() {
        let group = first_viewable_group(&sample());
        assert_eq!(group, vec![image("/r/5.png")]);
    }

    #[test]
    fn first_group_descends_when_root_has_no_leaves() {
        let tree = vec![folder(
            "/r/sub",
            vec![image("/r/sub/x.png"), image("/r/sub/y.png")],
        )];
        let group = first_viewable_group(&tree);
        assert_eq!(group, vec![image("/r/sub/x.png"), image("/r/sub/y.png")]);
    }

    #[test]
    fn first_group_stops_at_first_level_with_leaves() {
        let tree = vec![folder(
            "/r/b",
            vec![folder("/r/b/c", vec![image("/r/b/c/3.png")]), image("/r/b/4.png")],
        )];
        assert_eq!(first_viewable_group(&tree), vec![image("/r/b/4.png")]);
    }

    #[test]
    fn first_group_of_empty_tree_is_empty() {
        assert!(first_viewable_group(&[]).is_empty());
        assert!(first_viewable_group(&[folder("/r/e", vec![])]).is_empty());
    }

    #[test]
    fn first_group_members_share_one_parent() {
        let group = first_viewable_group(&[sample().remove(0)]);
        assert!(group.iter().all(|e| matches!(
            e,
            Entry::Image { path, .. } if path.parent() == Some(std::path::Path::new("/r/a"))
        )));
    }

    #[test]
    fn resolve_returns_sibling_group_and_index() {
        let tree = sample();
        let found = resolve(&tree, "/r/a/2.png").expect("resolved");
        assert_eq!(found.index, 1);
        assert_eq!(found.group, vec![image("/r/a/1.png"), image("/r/a/2.png")]);

        let found = resolve(&tree, "/r/b/c/3.png").expect("resolved");
        assert_eq!(found.index, 0);
        assert_eq!(found.group, vec![image("/r/b/c/3.png")]);
    }

    #[test]
    fn resolve_group_excludes_directories() {
        let found = resolve(&sample(), "/r/b/4.png").expect("resolved");
        assert_eq!(found.group, vec![image("/r/b/4.png")]);
        assert_eq!(found.index, 0);
    }

    #[test]
    fn resolve_every_leaf_round_trips() {
        let tree = sample();
        for leaf in flatten(&tree) {
            let id = leaf.identity().unwrap();
            let found = resolve(&tree, &id).expect("every leaf resolves");
            assert_eq!(&found.group[found.index], leaf);
        }
    }

    #[test]
    fn resolve_unknown_path_is_none() {
        assert!(resolve(&sample(), "/r/missing.png").is_none());
        assert!(resolve(&sample(), "/r/a").is_none());
    }

    #[test]
    fn resolve_archive_member_uses_container_and_name() {
        let tree = vec![
            member("/p/book.zip", "01.png"),
            member("/p/book.zip", "02.png"),
        ];
        let found = resolve(&tree, "/p/book.zip02.png").expect("resolved");
        assert_eq!(found.index, 1);
        assert!(resolve(&tree, "/p/book.zip").is_none());
    }

    #[test]
    fn flatten_lists_leaves_depth_first() {
        let tree = sample();
        let names: Vec<&str> = flatten(&tree).iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["1.png", "2.png", "3.png", "4.png", "5.png"]);
    }
}
