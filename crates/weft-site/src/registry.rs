//! Link-name registry.
//!
//! Maps every link name to exactly one file. Markup pages whose display name
//! was slugified are also reachable under the pre-slug name.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use weft_storage::{ContentTree, FileKind, NodeId, NodeKind};

use crate::error::{Collision, LinkError};

/// Immutable link-name to file mapping.
#[derive(Debug, Default)]
pub struct NameRegistry {
    names: HashMap<String, NodeId>,
    /// Directories without an index page, by directory link name.
    bare_dirs: HashMap<String, PathBuf>,
}

impl NameRegistry {
    /// Register every file of `tree` except directory configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Collisions`] naming every contested name with
    /// every path claiming it.
    pub fn build(tree: &ContentTree, config_filename: &str) -> Result<Self, LinkError> {
        let mut claims: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
        let mut bare_dirs = HashMap::new();

        for (id, node) in tree.iter() {
            let file = match &node.kind {
                NodeKind::File(file) => file,
                NodeKind::Directory(dir) => {
                    if dir.index.is_none() {
                        bare_dirs.insert(tree.dir_link_name(id).to_owned(), node.rel_path.clone());
                    }
                    continue;
                }
            };
            if node.name == config_filename {
                continue;
            }

            let mut claim = |name: &str| {
                let ids = claims.entry(name.to_owned()).or_default();
                if !ids.contains(&id) {
                    ids.push(id);
                }
            };
            claim(&file.link_name);
            if let FileKind::Markup {
                pre_slug_name: Some(alias),
                ..
            } = &file.kind
                && !file.is_index
            {
                claim(alias);
            }
        }

        let collisions: Vec<Collision> = claims
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(name, ids)| Collision {
                name: name.clone(),
                paths: ids.iter().map(|&id| tree.node(id).rel_path.clone()).collect(),
            })
            .collect();
        if !collisions.is_empty() {
            return Err(LinkError::Collisions(collisions));
        }

        let names: HashMap<String, NodeId> = claims
            .into_iter()
            .filter_map(|(name, ids)| ids.first().map(|&id| (name, id)))
            .collect();
        tracing::debug!(names = names.len(), "Built name registry");
        Ok(Self { names, bare_dirs })
    }

    /// Resolve a link name.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::DirectoryWithoutIndex`] when the name is a
    /// directory without an index page, otherwise [`LinkError::NotFound`].
    pub fn lookup(&self, name: &str) -> Result<NodeId, LinkError> {
        if let Some(&id) = self.names.get(name) {
            return Ok(id);
        }
        match self.bare_dirs.get(name) {
            Some(dir) => Err(LinkError::DirectoryWithoutIndex {
                name: name.to_owned(),
                dir: dir.clone(),
            }),
            None => Err(LinkError::NotFound {
                name: name.to_owned(),
            }),
        }
    }

    /// Number of registered names, aliases included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use pretty_assertions::assert_eq;
    use weft_storage::{CrawlOptions, Crawler};

    fn crawl(files: &[&str]) -> (tempfile::TempDir, ContentTree) {
        let temp = tempfile::tempdir().unwrap();
        for file in files {
            let path = temp.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        let options = CrawlOptions::default();
        let ignore = |_: &str, _: &Path, _: bool| false;
        let tree = Crawler::new(temp.path(), &options, &ignore).crawl().unwrap();
        (temp, tree)
    }

    #[test]
    fn test_registers_pages_aliases_and_assets() {
        let (_temp, tree) = crawl(&["index.md", "About Us.md", "docs/index.md", "logo.png", "_config.yaml"]);
        let registry = NameRegistry::build(&tree, "_config.yaml").unwrap();
        assert_eq!(
            registry.names(),
            vec!["/", "About Us", "about-us", "docs", "logo.png"]
        );
        assert_eq!(registry.lookup("About Us"), registry.lookup("about-us"));
    }

    #[test]
    fn test_collision_names_every_path() {
        let (_temp, tree) = crawl(&["a/guide.md", "b/Guide.md"]);
        let err = NameRegistry::build(&tree, "_config.yaml").unwrap_err();
        assert_eq!(
            err,
            LinkError::Collisions(vec![Collision {
                name: "guide".to_owned(),
                paths: vec![PathBuf::from("a/guide.md"), PathBuf::from("b/Guide.md")],
            }])
        );
    }

    #[test]
    fn test_index_and_page_with_directory_name_collide() {
        let (_temp, tree) = crawl(&["docs.md", "docs/index.md"]);
        assert!(NameRegistry::build(&tree, "_config.yaml").is_err());
    }

    #[test]
    fn test_lookup_errors() {
        let (_temp, tree) = crawl(&["index.md", "notes/a.md"]);
        let registry = NameRegistry::build(&tree, "_config.yaml").unwrap();
        assert_eq!(
            registry.lookup("missing"),
            Err(LinkError::NotFound {
                name: "missing".to_owned()
            })
        );
        assert_eq!(
            registry.lookup("notes"),
            Err(LinkError::DirectoryWithoutIndex {
                name: "notes".to_owned(),
                dir: PathBuf::from("notes"),
            })
        );
    }

    #[test]
    fn test_config_files_not_registered() {
        let (_temp, tree) = crawl(&["a/_config.yaml", "b/_config.yaml"]);
        let registry = NameRegistry::build(&tree, "_config.yaml").unwrap();
        assert!(registry.is_empty());
    }
}
