//! End-to-end site builds over temporary content trees.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use weft_site::{BuildError, LinkError, RebuildOutcome, RebuildPlan, Site, SiteConfig};
use weft_storage::{ChangeEvent, ChangeKind};
use weft_vcs::NoHistory;

struct Project {
    _temp: tempfile::TempDir,
    content: PathBuf,
    output: PathBuf,
}

impl Project {
    fn new(files: &[(&str, &str)]) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let content = temp.path().join("content");
        fs::create_dir_all(&content).unwrap();
        let content = fs::canonicalize(content).unwrap();
        let output = temp.path().join("site");
        let project = Self {
            _temp: temp,
            content,
            output,
        };
        for (file, text) in files {
            project.write(file, text);
        }
        project
    }

    fn write(&self, file: &str, text: &str) {
        let path = self.content.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn site(&self) -> Site {
        let seed = json!({ "layout_raw": "{{ content }}" });
        Site::new(SiteConfig {
            source_dir: self.content.clone(),
            output_dir: self.output.clone(),
            seed: seed.as_object().cloned().unwrap(),
            ..SiteConfig::default()
        })
        .with_history(Arc::new(NoHistory))
    }

    fn output(&self, rel: &str) -> String {
        fs::read_to_string(self.output.join(rel)).unwrap()
    }

    fn exists(&self, rel: &str) -> bool {
        self.output.join(rel).exists()
    }

    fn modified(&self, rel: &str) -> ChangeEvent {
        ChangeEvent {
            path: self.content.join(rel),
            kind: ChangeKind::Modified,
        }
    }
}

#[test]
fn test_guide_links_to_root_index() {
    let project = Project::new(&[
        ("index.md", "[guide]({{ link('guide') }})"),
        ("docs/guide.md", "[home]({{ link('/') }})"),
    ]);
    project.site().build().unwrap();

    assert_eq!(
        project.output("index.html"),
        "<p><a href=\"docs/guide\">guide</a></p>\n"
    );
    assert_eq!(
        project.output("docs/guide/index.html"),
        "<p><a href=\"../../\">home</a></p>\n"
    );
}

#[test]
fn test_only_reachable_pages_written() {
    let project = Project::new(&[
        ("index.md", "[a]({{ link('a') }})"),
        ("x/a.md", "[b]({{ link('b') }})"),
        ("y/b.md", "end"),
        ("w/orphan.md", "alone"),
    ]);
    let mut site = project.site();
    let report = site.build().unwrap();

    let tree = site.tree().unwrap();
    let state = site.state().unwrap();
    let orphan = tree.find_by_rel_path(Path::new("w/orphan.md")).unwrap();
    assert!(!state.is_public(orphan));
    assert!(state.node(orphan).output.is_some());
    assert_eq!(site.registry().unwrap().lookup("orphan"), Ok(orphan));

    assert!(project.exists("x/a/index.html"));
    assert!(project.exists("y/b/index.html"));
    assert!(!project.exists("w"));
    // root, index, x, a, y, b
    assert_eq!(report.published, 6);
}

#[test]
fn test_index_observes_subdirectory_metadata() {
    let project = Project::new(&[
        (
            "index.md",
            "{% for d in dir.subdirs %}{% for p in d.pages %}{{ p.title }}{% endfor %}{% endfor %}",
        ),
        ("docs/a.md", "---\ntitle: Alpha\n---\nbody"),
    ]);
    project.site().build().unwrap();
    assert_eq!(project.output("index.html"), "<p>Alpha</p>\n");
}

#[test]
fn test_bindings_scoped_to_subtree() {
    let project = Project::new(&[
        ("_config.yaml", "color: red\n"),
        ("index.md", "{{ link('x') }} {{ link('y') }}"),
        ("a/_config.yaml", "color: blue\nshape: circle\n"),
        ("a/x.md", "{{ color }} {{ shape }}"),
        ("b/y.md", "{{ color }}[{{ shape }}]"),
    ]);
    project.site().build().unwrap();

    assert_eq!(project.output("a/x/index.html"), "<p>blue circle</p>\n");
    assert_eq!(project.output("b/y/index.html"), "<p>red[]</p>\n");
}

#[test]
fn test_collisions_fail_naming_every_path() {
    let project = Project::new(&[("a/guide.md", ""), ("b/guide.md", "")]);
    let err = project.site().build().unwrap_err();

    assert!(matches!(err, BuildError::Link(LinkError::Collisions(_))));
    let message = err.to_string();
    assert!(message.contains("a/guide.md"), "{message}");
    assert!(message.contains("b/guide.md"), "{message}");
    assert!(!project.output.exists());
}

#[test]
fn test_existing_output_kept_without_clear() {
    let project = Project::new(&[("index.md", "home")]);
    fs::create_dir_all(project.output.join("keep")).unwrap();

    let err = project.site().build().unwrap_err();
    assert!(matches!(err, BuildError::OutputExists { .. }));
    assert!(project.exists("keep"));
}

#[test]
fn test_failed_rebuild_leaves_previous_output() {
    let project = Project::new(&[("index.md", "home")]);
    let mut site = project.site();
    site.build().unwrap();

    project.write("index.md", "{{ link('missing') }}");
    let err = site.build().unwrap_err();
    assert!(matches!(err.root(), BuildError::Link(LinkError::NotFound { .. })));
    assert_eq!(project.output("index.html"), "<p>home</p>\n");
}

#[test]
fn test_markup_change_rebuilds_one_page() {
    let project = Project::new(&[
        ("index.md", "[guide]({{ link('guide') }})"),
        ("docs/guide.md", "v1"),
    ]);
    let mut site = project.site();
    site.build().unwrap();

    project.write("docs/guide.md", "v2");
    let changes = [project.modified("docs/guide.md")];
    assert!(matches!(site.plan(&changes), RebuildPlan::Markup(ref pages) if pages.len() == 1));

    let outcome = site.rebuild(&changes).unwrap();
    assert_eq!(
        outcome,
        RebuildOutcome::Incremental {
            rendered: 1,
            written: 1
        }
    );
    assert_eq!(project.output("docs/guide/index.html"), "<p>v2</p>\n");
}

#[test]
fn test_config_change_rebuilds_descendants() {
    let project = Project::new(&[
        ("index.md", "[guide]({{ link('guide') }})"),
        ("docs/_config.yaml", "label: one\n"),
        ("docs/guide.md", "{{ label }}"),
        ("docs/draft.md", "{{ label }}!"),
    ]);
    let mut site = project.site();
    site.build().unwrap();
    assert_eq!(project.output("docs/guide/index.html"), "<p>one</p>\n");

    project.write("docs/_config.yaml", "label: two\n");
    let outcome = site.rebuild(&[project.modified("docs/_config.yaml")]).unwrap();

    assert_eq!(
        outcome,
        RebuildOutcome::Incremental {
            rendered: 2,
            written: 1
        }
    );
    assert_eq!(project.output("docs/guide/index.html"), "<p>two</p>\n");
    assert!(!project.exists("docs/draft"));
}

#[test]
fn test_new_link_publishes_target_incrementally() {
    let project = Project::new(&[("index.md", "home"), ("about.md", "about us")]);
    let mut site = project.site();
    site.build().unwrap();
    assert!(!project.exists("about"));

    project.write("index.md", "[about]({{ link('about') }})");
    site.rebuild(&[project.modified("index.md")]).unwrap();

    assert_eq!(project.output("about/index.html"), "<p>about us</p>\n");
}

#[test]
fn test_structural_change_falls_back_to_full_build() {
    let project = Project::new(&[("index.md", "home")]);
    let mut site = project.site();
    site.build().unwrap();

    project.write("news.md", "fresh");
    project.write("index.md", "[news]({{ link('news') }})");
    let outcome = site
        .rebuild(&[
            ChangeEvent {
                path: project.content.join("news.md"),
                kind: ChangeKind::Created,
            },
            project.modified("index.md"),
        ])
        .unwrap();

    assert!(matches!(outcome, RebuildOutcome::Full(_)));
    assert_eq!(project.output("news/index.html"), "<p>fresh</p>\n");
}

#[test]
fn test_incremental_failure_falls_back_to_full_build() {
    let project = Project::new(&[
        ("index.md", "[a]({{ link('a') }})"),
        ("docs/_config.yaml", "title: Docs\n"),
        ("docs/a.md", "a"),
    ]);
    let mut site = project.site();
    site.build().unwrap();

    // A new directory title conflicts with the recorded one during replay.
    project.write("docs/_config.yaml", "title: Manual\n");
    let outcome = site.rebuild(&[project.modified("docs/_config.yaml")]).unwrap();
    assert!(matches!(outcome, RebuildOutcome::Full(_)));
}

#[test]
fn test_rebuild_file_by_link_name() {
    let project = Project::new(&[
        ("index.md", "[guide]({{ link('guide') }})"),
        ("docs/guide.md", "v1"),
    ]);
    let mut site = project.site();
    site.build().unwrap();

    project.write("docs/guide.md", "v2");
    site.rebuild_file("guide").unwrap();
    assert_eq!(project.output("docs/guide/index.html"), "<p>v2</p>\n");

    let err = site.rebuild_file("nowhere").unwrap_err();
    assert!(matches!(err, BuildError::UnknownNode(_)));
}

#[test]
fn test_ignored_changes_plan_nothing() {
    let project = Project::new(&[("index.md", "home"), (".notes.md", "hidden")]);
    let mut site = project.site();
    site.build().unwrap();

    let outcome = site.rebuild(&[project.modified(".notes.md")]).unwrap();
    assert_eq!(outcome, RebuildOutcome::Unchanged);
    assert!(project.exists("index.html"));
}
