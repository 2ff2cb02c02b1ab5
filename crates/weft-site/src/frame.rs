//! Environment views of tree nodes.
//!
//! Templates see the current directory as `dir` and the current page as
//! `page`. The `dir` view is assembled again for every page so an index
//! page, which renders last, observes the titles and metadata of everything
//! rendered before it in its subtree. Finished subdirectories and rendered
//! pages contribute their cached views, so only the listing is rebuilt.
//! Children appear in the directory's configured order.

use serde_json::{Map, Value, json};
use weft_storage::{ContentTree, NodeId};

use crate::state::{BuildState, PageDates};

pub use weft_renderer::Frame;

fn rel_path_string(tree: &ContentTree, id: NodeId) -> String {
    tree.node(id)
        .rel_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn dates_view(dates: Option<&PageDates>) -> Map<String, Value> {
    let dates = dates.copied().unwrap_or_default();
    let mut map = Map::new();
    map.insert(
        "created".to_owned(),
        dates.created.map_or(Value::Null, |d| d.to_rfc3339().into()),
    );
    map.insert(
        "last_modified".to_owned(),
        dates.last_modified.map_or(Value::Null, |d| d.to_rfc3339().into()),
    );
    map.insert(
        "idea_date".to_owned(),
        dates
            .idea_date
            .map_or(Value::Null, |d| d.format("%Y-%m-%d").to_string().into()),
    );
    map
}

/// View of a file: names, title, dates, publish flag and front matter.
#[must_use]
pub fn page_view(tree: &ContentTree, state: &BuildState, id: NodeId) -> Value {
    let node = tree.node(id);
    let node_state = state.node(id);
    let Some(file) = tree.file(id) else {
        return Value::Null;
    };

    let mut map = dates_view(node_state.dates.as_ref());
    map.insert("name".to_owned(), node.name.clone().into());
    map.insert("real_name".to_owned(), file.real_name.clone().into());
    map.insert("link_name".to_owned(), file.link_name.clone().into());
    map.insert("path".to_owned(), rel_path_string(tree, id).into());
    map.insert("is_index".to_owned(), file.is_index.into());
    map.insert("public".to_owned(), node_state.publish.into());
    map.insert("rendered".to_owned(), node_state.output.is_some().into());
    map.insert(
        "title".to_owned(),
        node_state.title.clone().map_or(Value::Null, Value::from),
    );
    map.insert("meta".to_owned(), Value::Object(node_state.metadata.clone()));
    Value::Object(map)
}

/// View of a directory, including its subdirectories and pages.
#[must_use]
pub fn dir_view(tree: &ContentTree, state: &BuildState, dir: NodeId) -> Value {
    let Some(directory) = tree.directory(dir) else {
        return Value::Null;
    };
    let node_state = state.node(dir);
    let (subdirs, files) = match &node_state.order {
        Some(order) => (order.subdirs.as_slice(), order.files.as_slice()),
        None => (directory.subdirs.as_slice(), directory.files.as_slice()),
    };

    let subdirs: Vec<Value> = subdirs
        .iter()
        .map(|&sub| match &state.node(sub).view {
            Some(view) => view.clone(),
            None => dir_view(tree, state, sub),
        })
        .collect();
    let pages: Vec<Value> = files
        .iter()
        .filter(|&&f| tree.file(f).is_some_and(|file| file.is_page()))
        .map(|&f| match &state.node(f).view {
            Some(view) => view.clone(),
            None => page_view(tree, state, f),
        })
        .collect();

    json!({
        "name": tree.node(dir).name,
        "link_name": tree.dir_link_name(dir),
        "path": rel_path_string(tree, dir),
        "title": node_state.title,
        "in_vcs": node_state.in_vcs,
        "public": node_state.publish,
        "subdirs": subdirs,
        "pages": pages,
    })
}
