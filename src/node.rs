#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The navigation tree: folders and the exercises inside them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    client::Themis,
    config::NameMatch,
    error::{Result, ThemisError},
    html,
    judge::SubmitForm,
};

/// Prefix of human-facing pages; navigation paths are relative to it.
const COURSE_PREFIX: &str = "/course";

/// Prefix of the JSON navigation API.
const NAVIGATION_PREFIX: &str = "/api/navigation";

/// Whether a node can be submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Container of other nodes.
    Folder,
    /// Submittable leaf with test cases and a submission history.
    Exercise,
}

impl NodeKind {
    /// Kind for a `submitable` flag.
    pub fn from_submittable(submittable: bool) -> Self {
        if submittable {
            Self::Exercise
        } else {
            Self::Folder
        }
    }
}

/// One entry of the navigation API.
#[derive(Debug, Deserialize)]
struct NavigationEntry {
    /// Navigation path of the child.
    path:       String,
    /// Display title.
    title:      String,
    /// Hidden entries are not shown to students.
    #[serde(default)]
    visible:    bool,
    /// True for exercises.
    #[serde(default)]
    submitable: bool,
}

/// A child as described by a listing, before it is bound to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    /// Navigation path.
    pub path:  String,
    /// Display title.
    pub title: String,
    /// Folder or exercise.
    pub kind:  NodeKind,
}

/// A folder or exercise. Every listing re-fetches; nothing is cached.
#[derive(Debug, Clone)]
pub struct Node {
    /// Client the node was obtained from.
    client:     Themis,
    /// Navigation path, e.g. `/2023-2024/adinc-ai/labs/1`.
    path:       String,
    /// Display title.
    title:      String,
    /// Folder or exercise, decided once at construction.
    kind:       NodeKind,
    /// Titles of every ancestor, outermost first.
    breadcrumb: Vec<String>,
}

impl Node {
    /// Binds a node description to a client.
    pub(crate) fn new(
        client: Themis,
        path: impl Into<String>,
        title: impl Into<String>,
        kind: NodeKind,
        breadcrumb: Vec<String>,
    ) -> Self {
        Self {
            client,
            path: path.into(),
            title: title.into(),
            kind,
            breadcrumb,
        }
    }

    /// Fetches the page at `path` and builds a node from it.
    pub(crate) fn from_path(client: Themis, path: &str) -> Result<Self> {
        let path = normalize_path(path);
        let page = client.fetch(&Self::page_path_for(&path), "fetch node")?;
        Ok(Self::from_page(client, &path, &page.body))
    }

    /// Builds a node from an already fetched page. The title and breadcrumb
    /// come from the page header. Only a submit form (one with an action and a
    /// suffix table) makes it an exercise; other forms such as log out or
    /// search do not.
    pub(crate) fn from_page(client: Themis, path: &str, body: &str) -> Self {
        let doc = html::document(body);
        let crumbs_selector = html::selector("a.fill.accent.large");
        let mut crumbs: Vec<String> = doc.select(&crumbs_selector).map(html::text).collect();

        let title = crumbs
            .pop()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| last_segment(path).to_string());
        let kind = NodeKind::from_submittable(SubmitForm::parse(body).is_some());

        Self::new(client, path, title, kind, crumbs)
    }

    /// Path of the human-facing page for a navigation path.
    pub(crate) fn page_path_for(path: &str) -> String {
        format!("{COURSE_PREFIX}{path}")
    }

    /// Path of the navigation API for a navigation path.
    pub(crate) fn navigation_path_for(path: &str) -> String {
        format!("{NAVIGATION_PREFIX}{path}")
    }

    /// The client this node uses.
    pub fn client(&self) -> &Themis {
        &self.client
    }

    /// Navigation path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path of this node's page.
    pub fn page_path(&self) -> String {
        Self::page_path_for(&self.path)
    }

    /// Display title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Folder or exercise.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// True for submittable nodes.
    pub fn is_exercise(&self) -> bool {
        self.kind == NodeKind::Exercise
    }

    /// Titles of every ancestor, outermost first.
    pub fn breadcrumb(&self) -> &[String] {
        &self.breadcrumb
    }

    /// Replaces the stored breadcrumb.
    pub(crate) fn set_breadcrumb(&mut self, breadcrumb: Vec<String>) {
        self.breadcrumb = breadcrumb;
    }

    /// Fails with [`ThemisError::NotSubmittable`] unless this is an exercise.
    pub(crate) fn require_exercise(&self) -> Result<()> {
        if self.is_exercise() {
            Ok(())
        } else {
            Err(ThemisError::NotSubmittable {
                path: self.path.clone(),
            })
        }
    }

    /// Lists the children of a folder. Exercises have none and make no
    /// request.
    pub fn list_children(&self) -> Result<Vec<Node>> {
        if self.is_exercise() {
            return Ok(Vec::new());
        }

        let entries = self.fetch_child_entries()?;
        let mut breadcrumb = self.breadcrumb.clone();
        breadcrumb.push(self.title.clone());

        Ok(entries
            .into_iter()
            .map(|entry| {
                Node::new(
                    self.client.clone(),
                    entry.path,
                    entry.title,
                    entry.kind,
                    breadcrumb.clone(),
                )
            })
            .collect())
    }

    /// Child folders only.
    pub fn folders(&self) -> Result<Vec<Node>> {
        Ok(self
            .list_children()?
            .into_iter()
            .filter(|n| !n.is_exercise())
            .collect())
    }

    /// Child exercises only.
    pub fn exercises(&self) -> Result<Vec<Node>> {
        Ok(self
            .list_children()?
            .into_iter()
            .filter(Node::is_exercise)
            .collect())
    }

    /// Finds a child by title using the client's configured [`NameMatch`].
    pub fn find_child(&self, name: &str) -> Result<Node> {
        self.find_child_with(name, self.client.config().name_match())
    }

    /// Finds a child by title using an explicit [`NameMatch`].
    pub fn find_child_with(&self, name: &str, rule: NameMatch) -> Result<Node> {
        self.list_children()?
            .into_iter()
            .find(|child| rule.matches(&child.title, name))
            .ok_or_else(|| ThemisError::NotFound {
                name:   name.to_string(),
                parent: self.path.clone(),
            })
    }

    /// Fetches a descendant by path, keeping this node's breadcrumb.
    pub fn child_by_path(&self, path: &str) -> Result<Node> {
        let mut node = Node::from_path(self.client.clone(), path)?;
        if node.breadcrumb.is_empty() {
            let mut breadcrumb = self.breadcrumb.clone();
            breadcrumb.push(self.title.clone());
            node.breadcrumb = breadcrumb;
        }
        Ok(node)
    }

    /// Asks the navigation API for children, falling back to the rendered
    /// page when the API does not answer with JSON.
    fn fetch_child_entries(&self) -> Result<Vec<ChildEntry>> {
        let api_url = self.client.url(&Self::navigation_path_for(&self.path))?;
        let api_page = Themis::check_session(self.client.transport().get(&api_url)?, &api_url)?;

        if api_page.is_success() {
            match parse_navigation(&api_page.body) {
                Ok(entries) => return Ok(entries),
                Err(err) => tracing::debug!(
                    "Navigation API for {} did not return JSON ({err}); reading the page instead",
                    self.path
                ),
            }
        }

        let page = self.client.fetch(&self.page_path(), "list children")?;
        Ok(parse_children_html(&page.body))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for crumb in &self.breadcrumb {
            write!(f, "{crumb} / ")?;
        }
        write!(f, "{}", self.title)
    }
}

/// Parses a navigation API response, dropping invisible entries.
pub fn parse_navigation(body: &str) -> serde_json::Result<Vec<ChildEntry>> {
    let entries: Vec<NavigationEntry> = serde_json::from_str(body)?;
    Ok(entries
        .into_iter()
        .filter(|e| e.visible)
        .map(|e| ChildEntry {
            path:  normalize_path(&e.path),
            title: e.title.trim().to_string(),
            kind:  NodeKind::from_submittable(e.submitable),
        })
        .collect())
}

/// Parses the `ass-children` listing of a rendered folder page. Anchors
/// carrying neither marker class are skipped.
pub fn parse_children_html(body: &str) -> Vec<ChildEntry> {
    let doc = html::document(body);
    let anchors = html::selector("div.ass-children a[href]");

    doc.select(&anchors)
        .filter_map(|a| {
            let kind = if html::has_class(a, "ass-submitable") {
                NodeKind::Exercise
            } else if html::has_class(a, "ass-group") {
                NodeKind::Folder
            } else {
                return None;
            };
            let href = a.value().attr("href")?;
            let path = href.strip_prefix(COURSE_PREFIX).unwrap_or(href);
            Some(ChildEntry {
                path: normalize_path(path),
                title: html::text(a),
                kind,
            })
        })
        .collect()
}

/// Ensures a leading slash and no trailing slash.
fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim().trim_matches('/'))
}

/// Final segment of a path.
fn last_segment(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_json_drops_hidden_entries() {
        let body = r#"[
            {"path": "/2023-2024/adinc/labs", "title": "Labs", "visible": true, "submitable": false},
            {"path": "/2023-2024/adinc/secret", "title": "Secret", "visible": false},
            {"path": "/2023-2024/adinc/hello/", "title": " Hello ", "visible": true, "submitable": true}
        ]"#;
        let entries = parse_navigation(body).expect("valid json");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, NodeKind::Folder);
        assert_eq!(entries[1].path, "/2023-2024/adinc/hello");
        assert_eq!(entries[1].title, "Hello");
        assert_eq!(entries[1].kind, NodeKind::Exercise);
    }

    #[test]
    fn html_listing_uses_marker_classes() {
        let body = r#"<div class="ass-children">
            <a href="/course/2023-2024/adinc/week1" class="ass-group">Week 1</a>
            <a href="/course/2023-2024/adinc/hello" class="ass-submitable">Hello</a>
            <a href="/course/2023-2024/adinc/readme">Readme</a>
        </div>"#;
        let entries = parse_children_html(body);
        assert_eq!(
            entries,
            vec![
                ChildEntry {
                    path:  "/2023-2024/adinc/week1".into(),
                    title: "Week 1".into(),
                    kind:  NodeKind::Folder,
                },
                ChildEntry {
                    path:  "/2023-2024/adinc/hello".into(),
                    title: "Hello".into(),
                    kind:  NodeKind::Exercise,
                },
            ]
        );
    }

    #[test]
    fn empty_listing_is_not_an_error() {
        assert!(parse_children_html("<html><body></body></html>").is_empty());
        assert!(parse_navigation("[]").expect("json").is_empty());
    }

    #[test]
    fn paths_are_normalized() {
        assert_eq!(normalize_path("2023-2024/x/"), "/2023-2024/x");
        assert_eq!(last_segment("/2023-2024/x/hello"), "hello");
    }
}
