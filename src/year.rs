#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Academic years and the courses inside them.

use std::fmt;

use crate::{
    client::Themis,
    error::{Result, ThemisError},
    node::{Node, NodeKind},
};

/// Marker Themis renders instead of a course page it cannot show.
const UNAVAILABLE_MARKER: &str = "Something went wrong";

/// An academic year such as `2023-2024`.
#[derive(Debug, Clone)]
pub struct Year {
    /// Client used for lookups.
    client: Themis,
    /// First calendar year.
    start:  u16,
    /// Second calendar year.
    end:    u16,
}

impl Year {
    /// Creates a year handle without touching the network.
    pub(crate) fn new(client: Themis, start: u16, end: u16) -> Self {
        Self { client, start, end }
    }

    /// Parses a `start-end` label.
    pub fn parse_label(label: &str) -> Option<(u16, u16)> {
        let (start, end) = label.trim().split_once('-')?;
        Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
    }

    /// First calendar year.
    pub fn start(&self) -> u16 {
        self.start
    }

    /// Second calendar year.
    pub fn end(&self) -> u16 {
        self.end
    }

    /// Navigation path of the year, e.g. `/2023-2024`.
    pub fn path(&self) -> String {
        format!("/{self}")
    }

    /// The year as a folder node whose children are the courses.
    pub fn as_node(&self) -> Node {
        Node::new(
            self.client.clone(),
            self.path(),
            self.to_string(),
            NodeKind::Folder,
            Vec::new(),
        )
    }

    /// Every visible course of the year.
    pub fn all_courses(&self) -> Result<Vec<Node>> {
        self.as_node().list_children()
    }

    /// Looks up a course by its title.
    pub fn course(&self, title: &str) -> Result<Node> {
        self.as_node().find_child(title)
    }

    /// Fetches a course by its tag, e.g. `adinc-ai` for
    /// `/course/2023-2024/adinc-ai`.
    pub fn course_by_tag(&self, tag: &str) -> Result<Node> {
        let path = format!("{}/{}", self.path(), tag.trim_matches('/'));
        let page = self
            .client
            .fetch(&Node::page_path_for(&path), "fetch course")?;

        if page.body.contains(UNAVAILABLE_MARKER) {
            return Err(ThemisError::CourseUnavailable { path });
        }

        let mut course = Node::from_page(self.client.clone(), &path, &page.body);
        course.set_breadcrumb(vec![self.to_string()]);
        Ok(course)
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
