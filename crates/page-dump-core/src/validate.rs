//! Structural checks over an assembled vertex graph.
//!
//! These are the invariants downstream consumers of a dump rely on. A
//! rule returns every failure it finds; [`validate`] runs all of them.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::models::{Vertex, VertexType};

/// A named structural rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// The first vertex is the root page.
    RootPage,
    /// Every uid in a `children` list is a vertex.
    ChildrenExist,
    /// Every uid in a `refs` list is a vertex.
    RefsExist,
    /// No block appears in more than one `children` list.
    SingleParent,
    /// Pages and files never appear as children.
    ChildrenTypes,
    /// Only pages and blocks carry `children`.
    ChildrenCarriers,
    /// Only blocks carry `refs`, headings included.
    RefsCarriers,
    /// Every ref of a block appears in its text in a ref format.
    RefsAppearInText,
}

impl Rule {
    pub const ALL: [Rule; 8] = [
        Rule::RootPage,
        Rule::ChildrenExist,
        Rule::RefsExist,
        Rule::SingleParent,
        Rule::ChildrenTypes,
        Rule::ChildrenCarriers,
        Rule::RefsCarriers,
        Rule::RefsAppearInText,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Rule::RootPage => "root-page",
            Rule::ChildrenExist => "children-exist",
            Rule::RefsExist => "refs-exist",
            Rule::SingleParent => "single-parent",
            Rule::ChildrenTypes => "children-types",
            Rule::ChildrenCarriers => "children-carriers",
            Rule::RefsCarriers => "refs-carriers",
            Rule::RefsAppearInText => "refs-appear-in-text",
        }
    }

    fn check(&self, graph: &Graph<'_>) -> Vec<String> {
        match self {
            Rule::RootPage => match graph.vertices.first() {
                Some(v) if v.vertex_type == VertexType::Page => vec![],
                Some(v) => vec![format!("first vertex {} is {}", v.uid, v.vertex_type)],
                None => vec!["graph is empty".to_string()],
            },
            Rule::ChildrenExist => graph.missing(|v| v.children.as_deref()),
            Rule::RefsExist => graph.missing(|v| v.refs.as_deref()),
            Rule::SingleParent => {
                let mut parents: HashMap<&str, usize> = HashMap::new();
                for child in graph.vertices.iter().flat_map(|v| v.children.iter().flatten()) {
                    *parents.entry(child.as_str()).or_default() += 1;
                }
                let mut failures: Vec<String> = parents
                    .into_iter()
                    .filter(|(uid, n)| {
                        *n > 1 && graph.type_of(uid).is_some_and(|t| t.is_block())
                    })
                    .map(|(uid, n)| format!("block {} has {} parents", uid, n))
                    .collect();
                failures.sort();
                failures
            }
            Rule::ChildrenTypes => graph
                .vertices
                .iter()
                .flat_map(|v| v.children.iter().flatten().map(move |c| (v, c)))
                .filter_map(|(parent, child)| match graph.type_of(child) {
                    Some(t @ (VertexType::Page | VertexType::ExternalFile)) => Some(format!(
                        "{} lists {} child {}",
                        parent.uid, t, child
                    )),
                    _ => None,
                })
                .collect(),
            Rule::ChildrenCarriers => graph
                .vertices
                .iter()
                .filter(|v| v.children.is_some() && v.vertex_type == VertexType::ExternalFile)
                .map(|v| format!("{} {} carries children", v.vertex_type, v.uid))
                .collect(),
            Rule::RefsCarriers => graph
                .vertices
                .iter()
                .filter(|v| v.refs.is_some() && !v.vertex_type.is_block())
                .map(|v| format!("{} {} carries refs", v.vertex_type, v.uid))
                .collect(),
            Rule::RefsAppearInText => graph
                .vertices
                .iter()
                .filter(|v| v.vertex_type.is_block())
                .flat_map(|v| {
                    let text = v.text.as_deref().unwrap_or_default();
                    v.refs
                        .iter()
                        .flatten()
                        .filter(move |r| !text_contains_ref(text, r))
                        .map(move |r| format!("{} does not mention ref {}", v.uid, r))
                })
                .collect(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub rule: Rule,
    pub message: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

struct Graph<'a> {
    vertices: &'a [Vertex],
    types: HashMap<&'a str, VertexType>,
}

impl<'a> Graph<'a> {
    fn new(vertices: &'a [Vertex]) -> Self {
        Self {
            vertices,
            types: vertices
                .iter()
                .map(|v| (v.uid.as_str(), v.vertex_type))
                .collect(),
        }
    }

    fn type_of(&self, uid: &str) -> Option<VertexType> {
        self.types.get(uid).copied()
    }

    fn missing<F>(&self, links: F) -> Vec<String>
    where
        F: Fn(&'a Vertex) -> Option<&'a [String]>,
    {
        let mut reported = HashSet::new();
        let mut failures = Vec::new();
        for v in self.vertices {
            for link in links(v).unwrap_or_default() {
                if !self.types.contains_key(link.as_str()) && reported.insert(link.as_str()) {
                    failures.push(format!("{} links to missing vertex {}", v.uid, link));
                }
            }
        }
        failures
    }
}

/// `[[uid]]`, `((uid))` or `<<uid>>`.
pub fn text_contains_ref(text: &str, uid: &str) -> bool {
    [
        format!("[[{}]]", uid),
        format!("(({}))", uid),
        format!("<<{}>>", uid),
    ]
    .iter()
    .any(|form| text.contains(form.as_str()))
}

/// Run every rule over `vertices`.
pub fn validate(vertices: &[Vertex]) -> Vec<ValidationFailure> {
    let graph = Graph::new(vertices);
    Rule::ALL
        .iter()
        .flat_map(|rule| {
            rule.check(&graph)
                .into_iter()
                .map(move |message| ValidationFailure {
                    rule: *rule,
                    message,
                })
        })
        .collect()
}
