//! UI hierarchy snapshot types
//!
//! A snapshot is the flattened, document-ordered list of nodes from one
//! hierarchy dump. Lookups always return the first match in that order.

use serde::{Deserialize, Serialize};

use super::Locator;

/// Screen rectangle of a node in pixels, `[left,top][right,bottom]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Center point, the spot a tap is sent to
    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Parse the dump format `[0,0][1080,2340]`
    pub fn parse(s: &str) -> Option<Self> {
        let nums: Vec<i32> = s
            .split(|c| c == '[' || c == ']' || c == ',')
            .filter(|part| !part.is_empty())
            .map(|part| part.trim().parse().ok())
            .collect::<Option<_>>()?;
        match nums.as_slice() {
            [left, top, right, bottom] => Some(Self::new(*left, *top, *right, *bottom)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{},{}][{},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// One node of the UI hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiNode {
    /// Nesting depth, 0 for direct children of the hierarchy root
    pub depth: usize,
    /// Index among siblings
    pub index: usize,
    pub text: String,
    pub resource_id: String,
    pub class: String,
    pub package: String,
    pub content_desc: String,
    pub clickable: bool,
    pub enabled: bool,
    pub focused: bool,
    pub bounds: Bounds,
}

impl UiNode {
    /// Short key of the resource id (`userInput` for `pkg:id/userInput`)
    pub fn key(&self) -> Option<&str> {
        self.resource_id.split_once(":id/").map(|(_, key)| key)
    }

    pub fn is_editable(&self) -> bool {
        self.class.ends_with("EditText")
    }
}

/// Snapshot of the whole screen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiTree {
    pub rotation: u32,
    pub nodes: Vec<UiNode>,
}

impl UiTree {
    pub fn new(nodes: Vec<UiNode>) -> Self {
        Self { rotation: 0, nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First node matching the locator
    pub fn find(&self, locator: &Locator) -> Option<&UiNode> {
        self.nodes.iter().find(|n| locator.matches(&n.resource_id))
    }

    /// Whether any node belongs to the package
    pub fn has_package(&self, package: &str) -> bool {
        self.nodes.iter().any(|n| n.package == package)
    }

    /// Topmost node containing a point, i.e. the last one in document order
    pub fn node_at(&self, x: i32, y: i32) -> Option<&UiNode> {
        self.nodes.iter().rev().find(|n| n.bounds.contains(x, y))
    }

    /// Distinct packages on screen in order of first appearance
    pub fn packages(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for node in &self.nodes {
            if !node.package.is_empty() && !seen.contains(&node.package.as_str()) {
                seen.push(&node.package);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(resource_id: &str, package: &str, bounds: Bounds) -> UiNode {
        UiNode {
            resource_id: resource_id.to_string(),
            package: package.to_string(),
            bounds,
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_bounds_parse_and_center() {
        let b = Bounds::parse("[0,200][1080,350]").unwrap();
        assert_eq!(b, Bounds::new(0, 200, 1080, 350));
        assert_eq!(b.center(), (540, 275));
        assert_eq!(b.to_string(), "[0,200][1080,350]");
    }

    #[test]
    fn test_bounds_parse_rejects_garbage() {
        assert!(Bounds::parse("[0,0][1080]").is_none());
        assert!(Bounds::parse("[a,b][c,d]").is_none());
        assert!(Bounds::parse("").is_none());
    }

    #[test]
    fn test_find_returns_first_match() {
        let mut first = node("app:id/text", "app", Bounds::new(0, 0, 10, 10));
        first.text = "first".into();
        let mut second = node("app:id/text", "app", Bounds::new(0, 10, 10, 20));
        second.text = "second".into();
        let tree = UiTree::new(vec![first, second]);

        let found = tree.find(&Locator::new("app", "text")).unwrap();
        assert_eq!(found.text, "first");
        assert!(tree.find(&Locator::new("app", "missing")).is_none());
    }

    #[test]
    fn test_node_at_prefers_topmost() {
        let root = node("", "app", Bounds::new(0, 0, 100, 100));
        let button = node("app:id/button", "app", Bounds::new(10, 10, 50, 50));
        let tree = UiTree::new(vec![root, button]);

        assert_eq!(tree.node_at(20, 20).unwrap().key(), Some("button"));
        assert_eq!(tree.node_at(80, 80).unwrap().key(), None);
        assert!(tree.node_at(200, 200).is_none());
    }

    #[test]
    fn test_packages_deduplicated() {
        let tree = UiTree::new(vec![
            node("", "com.android.systemui", Bounds::default()),
            node("", "launcher", Bounds::default()),
            node("", "com.android.systemui", Bounds::default()),
        ]);
        assert_eq!(tree.packages(), vec!["com.android.systemui", "launcher"]);
        assert!(tree.has_package("launcher"));
        assert!(!tree.has_package("app"));
    }
}
