//! Flat element tree rendered by the simulated clinic, and locator
//! evaluation against it.

use crate::driver::ElementSnapshot;
use crate::locator::{normalize_whitespace, Locator, Position, Target};
use crate::mock::views::Control;

/// One rendered element
#[derive(Debug, Clone)]
pub(crate) struct SimElement {
    pub role: Option<&'static str>,
    pub name: String,
    pub text: String,
    pub test_id: Option<&'static str>,
    pub dom_id: Option<&'static str>,
    pub control: Control,
    pub visible: bool,
    pub enabled: bool,
    pub checked: Option<bool>,
    pub selected: Option<bool>,
    parent: Option<usize>,
}

impl SimElement {
    fn base(role: Option<&'static str>) -> Self {
        Self {
            role,
            name: String::new(),
            text: String::new(),
            test_id: None,
            dom_id: None,
            control: Control::Inert,
            visible: true,
            enabled: true,
            checked: None,
            selected: None,
            parent: None,
        }
    }

    /// Element with an ARIA role and accessible name
    pub fn role(role: &'static str, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::base(Some(role))
        }
    }

    /// Element without a role carrying visible text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::base(None)
        }
    }

    /// Button whose name is also its text
    pub fn button(label: &str, control: Control) -> Self {
        Self::role("button", label).with_text(label).control(control)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn control(mut self, control: Control) -> Self {
        self.control = control;
        self
    }

    pub const fn test_id(mut self, id: &'static str) -> Self {
        self.test_id = Some(id);
        self
    }

    pub const fn dom_id(mut self, id: &'static str) -> Self {
        self.dom_id = Some(id);
        self
    }

    pub const fn shown(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub const fn checked(mut self, checked: bool) -> Self {
        self.checked = Some(checked);
        self
    }

    pub const fn selected(mut self, selected: bool) -> Self {
        self.selected = Some(selected);
        self
    }
}

/// Rendered document
#[derive(Debug, Default)]
pub(crate) struct Dom {
    nodes: Vec<SimElement>,
}

impl Dom {
    /// Append `element` under `parent`, returning its index
    pub fn add(&mut self, parent: Option<usize>, mut element: SimElement) -> usize {
        element.parent = parent;
        self.nodes.push(element);
        self.nodes.len() - 1
    }

    pub fn element(&self, index: usize) -> Option<&SimElement> {
        self.nodes.get(index)
    }

    fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.parent == Some(index))
            .map(|(i, _)| i)
    }

    fn is_descendant(&self, index: usize, ancestor: usize) -> bool {
        let mut cursor = self.nodes.get(index).and_then(|n| n.parent);
        while let Some(parent) = cursor {
            if parent == ancestor {
                return true;
            }
            cursor = self.nodes.get(parent).and_then(|n| n.parent);
        }
        false
    }

    /// Visible itself and through every ancestor
    pub fn is_visible(&self, index: usize) -> bool {
        let mut cursor = Some(index);
        while let Some(i) = cursor {
            match self.nodes.get(i) {
                Some(node) if node.visible => cursor = node.parent,
                _ => return false,
            }
        }
        true
    }

    /// Own text followed by descendants' text, whitespace-collapsed
    pub fn full_text(&self, index: usize) -> String {
        let mut parts = Vec::new();
        self.collect_text(index, &mut parts);
        normalize_whitespace(&parts.join(" "))
    }

    fn collect_text(&self, index: usize, parts: &mut Vec<String>) {
        if let Some(node) = self.nodes.get(index) {
            if !node.text.is_empty() {
                parts.push(node.text.clone());
            }
        }
        for child in self.children(index) {
            self.collect_text(child, parts);
        }
    }

    /// Visible text in document order
    pub fn body_text(&self) -> String {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(i, n)| !n.text.is_empty() && self.is_visible(*i))
            .map(|(_, n)| n.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn matches_target(&self, index: usize, target: &Target) -> bool {
        let Some(node) = self.nodes.get(index) else {
            return false;
        };
        match target {
            Target::Role { role, name } => {
                node.role == Some(role.as_aria())
                    && name.as_ref().map_or(true, |m| m.matches(&node.name))
            }
            Target::Text(text) => {
                let own = self.full_text(index);
                !own.is_empty()
                    && text.matches(&own)
                    && !self.nodes.iter().enumerate().any(|(d, _)| {
                        self.is_descendant(d, index) && text.matches(&self.full_text(d))
                    })
            }
            Target::TestId(id) => node.test_id == Some(id.as_str()),
            Target::Id(id) => node.dom_id == Some(id.as_str()),
        }
    }

    /// Indices matching `locator` in document order, position ignored
    pub fn query(&self, locator: &Locator) -> Vec<usize> {
        let mut hits: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| self.matches_target(i, locator.target()))
            .collect();
        if let Some(scope) = locator.scope() {
            let roots = self.query(scope);
            let roots = match scope.position() {
                Position::Only => roots,
                position => position
                    .resolve(roots.len())
                    .and_then(|i| roots.get(i).copied())
                    .into_iter()
                    .collect(),
            };
            hits.retain(|&i| roots.iter().any(|&r| self.is_descendant(i, r)));
        }
        if let Some(text) = locator.has_text() {
            hits.retain(|&i| text.matches(&self.full_text(i)));
        }
        hits
    }

    pub fn snapshot(&self, index: usize) -> ElementSnapshot {
        let Some(node) = self.nodes.get(index) else {
            return ElementSnapshot::default();
        };
        ElementSnapshot {
            role: node.role.map(str::to_string),
            name: node.name.clone(),
            text: self.full_text(index),
            visible: self.is_visible(index),
            enabled: node.enabled,
            checked: node.checked,
            selected: node.selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{Role, TextMatch};

    fn sample() -> Dom {
        let mut dom = Dom::default();
        let group = dom.add(None, SimElement::role("group", "Sex"));
        dom.add(Some(group), SimElement::role("radio", "Male").checked(false).shown(false));
        dom.add(Some(group), SimElement::text("Male"));
        dom.add(Some(group), SimElement::role("radio", "Female").checked(true).shown(false));
        dom.add(Some(group), SimElement::text("Female"));
        let hidden = dom.add(None, SimElement::role("dialog", "Gone").shown(false));
        dom.add(Some(hidden), SimElement::text("inside hidden dialog"));
        dom
    }

    #[test]
    fn test_control_replaces_owned_control() {
        let element = SimElement::role("radio", "Ward 1")
            .control(Control::Location("Ward 1".to_string()))
            .control(Control::SearchResult("p-1".to_string()));
        assert!(matches!(element.control, Control::SearchResult(ref id) if id == "p-1"));
    }

    #[test]
    fn test_text_target_prefers_smallest() {
        let dom = sample();
        let hits = dom.query(&Locator::text(TextMatch::exact_ci("male")));
        assert_eq!(hits.len(), 1);
        assert_eq!(dom.element(hits[0]).map(|e| e.text.as_str()), Some("Male"));
    }

    #[test]
    fn test_scope_filters_descendants() {
        let dom = sample();
        let radios = dom.query(
            &Locator::any_role(Role::Radio).within(Locator::role(Role::Group, TextMatch::contains("Sex"))),
        );
        assert_eq!(radios.len(), 2);
        let none = dom.query(
            &Locator::any_role(Role::Radio).within(Locator::any_role(Role::Dialog)),
        );
        assert!(none.is_empty());
    }

    #[test]
    fn test_visibility_inherits() {
        let dom = sample();
        let hits = dom.query(&Locator::text(TextMatch::contains("inside hidden")));
        assert_eq!(hits.len(), 1);
        assert!(!dom.snapshot(hits[0]).visible);
        assert!(!dom.body_text().contains("inside hidden"));
    }

    #[test]
    fn test_has_text_uses_descendants() {
        let dom = sample();
        let hits = dom.query(
            &Locator::any_role(Role::Group).with_text(TextMatch::contains("Female")),
        );
        assert_eq!(hits.len(), 1);
    }
}
