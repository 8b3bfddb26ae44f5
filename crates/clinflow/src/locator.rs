//! Locator abstraction for accessibility-addressed elements.
//!
//! A [`Locator`] is a description, not a handle: the target surface re-renders
//! asynchronously, so every primitive re-resolves its locator on each poll.
//!
//! # Design
//!
//! - **Role first**: elements are addressed by ARIA role plus accessible name,
//!   or by visible text, the way a screen reader would find them
//! - **Explicit position**: when several elements match, the locator states
//!   which one it means (`first`, `nth`, `last`) or demands uniqueness
//! - **Scoping**: a locator can be confined to the subtree of another one

use regex::Regex;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

use crate::result::{FlowError, FlowResult};

/// ARIA roles used by the clinical journeys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// `button`
    Button,
    /// `tab`
    Tab,
    /// `textbox`
    Textbox,
    /// `radio`
    Radio,
    /// `checkbox`
    Checkbox,
    /// `group` (fieldset)
    Group,
    /// `search` landmark
    Search,
    /// `searchbox`
    Searchbox,
    /// `row`
    Row,
    /// `cell`
    Cell,
    /// `menuitem`
    MenuItem,
    /// `heading`
    Heading,
    /// `dialog`
    Dialog,
    /// `banner`
    Banner,
    /// `spinbutton`
    SpinButton,
    /// `link`
    Link,
}

impl Role {
    /// ARIA role name
    #[must_use]
    pub const fn as_aria(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Tab => "tab",
            Self::Textbox => "textbox",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::Group => "group",
            Self::Search => "search",
            Self::Searchbox => "searchbox",
            Self::Row => "row",
            Self::Cell => "cell",
            Self::MenuItem => "menuitem",
            Self::Heading => "heading",
            Self::Dialog => "dialog",
            Self::Banner => "banner",
            Self::SpinButton => "spinbutton",
            Self::Link => "link",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_aria())
    }
}

/// How a name or text is compared against a candidate string.
///
/// Candidates are whitespace-collapsed and trimmed before comparison.
#[derive(Debug, Clone)]
pub enum TextMatch {
    /// Whole string, case-sensitive
    Exact(String),
    /// Whole string, case-insensitive (`/^text$/i`)
    ExactIgnoreCase(String),
    /// Case-insensitive substring (`/text/i`)
    Contains(String),
    /// Regular expression
    Pattern(Regex),
}

impl TextMatch {
    /// Whole-string, case-sensitive match
    #[must_use]
    pub fn exact(text: impl Into<String>) -> Self {
        Self::Exact(text.into())
    }

    /// Whole-string, case-insensitive match
    #[must_use]
    pub fn exact_ci(text: impl Into<String>) -> Self {
        Self::ExactIgnoreCase(text.into())
    }

    /// Case-insensitive substring match
    #[must_use]
    pub fn contains(text: impl Into<String>) -> Self {
        Self::Contains(text.into())
    }

    /// Regular expression match
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern does not compile
    pub fn pattern(pattern: &str) -> FlowResult<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| FlowError::config(format!("invalid pattern {pattern:?}: {e}")))
    }

    /// Test a candidate string
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let normalized = normalize_whitespace(candidate);
        match self {
            Self::Exact(text) => normalized == *text,
            Self::ExactIgnoreCase(text) => normalized.to_lowercase() == text.to_lowercase(),
            Self::Contains(text) => normalized.to_lowercase().contains(&text.to_lowercase()),
            Self::Pattern(re) => re.is_match(&normalized),
        }
    }

    /// Serializable form consumed by the in-page query script
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Exact(text) => json!({ "kind": "exact", "value": text }),
            Self::ExactIgnoreCase(text) => json!({ "kind": "exact_ci", "value": text }),
            Self::Contains(text) => json!({ "kind": "contains", "value": text }),
            Self::Pattern(re) => {
                let source = re.as_str();
                match source.strip_prefix("(?i)") {
                    Some(rest) => json!({ "kind": "regex", "value": rest, "flags": "i" }),
                    None => json!({ "kind": "regex", "value": source, "flags": "" }),
                }
            }
        }
    }
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(text) => write!(f, "{text:?}"),
            Self::ExactIgnoreCase(text) => write!(f, "{text:?}i"),
            Self::Contains(text) => write!(f, "~{text:?}"),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Collapse runs of whitespace into single spaces and trim
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// What a locator addresses
#[derive(Debug, Clone)]
pub enum Target {
    /// ARIA role with optional accessible-name filter
    Role {
        /// Role to match
        role: Role,
        /// Accessible name filter
        name: Option<TextMatch>,
    },
    /// Smallest element whose text matches
    Text(TextMatch),
    /// `data-testid` attribute
    TestId(String),
    /// DOM `id` attribute (legacy pages without ARIA labelling)
    Id(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Role {
                role,
                name: Some(name),
            } => write!(f, "role={role}[name={name}]"),
            Self::Text(text) => write!(f, "text={text}"),
            Self::TestId(id) => write!(f, "testid={id}"),
            Self::Id(id) => write!(f, "#{id}"),
        }
    }
}

/// Which of several matching elements a locator refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Exactly one element must match
    #[default]
    Only,
    /// First match in document order
    First,
    /// Zero-based match index in document order
    Nth(usize),
    /// Last match in document order
    Last,
}

impl Position {
    /// Resolve against a match count. `None` when the position is not
    /// (yet) satisfiable.
    #[must_use]
    pub const fn resolve(&self, count: usize) -> Option<usize> {
        match *self {
            Self::Only if count == 1 => Some(0),
            Self::Only => None,
            Self::First if count > 0 => Some(0),
            Self::Nth(i) if i < count => Some(i),
            Self::Last if count > 0 => Some(count - 1),
            Self::First | Self::Nth(_) | Self::Last => None,
        }
    }
}

/// A description of an element on the target surface.
#[derive(Debug, Clone)]
pub struct Locator {
    target: Target,
    scope: Option<Box<Locator>>,
    has_text: Option<TextMatch>,
    position: Position,
    timeout: Option<Duration>,
}

impl Locator {
    /// Locate by role and accessible name
    #[must_use]
    pub fn role(role: Role, name: TextMatch) -> Self {
        Self::from_target(Target::Role {
            role,
            name: Some(name),
        })
    }

    /// Locate by role only
    #[must_use]
    pub fn any_role(role: Role) -> Self {
        Self::from_target(Target::Role { role, name: None })
    }

    /// Locate by visible text
    #[must_use]
    pub fn text(text: TextMatch) -> Self {
        Self::from_target(Target::Text(text))
    }

    /// Locate by `data-testid`
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::from_target(Target::TestId(id.into()))
    }

    /// Locate by DOM id
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::from_target(Target::Id(id.into()))
    }

    /// Locate by an explicit target
    #[must_use]
    pub fn from_target(target: Target) -> Self {
        Self {
            target,
            scope: None,
            has_text: None,
            position: Position::Only,
            timeout: None,
        }
    }

    /// Confine matches to descendants of `parent`
    #[must_use]
    pub fn within(mut self, parent: Self) -> Self {
        self.scope = Some(Box::new(parent));
        self
    }

    /// Keep only matches whose text content satisfies `text`
    #[must_use]
    pub fn with_text(mut self, text: TextMatch) -> Self {
        self.has_text = Some(text);
        self
    }

    /// First match in document order
    #[must_use]
    pub const fn first(mut self) -> Self {
        self.position = Position::First;
        self
    }

    /// Zero-based match index
    #[must_use]
    pub const fn nth(mut self, index: usize) -> Self {
        self.position = Position::Nth(index);
        self
    }

    /// Last match in document order
    #[must_use]
    pub const fn last(mut self) -> Self {
        self.position = Position::Last;
        self
    }

    /// Override the step timeout for this locator
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the target
    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    /// Get the scope, if any
    #[must_use]
    pub fn scope(&self) -> Option<&Self> {
        self.scope.as_deref()
    }

    /// Get the text filter, if any
    #[must_use]
    pub const fn has_text(&self) -> Option<&TextMatch> {
        self.has_text.as_ref()
    }

    /// Get the position
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Get the timeout override
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Serializable query consumed by the in-page script. Adapters return
    /// every match and the caller applies the position; the script only
    /// honours positions on scopes.
    #[must_use]
    pub fn to_query(&self) -> Value {
        let target = match &self.target {
            Target::Role { role, name } => json!({
                "by": "role",
                "role": role.as_aria(),
                "name": name.as_ref().map(TextMatch::to_json),
            }),
            Target::Text(text) => json!({ "by": "text", "text": text.to_json() }),
            Target::TestId(id) => json!({ "by": "testid", "value": id }),
            Target::Id(id) => json!({ "by": "id", "value": id }),
        };
        json!({
            "target": target,
            "scope": self.scope.as_ref().map(|s| s.to_query()),
            "hasText": self.has_text.as_ref().map(TextMatch::to_json),
            "position": match self.position {
                Position::Only => json!({ "kind": "only" }),
                Position::First => json!({ "kind": "nth", "index": 0 }),
                Position::Nth(i) => json!({ "kind": "nth", "index": i }),
                Position::Last => json!({ "kind": "last" }),
            },
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scope) = &self.scope {
            write!(f, "{scope} >> ")?;
        }
        write!(f, "{}", self.target)?;
        if let Some(text) = &self.has_text {
            write!(f, "[has-text={text}]")?;
        }
        match self.position {
            Position::Only => Ok(()),
            Position::First => f.write_str(" >> first"),
            Position::Nth(i) => write!(f, " >> nth={i}"),
            Position::Last => f.write_str(" >> last"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod text_match_tests {
        use super::*;

        #[test]
        fn test_exact_is_case_sensitive() {
            let m = TextMatch::exact("Visit Type");
            assert!(m.matches("Visit Type"));
            assert!(m.matches("  Visit\n Type "));
            assert!(!m.matches("visit type"));
            assert!(!m.matches("Visit Type details"));
        }

        #[test]
        fn test_exact_ci_rejects_longer_names() {
            let m = TextMatch::exact_ci("Male");
            assert!(m.matches("male"));
            assert!(!m.matches("Female"));
        }

        #[test]
        fn test_contains_ignores_case() {
            let m = TextMatch::contains("first name");
            assert!(m.matches("First Name"));
            assert!(m.matches("Patient first name (required)"));
            assert!(!m.matches("Family Name"));
        }

        #[test]
        fn test_pattern_json_carries_flags() {
            let m = TextMatch::pattern(r"(?i)^end visit$").unwrap();
            assert!(m.matches("End Visit"));
            let query = m.to_json();
            assert_eq!(query["flags"], "i");
            assert_eq!(query["value"], "^end visit$");
        }

        #[test]
        fn test_invalid_pattern_is_config_error() {
            assert!(matches!(
                TextMatch::pattern("("),
                Err(FlowError::Config { .. })
            ));
        }
    }

    mod position_tests {
        use super::*;

        #[test]
        fn test_only_requires_single_match() {
            assert_eq!(Position::Only.resolve(1), Some(0));
            assert_eq!(Position::Only.resolve(0), None);
            assert_eq!(Position::Only.resolve(2), None);
        }

        #[test]
        fn test_nth_and_last() {
            assert_eq!(Position::Nth(1).resolve(2), Some(1));
            assert_eq!(Position::Nth(1).resolve(1), None);
            assert_eq!(Position::Last.resolve(3), Some(2));
            assert_eq!(Position::First.resolve(0), None);
        }
    }

    mod locator_tests {
        use super::*;

        #[test]
        fn test_display_describes_scope_and_position() {
            let loc = Locator::role(Role::Button, TextMatch::exact_ci("Actions"))
                .within(Locator::role(Role::Banner, TextMatch::contains("patient banner")))
                .first();
            let desc = loc.to_string();
            assert!(desc.starts_with("role=banner"));
            assert!(desc.contains(">> role=button"));
            assert!(desc.ends_with(">> first"));
        }

        #[test]
        fn test_query_shape() {
            let loc = Locator::any_role(Role::Dialog)
                .with_text(TextMatch::contains("end this active visit"));
            let query = loc.to_query();
            assert_eq!(query["target"]["by"], "role");
            assert_eq!(query["target"]["role"], "dialog");
            assert!(query["target"]["name"].is_null());
            assert_eq!(query["hasText"]["kind"], "contains");
            assert!(query["scope"].is_null());
            assert_eq!(query["position"]["kind"], "only");
        }

        #[test]
        fn test_query_scope_keeps_position() {
            let loc = Locator::role(Role::Button, TextMatch::exact_ci("End Visit"))
                .within(Locator::any_role(Role::Dialog).last());
            let query = loc.to_query();
            assert_eq!(query["scope"]["position"]["kind"], "last");
            assert_eq!(query["scope"]["target"]["role"], "dialog");
        }

        #[test]
        fn test_timeout_override() {
            let loc = Locator::test_id("patientSearchBar").with_timeout(Duration::from_secs(3));
            assert_eq!(loc.timeout(), Some(Duration::from_secs(3)));
            assert_eq!(loc.position(), Position::Only);
        }
    }
}
