use super::RoleSet;
use crate::types::Role;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("Route pattern must start with '/': {0}")]
    NotAbsolute(String),

    #[error("Wildcard is only allowed as the last segment: {0}")]
    MisplacedWildcard(String),

    #[error("Parameter segment has no name: {0}")]
    UnnamedParameter(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
    Wildcard,
}

/// Path pattern such as `/courses/:id/tasks` or `/admin/*`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::NotAbsolute(pattern.to_string()));
        }

        let raw: Vec<&str> = split_path(pattern).collect();
        let mut segments = Vec::with_capacity(raw.len());
        for (index, part) in raw.iter().enumerate() {
            let segment = match *part {
                "*" if index + 1 == raw.len() => Segment::Wildcard,
                "*" => return Err(PatternError::MisplacedWildcard(pattern.to_string())),
                ":" => return Err(PatternError::UnnamedParameter(pattern.to_string())),
                p if p.starts_with(':') => Segment::Param,
                p => Segment::Literal(p.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `path` is matched; query string and fragment are ignored
    pub fn matches(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let mut parts = split_path(path);

        for segment in &self.segments {
            match segment {
                // Trailing wildcard also covers the bare prefix
                Segment::Wildcard => return true,
                Segment::Param => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(expected) => {
                    if parts.next() != Some(expected.as_str()) {
                        return false;
                    }
                }
            }
        }

        parts.next().is_none()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl TryFrom<String> for PathPattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PathPattern> for String {
    fn from(pattern: PathPattern) -> Self {
        pattern.source
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Roles allowed on every path matching `pattern`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub pattern: PathPattern,
    #[serde(default)]
    pub roles: RoleSet,
}

impl RouteRule {
    pub fn new(pattern: &str, roles: impl Into<RoleSet>) -> Result<Self, PatternError> {
        Ok(Self {
            pattern: PathPattern::parse(pattern)?,
            roles: roles.into(),
        })
    }
}

/// Static rule table; the first matching rule wins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// Route rules of the learning platform
    pub fn platform_defaults() -> Self {
        let rule = |pattern: &str, roles: RoleSet| RouteRule {
            pattern: PathPattern::parse(pattern).unwrap_or_else(|e| unreachable!("{e}")),
            roles,
        };

        Self::new(vec![
            rule("/admin/*", RoleSet::only(Role::Admin)),
            rule(
                "/instructor/*",
                RoleSet::from([Role::Instructor, Role::Admin]),
            ),
            rule("/courses/:id/manage/*", RoleSet::from([Role::Instructor, Role::Admin])),
            rule("/enrollments/*", RoleSet::only(Role::Student)),
            rule("/tasks/*", RoleSet::any()),
            rule("/courses/*", RoleSet::any()),
            rule("/dashboard/*", RoleSet::any()),
            rule("/profile", RoleSet::any()),
        ])
    }

    /// Rule that governs `path`, or `None` when the path is public
    pub fn rule_for(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.pattern.matches(path))
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern() {
        let pattern = PathPattern::parse("/dashboard").unwrap();
        assert!(pattern.matches("/dashboard"));
        assert!(pattern.matches("/dashboard/"));
        assert!(pattern.matches("/dashboard?tab=tasks"));
        assert!(!pattern.matches("/dashboard/extra"));
        assert!(!pattern.matches("/"));
    }

    #[test]
    fn test_param_pattern() {
        let pattern = PathPattern::parse("/courses/:id/tasks").unwrap();
        assert!(pattern.matches("/courses/12/tasks"));
        assert!(!pattern.matches("/courses/tasks"));
        assert!(!pattern.matches("/courses/12/tasks/3"));
    }

    #[test]
    fn test_wildcard_covers_prefix_and_descendants() {
        let pattern = PathPattern::parse("/admin/*").unwrap();
        assert!(pattern.matches("/admin"));
        assert!(pattern.matches("/admin/users/5"));
        assert!(!pattern.matches("/administrator"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            PathPattern::parse("admin"),
            Err(PatternError::NotAbsolute(_))
        ));
        assert!(matches!(
            PathPattern::parse("/a/*/b"),
            Err(PatternError::MisplacedWildcard(_))
        ));
        assert!(matches!(
            PathPattern::parse("/courses/:"),
            Err(PatternError::UnnamedParameter(_))
        ));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let table = RouteTable::platform_defaults();

        let manage = table.rule_for("/courses/9/manage/grades").unwrap();
        assert!(!manage.roles.admits(Role::Student));

        let course = table.rule_for("/courses/9").unwrap();
        assert!(course.roles.is_any());

        assert!(table.rule_for("/login").is_none());
        assert!(table.rule_for("/").is_none());
    }

    #[test]
    fn test_table_deserializes_from_config_shape() {
        let table: RouteTable = serde_json::from_str(
            r#"[
                {"pattern": "/admin/*", "roles": ["admin"]},
                {"pattern": "/dashboard"}
            ]"#,
        )
        .unwrap();

        assert_eq!(table.rules().len(), 2);
        assert!(table.rule_for("/dashboard").unwrap().roles.is_any());
        assert!(table.rule_for("/admin/x").unwrap().roles.contains(Role::Admin));
    }
}
