//! Route path normalization and template matching.

use std::fmt;

use super::RouterError;

/// Collapses repeated slashes, ensures a leading slash and strips a trailing
/// one, except for the root.
#[must_use]
pub fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Joins a controller base path and a handler path.
#[must_use]
pub fn join(base: &str, path: &str) -> String {
    normalize(&format!("{base}/{path}"))
}

/// Segments of a normalized path; the root has none.
#[must_use]
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|part| !part.is_empty()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
            Some(name) if !name.is_empty() => Self::Variable(name.to_owned()),
            _ => Self::Literal(raw.to_owned()),
        }
    }
}

/// A normalized route path whose `{name}` segments capture request segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    path: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Normalizes and parses `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::DuplicateTemplateVariable`] when a variable
    /// name repeats.
    pub fn parse(path: &str) -> Result<Self, RouterError> {
        let normalized = normalize(path);
        let parsed: Vec<Segment> = segments(&normalized).into_iter().map(Segment::parse).collect();
        let mut seen: Vec<&str> = Vec::new();
        for segment in &parsed {
            if let Segment::Variable(name) = segment {
                if seen.contains(&name.as_str()) {
                    return Err(RouterError::DuplicateTemplateVariable {
                        path: normalized,
                        variable: name.clone(),
                    });
                }
                seen.push(name);
            }
        }
        Ok(Self {
            path: normalized,
            segments: parsed,
        })
    }

    /// The normalized template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Variable names in template order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Returns `true` when the template declares `name`.
    #[must_use]
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables().any(|variable| variable == name)
    }

    /// Matches already-split request segments. Literals compare exactly;
    /// variables capture the raw segment.
    #[must_use]
    pub fn matches(&self, request: &[&str]) -> Option<PathVariables> {
        if request.len() != self.segments.len() {
            return None;
        }
        let mut variables = PathVariables::default();
        for (segment, actual) in self.segments.iter().zip(request) {
            match segment {
                Segment::Literal(literal) if literal == actual => {}
                Segment::Literal(_) => return None,
                Segment::Variable(name) => variables.insert(name, actual),
            }
        }
        Some(variables)
    }

    /// Returns `true` when both templates match exactly the same paths.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(left), Segment::Literal(right)) => left == right,
                    (Segment::Variable(_), Segment::Variable(_)) => true,
                    _ => false,
                })
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Values captured by template variables, in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathVariables {
    entries: Vec<(String, String)>,
}

impl PathVariables {
    fn insert(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_owned(), value.to_owned()));
    }

    /// The raw segment captured for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Captured pairs in template order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of captured variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
