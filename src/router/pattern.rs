//! Path patterns: static segments, `:name` parameters, trailing `*name` catch-all.

use super::params::PathParams;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    CatchAll(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };
        let rest = pattern.strip_prefix('/').ok_or_else(|| invalid("must start with '/'"))?;

        let parts: Vec<&str> = rest.split('/').collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("parameter without a name"));
                }
                Segment::Param(name.to_string())
            } else if let Some(name) = part.strip_prefix('*') {
                if name.is_empty() {
                    return Err(invalid("catch-all without a name"));
                }
                if i + 1 != parts.len() {
                    return Err(invalid("catch-all must be the last segment"));
                }
                Segment::CatchAll(name.to_string())
            } else {
                Segment::Static(part.to_string())
            };
            segments.push(segment);
        }

        let mut names: Vec<&str> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(n) | Segment::CatchAll(n) => Some(n.as_str()),
                Segment::Static(_) => None,
            })
            .collect();
        let declared = names.len();
        names.sort_unstable();
        names.dedup();
        if names.len() != declared {
            return Err(invalid("duplicate parameter name"));
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of static segments; the most specific match wins.
    pub fn specificity(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Static(_)))
            .count()
    }

    /// Match a request path, returning its parameters on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let rest = path.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let mut params = PathParams::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Static(expected) => {
                    if parts.next()? != expected {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.next()?;
                    if value.is_empty() {
                        return None;
                    }
                    params.push(name.as_str(), value);
                }
                Segment::CatchAll(name) => {
                    parts.next()?;
                    let remainder: Vec<&str> = rest.split('/').skip(i).collect();
                    params.push(name.as_str(), remainder.join("/"));
                    return Some(params);
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}
