//! Late-bound values
//!
//! ARNs, URLs and generated names only exist once the engine has created
//! a resource. Declarations refer to them through `${resource.property}`
//! interpolations, which the engine resolves and also treats as data
//! dependencies. A literal `${` is written `$${`.

use serde::{Serialize, Serializer};
use std::fmt;

/// Reference to a property of a declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyRef {
    /// Logical name of the resource
    pub resource: String,
    /// Property path; `None` refers to the resource itself
    pub property: Option<String>,
}

impl PropertyRef {
    pub fn new(resource: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            property: Some(property.into()),
        }
    }

    pub fn resource(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            property: None,
        }
    }
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.property {
            Some(property) => write!(f, "${{{}.{}}}", self.resource, property),
            None => write!(f, "${{{}}}", self.resource),
        }
    }
}

/// A value that may only be known after deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Literal(String),
    Ref(PropertyRef),
    Concat(Vec<Output>),
}

impl Output {
    pub fn literal(value: impl Into<String>) -> Self {
        Output::Literal(value.into())
    }

    /// This value followed by a literal suffix, e.g. `${bucket.arn}/*`
    pub fn suffixed(&self, suffix: &str) -> Self {
        Output::Concat(vec![self.clone(), Output::literal(suffix)])
    }

    /// Resource references contained in this value
    pub fn refs(&self) -> Vec<&PropertyRef> {
        match self {
            Output::Literal(_) => Vec::new(),
            Output::Ref(r) => vec![r],
            Output::Concat(parts) => parts.iter().flat_map(Output::refs).collect(),
        }
    }

    /// Whether the value is fully known at synthesis time
    pub fn is_known(&self) -> bool {
        self.refs().is_empty()
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Literal(s) => f.write_str(&s.replace("${", "$${")),
            Output::Ref(r) => write!(f, "{}", r),
            Output::Concat(parts) => parts.iter().try_for_each(|p| write!(f, "{}", p)),
        }
    }
}

impl Serialize for Output {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&str> for Output {
    fn from(value: &str) -> Self {
        Output::literal(value)
    }
}

impl From<String> for Output {
    fn from(value: String) -> Self {
        Output::Literal(value)
    }
}

impl From<PropertyRef> for Output {
    fn from(value: PropertyRef) -> Self {
        Output::Ref(value)
    }
}

/// Extract every `${...}` reference from rendered text.
///
/// `$${` is an escaped literal and yields nothing. Property paths may use
/// dots or index brackets after the resource name.
pub fn references_in(text: &str) -> Vec<PropertyRef> {
    let mut refs = Vec::new();
    let mut rest = text;

    while let Some(pos) = rest.find("${") {
        if pos > 0 && rest[..pos].ends_with('$') {
            rest = &rest[pos + 2..];
            continue;
        }

        let body = &rest[pos + 2..];
        let Some(end) = body.find('}') else {
            break;
        };
        let inner = body[..end].trim();

        let split = inner.find(['.', '[']).unwrap_or(inner.len());
        let (resource, property) = inner.split_at(split);
        if !resource.is_empty() {
            let property = property.strip_prefix('.').unwrap_or(property);
            refs.push(PropertyRef {
                resource: resource.to_string(),
                property: (!property.is_empty()).then(|| property.to_string()),
            });
        }

        rest = &body[end + 1..];
    }

    refs
}
