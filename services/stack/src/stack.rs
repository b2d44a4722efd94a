//! Stack Model
//!
//! An ordered registry of resource declarations and exports. Declarations
//! only reference resources declared before them, so declaration order is
//! always a valid creation order; the engine still computes its own graph
//! from the same `dependsOn` hints and `${...}` references.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::{Result, StackError};
use crate::output::{references_in, Output, PropertyRef};

/// A declared resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Logical name, unique within the stack
    pub name: String,
    /// Engine type token, e.g. `aws:s3:Bucket`
    pub type_token: String,
    /// Input properties, late-bound values rendered as interpolations
    pub properties: Value,
    /// Explicit ordering hints
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(name: impl Into<String>, type_token: &str, properties: Value) -> Self {
        Self {
            name: name.into(),
            type_token: type_token.to_string(),
            properties,
            depends_on: Vec::new(),
        }
    }

    /// Require `other` to be created before this resource
    pub fn depends_on(mut self, other: &ResourceRef) -> Self {
        self.depends_on.push(other.name.clone());
        self
    }

    /// Resources referenced through `${...}` in the properties
    pub fn data_dependencies(&self) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        collect_references(&self.properties, &mut found);
        found
    }

    /// Explicit and data dependencies together
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut all = self.data_dependencies();
        all.extend(self.depends_on.iter().cloned());
        all
    }
}

fn collect_references(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => found.extend(references_in(s).into_iter().map(|r| r.resource)),
        Value::Array(items) => items.iter().for_each(|v| collect_references(v, found)),
        Value::Object(map) => map.values().for_each(|v| collect_references(v, found)),
        _ => {}
    }
}

/// Handle to a declared resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub name: String,
}

impl ResourceRef {
    /// Late-bound property of this resource
    pub fn output(&self, property: &str) -> Output {
        Output::Ref(PropertyRef::new(self.name.clone(), property))
    }

    pub fn id(&self) -> Output {
        self.output("id")
    }

    pub fn arn(&self) -> Output {
        self.output("arn")
    }
}

/// Resources and exports of one stack
#[derive(Debug, Clone, Default)]
pub struct Stack {
    resources: Vec<Resource>,
    exports: Vec<(String, Value)>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource. Rejects duplicate names and references to
    /// resources that are not declared yet.
    pub fn declare(&mut self, resource: Resource) -> Result<ResourceRef> {
        if self.get(&resource.name).is_some() {
            return Err(StackError::DuplicateResource(resource.name));
        }

        for dependency in resource.dependencies() {
            if self.get(&dependency).is_none() {
                return Err(StackError::UnknownReference {
                    from: resource.name.clone(),
                    to: dependency,
                });
            }
        }

        debug!(
            resource = %resource.name,
            type_token = %resource.type_token,
            "Declared resource"
        );

        let handle = ResourceRef {
            name: resource.name.clone(),
        };
        self.resources.push(resource);
        Ok(handle)
    }

    /// Export a value under `name`. Exports may reference any declared
    /// resource.
    pub fn export(&mut self, name: &str, value: impl Serialize) -> Result<()> {
        if self.exports.iter().any(|(existing, _)| existing == name) {
            return Err(StackError::DuplicateResource(format!("export {}", name)));
        }

        let value = serde_json::to_value(value)?;
        let mut referenced = BTreeSet::new();
        collect_references(&value, &mut referenced);
        if let Some(missing) = referenced.into_iter().find(|r| self.get(r).is_none()) {
            return Err(StackError::UnknownReference {
                from: format!("export {}", name),
                to: missing,
            });
        }

        self.exports.push((name.to_string(), value));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Resources in declaration (and creation) order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn exports(&self) -> &[(String, Value)] {
        &self.exports
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
