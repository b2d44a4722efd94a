//! Program Rendering
//!
//! Serializes a [`Stack`] as a Pulumi YAML program (`runtime: yaml`).
//! Resources keep their declaration order; explicit ordering hints become
//! `options.dependsOn`, data dependencies stay as `${...}` interpolations.

use serde_yaml::{Mapping, Value as YamlValue};

use crate::error::Result;
use crate::output::PropertyRef;
use crate::stack::{Resource, Stack};

/// Program-level metadata
#[derive(Debug, Clone)]
pub struct ProgramMeta {
    pub project: String,
    pub description: String,
}

impl ProgramMeta {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            description: "GitOps infrastructure: S3, SQS, IAM (IRSA) and Kubernetes integration"
                .to_string(),
        }
    }
}

fn key(name: &str) -> YamlValue {
    YamlValue::String(name.to_string())
}

fn resource_entry(resource: &Resource) -> Result<YamlValue> {
    let mut entry = Mapping::new();
    entry.insert(key("type"), key(&resource.type_token));
    entry.insert(key("properties"), serde_yaml::to_value(&resource.properties)?);

    if !resource.depends_on.is_empty() {
        let depends_on = resource
            .depends_on
            .iter()
            .map(|name| key(&PropertyRef::resource(name.clone()).to_string()))
            .collect();
        let mut options = Mapping::new();
        options.insert(key("dependsOn"), YamlValue::Sequence(depends_on));
        entry.insert(key("options"), YamlValue::Mapping(options));
    }

    Ok(YamlValue::Mapping(entry))
}

/// Build the program document.
pub fn to_document(stack: &Stack, meta: &ProgramMeta) -> Result<YamlValue> {
    let mut resources = Mapping::new();
    for resource in stack.resources() {
        resources.insert(key(&resource.name), resource_entry(resource)?);
    }

    let mut outputs = Mapping::new();
    for (name, value) in stack.exports() {
        outputs.insert(key(name), serde_yaml::to_value(value)?);
    }

    let mut doc = Mapping::new();
    doc.insert(key("name"), key(&meta.project));
    doc.insert(key("runtime"), key("yaml"));
    doc.insert(key("description"), key(&meta.description));
    doc.insert(key("resources"), YamlValue::Mapping(resources));
    doc.insert(key("outputs"), YamlValue::Mapping(outputs));

    Ok(YamlValue::Mapping(doc))
}

/// Render the program as YAML text.
pub fn render(stack: &Stack, meta: &ProgramMeta) -> Result<String> {
    Ok(serde_yaml::to_string(&to_document(stack, meta)?)?)
}

/// Render a plain-text listing of resources in creation order.
pub fn render_plan(stack: &Stack) -> String {
    let mut out = format!("{:<28} {:<52} {}\n", "RESOURCE", "TYPE", "DEPENDS ON");
    out.push_str(&"-".repeat(110));
    out.push('\n');

    for resource in stack.resources() {
        let deps: Vec<String> = resource.dependencies().into_iter().collect();
        let deps = if deps.is_empty() {
            "-".to_string()
        } else {
            deps.join(", ")
        };
        out.push_str(&format!(
            "{:<28} {:<52} {}\n",
            resource.name, resource.type_token, deps
        ));
    }

    out.push_str(&format!("\n{} resources, {} outputs\n", stack.resources().len(), stack.exports().len()));
    for (name, _) in stack.exports() {
        out.push_str(&format!("  {}\n", name));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Stack {
        let mut stack = Stack::new();
        let ns = stack
            .declare(Resource::new(
                "app-namespace",
                "kubernetes:core/v1:Namespace",
                json!({"metadata": {"name": "apps"}}),
            ))
            .unwrap();
        let bucket = stack
            .declare(Resource::new("data-bucket", "aws:s3:Bucket", json!({"bucket": "b"})))
            .unwrap();
        stack
            .declare(
                Resource::new(
                    "aws-resources-config",
                    "kubernetes:core/v1:ConfigMap",
                    json!({"data": {"S3_BUCKET_NAME": bucket.output("bucket")}}),
                )
                .depends_on(&ns),
            )
            .unwrap();
        stack.export("bucket_arn", bucket.arn()).unwrap();
        stack
    }

    #[test]
    fn test_document_shape() {
        let doc = to_document(&sample(), &ProgramMeta::new("gitops-infra")).unwrap();

        assert_eq!(doc["name"], key("gitops-infra"));
        assert_eq!(doc["runtime"], key("yaml"));

        let resources = doc["resources"].as_mapping().unwrap();
        let names: Vec<&str> = resources.keys().filter_map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["app-namespace", "data-bucket", "aws-resources-config"]);

        let config_map = &doc["resources"]["aws-resources-config"];
        assert_eq!(config_map["type"], key("kubernetes:core/v1:ConfigMap"));
        assert_eq!(
            config_map["options"]["dependsOn"][0],
            key("${app-namespace}")
        );
        assert_eq!(
            config_map["properties"]["data"]["S3_BUCKET_NAME"],
            key("${data-bucket.bucket}")
        );
        assert!(doc["resources"]["data-bucket"].get("options").is_none());
        assert_eq!(doc["outputs"]["bucket_arn"], key("${data-bucket.arn}"));
    }

    #[test]
    fn test_render_is_parseable_yaml() {
        let text = render(&sample(), &ProgramMeta::new("gitops-infra")).unwrap();
        let parsed: YamlValue = serde_yaml::from_str(&text).unwrap();
        assert_eq!(parsed["resources"]["data-bucket"]["properties"]["bucket"], key("b"));
    }

    #[test]
    fn test_plan_lists_dependencies() {
        let plan = render_plan(&sample());
        let line = plan
            .lines()
            .find(|l| l.starts_with("aws-resources-config"))
            .unwrap();
        assert!(line.contains("app-namespace, data-bucket"));
        assert!(plan.contains("3 resources, 1 outputs"));
        assert!(plan.contains("  bucket_arn"));
    }
}
