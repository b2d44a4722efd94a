//! Kubernetes Objects
//!
//! Namespace, the IRSA-annotated ServiceAccount and a ConfigMap that tells
//! workloads where their bucket and queues live. Both namespaced objects
//! carry an explicit dependency on the namespace.

use k8s_openapi::api::core::v1::{ConfigMap, Namespace, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{types, MANAGED_BY};
use crate::error::Result;
use crate::output::Output;
use crate::stack::{Resource, ResourceRef, Stack};

/// Annotation EKS reads to inject role credentials into pods
pub const ROLE_ARN_ANNOTATION: &str = "eks.amazonaws.com/role-arn";

/// Label carrying the stack name
pub const ENVIRONMENT_LABEL: &str = "gitops.io/environment";

/// Labels every object shares
fn standard_labels(stack_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/managed-by".to_string(), MANAGED_BY.to_string()),
        (ENVIRONMENT_LABEL.to_string(), stack_name.to_string()),
    ])
}

fn with_name_label(name: &str, stack_name: &str) -> BTreeMap<String, String> {
    let mut labels = standard_labels(stack_name);
    labels.insert("app.kubernetes.io/name".to_string(), name.to_string());
    labels
}

/// Serialize a typed object into resource properties.
///
/// `apiVersion` and `kind` are implied by the type token.
fn manifest_properties<K: Serialize>(object: &K) -> Result<Value> {
    let mut value = serde_json::to_value(object)?;
    if let Some(map) = value.as_object_mut() {
        map.remove("apiVersion");
        map.remove("kind");
    }
    Ok(value)
}

/// Workload-facing settings exposed through the ConfigMap
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    pub bucket_name: Output,
    pub queue_url: Output,
    pub queue_name: Output,
    pub dlq_url: Output,
    pub region: String,
}

impl WorkloadConfig {
    /// Environment-style keys for `envFrom`
    pub fn data(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("S3_BUCKET_NAME".to_string(), self.bucket_name.to_string()),
            ("SQS_QUEUE_URL".to_string(), self.queue_url.to_string()),
            ("SQS_QUEUE_NAME".to_string(), self.queue_name.to_string()),
            ("SQS_DLQ_URL".to_string(), self.dlq_url.to_string()),
            ("AWS_REGION".to_string(), self.region.clone()),
            ("AWS_DEFAULT_REGION".to_string(), self.region.clone()),
        ])
    }
}

pub fn declare_namespace(stack: &mut Stack, namespace: &str, stack_name: &str) -> Result<ResourceRef> {
    let mut labels = standard_labels(stack_name);
    labels.insert("name".to_string(), namespace.to_string());

    let object = Namespace {
        metadata: ObjectMeta {
            name: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    };

    stack.declare(Resource::new(
        "app-namespace",
        types::K8S_NAMESPACE,
        manifest_properties(&object)?,
    ))
}

/// ServiceAccount annotated with the role pods should assume.
pub fn declare_service_account(
    stack: &mut Stack,
    namespace: &ResourceRef,
    namespace_name: &str,
    account_name: &str,
    role_arn: &Output,
    stack_name: &str,
) -> Result<ResourceRef> {
    let object = ServiceAccount {
        metadata: ObjectMeta {
            name: Some(account_name.to_string()),
            namespace: Some(namespace_name.to_string()),
            annotations: Some(BTreeMap::from([(
                ROLE_ARN_ANNOTATION.to_string(),
                role_arn.to_string(),
            )])),
            labels: Some(with_name_label(account_name, stack_name)),
            ..Default::default()
        },
        ..Default::default()
    };

    stack.declare(
        Resource::new(
            "service-account",
            types::K8S_SERVICE_ACCOUNT,
            manifest_properties(&object)?,
        )
        .depends_on(namespace),
    )
}

pub fn declare_config_map(
    stack: &mut Stack,
    namespace: &ResourceRef,
    namespace_name: &str,
    map_name: &str,
    name_label: &str,
    config: &WorkloadConfig,
    stack_name: &str,
) -> Result<ResourceRef> {
    let object = ConfigMap {
        metadata: ObjectMeta {
            name: Some(map_name.to_string()),
            namespace: Some(namespace_name.to_string()),
            labels: Some(with_name_label(name_label, stack_name)),
            ..Default::default()
        },
        data: Some(config.data()),
        ..Default::default()
    };

    stack.declare(
        Resource::new(
            "aws-resources-config",
            types::K8S_CONFIG_MAP,
            manifest_properties(&object)?,
        )
        .depends_on(namespace),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::PropertyRef;
    use serde_json::json;

    fn role_stack() -> (Stack, ResourceRef) {
        let mut stack = Stack::new();
        let role = stack
            .declare(Resource::new("service-account-role", types::IAM_ROLE, json!({})))
            .unwrap();
        (stack, role)
    }

    #[test]
    fn test_namespace_labels() {
        let mut stack = Stack::new();
        let ns = declare_namespace(&mut stack, "apps", "dev").unwrap();
        let props = &stack.get(&ns.name).unwrap().properties;

        assert_eq!(props["metadata"]["name"], "apps");
        assert_eq!(props["metadata"]["labels"]["name"], "apps");
        assert_eq!(props["metadata"]["labels"]["app.kubernetes.io/managed-by"], "Pulumi");
        assert_eq!(props["metadata"]["labels"][ENVIRONMENT_LABEL], "dev");
        assert!(props.get("kind").is_none());
        assert!(props.get("apiVersion").is_none());
    }

    #[test]
    fn test_service_account_annotated_with_role() {
        let (mut stack, role) = role_stack();
        let ns = declare_namespace(&mut stack, "apps", "dev").unwrap();
        let sa = declare_service_account(
            &mut stack,
            &ns,
            "apps",
            "demo-service-account",
            &role.arn(),
            "dev",
        )
        .unwrap();

        let declared = stack.get(&sa.name).unwrap();
        let metadata = &declared.properties["metadata"];
        assert_eq!(metadata["namespace"], "apps");
        assert_eq!(metadata["annotations"][ROLE_ARN_ANNOTATION], "${service-account-role.arn}");
        assert_eq!(metadata["labels"]["app.kubernetes.io/name"], "demo-service-account");
        assert_eq!(declared.depends_on, vec!["app-namespace".to_string()]);
        assert!(declared.dependencies().contains("service-account-role"));
    }

    #[test]
    fn test_config_map_data() {
        let mut stack = Stack::new();
        for name in ["data-bucket", "processing-queue", "dead-letter-queue"] {
            stack
                .declare(Resource::new(name, types::SQS_QUEUE, json!({})))
                .unwrap();
        }
        let ns = declare_namespace(&mut stack, "apps", "dev").unwrap();

        let config = WorkloadConfig {
            bucket_name: Output::Ref(PropertyRef::new("data-bucket", "bucket")),
            queue_url: Output::Ref(PropertyRef::new("processing-queue", "url")),
            queue_name: Output::Ref(PropertyRef::new("processing-queue", "name")),
            dlq_url: Output::Ref(PropertyRef::new("dead-letter-queue", "url")),
            region: "us-west-2".to_string(),
        };
        let cm = declare_config_map(
            &mut stack,
            &ns,
            "apps",
            "demo-aws-resources",
            "demo-config",
            &config,
            "dev",
        )
        .unwrap();

        let declared = stack.get(&cm.name).unwrap();
        let data = &declared.properties["data"];
        assert_eq!(data.as_object().unwrap().len(), 6);
        assert_eq!(data["S3_BUCKET_NAME"], "${data-bucket.bucket}");
        assert_eq!(data["SQS_QUEUE_URL"], "${processing-queue.url}");
        assert_eq!(data["SQS_DLQ_URL"], "${dead-letter-queue.url}");
        assert_eq!(data["AWS_REGION"], "us-west-2");
        assert_eq!(data["AWS_DEFAULT_REGION"], "us-west-2");
        assert_eq!(declared.properties["metadata"]["labels"]["app.kubernetes.io/name"], "demo-config");
        assert_eq!(declared.depends_on, vec!["app-namespace".to_string()]);
    }

    #[test]
    fn test_namespaced_objects_need_namespace() {
        let (mut stack, role) = role_stack();
        let missing = ResourceRef {
            name: "app-namespace".to_string(),
        };
        assert!(declare_service_account(&mut stack, &missing, "apps", "sa", &role.arn(), "dev").is_err());
    }
}
