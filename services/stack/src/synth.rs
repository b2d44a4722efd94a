//! Stack Synthesis
//!
//! One linear declaration pass over already-validated settings:
//! storage, queues, caller identity and trust, the workload role, the
//! Kubernetes objects and finally the exports. Configuration errors abort
//! before this module is reached, so no partial stack is ever produced
//! for incomplete settings.

use serde_json::json;
use tracing::info;

use crate::cloud::CloudLookup;
use crate::config::StackSettings;
use crate::error::{Result, StackError};
use crate::naming::ResourceNames;
use crate::resources::kubernetes::{self, WorkloadConfig};
use crate::resources::storage::{declare_storage, BucketSpec};
use crate::resources::{common_tags, iam, queue};
use crate::stack::Stack;
use crate::trust::{resolve_trust_policy, TrustContext, TrustVariant};

/// A synthesized stack plus the trust branch that was taken
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub stack: Stack,
    pub trust: TrustVariant,
}

/// Declare every resource of the stack.
pub async fn synthesize(settings: &StackSettings, lookup: &dyn CloudLookup) -> Result<Synthesis> {
    let names = ResourceNames::from_prefix(&settings.prefix);
    let tags = common_tags(&settings.stack, &settings.prefix);
    let mut stack = Stack::new();

    info!(
        stack = %settings.stack,
        prefix = %settings.prefix,
        region = %settings.region,
        namespace = %settings.namespace,
        "Synthesizing stack"
    );

    // S3
    let storage = declare_storage(
        &mut stack,
        &BucketSpec::new(names.bucket.clone(), tags.clone()),
        &names.bucket_policy(),
    )?;

    // SQS
    let queues = queue::declare_queues(
        &mut stack,
        &names.queue,
        &names.dead_letter_queue,
        &names.queue_policy(),
        &tags,
    )?;

    // IRSA
    let identity = lookup
        .caller_identity()
        .await
        .map_err(|e| StackError::CallerIdentity(format!("{:#}", e)))?;
    let trust = resolve_trust_policy(
        lookup,
        &TrustContext {
            identity,
            namespace: settings.namespace.clone(),
            names: names.clone(),
        },
    )
    .await;

    let role = iam::declare_role(&mut stack, &names.role, &trust, &tags)?;
    iam::attach_policy(&mut stack, "s3-policy-attachment", &role, &storage.access_policy)?;
    iam::attach_policy(&mut stack, "sqs-policy-attachment", &role, &queues.access_policy)?;

    // Kubernetes
    let namespace = kubernetes::declare_namespace(&mut stack, &settings.namespace, &settings.stack)?;
    let service_account = kubernetes::declare_service_account(
        &mut stack,
        &namespace,
        &settings.namespace,
        &names.service_account,
        &role.arn(),
        &settings.stack,
    )?;
    let workload = WorkloadConfig {
        bucket_name: storage.bucket.output("bucket"),
        queue_url: queues.queue.output("url"),
        queue_name: queues.queue.output("name"),
        dlq_url: queues.dead_letter.output("url"),
        region: settings.region.clone(),
    };
    kubernetes::declare_config_map(
        &mut stack,
        &namespace,
        &settings.namespace,
        &names.config_map,
        &names.config_label(),
        &workload,
        &settings.stack,
    )?;

    // Outputs
    stack.export("bucket_name", storage.bucket.output("bucket"))?;
    stack.export("bucket_arn", storage.bucket.arn())?;
    stack.export("bucket_domain_name", storage.bucket.output("bucketDomainName"))?;
    stack.export("queue_url", queues.queue.output("url"))?;
    stack.export("queue_arn", queues.queue.arn())?;
    stack.export("queue_name", queues.queue.output("name"))?;
    stack.export("dlq_url", queues.dead_letter.output("url"))?;
    stack.export("dlq_arn", queues.dead_letter.arn())?;
    stack.export("service_account_role_arn", role.arn())?;
    stack.export("service_account_role_name", role.output("name"))?;
    stack.export("kubernetes_namespace", &settings.namespace)?;
    stack.export(
        "kubernetes_service_account_name",
        service_account.output("metadata.name"),
    )?;
    stack.export("s3_access_policy_arn", storage.access_policy.arn())?;
    stack.export("sqs_access_policy_arn", queues.access_policy.arn())?;
    stack.export(
        "config",
        json!({
            "region": settings.region,
            "prefix": settings.prefix,
            "namespace": settings.namespace,
            "stack": settings.stack,
        }),
    )?;

    info!(
        resources = stack.resources().len(),
        outputs = stack.exports().len(),
        federated = trust.is_federated(),
        "Stack synthesized"
    );

    Ok(Synthesis {
        stack,
        trust: trust.variant,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{CallerIdentity, StaticCloudLookup};
    use crate::config::ConfigStore;
    use crate::program::{to_document, ProgramMeta};
    use crate::resources::queue::MAX_RECEIVE_COUNT;

    fn settings() -> StackSettings {
        StackSettings {
            project: "gitops-infra".to_string(),
            stack: "dev".to_string(),
            region: "us-west-2".to_string(),
            prefix: "demo".to_string(),
            namespace: "apps".to_string(),
        }
    }

    fn offline() -> StaticCloudLookup {
        StaticCloudLookup::new(CallerIdentity::new("123456789012", "aws"))
    }

    #[tokio::test]
    async fn test_declares_every_resource() {
        let synthesis = synthesize(&settings(), &offline()).await.unwrap();
        let names: Vec<&str> = synthesis
            .stack
            .resources()
            .iter()
            .map(|r| r.name.as_str())
            .collect();

        assert_eq!(
            names,
            vec![
                "data-bucket",
                "bucket-versioning",
                "bucket-encryption",
                "bucket-public-access-block",
                "s3-access-policy",
                "dead-letter-queue",
                "processing-queue",
                "sqs-access-policy",
                "service-account-role",
                "s3-policy-attachment",
                "sqs-policy-attachment",
                "app-namespace",
                "service-account",
                "aws-resources-config",
            ]
        );
        assert_eq!(synthesis.stack.exports().len(), 15);
    }

    #[tokio::test]
    async fn test_names_derive_from_prefix() {
        let synthesis = synthesize(&settings(), &offline()).await.unwrap();
        let stack = &synthesis.stack;

        assert_eq!(stack.get("data-bucket").unwrap().properties["bucket"], "demo-data-bucket");
        assert_eq!(
            stack.get("processing-queue").unwrap().properties["name"],
            "demo-processing-queue"
        );
        assert_eq!(
            stack.get("dead-letter-queue").unwrap().properties["name"],
            "demo-processing-queue-dlq"
        );
        assert_eq!(
            stack.get("service-account-role").unwrap().properties["name"],
            "demo-k8s-service-role"
        );
        assert_eq!(
            stack.get("aws-resources-config").unwrap().properties["metadata"]["name"],
            "demo-aws-resources"
        );
    }

    #[tokio::test]
    async fn test_missing_cluster_selects_account_root() {
        let synthesis = synthesize(&settings(), &offline()).await.unwrap();
        assert_eq!(
            synthesis.trust,
            TrustVariant::AccountRoot {
                external_id: "demo-external-id".to_string()
            }
        );

        let role = synthesis.stack.get("service-account-role").unwrap();
        let statement = &role.properties["assumeRolePolicy"]["fn::toJSON"]["Statement"][0];
        assert_eq!(statement["Principal"]["AWS"], "arn:aws:iam::123456789012:root");
        assert!(!role.properties.to_string().contains("Federated"));
    }

    #[tokio::test]
    async fn test_found_cluster_selects_federated() {
        let lookup = offline().with_oidc_issuer("https://oidc.example.com/id/ABC");
        let synthesis = synthesize(&settings(), &lookup).await.unwrap();
        assert!(matches!(synthesis.trust, TrustVariant::Federated { .. }));

        let role = synthesis.stack.get("service-account-role").unwrap();
        let statement = &role.properties["assumeRolePolicy"]["fn::toJSON"]["Statement"][0];
        assert_eq!(
            statement["Principal"]["Federated"],
            "arn:aws:iam::123456789012:oidc-provider/oidc.example.com/id/ABC"
        );
        assert_eq!(
            statement["Condition"]["StringEquals"]["oidc.example.com/id/ABC:sub"],
            "system:serviceaccount:apps:demo-service-account"
        );
    }

    #[tokio::test]
    async fn test_redrive_count_independent_of_input() {
        for prefix in ["a", "team-b", "c-prod"] {
            let mut s = settings();
            s.prefix = prefix.to_string();
            let synthesis = synthesize(&s, &offline()).await.unwrap();
            let queue = synthesis.stack.get("processing-queue").unwrap();
            assert_eq!(
                queue.properties["redrivePolicy"]["fn::toJSON"]["maxReceiveCount"],
                MAX_RECEIVE_COUNT
            );
        }
    }

    #[tokio::test]
    async fn test_storage_policy_has_two_resources() {
        let synthesis = synthesize(&settings(), &offline()).await.unwrap();
        let policy = synthesis.stack.get("s3-access-policy").unwrap();
        let resources = policy.properties["policy"]["fn::toJSON"]["Statement"][0]["Resource"]
            .as_array()
            .unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[1], "${data-bucket.arn}/*");
    }

    #[tokio::test]
    async fn test_exports_and_config_echo() {
        let synthesis = synthesize(&settings(), &offline()).await.unwrap();
        let exports = synthesis.stack.exports();
        let get = |name: &str| {
            exports
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };

        assert_eq!(get("bucket_domain_name"), "${data-bucket.bucketDomainName}");
        assert_eq!(get("kubernetes_namespace"), "apps");
        assert_eq!(
            get("kubernetes_service_account_name"),
            "${service-account.metadata.name}"
        );
        assert_eq!(
            get("config"),
            json!({"region": "us-west-2", "prefix": "demo", "namespace": "apps", "stack": "dev"})
        );
    }

    #[tokio::test]
    async fn test_program_renders() {
        let synthesis = synthesize(&settings(), &offline()).await.unwrap();
        let doc = to_document(&synthesis.stack, &ProgramMeta::new("gitops-infra")).unwrap();
        assert_eq!(doc["resources"].as_mapping().unwrap().len(), 14);
        assert_eq!(doc["outputs"].as_mapping().unwrap().len(), 15);
    }

    #[test]
    fn test_missing_config_produces_no_stack() {
        let store = ConfigStore::from_overrides(&[
            "aws:region=us-west-2".to_string(),
            "kubernetes:namespace=apps".to_string(),
        ])
        .unwrap();

        // Settings fail first, so synthesize is never reached.
        let err = StackSettings::from_store("gitops-infra", "dev", &store).unwrap_err();
        assert!(matches!(err, StackError::MissingConfig { key } if key == "project:prefix"));
    }

    struct NoIdentity;

    #[async_trait::async_trait]
    impl CloudLookup for NoIdentity {
        async fn caller_identity(&self) -> anyhow::Result<CallerIdentity> {
            anyhow::bail!("no credentials")
        }

        async fn cluster(&self, _name: &str) -> anyhow::Result<crate::cloud::ClusterInfo> {
            anyhow::bail!("unreachable")
        }
    }

    #[tokio::test]
    async fn test_caller_identity_failure_is_fatal() {
        let err = synthesize(&settings(), &NoIdentity).await.unwrap_err();
        assert!(matches!(err, StackError::CallerIdentity(msg) if msg.contains("no credentials")));
    }
}
