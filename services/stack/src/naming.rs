//! Resource naming
//!
//! Every physical name is a pure function of the configured prefix, so
//! re-running synthesis with the same prefix always targets the same
//! resources.

/// Physical names derived from a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub prefix: String,
    pub bucket: String,
    pub queue: String,
    pub dead_letter_queue: String,
    pub role: String,
    pub service_account: String,
    pub cluster: String,
    pub external_id: String,
    pub config_map: String,
}

impl ResourceNames {
    pub fn from_prefix(prefix: &str) -> Self {
        let queue = format!("{}-processing-queue", prefix);
        Self {
            prefix: prefix.to_string(),
            bucket: format!("{}-data-bucket", prefix),
            dead_letter_queue: format!("{}-dlq", queue),
            queue,
            role: format!("{}-k8s-service-role", prefix),
            service_account: format!("{}-service-account", prefix),
            cluster: format!("{}-cluster", prefix),
            external_id: format!("{}-external-id", prefix),
            config_map: format!("{}-aws-resources", prefix),
        }
    }

    pub fn bucket_policy(&self) -> String {
        format!("{}-access-policy", self.bucket)
    }

    pub fn queue_policy(&self) -> String {
        format!("{}-access-policy", self.queue)
    }

    /// `app.kubernetes.io/name` label of the config map
    pub fn config_label(&self) -> String {
        format!("{}-config", self.prefix)
    }
}
