//! GitOps Stack Library
//!
//! Declares the AWS and Kubernetes resources a GitOps-managed workload
//! needs (bucket, processing queue with dead-letter queue, IRSA role,
//! namespace, service account, config map) and renders them as a Pulumi
//! YAML program the engine can deploy.

pub mod cloud;
pub mod config;
pub mod error;
pub mod naming;
pub mod output;
pub mod policy;
pub mod program;
pub mod resources;
pub mod stack;
pub mod synth;
pub mod trust;

pub use cloud::{AwsCloudLookup, CallerIdentity, CloudLookup, StaticCloudLookup};
pub use config::{ConfigStore, StackSettings};
pub use error::{Result, StackError};
pub use program::ProgramMeta;
pub use stack::Stack;
pub use synth::{synthesize, Synthesis};
