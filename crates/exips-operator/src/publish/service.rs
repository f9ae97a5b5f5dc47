//! Kubernetes Service backend
//!
//! The published record is a selector-less ClusterIP Service whose
//! `externalIPs` carry the node addresses. Ingress controllers pick the list
//! up from there; no pods back the Service.

use super::{PublishedRecord, Publisher};
use crate::error::PublishError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Server-side apply field owner.
pub const FIELD_MANAGER: &str = "exips-service";

const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
const MANAGED_BY: &str = "exips";
const PLACEHOLDER_PORT_NAME: &str = "dummy";
const PLACEHOLDER_PORT: i32 = 6942;

/// Builds the desired Service for the given address list.
pub fn service_manifest(name: &str, namespace: &str, external_ips: Vec<String>) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.to_string(),
                MANAGED_BY.to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            ports: Some(vec![ServicePort {
                name: Some(PLACEHOLDER_PORT_NAME.to_string()),
                port: PLACEHOLDER_PORT,
                target_port: Some(IntOrString::Int(PLACEHOLDER_PORT)),
                ..Default::default()
            }]),
            external_ips: Some(external_ips),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn record_from_service(name: &str, svc: Service) -> PublishedRecord {
    let external_ips = svc
        .spec
        .and_then(|s| s.external_ips)
        .unwrap_or_default();
    PublishedRecord::new(name, external_ips)
}

/// Publishes records as Services through the Kubernetes API.
#[derive(Clone)]
pub struct KubeServicePublisher {
    client: Client,
}

impl KubeServicePublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl Publisher for KubeServicePublisher {
    #[instrument(skip(self))]
    async fn read(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<PublishedRecord>, PublishError> {
        let svc = self
            .api(namespace)
            .get_opt(name)
            .await
            .map_err(|source| PublishError::Read {
                name: name.to_string(),
                namespace: namespace.to_string(),
                source,
            })?;
        Ok(svc.map(|svc| record_from_service(name, svc)))
    }

    #[instrument(skip(self, record), fields(name = %record.name))]
    async fn write(&self, record: &PublishedRecord, namespace: &str) -> Result<(), PublishError> {
        let svc = service_manifest(&record.name, namespace, record.external_ips.clone());
        let params = PatchParams::apply(FIELD_MANAGER).force();
        self.api(namespace)
            .patch(&record.name, &params, &Patch::Apply(&svc))
            .await
            .map_err(|source| PublishError::Write {
                name: record.name.clone(),
                namespace: namespace.to_string(),
                source,
            })?;
        debug!(ips = ?record.external_ips, "Applied service");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_shape() {
        let svc = service_manifest("exips", "ingress", vec!["198.51.100.1".to_string()]);
        assert_eq!(svc.metadata.name.as_deref(), Some("exips"));
        assert_eq!(svc.metadata.namespace.as_deref(), Some("ingress"));

        let spec = svc.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        assert!(spec.selector.is_none());
        assert_eq!(spec.external_ips, Some(vec!["198.51.100.1".to_string()]));

        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 6942);
        assert_eq!(ports[0].target_port, Some(IntOrString::Int(6942)));
    }

    #[test]
    fn test_manifest_serializes_type_meta() {
        let svc = service_manifest("exips", "exips", vec![]);
        let value = serde_json::to_value(&svc).unwrap();
        assert_eq!(value["apiVersion"], "v1");
        assert_eq!(value["kind"], "Service");
        assert_eq!(value["spec"]["externalIPs"], serde_json::json!([]));
    }

    #[test]
    fn test_record_from_service() {
        let svc = service_manifest(
            "exips",
            "exips",
            vec!["198.51.100.1".to_string(), "198.51.100.2".to_string()],
        );
        let record = record_from_service("exips", svc);
        assert_eq!(
            record,
            PublishedRecord::new("exips", vec!["198.51.100.1".into(), "198.51.100.2".into()])
        );
    }

    #[test]
    fn test_record_without_external_ips_is_empty() {
        let svc = Service {
            spec: Some(ServiceSpec::default()),
            ..Default::default()
        };
        assert!(record_from_service("exips", svc).external_ips.is_empty());
    }
}
