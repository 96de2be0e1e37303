//! The `kubernetes_service` resource.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value as Json;
use tracing::{debug, info};

use crate::context::Context;
use crate::error::Result;
use crate::provider::{Lifecycle, ProviderMeta, ResourceDefinition};
use crate::schema::hash::hash_code;
use crate::schema::{AttributeSchema, Element, ResourceData, ResourceSchema, Value};

use super::metadata::{build_id, expand_metadata, flatten_metadata, id_parts, namespaced_metadata_schema, patch_metadata};
use super::patch::{PatchOperation, PatchOperations, escape_json_pointer};
use super::types::{IntOrString, Service, ServicePort, ServiceSpec};

/// Registry entry for `kubernetes_service`.
#[must_use]
pub fn service_resource() -> ResourceDefinition {
    ResourceDefinition::new(service_schema(), ServiceResource)
}

fn service_schema() -> ResourceSchema {
    let port = ResourceSchema::new()
        .attribute("name", AttributeSchema::string().optional())
        .attribute("node_port", AttributeSchema::int().optional_computed())
        .attribute("port", AttributeSchema::int().required())
        .attribute("protocol", AttributeSchema::string().optional().with_default("TCP"))
        .attribute("target_port", AttributeSchema::int().required());

    let spec = ResourceSchema::new()
        .attribute(
            "cluster_ip",
            AttributeSchema::string()
                .optional_computed()
                .force_new()
                .with_description("IP address of the service, usually assigned randomly by the master"),
        )
        .attribute("external_ips", AttributeSchema::set(Element::string()))
        .attribute("external_name", AttributeSchema::string().optional())
        .attribute("load_balancer_ip", AttributeSchema::string().optional())
        .attribute("load_balancer_source_ranges", AttributeSchema::set(Element::string()))
        .attribute(
            "port",
            AttributeSchema::set(Element::block(port))
                .required()
                .with_set_hash(hash_service_port)
                .with_items(1, None),
        )
        .attribute("selector", AttributeSchema::string_map())
        .attribute(
            "session_affinity",
            AttributeSchema::string()
                .optional()
                .with_default("None")
                .with_validation(validate_session_affinity),
        )
        .attribute(
            "type",
            AttributeSchema::string()
                .optional()
                .with_default("ClusterIP")
                .with_validation(validate_service_type),
        );

    ResourceSchema::new()
        .attribute("metadata", namespaced_metadata_schema("service"))
        .attribute(
            "spec",
            AttributeSchema::list(Element::block(spec))
                .required()
                .with_items(1, Some(1))
                .with_description("Spec defines the behavior of a service"),
        )
}

/// Ports hash without `node_port`, which the server assigns.
fn hash_service_port(value: &Value) -> u32 {
    let field = |name: &str| value.lookup(&[name]).map(Value::canonical).unwrap_or_default();
    hash_code(&format!(
        "{}-{}-{}-{}",
        field("name"),
        field("port"),
        field("protocol"),
        field("target_port")
    ))
}

fn validate_session_affinity(value: &Value) -> std::result::Result<(), String> {
    match value.as_str().unwrap_or_default() {
        "ClientIP" | "None" => Ok(()),
        other => Err(format!("expected one of ClientIP, None, got {other:?}")),
    }
}

fn validate_service_type(value: &Value) -> std::result::Result<(), String> {
    match value.as_str().unwrap_or_default() {
        "ClusterIP" | "ExternalName" | "NodePort" | "LoadBalancer" => Ok(()),
        other => Err(format!(
            "expected one of ClusterIP, ExternalName, NodePort, LoadBalancer, got {other:?}"
        )),
    }
}

fn string_at(block: &Value, name: &str) -> String {
    block
        .lookup(&[name])
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn int_at(block: &Value, name: &str) -> i64 {
    block.lookup(&[name]).and_then(Value::as_int).unwrap_or_default()
}

fn strings_at(block: &Value, name: &str) -> Vec<String> {
    block.lookup(&[name]).map(Value::string_elements).unwrap_or_default()
}

fn expand_ports(ports: &Value) -> Vec<ServicePort> {
    ports
        .elements()
        .into_iter()
        .map(|port| ServicePort {
            name: string_at(port, "name"),
            node_port: int_at(port, "node_port"),
            port: int_at(port, "port"),
            protocol: string_at(port, "protocol"),
            target_port: IntOrString::Int(int_at(port, "target_port")),
        })
        .collect()
}

fn expand_spec(block: &Value) -> ServiceSpec {
    ServiceSpec {
        cluster_ip: string_at(block, "cluster_ip"),
        external_ips: strings_at(block, "external_ips"),
        external_name: string_at(block, "external_name"),
        load_balancer_ip: string_at(block, "load_balancer_ip"),
        load_balancer_source_ranges: strings_at(block, "load_balancer_source_ranges"),
        ports: block.lookup(&["port"]).map(expand_ports).unwrap_or_default(),
        selector: block.lookup(&["selector"]).map(Value::string_map).unwrap_or_default(),
        session_affinity: string_at(block, "session_affinity"),
        type_: string_at(block, "type"),
    }
}

fn flatten_ports(ports: &[ServicePort]) -> Value {
    ports
        .iter()
        .map(|port| {
            let mut block: BTreeMap<String, Value> = BTreeMap::new();
            block.insert("name".to_string(), port.name.as_str().into());
            block.insert("node_port".to_string(), port.node_port.into());
            block.insert("port".to_string(), port.port.into());
            block.insert("protocol".to_string(), port.protocol.as_str().into());
            block.insert("target_port".to_string(), port.target_port.int_value().into());
            Value::Map(block)
        })
        .collect::<Vec<_>>()
        .into()
}

fn string_list(items: &[String]) -> Value {
    items.iter().map(Value::from).collect::<Vec<_>>().into()
}

fn flatten_spec(spec: &ServiceSpec) -> Value {
    let mut block: BTreeMap<String, Value> = BTreeMap::new();
    block.insert("cluster_ip".to_string(), spec.cluster_ip.as_str().into());
    block.insert("external_ips".to_string(), string_list(&spec.external_ips));
    block.insert("external_name".to_string(), spec.external_name.as_str().into());
    block.insert("load_balancer_ip".to_string(), spec.load_balancer_ip.as_str().into());
    block.insert(
        "load_balancer_source_ranges".to_string(),
        string_list(&spec.load_balancer_source_ranges),
    );
    block.insert("port".to_string(), flatten_ports(&spec.ports));
    block.insert("selector".to_string(), spec.selector.clone().into());
    block.insert("session_affinity".to_string(), spec.session_affinity.as_str().into());
    block.insert("type".to_string(), spec.type_.as_str().into());
    Value::List(vec![Value::Map(block)])
}

/// Operations for the spec fields that changed.
///
/// A member appearing for the first time is added, one cleared is removed,
/// and anything else is replaced.
fn patch_spec(key_prefix: &str, path_prefix: &str, data: &ResourceData) -> PatchOperations {
    let new_spec = expand_spec(&data.get(key_prefix.trim_end_matches('.')));
    let fields: [(&str, &str, Json); 8] = [
        ("selector", "selector", serde_json::to_value(&new_spec.selector).unwrap_or_default()),
        ("type", "type", Json::String(new_spec.type_.clone())),
        ("session_affinity", "sessionAffinity", Json::String(new_spec.session_affinity.clone())),
        ("load_balancer_ip", "loadBalancerIP", Json::String(new_spec.load_balancer_ip.clone())),
        (
            "load_balancer_source_ranges",
            "loadBalancerSourceRanges",
            serde_json::to_value(&new_spec.load_balancer_source_ranges).unwrap_or_default(),
        ),
        ("port", "ports", serde_json::to_value(&new_spec.ports).unwrap_or_default()),
        ("external_ips", "externalIPs", serde_json::to_value(&new_spec.external_ips).unwrap_or_default()),
        ("external_name", "externalName", Json::String(new_spec.external_name.clone())),
    ];

    let mut ops = PatchOperations::new();
    for (field, member, value) in fields {
        let key = format!("{key_prefix}{field}");
        if !data.has_change(&key) {
            continue;
        }
        let path = format!("{path_prefix}{}", escape_json_pointer(member));
        let (old, new) = data.change(&key);
        let op = if new.is_zero() {
            PatchOperation::Remove { path }
        } else if old.is_zero() {
            PatchOperation::Add { path, value }
        } else {
            PatchOperation::Replace { path, value }
        };
        ops.push(op);
    }
    ops
}

/// Lifecycle of a `v1/Service`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceResource;

#[async_trait]
impl Lifecycle for ServiceResource {
    async fn create(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let client = meta.clients().kubernetes().await?;
        let metadata = expand_metadata(&data.get("metadata.0"));
        let spec = expand_spec(&data.get("spec.0"));
        let namespace = metadata.namespace.clone();
        let service = Service::new(metadata, spec);

        info!("Creating new service in namespace {namespace}");
        let created = ctx
            .run("creating service", client.create_service(&namespace, &service))
            .await
            .map_err(|e| e.labeled("Failed to create service"))?;
        info!("Submitted new service: {}", build_id(&created.metadata));

        data.set_id(build_id(&created.metadata));
        self.read(ctx, data, meta).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let (namespace, name) = id_parts(data.id())?;
        let client = meta.clients().kubernetes().await?;

        debug!("Reading service {name}");
        let service = match ctx
            .run("reading service", client.get_service(&namespace, &name))
            .await
        {
            Ok(service) => service,
            Err(e) if e.is_not_found() => {
                info!("Service {namespace}/{name} no longer exists, removing from state");
                data.set_id("");
                return Ok(());
            }
            Err(e) => return Err(e.labeled("Failed to read service")),
        };
        debug!("Received service: {}", build_id(&service.metadata));

        data.set("metadata", flatten_metadata(&service.metadata))?;
        data.set("spec", flatten_spec(&service.spec))?;
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let (namespace, name) = id_parts(data.id())?;
        let client = meta.clients().kubernetes().await?;

        let mut ops = patch_metadata("metadata.0.", "/metadata/", data);
        if data.has_change("spec") {
            ops.extend(patch_spec("spec.0.", "/spec/", data));
        }

        if ops.is_empty() {
            debug!("Service {namespace}/{name} has nothing to patch");
        } else {
            info!("Updating service {namespace}/{name} with {} patch operations", ops.len());
            ctx.run("updating service", client.patch_service(&namespace, &name, &ops))
                .await
                .map_err(|e| e.labeled(format!("Failed to update service {namespace}/{name}")))?;
            info!("Submitted updated service: {namespace}/{name}");
        }

        self.read(ctx, data, meta).await
    }

    fn supports_update(&self) -> bool {
        true
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let (namespace, name) = id_parts(data.id())?;
        let client = meta.clients().kubernetes().await?;

        info!("Deleting service: {namespace}/{name}");
        match ctx
            .run("deleting service", client.delete_service(&namespace, &name))
            .await
        {
            Ok(()) => info!("Service {namespace}/{name} deleted"),
            Err(e) if e.is_not_found() => debug!("Service {namespace}/{name} was already gone"),
            Err(e) => return Err(e.labeled("Failed to delete service")),
        }

        data.set_id("");
        Ok(())
    }

    async fn exists(&self, ctx: &Context, data: &ResourceData, meta: &ProviderMeta) -> Result<bool> {
        let (namespace, name) = id_parts(data.id())?;
        let client = meta.clients().kubernetes().await?;

        debug!("Checking service {name}");
        match ctx
            .run("checking service", client.get_service(&namespace, &name))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.labeled("Failed to check service")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::kubernetes::MockKubernetesApi;
    use crate::kubernetes::types::ObjectMeta;
    use crate::testing::{FakeClients, test_meta};
    use serde_json::json;
    use std::sync::Arc;

    fn schema() -> Arc<ResourceSchema> {
        Arc::new(service_schema())
    }

    fn remote_service(type_: &str, labels: &[(&str, &str)]) -> Service {
        Service::new(
            ObjectMeta {
                name: "web".to_string(),
                namespace: "default".to_string(),
                labels: labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                generation: 1,
                resource_version: "100".to_string(),
                uid: "5c2d".to_string(),
                ..ObjectMeta::default()
            },
            ServiceSpec {
                cluster_ip: "10.0.0.12".to_string(),
                ports: vec![ServicePort {
                    node_port: 30080,
                    port: 80,
                    protocol: "TCP".to_string(),
                    target_port: IntOrString::Int(8080),
                    ..ServicePort::default()
                }],
                selector: [("app".to_string(), "web".to_string())].into(),
                session_affinity: "None".to_string(),
                type_: type_.to_string(),
                ..ServiceSpec::default()
            },
        )
    }

    fn manifest(type_: &str, labels: serde_json::Value) -> serde_json::Value {
        json!({
            "metadata": [{"name": "web", "labels": labels}],
            "spec": [{
                "selector": {"app": "web"},
                "type": type_,
                "port": [{"port": 80, "target_port": 8080}],
            }],
        })
    }

    fn config(manifest: &serde_json::Value) -> crate::schema::Attributes {
        schema().decode(manifest).expect("manifest should decode")
    }

    #[tokio::test]
    async fn test_create_sets_id_and_hydrates() {
        let mut api = MockKubernetesApi::new();
        api.expect_create_service()
            .times(1)
            .returning(|namespace, service| {
                assert_eq!(namespace, "default");
                assert_eq!(service.spec.ports[0].protocol, "TCP");
                assert_eq!(service.spec.session_affinity, "None");
                Ok(remote_service("ClusterIP", &[("app", "web")]))
            });
        api.expect_get_service()
            .times(1)
            .returning(|namespace, name| {
                assert_eq!((namespace, name), ("default", "web"));
                Ok(remote_service("ClusterIP", &[("app", "web")]))
            });
        let meta = test_meta(FakeClients::default().with_kubernetes(api));

        let mut data = ResourceData::from_config(
            "kubernetes_service",
            schema(),
            config(&manifest("ClusterIP", json!({"app": "web"}))),
        );
        ServiceResource
            .create(&Context::background(), &mut data, &meta)
            .await
            .expect("create should succeed");

        assert_eq!(data.id(), "default/web");
        assert_eq!(data.get_string("spec.0.cluster_ip"), "10.0.0.12");
        assert_eq!(data.get_string("metadata.0.uid"), "5c2d");
        assert_eq!(data.get_int("metadata.0.generation"), 1);
    }

    #[tokio::test]
    async fn test_read_not_found_clears_id() {
        let mut api = MockKubernetesApi::new();
        api.expect_get_service()
            .returning(|_, _| Err(ApiError::not_found("services \"web\" not found").into()));
        let meta = test_meta(FakeClients::default().with_kubernetes(api));

        let mut data = ResourceData::for_import("kubernetes_service", schema(), "default/web");
        ServiceResource
            .read(&Context::background(), &mut data, &meta)
            .await
            .expect("read should succeed");
        assert_eq!(data.id(), "");
    }

    #[tokio::test]
    async fn test_update_patches_changed_fields() {
        let mut prior = ResourceData::for_import("kubernetes_service", schema(), "default/web");
        prior
            .set("metadata", flatten_metadata(&remote_service("ClusterIP", &[("app", "web")]).metadata))
            .expect("metadata");
        prior
            .set("spec", flatten_spec(&remote_service("ClusterIP", &[]).spec))
            .expect("spec");
        let prior = prior.state().expect("state");

        let mut api = MockKubernetesApi::new();
        api.expect_patch_service()
            .times(1)
            .returning(|namespace, name, ops| {
                assert_eq!((namespace, name), ("default", "web"));
                let wire = serde_json::to_value(ops).expect("serialize");
                assert_eq!(
                    wire,
                    json!([
                        {"op": "add", "path": "/metadata/labels/tier", "value": "frontend"},
                        {"op": "replace", "path": "/spec/type", "value": "NodePort"},
                    ])
                );
                Ok(remote_service("NodePort", &[("app", "web"), ("tier", "frontend")]))
            });
        api.expect_get_service()
            .returning(|_, _| Ok(remote_service("NodePort", &[("app", "web"), ("tier", "frontend")])));
        let meta = test_meta(FakeClients::default().with_kubernetes(api));

        let mut data = ResourceData::new(
            "kubernetes_service",
            schema(),
            Some(&prior),
            Some(config(&manifest("NodePort", json!({"app": "web", "tier": "frontend"})))),
        )
        .expect("data");
        assert!(data.has_change("spec"));
        assert!(!data.has_change("spec.0.port"));

        ServiceResource
            .update(&Context::background(), &mut data, &meta)
            .await
            .expect("update should succeed");
        assert_eq!(data.get_string("spec.0.type"), "NodePort");
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing() {
        let mut api = MockKubernetesApi::new();
        api.expect_delete_service()
            .times(1)
            .returning(|_, _| Err(ApiError::not_found("gone").into()));
        let meta = test_meta(FakeClients::default().with_kubernetes(api));

        let mut data = ResourceData::for_import("kubernetes_service", schema(), "default/web");
        ServiceResource
            .delete(&Context::background(), &mut data, &meta)
            .await
            .expect("delete should succeed");
        assert_eq!(data.id(), "");
    }

    #[tokio::test]
    async fn test_exists_maps_not_found() {
        let mut api = MockKubernetesApi::new();
        api.expect_get_service()
            .returning(|_, _| Err(ApiError::not_found("gone").into()));
        api.expect_delete_service().never();
        let meta = test_meta(FakeClients::default().with_kubernetes(api));

        let data = ResourceData::for_import("kubernetes_service", schema(), "default/web");
        let exists = ServiceResource
            .exists(&Context::background(), &data, &meta)
            .await
            .expect("exists should succeed");
        assert!(!exists);
    }

    #[test]
    fn test_port_hash_ignores_node_port() {
        let configured = config(&manifest("ClusterIP", json!({})));
        let Some(Value::Set(ports)) = configured["spec"].lookup(&["0", "port"]) else {
            panic!("ports should decode to a set");
        };
        let assigned = flatten_ports(&remote_service("ClusterIP", &[]).spec.ports);
        let remote_code = hash_service_port(assigned.elements()[0]).to_string();

        assert_eq!(ports.keys().collect::<Vec<_>>(), vec![&remote_code]);
    }

    #[test]
    fn test_schema_rejects_bad_type() {
        let attrs = config(&manifest("Bogus", json!({})));
        assert!(schema().validate_config(&attrs).is_err());
    }
}
