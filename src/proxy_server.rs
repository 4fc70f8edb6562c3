//! Desired state of the foundation proxy server: its `Deployment`, its
//! `Service` and the `APIService`s aggregating it into the cluster API.
//!
//! Every function here is a pure builder. Owner metadata is taken from the
//! `BackplaneConfig`; the only failure is a `BackplaneConfig` missing the
//! metadata an owner reference needs.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{
            Affinity, Container, HTTPGetAction, PodAffinityTerm, PodAntiAffinity, PodSpec,
            PodTemplateSpec, Probe, ResourceRequirements, SecretVolumeSource, Service,
            ServicePort, ServiceSpec, Toleration, Volume, VolumeMount, WeightedPodAffinityTerm,
        },
    },
    apimachinery::pkg::{
        api::resource::Quantity,
        apis::meta::v1::{LabelSelector, LabelSelectorRequirement},
        util::intstr::IntOrString,
    },
};
use kube::core::ObjectMeta;

use crate::{
    Result,
    api_service::{APIService, APIServiceSpec, APIServiceSpecService},
    backplane_config::{BackplaneConfig, Config},
    kubernetes::{
        Annotations, Labels, Object, Resource, SelectorLabels,
        constants::APP_KUBERNETES_IO_COMPONENT_KEY, try_with_owner_labels,
    },
};

/*
 * ============================================================================
 * Constants
 * ============================================================================
 */
/// Name of the proxy server `Deployment`, `Service` and serving certificate `Secret`.
pub const OCM_PROXY_SERVER_NAME: &str = "ocm-proxyserver";

pub const KLUSTERLET_SECRET_NAME: &str = "ocm-klusterlet-self-signed-secrets";

pub const OCM_PROXY_API_SERVICE_NAME: &str = "v1beta1.proxy.open-cluster-management.io";
pub const OCM_CLUSTER_VIEW_V1_API_SERVICE_NAME: &str = "v1.clusterview.open-cluster-management.io";
pub const OCM_CLUSTER_VIEW_V1ALPHA1_API_SERVICE_NAME: &str =
    "v1alpha1.clusterview.open-cluster-management.io";

pub const OCM_PROXY_GROUP: &str = "proxy.open-cluster-management.io";
pub const OCM_CLUSTER_VIEW_GROUP: &str = "clusterview.open-cluster-management.io";

pub const SERVICE_ACCOUNT: &str = "ocm-foundation-sa";

/// Key of the proxy server image in the image overrides.
pub const IMAGE_OVERRIDES_KEY: &str = "multicloud_manager";

const APP_KUBERNETES_IO_COMPONENT_VALUE: &str = "proxy-server";

const APP_KEY: &str = "app";

const OCM_ANTIAFFINITY_SELECTOR_KEY: &str = "ocm-antiaffinity-selector";

const SERVICE_BETA_OPENSHIFT_IO_INJECT_CABUNDLE_KEY: &str =
    "service.beta.openshift.io/inject-cabundle";

const SERVICE_BETA_OPENSHIFT_IO_SERVING_CERT_SECRET_NAME_KEY: &str =
    "service.beta.openshift.io/serving-cert-secret-name";

const SECURE_PORT: i32 = 6443;

const SECRET_DEFAULT_MODE: i32 = 0o644;

const APISERVICE_CERTS_VOLUME: &str = "apiservice-certs";
const APISERVICE_CERTS_MOUNT_PATH: &str = "/var/run/apiservice";

const KLUSTERLET_CERTS_VOLUME: &str = "klusterlet-certs";
const KLUSTERLET_CERTS_MOUNT_PATH: &str = "/var/run/klusterlet";

/*
 * ============================================================================
 * Generators
 * ============================================================================
 */
/// The proxy server `Deployment`.
///
/// # Errors
///
/// Will return `Err` if `object` has no name, namespace or uid.
#[allow(clippy::too_many_lines)]
pub fn generate_deployment(
    object: &BackplaneConfig,
    config: &Config,
    overrides: &BTreeMap<String, String>,
) -> Result<Deployment> {
    let (_, _, owner_reference) = object.try_owner_reference()?;
    let labels = try_labels(object)?;
    let selector_labels = selector_labels();

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(OCM_PROXY_SERVER_NAME.into()),
            namespace: Some(object.try_namespace()?.to_string()),
            labels: Some(labels.clone().into()),
            owner_references: Some(vec![owner_reference]),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(config.proxy_server_replicas),
            selector: LabelSelector {
                match_labels: Some(selector_labels.into()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels.into()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    affinity: Some(distribute_pods(
                        OCM_ANTIAFFINITY_SELECTOR_KEY,
                        OCM_PROXY_SERVER_NAME,
                    )),
                    containers: vec![Container {
                        args: Some(vec![
                            "/proxyserver".into(),
                            format!("--secure-port={SECURE_PORT}"),
                            format!("--tls-cert-file={APISERVICE_CERTS_MOUNT_PATH}/tls.crt"),
                            format!("--tls-private-key-file={APISERVICE_CERTS_MOUNT_PATH}/tls.key"),
                            format!("--agent-cafile={KLUSTERLET_CERTS_MOUNT_PATH}/ca.crt"),
                            format!("--agent-certfile={KLUSTERLET_CERTS_MOUNT_PATH}/tls.crt"),
                            format!("--agent-keyfile={KLUSTERLET_CERTS_MOUNT_PATH}/tls.key"),
                        ]),
                        image: Some(image(config, overrides)),
                        image_pull_policy: Some(
                            object
                                .image_pull_policy()
                                .unwrap_or(config.proxy_server_image.pull_policy.as_str())
                                .to_string(),
                        ),
                        liveness_probe: Some(Probe {
                            period_seconds: Some(10),
                            ..healthz_probe()
                        }),
                        name: OCM_PROXY_SERVER_NAME.into(),
                        readiness_probe: Some(healthz_probe()),
                        resources: Some(ResourceRequirements {
                            limits: Some(BTreeMap::from([(
                                "memory".into(),
                                Quantity("2048Mi".into()),
                            )])),
                            requests: Some(BTreeMap::from([
                                ("cpu".into(), Quantity("100m".into())),
                                ("memory".into(), Quantity("256Mi".into())),
                            ])),
                            ..Default::default()
                        }),
                        volume_mounts: Some(vec![
                            VolumeMount {
                                mount_path: KLUSTERLET_CERTS_MOUNT_PATH.into(),
                                name: KLUSTERLET_CERTS_VOLUME.into(),
                                ..Default::default()
                            },
                            VolumeMount {
                                mount_path: APISERVICE_CERTS_MOUNT_PATH.into(),
                                name: APISERVICE_CERTS_VOLUME.into(),
                                ..Default::default()
                            },
                        ]),
                        ..Default::default()
                    }],
                    image_pull_secrets: object.image_pull_secrets(),
                    node_selector: object.node_selector(),
                    service_account_name: Some(SERVICE_ACCOUNT.into()),
                    tolerations: Some(tolerations()),
                    volumes: Some(vec![
                        secret_volume(KLUSTERLET_CERTS_VOLUME, KLUSTERLET_SECRET_NAME),
                        secret_volume(APISERVICE_CERTS_VOLUME, OCM_PROXY_SERVER_NAME),
                    ]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// The `Service` fronting the proxy server pods, with an `OpenShift` serving certificate.
///
/// # Errors
///
/// Will return `Err` if `object` has no name, namespace or uid.
pub fn generate_service(object: &BackplaneConfig) -> Result<Service> {
    let (_, _, owner_reference) = object.try_owner_reference()?;

    Ok(Service {
        metadata: ObjectMeta {
            annotations: Some(
                Annotations::new()
                    .add(
                        SERVICE_BETA_OPENSHIFT_IO_SERVING_CERT_SECRET_NAME_KEY,
                        OCM_PROXY_SERVER_NAME,
                    )
                    .into(),
            ),
            labels: Some(try_labels(object)?.into()),
            name: Some(OCM_PROXY_SERVER_NAME.into()),
            namespace: Some(object.try_namespace()?.to_string()),
            owner_references: Some(vec![owner_reference]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("secure".into()),
                port: 443,
                protocol: Some("TCP".into()),
                target_port: Some(IntOrString::Int(SECURE_PORT)),
                ..Default::default()
            }]),
            selector: Some(selector_labels().into()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Registers `proxy.open-cluster-management.io/v1beta1`.
///
/// # Errors
///
/// Will return `Err` if `object` has no name, namespace or uid.
pub fn generate_proxy_api_service(object: &BackplaneConfig) -> Result<APIService> {
    generate_api_service(
        object,
        OCM_PROXY_API_SERVICE_NAME,
        OCM_PROXY_GROUP,
        "v1beta1",
        10000,
    )
}

/// Registers `clusterview.open-cluster-management.io/v1`.
///
/// # Errors
///
/// Will return `Err` if `object` has no name, namespace or uid.
pub fn generate_cluster_view_v1_api_service(object: &BackplaneConfig) -> Result<APIService> {
    generate_api_service(
        object,
        OCM_CLUSTER_VIEW_V1_API_SERVICE_NAME,
        OCM_CLUSTER_VIEW_GROUP,
        "v1",
        10,
    )
}

/// Registers `clusterview.open-cluster-management.io/v1alpha1`.
///
/// # Errors
///
/// Will return `Err` if `object` has no name, namespace or uid.
pub fn generate_cluster_view_v1alpha1_api_service(
    object: &BackplaneConfig,
) -> Result<APIService> {
    generate_api_service(
        object,
        OCM_CLUSTER_VIEW_V1ALPHA1_API_SERVICE_NAME,
        OCM_CLUSTER_VIEW_GROUP,
        "v1alpha1",
        10,
    )
}

fn generate_api_service(
    object: &BackplaneConfig,
    name: &str,
    group: &str,
    version: &str,
    group_priority_minimum: i32,
) -> Result<APIService> {
    let api_service = APIService {
        metadata: ObjectMeta {
            annotations: Some(
                Annotations::new()
                    .add(SERVICE_BETA_OPENSHIFT_IO_INJECT_CABUNDLE_KEY, "true")
                    .into(),
            ),
            labels: Some(try_labels(object)?.into()),
            name: Some(name.into()),
            ..Default::default()
        },
        spec: APIServiceSpec {
            group: group.into(),
            group_priority_minimum,
            service: Some(APIServiceSpecService {
                name: Some(OCM_PROXY_SERVER_NAME.into()),
                namespace: Some(object.try_namespace()?.to_string()),
                port: None,
            }),
            version: version.into(),
            version_priority: 20,
            ..Default::default()
        },
        status: None,
    };

    try_with_owner_labels(api_service, object)
}

/*
 * ============================================================================
 * Helpers
 * ============================================================================
 */
fn image(config: &Config, overrides: &BTreeMap<String, String>) -> String {
    overrides
        .get(IMAGE_OVERRIDES_KEY)
        .unwrap_or(&config.proxy_server_image.uri)
        .clone()
}

fn selector_labels() -> SelectorLabels {
    BTreeMap::from([
        (APP_KEY.into(), OCM_PROXY_SERVER_NAME.into()),
        (
            OCM_ANTIAFFINITY_SELECTOR_KEY.into(),
            OCM_PROXY_SERVER_NAME.into(),
        ),
    ])
    .into()
}

fn try_labels(object: &BackplaneConfig) -> Result<Labels> {
    Ok(Labels::from(BTreeMap::from([(
        APP_KUBERNETES_IO_COMPONENT_KEY.to_string(),
        APP_KUBERNETES_IO_COMPONENT_VALUE.to_string(),
    )]))
    .append_reverse(selector_labels())
    .append_reverse(object.try_labels()?))
}

fn healthz_probe() -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some("/healthz".into()),
            port: IntOrString::Int(SECURE_PORT),
            scheme: Some("HTTPS".into()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(2),
        ..Default::default()
    }
}

fn secret_volume(name: &str, secret_name: &str) -> Volume {
    Volume {
        name: name.into(),
        secret: Some(SecretVolumeSource {
            default_mode: Some(SECRET_DEFAULT_MODE),
            secret_name: Some(secret_name.into()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn tolerations() -> Vec<Toleration> {
    ["dedicated", "node-role.kubernetes.io/infra"]
        .into_iter()
        .map(|key| Toleration {
            effect: Some("NoSchedule".into()),
            key: Some(key.into()),
            operator: Some("Exists".into()),
            ..Default::default()
        })
        .collect()
}

/// Prefers spreading pods labelled `key=value` across zones, then hosts.
fn distribute_pods(key: &str, value: &str) -> Affinity {
    let term = |topology_key: &str, weight: i32| WeightedPodAffinityTerm {
        pod_affinity_term: PodAffinityTerm {
            label_selector: Some(LabelSelector {
                match_expressions: Some(vec![LabelSelectorRequirement {
                    key: key.into(),
                    operator: "In".into(),
                    values: Some(vec![value.into()]),
                }]),
                ..Default::default()
            }),
            topology_key: topology_key.into(),
            ..Default::default()
        },
        weight,
    };

    Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![
                term("topology.kubernetes.io/zone", 70),
                term("kubernetes.io/hostname", 35),
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
