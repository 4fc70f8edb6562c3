use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::DeploymentSpec,
        core::v1::{Container, PodSpec, Probe, ResourceRequirements, ServiceSpec},
    },
    apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::ObjectMeta},
};

use crate::api_service::APIServiceSpec;

pub trait Subset {
    fn is_subset(&self, superset: &Self) -> bool;
}

impl Subset for BTreeMap<String, String> {
    fn is_subset(&self, superset: &Self) -> bool {
        self.iter()
            .all(|(key, value)| Some(value) == superset.get(key))
    }
}

impl<T> Subset for Option<T>
where
    T: Subset + Default,
{
    fn is_subset(&self, superset: &Self) -> bool {
        match (self, superset) {
            (None, _) => true,
            (Some(subset), None) => subset.is_subset(&T::default()),
            (Some(subset), Some(superset)) => subset.is_subset(superset),
        }
    }
}

impl Subset for DeploymentSpec {
    fn is_subset(&self, superset: &Self) -> bool {
        if self.replicas != superset.replicas {
            return false;
        }

        if self.selector != superset.selector {
            return false;
        }

        if !self.template.metadata.is_subset(&superset.template.metadata) {
            return false;
        }

        self.template.spec.is_subset(&superset.template.spec)
    }
}

/// Fields left unset are defaulted by the API server and not compared.
impl Subset for PodSpec {
    fn is_subset(&self, superset: &Self) -> bool {
        self.affinity == superset.affinity
            && self.containers.len() == superset.containers.len()
            && self
                .containers
                .iter()
                .zip(&superset.containers)
                .all(|(container, superset)| container.is_subset(superset))
            && self.image_pull_secrets == superset.image_pull_secrets
            && self.node_selector == superset.node_selector
            && self.service_account_name == superset.service_account_name
            && self.tolerations == superset.tolerations
            && self.volumes == superset.volumes
    }
}

impl Subset for Container {
    fn is_subset(&self, superset: &Self) -> bool {
        self.args == superset.args
            && self.image == superset.image
            && (self.image_pull_policy.is_none()
                || self.image_pull_policy == superset.image_pull_policy)
            && self.liveness_probe.is_subset(&superset.liveness_probe)
            && self.name == superset.name
            && self.readiness_probe.is_subset(&superset.readiness_probe)
            && resource_names(self.resources.as_ref())
                == resource_names(superset.resources.as_ref())
            && self.volume_mounts == superset.volume_mounts
    }
}

/// Quantities come back in canonical form (`2048Mi` as `2Gi`), so only the
/// resource names are compared.
fn resource_names(resources: Option<&ResourceRequirements>) -> [Vec<&String>; 2] {
    fn names(quantities: Option<&BTreeMap<String, Quantity>>) -> Vec<&String> {
        quantities.map(|q| q.keys().collect()).unwrap_or_default()
    }

    [
        names(resources.and_then(|r| r.limits.as_ref())),
        names(resources.and_then(|r| r.requests.as_ref())),
    ]
}

impl Subset for Probe {
    fn is_subset(&self, superset: &Self) -> bool {
        self.http_get == superset.http_get
            && (self.initial_delay_seconds.is_none()
                || self.initial_delay_seconds == superset.initial_delay_seconds)
            && (self.period_seconds.is_none() || self.period_seconds == superset.period_seconds)
    }
}

impl Subset for ObjectMeta {
    fn is_subset(&self, superset: &Self) -> bool {
        self.annotations.is_subset(&superset.annotations)
            && self.labels.is_subset(&superset.labels)
            && self.name == superset.name
            && self.owner_references.as_deref().unwrap_or_default()
                == superset.owner_references.as_deref().unwrap_or_default()
    }
}

impl Subset for ServiceSpec {
    fn is_subset(&self, superset: &Self) -> bool {
        self.ports == superset.ports
            && self.selector == superset.selector
            && (self.type_.is_none() || self.type_ == superset.type_)
    }
}

impl Subset for APIServiceSpec {
    fn is_subset(&self, superset: &Self) -> bool {
        self.group == superset.group
            && self.group_priority_minimum == superset.group_priority_minimum
            && (self.insecure_skip_tls_verify.is_none()
                || self.insecure_skip_tls_verify == superset.insecure_skip_tls_verify)
            && match (&self.service, &superset.service) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(service), Some(superset)) => {
                    service.name == superset.name
                        && service.namespace == superset.namespace
                        && (service.port.is_none() || service.port == superset.port)
                }
            }
            && self.version == superset.version
            && self.version_priority == superset.version_priority
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::{
        api::{
            apps::v1::DeploymentSpec,
            core::v1::{
                Container, HTTPGetAction, PodSpec, PodTemplateSpec, Probe,
                ResourceRequirements, ServicePort, ServiceSpec,
            },
        },
        apimachinery::pkg::{api::resource::Quantity, util::intstr::IntOrString},
    };
    use kube::core::ObjectMeta;

    use crate::api_service::{APIServiceSpec, APIServiceSpecService};

    use super::Subset;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn map_subset() {
        let subset = map(&[("a", "1")]);
        let superset = map(&[("a", "1"), ("b", "2")]);

        assert!(subset.is_subset(&superset));
        assert!(!superset.is_subset(&subset));
        assert!(!map(&[("a", "2")]).is_subset(&superset));
    }

    #[test]
    fn optional_map_subset() {
        let none: Option<BTreeMap<String, String>> = None;
        let empty: Option<BTreeMap<String, String>> = Some(BTreeMap::new());
        let some = Some(map(&[("a", "1")]));

        assert!(none.is_subset(&some));
        assert!(empty.is_subset(&none));
        assert!(!some.is_subset(&none));
    }

    #[test]
    fn object_meta_ignores_server_populated_fields() {
        // arrange
        let desired = ObjectMeta {
            name: Some("ocm-proxyserver".into()),
            labels: Some(map(&[("app", "ocm-proxyserver")])),
            ..Default::default()
        };
        let live = ObjectMeta {
            name: Some("ocm-proxyserver".into()),
            labels: Some(map(&[("app", "ocm-proxyserver"), ("extra", "label")])),
            resource_version: Some("12".into()),
            uid: Some("uid".into()),
            owner_references: Some(Vec::new()),
            ..Default::default()
        };

        // act
        let is_subset = desired.is_subset(&live);

        // assert
        assert!(is_subset);
    }

    #[test]
    fn service_spec_ignores_cluster_ip() {
        // arrange
        let desired = ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("secure".into()),
                port: 443,
                protocol: Some("TCP".into()),
                target_port: Some(IntOrString::Int(6443)),
                ..Default::default()
            }]),
            selector: Some(map(&[("app", "ocm-proxyserver")])),
            ..Default::default()
        };
        let live = ServiceSpec {
            cluster_ip: Some("10.0.0.1".into()),
            type_: Some("ClusterIP".into()),
            ..desired.clone()
        };

        // act & assert
        assert!(desired.is_subset(&live));
        assert!(
            !ServiceSpec {
                selector: None,
                ..desired.clone()
            }
            .is_subset(&live)
        );
    }

    #[test]
    fn api_service_spec_ignores_defaulted_port() {
        // arrange
        let desired = APIServiceSpec {
            group: "proxy.open-cluster-management.io".into(),
            group_priority_minimum: 10000,
            service: Some(APIServiceSpecService {
                name: Some("ocm-proxyserver".into()),
                namespace: Some("multicluster-engine".into()),
                port: None,
            }),
            version: "v1beta1".into(),
            version_priority: 20,
            ..Default::default()
        };
        let mut live = desired.clone();
        if let Some(service) = live.service.as_mut() {
            service.port = Some(443);
        }

        // act & assert
        assert!(desired.is_subset(&live));
        assert!(
            !APIServiceSpec {
                version_priority: 15,
                ..desired.clone()
            }
            .is_subset(&live)
        );
    }

    fn pod_spec() -> PodSpec {
        PodSpec {
            containers: vec![Container {
                args: Some(vec!["/proxyserver".into()]),
                image: Some("multicloud-manager:latest".into()),
                image_pull_policy: Some("IfNotPresent".into()),
                name: "ocm-proxyserver".into(),
                resources: Some(ResourceRequirements {
                    limits: Some(BTreeMap::from([(
                        "memory".into(),
                        Quantity("2048Mi".into()),
                    )])),
                    ..Default::default()
                }),
                readiness_probe: Some(Probe {
                    http_get: Some(HTTPGetAction {
                        path: Some("/healthz".into()),
                        port: IntOrString::Int(6443),
                        scheme: Some("HTTPS".into()),
                        ..Default::default()
                    }),
                    initial_delay_seconds: Some(2),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            service_account_name: Some("ocm-foundation-sa".into()),
            ..Default::default()
        }
    }

    fn deployment_spec(spec: PodSpec) -> DeploymentSpec {
        DeploymentSpec {
            replicas: Some(1),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(map(&[("app", "ocm-proxyserver")])),
                    ..Default::default()
                }),
                spec: Some(spec),
            },
            ..Default::default()
        }
    }

    #[test]
    fn deployment_spec_ignores_server_defaults() {
        // arrange
        let desired = deployment_spec(pod_spec());
        let mut live_pod_spec = pod_spec();
        live_pod_spec.dns_policy = Some("ClusterFirst".into());
        live_pod_spec.restart_policy = Some("Always".into());
        live_pod_spec.scheduler_name = Some("default-scheduler".into());
        live_pod_spec.termination_grace_period_seconds = Some(30);
        let container = &mut live_pod_spec.containers[0];
        container.termination_message_path = Some("/dev/termination-log".into());
        container.termination_message_policy = Some("File".into());
        container.resources = Some(ResourceRequirements {
            limits: Some(BTreeMap::from([("memory".into(), Quantity("2Gi".into()))])),
            ..Default::default()
        });
        if let Some(probe) = container.readiness_probe.as_mut() {
            probe.failure_threshold = Some(3);
            probe.period_seconds = Some(10);
            probe.success_threshold = Some(1);
            probe.timeout_seconds = Some(1);
        }
        let live = deployment_spec(live_pod_spec);

        // act
        let is_subset = desired.is_subset(&live);

        // assert
        assert!(is_subset);
    }

    #[test]
    fn deployment_spec_detects_changed_container() {
        // arrange
        let desired = deployment_spec(pod_spec());
        let mut live_pod_spec = pod_spec();
        live_pod_spec.containers[0].image = Some("multicloud-manager:old".into());
        let live = deployment_spec(live_pod_spec);

        // act
        let is_subset = desired.is_subset(&live);

        // assert
        assert!(!is_subset);
        assert!(
            !deployment_spec(PodSpec {
                node_selector: Some(map(&[("node-role.kubernetes.io/infra", "")])),
                ..pod_spec()
            })
            .is_subset(&desired)
        );
    }
}
