use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use futures::StreamExt;
use k8s_openapi::{
    api::{apps::v1::Deployment, core::v1::LocalObjectReference, core::v1::Service},
    apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
    apimachinery::pkg::apis::meta::v1::{Condition, Time},
    chrono::Utc,
};
use kube::{
    Client, CustomResource, CustomResourceExt, ResourceExt,
    runtime::{
        Controller,
        controller::Action,
        finalizer::{Event, finalizer},
        reflector::ObjectRef,
        watcher::Config as WatcherConfig,
    },
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    api_service::APIService,
    kubernetes::{
        self, Api, ConditionsExt, Object, Resource,
        constants::{
            APP_KUBERNETES_IO_INSTANCE_KEY, APP_KUBERNETES_IO_MANAGED_BY_KEY,
            APP_KUBERNETES_IO_MANAGED_BY_VALUE,
            BACKPLANE_OPEN_CLUSTER_MANAGEMENT_IO_OWNER_NAMESPACE_KEY,
        },
        error_policy,
    },
    metrics::Metrics,
    proxy_server::{
        OCM_CLUSTER_VIEW_V1_API_SERVICE_NAME, OCM_CLUSTER_VIEW_V1ALPHA1_API_SERVICE_NAME,
        OCM_PROXY_API_SERVICE_NAME, generate_cluster_view_v1_api_service,
        generate_cluster_view_v1alpha1_api_service, generate_deployment,
        generate_proxy_api_service, generate_service,
    },
};

/*
 * ============================================================================
 * Custom Resource Definition
 * ============================================================================
 */
/// # `BackplaneConfig`
///
/// A `BackplaneConfig` installs the backplane foundation into its namespace:
/// the proxy server and the aggregated APIs it serves.
#[allow(clippy::module_name_repetitions)]
#[derive(CustomResource, JsonSchema, Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "operator.open-cluster-management.io",
    kind = "BackplaneConfig",
    namespaced,
    printcolumn = r#"{"name":"Phase", "type":"string", "description":"Human readable description of state", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    shortname = "bpc",
    status = "BackplaneConfigStatus",
    version = "v1alpha1"
)]
#[serde(rename_all = "camelCase")]
pub struct BackplaneConfigSpec {
    /// Image URIs keyed by image name, overriding the operator defaults.
    pub image_overrides: Option<BTreeMap<String, String>>,

    /// Image pull policy. One of Always, Never, IfNotPresent.
    ///
    /// Default: the operator's configured pull policy
    pub image_pull_policy: Option<String>,

    /// ImagePullSecrets is an optional list of references to secrets in the same namespace to use for pulling any of the images used by this PodSpec. If specified, these secrets will be passed to individual puller implementations for them to use. More info: https://kubernetes.io/docs/concepts/containers/images#specifying-imagepullsecrets-on-a-pod
    pub image_pull_secrets: Option<Vec<LocalObjectReference>>,

    /// NodeSelector is a selector which must be true for the pod to fit on a node. Selector which must match a node's labels for the pod to be scheduled on that node. More info: https://kubernetes.io/docs/concepts/configuration/assign-pod-node/
    pub node_selector: Option<BTreeMap<String, String>>,
}

#[allow(clippy::module_name_repetitions)]
#[derive(JsonSchema, Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackplaneConfigStatus {
    /// Represents the latest available observations of the backplane's current state.
    ///
    /// ### Available
    ///
    /// `Available`, `Progressing`
    ///
    /// ### Deployment
    ///
    /// `Available`, `Unavailable`
    ///
    /// ### APIService
    ///
    /// `Available`, `Unavailable`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// `Available` once every owned resource is available, `Progressing` otherwise.
    pub phase: Option<String>,

    /// Condition reasons keyed by condition type.
    #[serde(default)]
    pub summary: BTreeMap<String, String>,
}

impl BackplaneConfig {
    #[must_use]
    pub fn image_overrides(&self) -> BTreeMap<String, String> {
        self.spec.image_overrides.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn image_pull_policy(&self) -> Option<&str> {
        self.spec.image_pull_policy.as_deref()
    }

    #[must_use]
    pub fn image_pull_secrets(&self) -> Option<Vec<LocalObjectReference>> {
        self.spec.image_pull_secrets.clone()
    }

    #[must_use]
    pub fn node_selector(&self) -> Option<BTreeMap<String, String>> {
        self.spec.node_selector.clone()
    }

    #[must_use]
    pub fn status_conditions(&self) -> Option<&Vec<Condition>> {
        self.status.as_ref().map(|f| &f.conditions)
    }
}

impl Resource for BackplaneConfig {
    type Spec = BackplaneConfigSpec;

    fn spec(&self) -> Option<&Self::Spec> {
        Some(&self.spec)
    }
}

impl Object for BackplaneConfig {
    const APP_KUBERNETES_IO_COMPONENT_VALUE: &'static str = "backplane-config";

    type Status = BackplaneConfigStatus;

    fn status(&self) -> Option<&Self::Status> {
        self.status.as_ref()
    }
}

#[must_use]
pub fn generate_custom_resource_definition() -> CustomResourceDefinition {
    BackplaneConfig::crd()
}

/*
 * ============================================================================
 * Config
 * ============================================================================
 */
pub struct Config {
    pub proxy_server_image: ImageConfig,
    pub proxy_server_replicas: i32,
}

pub struct ImageConfig {
    pub pull_policy: String,
    pub uri: String,
}

/*
 * ============================================================================
 * Controller
 * ============================================================================
 */
const FINALIZER: &str = "backplane.open-cluster-management.io/cleanup";

pub async fn run_controller(client: Client, config: Config, metrics: Metrics) {
    metrics.kubernetes_api_usage_count::<BackplaneConfig>("watch");
    metrics.kubernetes_api_usage_count::<Deployment>("watch");
    metrics.kubernetes_api_usage_count::<Service>("watch");
    metrics.kubernetes_api_usage_count::<APIService>("watch");
    Controller::new(
        kube::Api::<BackplaneConfig>::all(client.clone()),
        WatcherConfig::default(),
    )
    .owns(
        kube::Api::<Deployment>::all(client.clone()),
        WatcherConfig::default(),
    )
    .owns(
        kube::Api::<Service>::all(client.clone()),
        WatcherConfig::default(),
    )
    .watches(
        kube::Api::<APIService>::all(client.clone()),
        WatcherConfig::default().labels(&format!(
            "{APP_KUBERNETES_IO_MANAGED_BY_KEY}={APP_KUBERNETES_IO_MANAGED_BY_VALUE}"
        )),
        owner_of_api_service,
    )
    .shutdown_on_signal()
    .run(
        reconciler,
        error_policy,
        Arc::new(Context {
            client,
            config,
            metrics,
        }),
    )
    .for_each(|_| async {})
    .await;
}

/// `APIService`s are cluster scoped and carry no owner reference; their owner
/// is recovered from the ownership labels.
fn owner_of_api_service(api_service: APIService) -> Option<ObjectRef<BackplaneConfig>> {
    let labels = api_service.labels();
    let name = labels.get(APP_KUBERNETES_IO_INSTANCE_KEY)?;
    let namespace = labels.get(BACKPLANE_OPEN_CLUSTER_MANAGEMENT_IO_OWNER_NAMESPACE_KEY)?;
    Some(ObjectRef::new(name).within(namespace))
}

/*
 * ============================================================================
 * Context
 * ============================================================================
 */
struct Context {
    client: Client,
    config: Config,
    metrics: Metrics,
}

impl kubernetes::Context for Context {
    fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/*
 * ============================================================================
 * State
 * ============================================================================
 */
#[derive(Debug, PartialEq)]
enum Availability {
    Available,
    Unavailable(String),
}

#[derive(Debug, PartialEq)]
struct State {
    api_services: Availability,
    deployment: Availability,
}

impl State {
    fn new(deployment: Option<&Deployment>, api_services: &[APIService]) -> Self {
        let deployment_available = deployment
            .and_then(|deployment| deployment.status.as_ref())
            .and_then(|status| status.conditions.as_ref())
            .is_some_and(|conditions| {
                conditions
                    .iter()
                    .any(|condition| condition.type_ == "Available" && condition.status == "True")
            });

        let mut unavailable = [
            OCM_PROXY_API_SERVICE_NAME,
            OCM_CLUSTER_VIEW_V1_API_SERVICE_NAME,
            OCM_CLUSTER_VIEW_V1ALPHA1_API_SERVICE_NAME,
        ]
        .into_iter()
        .filter(|name| {
            !api_services.iter().any(|api_service| {
                api_service.metadata.name.as_deref() == Some(*name) && api_service.is_available()
            })
        })
        .collect::<Vec<_>>();
        unavailable.sort_unstable();

        Self {
            api_services: if unavailable.is_empty() {
                Availability::Available
            } else {
                Availability::Unavailable(format!(
                    "The APIServices {} are not available.",
                    unavailable.join(", ")
                ))
            },
            deployment: if deployment_available {
                Availability::Available
            } else {
                Availability::Unavailable("The proxy server Deployment is not available.".into())
            },
        }
    }

    fn is_available(&self) -> bool {
        self.api_services == Availability::Available && self.deployment == Availability::Available
    }

    fn phase(&self) -> &'static str {
        if self.is_available() {
            "Available"
        } else {
            "Progressing"
        }
    }

    fn conditions(&self, observed_generation: Option<i64>) -> Vec<Condition> {
        let condition = |type_: &str, availability: &Availability| match availability {
            Availability::Available => Condition {
                last_transition_time: Time(Utc::now()),
                message: format!("The {type_} is available."),
                observed_generation,
                reason: "Available".into(),
                status: "True".into(),
                type_: type_.into(),
            },
            Availability::Unavailable(message) => Condition {
                last_transition_time: Time(Utc::now()),
                message: message.clone(),
                observed_generation,
                reason: "Unavailable".into(),
                status: "False".into(),
                type_: type_.into(),
            },
        };

        vec![
            condition("Deployment", &self.deployment),
            condition("APIService", &self.api_services),
            Condition {
                last_transition_time: Time(Utc::now()),
                message: if self.is_available() {
                    "The BackplaneConfig is available.".into()
                } else {
                    "The BackplaneConfig is waiting for its resources to become available.".into()
                },
                observed_generation,
                reason: self.phase().into(),
                status: if self.is_available() { "True" } else { "False" }.into(),
                type_: "Available".into(),
            },
        ]
    }
}

/*
 * ============================================================================
 * Reconciler
 * ============================================================================
 */
#[tracing::instrument(skip(object, ctx))]
async fn reconciler(object: Arc<BackplaneConfig>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx
        .metrics
        .count_and_measure(BackplaneConfig::APP_KUBERNETES_IO_COMPONENT_VALUE);
    tracing::info!("reconciling");

    let namespace = object.try_namespace()?;

    let action = finalizer(
        &kube::Api::<BackplaneConfig>::namespaced(ctx.client.clone(), &namespace),
        FINALIZER,
        object,
        |event| async {
            match event {
                Event::Apply(object) => apply(&object, &ctx).await,
                Event::Cleanup(object) => cleanup(&object, &ctx).await,
            }
        },
    )
    .await
    .map_err(|error| Error::Finalizer(Box::new(error)))?;

    tracing::info!("reconciled");

    Ok(action)
}

async fn apply(object: &BackplaneConfig, ctx: &Context) -> Result<Action> {
    let namespace = object.try_namespace()?;

    // Deployment
    let deployment = reconcile_deployment(
        &Api::new(
            kube::Api::namespaced(ctx.client.clone(), &namespace),
            &ctx.metrics,
        ),
        &ctx.config,
        object,
    )
    .await?;

    // Service
    reconcile_service(
        &Api::new(
            kube::Api::namespaced(ctx.client.clone(), &namespace),
            &ctx.metrics,
        ),
        object,
    )
    .await?;

    // APIService
    let api_services = reconcile_api_services(
        &Api::new(kube::Api::all(ctx.client.clone()), &ctx.metrics),
        object,
    )
    .await?;

    let state = State::new(deployment.as_ref(), &api_services);

    // BackplaneConfig
    reconcile_backplane_config(
        &Api::new(
            kube::Api::namespaced(ctx.client.clone(), &namespace),
            &ctx.metrics,
        ),
        object,
        &state,
    )
    .await?;

    if state.is_available() {
        Ok(Action::requeue(Duration::from_secs(3600)))
    } else {
        Ok(Action::requeue(Duration::from_secs(30)))
    }
}

async fn cleanup(object: &BackplaneConfig, ctx: &Context) -> Result<Action> {
    tracing::info!("cleaning up");

    // Namespaced resources are garbage collected through their owner references.
    Api::<APIService>::new(kube::Api::all(ctx.client.clone()), &ctx.metrics)
        .sync(object, HashMap::<(), _>::new())
        .await?;

    Ok(Action::await_change())
}

async fn reconcile_deployment(
    api: &Api<Deployment>,
    config: &Config,
    object: &BackplaneConfig,
) -> Result<Option<Deployment>> {
    api.sync(
        object,
        [(
            (),
            generate_deployment(object, config, &object.image_overrides())?,
        )]
        .into(),
    )
    .await
    .map(|mut deployments| deployments.remove(&()))
}

async fn reconcile_service(api: &Api<Service>, object: &BackplaneConfig) -> Result<()> {
    api.sync(object, [((), generate_service(object)?)].into())
        .await
        .map(|_| ())
}

async fn reconcile_api_services(
    api: &Api<APIService>,
    object: &BackplaneConfig,
) -> Result<Vec<APIService>> {
    api.sync(
        object,
        [
            (OCM_PROXY_API_SERVICE_NAME, generate_proxy_api_service(object)?),
            (
                OCM_CLUSTER_VIEW_V1_API_SERVICE_NAME,
                generate_cluster_view_v1_api_service(object)?,
            ),
            (
                OCM_CLUSTER_VIEW_V1ALPHA1_API_SERVICE_NAME,
                generate_cluster_view_v1alpha1_api_service(object)?,
            ),
        ]
        .into(),
    )
    .await
    .map(|api_services| api_services.into_values().collect())
}

async fn reconcile_backplane_config(
    api: &Api<BackplaneConfig>,
    object: &BackplaneConfig,
    state: &State,
) -> Result<()> {
    api.update_status(object, status(object, state)).await
}

/// Status for `state`. Equal to the live status when nothing changed, so no
/// patch is sent.
fn status(object: &BackplaneConfig, state: &State) -> BackplaneConfigStatus {
    let conditions = object
        .status_conditions()
        .unwrap_or(&Vec::new())
        .merge_from(&state.conditions(object.metadata.generation));

    let summary = conditions
        .iter()
        .map(|condition| (condition.type_.clone(), condition.reason.clone()))
        .collect();

    BackplaneConfigStatus {
        conditions,
        phase: Some(state.phase().into()),
        summary,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::api::apps::v1::{DeploymentCondition, DeploymentStatus};
    use kube::{api::ObjectMeta, runtime::reflector::ObjectRef};

    use crate::{
        api_service::{APIService, APIServiceCondition, APIServiceStatus},
        proxy_server::{
            OCM_CLUSTER_VIEW_V1_API_SERVICE_NAME, OCM_CLUSTER_VIEW_V1ALPHA1_API_SERVICE_NAME,
            OCM_PROXY_API_SERVICE_NAME,
        },
    };

    use super::{
        Availability, BackplaneConfig, BackplaneConfigSpec, Deployment, State,
        generate_custom_resource_definition, owner_of_api_service, status,
    };

    fn deployment(status: &str) -> Deployment {
        Deployment {
            status: Some(DeploymentStatus {
                conditions: Some(vec![DeploymentCondition {
                    status: status.into(),
                    type_: "Available".into(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn api_service(name: &str, status: &str) -> APIService {
        APIService {
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..Default::default()
            },
            spec: Default::default(),
            status: Some(APIServiceStatus {
                conditions: vec![APIServiceCondition {
                    status: status.into(),
                    type_: "Available".into(),
                    ..Default::default()
                }],
            }),
        }
    }

    fn api_services(status: &str) -> Vec<APIService> {
        vec![
            api_service(OCM_PROXY_API_SERVICE_NAME, status),
            api_service(OCM_CLUSTER_VIEW_V1_API_SERVICE_NAME, status),
            api_service(OCM_CLUSTER_VIEW_V1ALPHA1_API_SERVICE_NAME, status),
        ]
    }

    #[test]
    fn state_available() {
        // Arrange
        let deployment = deployment("True");
        let api_services = api_services("True");

        // Act
        let state = State::new(Some(&deployment), &api_services);

        // Assert
        assert!(state.is_available());
        assert_eq!("Available", state.phase());
    }

    #[test]
    fn state_progressing_without_deployment() {
        // Arrange
        let api_services = api_services("True");

        // Act
        let state = State::new(None, &api_services);

        // Assert
        assert!(!state.is_available());
        assert_eq!("Progressing", state.phase());
        assert_eq!(Availability::Available, state.api_services);
    }

    #[test]
    fn state_names_unavailable_api_services() {
        // Arrange
        let deployment = deployment("True");
        let api_services = vec![
            api_service(OCM_PROXY_API_SERVICE_NAME, "False"),
            api_service(OCM_CLUSTER_VIEW_V1_API_SERVICE_NAME, "True"),
        ];

        // Act
        let state = State::new(Some(&deployment), &api_services);

        // Assert
        assert_eq!(Availability::Available, state.deployment);
        assert_eq!(
            Availability::Unavailable(format!(
                "The APIServices {OCM_CLUSTER_VIEW_V1ALPHA1_API_SERVICE_NAME}, {OCM_PROXY_API_SERVICE_NAME} are not available."
            )),
            state.api_services
        );
    }

    #[test]
    fn state_conditions() {
        // Arrange
        let state = State::new(Some(&deployment("False")), &api_services("True"));

        // Act
        let conditions = state.conditions(Some(3));

        // Assert
        let summary = conditions
            .iter()
            .map(|c| (c.type_.as_str(), c.status.as_str(), c.reason.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            vec![
                ("Deployment", "False", "Unavailable"),
                ("APIService", "True", "Available"),
                ("Available", "False", "Progressing"),
            ],
            summary
        );
        assert!(conditions.iter().all(|c| c.observed_generation == Some(3)));
    }

    #[test]
    fn status_summarizes_condition_reasons() {
        // arrange
        let object = BackplaneConfig::new("backplane", BackplaneConfigSpec::default());
        let state = State::new(Some(&deployment("True")), &api_services("False"));

        // act
        let status = status(&object, &state);

        // assert
        assert_eq!(Some("Progressing".to_string()), status.phase);
        assert_eq!(
            BTreeMap::from([
                ("APIService".to_string(), "Unavailable".to_string()),
                ("Available".to_string(), "Progressing".to_string()),
                ("Deployment".to_string(), "Available".to_string()),
            ]),
            status.summary
        );
    }

    #[test]
    fn status_is_stable_for_unchanged_state() {
        // arrange
        let mut object = BackplaneConfig::new("backplane", BackplaneConfigSpec::default());
        object.metadata.generation = Some(2);
        let state = State::new(Some(&deployment("True")), &api_services("True"));
        object.status = Some(status(&object, &state));

        // act
        let next = status(&object, &state);

        // assert
        assert_eq!(object.status, Some(next));
    }

    #[test]
    fn status_replaces_changed_conditions_only() {
        // arrange
        let mut object = BackplaneConfig::new("backplane", BackplaneConfigSpec::default());
        let available = State::new(Some(&deployment("True")), &api_services("True"));
        object.status = Some(status(&object, &available));
        let live = object.status.clone().unwrap_or_default();

        // act
        let next = status(
            &object,
            &State::new(Some(&deployment("False")), &api_services("True")),
        );

        // assert
        assert_eq!(Some("Progressing".to_string()), next.phase);
        assert_eq!(live.conditions[1], next.conditions[1]);
        assert_eq!("False", next.conditions[0].status);
        assert_eq!("Unavailable", next.conditions[0].reason);
    }

    #[test]
    fn api_service_maps_to_owner() {
        // Arrange
        let api_service = APIService {
            metadata: ObjectMeta {
                labels: Some(
                    [
                        ("app.kubernetes.io/instance".into(), "backplane".into()),
                        (
                            "backplane.open-cluster-management.io/owner-namespace".into(),
                            "multicluster-engine".into(),
                        ),
                    ]
                    .into(),
                ),
                name: Some(OCM_PROXY_API_SERVICE_NAME.into()),
                ..Default::default()
            },
            spec: Default::default(),
            status: None,
        };

        // Act
        let owner = owner_of_api_service(api_service);

        // Assert
        assert_eq!(
            Some(ObjectRef::<BackplaneConfig>::new("backplane").within("multicluster-engine")),
            owner
        );
    }

    #[test]
    fn unlabelled_api_service_maps_to_nothing() {
        assert_eq!(None, owner_of_api_service(api_service("other", "True")));
    }

    #[test]
    fn accessors_default() {
        // Arrange
        let object = BackplaneConfig::new("backplane", BackplaneConfigSpec::default());

        // Assert
        assert!(object.image_overrides().is_empty());
        assert_eq!(None, object.image_pull_policy());
        assert_eq!(None, object.node_selector());
        assert_eq!(None, object.status_conditions());
    }

    #[test]
    fn custom_resource_definition() {
        // Act
        let crd = generate_custom_resource_definition();

        // Assert
        assert_eq!(
            Some("backplaneconfigs.operator.open-cluster-management.io".to_string()),
            crd.metadata.name
        );
        assert_eq!(Some(vec!["bpc".to_string()]), crd.spec.names.short_names);
        assert_eq!("Namespaced", crd.spec.scope);
    }
}
