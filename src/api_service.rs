//! `apiregistration.k8s.io/v1` `APIService`, which `k8s-openapi` does not ship.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    kubernetes::{self, Object},
};

/// # `APIService`
///
/// An `APIService` registers an extension API server, reachable through a
/// `Service`, as the backend of one group version of the cluster API.
#[allow(clippy::module_name_repetitions)]
#[derive(CustomResource, JsonSchema, Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "apiregistration.k8s.io",
    kind = "APIService",
    plural = "apiservices",
    status = "APIServiceStatus",
    version = "v1"
)]
#[serde(rename_all = "camelCase")]
pub struct APIServiceSpec {
    /// Group is the API group name this server hosts.
    pub group: String,

    /// GroupPriorityMinimum is the priority this group should have at least.
    pub group_priority_minimum: i32,

    /// InsecureSkipTLSVerify disables TLS certificate verification when communicating with this server.
    #[serde(
        rename = "insecureSkipTLSVerify",
        skip_serializing_if = "Option::is_none"
    )]
    pub insecure_skip_tls_verify: Option<bool>,

    /// Service is a reference to the service for this API server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<APIServiceSpecService>,

    /// Version is the API version this server hosts.
    pub version: String,

    /// VersionPriority controls the ordering of this API version inside of its group.
    pub version_priority: i32,
}

#[allow(clippy::module_name_repetitions)]
#[derive(JsonSchema, Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct APIServiceSpecService {
    /// Name is the name of the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Namespace is the namespace of the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Port of the service that hosts the webhook. Defaults to 443.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

#[allow(clippy::module_name_repetitions)]
#[derive(JsonSchema, Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct APIServiceStatus {
    /// Current service state of the `APIService`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<APIServiceCondition>,
}

#[allow(clippy::module_name_repetitions)]
#[derive(JsonSchema, Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct APIServiceCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    pub status: String,

    #[serde(rename = "type")]
    pub type_: String,
}

impl APIService {
    /// Whether the aggregator reports the backing server as reachable.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status.as_ref().is_some_and(|status| {
            status
                .conditions
                .iter()
                .any(|condition| condition.type_ == "Available" && condition.status == "True")
        })
    }
}

impl kubernetes::Resource for APIService {
    type Spec = APIServiceSpec;

    fn spec(&self) -> Option<&Self::Spec> {
        Some(&self.spec)
    }

    fn try_with_owner(self, object: &(impl Object + kubernetes::Resource)) -> Result<Self> {
        kubernetes::try_with_owner_labels(self, object)
    }
}

#[cfg(test)]
mod tests {
    use kube::core::ObjectMeta;

    use super::{APIService, APIServiceCondition, APIServiceSpec, APIServiceStatus};

    fn api_service(conditions: Vec<APIServiceCondition>) -> APIService {
        APIService {
            metadata: ObjectMeta::default(),
            spec: APIServiceSpec::default(),
            status: Some(APIServiceStatus { conditions }),
        }
    }

    #[test]
    fn serializes_without_unset_optionals() {
        // arrange
        let api_service = APIService::new(
            "v1.clusterview.open-cluster-management.io",
            APIServiceSpec {
                group: "clusterview.open-cluster-management.io".into(),
                group_priority_minimum: 10,
                version: "v1".into(),
                version_priority: 20,
                ..Default::default()
            },
        );

        // act
        let value = serde_json::to_value(&api_service).unwrap();

        // assert
        assert_eq!(
            serde_json::json!({
                "apiVersion": "apiregistration.k8s.io/v1",
                "kind": "APIService",
                "metadata": { "name": "v1.clusterview.open-cluster-management.io" },
                "spec": {
                    "group": "clusterview.open-cluster-management.io",
                    "groupPriorityMinimum": 10,
                    "version": "v1",
                    "versionPriority": 20
                }
            }),
            value
        );
    }

    #[test]
    fn deserializes_live_object_with_ca_bundle() {
        // arrange
        let value = serde_json::json!({
            "apiVersion": "apiregistration.k8s.io/v1",
            "kind": "APIService",
            "metadata": { "name": "v1beta1.proxy.open-cluster-management.io" },
            "spec": {
                "caBundle": "Y2EK",
                "group": "proxy.open-cluster-management.io",
                "groupPriorityMinimum": 10000,
                "insecureSkipTLSVerify": false,
                "service": { "name": "ocm-proxyserver", "namespace": "backplane", "port": 443 },
                "version": "v1beta1",
                "versionPriority": 20
            },
            "status": {
                "conditions": [{ "type": "Available", "status": "True", "reason": "Passed" }]
            }
        });

        // act
        let api_service: APIService = serde_json::from_value(value).unwrap();

        // assert
        assert_eq!(Some(false), api_service.spec.insecure_skip_tls_verify);
        assert_eq!(
            Some(443),
            api_service.spec.service.as_ref().and_then(|s| s.port)
        );
        assert!(api_service.is_available());
    }

    #[test]
    fn is_available_requires_true_available_condition() {
        assert!(!api_service(Vec::new()).is_available());
        assert!(
            !api_service(vec![APIServiceCondition {
                status: "False".into(),
                type_: "Available".into(),
                reason: Some("MissingEndpoints".into()),
                ..Default::default()
            }])
            .is_available()
        );
        assert!(
            api_service(vec![APIServiceCondition {
                status: "True".into(),
                type_: "Available".into(),
                ..Default::default()
            }])
            .is_available()
        );
    }
}
