use std::fmt::Debug;

use crate::{Error, Result};

use super::{
    Object, ObjectNamespace, ResourceName, ResourceUid,
    constants::BACKPLANE_OPEN_CLUSTER_MANAGEMENT_IO_OWNER_NAMESPACE_KEY,
};

pub trait Resource: kube::ResourceExt<DynamicType = ()> {
    type Spec: PartialEq + Debug;

    fn spec(&self) -> Option<&Self::Spec>;

    fn try_name(&self) -> Result<ResourceName> {
        self.meta()
            .name
            .as_ref()
            .ok_or_else(|| Error::MissingObjectKey(".metadata.name"))
            .map(String::to_string)
            .map(ResourceName::new)
    }

    fn try_namespace(&self) -> Result<ObjectNamespace> {
        self.meta()
            .namespace
            .as_ref()
            .ok_or_else(|| Error::MissingObjectKey(".metadata.namespace"))
            .map(String::to_string)
            .map(Into::into)
    }

    fn try_uid(&self) -> Result<ResourceUid> {
        self.meta()
            .uid
            .as_ref()
            .ok_or_else(|| Error::MissingObjectKey(".metadata.uid"))
            .map(String::to_string)
            .map(ResourceUid::new)
    }

    /// Marks `self` as owned by `object`: controller owner reference plus ownership label.
    fn try_with_owner(mut self, object: &(impl Object + Resource)) -> Result<Self>
    where
        Self: Sized,
    {
        let (key, value, reference) = object.try_owner_reference()?;
        *self.owner_references_mut() = vec![reference];
        self.labels_mut().insert(key, value);
        Ok(self)
    }
}

/// Cluster scoped resources cannot reference a namespaced owner, so ownership is
/// carried by labels alone.
pub fn try_with_owner_labels<R>(mut resource: R, object: &(impl Object + Resource)) -> Result<R>
where
    R: Resource,
{
    let (key, value, _) = object.try_owner_reference()?;
    let namespace = object.try_namespace()?;
    let labels = resource.labels_mut();
    labels.insert(key, value);
    labels.insert(
        BACKPLANE_OPEN_CLUSTER_MANAGEMENT_IO_OWNER_NAMESPACE_KEY.into(),
        namespace.to_string(),
    );
    Ok(resource)
}

impl Resource for k8s_openapi::api::apps::v1::Deployment {
    type Spec = k8s_openapi::api::apps::v1::DeploymentSpec;

    fn spec(&self) -> Option<&Self::Spec> {
        self.spec.as_ref()
    }
}

impl Resource for k8s_openapi::api::core::v1::Service {
    type Spec = k8s_openapi::api::core::v1::ServiceSpec;

    fn spec(&self) -> Option<&Self::Spec> {
        self.spec.as_ref()
    }
}
