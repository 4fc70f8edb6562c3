use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};

use super::{
    Labels,
    constants::{
        APP_KUBERNETES_IO_COMPONENT_KEY, APP_KUBERNETES_IO_INSTANCE_KEY,
        APP_KUBERNETES_IO_MANAGED_BY_KEY, APP_KUBERNETES_IO_MANAGED_BY_VALUE,
        APP_KUBERNETES_IO_NAME_KEY, APP_KUBERNETES_IO_NAME_VALUE,
        BACKPLANE_OPEN_CLUSTER_MANAGEMENT_IO_OWNED_BY_KEY,
    },
    resource::Resource,
};

use crate::{Error, Result};

/// A custom resource the operator reconciles and which owns the generated objects.
pub trait Object: kube::ResourceExt<DynamicType = ()> {
    const APP_KUBERNETES_IO_COMPONENT_VALUE: &'static str;

    type Status: PartialEq + serde::Serialize;

    fn delete_params(&self) -> DeleteParams {
        DeleteParams::background()
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams::apply(APP_KUBERNETES_IO_MANAGED_BY_VALUE).force()
    }

    fn patch_status(&self, status: Self::Status) -> Patch<serde_json::Value> {
        Patch::Merge(serde_json::json!({ "status": status }))
    }

    fn patch_status_params(&self) -> PatchParams {
        PatchParams::apply(APP_KUBERNETES_IO_MANAGED_BY_VALUE)
    }

    fn status(&self) -> Option<&Self::Status>;

    fn try_owner_reference(&self) -> Result<(String, String, OwnerReference)>
    where
        Self: Resource,
    {
        let uid = self.try_uid()?;
        let reference = self
            .controller_owner_ref(&())
            .ok_or_else(|| Error::MissingObjectKey(".metadata.name"))?;
        Ok((
            BACKPLANE_OPEN_CLUSTER_MANAGEMENT_IO_OWNED_BY_KEY.into(),
            uid.to_string(),
            reference,
        ))
    }

    fn try_owned_list_params(&self) -> Result<ListParams>
    where
        Self: Resource,
    {
        Ok(ListParams::default().labels(&format!(
            "{BACKPLANE_OPEN_CLUSTER_MANAGEMENT_IO_OWNED_BY_KEY}={}",
            self.try_uid()?
        )))
    }

    fn try_labels(&self) -> Result<Labels>
    where
        Self: Resource,
    {
        Ok(BTreeMap::from([
            (
                APP_KUBERNETES_IO_COMPONENT_KEY.into(),
                Self::APP_KUBERNETES_IO_COMPONENT_VALUE.into(),
            ),
            (
                APP_KUBERNETES_IO_INSTANCE_KEY.into(),
                self.try_name()?.to_string(),
            ),
            (
                APP_KUBERNETES_IO_MANAGED_BY_KEY.into(),
                APP_KUBERNETES_IO_MANAGED_BY_VALUE.into(),
            ),
            (
                APP_KUBERNETES_IO_NAME_KEY.into(),
                APP_KUBERNETES_IO_NAME_VALUE.into(),
            ),
            (
                BACKPLANE_OPEN_CLUSTER_MANAGEMENT_IO_OWNED_BY_KEY.into(),
                self.try_uid()?.to_string(),
            ),
        ])
        .into())
    }
}
