use std::collections::HashMap;

use crate::{Error, Result, metrics::Metrics};

use super::{
    Object, Resource, ResourceName, Subset,
    constants::BACKPLANE_OPEN_CLUSTER_MANAGEMENT_IO_OWNED_BY_KEY,
};

/// A `kube::Api` that records every request it makes.
pub struct Api<K> {
    api: kube::Api<K>,
    metrics: Metrics,
}

impl<R> Api<R> {
    pub fn new(api: kube::Api<R>, metrics: &Metrics) -> Self {
        Self {
            api,
            metrics: metrics.clone(),
        }
    }
}

impl<R> Api<R>
where
    R: Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned + serde::Serialize,
{
    pub async fn delete<O>(&self, object: &O, resources: Vec<R>) -> Result<()>
    where
        O: Object,
    {
        for resource in resources {
            let resource_name = resource.try_name()?;

            tracing::info!(kind =% R::kind(&()), name =% resource_name, "deleting");
            self.metrics.kubernetes_api_usage_count::<R>("delete");
            self.api
                .delete(&resource_name, &object.delete_params())
                .await
                .map_err(Error::Kube)?;
        }

        Ok(())
    }
}

impl<R> Api<R>
where
    R: Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned + serde::Serialize,
    R::Spec: Subset,
{
    /// Applies `resources`, then deletes every owned resource that is no longer desired.
    pub async fn sync<O, I>(&self, object: &O, resources: HashMap<I, R>) -> Result<HashMap<I, R>>
    where
        I: PartialEq + Eq + std::hash::Hash,
        O: Object + Resource,
    {
        let (results, deprecated) = self.update(object, resources).await?;
        self.delete(object, deprecated).await?;
        Ok(results)
    }

    /// Applies `resources` and returns the live copies alongside owned resources
    /// that were not part of `resources`.
    pub async fn update<O, I>(
        &self,
        object: &O,
        resources: HashMap<I, R>,
    ) -> Result<(HashMap<I, R>, Vec<R>)>
    where
        I: PartialEq + Eq + std::hash::Hash,
        O: Object + Resource,
    {
        let mut resources = resources
            .into_iter()
            .map(|(identifier, resource)| {
                resource.try_name().and_then(|resource_name| {
                    resource
                        .try_with_owner(object)
                        .map(|resource| (resource_name, (identifier, resource)))
                })
            })
            .collect::<Result<HashMap<ResourceName, (I, R)>>>()?;

        let uid = object.try_uid()?;
        let mut foreign = Vec::new();

        for (resource_name, (_, resource)) in &resources {
            self.metrics.kubernetes_api_usage_count::<R>("get");
            match self.api.get_opt(resource_name).await.map_err(Error::Kube)? {
                Some(api_resource) if is_owned_by_another(&uid, &api_resource) => {
                    tracing::warn!(
                        kind =% R::kind(&()),
                        name =% resource_name,
                        "owned by another object, skipping"
                    );
                    foreign.push(resource_name.clone());
                }
                Some(api_resource) if is_subset(resource, &api_resource) => {}
                _ => {
                    tracing::info!(kind =% R::kind(&()), name =% resource_name, "applying");
                    self.metrics.kubernetes_api_usage_count::<R>("patch");
                    self.api
                        .patch(
                            resource_name,
                            &object.patch_params(),
                            &kube::api::Patch::Apply(resource),
                        )
                        .await
                        .map_err(Error::Kube)?;
                }
            }
        }

        for resource_name in &foreign {
            resources.remove(resource_name);
        }

        let mut patched = HashMap::new();
        let mut deprecated = Vec::new();

        self.metrics.kubernetes_api_usage_count::<R>("list");
        for api_resource in self
            .api
            .list(&object.try_owned_list_params()?)
            .await
            .map_err(Error::Kube)?
        {
            if let Some((identifier, _)) = resources.remove(&api_resource.try_name()?) {
                patched.insert(identifier, api_resource);
            } else {
                deprecated.push(api_resource);
            }
        }

        if !resources.is_empty() {
            tracing::warn!(
                kind =% R::kind(&()),
                missing = resources.len(),
                "applied resources were not listed"
            );
        }

        Ok((patched, deprecated))
    }
}

/// Names of cluster scoped resources are shared by every owner, so a live
/// resource labelled with another owner's uid is left alone.
fn is_owned_by_another<R>(uid: &str, api_resource: &R) -> bool
where
    R: Resource,
{
    api_resource
        .labels()
        .get(BACKPLANE_OPEN_CLUSTER_MANAGEMENT_IO_OWNED_BY_KEY)
        .is_some_and(|owner| owner != uid)
}

fn is_subset<R>(resource: &R, api_resource: &R) -> bool
where
    R: Resource,
    R::Spec: Subset,
{
    let spec = match (resource.spec(), api_resource.spec()) {
        (Some(spec), Some(api_spec)) => spec.is_subset(api_spec),
        (None, _) => true,
        (Some(_), None) => false,
    };
    spec && resource.meta().is_subset(api_resource.meta())
}

impl<O> Api<O>
where
    O: Object + Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned,
{
    pub async fn update_status(&self, object: &O, status: O::Status) -> Result<()> {
        match object.status() {
            Some(api_status) if &status == api_status => {}
            _ => {
                self.metrics.kubernetes_api_usage_count::<O>("patch");
                self.api
                    .patch_status(
                        &object.try_name()?,
                        &object.patch_status_params(),
                        &object.patch_status(status),
                    )
                    .await
                    .map_err(Error::Kube)?;
            }
        }

        Ok(())
    }
}
