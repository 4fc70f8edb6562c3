pub const APP_KUBERNETES_IO_COMPONENT_KEY: &str = "app.kubernetes.io/component";

pub const APP_KUBERNETES_IO_INSTANCE_KEY: &str = "app.kubernetes.io/instance";

pub const APP_KUBERNETES_IO_MANAGED_BY_KEY: &str = "app.kubernetes.io/managed-by";
pub const APP_KUBERNETES_IO_MANAGED_BY_VALUE: &str = "backplane-operator";

pub const APP_KUBERNETES_IO_NAME_KEY: &str = "app.kubernetes.io/name";
pub const APP_KUBERNETES_IO_NAME_VALUE: &str = "backplane";

pub const BACKPLANE_OPEN_CLUSTER_MANAGEMENT_IO_OWNED_BY_KEY: &str =
    "backplane.open-cluster-management.io/owned-by";

pub const BACKPLANE_OPEN_CLUSTER_MANAGEMENT_IO_OWNER_NAMESPACE_KEY: &str =
    "backplane.open-cluster-management.io/owner-namespace";
