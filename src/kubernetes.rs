mod annotations;
mod api;
mod conditions_ext;
pub mod constants;
mod context;
mod error_policy;
mod labels;
mod object;
mod resource;
mod resource_name;
mod resource_namespace;
mod resource_uid;
mod selector_labels;
mod subset;

pub use annotations::Annotations;
pub use api::Api;
pub use conditions_ext::ConditionsExt;
pub use context::Context;
pub use error_policy::error_policy;
pub use labels::Labels;
pub use object::Object;
pub use resource::{Resource, try_with_owner_labels};
pub use resource_name::ResourceName;
pub use resource_namespace::ObjectNamespace;
pub use resource_uid::ResourceUid;
pub use selector_labels::SelectorLabels;
pub use subset::Subset;
