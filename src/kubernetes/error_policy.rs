use std::{sync::Arc, time::Duration};

use kube::runtime::{controller::Action, finalizer};

use crate::Error;

use super::{Context, Object};

#[allow(clippy::needless_pass_by_value)]
pub fn error_policy<O, C>(_: Arc<O>, error: &Error, ctx: Arc<C>) -> Action
where
    O: Object,
    C: Context,
{
    tracing::warn!(error =% error, "failed to reconcile");
    ctx.metrics()
        .reconcile_failure(O::APP_KUBERNETES_IO_COMPONENT_VALUE, error);
    Action::requeue(requeue_after(error))
}

/// Conflicts clear up on the next attempt, malformed objects only after a user edit.
fn requeue_after(error: &Error) -> Duration {
    match error {
        Error::Finalizer(error) => match error.as_ref() {
            finalizer::Error::ApplyFailed(error) | finalizer::Error::CleanupFailed(error) => {
                requeue_after(error)
            }
            finalizer::Error::AddFinalizer(error) | finalizer::Error::RemoveFinalizer(error) => {
                kube_requeue_after(error)
            }
            finalizer::Error::UnnamedObject | finalizer::Error::InvalidFinalizer => {
                Duration::from_secs(300)
            }
        },
        Error::Kube(error) => kube_requeue_after(error),
        Error::MissingObjectKey(_) => Duration::from_secs(300),
    }
}

fn kube_requeue_after(error: &kube::Error) -> Duration {
    match error {
        kube::Error::Api(response) if response.code == 409 => Duration::from_secs(1),
        _ => Duration::from_secs(5),
    }
}
