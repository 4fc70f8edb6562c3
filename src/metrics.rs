use kube::runtime::finalizer;
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, MeterProvider as _},
};

use crate::{Error, kubernetes::Resource};

#[derive(Clone)]
pub struct Metrics {
    kubernetes_api_usage_total: Counter<u64>,
    reconciliation_errors_total: Counter<u64>,
    reconciliations_total: Counter<u64>,
    reconcile_duration_seconds: Histogram<f64>,
}

impl Metrics {
    #[must_use]
    pub fn new(provider: &impl opentelemetry::metrics::MeterProvider) -> Self {
        let meter = provider.meter("backplane-operator");

        Self {
            kubernetes_api_usage_total: meter
                .u64_counter("backplane_operator_kubernetes_api_usage_total")
                .with_description("The total number of Kubernetes API requests made.")
                .build(),
            reconciliation_errors_total: meter
                .u64_counter("backplane_operator_reconciliation_errors_total")
                .with_description("The total number of reconciliation errors.")
                .build(),
            reconciliations_total: meter
                .u64_counter("backplane_operator_reconciliations_total")
                .with_description("The total number of reconciliations.")
                .build(),
            reconcile_duration_seconds: meter
                .f64_histogram("backplane_operator_reconcile_duration_seconds")
                .with_description("The reconcile duration in seconds.")
                .with_unit("s")
                .build(),
        }
    }

    #[must_use]
    pub fn count_and_measure(&self, controller: &'static str) -> ControllerTimer {
        self.reconciliations_total
            .add(1, &[KeyValue::new("controller", controller)]);
        ControllerTimer {
            start: std::time::Instant::now(),
            metric: self.reconcile_duration_seconds.clone(),
            controller,
        }
    }

    pub fn reconcile_failure(&self, controller: &'static str, error: &Error) {
        self.reconciliation_errors_total.add(
            1,
            &[
                KeyValue::new("controller", controller),
                KeyValue::new("error", error_label(error)),
            ],
        );
    }

    pub(crate) fn kubernetes_api_usage_count<R>(&self, verb: &'static str)
    where
        R: Resource,
    {
        self.kubernetes_api_usage_total.add(
            1,
            &[
                KeyValue::new("kind", R::kind(&())),
                KeyValue::new("group", R::group(&())),
                KeyValue::new("verb", verb),
                KeyValue::new("version", R::version(&())),
            ],
        );
    }
}

fn error_label(error: &Error) -> &'static str {
    match error {
        Error::Finalizer(error) => match error.as_ref() {
            finalizer::Error::ApplyFailed(error) | finalizer::Error::CleanupFailed(error) => {
                error_label(error)
            }
            finalizer::Error::AddFinalizer(_) | finalizer::Error::RemoveFinalizer(_) => "kube",
            finalizer::Error::UnnamedObject | finalizer::Error::InvalidFinalizer => "finalizer",
        },
        Error::Kube(_) => "kube",
        Error::MissingObjectKey(_) => "missing object key",
    }
}

pub struct ControllerTimer {
    start: std::time::Instant,
    metric: Histogram<f64>,
    controller: &'static str,
}

impl Drop for ControllerTimer {
    fn drop(&mut self) {
        self.metric.record(
            self.start.elapsed().as_secs_f64(),
            &[KeyValue::new("controller", self.controller)],
        );
    }
}

#[cfg(test)]
mod tests {
    use kube::{core::ErrorResponse, runtime::finalizer};

    use crate::Error;

    use super::error_label;

    #[test]
    fn error_labels() {
        let kube = Error::Kube(kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "conflict".into(),
            reason: "Conflict".into(),
            code: 409,
        }));

        assert_eq!("kube", error_label(&kube));
        assert_eq!(
            "missing object key",
            error_label(&Error::MissingObjectKey(".metadata.uid"))
        );
    }

    #[test]
    fn error_labels_look_through_finalizer() {
        // arrange
        let apply = Error::Finalizer(Box::new(finalizer::Error::ApplyFailed(
            Error::MissingObjectKey(".metadata.namespace"),
        )));
        let unnamed = Error::Finalizer(Box::new(finalizer::Error::UnnamedObject));

        // act & assert
        assert_eq!("missing object key", error_label(&apply));
        assert_eq!("finalizer", error_label(&unnamed));
    }
}
