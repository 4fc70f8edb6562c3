use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;

pub trait ConditionsExt {
    /// Merges `other` into `self` by condition type. A condition whose status,
    /// reason and message are unchanged keeps its original transition time.
    fn merge_from(&self, other: &Self) -> Self;
}

impl ConditionsExt for Vec<Condition> {
    fn merge_from(&self, other: &Self) -> Self {
        let mut results: Vec<Condition> = self
            .iter()
            .map(|current| match other.iter().find(|o| o.type_ == current.type_) {
                Some(next)
                    if current.status == next.status
                        && current.reason == next.reason
                        && current.message == next.message =>
                {
                    Condition {
                        observed_generation: next.observed_generation,
                        ..current.clone()
                    }
                }
                Some(next) => next.clone(),
                None => current.clone(),
            })
            .collect();

        results.extend(
            other
                .iter()
                .filter(|next| !self.iter().any(|current| current.type_ == next.type_))
                .cloned(),
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::{
        apimachinery::pkg::apis::meta::v1::{Condition, Time},
        chrono::{TimeZone, Utc},
    };

    use super::ConditionsExt;

    fn condition(type_: &str, status: &str, reason: &str, second: u32) -> Condition {
        Condition {
            last_transition_time: Time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap()),
            message: format!("{type_} is {reason}"),
            observed_generation: Some(1),
            reason: reason.into(),
            status: status.into(),
            type_: type_.into(),
        }
    }

    #[test]
    fn unchanged_condition_keeps_transition_time() {
        // arrange
        let current = vec![condition("Deployment", "True", "Available", 0)];
        let next = vec![condition("Deployment", "True", "Available", 30)];

        // act
        let merged = current.merge_from(&next);

        // assert
        assert_eq!(current, merged);
    }

    #[test]
    fn changed_condition_is_replaced() {
        // arrange
        let current = vec![condition("Deployment", "False", "Unavailable", 0)];
        let next = vec![condition("Deployment", "True", "Available", 30)];

        // act
        let merged = current.merge_from(&next);

        // assert
        assert_eq!(next, merged);
    }

    #[test]
    fn new_conditions_are_appended_and_old_ones_kept() {
        // arrange
        let current = vec![condition("Deployment", "True", "Available", 0)];
        let next = vec![condition("APIService", "True", "Available", 30)];

        // act
        let merged = current.merge_from(&next);

        // assert
        assert_eq!(
            vec![
                condition("Deployment", "True", "Available", 0),
                condition("APIService", "True", "Available", 30)
            ],
            merged
        );
    }
}
