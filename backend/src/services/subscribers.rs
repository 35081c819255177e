use crate::services::user_directory::UserDirectory;
use log::warn;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    NoRegisteredUsers,
    QueryFailed(String),
}

/// Users who receive this tick's sample.
///
/// `Fallback` is the degraded mode used while no user has registered a push
/// token (or the query failed): the single shared sensor keeps syncing to the
/// configured default user instead of to nobody.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriberSet {
    Registered(Vec<i32>),
    Fallback { user_id: i32, reason: FallbackReason },
}

impl SubscriberSet {
    pub fn user_ids(&self) -> Vec<i32> {
        match self {
            SubscriberSet::Registered(ids) => ids.clone(),
            SubscriberSet::Fallback { user_id, .. } => vec![*user_id],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, SubscriberSet::Fallback { .. })
    }
}

pub struct SubscriberEnumerator {
    directory: Arc<dyn UserDirectory>,
    default_user_id: i32,
}

impl SubscriberEnumerator {
    pub fn new(directory: Arc<dyn UserDirectory>, default_user_id: i32) -> Self {
        Self {
            directory,
            default_user_id,
        }
    }

    pub fn default_user_id(&self) -> i32 {
        self.default_user_id
    }

    /// Computed fresh on every call; never cached across ticks.
    pub async fn list_subscribers(&self) -> SubscriberSet {
        let reason = match self.directory.users_with_push_token().await {
            Ok(ids) if !ids.is_empty() => return SubscriberSet::Registered(ids),
            Ok(_) => FallbackReason::NoRegisteredUsers,
            Err(e) => FallbackReason::QueryFailed(e.to_string()),
        };

        warn!(
            "Degraded mode: no subscribers ({:?}), syncing default user {}",
            reason, self.default_user_id
        );

        SubscriberSet::Fallback {
            user_id: self.default_user_id,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::FakeDirectory;

    #[actix_rt::test]
    async fn test_registered_users_returned() {
        let directory = Arc::new(FakeDirectory::new());
        directory.set_token(3, "a");
        directory.set_token(9, "b");

        let set = SubscriberEnumerator::new(directory, 16).list_subscribers().await;

        assert_eq!(set, SubscriberSet::Registered(vec![3, 9]));
        assert!(!set.is_degraded());
    }

    #[actix_rt::test]
    async fn test_empty_result_falls_back_to_default() {
        let directory = Arc::new(FakeDirectory::new());
        let set = SubscriberEnumerator::new(directory, 16).list_subscribers().await;

        assert_eq!(
            set,
            SubscriberSet::Fallback {
                user_id: 16,
                reason: FallbackReason::NoRegisteredUsers
            }
        );
        assert_eq!(set.user_ids(), vec![16]);
        assert!(set.is_degraded());
    }

    #[actix_rt::test]
    async fn test_query_failure_falls_back_to_default() {
        let directory = Arc::new(FakeDirectory::new());
        directory.fail_queries();

        let set = SubscriberEnumerator::new(directory, 42).list_subscribers().await;

        assert!(matches!(
            set,
            SubscriberSet::Fallback { user_id: 42, reason: FallbackReason::QueryFailed(_) }
        ));
    }

    #[actix_rt::test]
    async fn test_recomputed_each_call() {
        let directory = Arc::new(FakeDirectory::new());
        let enumerator = SubscriberEnumerator::new(directory.clone(), 16);

        assert!(enumerator.list_subscribers().await.is_degraded());
        directory.set_token(5, "token");
        assert_eq!(enumerator.list_subscribers().await.user_ids(), vec![5]);
    }
}
