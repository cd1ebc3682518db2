//! Process-wide defaults picked up by every new [`Source`](crate::Source)
//! that does not override them through a
//! [`SourceBuilder`](crate::SourceBuilder).
use crate::diagnostics::WarnPolicy;
use parking_lot::RwLock;

static DEFAULT_WARN_POLICY: RwLock<Option<WarnPolicy>> = parking_lot::const_rwlock(None);

/// Policy applied to sources created from now on. Existing sources keep the
/// policy they were created with.
pub fn set_default_warn_policy(policy: WarnPolicy) {
    tracing::debug!(?policy, "default unresolved-drop policy changed");
    *DEFAULT_WARN_POLICY.write() = Some(policy);
}

/// [`WarnPolicy::Print`] unless changed with [`set_default_warn_policy`].
pub fn default_warn_policy() -> WarnPolicy {
    DEFAULT_WARN_POLICY.read().clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_round_trips() {
        // Only test in this binary that touches the global policy.
        assert!(matches!(default_warn_policy(), WarnPolicy::Print));
        set_default_warn_policy(WarnPolicy::DontWarn);
        assert!(matches!(default_warn_policy(), WarnPolicy::DontWarn));
        set_default_warn_policy(WarnPolicy::Print);
    }
}
