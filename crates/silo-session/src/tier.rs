//! Tier policy
//!
//! Plan limits are a read-only input supplied by the entitlement layer;
//! the engine only ever consults them, never mutates them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
    Enterprise,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Premium => "premium",
            Tier::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Limit {
    Finite(u32),
    Unbounded,
}

impl Limit {
    pub fn allows(&self, count: usize) -> bool {
        match self {
            Limit::Finite(n) => count < *n as usize,
            Limit::Unbounded => true,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Limit::Unbounded)
    }
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Limit::Finite(n) => write!(f, "{n}"),
            Limit::Unbounded => write!(f, "unbounded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierLimits {
    pub max_active_sessions: Limit,
    pub retention_days: Limit,
    pub auto_restore_allowed: bool,
}

impl TierLimits {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                max_active_sessions: Limit::Finite(5),
                retention_days: Limit::Finite(7),
                auto_restore_allowed: false,
            },
            Tier::Premium => Self {
                max_active_sessions: Limit::Unbounded,
                retention_days: Limit::Finite(30),
                auto_restore_allowed: true,
            },
            Tier::Enterprise => Self {
                max_active_sessions: Limit::Unbounded,
                retention_days: Limit::Unbounded,
                auto_restore_allowed: true,
            },
        }
    }
}

pub trait TierPolicy: Send + Sync {
    fn tier(&self) -> Tier;
    fn limits(&self) -> TierLimits;
}

/// Fixed policy, the common case outside the entitlement refresh path.
#[derive(Debug, Clone)]
pub struct StaticTierPolicy {
    tier: Tier,
    limits: TierLimits,
}

impl StaticTierPolicy {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            limits: TierLimits::for_tier(tier),
        }
    }

    pub fn with_limits(tier: Tier, limits: TierLimits) -> Self {
        Self { tier, limits }
    }
}

impl TierPolicy for StaticTierPolicy {
    fn tier(&self) -> Tier {
        self.tier
    }

    fn limits(&self) -> TierLimits {
        self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_allows() {
        assert!(Limit::Finite(3).allows(0));
        assert!(Limit::Finite(3).allows(2));
        assert!(!Limit::Finite(3).allows(3));
        assert!(Limit::Unbounded.allows(1_000_000));
    }

    #[test]
    fn test_tier_defaults() {
        let free = TierLimits::for_tier(Tier::Free);
        assert!(!free.auto_restore_allowed);
        assert_eq!(free.max_active_sessions, Limit::Finite(5));

        let enterprise = TierLimits::for_tier(Tier::Enterprise);
        assert!(enterprise.retention_days.is_unbounded());
        assert!(enterprise.auto_restore_allowed);
    }
}
