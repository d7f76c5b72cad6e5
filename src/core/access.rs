//! Access controller.
//!
//! Maps a screen and a workspace progression to an [`AccessTier`]. The policy
//! is a declarative table of step thresholds, not branching code, so it can be
//! audited and tested without any UI state. Classification is pure: the same
//! inputs always produce the same tier and nothing is cached.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::config::AccessConfig;
use crate::core::progression::WorkspaceProgression;
use crate::core::screen::{ScreenGroup, ScreenId};
use crate::error::{FoundryError, Result};

/// Visibility/interactivity level of a screen.
///
/// Ordered `Locked < Partial < Accessible`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AccessTier {
    /// Not reachable.
    #[default]
    Locked,
    /// Reachable, with limited content.
    Partial,
    /// Fully reachable.
    Accessible,
}

impl AccessTier {
    /// Whether navigation to a screen at this tier is allowed.
    pub fn is_reachable(&self) -> bool {
        !matches!(self, AccessTier::Locked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessTier::Locked => "locked",
            AccessTier::Partial => "partial",
            AccessTier::Accessible => "accessible",
        }
    }
}

impl std::fmt::Display for AccessTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step thresholds for one screen or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    /// Accessible regardless of progression.
    Always,
    /// `Partial` from `partial_from` (if any), `Accessible` from `accessible_from`.
    Staged {
        partial_from: Option<u32>,
        accessible_from: u32,
    },
}

impl AccessRule {
    /// Build a staged rule, rejecting a partial threshold above the
    /// accessible one.
    pub fn staged(partial_from: Option<u32>, accessible_from: u32) -> Result<Self> {
        if let Some(partial) = partial_from {
            if partial > accessible_from {
                return Err(FoundryError::invalid_state(format!(
                    "partial threshold {} is above accessible threshold {}",
                    partial, accessible_from
                )));
            }
        }
        Ok(AccessRule::Staged {
            partial_from,
            accessible_from,
        })
    }

    /// Rule with only an accessible threshold.
    pub const fn from_step(accessible_from: u32) -> Self {
        AccessRule::Staged {
            partial_from: None,
            accessible_from,
        }
    }

    /// Tier at the given step. Absent progression is step 0.
    pub fn tier_at(&self, step: Option<u32>) -> AccessTier {
        match *self {
            AccessRule::Always => AccessTier::Accessible,
            AccessRule::Staged {
                partial_from,
                accessible_from,
            } => {
                let step = step.unwrap_or(0);
                if step >= accessible_from {
                    AccessTier::Accessible
                } else if partial_from.is_some_and(|p| step >= p) {
                    AccessTier::Partial
                } else {
                    AccessTier::Locked
                }
            }
        }
    }

    /// Combine two rules for the same target, keeping the more restrictive
    /// threshold for each tier.
    pub fn stricter(self, other: AccessRule) -> AccessRule {
        match (self, other) {
            (AccessRule::Always, rule) | (rule, AccessRule::Always) => rule,
            (
                AccessRule::Staged {
                    partial_from: pa,
                    accessible_from: aa,
                },
                AccessRule::Staged {
                    partial_from: pb,
                    accessible_from: ab,
                },
            ) => AccessRule::Staged {
                partial_from: match (pa, pb) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    _ => None,
                },
                accessible_from: aa.max(ab),
            },
        }
    }
}

/// What a table entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    Screen(ScreenId),
    Group(ScreenGroup),
}

/// Declarative access rule table.
///
/// A screen rule takes precedence over its group's rule. Multiple entries for
/// the same target collapse to the stricter rule, so declaration order never
/// changes the outcome. Screens with neither rule are `Locked`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    screens: BTreeMap<ScreenId, AccessRule>,
    groups: BTreeMap<ScreenGroup, AccessRule>,
}

impl AccessPolicy {
    /// Build a policy from table entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (RuleTarget, AccessRule)>) -> Self {
        let mut policy = Self::default();
        for (target, rule) in entries {
            match target {
                RuleTarget::Screen(screen) => {
                    let merged = match policy.screens.get(&screen) {
                        Some(existing) => existing.stricter(rule),
                        None => rule,
                    };
                    policy.screens.insert(screen, merged);
                }
                RuleTarget::Group(group) => {
                    let merged = match policy.groups.get(&group) {
                        Some(existing) => existing.stricter(rule),
                        None => rule,
                    };
                    policy.groups.insert(group, merged);
                }
            }
        }
        policy
    }

    /// The standard rule table.
    pub fn standard() -> Self {
        use AccessRule::{Always, Staged};
        use RuleTarget::{Group, Screen};

        Self::from_entries([
            (Group(ScreenGroup::Shell), Always),
            (Screen(ScreenId::OnboardingWelcome), Always),
            (Screen(ScreenId::OnboardingCompany), AccessRule::from_step(1)),
            (Screen(ScreenId::OnboardingFounders), AccessRule::from_step(2)),
            (Screen(ScreenId::OnboardingIdea), AccessRule::from_step(3)),
            (
                Screen(ScreenId::Dashboard),
                Staged {
                    partial_from: Some(1),
                    accessible_from: 5,
                },
            ),
            (
                Screen(ScreenId::FoundersList),
                Staged {
                    partial_from: Some(3),
                    accessible_from: 4,
                },
            ),
            (Screen(ScreenId::FounderAlignment), AccessRule::from_step(4)),
            (Screen(ScreenId::EquitySplit), AccessRule::from_step(4)),
            (
                Screen(ScreenId::IdeaValidation),
                Staged {
                    partial_from: Some(3),
                    accessible_from: 5,
                },
            ),
            (
                Group(ScreenGroup::Investors),
                Staged {
                    partial_from: Some(4),
                    accessible_from: 6,
                },
            ),
            (
                Screen(ScreenId::InvestorReadiness),
                Staged {
                    partial_from: Some(5),
                    accessible_from: 6,
                },
            ),
            (
                Group(ScreenGroup::Customers),
                Staged {
                    partial_from: Some(4),
                    accessible_from: 5,
                },
            ),
            (
                Screen(ScreenId::TeamMembers),
                Staged {
                    partial_from: Some(2),
                    accessible_from: 4,
                },
            ),
        ])
    }

    /// Shared instance of the standard table.
    pub fn shared_standard() -> &'static AccessPolicy {
        static STANDARD: OnceLock<AccessPolicy> = OnceLock::new();
        STANDARD.get_or_init(AccessPolicy::standard)
    }

    /// Standard table with per-screen overrides from configuration applied.
    ///
    /// An override replaces the screen's rule outright. Overrides naming an
    /// unknown screen or with inconsistent thresholds are skipped with a
    /// warning.
    pub fn from_config(config: &AccessConfig) -> Self {
        let mut policy = Self::standard();
        for (raw_id, entry) in &config.overrides {
            let Some(screen) = ScreenId::parse(raw_id) else {
                tracing::warn!(screen = %raw_id, "ignoring access override for unknown screen");
                continue;
            };
            match AccessRule::staged(entry.partial_from, entry.accessible_from) {
                Ok(rule) => {
                    policy.screens.insert(screen, rule);
                }
                Err(e) => {
                    tracing::warn!(screen = %screen, error = %e, "ignoring access override");
                }
            }
        }
        policy
    }

    /// Effective rule for a screen, if any.
    pub fn rule_for(&self, screen: ScreenId) -> Option<AccessRule> {
        self.screens
            .get(&screen)
            .or_else(|| self.groups.get(&screen.group()))
            .copied()
    }

    /// Classify a screen under the given progression.
    pub fn classify(
        &self,
        screen: ScreenId,
        progression: Option<&WorkspaceProgression>,
    ) -> AccessTier {
        match self.rule_for(screen) {
            Some(rule) => rule.tier_at(progression.map(|p| p.onboarding_step)),
            None => AccessTier::Locked,
        }
    }

    /// Classify a raw screen id. Unknown ids are `Locked`.
    pub fn classify_id(
        &self,
        raw_id: &str,
        progression: Option<&WorkspaceProgression>,
    ) -> AccessTier {
        match ScreenId::parse(raw_id) {
            Some(screen) => self.classify(screen, progression),
            None => AccessTier::Locked,
        }
    }

    /// Tier of every screen under the given progression.
    pub fn table(&self, progression: Option<&WorkspaceProgression>) -> Vec<(ScreenId, AccessTier)> {
        ScreenId::ALL
            .into_iter()
            .map(|s| (s, self.classify(s, progression)))
            .collect()
    }
}

/// Classify a screen against the standard table.
pub fn classify(screen: ScreenId, progression: Option<&WorkspaceProgression>) -> AccessTier {
    AccessPolicy::shared_standard().classify(screen, progression)
}
