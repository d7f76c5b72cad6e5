//! Navigation gate.
//!
//! The gate is the only code path that changes the current screen. It asks the
//! access policy for the target's tier and silently refuses locked targets:
//! a denied navigation returns [`NavigationOutcome::Denied`] and leaves the
//! navigation state exactly as it was.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::access::{AccessPolicy, AccessTier};
use crate::core::events::NavigationEvent;
use crate::core::progression::WorkspaceProgression;
use crate::core::screen::ScreenId;

/// Navigation state owned by the gate.
///
/// Fields are private so that only [`NavigationGate`] can change them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NavigationState {
    current_screen: ScreenId,
    drawer_open: bool,
    updated_at: DateTime<Utc>,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            current_screen: ScreenId::Home,
            drawer_open: false,
            updated_at: Utc::now(),
        }
    }
}

impl NavigationState {
    /// Screen currently shown.
    pub fn current_screen(&self) -> ScreenId {
        self.current_screen
    }

    /// Whether the navigation drawer overlay is open.
    pub fn drawer_open(&self) -> bool {
        self.drawer_open
    }

    /// When the state last changed.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Result of a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Current screen changed (or was re-selected) and the drawer closed.
    Navigated {
        from: ScreenId,
        to: ScreenId,
        tier: AccessTier,
    },
    /// Target was locked or unknown; nothing changed.
    Denied { target: String },
}

impl NavigationOutcome {
    pub fn is_navigated(&self) -> bool {
        matches!(self, NavigationOutcome::Navigated { .. })
    }

    /// Event to publish for this outcome, if any.
    pub fn event(&self) -> Option<NavigationEvent> {
        match self {
            NavigationOutcome::Navigated { from, to, tier } => Some(NavigationEvent::ScreenChanged {
                from: *from,
                to: *to,
                tier: *tier,
            }),
            NavigationOutcome::Denied { .. } => None,
        }
    }
}

/// Gate over a borrowed navigation state.
#[derive(Debug)]
pub struct NavigationGate<'a> {
    state: &'a mut NavigationState,
    policy: &'a AccessPolicy,
    progression: Option<&'a WorkspaceProgression>,
}

impl<'a> NavigationGate<'a> {
    /// Create a gate for the given state, policy and progression.
    pub fn new(
        state: &'a mut NavigationState,
        policy: &'a AccessPolicy,
        progression: Option<&'a WorkspaceProgression>,
    ) -> Self {
        Self {
            state,
            policy,
            progression,
        }
    }

    pub fn current_screen(&self) -> ScreenId {
        self.state.current_screen
    }

    /// Tier of a screen under the gate's progression.
    pub fn tier_of(&self, screen: ScreenId) -> AccessTier {
        self.policy.classify(screen, self.progression)
    }

    /// Try to move to `target`.
    pub fn attempt_navigate(&mut self, target: ScreenId) -> NavigationOutcome {
        let tier = self.tier_of(target);
        if !tier.is_reachable() {
            tracing::debug!(screen = %target, "navigation to locked screen ignored");
            return NavigationOutcome::Denied {
                target: target.as_str().to_string(),
            };
        }

        let from = self.state.current_screen;
        self.state.current_screen = target;
        self.state.drawer_open = false;
        self.state.updated_at = Utc::now();

        NavigationOutcome::Navigated {
            from,
            to: target,
            tier,
        }
    }

    /// Try to move to a screen given by raw id. Unknown ids are denied.
    pub fn attempt_navigate_id(&mut self, raw_id: &str) -> NavigationOutcome {
        match ScreenId::parse(raw_id) {
            Some(screen) => self.attempt_navigate(screen),
            None => {
                tracing::debug!(screen = %raw_id, "navigation to unknown screen ignored");
                NavigationOutcome::Denied {
                    target: raw_id.to_string(),
                }
            }
        }
    }

    pub fn open_drawer(&mut self) {
        self.state.drawer_open = true;
    }

    pub fn close_drawer(&mut self) {
        self.state.drawer_open = false;
    }
}
