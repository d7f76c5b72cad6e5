//! Core types and logic for Foundry.
//!
//! Progression, the screen registry, the access rule table, the navigation
//! gate and the event bus. Nothing in here performs I/O.

pub mod access;
pub mod events;
pub mod navigation;
pub mod progression;
pub mod screen;

pub use access::{classify, AccessPolicy, AccessRule, AccessTier, RuleTarget};
pub use events::{EventBus, NavigationEvent, ProgressionEvent, Subscription};
pub use navigation::{NavigationGate, NavigationOutcome, NavigationState};
pub use progression::{Stage, WorkspaceProgression};
pub use screen::{ScreenDescriptor, ScreenGroup, ScreenId};
