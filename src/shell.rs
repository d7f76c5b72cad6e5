//! Application shell.
//!
//! The shell is the composition root: it owns the navigation state, the access
//! policy, the event buses, the stores and the sync session of the screen that
//! is currently mounted. Navigating through the shell runs the gate, publishes
//! the resulting event and swaps the mounted screen's insight session.
//!
//! While mounted, the shell also polls the workspace's progression so steps
//! completed elsewhere unlock screens without a reload.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::{Config, ProgressConfig};
use crate::core::{
    AccessPolicy, AccessTier, EventBus, NavigationEvent, NavigationGate, NavigationOutcome,
    NavigationState, ProgressionEvent, ScreenId, Stage, Subscription, WorkspaceProgression,
};
use crate::error::{FoundryError, Result};
use crate::insight::{InsightStore, InsightSubjectKey, SyncOptions, SyncSession, SyncState};
use crate::workspace::{ProgressPoller, WorkspaceStore};

/// Insight session for the mounted screen.
pub type MountedSession = SyncSession<Arc<dyn InsightStore>>;

type ShellPoller = ProgressPoller<Arc<dyn WorkspaceStore>>;

pub struct Shell {
    workspace_id: String,
    policy: AccessPolicy,
    sync_options: SyncOptions,
    insights: Arc<dyn InsightStore>,
    workspaces: Arc<dyn WorkspaceStore>,
    navigation: NavigationState,
    progression: Option<WorkspaceProgression>,
    mounted: Option<MountedSession>,
    progress: ProgressConfig,
    poller: Option<ShellPoller>,
    polled: Option<watch::Receiver<Option<WorkspaceProgression>>>,
    navigation_events: EventBus<NavigationEvent>,
    progression_events: EventBus<ProgressionEvent>,
}

impl Shell {
    pub fn new(
        config: &Config,
        workspace_id: impl Into<String>,
        insights: Arc<dyn InsightStore>,
        workspaces: Arc<dyn WorkspaceStore>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            policy: AccessPolicy::from_config(&config.access),
            sync_options: SyncOptions::from(&config.sync),
            insights,
            workspaces,
            navigation: NavigationState::default(),
            progression: None,
            mounted: None,
            progress: config.progress.clone(),
            poller: None,
            polled: None,
            navigation_events: EventBus::new(),
            progression_events: EventBus::new(),
        }
    }

    /// Resume from a previously saved navigation state.
    ///
    /// Nothing is mounted until the next navigation.
    pub fn with_navigation(mut self, navigation: NavigationState) -> Self {
        self.navigation = navigation;
        self
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn navigation(&self) -> &NavigationState {
        &self.navigation
    }

    pub fn current_screen(&self) -> ScreenId {
        self.navigation.current_screen()
    }

    pub fn progression(&self) -> Option<&WorkspaceProgression> {
        self.progression.as_ref()
    }

    /// Tier of a screen under the current progression.
    pub fn tier_of(&self, screen: ScreenId) -> AccessTier {
        self.policy.classify(screen, self.progression.as_ref())
    }

    /// Every screen with its current tier.
    pub fn access_table(&self) -> Vec<(ScreenId, AccessTier)> {
        self.policy.table(self.progression.as_ref())
    }

    /// Session of the mounted screen, if it shows an insight.
    pub fn mounted_session(&self) -> Option<&MountedSession> {
        self.mounted.as_ref()
    }

    pub fn mounted_state(&self) -> Option<SyncState> {
        self.mounted.as_ref().map(SyncSession::state)
    }

    pub fn on_navigation<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&NavigationEvent) + Send + Sync + 'static,
    {
        self.navigation_events.subscribe(callback)
    }

    pub fn on_progression<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ProgressionEvent) + Send + Sync + 'static,
    {
        self.progression_events.subscribe(callback)
    }

    /// Read the workspace's progression from the store.
    pub async fn load_progression(&mut self) -> Result<Option<&WorkspaceProgression>> {
        self.progression = self.workspaces.get_progression(&self.workspace_id).await?;
        Ok(self.progression.as_ref())
    }

    /// Start polling the workspace's progression in the background.
    ///
    /// Mounting an insight screen starts polling too. Polled values are
    /// applied before each navigation and by [`Shell::progression_changed`].
    /// Starting twice does nothing.
    pub fn start_progress(&mut self) -> Result<()> {
        if self.poller.is_some() {
            return Ok(());
        }
        let poller = ProgressPoller::from_config(
            self.workspace_id.clone(),
            Arc::clone(&self.workspaces),
            &self.progress,
            self.sync_options.request_timeout,
        );
        poller.start()?;
        tracing::debug!(
            workspace = %self.workspace_id,
            interval_ms = self.progress.poll_interval_ms,
            "progress polling started"
        );
        self.polled = Some(poller.subscribe());
        self.poller = Some(poller);
        Ok(())
    }

    pub fn is_polling_progress(&self) -> bool {
        self.poller.is_some()
    }

    /// Apply a value the progress poller published since the last call.
    ///
    /// Returns whether the cached progression changed.
    pub fn refresh_progression(&mut self) -> bool {
        let Some(polled) = self.polled.as_mut() else {
            return false;
        };
        if !polled.has_changed().unwrap_or(false) {
            return false;
        }
        let latest = polled.borrow_and_update().clone();
        self.apply_polled(latest)
    }

    /// Wait for the progress poller to publish a new value and apply it.
    pub async fn progression_changed(&mut self) -> Result<Option<&WorkspaceProgression>> {
        let Some(polled) = self.polled.as_mut() else {
            return Err(FoundryError::invalid_state("progress polling not started"));
        };
        polled
            .changed()
            .await
            .map_err(|_| FoundryError::invalid_state("progress poller stopped"))?;
        let latest = polled.borrow_and_update().clone();
        self.apply_polled(latest);
        Ok(self.progression.as_ref())
    }

    /// A polled value older than the cached one lost a race with a local
    /// update and is dropped.
    fn apply_polled(&mut self, polled: Option<WorkspaceProgression>) -> bool {
        let Some(polled) = polled else {
            return false;
        };
        if let Some(current) = &self.progression {
            if *current == polled || polled.updated_at < current.updated_at {
                return false;
            }
        }
        self.apply_progression(polled);
        true
    }

    /// Navigate to `target`.
    ///
    /// A denied navigation changes nothing, including the mounted session.
    /// Re-selecting the current screen keeps its session running. If the new
    /// screen's session can't be started the screen change still stands and
    /// the error is returned.
    pub fn navigate(&mut self, target: ScreenId) -> Result<NavigationOutcome> {
        self.refresh_progression();
        let outcome = self.gate().attempt_navigate(target);
        self.after_navigation(&outcome)?;
        Ok(outcome)
    }

    /// Navigate to a screen given by raw id. Unknown ids are denied.
    pub fn navigate_id(&mut self, raw_id: &str) -> Result<NavigationOutcome> {
        self.refresh_progression();
        let outcome = self.gate().attempt_navigate_id(raw_id);
        self.after_navigation(&outcome)?;
        Ok(outcome)
    }

    pub fn open_drawer(&mut self) {
        self.gate().open_drawer();
    }

    pub fn close_drawer(&mut self) {
        self.gate().close_drawer();
    }

    fn gate(&mut self) -> NavigationGate<'_> {
        NavigationGate::new(
            &mut self.navigation,
            &self.policy,
            self.progression.as_ref(),
        )
    }

    fn after_navigation(&mut self, outcome: &NavigationOutcome) -> Result<()> {
        let NavigationOutcome::Navigated { from, to, .. } = *outcome else {
            return Ok(());
        };
        if let Some(event) = outcome.event() {
            self.navigation_events.publish(&event);
        }
        if from != to || self.mounted.is_none() {
            self.mount(to)?;
        }
        Ok(())
    }

    /// Dispose the current session and start one for `screen`'s insight.
    fn mount(&mut self, screen: ScreenId) -> Result<()> {
        if let Some(previous) = self.mounted.take() {
            previous.dispose();
        }

        let Some(kind) = screen.descriptor().insight else {
            return Ok(());
        };
        let session = SyncSession::new(
            InsightSubjectKey::new(self.workspace_id.clone(), kind),
            Arc::clone(&self.insights),
            self.sync_options,
        );
        session.start()?;
        tracing::debug!(screen = %screen, kind = %kind, "insight session mounted");
        self.mounted = Some(session);
        self.start_progress()
    }

    /// Dispose the mounted screen's session.
    ///
    /// Progress polling keeps running until [`Shell::shutdown`].
    pub fn unmount(&mut self) {
        if let Some(session) = self.mounted.take() {
            session.dispose();
        }
    }

    /// Dispose the mounted session and stop progress polling.
    pub fn shutdown(&mut self) {
        self.unmount();
        self.polled = None;
        if let Some(poller) = self.poller.take() {
            poller.dispose();
        }
    }

    /// Raise the onboarding step and publish the change.
    pub async fn advance_onboarding(&mut self, step: u32) -> Result<&WorkspaceProgression> {
        let updated = self
            .workspaces
            .advance_onboarding(&self.workspace_id, step)
            .await?;
        Ok(self.apply_progression(updated))
    }

    /// Set the onboarding step exactly, including backwards, and publish the
    /// change.
    ///
    /// The current screen is left alone even if it becomes locked; the next
    /// navigation is judged against the new step.
    pub async fn reset_onboarding(&mut self, step: u32) -> Result<&WorkspaceProgression> {
        let updated = self
            .workspaces
            .reset_onboarding(&self.workspace_id, step)
            .await?;
        Ok(self.apply_progression(updated))
    }

    pub async fn set_stage(&mut self, stage: Stage) -> Result<&WorkspaceProgression> {
        let updated = self.workspaces.set_stage(&self.workspace_id, stage).await?;
        Ok(self.apply_progression(updated))
    }

    /// Replace the cached progression (from the store or a progress poller)
    /// and publish a step change if there was one.
    pub fn apply_progression(&mut self, updated: WorkspaceProgression) -> &WorkspaceProgression {
        let from = self
            .progression
            .as_ref()
            .map(|p| p.onboarding_step)
            .unwrap_or(0);
        let to = updated.onboarding_step;
        let event = if to > from {
            Some(ProgressionEvent::Advanced {
                workspace_id: self.workspace_id.clone(),
                from,
                to,
            })
        } else if to < from {
            Some(ProgressionEvent::Reset {
                workspace_id: self.workspace_id.clone(),
                from,
                to,
            })
        } else {
            None
        };

        if let Some(event) = event {
            tracing::info!(workspace = %self.workspace_id, from, to, "onboarding step changed");
            self.progression_events.publish(&event);
        }
        self.progression.insert(updated)
    }
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("workspace_id", &self.workspace_id)
            .field("navigation", &self.navigation)
            .field("progression", &self.progression)
            .field("mounted", &self.mounted)
            .field("polling_progress", &self.poller.is_some())
            .finish()
    }
}
