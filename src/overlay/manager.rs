use crate::overlay::drag::{DragTracker, PointerPosition, SurfaceKey};
use crate::overlay::host::{
    ControlStripView, OpponentView, SurfaceContent, SurfaceFlags, SurfaceHandle, SurfaceHost,
};
use crate::overlay::messages::{AddOutcome, Notice, PanelCommand, ShowOutcome};
use crate::overlay::model::{Color, OpponentId, PanelState, Position};
use crate::overlay::placement::{self, EdgeSide, LayoutMetrics};
use crate::overlay::repository::StateRepository;
use crate::overlay::state::SurfaceLifecycle;
use crate::settings::Settings;
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
struct LiveSurface {
    handle: SurfaceHandle,
    position: Position,
    content: SurfaceContent,
}

/// Owns the control strip and one surface per opponent, and keeps them in
/// step with the state held by the [`StateRepository`].
///
/// Not thread-safe by intent: every call must come from the host's UI
/// thread, the same one the [`SurfaceHost`] expects.
pub struct SurfaceLifecycleManager<H: SurfaceHost> {
    host: H,
    repository: StateRepository,
    layout: LayoutMetrics,
    name_prefix: String,
    control: Option<LiveSurface>,
    opponents: HashMap<OpponentId, LiveSurface>,
    drag: DragTracker,
    hydration_seen: bool,
}

impl<H: SurfaceHost> SurfaceLifecycleManager<H> {
    pub fn new(host: H, repository: StateRepository, settings: &Settings) -> Self {
        Self {
            host,
            repository,
            layout: settings.layout,
            name_prefix: settings.name_prefix().to_string(),
            control: None,
            opponents: HashMap::new(),
            drag: DragTracker::default(),
            hydration_seen: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn repository(&self) -> &StateRepository {
        &self.repository
    }

    pub fn state(&self) -> PanelState {
        self.repository.get()
    }

    pub fn is_showing(&self) -> bool {
        self.control.is_some()
    }

    pub fn lifecycle_of(&self, key: &SurfaceKey) -> SurfaceLifecycle {
        if self.live(key).is_some() {
            SurfaceLifecycle::Live
        } else {
            SurfaceLifecycle::Absent
        }
    }

    pub fn surface_handle(&self, key: &SurfaceKey) -> Option<SurfaceHandle> {
        self.live(key).map(|s| s.handle)
    }

    /// Last position pushed to the surface, which may be ahead of the
    /// persisted one while a drag is in progress.
    pub fn live_position(&self, key: &SurfaceKey) -> Option<Position> {
        self.live(key).map(|s| s.position)
    }

    pub fn opponent_surface_count(&self) -> usize {
        self.opponents.len()
    }

    fn live(&self, key: &SurfaceKey) -> Option<&LiveSurface> {
        match key {
            SurfaceKey::ControlStrip => self.control.as_ref(),
            SurfaceKey::Opponent(id) => self.opponents.get(id),
        }
    }

    fn live_mut(&mut self, key: &SurfaceKey) -> Option<&mut LiveSurface> {
        match key {
            SurfaceKey::ControlStrip => self.control.as_mut(),
            SurfaceKey::Opponent(id) => self.opponents.get_mut(id),
        }
    }

    /// Creates the control strip (if needed), tops the opponent list up to
    /// its maximum and brings every surface in line with the state.
    ///
    /// Without overlay permission nothing is created.
    pub fn show(&mut self) -> Result<ShowOutcome> {
        if !self.host.can_overlay() {
            tracing::info!("overlay permission missing, panel not shown");
            return Ok(ShowOutcome::PermissionDenied);
        }
        self.hydration_seen = self.repository.is_hydrated();

        let outcome = if self.control.is_some() {
            ShowOutcome::AlreadyShown
        } else {
            let state = self.repository.get();
            let position =
                placement::initial_control_position(&state, self.host.screen(), &self.layout);
            let content = SurfaceContent::ControlStrip(ControlStripView::from_state(&state));
            let handle = self
                .host
                .create(&content, position, SurfaceFlags::OVERLAY)
                .context("create control strip surface")?;
            self.control = Some(LiveSurface {
                handle,
                position,
                content,
            });
            tracing::info!(x = position.x, y = position.y, "overlay panel shown");
            ShowOutcome::Shown
        };

        let target = self.repository.get().max_opponents;
        self.ensure_opponent_count(target);
        self.sync_all();
        Ok(outcome)
    }

    /// Destroys every surface. Handles the host no longer knows are skipped.
    pub fn hide(&mut self) {
        for (_, surface) in self.opponents.drain() {
            destroy_quietly(&mut self.host, surface.handle, "opponent");
        }
        if let Some(control) = self.control.take() {
            destroy_quietly(&mut self.host, control.handle, "control strip");
            tracing::info!("overlay panel hidden");
        }
        self.drag.clear();
    }

    /// Re-syncs surfaces with the latest state. Hosts call this on resume;
    /// it also picks up opponents that arrived with background hydration.
    pub fn refresh(&mut self) {
        if self.repository.is_hydrated() && !self.hydration_seen {
            tracing::debug!("reconciling surfaces with hydrated overlay state");
        }
        self.hydration_seen = self.repository.is_hydrated();
        self.sync_all();
    }

    pub fn add_opponent(&mut self) -> AddOutcome {
        let state = self.repository.get();
        if !state.can_add_opponent() {
            self.refresh_control_strip();
            return AddOutcome::LimitReached {
                max: state.max_opponents,
            };
        }
        let id = OpponentId::generate();
        let added = id.clone();
        let prefix = self.name_prefix.clone();
        self.repository
            .update(move |s| s.with_added_opponent(added.clone(), &prefix));
        self.sync_all();
        AddOutcome::Added(id)
    }

    /// Drops the most recently added opponent.
    pub fn remove_last_opponent(&mut self) -> Option<OpponentId> {
        let removed = self.repository.get().opponents.last()?.id.clone();
        let id = removed.clone();
        self.repository.update(move |s| s.without_opponent(&id));
        self.sync_all();
        Some(removed)
    }

    pub fn remove_opponent(&mut self, id: &OpponentId) -> bool {
        if !self.repository.get().contains_opponent(id) {
            return false;
        }
        let id = id.clone();
        self.repository.update(move |s| s.without_opponent(&id));
        self.sync_all();
        true
    }

    pub fn toggle_color(&mut self, id: &OpponentId, color: Color) -> bool {
        if !self.repository.get().contains_opponent(id) {
            return false;
        }
        let id = id.clone();
        self.repository
            .update(move |s| s.with_toggled_color(&id, color));
        self.sync_opponent_surfaces();
        true
    }

    pub fn reset_colors(&mut self) {
        self.repository.update(|s| s.with_reset_colors());
        self.sync_opponent_surfaces();
    }

    /// Returns the new lock flag.
    pub fn toggle_lock(&mut self) -> bool {
        let locked = self.repository.update(|s| s.with_toggled_lock()).locked;
        if locked && matches!(self.drag.active_key(), Some(SurfaceKey::Opponent(_))) {
            self.drag.clear();
        }
        self.sync_all();
        locked
    }

    /// Returns the clamped bound. Existing opponents are never trimmed.
    pub fn set_max_opponents(&mut self, max: i64) -> usize {
        let max = self
            .repository
            .update(move |s| s.with_max_opponents(max))
            .max_opponents;
        self.refresh_control_strip();
        max
    }

    pub fn set_alpha(&mut self, alpha: f32) -> f32 {
        let alpha = self.repository.update(move |s| s.with_alpha(alpha)).alpha;
        self.refresh_control_strip();
        alpha
    }

    pub fn set_opponent_alpha(&mut self, alpha: f32) -> f32 {
        let alpha = self
            .repository
            .update(move |s| s.with_opponent_alpha(alpha))
            .opponent_alpha;
        self.sync_opponent_surfaces();
        alpha
    }

    /// Folds the strip against the screen edge nearest to it. The persisted
    /// anchor is left alone so [`expand`](Self::expand) can restore it.
    pub fn collapse(&mut self) {
        let screen = self.host.screen();
        let side = self
            .control
            .as_ref()
            .map(|c| placement::nearest_edge(c.position.x, screen));
        if self.drag.is_dragging(&SurfaceKey::ControlStrip) {
            self.drag.clear();
        }
        self.repository.update(|s| s.with_control_collapsed(true));
        self.refresh_control_strip();
        self.apply_control_anchor(side);
    }

    pub fn expand(&mut self) {
        self.repository.update(|s| s.with_control_collapsed(false));
        self.refresh_control_strip();
        self.apply_control_anchor(None);
    }

    /// Starts dragging `key`. Refused for opponents while locked, for a
    /// collapsed strip, and for surfaces that are not live.
    pub fn begin_drag(&mut self, key: SurfaceKey, pointer: PointerPosition) -> bool {
        let state = self.repository.get();
        let allowed = match &key {
            SurfaceKey::ControlStrip => !state.control_collapsed,
            SurfaceKey::Opponent(_) => !state.locked,
        };
        if !allowed {
            return false;
        }
        let Some(position) = self.live_position(&key) else {
            return false;
        };
        self.drag.begin(key, pointer, position);
        true
    }

    /// Moves the dragged surface. Nothing is persisted until the drag ends.
    pub fn drag_to(&mut self, pointer: PointerPosition) -> Option<Position> {
        let (key, position) = self.drag.move_to(pointer)?;
        self.move_live_surface(&key, position);
        Some(position)
    }

    /// Finishes the drag at `pointer` and persists the final position.
    pub fn end_drag(&mut self, pointer: PointerPosition) -> Option<Position> {
        let finished = self.drag.finish(Some(pointer));
        self.commit_drag(finished)
    }

    /// Aborted gestures persist wherever the surface was last moved to.
    pub fn cancel_drag(&mut self) -> Option<Position> {
        let finished = self.drag.finish(None);
        self.commit_drag(finished)
    }

    fn commit_drag(&mut self, finished: Option<(SurfaceKey, Position)>) -> Option<Position> {
        let (key, position) = finished?;
        self.move_live_surface(&key, position);
        match key {
            SurfaceKey::ControlStrip => {
                self.repository
                    .update(move |s| s.with_control_position(position));
            }
            SurfaceKey::Opponent(id) => {
                self.repository
                    .update(move |s| s.with_opponent_offset(&id, position));
            }
        }
        Some(position)
    }

    fn move_live_surface(&mut self, key: &SurfaceKey, position: Position) {
        let Some(live) = self.live_mut(key) else {
            return;
        };
        if live.position == position {
            return;
        }
        live.position = position;
        let handle = live.handle;
        if let Err(err) = self.host.update_position(handle, position) {
            tracing::debug!(?err, handle = handle.0, "surface already gone, move skipped");
        }
    }

    /// Routes a command and returns whatever the user should be told.
    pub fn dispatch(&mut self, command: PanelCommand) -> Result<Option<Notice>> {
        let notice = match command {
            PanelCommand::Show => match self.show()? {
                ShowOutcome::PermissionDenied => Some(Notice::NotShown),
                ShowOutcome::Shown | ShowOutcome::AlreadyShown => None,
            },
            PanelCommand::Hide => {
                self.hide();
                None
            }
            PanelCommand::Refresh => {
                self.refresh();
                None
            }
            PanelCommand::AddOpponent => match self.add_opponent() {
                AddOutcome::Added(_) => None,
                AddOutcome::LimitReached { max } => Some(Notice::LimitReached { max }),
            },
            PanelCommand::RemoveLastOpponent => match self.remove_last_opponent() {
                Some(_) => None,
                None => Some(Notice::NothingToRemove),
            },
            PanelCommand::RemoveOpponent { id } => {
                self.remove_opponent(&id);
                None
            }
            PanelCommand::ToggleColor { id, color } => {
                self.toggle_color(&id, color);
                None
            }
            PanelCommand::ToggleLock => Some(Notice::LockChanged {
                locked: self.toggle_lock(),
            }),
            PanelCommand::ResetColors => {
                self.reset_colors();
                Some(Notice::ColorsReset)
            }
            PanelCommand::Collapse => {
                self.collapse();
                None
            }
            PanelCommand::Expand => {
                self.expand();
                None
            }
            PanelCommand::SetMaxOpponents { max } => {
                self.set_max_opponents(max);
                None
            }
            PanelCommand::SetAlpha { alpha } => {
                self.set_alpha(alpha);
                None
            }
            PanelCommand::SetOpponentAlpha { alpha } => {
                self.set_opponent_alpha(alpha);
                None
            }
        };
        Ok(notice)
    }

    /// First-run auto-fill: adds opponents until `target` is reached. Only
    /// ever adds.
    fn ensure_opponent_count(&mut self, target: usize) {
        let current = self.repository.get().opponents.len();
        if target == 0 || current >= target {
            return;
        }
        let ids: Vec<OpponentId> = (current..target).map(|_| OpponentId::generate()).collect();
        let prefix = self.name_prefix.clone();
        self.repository
            .update(move |s| s.with_filled_opponents(target, &ids, &prefix));
    }

    fn sync_all(&mut self) {
        self.sync_opponent_surfaces();
        self.refresh_control_strip();
        self.apply_control_anchor(None);
    }

    /// Reconciles opponent surfaces with the state: removed opponents lose
    /// their surface, live ones are updated in place, new ones are created.
    fn sync_opponent_surfaces(&mut self) {
        let Some(control_handle) = self.control.as_ref().map(|c| c.handle) else {
            return;
        };
        let state = self.repository.get();

        let alive: HashSet<&OpponentId> = state.opponents.iter().map(|o| &o.id).collect();
        let removed: Vec<OpponentId> = self
            .opponents
            .keys()
            .filter(|id| !alive.contains(id))
            .cloned()
            .collect();
        for id in removed {
            if let Some(surface) = self.opponents.remove(&id) {
                destroy_quietly(&mut self.host, surface.handle, "opponent");
            }
            self.drag.abandon_if(&SurfaceKey::Opponent(id));
        }

        let screen = self.host.screen();
        let control_size = self.host.measured_size(control_handle);
        let mut placed: Vec<OpponentId> = Vec::new();

        for (index, opponent) in state.opponents.iter().enumerate() {
            let content = SurfaceContent::Opponent(OpponentView::new(opponent, &state));

            if let Some(live) = self.opponents.get_mut(&opponent.id) {
                if live.content != content {
                    if let Err(err) = self.host.update_content(live.handle, &content) {
                        tracing::debug!(?err, id = %opponent.id, "opponent surface gone, restyle skipped");
                    }
                    live.content = content;
                }
                let dragging = self
                    .drag
                    .is_dragging(&SurfaceKey::Opponent(opponent.id.clone()));
                if !opponent.offset.is_unplaced() && live.position != opponent.offset && !dragging
                {
                    live.position = opponent.offset;
                    if let Err(err) = self.host.update_position(live.handle, opponent.offset) {
                        tracing::debug!(?err, id = %opponent.id, "opponent surface gone, move skipped");
                    }
                }
                continue;
            }

            let position = if opponent.offset.is_unplaced() {
                placement::default_opponent_position(
                    index,
                    state.control,
                    control_size,
                    screen,
                    &self.layout,
                )
            } else {
                opponent.offset
            };

            match self.host.create(&content, position, SurfaceFlags::OVERLAY) {
                Ok(handle) => {
                    tracing::debug!(id = %opponent.id, index, x = position.x, y = position.y, "opponent surface created");
                    self.opponents.insert(
                        opponent.id.clone(),
                        LiveSurface {
                            handle,
                            position,
                            content,
                        },
                    );
                    if opponent.offset.is_unplaced() {
                        placed.push(opponent.id.clone());
                    }
                }
                Err(err) => {
                    tracing::warn!(?err, id = %opponent.id, "failed to create opponent surface");
                }
            }
        }

        if !placed.is_empty() {
            // Recomputed against the state the transform runs on, including
            // a replay over the loaded snapshot.
            let layout = self.layout;
            self.repository.update(move |s| {
                placed.iter().fold(s.clone(), |acc, id| {
                    let Some(index) = acc.opponents.iter().position(|o| &o.id == id) else {
                        return acc;
                    };
                    let position = placement::default_opponent_position(
                        index,
                        acc.control,
                        control_size,
                        screen,
                        &layout,
                    );
                    acc.with_placement_if_unplaced(id, position)
                })
            });
        }
    }

    fn refresh_control_strip(&mut self) {
        let state = self.repository.get();
        let Some(control) = self.control.as_mut() else {
            return;
        };
        let content = SurfaceContent::ControlStrip(ControlStripView::from_state(&state));
        if control.content == content {
            return;
        }
        if let Err(err) = self.host.update_content(control.handle, &content) {
            tracing::debug!(?err, "control strip gone, restyle skipped");
        }
        control.content = content;
    }

    /// Places the strip at its persisted anchor, or against a screen edge
    /// when collapsed. `side` forces the edge; otherwise the nearer one wins.
    fn apply_control_anchor(&mut self, side: Option<EdgeSide>) {
        if self.drag.is_dragging(&SurfaceKey::ControlStrip) {
            return;
        }
        let state = self.repository.get();
        let screen = self.host.screen();
        let Some(control) = self.control.as_mut() else {
            return;
        };
        let target = if state.control_collapsed {
            let side =
                side.unwrap_or_else(|| placement::nearest_edge(control.position.x, screen));
            let width = self.host.measured_size(control.handle).map(|s| s.width);
            placement::collapsed_anchor(side, control.position.y, width, screen, &self.layout)
        } else {
            state.control
        };
        if control.position == target {
            return;
        }
        control.position = target;
        if let Err(err) = self.host.update_position(control.handle, target) {
            tracing::debug!(?err, "control strip gone, move skipped");
        }
    }
}

fn destroy_quietly<H: SurfaceHost>(host: &mut H, handle: SurfaceHandle, what: &str) {
    if let Err(err) = host.destroy(handle) {
        tracing::debug!(?err, handle = handle.0, "{what} surface already gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::host::TracingSurfaceHost;
    use crate::overlay::placement::ScreenMetrics;
    use crate::overlay::store::MemoryStateStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn manager_with(state: PanelState) -> SurfaceLifecycleManager<TracingSurfaceHost> {
        let store = Arc::new(MemoryStateStore::with_state(&state));
        let repository = StateRepository::start(store).expect("start repository");
        assert!(repository.wait_for_hydration(Duration::from_secs(5)));
        SurfaceLifecycleManager::new(
            TracingSurfaceHost::new(ScreenMetrics::default()),
            repository,
            &Settings::default(),
        )
    }

    #[test]
    fn show_twice_reuses_control_strip() {
        let mut manager = manager_with(PanelState::default());
        assert_eq!(manager.show().expect("show"), ShowOutcome::Shown);
        let handle = manager.surface_handle(&SurfaceKey::ControlStrip);
        assert_eq!(manager.show().expect("show"), ShowOutcome::AlreadyShown);
        assert_eq!(manager.surface_handle(&SurfaceKey::ControlStrip), handle);
        assert_eq!(manager.host().surfaces().len(), 4);
    }

    #[test]
    fn drag_on_unknown_surface_is_refused() {
        let mut manager = manager_with(PanelState::default().with_toggled_lock());
        manager.show().expect("show");
        let ghost = SurfaceKey::Opponent(OpponentId::from("ghost"));
        assert!(!manager.begin_drag(ghost, PointerPosition::default()));
        assert_eq!(manager.drag_to(PointerPosition::new(5.0, 5.0)), None);
    }

    #[test]
    fn lifecycle_tracks_show_and_hide() {
        let mut manager = manager_with(PanelState::default());
        assert_eq!(
            manager.lifecycle_of(&SurfaceKey::ControlStrip),
            SurfaceLifecycle::Absent
        );
        manager.show().expect("show");
        assert!(manager.lifecycle_of(&SurfaceKey::ControlStrip).is_live());
        manager.hide();
        assert_eq!(
            manager.lifecycle_of(&SurfaceKey::ControlStrip),
            SurfaceLifecycle::Absent
        );
        assert!(manager.host().surfaces().is_empty());
    }
}
