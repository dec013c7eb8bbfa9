use crate::overlay::model::{Color, Opponent, OpponentId, PanelState, Position, Rgba, EXCLUDED_FILL};
use crate::overlay::placement::{ScreenMetrics, Size};
use anyhow::{anyhow, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(pub u64);

/// Window flags requested for every overlay surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFlags {
    pub focusable: bool,
    /// Let touches outside the surface's content reach the app underneath.
    pub touch_passthrough: bool,
    /// Allow the surface to extend past the screen edge (collapsed strip).
    pub layout_in_screen: bool,
}

impl SurfaceFlags {
    pub const OVERLAY: SurfaceFlags = SurfaceFlags {
        focusable: false,
        touch_passthrough: false,
        layout_in_screen: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCard {
    pub color: Color,
    pub excluded: bool,
    pub fill: Rgba,
    pub border: Rgba,
}

impl ColorCard {
    pub fn new(color: Color, excluded: bool) -> Self {
        let (fill, border) = if excluded {
            (EXCLUDED_FILL, color.swatch())
        } else {
            (color.swatch(), Rgba::rgba(0, 0, 0, 0x22))
        };
        Self {
            color,
            excluded,
            fill,
            border,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlStripView {
    pub collapsed: bool,
    pub locked: bool,
    pub can_add: bool,
    pub can_remove: bool,
    pub alpha: f32,
}

impl ControlStripView {
    pub fn from_state(state: &PanelState) -> Self {
        Self {
            collapsed: state.control_collapsed,
            locked: state.locked,
            can_add: state.can_add_opponent(),
            can_remove: !state.opponents.is_empty(),
            alpha: state.alpha,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpponentView {
    pub id: OpponentId,
    pub name: String,
    pub cards: [ColorCard; 4],
    pub draggable: bool,
    pub alpha: f32,
}

impl OpponentView {
    pub fn new(opponent: &Opponent, state: &PanelState) -> Self {
        Self {
            id: opponent.id.clone(),
            name: opponent.name.clone(),
            cards: Color::ALL.map(|c| ColorCard::new(c, opponent.excluded.is_excluded(c))),
            draggable: !state.locked,
            alpha: state.opponent_alpha,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceContent {
    ControlStrip(ControlStripView),
    Opponent(OpponentView),
}

/// Platform capability that owns the actual overlay windows.
///
/// Every method is called from the host's UI thread. `update_*` and
/// `destroy` may return an error for a handle the platform already dropped;
/// callers treat that as "already gone".
pub trait SurfaceHost {
    fn can_overlay(&self) -> bool;
    fn screen(&self) -> ScreenMetrics;
    fn create(
        &mut self,
        content: &SurfaceContent,
        position: Position,
        flags: SurfaceFlags,
    ) -> Result<SurfaceHandle>;
    fn update_position(&mut self, handle: SurfaceHandle, position: Position) -> Result<()>;
    fn update_content(&mut self, handle: SurfaceHandle, content: &SurfaceContent) -> Result<()>;
    fn destroy(&mut self, handle: SurfaceHandle) -> Result<()>;
    /// Size of the laid-out surface in pixels, once known.
    fn measured_size(&self, handle: SurfaceHandle) -> Option<Size>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostedSurface {
    pub content: SurfaceContent,
    pub position: Position,
    pub flags: SurfaceFlags,
}

/// Headless host: keeps surfaces in a map and traces every call.
#[derive(Debug)]
pub struct TracingSurfaceHost {
    screen: ScreenMetrics,
    overlay_permitted: bool,
    next_handle: u64,
    surfaces: HashMap<SurfaceHandle, HostedSurface>,
}

impl TracingSurfaceHost {
    pub fn new(screen: ScreenMetrics) -> Self {
        Self {
            screen,
            overlay_permitted: true,
            next_handle: 1,
            surfaces: HashMap::new(),
        }
    }

    pub fn set_overlay_permitted(&mut self, permitted: bool) {
        self.overlay_permitted = permitted;
    }

    pub fn set_screen(&mut self, screen: ScreenMetrics) {
        self.screen = screen;
    }

    pub fn surfaces(&self) -> &HashMap<SurfaceHandle, HostedSurface> {
        &self.surfaces
    }

    pub fn surface(&self, handle: SurfaceHandle) -> Option<&HostedSurface> {
        self.surfaces.get(&handle)
    }

    fn surface_mut(&mut self, handle: SurfaceHandle) -> Result<&mut HostedSurface> {
        self.surfaces
            .get_mut(&handle)
            .ok_or_else(|| anyhow!("unknown surface handle {}", handle.0))
    }
}

impl SurfaceHost for TracingSurfaceHost {
    fn can_overlay(&self) -> bool {
        self.overlay_permitted
    }

    fn screen(&self) -> ScreenMetrics {
        self.screen
    }

    fn create(
        &mut self,
        content: &SurfaceContent,
        position: Position,
        flags: SurfaceFlags,
    ) -> Result<SurfaceHandle> {
        if !self.overlay_permitted {
            return Err(anyhow!("overlay permission not granted"));
        }
        let handle = SurfaceHandle(self.next_handle);
        self.next_handle += 1;
        tracing::debug!(handle = handle.0, x = position.x, y = position.y, "surface created");
        self.surfaces.insert(
            handle,
            HostedSurface {
                content: content.clone(),
                position,
                flags,
            },
        );
        Ok(handle)
    }

    fn update_position(&mut self, handle: SurfaceHandle, position: Position) -> Result<()> {
        self.surface_mut(handle)?.position = position;
        tracing::debug!(handle = handle.0, x = position.x, y = position.y, "surface moved");
        Ok(())
    }

    fn update_content(&mut self, handle: SurfaceHandle, content: &SurfaceContent) -> Result<()> {
        self.surface_mut(handle)?.content = content.clone();
        tracing::debug!(handle = handle.0, "surface content updated");
        Ok(())
    }

    fn destroy(&mut self, handle: SurfaceHandle) -> Result<()> {
        self.surfaces
            .remove(&handle)
            .ok_or_else(|| anyhow!("unknown surface handle {}", handle.0))?;
        tracing::debug!(handle = handle.0, "surface destroyed");
        Ok(())
    }

    fn measured_size(&self, _handle: SurfaceHandle) -> Option<Size> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excluded_cards_turn_grey_with_colored_border() {
        let card = ColorCard::new(Color::Blue, true);
        assert_eq!(card.fill, EXCLUDED_FILL);
        assert_eq!(card.border, Color::Blue.swatch());

        let card = ColorCard::new(Color::Green, false);
        assert_eq!(card.fill, Color::Green.swatch());
    }

    #[test]
    fn opponent_view_lists_cards_in_fixed_order() {
        let id = OpponentId::from("a");
        let state = PanelState::default()
            .with_added_opponent(id.clone(), "Opponent")
            .with_toggled_color(&id, Color::Yellow)
            .with_opponent_alpha(0.6);
        let view = OpponentView::new(&state.opponents[0], &state);
        let colors: Vec<Color> = view.cards.iter().map(|c| c.color).collect();
        assert_eq!(colors, Color::ALL.to_vec());
        assert!(view.cards[1].excluded);
        assert!(!view.draggable);
        assert_eq!(view.alpha, 0.6);
    }

    #[test]
    fn control_view_reflects_capacity() {
        let state = PanelState::default().with_max_opponents(1);
        let view = ControlStripView::from_state(&state);
        assert!(view.can_add);
        assert!(!view.can_remove);

        let state = state.with_added_opponent(OpponentId::from("a"), "Opponent");
        let view = ControlStripView::from_state(&state);
        assert!(!view.can_add);
        assert!(view.can_remove);
    }

    #[test]
    fn tracing_host_rejects_stale_handles() {
        let mut host = TracingSurfaceHost::new(ScreenMetrics::default());
        let content = SurfaceContent::ControlStrip(ControlStripView::from_state(
            &PanelState::default(),
        ));
        let handle = host
            .create(&content, Position::new(1, 2), SurfaceFlags::OVERLAY)
            .expect("create");
        host.destroy(handle).expect("destroy");
        assert!(host.destroy(handle).is_err());
        assert!(host.update_position(handle, Position::new(3, 4)).is_err());
    }
}
