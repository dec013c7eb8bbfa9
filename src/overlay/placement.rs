use crate::overlay::model::{PanelState, Position};
use serde::{Deserialize, Serialize};

pub const CLOCKWISE_SLOT_COUNT: usize = 8;

/// Live screen bounds in pixels plus the dp-to-pixel factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenMetrics {
    pub width: i32,
    pub height: i32,
    #[serde(default = "default_density")]
    pub density: f32,
}

fn default_density() -> f32 {
    1.0
}

impl ScreenMetrics {
    pub const fn new(width: i32, height: i32, density: f32) -> Self {
        Self {
            width,
            height,
            density,
        }
    }

    pub fn dp(&self, value: i32) -> i32 {
        (value as f32 * self.density) as i32
    }
}

impl Default for ScreenMetrics {
    fn default() -> Self {
        Self::new(1080, 2280, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// Surface dimensions in density-independent units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutMetrics {
    #[serde(default = "default_control_width")]
    pub control_width: i32,
    #[serde(default = "default_control_height")]
    pub control_height: i32,
    #[serde(default = "default_gap")]
    pub gap: i32,
    #[serde(default = "default_opponent_width")]
    pub opponent_width: i32,
    #[serde(default = "default_opponent_height")]
    pub opponent_height: i32,
    #[serde(default = "default_min_top_inset")]
    pub min_top_inset: i32,
    #[serde(default = "default_collapsed_handle_width")]
    pub collapsed_handle_width: i32,
    #[serde(default = "default_collapsed_peek")]
    pub collapsed_peek: i32,
}

fn default_control_width() -> i32 {
    210
}

fn default_control_height() -> i32 {
    56
}

fn default_gap() -> i32 {
    12
}

fn default_opponent_width() -> i32 {
    230
}

fn default_opponent_height() -> i32 {
    125
}

fn default_min_top_inset() -> i32 {
    24
}

fn default_collapsed_handle_width() -> i32 {
    46
}

fn default_collapsed_peek() -> i32 {
    18
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            control_width: default_control_width(),
            control_height: default_control_height(),
            gap: default_gap(),
            opponent_width: default_opponent_width(),
            opponent_height: default_opponent_height(),
            min_top_inset: default_min_top_inset(),
            collapsed_handle_width: default_collapsed_handle_width(),
            collapsed_peek: default_collapsed_peek(),
        }
    }
}

/// Compass slots around the control strip, in clockwise order starting east.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompassSlot {
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    North,
    NorthEast,
}

impl CompassSlot {
    pub const CLOCKWISE: [CompassSlot; CLOCKWISE_SLOT_COUNT] = [
        CompassSlot::East,
        CompassSlot::SouthEast,
        CompassSlot::South,
        CompassSlot::SouthWest,
        CompassSlot::West,
        CompassSlot::NorthWest,
        CompassSlot::North,
        CompassSlot::NorthEast,
    ];

    /// Unit direction; y grows downwards.
    pub const fn direction(self) -> (i32, i32) {
        match self {
            CompassSlot::East => (1, 0),
            CompassSlot::SouthEast => (1, 1),
            CompassSlot::South => (0, 1),
            CompassSlot::SouthWest => (-1, 1),
            CompassSlot::West => (-1, 0),
            CompassSlot::NorthWest => (-1, -1),
            CompassSlot::North => (0, -1),
            CompassSlot::NorthEast => (1, -1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSlot {
    /// 1-based ring number.
    pub ring: i32,
    pub slot: CompassSlot,
}

pub fn ring_slot(index: usize) -> RingSlot {
    RingSlot {
        ring: (index / CLOCKWISE_SLOT_COUNT) as i32 + 1,
        slot: CompassSlot::CLOCKWISE[index % CLOCKWISE_SLOT_COUNT],
    }
}

/// Default spot for the opponent at `index`, walking clockwise around the
/// control strip and moving one opponent-size further out per full ring.
///
/// `control_size` is the measured strip size in pixels when the host knows
/// it; otherwise the configured default is used.
pub fn default_opponent_position(
    index: usize,
    control_anchor: Position,
    control_size: Option<Size>,
    screen: ScreenMetrics,
    layout: &LayoutMetrics,
) -> Position {
    let control = control_size
        .filter(|s| s.width > 0 && s.height > 0)
        .unwrap_or_else(|| {
            Size::new(
                screen.dp(layout.control_width),
                screen.dp(layout.control_height),
            )
        });
    let gap = screen.dp(layout.gap);
    let opponent_w = screen.dp(layout.opponent_width);
    let opponent_h = screen.dp(layout.opponent_height);

    let RingSlot { ring, slot } = ring_slot(index);
    let step_x = control.width + gap + (ring - 1) * (opponent_w + gap);
    let step_y = control.height + gap + (ring - 1) * (opponent_h + gap);
    let (dx, dy) = slot.direction();

    clamp_opponent_position(
        control_anchor.offset_by(dx * step_x, dy * step_y),
        screen,
        layout,
    )
}

pub fn clamp_opponent_position(
    raw: Position,
    screen: ScreenMetrics,
    layout: &LayoutMetrics,
) -> Position {
    let max_x = (screen.width - screen.dp(layout.opponent_width)).max(0);
    let min_y = screen.dp(layout.min_top_inset);
    let max_y = (screen.height - screen.dp(layout.opponent_height)).max(min_y);
    Position::new(raw.x.clamp(0, max_x), raw.y.clamp(min_y, max_y))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSide {
    Left,
    Right,
}

pub fn nearest_edge(x: i32, screen: ScreenMetrics) -> EdgeSide {
    if x > screen.width / 2 {
        EdgeSide::Right
    } else {
        EdgeSide::Left
    }
}

/// Where a collapsed strip sits: pushed off the chosen edge so only the
/// peek width stays visible. `y` is kept as is.
pub fn collapsed_anchor(
    side: EdgeSide,
    y: i32,
    collapsed_width: Option<i32>,
    screen: ScreenMetrics,
    layout: &LayoutMetrics,
) -> Position {
    let peek = screen.dp(layout.collapsed_peek);
    let x = match side {
        EdgeSide::Right => screen.width - peek,
        EdgeSide::Left => {
            let width = collapsed_width
                .filter(|w| *w > 0)
                .unwrap_or_else(|| screen.dp(layout.collapsed_handle_width));
            -(width - peek)
        }
    };
    Position::new(x, y)
}

/// Position used when the strip surface is first created.
pub fn initial_control_position(
    state: &PanelState,
    screen: ScreenMetrics,
    layout: &LayoutMetrics,
) -> Position {
    if state.control_collapsed {
        collapsed_anchor(EdgeSide::Right, state.control.y, None, screen, layout)
    } else {
        state.control
    }
}
