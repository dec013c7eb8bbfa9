use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

pub const MIN_ALPHA: f32 = 0.2;
pub const MAX_ALPHA: f32 = 1.0;
pub const MIN_OPPONENTS: usize = 1;
pub const MAX_OPPONENTS_LIMIT: usize = 12;
pub const DEFAULT_MAX_OPPONENTS: usize = 3;
pub const DEFAULT_CONTROL_POSITION: Position = Position::new(0, 200);

static NUMBERED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s+(\d+)$").expect("valid numbered name pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(rgb: u32) -> Self {
        Self::rgba((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 0xFF)
    }
}

/// Fill used by every card whose color has been marked as excluded.
pub const EXCLUDED_FILL: Rgba = Rgba::opaque(0x757575);

/// The four card colors. The set is closed; everything keyed by color goes
/// through [`Color::index`] so adding a variant fails to compile until every
/// table is extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Color {
    Red,
    Yellow,
    Blue,
    Green,
}

impl Color {
    pub const ALL: [Color; 4] = [Color::Red, Color::Yellow, Color::Blue, Color::Green];

    pub const fn index(self) -> usize {
        match self {
            Color::Red => 0,
            Color::Yellow => 1,
            Color::Blue => 2,
            Color::Green => 3,
        }
    }

    /// Letter used for this color in the persisted flags token.
    pub const fn flag_letter(self) -> char {
        match self {
            Color::Red => 'R',
            Color::Yellow => 'Y',
            Color::Blue => 'B',
            Color::Green => 'G',
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Color::Red => "Red",
            Color::Yellow => "Yellow",
            Color::Blue => "Blue",
            Color::Green => "Green",
        }
    }

    /// Card fill while the color is still considered possible.
    pub const fn swatch(self) -> Rgba {
        match self {
            Color::Red => Rgba::opaque(0xFF5252),
            Color::Yellow => Rgba::opaque(0xFFD740),
            Color::Blue => Rgba::opaque(0x448AFF),
            Color::Green => Rgba::opaque(0x00C853),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-color "excluded" flags of one opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorFlags([bool; 4]);

impl ColorFlags {
    pub const NONE: ColorFlags = ColorFlags([false; 4]);

    pub fn is_excluded(self, color: Color) -> bool {
        self.0[color.index()]
    }

    pub fn with(mut self, color: Color, excluded: bool) -> Self {
        self.0[color.index()] = excluded;
        self
    }

    pub fn toggled(self, color: Color) -> Self {
        self.with(color, !self.is_excluded(color))
    }

    pub fn any_excluded(self) -> bool {
        self.0.iter().any(|excluded| *excluded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// `(0, 0)` marks an opponent whose default placement is still pending.
    pub const UNPLACED: Position = Position::new(0, 0);

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_unplaced(self) -> bool {
        self == Self::UNPLACED
    }

    pub fn offset_by(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpponentId(String);

impl OpponentId {
    /// 128 random bits rendered as lowercase hex.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::random();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OpponentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for OpponentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for OpponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opponent {
    pub id: OpponentId,
    pub name: String,
    pub excluded: ColorFlags,
    pub offset: Position,
}

impl Opponent {
    pub fn new(id: OpponentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            excluded: ColorFlags::NONE,
            offset: Position::UNPLACED,
        }
    }
}

/// Everything the overlay persists, saved and loaded as one record.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelState {
    /// Expanded-strip anchor. Collapsing never rewrites it.
    pub control: Position,
    pub alpha: f32,
    pub opponent_alpha: f32,
    /// Blocks dragging of opponent surfaces. The control strip ignores it.
    pub locked: bool,
    pub control_collapsed: bool,
    pub max_opponents: usize,
    pub opponents: Vec<Opponent>,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            control: DEFAULT_CONTROL_POSITION,
            alpha: MAX_ALPHA,
            opponent_alpha: MAX_ALPHA,
            locked: true,
            control_collapsed: true,
            max_opponents: DEFAULT_MAX_OPPONENTS,
            opponents: Vec::new(),
        }
    }
}

pub fn clamp_alpha(alpha: f32) -> f32 {
    if alpha.is_nan() {
        return MAX_ALPHA;
    }
    alpha.clamp(MIN_ALPHA, MAX_ALPHA)
}

pub fn clamp_max_opponents(max: i64) -> usize {
    max.clamp(MIN_OPPONENTS as i64, MAX_OPPONENTS_LIMIT as i64) as usize
}

/// `1 + the largest N among names shaped like "<prefix> N"`, so numbers
/// freed by deletions are never handed out again. Suffixes too large for
/// `u64` are ignored and the result saturates.
pub fn next_opponent_index(opponents: &[Opponent], prefix: &str) -> u64 {
    opponents
        .iter()
        .filter_map(|o| NUMBERED_NAME.captures(&o.name))
        .filter(|caps| caps.get(1).is_some_and(|m| m.as_str() == prefix))
        .filter_map(|caps| caps.get(2).and_then(|m| m.as_str().parse::<u64>().ok()))
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

pub fn opponent_name(prefix: &str, index: u64) -> String {
    format!("{prefix} {index}")
}

impl PanelState {
    pub fn can_add_opponent(&self) -> bool {
        self.opponents.len() < self.max_opponents
    }

    pub fn opponent(&self, id: &OpponentId) -> Option<&Opponent> {
        self.opponents.iter().find(|o| &o.id == id)
    }

    pub fn contains_opponent(&self, id: &OpponentId) -> bool {
        self.opponent(id).is_some()
    }

    /// Appends a freshly named opponent. At capacity, or when `id` is already
    /// present, the state is returned unchanged.
    pub fn with_added_opponent(&self, id: OpponentId, prefix: &str) -> Self {
        let mut next = self.clone();
        if !next.can_add_opponent() || next.contains_opponent(&id) {
            return next;
        }
        let index = next_opponent_index(&next.opponents, prefix);
        next.opponents
            .push(Opponent::new(id, opponent_name(prefix, index)));
        next
    }

    /// Tops the list up to `target` (never past `max_opponents`), consuming
    /// `ids` in order. Never trims.
    pub fn with_filled_opponents(&self, target: usize, ids: &[OpponentId], prefix: &str) -> Self {
        let target = target.min(self.max_opponents);
        let mut next = self.clone();
        for id in ids {
            if next.opponents.len() >= target {
                break;
            }
            next = next.with_added_opponent(id.clone(), prefix);
        }
        next
    }

    pub fn without_opponent(&self, id: &OpponentId) -> Self {
        let mut next = self.clone();
        next.opponents.retain(|o| &o.id != id);
        next
    }

    fn map_opponent<F>(&self, id: &OpponentId, f: F) -> Self
    where
        F: FnOnce(&mut Opponent),
    {
        let mut next = self.clone();
        if let Some(opponent) = next.opponents.iter_mut().find(|o| &o.id == id) {
            f(opponent);
        }
        next
    }

    pub fn with_toggled_color(&self, id: &OpponentId, color: Color) -> Self {
        self.map_opponent(id, |o| o.excluded = o.excluded.toggled(color))
    }

    pub fn with_reset_colors(&self) -> Self {
        let mut next = self.clone();
        for opponent in &mut next.opponents {
            opponent.excluded = ColorFlags::NONE;
        }
        next
    }

    pub fn with_opponent_offset(&self, id: &OpponentId, offset: Position) -> Self {
        self.map_opponent(id, |o| o.offset = offset)
    }

    /// Records a computed default placement, but only while the opponent is
    /// still unplaced; a dragged offset always wins.
    pub fn with_placement_if_unplaced(&self, id: &OpponentId, offset: Position) -> Self {
        self.map_opponent(id, |o| {
            if o.offset.is_unplaced() {
                o.offset = offset;
            }
        })
    }

    pub fn with_toggled_lock(&self) -> Self {
        Self {
            locked: !self.locked,
            ..self.clone()
        }
    }

    pub fn with_control_position(&self, control: Position) -> Self {
        Self {
            control,
            ..self.clone()
        }
    }

    pub fn with_control_collapsed(&self, control_collapsed: bool) -> Self {
        Self {
            control_collapsed,
            ..self.clone()
        }
    }

    /// Lowering the bound below the current count leaves existing opponents
    /// alone; it only blocks further additions.
    pub fn with_max_opponents(&self, max: i64) -> Self {
        Self {
            max_opponents: clamp_max_opponents(max),
            ..self.clone()
        }
    }

    pub fn with_alpha(&self, alpha: f32) -> Self {
        Self {
            alpha: clamp_alpha(alpha),
            ..self.clone()
        }
    }

    pub fn with_opponent_alpha(&self, alpha: f32) -> Self {
        Self {
            opponent_alpha: clamp_alpha(alpha),
            ..self.clone()
        }
    }
}
