use crate::overlay::model::{OpponentId, Position};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SurfaceKey {
    ControlStrip,
    Opponent(OpponentId),
}

/// Absolute pointer coordinates as reported by the input device.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerPosition {
    pub x: f32,
    pub y: f32,
}

impl PointerPosition {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct DragSession {
    key: SurfaceKey,
    start_pointer: PointerPosition,
    start_position: Position,
    current: Position,
}

impl DragSession {
    fn position_for(&self, pointer: PointerPosition) -> Position {
        self.start_position.offset_by(
            (pointer.x - self.start_pointer.x) as i32,
            (pointer.y - self.start_pointer.y) as i32,
        )
    }
}

/// Tracks at most one drag gesture at a time.
#[derive(Debug, Clone, Default)]
pub struct DragTracker {
    session: Option<DragSession>,
}

impl DragTracker {
    pub fn begin(&mut self, key: SurfaceKey, pointer: PointerPosition, position: Position) {
        self.session = Some(DragSession {
            key,
            start_pointer: pointer,
            start_position: position,
            current: position,
        });
    }

    pub fn active_key(&self) -> Option<&SurfaceKey> {
        self.session.as_ref().map(|s| &s.key)
    }

    pub fn is_dragging(&self, key: &SurfaceKey) -> bool {
        self.active_key() == Some(key)
    }

    /// Position the dragged surface should jump to for `pointer`.
    pub fn move_to(&mut self, pointer: PointerPosition) -> Option<(SurfaceKey, Position)> {
        let session = self.session.as_mut()?;
        session.current = session.position_for(pointer);
        Some((session.key.clone(), session.current))
    }

    /// Ends the gesture. Without a final pointer sample (cancel) the last
    /// applied position is kept.
    pub fn finish(&mut self, pointer: Option<PointerPosition>) -> Option<(SurfaceKey, Position)> {
        let session = self.session.take()?;
        let position = pointer
            .map(|p| session.position_for(p))
            .unwrap_or(session.current);
        Some((session.key, position))
    }

    /// Drops the gesture without reporting it, e.g. when its surface went away.
    pub fn abandon_if(&mut self, key: &SurfaceKey) {
        if self.is_dragging(key) {
            self.session = None;
        }
    }

    pub fn clear(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_applies_pointer_delta_to_start_position() {
        let mut tracker = DragTracker::default();
        tracker.begin(
            SurfaceKey::ControlStrip,
            PointerPosition::new(500.0, 900.0),
            Position::new(100, 200),
        );

        let (_, pos) = tracker
            .move_to(PointerPosition::new(530.5, 880.0))
            .expect("active drag");
        assert_eq!(pos, Position::new(130, 180));

        let (key, pos) = tracker
            .finish(Some(PointerPosition::new(560.0, 1000.0)))
            .expect("active drag");
        assert_eq!(key, SurfaceKey::ControlStrip);
        assert_eq!(pos, Position::new(160, 300));
        assert!(tracker.active_key().is_none());
    }

    #[test]
    fn cancel_keeps_last_applied_position() {
        let mut tracker = DragTracker::default();
        let key = SurfaceKey::Opponent(OpponentId::from("a"));
        tracker.begin(key.clone(), PointerPosition::new(0.0, 0.0), Position::new(10, 10));
        tracker.move_to(PointerPosition::new(-5.0, 7.0));
        assert_eq!(tracker.finish(None), Some((key, Position::new(5, 17))));
    }

    #[test]
    fn moves_without_session_are_ignored() {
        let mut tracker = DragTracker::default();
        assert_eq!(tracker.move_to(PointerPosition::new(1.0, 1.0)), None);
        assert_eq!(tracker.finish(None), None);
    }

    #[test]
    fn abandon_only_matches_active_key() {
        let mut tracker = DragTracker::default();
        let key = SurfaceKey::Opponent(OpponentId::from("a"));
        tracker.begin(key.clone(), PointerPosition::default(), Position::new(1, 1));
        tracker.abandon_if(&SurfaceKey::ControlStrip);
        assert!(tracker.is_dragging(&key));
        tracker.abandon_if(&key);
        assert!(tracker.active_key().is_none());
    }
}
