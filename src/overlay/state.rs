/// Where a logical surface stands with its host. `Live` surfaces are updated
/// in place; nothing is ever recreated while live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceLifecycle {
    Absent,
    Live,
}

impl SurfaceLifecycle {
    pub fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }
}
