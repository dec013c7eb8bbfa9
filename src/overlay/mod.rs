pub mod codec;
pub mod drag;
pub mod host;
pub mod manager;
pub mod messages;
pub mod model;
pub mod placement;
pub mod repository;
pub mod state;
pub mod store;

pub use drag::{PointerPosition, SurfaceKey};
pub use host::{SurfaceHandle, SurfaceHost, TracingSurfaceHost};
pub use manager::SurfaceLifecycleManager;
pub use messages::{AddOutcome, Notice, PanelCommand, ShowOutcome};
pub use model::{Color, Opponent, OpponentId, PanelState, Position};
pub use repository::StateRepository;
pub use store::{FileStateStore, MemoryStateStore, StateStore};
