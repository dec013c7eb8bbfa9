use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use uno_overlay::overlay::{
    FileStateStore, PanelCommand, StateRepository, StateStore, SurfaceKey,
    SurfaceLifecycleManager, TracingSurfaceHost,
};
use uno_overlay::settings::Settings;

const HYDRATION_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    let settings = Settings::load("settings.json")?;
    uno_overlay::logging::init(
        settings.debug_logging,
        settings.log_file_path().as_deref(),
    );

    let store: Arc<dyn StateStore> = match settings.state_file_path() {
        Some(path) => Arc::new(FileStateStore::new(path)),
        None => Arc::new(FileStateStore::next_to_executable()?),
    };
    let repository = StateRepository::start(store).context("start overlay state writer")?;
    let host = TracingSurfaceHost::new(settings.screen);
    let mut manager = SurfaceLifecycleManager::new(host, repository, &settings);

    if let Some(notice) = manager.dispatch(PanelCommand::Show)? {
        tracing::warn!("{}", notice.message());
        return Ok(());
    }

    if !manager.repository().wait_for_hydration(HYDRATION_TIMEOUT) {
        tracing::warn!("overlay state still loading, showing defaults");
    }
    manager.dispatch(PanelCommand::Refresh)?;

    let state = manager.state();
    for opponent in &state.opponents {
        let position = manager
            .surface_handle(&SurfaceKey::Opponent(opponent.id.clone()))
            .and_then(|h| manager.host().surface(h))
            .map(|s| s.position);
        tracing::info!(
            id = %opponent.id,
            name = %opponent.name,
            ?position,
            "opponent on screen"
        );
    }
    tracing::info!(
        opponents = state.opponents.len(),
        max = state.max_opponents,
        locked = state.locked,
        collapsed = state.control_collapsed,
        "overlay ready"
    );

    manager.repository().flush()?;
    manager.hide();
    Ok(())
}
