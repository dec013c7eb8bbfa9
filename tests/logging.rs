use std::{fs, thread::sleep, time::Duration};

use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn writes_log_file_and_ignores_later_init() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("overlay.log");

    uno_overlay::logging::init(true, Some(&path));
    tracing::info!("overlay log probe");

    sleep(Duration::from_millis(200));

    assert!(path.exists(), "log file was not created");
    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("overlay log probe"));

    let second = dir.path().join("second.log");
    uno_overlay::logging::init(false, Some(&second));
    tracing::info!("still first subscriber");
    sleep(Duration::from_millis(100));
    assert!(!second.exists(), "second init should not install a writer");
}
