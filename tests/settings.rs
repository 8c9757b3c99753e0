use pretty_assertions::assert_eq;
use xdat_editor::EditorSettings;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[test]
fn missing_settings_file_gives_defaults() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let settings = EditorSettings::load_path(&dir.path().join("absent.json5"))?;
    assert_eq!(settings, EditorSettings::default());
    Ok(())
}

#[test]
fn settings_roundtrip_and_prune_vanished_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let kept = dir.path().join("kept.xdat");
    let gone = dir.path().join("gone.xdat");
    std::fs::write(&kept, b"")?;
    std::fs::write(&gone, b"")?;

    let mut settings = EditorSettings {
        max_history: 42,
        ..EditorSettings::default()
    };
    settings.add_recent_file(&gone);
    settings.add_recent_file(&kept);
    let path = dir.path().join("nested").join("settings.json5");
    settings.save_path(&path)?;

    std::fs::remove_file(&gone)?;
    let loaded = EditorSettings::load_path(&path)?;
    assert_eq!(loaded.max_history, 42);
    let recent: Vec<_> = loaded.recent_files().iter().map(|f| f.path.clone()).collect();
    assert_eq!(recent, vec![std::fs::canonicalize(&kept)?]);
    Ok(())
}

#[test]
fn hand_written_json5_is_accepted() -> Result<()> {
    let text = r#"{
        // trimmed history for a small machine
        maxHistory: 20,
        recentFiles: [
            { path: "/tmp/a.xdat", openedAt: 1700000000 },
        ],
    }"#;
    let settings = EditorSettings::parse_json5(text)?;
    assert_eq!(settings.max_history, 20);
    assert_eq!(settings.max_recent_files, 10);
    assert_eq!(settings.recent_files()[0].opened_at, 1_700_000_000);
    Ok(())
}
