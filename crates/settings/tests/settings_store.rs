use sessionmgr_settings::{SettingKey, Settings, SettingsStore, SortOrder};
use std::fs;
use tempfile::tempdir;

#[test]
fn load_missing_file_returns_defaults() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");

    let store = SettingsStore::load(&path).expect("load defaults");
    let settings = store.settings();
    assert!(settings.get_bool(SettingKey::AutoSave));
    assert!(settings.get_bool(SettingKey::GlobalBookmarks));
    assert_eq!(settings.get_int(SettingKey::SaveDelay), 3);
    assert_eq!(settings.session_extension(), ".npp-session");
    assert!(store.favorites().is_empty());
    assert!(store.filters().is_empty());
    assert!(!path.exists(), "loading defaults must not create the file");
}

#[test]
fn save_and_reload_roundtrip() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("settings.json");

    let mut store = SettingsStore::new(path.clone(), Settings::default());
    store
        .update(|settings| {
            settings.put_bool(SettingKey::AutoLoad, true);
            settings.put_str(SettingKey::SortOrder, "date");
            settings.put_int(SettingKey::SaveDelay, 7);
        })
        .expect("save");
    store
        .update_favorites(|favorites| favorites.add("Work"))
        .expect("favorite");
    store.remember_filter("proj").expect("filter");
    store.set_roles(Some("Work"), Some("Home")).expect("roles");

    let reloaded = SettingsStore::load(&path).expect("reload");
    let settings = reloaded.settings();
    assert!(settings.get_bool(SettingKey::AutoLoad));
    assert_eq!(settings.sort_order(), SortOrder::Date);
    assert_eq!(settings.get_int(SettingKey::SaveDelay), 7);
    assert_eq!(settings.get_str(SettingKey::CurrentName), "Work");
    assert_eq!(settings.get_str(SettingKey::PreviousName), "Home");
    assert!(reloaded.favorites().contains("work"));
    assert_eq!(reloaded.filters().to_vec(), vec!["proj".to_string()]);
}

#[test]
fn mistyped_values_fall_back_to_defaults() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    fs::write(
        &path,
        r#"{
            "version": 1,
            "values": {
                "autoSave": "definitely",
                "saveDelay": -4,
                "sessionExtension": "",
                "defaultName": "Main"
            },
            "favorites": ["Main", "main"]
        }"#,
    )
    .expect("write settings");

    let store = SettingsStore::load(&path).expect("load");
    let settings = store.settings();
    assert!(
        settings.get_bool(SettingKey::AutoSave),
        "a string in a bool slot should fall back to the default"
    );
    assert_eq!(settings.get_int(SettingKey::SaveDelay), 0);
    assert_eq!(settings.session_extension(), ".npp-session");
    assert_eq!(settings.default_name(), "Main");
    assert_eq!(store.favorites().len(), 1);
}

#[test]
fn malformed_file_is_reported() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    fs::write(&path, "{ not json").expect("write");

    let err = SettingsStore::load(&path).unwrap_err();
    assert!(err.to_string().contains("failed to parse settings"));
}

#[test]
fn unknown_settings_from_newer_versions_are_skipped() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    fs::write(
        &path,
        r#"{"version":2,"values":{"autoSave":false,"newerOption":true,"saveDelay":[1,2]},"favorites":["Work"]}"#,
    )
    .expect("write");

    let store = SettingsStore::load(&path).expect("load newer file");
    let settings = store.settings();
    assert!(!settings.get_bool(SettingKey::AutoSave));
    assert_eq!(settings.get_int(SettingKey::SaveDelay), 3);
    assert!(store.favorites().contains("Work"));

    store.save().expect("save");
    let rewritten = fs::read_to_string(&path).expect("read back");
    assert!(!rewritten.contains("newerOption"));
}
