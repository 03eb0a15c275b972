use marquee_proto::config::{ServerEntry, Settings, SettingsStore};

#[tokio::test]
async fn first_open_writes_defaults_with_client_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("settings.toml");

    let store = SettingsStore::open(path.clone()).unwrap();
    assert!(path.exists());

    let settings = store.get().await;
    assert_eq!(settings.playback.seek_increment_secs, 10);
    assert_eq!(settings.auth.client_id.len(), 16);

    // Reopening keeps the generated id instead of minting a new one.
    let reopened = SettingsStore::open(path).unwrap();
    assert_eq!(reopened.get().await.auth.client_id, settings.auth.client_id);
}

#[tokio::test]
async fn every_update_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    let store = SettingsStore::open(path.clone()).unwrap();

    store
        .update(|s| {
            s.playback.autoplay_next = false;
            s.servers.push(ServerEntry {
                machine_id: "abc".into(),
                name: "Den".into(),
                base_url: "http://192.168.1.5:32400".into(),
                access_token: String::new(),
            });
        })
        .await
        .unwrap();
    store.set_current_server("abc").await.unwrap();
    store
        .set_auth("tok".into(), "sam".into(), None)
        .await
        .unwrap();

    let on_disk = Settings::load_from(&path).unwrap();
    assert!(!on_disk.playback.autoplay_next);
    assert_eq!(on_disk.current_server.as_deref(), Some("abc"));
    assert_eq!(on_disk.server().map(|s| s.name.as_str()), Some("Den"));
    assert_eq!(on_disk.auth.token, "tok");
    assert_eq!(on_disk, store.get().await);

    store.clear_auth().await.unwrap();
    let on_disk = Settings::load_from(&path).unwrap();
    assert!(on_disk.auth.token.is_empty());
    assert!(!on_disk.auth.client_id.is_empty());
}

#[test]
fn unreadable_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, "playback = 3").unwrap();
    assert!(Settings::load_from(&path).is_err());
}
