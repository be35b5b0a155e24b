use super::test_helpers::MockBackend;
use super::*;
use std::sync::atomic::AtomicUsize;

#[test]
fn auth_event_kind_parses_wire_names() {
    assert_eq!(AuthEventKind::parse("SIGNED_IN"), AuthEventKind::SignedIn);
    assert_eq!(AuthEventKind::parse("SIGNED_OUT"), AuthEventKind::SignedOut);
    assert_eq!(AuthEventKind::parse("TOKEN_REFRESHED"), AuthEventKind::TokenRefreshed);
    assert_eq!(AuthEventKind::parse("INITIAL_SESSION"), AuthEventKind::InitialSession);
    assert_eq!(AuthEventKind::parse("USER_UPDATED"), AuthEventKind::Other("USER_UPDATED".into()));
}

#[test]
fn public_query_is_capped_and_filtered() {
    let query = InspirationQuery::public(20);
    assert_eq!(query.visibility, Some(Visibility::Public));
    assert_eq!(query.limit, Some(20));
    assert!(query.owner.is_none());
}

#[test]
fn image_extension_falls_back_to_bin() {
    let image = |name: &str| ImageUpload { file_name: name.into(), content_type: "image/png".into(), bytes: vec![] };
    assert_eq!(image("cat.png").extension(), "png");
    assert_eq!(image("archive.tar.gz").extension(), "gz");
    assert_eq!(image("noext").extension(), "bin");
    assert_eq!(image(".hidden").extension(), "bin");
}

#[test]
fn reset_rebuilds_client_and_bumps_generation() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let factory: BackendFactory = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockBackend::new()) as Arc<dyn Backend>)
    });
    let handle = BackendHandle::new(factory, false).unwrap();
    let before = handle.current();
    assert_eq!(handle.generation(), 0);

    let holder = handle.clone();
    assert_eq!(handle.reset().unwrap(), 1);

    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert_eq!(holder.generation(), 1);
    assert!(!Arc::ptr_eq(&before, &holder.current()));
}

#[test]
fn failed_reset_keeps_previous_client() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let factory: BackendFactory = Arc::new(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(Arc::new(MockBackend::new()) as Arc<dyn Backend>)
        } else {
            Err(WallError::HttpClientBuild("no tls".into()))
        }
    });
    let handle = BackendHandle::new(factory, false).unwrap();
    let before = handle.current();
    assert!(handle.reset().is_err());
    assert!(Arc::ptr_eq(&before, &handle.current()));
    assert_eq!(handle.generation(), 0);
}

#[test]
fn demo_config_selects_demo_backend() {
    let config = WallConfig::from_lookup(|_| None).unwrap();
    let handle = BackendHandle::from_config(&config).unwrap();
    assert!(handle.is_demo());
}
