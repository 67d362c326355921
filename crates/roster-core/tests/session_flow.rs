use chrono::{NaiveDate, Utc};
use roster_core::session::{Session, SessionStore, SessionUser};
use tempfile::tempdir;

fn user(joined: Option<NaiveDate>) -> SessionUser {
    SessionUser {
        employee_id: "E-17".to_string(),
        name: Some("Dana".to_string()),
        joining_date: joined,
    }
}

#[test]
fn session_persist_rehydrate_clear() {
    let temp = tempdir().expect("tempdir");
    let store = SessionStore::new(temp.path().join("nested").join("session.json"));

    let ctx = store.rehydrate().expect("rehydrate without file");
    assert!(!ctx.is_signed_in());
    assert_eq!(ctx.joining_date(), None);

    let joined = NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date");
    let session = Session::new("tok-123".to_string(), user(Some(joined)), Utc::now())
        .expect("new session");
    store.persist(&session).expect("persist session");
    assert!(store.path().exists());

    let ctx = store.rehydrate().expect("rehydrate");
    assert!(ctx.is_signed_in());
    assert_eq!(ctx.session(), Some(&session));
    assert_eq!(ctx.token(), Some("tok-123"));
    assert_eq!(ctx.joining_date(), Some(joined));

    assert!(store.clear().expect("clear"));
    assert!(!store.clear().expect("clear again"));
    assert!(!store.rehydrate().expect("rehydrate after clear").is_signed_in());
}

#[test]
fn persist_replaces_previous_session() {
    let temp = tempdir().expect("tempdir");
    let store = SessionStore::new(temp.path().join("session.json"));

    let first = Session::new("first".to_string(), user(None), Utc::now()).expect("first");
    let second = Session::new("second".to_string(), user(None), Utc::now()).expect("second");
    assert_ne!(first.session_id, second.session_id);

    store.persist(&first).expect("persist first");
    store.persist(&second).expect("persist second");

    let ctx = store.rehydrate().expect("rehydrate");
    assert_eq!(ctx.token(), Some("second"));
}

#[test]
fn corrupt_session_file_is_an_error() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("session.json");
    std::fs::write(&path, "{ not json").expect("write corrupt file");

    let err = SessionStore::new(&path).rehydrate().expect_err("corrupt file");
    assert!(format!("{err:#}").contains("failed parsing"));
}

#[test]
fn empty_session_file_means_signed_out() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("session.json");
    std::fs::write(&path, "\n").expect("write empty file");

    assert!(!SessionStore::new(&path).rehydrate().expect("rehydrate").is_signed_in());
}

#[test]
fn session_requires_token_and_employee() {
    assert!(Session::new("  ".to_string(), user(None), Utc::now()).is_err());

    let nobody = SessionUser {
        employee_id: String::new(),
        name: None,
        joining_date: None,
    };
    assert!(Session::new("tok".to_string(), nobody, Utc::now()).is_err());
}
