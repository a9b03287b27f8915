//! Integration tests for the ClawVault engine (`VaultStore`).

use std::fs;
use std::path::PathBuf;

use clawvault::crypto::MIN_ITERATIONS;
use clawvault::errors::VaultError;
use clawvault::vault::{UnlockOptions, VaultContainer, VaultStore};
use tempfile::TempDir;

/// Helper: a vault path inside a fresh temp dir.
fn vault_path() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("vault.json");
    (dir, path)
}

/// Low iteration count keeps the suite fast.
fn opts() -> UnlockOptions {
    UnlockOptions {
        iterations: MIN_ITERATIONS,
        ..UnlockOptions::default()
    }
}

fn tags(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn end_to_end_add_update_delete() {
    let (_dir, path) = vault_path();

    let mut store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();
    store.add("github", "ghp_first", &tags(&["dev", "ci"])).unwrap();
    store.add("openai", "sk-one", &[]).unwrap();
    drop(store);

    // Re-open with the same password.
    let mut store = VaultStore::open(&path, b"master-pw", &opts()).unwrap();
    assert_eq!(store.credential_count(), 2);
    assert_eq!(store.get("github").unwrap().as_str(), "ghp_first");

    let before = store.metadata("github").unwrap();
    store.update("github", Some("ghp_second"), None).unwrap();
    let after = store.metadata("github").unwrap();
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at >= before.updated_at);
    assert_eq!(after.tags, vec!["dev", "ci"], "tags untouched");
    assert_eq!(store.get("github").unwrap().as_str(), "ghp_second");

    store.delete("openai").unwrap();
    drop(store);

    let store = VaultStore::open(&path, b"master-pw", &opts()).unwrap();
    let services: Vec<String> = store.list(None).into_iter().map(|m| m.service).collect();
    assert_eq!(services, vec!["github"]);
    assert!(matches!(store.get("openai"), Err(VaultError::NotFound(_))));
}

#[test]
fn tagged_credential_lifecycle() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"P1-master", &opts()).unwrap();

    store.add("openai", "sk-123", &tags(&["ai"])).unwrap();
    assert_eq!(store.get("openai").unwrap().as_str(), "sk-123");

    let listed = store.list(None);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].service, "openai");
    assert_eq!(listed[0].tags, vec!["ai"]);

    store
        .update("openai", None, Some(&tags(&["ai", "prod"])))
        .unwrap();
    let prod = store.list(Some("prod"));
    assert_eq!(prod.len(), 1);
    assert_eq!(prod[0].service, "openai");
    assert_eq!(prod[0].tags, vec!["ai", "prod"]);
    assert_eq!(store.get("openai").unwrap().as_str(), "sk-123", "secret kept");

    store.delete("openai").unwrap();
    assert!(matches!(store.get("openai"), Err(VaultError::NotFound(_))));
    assert!(store.list(None).is_empty());
}

#[test]
fn reading_a_new_vault_never_creates_the_file() {
    let (_dir, path) = vault_path();

    let store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();
    assert!(store.is_new());
    assert!(store.list(None).is_empty());
    assert!(matches!(store.get("x"), Err(VaultError::NotFound(_))));
    drop(store);

    assert!(!path.exists());
}

#[test]
fn open_missing_vault_is_vault_not_found() {
    let (_dir, path) = vault_path();
    assert!(matches!(
        VaultStore::open(&path, b"pw", &opts()),
        Err(VaultError::VaultNotFound(_))
    ));
}

#[test]
fn create_refuses_existing_file() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create(&path, b"master-pw", &opts()).unwrap();
    store.add("a", "1", &[]).unwrap();
    drop(store);

    assert!(matches!(
        VaultStore::create(&path, b"master-pw", &opts()),
        Err(VaultError::InvalidInput(_))
    ));
}

// ---------------------------------------------------------------------------
// Uniqueness and validation
// ---------------------------------------------------------------------------

#[test]
fn duplicate_service_is_rejected_and_nothing_changes() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();
    store.add("github", "ghp_1", &[]).unwrap();
    let on_disk = fs::read(&path).unwrap();

    let err = store.add("github", "ghp_2", &[]).unwrap_err();
    assert!(matches!(err, VaultError::DuplicateService(ref s) if s == "github"));

    assert_eq!(store.get("github").unwrap().as_str(), "ghp_1");
    assert_eq!(fs::read(&path).unwrap(), on_disk, "file untouched");
}

#[test]
fn service_can_be_added_again_after_delete() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();
    store.add("svc", "first", &tags(&["old"])).unwrap();
    assert!(matches!(
        store.add("svc", "again", &[]),
        Err(VaultError::DuplicateService(_))
    ));

    store.delete("svc").unwrap();
    store.add("svc", "second", &tags(&["new"])).unwrap();
    drop(store);

    let store = VaultStore::open(&path, b"master-pw", &opts()).unwrap();
    assert_eq!(store.credential_count(), 1);
    assert_eq!(store.get("svc").unwrap().as_str(), "second");
    assert_eq!(store.metadata("svc").unwrap().tags, vec!["new"]);
}

#[test]
fn invalid_service_names_are_rejected() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();

    let long = "x".repeat(257);
    for bad in ["", "   ", "tab\there", long.as_str()] {
        assert!(
            matches!(store.add(bad, "v", &[]), Err(VaultError::InvalidInput(_))),
            "accepted {bad:?}"
        );
    }
    assert!(!path.exists());
}

#[test]
fn update_and_delete_of_missing_service_fail() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();

    assert!(matches!(
        store.update("ghost", Some("v"), None),
        Err(VaultError::NotFound(_))
    ));
    assert!(matches!(store.delete("ghost"), Err(VaultError::NotFound(_))));
}

// ---------------------------------------------------------------------------
// Tags, listing, search
// ---------------------------------------------------------------------------

#[test]
fn tags_are_normalized_and_replaceable() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();

    store
        .add("stripe", "sk_live", &tags(&[" prod ", "", "billing", "prod"]))
        .unwrap();
    assert_eq!(store.metadata("stripe").unwrap().tags, vec!["prod", "billing"]);

    store.update("stripe", None, Some(&tags(&["test"]))).unwrap();
    assert_eq!(store.metadata("stripe").unwrap().tags, vec!["test"]);
    assert_eq!(store.get("stripe").unwrap().as_str(), "sk_live");
}

#[test]
fn list_filters_by_tag_in_service_order() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();
    store.add("zeta", "1", &tags(&["ai"])).unwrap();
    store.add("alpha", "2", &tags(&["ai", "dev"])).unwrap();
    store.add("mid", "3", &tags(&["dev"])).unwrap();

    let all: Vec<String> = store.list(None).into_iter().map(|m| m.service).collect();
    assert_eq!(all, vec!["alpha", "mid", "zeta"]);

    let ai: Vec<String> = store.list(Some("ai")).into_iter().map(|m| m.service).collect();
    assert_eq!(ai, vec!["alpha", "zeta"]);

    assert!(store.list(Some("none")).is_empty());
}

#[test]
fn search_matches_service_and_tags_case_insensitively() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();
    store.add("GitHub-Work", "1", &[]).unwrap();
    store.add("gitlab", "2", &[]).unwrap();
    store.add("openai", "3", &tags(&["GITops"])).unwrap();

    let hits: Vec<String> = store
        .search("git")
        .unwrap()
        .into_iter()
        .map(|m| m.service)
        .collect();
    assert_eq!(hits, vec!["GitHub-Work", "gitlab", "openai"]);

    assert!(store.search("nomatch").unwrap().is_empty());
    assert!(matches!(store.search("  "), Err(VaultError::InvalidInput(_))));
}

#[test]
fn metadata_is_preserved_across_reopen() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();
    let mut meta = std::collections::BTreeMap::new();
    meta.insert("url".to_string(), "https://api.example.com".to_string());
    store.add_with_metadata("api", "k", &[], meta.clone()).unwrap();
    drop(store);

    let store = VaultStore::open(&path, b"master-pw", &opts()).unwrap();
    assert_eq!(store.metadata("api").unwrap().metadata, meta);
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

#[test]
fn wrong_password_is_authentication_failed() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"right-pw", &opts()).unwrap();
    store.add("github", "ghp", &[]).unwrap();
    drop(store);

    assert!(matches!(
        VaultStore::open(&path, b"wrong-pw", &opts()),
        Err(VaultError::AuthenticationFailed)
    ));
}

#[test]
fn wrong_password_on_emptied_vault_is_still_rejected() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"right-pw", &opts()).unwrap();
    store.add("github", "ghp", &[]).unwrap();
    store.delete("github").unwrap();
    drop(store);

    // The canary still guards an empty vault.
    assert!(matches!(
        VaultStore::create_or_unlock(&path, b"wrong-pw", &opts()),
        Err(VaultError::AuthenticationFailed)
    ));
}

#[test]
fn change_password_reencrypts_everything() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"old-password", &opts()).unwrap();
    store.add("github", "ghp_1", &tags(&["dev"])).unwrap();
    store.add("openai", "sk-2", &[]).unwrap();
    let old_salt = store.container().salt.clone();
    let created = store.metadata("github").unwrap().created_at;

    store.change_password(b"old-password", b"new-password").unwrap();
    assert_ne!(store.container().salt, old_salt, "salt rotated");
    drop(store);

    assert!(matches!(
        VaultStore::open(&path, b"old-password", &opts()),
        Err(VaultError::AuthenticationFailed)
    ));

    let store = VaultStore::open(&path, b"new-password", &opts()).unwrap();
    assert_eq!(store.get("github").unwrap().as_str(), "ghp_1");
    assert_eq!(store.get("openai").unwrap().as_str(), "sk-2");
    let meta = store.metadata("github").unwrap();
    assert_eq!(meta.tags, vec!["dev"]);
    assert_eq!(meta.created_at, created);
}

#[test]
fn change_password_with_wrong_old_password_changes_nothing() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"old-password", &opts()).unwrap();
    store.add("github", "ghp_1", &[]).unwrap();
    let on_disk = fs::read(&path).unwrap();

    assert!(matches!(
        store.change_password(b"not-it", b"new-password"),
        Err(VaultError::AuthenticationFailed)
    ));
    assert_eq!(fs::read(&path).unwrap(), on_disk);
    assert_eq!(store.get("github").unwrap().as_str(), "ghp_1");
}

#[test]
fn empty_password_is_invalid_input() {
    let (_dir, path) = vault_path();
    assert!(matches!(
        VaultStore::create_or_unlock(&path, b"", &opts()),
        Err(VaultError::InvalidInput(_))
    ));
}

// ---------------------------------------------------------------------------
// On-disk properties
// ---------------------------------------------------------------------------

#[test]
fn secrets_never_appear_in_the_vault_file() {
    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();
    store.add("github", "ghp_PLAINTEXT_MARKER", &[]).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(!text.contains("ghp_PLAINTEXT_MARKER"));
    assert!(text.contains("\"github\""), "service names are not secret");

    let parsed = VaultContainer::parse(text.as_bytes()).unwrap();
    assert_eq!(parsed.iterations, MIN_ITERATIONS);
    assert!(parsed.check.is_some());
}

#[test]
fn no_staging_files_are_left_behind() {
    let (dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();
    for i in 0..3 {
        store.add(&format!("svc-{i}"), "v", &[]).unwrap();
    }

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "found {leftovers:?}");
}

#[cfg(unix)]
#[test]
fn vault_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();
    store.add("github", "ghp", &[]).unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[cfg(unix)]
#[test]
fn second_handle_waits_for_the_lock() {
    use std::time::Duration;

    let (_dir, path) = vault_path();
    let mut store = VaultStore::create_or_unlock(&path, b"master-pw", &opts()).unwrap();
    store.add("github", "ghp", &[]).unwrap();

    let impatient = UnlockOptions {
        lock_timeout: Duration::from_millis(100),
        ..opts()
    };
    assert!(matches!(
        VaultStore::open(&path, b"master-pw", &impatient),
        Err(VaultError::VaultLocked(_))
    ));

    drop(store);
    assert!(VaultStore::open(&path, b"master-pw", &impatient).is_ok());
}
