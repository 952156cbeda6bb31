//! Integration tests for the pattern catalog over an on-disk database.

use breathroom_core::pattern::list_builtins;
use breathroom_core::{
    CatalogError, CoreError, Database, PatternCatalog, PatternDraft, PatternSource,
};

fn catalog_at(path: &std::path::Path) -> PatternCatalog<Database> {
    PatternCatalog::new(Database::open_at(path).unwrap())
}

#[test]
fn test_custom_patterns_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("breathroom.db");

    let id = {
        let catalog = catalog_at(&path);
        let draft = PatternDraft::new("Evening", 5, 2, 7, 0).with_color("#123ABC");
        let saved = catalog.save(&draft, "alice").unwrap();
        catalog.toggle_favorite(saved.id(), "alice").unwrap();
        saved.id().to_string()
    };

    let catalog = catalog_at(&path);
    let pattern = catalog.get(&id, "alice").unwrap();
    assert_eq!(pattern.name(), "Evening");
    assert_eq!(pattern.source(), PatternSource::Custom);
    assert_eq!(pattern.color(), "#123ABC");
    assert_eq!(pattern.rhythm(), "5-2-7-0");

    let favorites = catalog.favorites("alice").unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].id(), id);

    // Another owner sees only the built-ins.
    assert_eq!(catalog.list("bob").unwrap().len(), list_builtins().len());
}

#[test]
fn test_limit_is_per_owner() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_at(&dir.path().join("breathroom.db")).with_max_custom_patterns(2);

    for name in ["One", "Two"] {
        catalog
            .save(&PatternDraft::new(name, 4, 0, 4, 0), "alice")
            .unwrap();
    }
    let err = catalog
        .save(&PatternDraft::new("Three", 4, 0, 4, 0), "alice")
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Catalog(CatalogError::LimitReached { limit: 2, .. })
    ));

    catalog
        .save(&PatternDraft::new("Three", 4, 0, 4, 0), "bob")
        .unwrap();
}

#[test]
fn test_invalid_draft_reports_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_at(&dir.path().join("breathroom.db"));
    let mut draft = PatternDraft::new("", 0, 11, 4, 0);
    draft.color = Some("red".to_string());

    let err = catalog.save(&draft, "alice").unwrap_err();
    let CoreError::Validation(v) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(v.fields(), vec!["name", "inhale", "hold", "color"]);
    assert!(catalog.list("alice").unwrap().iter().all(|p| p.is_builtin()));
}
