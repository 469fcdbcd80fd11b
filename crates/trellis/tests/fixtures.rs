use std::path::{Path, PathBuf};

use trellis::{Engine, Model};

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn list_fixture_mmd_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if path.extension().is_some_and(|e| e == "mmd") {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

/// Fixtures live under `fixtures/<diagram type>/`.
fn expected_type(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[test]
fn fixtures_detect_parse_and_validate() {
    let fixtures = list_fixture_mmd_files(&fixtures_root());
    assert!(
        !fixtures.is_empty(),
        "no fixtures found under {}",
        fixtures_root().display()
    );

    let engine = Engine::new();
    for path in fixtures {
        let text = std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        let parsed = engine
            .parse(&text)
            .unwrap_or_else(|e| panic!("parse failed for {}: {e}", path.display()));

        assert_eq!(
            parsed.meta.diagram_type,
            expected_type(&path),
            "detected type for {}",
            path.display()
        );
        assert_eq!(parsed.model.notation(), parsed.meta.diagram_type);
        assert!(
            !parsed.model.entity_ids().is_empty(),
            "no entities in {}",
            path.display()
        );
        assert_eq!(
            parsed.model.violations(),
            vec![],
            "violations in {}",
            path.display()
        );
    }
}

#[test]
fn fixtures_parse_deterministically() {
    let engine = Engine::new();
    for path in list_fixture_mmd_files(&fixtures_root()) {
        let text = std::fs::read_to_string(&path).unwrap();
        let first = engine.parse(&text).unwrap();
        let second = engine.parse(&text).unwrap();
        assert_eq!(first.model, second.model, "{}", path.display());
        assert_eq!(
            serde_json::to_string(&first.model).unwrap(),
            serde_json::to_string(&second.model).unwrap(),
            "{}",
            path.display()
        );
    }
}

#[test]
fn every_diagram_type_has_a_fixture() {
    let covered: Vec<String> = list_fixture_mmd_files(&fixtures_root())
        .iter()
        .map(|p| expected_type(p))
        .collect();
    let engine = Engine::new();
    for id in engine.diagram_registry().ids() {
        assert!(covered.iter().any(|c| c == id), "no fixture for {id}");
    }
}
