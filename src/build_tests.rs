//! End-to-end build tests
//!
//! Each test lays out a small project in a temp dir and drives it through the
//! build manager: full builds, incremental rebuilds, cascades and failures.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, SystemTime};

    use crate::cache::BuildCache;
    use crate::config::BuildConfig;
    use crate::diagnostic::{ERR_SYNTAX, ERR_UNKNOWN_COMPONENT};
    use crate::frontend::JmlFrontend;
    use crate::graph::GraphError;
    use crate::manager::{BuildError, BuildManager};

    struct Project {
        dir: tempfile::TempDir,
    }

    impl Project {
        fn new(files: &[(&str, &str)]) -> Self {
            let project = Project {
                dir: tempfile::tempdir().unwrap(),
            };
            for (name, source) in files {
                project.write(name, source);
            }
            project
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn src(&self, name: &str) -> PathBuf {
            self.root().join("src").join(name)
        }

        fn write(&self, name: &str, source: &str) {
            let path = self.src(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, source).unwrap();
        }

        /// Rewrites a file and pushes its mtime past anything cached.
        fn edit(&self, name: &str, source: &str) {
            self.write(name, source);
            let file = fs::File::options().write(true).open(self.src(name)).unwrap();
            file.set_modified(SystemTime::now() + Duration::from_secs(10)).unwrap();
        }

        fn manager(&self) -> BuildManager {
            BuildManager::new(BuildConfig::new(self.root()), Box::new(JmlFrontend))
        }

        fn parallel_manager(&self) -> BuildManager {
            let mut config = BuildConfig::new(self.root());
            config.parallel = true;
            BuildManager::new(config, Box::new(JmlFrontend))
        }

        fn cache_on_disk(&self) -> BuildCache {
            BuildCache::load(self.root().join(".jml/cache.json"))
        }
    }

    fn chain() -> Project {
        Project::new(&[
            ("A.jml", r#"import B from "./B.jml"; component A { View { B {} } }"#),
            ("B.jml", r#"import C from "./C.jml"; component B { View { C {} } }"#),
            ("C.jml", "component C { View {} }"),
            ("D.jml", "component D { View {} }"),
        ])
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // FULL BUILDS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_button_and_home_project() {
        let project = Project::new(&[
            (
                "components/Button.jml",
                r#"component Button {
                    prop label: string;
                    View { Text { text: label } }
                }"#,
            ),
            (
                "pages/Home.jml",
                r#"import Button from "../components/Button.jml";
                page Home {
                    state count: number = 0;
                    View { Button { label: "Go" } }
                }"#,
            ),
        ]);

        let mut manager = project.manager();
        let report = manager.compile_project().unwrap();
        assert_eq!(
            report.compiled,
            vec![project.src("components/Button.jml"), project.src("pages/Home.jml")]
        );
        assert!(report.skipped.is_empty());

        let home = fs::read_to_string(project.root().join("dist/pages/Home.html")).unwrap();
        assert!(home.contains("<title>Home</title>"));
        assert!(home.contains("<div data-component=\"Button\" data-prop-label=\"Go\">"));

        let button = fs::read_to_string(project.root().join("dist/components/Button.html")).unwrap();
        assert!(button.contains("<span class=\"jml-text\">"));
        assert!(button.contains("{label}"));

        let cache = project.cache_on_disk();
        assert_eq!(cache.len(), 2);
        let record = cache.get(&project.src("pages/Home.jml")).unwrap();
        assert_eq!(record.dependencies, vec![project.src("components/Button.jml")]);
        assert!(record.output_path.ends_with("Home.html"));
        assert_eq!(
            record.hash,
            BuildCache::hash_file(&project.src("pages/Home.jml")).unwrap()
        );

        // Editing the dependency rebuilds it and its importer.
        project.edit(
            "components/Button.jml",
            r#"component Button {
                prop label: string;
                View { class: "primary" Text { text: label } }
            }"#,
        );
        let report = manager.compile_changed().unwrap();
        assert_eq!(
            report.compiled,
            vec![project.src("components/Button.jml"), project.src("pages/Home.jml")]
        );
        let button = fs::read_to_string(project.root().join("dist/components/Button.html")).unwrap();
        assert!(button.contains("primary"));

        // Editing the importer leaves the dependency alone.
        project.edit(
            "pages/Home.jml",
            r#"import Button from "../components/Button.jml";
            page Home {
                state count: number = 1;
                View { Button { label: "Stop" } }
            }"#,
        );
        let report = manager.compile_changed().unwrap();
        assert_eq!(report.compiled, vec![project.src("pages/Home.jml")]);
        assert_eq!(report.skipped, vec![project.src("components/Button.jml")]);
        let home = fs::read_to_string(project.root().join("dist/pages/Home.html")).unwrap();
        assert!(home.contains("data-prop-label=\"Stop\""));
    }

    #[test]
    fn test_external_imports_are_not_dependencies() {
        let project = Project::new(&[(
            "pages/Home.jml",
            r#"import { format } from "date-utils";
            page Home { View { Text { text: format(1) } } }"#,
        )]);

        let mut manager = project.manager();
        let report = manager.compile_project().unwrap();
        assert_eq!(report.compiled, vec![project.src("pages/Home.jml")]);
        assert!(manager.graph().get(&project.src("pages/Home.jml")).unwrap().dependencies.is_empty());

        let cache = project.cache_on_disk();
        assert!(cache.get(&project.src("pages/Home.jml")).unwrap().dependencies.is_empty());
        assert!(!project.src("pages/date-utils.jml").exists());
    }

    #[test]
    fn test_second_incremental_build_is_a_no_op() {
        let project = chain();
        let mut manager = project.manager();
        manager.compile_project().unwrap();
        let before = fs::read_to_string(project.root().join(".jml/cache.json")).unwrap();

        let report = manager.compile_changed().unwrap();
        assert!(report.compiled.is_empty());
        assert_eq!(report.skipped.len(), 4);

        let after = fs::read_to_string(project.root().join(".jml/cache.json")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_fresh_manager_resumes_from_cache() {
        let project = chain();
        project.manager().compile_project().unwrap();

        let report = project.manager().compile_changed().unwrap();
        assert!(report.compiled.is_empty());
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // INCREMENTAL BUILDS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_change_cascades_to_dependents_only() {
        let project = chain();
        let mut manager = project.manager();
        manager.compile_project().unwrap();

        project.edit("C.jml", "component C { View { Text { text: \"changed\" } } }");
        let report = manager.compile_changed().unwrap();
        assert_eq!(
            report.compiled,
            vec![project.src("C.jml"), project.src("B.jml"), project.src("A.jml")]
        );
        assert_eq!(report.skipped, vec![project.src("D.jml")]);
    }

    #[test]
    fn test_touch_without_content_change_is_skipped() {
        let project = chain();
        let mut manager = project.manager();
        manager.compile_project().unwrap();

        project.edit("D.jml", "component D { View {} }");
        let report = manager.compile_changed().unwrap();
        assert!(report.compiled.is_empty());
    }

    #[test]
    fn test_new_and_removed_files() {
        let project = chain();
        let mut manager = project.manager();
        manager.compile_project().unwrap();

        fs::remove_file(project.src("D.jml")).unwrap();
        project.write("E.jml", "component E { View {} }");

        let report = manager.compile_changed().unwrap();
        assert_eq!(report.compiled, vec![project.src("E.jml")]);

        let cache = project.cache_on_disk();
        assert!(cache.get(&project.src("D.jml")).is_none());
        assert!(cache.get(&project.src("E.jml")).is_some());
    }

    #[test]
    fn test_parallel_build_respects_levels() {
        let project = chain();
        let mut manager = project.parallel_manager();
        let report = manager.compile_project().unwrap();

        assert_eq!(report.compiled.len(), 4);
        let position = |name: &str| {
            report
                .compiled
                .iter()
                .position(|p| *p == project.src(name))
                .unwrap()
        };
        assert!(position("C.jml") < position("B.jml"));
        assert!(position("B.jml") < position("A.jml"));
        assert_eq!(project.cache_on_disk().len(), 4);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // FAILURES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_failed_file_is_not_recorded_but_earlier_ones_are() {
        let project = Project::new(&[
            ("Alpha.jml", "component Alpha { View {} }"),
            ("Zeta.jml", "page Zeta { View { Missing {} } }"),
        ]);

        let mut manager = project.manager();
        let err = manager.compile_project().unwrap_err();
        match err {
            BuildError::Compilation { file, diagnostics } => {
                assert_eq!(file, project.src("Zeta.jml"));
                assert_eq!(diagnostics.with_code(ERR_UNKNOWN_COMPONENT).count(), 1);
            }
            other => panic!("unexpected error: {}", other),
        }

        let cache = project.cache_on_disk();
        assert!(cache.get(&project.src("Alpha.jml")).is_some());
        assert!(cache.get(&project.src("Zeta.jml")).is_none());
        assert!(!project.root().join("dist/Zeta.html").exists());

        // Fixing the file rebuilds only it.
        project.edit("Zeta.jml", "page Zeta { View {} }");
        let report = manager.compile_changed().unwrap();
        assert_eq!(report.compiled, vec![project.src("Zeta.jml")]);
    }

    #[test]
    fn test_dependent_broken_by_a_change_is_retried() {
        let project = Project::new(&[
            ("A.jml", r#"import B from "./B.jml"; component A { View { B {} } }"#),
            (
                "B.jml",
                r#"import { x } from "./C.jml"; component B { View { Text { text: x } } }"#,
            ),
            ("C.jml", "component C { export const x = 1; View {} }"),
        ]);
        let mut manager = project.manager();
        manager.compile_project().unwrap();

        project.edit("C.jml", "component C { export const y = 1; View {} }");
        for _ in 0..2 {
            let err = manager.compile_changed().unwrap_err();
            let BuildError::Compilation { file, diagnostics } = err else {
                panic!("expected compilation error");
            };
            assert_eq!(file, project.src("B.jml"));
            assert!(diagnostics.iter().any(|d| d.message.contains("'x' is not exported")));

            let cache = project.cache_on_disk();
            assert!(cache.get(&project.src("C.jml")).is_some());
            assert!(cache.get(&project.src("B.jml")).is_none());
            assert!(cache.get(&project.src("A.jml")).is_none());
        }

        project.edit(
            "B.jml",
            r#"import { y } from "./C.jml"; component B { View { Text { text: y } } }"#,
        );
        let report = manager.compile_changed().unwrap();
        assert_eq!(report.compiled, vec![project.src("B.jml"), project.src("A.jml")]);
        assert_eq!(report.skipped, vec![project.src("C.jml")]);
    }

    #[test]
    fn test_parallel_failure_invalidates_unrecorded_files() {
        let project = Project::new(&[
            ("A.jml", r#"import B from "./B.jml"; component A { View { B {} } }"#),
            (
                "B.jml",
                r#"import { x } from "./C.jml"; component B { View { Text { text: x } } }"#,
            ),
            ("C.jml", "component C { export const x = 1; View {} }"),
        ]);
        let mut manager = project.parallel_manager();
        manager.compile_project().unwrap();

        project.edit("C.jml", "component C { export const y = 1; View {} }");
        assert!(manager.compile_changed().is_err());

        let cache = project.cache_on_disk();
        assert!(cache.get(&project.src("C.jml")).is_some());
        assert!(cache.get(&project.src("B.jml")).is_none());
        assert!(cache.get(&project.src("A.jml")).is_none());
        assert!(manager.compile_changed().is_err());
    }

    #[test]
    fn test_syntax_errors_fail_with_parse_diagnostics() {
        let project = Project::new(&[(
            "Broken.jml",
            r#"page Broken {
                const ok = 1;
                function broken( { }
                View {}
            }"#,
        )]);

        let manager = project.manager();
        let err = manager.compile_file(&project.src("Broken.jml")).unwrap_err();
        let BuildError::Compilation { diagnostics, .. } = err else {
            panic!("expected compilation error");
        };
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.with_code(ERR_SYNTAX).count(), 1);
    }

    #[test]
    fn test_cycles_are_rejected_before_compiling() {
        let project = Project::new(&[
            ("A.jml", r#"import B from "./B.jml"; component A { View { B {} } }"#),
            ("B.jml", r#"import A from "./A.jml"; component B { View { A {} } }"#),
        ]);

        let err = project.manager().compile_project().unwrap_err();
        match err {
            BuildError::Graph(GraphError::Cycles(cycles)) => {
                assert_eq!(cycles.len(), 1);
                assert_eq!(cycles[0].files, vec![project.src("A.jml"), project.src("B.jml")]);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!project.root().join("dist").exists());
    }

    #[test]
    fn test_missing_import_is_a_graph_error() {
        let project = Project::new(&[(
            "A.jml",
            r#"import Gone from "./Gone.jml"; component A { View {} }"#,
        )]);

        let err = project.manager().compile_project().unwrap_err();
        assert!(matches!(
            err,
            BuildError::Graph(GraphError::MissingDependencies(ref missing)) if missing.len() == 1
        ));
    }
}
