//! Integration tests for Offcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Isolated home, config and store for one test
    struct Sandbox {
        dir: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = dir.path().join("store");
            let config = format!(
                "[app]\nscope = \"http://127.0.0.1:9/\"\n\n\
                 [network]\ntimeout_secs = 2\n\n\
                 [storage]\nroot = {:?}\n",
                store.display().to_string()
            );
            std::fs::write(dir.path().join("config.toml"), config).unwrap();
            Self { dir }
        }

        fn path(&self) -> &Path {
            self.dir.path()
        }

        fn config_path(&self) -> PathBuf {
            self.path().join("config.toml")
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("offcache");
            cmd.env("HOME", self.path())
                .env("XDG_CONFIG_HOME", self.path().join("xdg-config"))
                .env("XDG_STATE_HOME", self.path().join("xdg-state"))
                .env("XDG_DATA_HOME", self.path().join("xdg-data"))
                .env("OFFCACHE_CONFIG", self.config_path())
                .env("NO_COLOR", "1");
            cmd
        }

        /// A build output with two bundled assets and an image
        fn dist(&self) -> PathBuf {
            let dist = self.path().join("dist");
            let assets = dist.join("assets");
            std::fs::create_dir_all(&assets).unwrap();
            std::fs::write(assets.join("index-abc123.js"), "console.log(1)").unwrap();
            std::fs::write(assets.join("index-def456.css"), "body{}").unwrap();
            std::fs::write(assets.join("logo.png"), [0u8; 4]).unwrap();
            dist
        }
    }

    fn offcache() -> Command {
        cargo_bin_cmd!("offcache")
    }

    #[test]
    fn help_displays() {
        offcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Offline-first"))
            .stdout(predicate::str::contains("manifest"));
    }

    #[test]
    fn version_displays() {
        offcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("offcache"));
    }

    #[test]
    fn config_path() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[mirror]"))
            .stdout(predicate::str::contains("hf-mirror.com"));
    }

    #[test]
    fn config_set_persists() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["config", "set", "mirror.enabled", "false"])
            .assert()
            .success();

        let saved = std::fs::read_to_string(sandbox.config_path()).unwrap();
        assert!(saved.contains("enabled = false"));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["config", "set", "container.image", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn manifest_lists_bundled_assets() {
        let sandbox = Sandbox::new();
        let dist = sandbox.dist();

        sandbox
            .cmd()
            .arg("manifest")
            .arg(&dist)
            .args(["--app-version", "2.0.0"])
            .assert()
            .success()
            .stdout(predicate::str::contains("assistant-2.0.0-"));

        let manifest = std::fs::read_to_string(dist.join("precache.toml")).unwrap();
        assert!(manifest.contains("./index.html"));
        assert!(manifest.contains("./assets/index-abc123.js"));
        assert!(manifest.contains("./assets/index-def456.css"));
        assert!(!manifest.contains("logo.png"));
    }

    #[test]
    fn manifest_without_build_output_fails() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .arg("manifest")
            .arg(sandbox.path().join("missing"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Build output not found"));
    }

    #[test]
    fn verify_before_install_is_incomplete() {
        let sandbox = Sandbox::new();
        let dist = sandbox.dist();
        sandbox.cmd().arg("manifest").arg(&dist).assert().success();

        sandbox
            .cmd()
            .arg("verify")
            .arg("-m")
            .arg(dist.join("precache.toml"))
            .assert()
            .failure()
            .stdout(predicate::str::contains("missing http://127.0.0.1:9/index.html"))
            .stderr(predicate::str::contains("incomplete"))
            .stderr(predicate::str::contains("offcache install"));
    }

    #[test]
    fn list_empty() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache partitions"));
    }

    #[test]
    fn list_empty_json() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("[]"));
    }

    #[test]
    fn import_then_report_and_clear() {
        let sandbox = Sandbox::new();
        let model = sandbox.path().join("model.onnx");
        std::fs::write(&model, b"weights").unwrap();

        sandbox
            .cmd()
            .args(["import", "tts"])
            .arg(&model)
            .assert()
            .success()
            .stdout(predicate::str::contains("Imported 1 file(s)"));

        let output = sandbox
            .cmd()
            .args(["report", "--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
        let partitions = report["usage"]["partitions"].as_array().unwrap();
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0]["name"], "transformers-cache");
        assert_eq!(partitions[0]["kind"], "model_weights");
        assert_eq!(partitions[0]["bytes"], 7);
        let tts = report["models"]
            .as_array()
            .unwrap()
            .iter()
            .find(|m| m["kind"] == "tts")
            .unwrap();
        assert_eq!(tts["cached"], true);

        sandbox
            .cmd()
            .args(["message", "clear-all-caches", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cleared 1 partition(s)"));

        sandbox
            .cmd()
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn unknown_json_message_fails() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["message", "--json", r#"{"type":"RELOAD"}"#])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown control message"));
    }

    #[test]
    fn offline_fetch_returns_503() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["fetch", "http://127.0.0.1:9/index.html"])
            .assert()
            .success()
            .stderr(predicate::str::contains("503"))
            .stderr(predicate::str::contains("unavailable"));
    }

    #[test]
    fn offline_fetch_to_file_warns() {
        let sandbox = Sandbox::new();
        let out = sandbox.path().join("index.html");
        sandbox
            .cmd()
            .args(["fetch", "http://127.0.0.1:9/index.html", "-o"])
            .arg(&out)
            .assert()
            .success()
            .stdout(predicate::str::contains("[WARN]"))
            .stdout(predicate::str::contains("503"));
        assert!(out.exists());
    }
}
