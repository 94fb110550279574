//! Integration tests for CLI config parsing and util helpers.

use kcat_cli::kcat::inference::input::KcatInferenceConfig;
use kcat_cli::kcat::load_data::find_input;
use kcat_cli::kcat::train::input::{KcatTrainConfig, RunArgs};
use kcat_cli::kcat::util::{ensure_dir, validate_data_dir, write_bytes_to_file};

// ---------------------------------------------------------------------------
// KcatTrainConfig
// ---------------------------------------------------------------------------

#[test]
fn train_config_default_values() {
    let cfg = KcatTrainConfig::default();
    assert_eq!(cfg.model_name, "Kcat");
    assert_eq!(cfg.dim, 20);
    assert_eq!(cfg.layer_gnn, 3);
    assert_eq!(cfg.layer_output, 3);
    assert_eq!(cfg.epochs, 100);
    assert_eq!(cfg.lr_milestones, vec![35, 70]);
    assert_eq!(cfg.checkpoint_interval, 20);
    assert_eq!(cfg.split_seed, 233);
    assert!((cfg.learning_rate - 1e-4).abs() < 1e-12);
    assert!((cfg.weight_decay - 1e-6).abs() < 1e-12);
    assert!(cfg.seed.is_none());
    assert!(cfg.validate().is_ok());
}

#[test]
fn train_config_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.json");
    std::fs::write(&path, r#"{"dim": 8, "epochs": "lots", "seed": 5}"#).unwrap();

    let cfg = KcatTrainConfig::from_file(&path).unwrap();
    assert_eq!(cfg.dim, 8);
    // Invalid values fall back to the default.
    assert_eq!(cfg.epochs, 100);
    assert_eq!(cfg.seed, Some(5));
    assert_eq!(cfg.model_name, "Kcat");
}

#[test]
fn train_config_rejects_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(KcatTrainConfig::from_file(&path).is_err());
}

#[test]
fn train_config_validation() {
    let mut cfg = KcatTrainConfig::default();
    cfg.checkpoint_interval = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = KcatTrainConfig::default();
    cfg.train_ratio = 1.5;
    assert!(cfg.validate().is_err());
}

#[test]
fn output_paths_follow_model_name() {
    let mut cfg = KcatTrainConfig::default();
    cfg.output_dir = "runs".to_string();
    cfg.model_name = "Wide".to_string();
    assert_eq!(
        cfg.output_path("_20.safetensors"),
        std::path::PathBuf::from("runs/Wide_20.safetensors")
    );
}

// ---------------------------------------------------------------------------
// RunArgs
// ---------------------------------------------------------------------------

#[test]
fn run_args_are_flat_and_reload() {
    let args = RunArgs {
        config: KcatTrainConfig::default(),
        len_fingerprint: 42,
        protein_length: 3714,
        feature_width: 26,
    };
    let json = serde_json::to_value(&args).unwrap();
    assert_eq!(json["dim"], 20);
    assert_eq!(json["len_fingerprint"], 42);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Kcat-args.json");
    std::fs::write(&path, serde_json::to_string_pretty(&args).unwrap()).unwrap();
    let reloaded = RunArgs::load(&path).unwrap();
    assert_eq!(reloaded, args);

    let model = reloaded.model_config();
    assert_eq!(model.len_fingerprint, 42);
    assert_eq!(model.protein_length, 3714);
    assert_eq!(model.dim, 20);
}

// ---------------------------------------------------------------------------
// KcatInferenceConfig
// ---------------------------------------------------------------------------

#[test]
fn inference_config_serializes_to_json() {
    let cfg = KcatInferenceConfig::default();
    let json = serde_json::to_string_pretty(&cfg).unwrap();
    assert!(json.contains("model_path"));
    assert!(json.contains("args_file"));
    let cfg2: KcatInferenceConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(cfg, cfg2);
}

// ---------------------------------------------------------------------------
// util / load_data helpers
// ---------------------------------------------------------------------------

#[test]
fn validate_data_dir_requires_directory() {
    let dir = tempfile::tempdir().unwrap();
    assert!(validate_data_dir(dir.path()).is_ok());
    assert!(validate_data_dir(&dir.path().join("missing")).is_err());
}

#[test]
fn ensure_dir_and_write_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    ensure_dir(&nested).unwrap();
    let file = nested.join("out.txt");
    write_bytes_to_file(&file, b"hello").unwrap();
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "hello");
}

#[test]
fn find_input_prefers_json_then_pickle() {
    let dir = tempfile::tempdir().unwrap();
    assert!(find_input(dir.path(), "Kcats").is_none());

    std::fs::write(dir.path().join("Kcats.pickle"), b"").unwrap();
    assert_eq!(
        find_input(dir.path(), "Kcats"),
        Some(dir.path().join("Kcats.pickle"))
    );

    std::fs::write(dir.path().join("Kcats.json"), b"[]").unwrap();
    assert_eq!(
        find_input(dir.path(), "Kcats"),
        Some(dir.path().join("Kcats.json"))
    );
}
