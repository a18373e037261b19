use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_abayes"))
}

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("abayes_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn stdout_json(out: &Output) -> serde_json::Value {
    assert!(
        out.status.success(),
        "command should succeed, stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("stdout should be valid JSON")
}

fn variant<'a>(report: &'a serde_json::Value, name: &str) -> &'a serde_json::Value {
    report["variants"]
        .as_array()
        .expect("variants should be an array")
        .iter()
        .find(|v| v["name"] == name)
        .unwrap_or_else(|| panic!("variant {} missing", name))
}

#[test]
fn evaluate_yaml_declares_control() {
    let input = fixture_path("experiment.yaml");
    let out = run(&["evaluate", "--input", input.to_string_lossy().as_ref()]);
    let report = stdout_json(&out);

    assert_eq!(report["done"], true);
    assert_eq!(report["winner"], "control");
    assert_eq!(report["best"], "control");
    assert_eq!(report["n_samples"], 200_000);
    let control = variant(&report, "control");
    let treatment = variant(&report, "treatment");
    assert!(control["beats_all"].as_f64().unwrap() > treatment["beats_all"].as_f64().unwrap());
    assert!(control["loss"].as_f64().unwrap() < 0.003);
}

#[test]
fn evaluate_overrides_and_writes_output_file() {
    let input = fixture_path("experiment.yaml");
    let output = tmp_path("report.json");
    let out = run(&[
        "evaluate",
        "--input",
        input.to_string_lossy().as_ref(),
        "--samples",
        "5000",
        "--seed",
        "1",
        "--output",
        output.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty(), "report should go to the output file only");

    let bytes = std::fs::read(&output).expect("report file should exist");
    let report: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(report["n_samples"], 5_000);
    let _ = std::fs::remove_file(&output);
}

#[test]
fn evaluate_json_compound_metric() {
    let input = fixture_path("revenue.json");
    let out = run(&["evaluate", "--input", input.to_string_lossy().as_ref()]);
    let report = stdout_json(&out);
    assert_eq!(report["variants"].as_array().unwrap().len(), 2);
    let beats_all: f64 =
        report["variants"].as_array().unwrap().iter().map(|v| v["beats_all"].as_f64().unwrap()).sum();
    assert!((beats_all - 1.0).abs() < 1e-9);
    assert!(report["warnings"].is_array());
}

#[test]
fn evaluate_rejects_length_mismatch() {
    let input = fixture_path("mismatch.json");
    let out = run(&["evaluate", "--input", input.to_string_lossy().as_ref()]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("equal length"), "stderr={}", stderr);
}

#[test]
fn simulate_sequential_reports_decision() {
    let out = run(&[
        "simulate",
        "--control-rate",
        "0.05",
        "--treatment-rate",
        "0.3",
        "--policy",
        "sequential",
        "--seed",
        "9",
    ]);
    let v = stdout_json(&out);
    assert_eq!(v["policy"], "sequential");
    assert_eq!(v["done"], true);
    assert_eq!(v["winner"], "treatment");
    assert_eq!(v["outcome"], "true_positive");
    let legs = v["legs"].as_array().unwrap();
    let total: u64 = legs.iter().map(|l| l["trials"].as_u64().unwrap()).sum();
    assert_eq!(total, v["trials"].as_u64().unwrap());
    for leg in legs {
        let name = leg["name"].as_str().unwrap();
        let trials = leg["trials"].as_u64().unwrap();
        let expected = leg["successes"].as_u64().unwrap() as f64 / trials as f64;
        assert!(trials > 0);
        assert!((v["observed_rates"][name].as_f64().unwrap() - expected).abs() < 1e-12);
    }
}

#[test]
fn simulate_bayesian_with_trial_cap() {
    let out = run(&[
        "simulate",
        "--control-rate",
        "0.1",
        "--treatment-rate",
        "0.1",
        "--samples",
        "10000",
        "--max-trials",
        "400",
    ]);
    let v = stdout_json(&out);
    assert_eq!(v["policy"], "bayesian");
    // Never evaluated: the cap is below the first checkpoint.
    assert_eq!(v["done"], false);
    assert_eq!(v["winner"], serde_json::Value::Null);
    assert_eq!(v["outcome"], "true_null");
    assert_eq!(v["trials"], 400);
    let observed = v["observed_rates"].as_object().unwrap();
    assert_eq!(observed.len(), 2);
    assert!(observed.values().all(|r| (0.0..=1.0).contains(&r.as_f64().unwrap())));
}

#[test]
fn simulate_rejects_unknown_policy() {
    let out = run(&["simulate", "--control-rate", "0.1", "--treatment-rate", "0.2", "--policy", "epsilon"]);
    assert!(!out.status.success());
}

#[test]
fn sweep_writes_csv() {
    let config = fixture_path("sweep.yaml");
    let output = tmp_path("sweep.csv");
    let out = run(&[
        "sweep",
        "--config",
        config.to_string_lossy().as_ref(),
        "--output",
        output.to_string_lossy().as_ref(),
        "--threads",
        "2",
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let mut rdr = csv::Reader::from_path(&output).expect("sweep CSV should exist");
    let headers: Vec<String> = rdr.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(
        headers,
        [
            "control_rate",
            "treatment_rate",
            "mean_trials",
            "median_trials",
            "true_positive",
            "false_positive",
            "true_negative",
            "false_negative",
            "true_null",
            "false_null",
        ]
    );
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "0.1");
    assert_eq!(&rows[1][1], "0.3");
    let _ = std::fs::remove_file(&output);
}
