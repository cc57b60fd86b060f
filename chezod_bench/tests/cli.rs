use std::process::{Command, Output};

const STRATEGIES: [&str; 3] = [
    "train_on_cleared_1325_test_on_117_residue_split",
    "train_on_1325_cv_residue_split",
    "train_on_total_cv_residue_split",
];

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chezod-bench"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to launch chezod-bench")
}

fn dataset_args(strategy: &str) -> Vec<&str> {
    vec![
        "-t", "missing/train.json",
        "-e", "missing/test.json",
        "-r", "missing/train_repr",
        "-p", "missing/test_repr",
        "-s", strategy,
    ]
}

#[test]
fn unknown_strategy_prints_whitelist() {
    let media = tempfile::tempdir().unwrap();
    let mut args = vec!["compare", "-b", "missing/odin"];
    args.extend(dataset_args("train_on_everything"));
    args.extend(["--media-dir", media.path().to_str().unwrap()]);

    let out = run(&args);
    assert_eq!(out.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("The training strategies are:"));
    for s in STRATEGIES {
        assert!(stdout.lines().any(|l| l == s), "{s} missing from:\n{stdout}");
    }
    // rejected before anything is written
    assert_eq!(std::fs::read_dir(media.path()).unwrap().count(), 0);
}

#[test]
fn unknown_model_type_is_rejected() {
    let mut args = vec!["stability", "-m", "esm-2"];
    args.extend(dataset_args(STRATEGIES[1]));
    let out = run(&args);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stdout).contains("esm-1b"));
}

#[test]
fn combined_needs_the_cleared_split() {
    let mut args = vec!["stability", "-m", "combined"];
    args.extend(dataset_args(STRATEGIES[2]));
    let out = run(&args);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stdout).contains(STRATEGIES[0]));
}

#[test]
fn missing_inputs_fail_with_status_one() {
    let media = tempfile::tempdir().unwrap();
    let mut args = vec!["stability", "-m", "esm-1v"];
    args.extend(dataset_args(STRATEGIES[0]));
    args.extend(["--media-dir", media.path().to_str().unwrap()]);
    let out = run(&args);
    assert_eq!(out.status.code(), Some(1));
}
