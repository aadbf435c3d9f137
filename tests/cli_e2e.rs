//! End-to-end CLI tests for the gwas-library binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const MANIFEST: &str = "Phenotype Code\tPhenotype Description\tSex\tFile\tAWS File\n\
    50\tStanding height\tboth_sexes\t50.gwas.tsv.bgz\ts3://ukb/50\n\
    21001\tBody mass index (BMI)\tfemale\t21001.gwas.tsv.bgz\ts3://ukb/21001\n\
    4080\tSystolic blood pressure\tmale\t4080.gwas.tsv.bgz\t\n";

/// Command isolated from the caller's config and environment.
fn gwas_library(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("gwas-library").unwrap();
    cmd.env("XDG_CONFIG_HOME", dir.path().join("config-home"))
        .env_remove("GWAS_LIBRARY_DB")
        .env_remove("GWAS_MANIFEST_PATH")
        .env_remove("PHENOTYPE_CATALOG_PATH")
        .env_remove("RUST_LOG")
        .arg("--db")
        .arg(dir.path().join("library.db"));
    cmd
}

fn seeded_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("manifest.tsv");
    std::fs::write(&manifest, MANIFEST).unwrap();
    gwas_library(&dir)
        .arg("seed")
        .arg("--manifest")
        .arg(&manifest)
        .assert()
        .success();
    dir
}

#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("gwas-library").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ingest and query the GWAS"));
}

#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("gwas-library").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gwas-library"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("gwas-library").unwrap();
    cmd.arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_seed_reports_outcomes() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("manifest.tsv");
    std::fs::write(&manifest, MANIFEST).unwrap();

    gwas_library(&dir)
        .args(["-q", "seed", "--manifest"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("gwas_library: seeded (2 added, 0 skipped)"))
        .stdout(predicate::str::contains("phenotypes: skipped (source file missing)"));

    gwas_library(&dir)
        .args(["-q", "seed", "--manifest"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("gwas_library: skipped (already seeded)"));
}

#[test]
fn test_seed_manifest_from_environment() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("from-env.tsv");
    std::fs::write(&manifest, MANIFEST).unwrap();

    gwas_library(&dir)
        .env("GWAS_MANIFEST_PATH", &manifest)
        .args(["-q", "seed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("seeded (2 added"));
}

#[test]
fn test_seed_without_sources_skips_both() {
    let dir = TempDir::new().unwrap();
    gwas_library(&dir)
        .args(["-q", "seed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gwas_library: skipped (source file missing)"));
}

#[test]
fn test_list_search_and_sex_filter() {
    let dir = seeded_dir();

    gwas_library(&dir)
        .args(["-q", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Showing 2 of 2 entries"));

    gwas_library(&dir)
        .args(["-q", "list", "--search", "height"])
        .assert()
        .success()
        .stdout(predicate::str::contains("50.gwas.tsv.bgz"))
        .stdout(predicate::str::contains("21001").not());

    gwas_library(&dir)
        .args(["-q", "list", "--sex", "female"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Showing 1 of 1 entries"));
}

#[test]
fn test_show_outputs_json_and_missing_fails() {
    let dir = seeded_dir();

    gwas_library(&dir)
        .args(["-q", "show", "21001.gwas.tsv.bgz"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"display_name\": \"Body mass index (BMI)\""))
        .stdout(predicate::str::contains("\"sex\": \"female\""));

    gwas_library(&dir)
        .args(["-q", "show", "missing.tsv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No library entry"));
}

#[test]
fn test_popular_lists_ranked_entries() {
    let dir = seeded_dir();
    gwas_library(&dir)
        .args(["-q", "popular", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  1. "));
}

#[test]
fn test_inspect_prints_validation_report() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("manifest.tsv");
    std::fs::write(&manifest, MANIFEST).unwrap();

    gwas_library(&dir)
        .args(["-q", "inspect"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": 2"))
        .stdout(predicate::str::contains("\"invalid\": 1"))
        .stdout(predicate::str::contains("No download method available"));

    // Inspect never opens the database.
    assert!(!dir.path().join("library.db").exists());
}

#[test]
fn test_inspect_missing_manifest_fails() {
    let dir = TempDir::new().unwrap();
    gwas_library(&dir)
        .args(["-q", "inspect", "/nonexistent/manifest.tsv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse manifest"));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "db_max_connections = 50\n").unwrap();

    gwas_library(&dir)
        .arg("--config")
        .arg(&config)
        .args(["-q", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("db_max_connections"));
}
