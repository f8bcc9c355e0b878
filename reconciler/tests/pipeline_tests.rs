//! End-to-end runs over a temporary data directory.

use litmerge::{FingerprintRegistry, Pipeline, PipelineConfig, PipelineError, RunOptions};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn write_json(path: &Path, value: &Value) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

/// Data directory with a journal catalog and the given authoritative records.
fn workspace(authoritative: &[(&str, Value)]) -> (TempDir, PipelineConfig) {
    let dir = tempdir().unwrap();
    let mut config = PipelineConfig::default();
    config.paths.base_dir = dir.path().to_path_buf();
    config.workers = 2;

    write_json(
        &config.paths.journal_catalog(),
        &json!([
            { "primaryId": "NLM:0410462", "nlm": "0410462", "title": "Genetics", "isoAbbreviation": "Genetics" },
            { "primaryId": "NLM:0375356", "nlm": "0375356", "title": "Journal of Cell Biology", "isoAbbreviation": "J Cell Biol" },
            { "primaryId": "NLM:9999999", "nlm": "9999999", "title": "Jnl Cell Biol", "medlineAbbreviation": "J Cell Biol" }
        ]),
    );
    fs::create_dir_all(config.paths.authoritative_dir()).unwrap();
    for (value, record) in authoritative {
        write_json(&config.paths.authoritative_dir().join(format!("{}.json", value)), record);
    }
    (dir, config)
}

fn submit(config: &PipelineConfig, organization: &str, entries: Value) {
    write_json(&config.paths.submission_file(organization), &json!({ "data": entries }));
}

fn pipeline(config: &PipelineConfig) -> Pipeline<FingerprintRegistry> {
    Pipeline::open(config.clone()).unwrap()
}

fn partition(config: &PipelineConfig, file: &str) -> Vec<Value> {
    let content = fs::read_to_string(config.paths.output_dir().join(file)).unwrap();
    serde_json::from_str(&content).unwrap()
}

/// Partition files currently in the output directory, sorted.
fn partition_files(config: &PipelineConfig) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(config.paths.output_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("REFERENCE_"))
        .collect();
    names.sort();
    names
}

fn report(config: &PipelineConfig, file: &str) -> String {
    fs::read_to_string(config.paths.reports_dir().join(file)).unwrap()
}

#[tokio::test]
async fn test_promoted_xref_is_matched() {
    let (_dir, config) = workspace(&[(
        "1001",
        json!({ "title": "Gene X", "volume": "7", "nlm": "0410462", "authors": [{ "name": "Smith J" }] }),
    )]);
    submit(
        &config,
        "FB",
        json!([{
            "primaryId": "FB:FBrf01",
            "title": "gene x (draft)",
            "crossReferences": [{ "id": "PMID:1001", "pages": ["PubMed"] }, { "id": "FB:FBrf01" }],
            "authors": [{ "name": "Smith J", "referenceId": "FB:FBrf01" }]
        }]),
    );

    let manifest = pipeline(&config).run(RunOptions::default()).await.unwrap();
    assert_eq!(manifest.emitted(), 1);

    let records = partition(&config, "REFERENCE_PUBMED_FB_1.json");
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["primaryId"], "PMID:1001");
    assert_eq!(record["matchState"]["state"], "matched");
    assert_eq!(record["title"], "Gene X");
    assert_eq!(record["journal"]["id"], "NLM:0410462");
    assert_eq!(record["resourceAbbreviation"], "Genetics");
    assert_eq!(record["authors"][0]["authorRank"], 1);

    let differ = report(&config, "FB_dqm_pubmed_differ_title");
    assert!(differ.contains("FB:FBrf01"));

    assert!(config.paths.output_dir().join("manifest.json").exists());
    let claims = fs::read_to_string(config.paths.claim_index()).unwrap();
    assert_eq!(claims.trim_end(), "PMID:1001\t1\tFB");
}

#[tokio::test]
async fn test_conflicting_categories_are_consolidated_and_reported() {
    let (_dir, config) = workspace(&[("2002", json!({ "title": "Shared paper", "nlm": "0410462" }))]);
    submit(
        &config,
        "FB",
        json!([{ "primaryId": "PMID:2002", "allianceCategory": "research_article", "keywords": ["Wing"] }]),
    );
    submit(
        &config,
        "WB",
        json!([{ "primaryId": "PMID:2002", "allianceCategory": "review", "keywords": ["wing", "Vulva"] }]),
    );

    let manifest = pipeline(&config).run(RunOptions::default()).await.unwrap();
    assert_eq!(manifest.consolidation.external_ids, 1);
    assert_eq!(manifest.consolidation.emitted, 1);

    let records = partition(&config, "REFERENCE_PUBMED_MULTI_1.json");
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["conflictUnresolved"], true);
    assert_eq!(record["allianceCategory"], "research_article");
    assert_eq!(record["contributingOrganizations"], json!(["FB", "WB"]));
    assert_eq!(record["keywords"], json!(["Wing", "Vulva"]));

    let conflicts = report(&config, "multi_org_conflicts");
    assert!(conflicts.contains("FB\tPMID:2002"));
    assert!(conflicts.contains("research_article"));
    assert!(conflicts.contains("WB\tPMID:2002"));
    assert!(conflicts.contains("review"));

    assert!(!config.paths.output_dir().join("REFERENCE_PUBMED_FB_1.json").exists());
    assert!(!config.paths.output_dir().join("REFERENCE_PUBMED_WB_1.json").exists());
}

#[tokio::test]
async fn test_conflict_winner_follows_organization_id_not_configured_order() {
    let (_dir, config) = workspace(&[("3003", json!({ "title": "Mouse and fly", "nlm": "0410462" }))]);
    assert!(
        config.organizations.iter().position(|o| o == "MGI") < config.organizations.iter().position(|o| o == "FB")
    );
    submit(&config, "MGI", json!([{ "primaryId": "PMID:3003", "allianceCategory": "review" }]));
    submit(&config, "FB", json!([{ "primaryId": "PMID:3003", "allianceCategory": "research_article" }]));

    let manifest = pipeline(&config).run(RunOptions::default()).await.unwrap();
    assert_eq!(manifest.consolidation.conflicts, 2);

    let record = &partition(&config, "REFERENCE_PUBMED_MULTI_1.json")[0];
    assert_eq!(record["allianceCategory"], "research_article");
    assert_eq!(record["contributingOrganizations"], json!(["FB", "MGI"]));
}

#[tokio::test]
async fn test_external_id_casing_does_not_split_a_publication() {
    let (_dir, config) = workspace(&[("2002", json!({ "title": "Shared paper", "nlm": "0410462" }))]);
    submit(
        &config,
        "WB",
        json!([{ "primaryId": "pmid:2002", "crossReferences": [{ "id": "pmid:2002", "pages": ["PubMed"] }] }]),
    );
    submit(
        &config,
        "FB",
        json!([{
            "primaryId": "FB:FBrf02",
            "crossReferences": [{ "id": "PMID:2002", "pages": ["PubMed"] }, { "id": "FB:FBrf02", "pages": ["reference"] }]
        }]),
    );

    let manifest = pipeline(&config).run(RunOptions::default()).await.unwrap();
    assert_eq!(manifest.consolidation.external_ids, 1);
    assert_eq!(manifest.emitted(), 1);
    assert_eq!(partition_files(&config), vec!["REFERENCE_PUBMED_MULTI_1.json"]);

    let record = &partition(&config, "REFERENCE_PUBMED_MULTI_1.json")[0];
    assert_eq!(record["primaryId"], "PMID:2002");
    assert_eq!(record["contributingOrganizations"], json!(["FB", "WB"]));

    let claims = fs::read_to_string(config.paths.claim_index()).unwrap();
    assert_eq!(claims.trim_end(), "PMID:2002\t2\tFB, WB");
}

#[tokio::test]
async fn test_ambiguous_journal_is_flagged_not_guessed() {
    let (_dir, config) = workspace(&[]);
    submit(
        &config,
        "WB",
        json!([{
            "primaryId": "WB:WBPaper00000001",
            "resourceAbbreviation": "J Cell Biol",
            "crossReferences": [{ "id": "WB:WBPaper00000001", "pages": ["reference"] }]
        }]),
    );

    let manifest = pipeline(&config).run(RunOptions::default()).await.unwrap();
    assert_eq!(manifest.flagged, 1);

    let records = partition(&config, "REFERENCE_PUBMOD_WB_1.json");
    let record = &records[0];
    assert!(record.get("journal").is_none());
    assert_eq!(record["journalAmbiguous"], true);
    assert_eq!(record["journalCandidates"], json!(["NLM:0375356", "NLM:9999999"]));

    let ambiguous = report(&config, "WB_ambiguous_journal");
    assert!(ambiguous.contains("NLM:0375356"));
    assert!(ambiguous.contains("NLM:9999999"));
}

#[tokio::test]
async fn test_reordered_fields_emit_nothing_on_second_run() {
    let (_dir, config) = workspace(&[]);
    let path = config.paths.submission_file("SGD");
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    fs::write(
        &path,
        r#"{"data": [{"primaryId": "SGD:S000001", "title": "Yeast", "volume": "3",
            "crossReferences": [{"id": "SGD:S000001", "pages": ["reference"]}]}]}"#,
    )
    .unwrap();
    let first = pipeline(&config).run(RunOptions::default()).await.unwrap();
    assert_eq!(first.emitted(), 1);

    fs::write(
        &path,
        r#"{"data": [{"crossReferences": [{"pages": ["reference"], "id": "SGD:S000001"}],
            "volume": "3", "title": "Yeast", "primaryId": "SGD:S000001"}]}"#,
    )
    .unwrap();
    let second = pipeline(&config).run(RunOptions::default()).await.unwrap();
    assert_eq!(second.emitted(), 0);
    assert_eq!(second.organizations[0].unchanged, 1);
    assert!(partition_files(&config).is_empty());
    assert!(config.paths.output_dir().join("manifest.json").exists());

    let forced = pipeline(&config).run(RunOptions { full: true }).await.unwrap();
    assert_eq!(forced.emitted(), 1);
    assert_eq!(partition_files(&config), vec!["REFERENCE_PUBMOD_SGD_1.json"]);
}

#[tokio::test]
async fn test_cancelled_run_writes_no_partitions() {
    let (_dir, config) = workspace(&[]);
    submit(&config, "XB", json!([{ "primaryId": "Xenbase:XB-ART-1" }]));

    let pipeline = pipeline(&config);
    pipeline.cancel_handle().store(true, std::sync::atomic::Ordering::SeqCst);
    let result = pipeline.run(RunOptions::default()).await;

    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert!(!config.paths.output_dir().join("REFERENCE_PUBMOD_XB_1.json").exists());
    assert!(!config.paths.fingerprint_dir().join("XB_fingerprints.json").exists());
}

#[tokio::test]
async fn test_missing_catalog_is_fatal() {
    let (_dir, config) = workspace(&[]);
    fs::remove_file(config.paths.journal_catalog()).unwrap();
    submit(&config, "FB", json!([]));

    let result = pipeline(&config).run(RunOptions::default()).await;
    assert!(matches!(result, Err(PipelineError::Load(_))));
}
