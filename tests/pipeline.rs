use std::fs;
use std::path::Path;

use census_access::config::{ChoroplethConfig, CompositionConfig};
use census_access::geometry::load_boundaries;
use census_access::reports::{choropleth, composition, run_all, top_regions, ReportContext};
use census_access::schema::tier;
use census_access::{CensusModel, ReportConfig, ReportError};

const RQ1: &str = "\
ADA,CMANAME,Sum of T1528,Sum of T1536
1,Toronto,800,200
2,Toronto,700,300
3,Halifax,950,50
4,Moncton,0,0
5,Vancouver,600,400
";

const RQ2: &str = "\
ADA_code,CMANAME,PRNAME,public_emp,walk_emp,T1670,T1673,T1674,T1675
10001,Toronto,Ontario,0.9,0.5,50,30,15,5
10002,Toronto,Ontario,0.7,0.4,50,30,15,5
10003,Halifax,Nova Scotia,0.3,0.8,20,20,10,0
10004,Moncton,New Brunswick,0.1,0.2,5,3,1,1
10005,Outside CAs,Ontario,0.99,0.99,1,1,1,1
";

const ADA: &str = "\
ADA_code,CMANAME,PRNAME,T1528,T1536
10001,Toronto,Ontario,90,10
10002,Toronto,Ontario,80,20
10003,Halifax,Nova Scotia,97,3
";

fn square(code: &str, x: f64) -> String {
    format!(
        r#"{{"type":"Feature","properties":{{"ADAUID":"{code}"}},"geometry":{{"type":"Polygon","coordinates":[[[{x},0],[{x1},0],[{x1},1],[{x},1],[{x},0]]]}}}}"#,
        x1 = x + 1.0
    )
}

fn boundaries() -> String {
    let features = [
        square("10001", 0.0),
        square("10002", 1.0),
        square("10003", 2.0),
        square("10004", 3.0),
    ];
    format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, features.join(","))
}

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

fn context(dir: &Path, write_tables: bool) -> ReportContext {
    let mut config = ReportConfig {
        data_dir: dir.to_path_buf(),
        out_dir: dir.join("out"),
        ..ReportConfig::default()
    };
    config.top_regions.input = "rq1.csv".to_string();
    config.choropleth.input = "ada.csv".to_string();
    config.choropleth.boundaries = "ada.geojson".to_string();
    for preset in config.composition.values_mut() {
        preset.input = "rq2.csv".to_string();
    }
    ReportContext::new(config, write_tables)
}

#[test]
fn top_regions_writes_html_and_table() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "rq1.csv", RQ1);
    let ctx = context(dir.path(), true);

    let output = top_regions::run(&ctx, &ctx.config.top_regions).unwrap();

    let html = fs::read_to_string(&output.chart).unwrap();
    assert_eq!(html.matches(r#"<rect class="bar""#).count(), 3);
    assert!(html.contains(">40.00%</text>"));
    assert!(html.contains(">25.00%</text>"));
    assert!(html.contains(">5.00%</text>"));
    assert!(html.contains("Light Blue = Low"));

    let table = output.table.unwrap();
    assert!(table.ends_with("top20_recent_immigrants.csv"));
    let csv = fs::read_to_string(table).unwrap();
    assert!(csv.starts_with("CMANAME,pct_recent_immigrants"));

    let summary: Vec<&str> = output.summary.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(summary, vec!["Vancouver", "Toronto", "Halifax"]);
}

#[test]
fn rerun_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "rq1.csv", RQ1);
    let ctx = context(dir.path(), false);

    let first = top_regions::run(&ctx, &ctx.config.top_regions).unwrap();
    let a = fs::read(&first.chart).unwrap();
    let second = top_regions::run(&ctx, &ctx.config.top_regions).unwrap();
    let b = fs::read(&second.chart).unwrap();
    assert_eq!(a, b);
}

#[test]
fn missing_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path(), false);
    let err = top_regions::run(&ctx, &ctx.config.top_regions).unwrap_err();
    assert!(matches!(err, ReportError::Io(_)));
    assert!(!dir.path().join("out").join("top20_recent_immigrants.html").exists());
}

#[test]
fn composition_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "rq2.csv", RQ2);
    let model = CensusModel::new(dir.path());

    let cfg = CompositionConfig {
        n: 1,
        ..CompositionConfig::public_transit()
    };
    let mut numeric = vec!["public_emp", "walk_emp"];
    numeric.extend(cfg.categories.iter().map(|c| c.column.as_str()));
    let df = model
        .load_observations("rq2.csv", &["CMANAME", "PRNAME"], &numeric)
        .unwrap();

    fn labels(entries: &[composition::CompositionEntry]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|e| (e.label.clone(), e.tier.clone()))
            .collect()
    }
    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    // "Outside CAs" is not in the public-transit exclusion list
    let entries = composition::build(&df, &cfg).unwrap();
    assert_eq!(
        labels(&entries),
        vec![
            pair("Outside CAs (Ontario)", tier::HIGH_ACCESS),
            pair("Moncton (New Brunswick)", tier::LOW_ACCESS),
            pair(tier::NATIONAL_CENSUS_2021, tier::NATIONAL_CENSUS_2021),
        ]
    );

    // but it is in the walk list
    let walk = CompositionConfig {
        n: 1,
        ..CompositionConfig::walk()
    };
    let entries = composition::build(&df, &walk).unwrap();
    assert_eq!(
        labels(&entries),
        vec![
            pair("Halifax (Nova Scotia)", tier::HIGH_ACCESS),
            pair("Moncton (New Brunswick)", tier::LOW_ACCESS),
            pair(tier::NATIONAL_CENSUS_2021, tier::NATIONAL_CENSUS_2021),
        ]
    );
    assert_eq!(
        entries[0].annotation(walk.score_format),
        "High Access (80.0%)"
    );
}

#[test]
fn composition_skips_nan_cells() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "rq2.csv",
        "\
CMANAME,PRNAME,public_emp,T1670,T1673,T1674,T1675
Alpha,Quebec,0.9,10,10,10,10
Alpha,Quebec,NaN,10,10,10,10
Beta,Quebec,0.5,10,10,10,10
Gamma,Quebec,0.1,10,NaN,10,0
",
    );
    let model = CensusModel::new(dir.path());
    let cfg = CompositionConfig {
        n: 1,
        ..CompositionConfig::public_transit()
    };
    let mut numeric = vec!["public_emp"];
    numeric.extend(cfg.categories.iter().map(|c| c.column.as_str()));
    let df = model
        .load_observations("rq2.csv", &["CMANAME", "PRNAME"], &numeric)
        .unwrap();

    let entries = composition::build(&df, &cfg).unwrap();
    let labels: Vec<(&str, &str)> = entries
        .iter()
        .map(|e| (e.label.as_str(), e.tier.as_str()))
        .collect();
    assert_eq!(
        labels,
        vec![
            ("Alpha (Quebec)", tier::HIGH_ACCESS),
            ("Gamma (Quebec)", tier::LOW_ACCESS),
            (tier::NATIONAL_CENSUS_2021, tier::NATIONAL_CENSUS_2021),
        ]
    );
    assert!((entries[0].score.unwrap() - 0.9).abs() < 1e-9);
    let gamma = &entries[1].percentages;
    assert!((gamma[0] - 50.0).abs() < 1e-9);
    assert!((gamma[2] - 50.0).abs() < 1e-9);
}

#[test]
fn choropleth_from_geojson() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "ada.csv", ADA);
    write(dir.path(), "ada.geojson", &boundaries());
    let model = CensusModel::new(dir.path());

    let cfg = ChoroplethConfig::default();
    let df = model
        .load_observations("ada.csv", &["ADA_code", "CMANAME", "PRNAME"], &["T1528", "T1536"])
        .unwrap();
    let shapes = load_boundaries(&model.resolve("ada.geojson"), &cfg.boundary_key).unwrap();

    let table = choropleth::build(&df, &shapes, &cfg).unwrap();
    assert_eq!(table.area_tiers.len(), 4);
    assert_eq!(table.area_tiers[1], tier::TOP_10);
    assert_eq!(table.area_tiers[3], tier::NO_DATA);

    let labels: Vec<&str> = table.regions.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["Toronto (Ontario)", "Halifax (Nova Scotia)"]);
    assert!((table.regions[0].share - 15.0).abs() < 1e-9);
}

#[test]
#[ignore = "Font rendering not available in test environment"]
fn run_all_renders_every_report() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "rq1.csv", RQ1);
    write(dir.path(), "rq2.csv", RQ2);
    write(dir.path(), "ada.csv", ADA);
    write(dir.path(), "ada.geojson", &boundaries());

    let mut ctx = context(dir.path(), true);
    // generations reads its own columns
    ctx.config.composition.remove("generations");

    let outputs = run_all(&ctx).unwrap();
    assert_eq!(outputs.len(), 4);
    for output in outputs {
        assert!(output.chart.is_file(), "{}", output.chart.display());
        assert!(output.table.unwrap().is_file());
    }
}
