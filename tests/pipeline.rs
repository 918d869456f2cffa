use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Once;

use advisor::commands::{confirm, export_data, plan, run_backtest, snapshot, stop_study};
use advisor::context::AppContext;
use advisor::market_data::MarketData;
use advisor::models::{ActionKind, ActionSource, ActionStatus, Portfolio, Position, PricePoint};
use advisor::plan_store;
use advisor::portfolio::{load_portfolio, save_portfolio};
use chrono::NaiveDate;

const TOTAL_BARS: usize = 260;
const MARKET_DATA_FILE: &str = "market-data.bin";

fn ensure_test_env() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
}

fn series(closes: Vec<f64>) -> Vec<PricePoint> {
    let end = end_date();
    let len = closes.len();
    closes
        .into_iter()
        .enumerate()
        .map(|(i, close)| PricePoint {
            date: end - chrono::Days::new((len - 1 - i) as u64),
            close,
            high: close,
            low: close,
        })
        .collect()
}

fn linear(start: f64, end: f64, bars: usize) -> Vec<f64> {
    let step = (end - start) / (bars - 1) as f64;
    (0..bars).map(|i| start + step * i as f64).collect()
}

/// One crashing holding, one healthy holding, two strong candidates.
fn synthetic_market_data() -> MarketData {
    let mut map = BTreeMap::new();
    let mut stop_series = vec![100.0; TOTAL_BARS - 30];
    stop_series.extend(linear(100.0, 60.0, 30));
    map.insert("STOPX".to_string(), series(stop_series));
    map.insert(
        "HOLDX".to_string(),
        series(linear(80.0, 110.0, TOTAL_BARS)),
    );
    map.insert(
        "NEWAA".to_string(),
        series(linear(40.0, 95.0, TOTAL_BARS)),
    );
    map.insert(
        "NEWBB".to_string(),
        series(linear(20.0, 70.0, TOTAL_BARS)),
    );
    MarketData::from_series(map)
}

fn position(symbol: &str, shares: u32, avg: f64, high: f64) -> Position {
    Position {
        symbol: symbol.to_string(),
        shares,
        avg_price: avg,
        cost_basis: avg * shares as f64,
        first_entry: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        high_since_entry: high,
        is_core: false,
    }
}

fn seed_workspace(dir: &Path) -> AppContext {
    ensure_test_env();
    synthetic_market_data()
        .save_to_file(dir.join(MARKET_DATA_FILE))
        .unwrap();

    let app = AppContext::initialize(Some(dir.to_path_buf())).unwrap();
    let mut held = Portfolio {
        cash: 50_000.0,
        ..Portfolio::default()
    };
    held.positions
        .insert("STOPX".to_string(), position("STOPX", 50, 100.0, 100.0));
    held.positions
        .insert("HOLDX".to_string(), position("HOLDX", 10, 90.0, 100.0));
    save_portfolio(&app.portfolio_path(), &held).unwrap();
    app
}

#[test]
fn plan_confirm_roundtrip_updates_the_portfolio() {
    let dir = tempfile::tempdir().unwrap();
    let app = seed_workspace(dir.path());

    plan::run(&app, None, None).unwrap();

    let plan = plan_store::load_plan(&app.plans_dir(), end_date())
        .unwrap()
        .expect("plan file should exist");
    assert_eq!(plan.date, end_date());

    // Ordering contract: exits first (hard stops leading), then holds,
    // then adds by rank.
    let kinds: Vec<ActionKind> = plan.actions.iter().map(|r| r.action.kind()).collect();
    let first_add = kinds.iter().position(|k| *k == ActionKind::Add).unwrap();
    let last_exit = kinds.iter().rposition(|k| *k == ActionKind::Exit).unwrap();
    let hold_index = kinds.iter().position(|k| *k == ActionKind::Hold).unwrap();
    assert!(last_exit < hold_index && hold_index < first_add);

    let exit = &plan.actions[0];
    assert_eq!(exit.action.symbol(), "STOPX");
    assert_eq!(exit.source, ActionSource::HardStop);
    assert_eq!(exit.status, ActionStatus::Pending);

    confirm::run(&app, end_date(), &[], true).unwrap();

    let held = load_portfolio(&app.portfolio_path()).unwrap();
    assert!(!held.positions.contains_key("STOPX"));
    assert!(held.positions.contains_key("HOLDX"));
    assert!(held.positions.contains_key("NEWAA"));
    assert!(held.positions.contains_key("NEWBB"));
    assert!(!held.transactions.is_empty());
    assert_eq!(held.updated, Some(end_date()));

    // A second confirmation pass finds nothing pending and changes
    // nothing.
    confirm::run(&app, end_date(), &[], true).unwrap();
    let unchanged = load_portfolio(&app.portfolio_path()).unwrap();
    assert_eq!(unchanged, held);
}

#[test]
fn plan_generation_is_idempotent_at_the_byte_level() {
    let dir = tempfile::tempdir().unwrap();
    let app = seed_workspace(dir.path());

    plan::run(&app, None, None).unwrap();
    let path = plan_store::plan_path(&app.plans_dir(), end_date());
    let first = fs::read(&path).unwrap();

    // Re-running with the plan present must not rewrite it.
    plan::run(&app, None, None).unwrap();
    assert_eq!(fs::read(&path).unwrap(), first);

    // Regenerating from scratch with identical inputs reproduces the
    // exact same bytes.
    fs::remove_file(&path).unwrap();
    plan::run(&app, None, None).unwrap();
    assert_eq!(fs::read(&path).unwrap(), first);
}

#[test]
fn backtest_commands_run_over_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let app = seed_workspace(dir.path());

    run_backtest::run(&app, None, Vec::new(), run_backtest::StopKind::None, 0.0).unwrap();
    run_backtest::run(
        &app,
        None,
        vec!["NEWAA".to_string()],
        run_backtest::StopKind::Trailing,
        0.15,
    )
    .unwrap();
    stop_study::run(&app, None, vec!["NEWAA".to_string(), "NEWBB".to_string()]).unwrap();
}

#[test]
fn snapshot_baseline_is_stable_within_a_year() {
    let dir = tempfile::tempdir().unwrap();
    let app = seed_workspace(dir.path());

    snapshot::run(&app, None).unwrap();
    let path = app.snapshots_dir().join("snapshot_2025.json");
    let first = fs::read(&path).unwrap();
    snapshot::run(&app, None).unwrap();
    assert_eq!(fs::read(&path).unwrap(), first);
}

#[test]
fn export_data_re_encodes_json_into_the_binary_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let app = seed_workspace(dir.path());

    let json_path = dir.path().join("series.json");
    let data = synthetic_market_data();
    data.save_to_file(&json_path).unwrap();

    let bin_path = dir.path().join("export.bin");
    export_data::run(&app, &json_path, Some(bin_path.clone())).unwrap();

    let back = MarketData::load_from_file(&bin_path).unwrap();
    assert_eq!(back.symbols().count(), 4);
    assert_eq!(back.last_date(), Some(end_date()));
}
