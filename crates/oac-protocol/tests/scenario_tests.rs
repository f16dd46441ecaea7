//! End-to-end query scenarios against the shared catalog fixtures.

use oac_protocol::format::{to_delimited, to_json};
use oac_protocol::{
    parse_query_string, render, Catalog, CatalogSnapshot, EngineOptions, Event, MemoryDetailStore,
    OutputFormat, QueryEngine, QueryError, QueryRequest, QueryResult, ResourceLimitExceeded,
    ResourceLimits, SkyPosition,
};
use test_utils::{assert_approx_eq, fixtures, layout};

// ============================================================================
// Helpers
// ============================================================================

fn snapshot() -> CatalogSnapshot {
    CatalogSnapshot::builder()
        .version(1)
        .catalog(Catalog::from_json(layout::SNE, &fixtures::sne_catalog()))
        .catalog(Catalog::from_json(
            layout::SNE_GRAVEYARD,
            &fixtures::sne_graveyard_catalog(),
        ))
        .catalog(Catalog::from_json(layout::KILONOVA, &fixtures::kilonova_catalog()))
        .preference_order([layout::SNE, layout::KILONOVA, layout::SNE_GRAVEYARD])
        .build()
}

fn details() -> MemoryDetailStore {
    let mut store = MemoryDetailStore::new();
    if let Some(event) = Event::from_json(layout::SNE, &fixtures::sn2014j_detail()) {
        store.insert(event);
    }
    store
}

fn run_with(local: &str, path: &str, query: &str, options: &EngineOptions) -> QueryResult {
    let snapshot = snapshot();
    let details = details();
    let request = QueryRequest::parse(local, path, &parse_query_string(query), &options.limits)
        .expect("valid request");
    QueryEngine::new(&snapshot, &details, options)
        .execute(&request)
        .expect("request within its event guards")
}

fn run(path: &str, query: &str) -> QueryResult {
    run_with(layout::SNE, path, query, &EngineOptions::default())
}

fn parse_error(path: &str, query: &str) -> QueryError {
    QueryRequest::parse(
        layout::SNE,
        path,
        &parse_query_string(query),
        &ResourceLimits::default(),
    )
    .expect_err("request should be rejected")
}

fn values(result: &QueryResult, attribute: &str) -> Vec<String> {
    result
        .rows
        .iter()
        .filter_map(|r| r.observation.get(attribute))
        .map(|v| v.to_string())
        .collect()
}

fn events(result: &QueryResult) -> Vec<&str> {
    let mut names: Vec<&str> = result.rows.iter().map(|r| r.event.as_str()).collect();
    names.dedup();
    names
}

type Triple = (String, String, String, String);

fn json_triples(result: &QueryResult) -> Vec<Triple> {
    let parsed: serde_json::Value = serde_json::from_str(&to_json(result).unwrap()).unwrap();
    let mut triples = Vec::new();
    for (event, quantities) in parsed.as_object().unwrap() {
        for (quantity, rows) in quantities.as_object().unwrap() {
            for row in rows.as_array().unwrap() {
                for (attr, value) in row.as_object().unwrap() {
                    let text = match value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    triples.push((event.clone(), quantity.clone(), attr.clone(), text));
                }
            }
        }
    }
    triples.sort();
    triples
}

fn csv_triples(result: &QueryResult) -> Vec<Triple> {
    let csv = to_delimited(result, ',', None);
    let mut lines = csv.lines();
    let header: Vec<&str> = lines.next().unwrap().split(',').collect();
    let mut triples = Vec::new();
    for line in lines {
        let cells: Vec<&str> = line.split(',').collect();
        for (column, cell) in header.iter().zip(&cells).skip(2) {
            if !cell.is_empty() {
                triples.push((
                    cells[0].to_string(),
                    cells[1].to_string(),
                    column.to_string(),
                    cell.to_string(),
                ));
            }
        }
    }
    triples.sort();
    triples
}

// ============================================================================
// Documented scenarios
// ============================================================================

#[test]
fn test_scenario_single_event_quantity() {
    let result = run("SN2014J/redshift", "");
    assert_eq!(events(&result), vec!["SN2014J"]);
    assert_eq!(values(&result, "value"), vec!["0.000677", "0.0008"]);
    assert!(result.rows.iter().all(|r| r.quantity == "redshift"));
}

#[test]
fn test_scenario_complete_photometry() {
    let result = run("SN2014J/photometry/magnitude+e_magnitude+band", "complete");
    assert!(!result.is_empty());
    for row in &result.rows {
        for attr in ["magnitude", "e_magnitude", "band"] {
            assert!(row.observation.contains(attr), "missing {}", attr);
        }
    }
    // The row carrying a realization is excluded from attribute queries.
    assert_eq!(values(&result, "magnitude"), vec!["10.61"]);
}

#[test]
fn test_scenario_value_filter_intersects_quantities() {
    let result = run("all/lumdist+claimedtype", "value=ia");
    assert!(result.is_empty());
    assert_eq!(to_json(&result).unwrap(), "{}");
}

#[test]
fn test_scenario_presence_and_type_filters() {
    let result = run("all/lumdist+claimedtype", "lumdist&claimedtype=ia");
    assert_eq!(events(&result), vec!["SN2011fe", "SN2014J"]);
    for row in result.rows.iter().filter(|r| r.quantity == "claimedtype") {
        assert_eq!(row.observation.get("value").unwrap().to_string().to_lowercase(), "ia");
    }
    assert!(result.rows.iter().any(|r| r.quantity == "lumdist"));
}

#[test]
fn test_scenario_closest_spectrum() {
    let result = run("SN2014J/spectra/time+data", "time=56703.2&closest");
    assert_eq!(result.rows.len(), 1);
    assert_eq!(values(&result, "time"), vec![fixtures::SN2014J_SPECTRUM_TIMES[1]]);
    let keys: Vec<&str> = result.rows[0].observation.keys().collect();
    assert_eq!(keys, vec!["time", "data"]);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_complete_is_monotonic_subset() {
    let path = "SN2014J/photometry/magnitude+e_magnitude+band";
    let loose = run(path, "");
    let strict = run(path, "complete");
    assert!(strict.rows.len() <= loose.rows.len());
    for row in &strict.rows {
        assert!(loose.rows.contains(row));
    }
}

#[test]
fn test_projection_keys_are_requested() {
    let requested = ["band", "magnitude"];
    let result = run("SN2014J/photometry/band+magnitude", "");
    assert!(!result.is_empty());
    for row in &result.rows {
        assert!(row.observation.keys().all(|k| requested.contains(&k)));
    }
}

#[test]
fn test_closest_is_optimal() {
    let target = 56670.9;
    let all = run("SN2014J/photometry/time+magnitude", "");
    let picked = run("SN2014J/photometry/time+magnitude", "time=56670.9&closest");
    assert_eq!(picked.rows.len(), 1);

    let distance = |s: &str| (s.parse::<f64>().unwrap() - target).abs();
    let best = distance(&values(&picked, "time")[0]);
    for time in values(&all, "time") {
        assert!(best <= distance(&time));
    }
}

#[test]
fn test_item_zero_equals_first() {
    let path = "SN2014J/photometry/magnitude";
    assert_eq!(run(path, "item=0").rows, run(path, "first").rows);
    assert_eq!(run(path, "item=0").rows.len(), 1);
    assert!(run(path, "item=99").is_empty());
}

#[test]
fn test_json_and_csv_carry_same_triples() {
    let result = run("SN2014J/photometry/magnitude+band+e_magnitude", "");
    assert!(!result.is_empty());
    assert_eq!(json_triples(&result), csv_triples(&result));
}

// ============================================================================
// Positional search
// ============================================================================

#[test]
fn test_cone_search_around_sn2014j() {
    let result = run("catalog/host", "ra=09:55:42.14&dec=%2B69:40:26.0&radius=10");
    assert_eq!(events(&result), vec!["SN2014J"]);
}

#[test]
fn test_box_search_around_m101() {
    let result = run("catalog/host", "ra=14:00:00&dec=54:00:00&width=3600&height=3600");
    assert_eq!(events(&result), vec!["SN2011fe"]);
    assert_eq!(values(&result, "value"), vec!["M101"]);
}

#[test]
fn test_cone_search_separation() {
    let m82 = SkyPosition::parse("09:55:42.14", "+69:40:26.0").unwrap();
    let m101 = SkyPosition::parse("14:03:05.81", "+54:16:25.4").unwrap();
    // Roughly 31 degrees apart.
    assert_approx_eq!(m82.separation_arcsec(&m101) / 3600.0, 31.02, 0.05);
}

#[test]
fn test_exact_coordinate_match() {
    let result = run("catalog/host", "ra=05:35:28.03&dec=-69:16:11.8");
    assert_eq!(events(&result), vec!["SN1987A"]);
}

#[test]
fn test_exact_coordinate_keeps_sign() {
    // A raw `+` is a sign here, not an encoded space.
    let result = run("catalog/host", "ra=09:55:42.14&dec=+69:40:26.0");
    assert_eq!(events(&result), vec!["SN2014J"]);

    // Exact mode compares text, so an equal angle written differently misses.
    let result = run("catalog/host", "ra=148.92558&dec=69.67389");
    assert!(result.is_empty());
}

fn positioned(name: &str, ra: &str, dec: &str) -> Event {
    let value = |v: &str| vec![oac_protocol::Observation::new().with("value", v)];
    Event::new(name, layout::SNE)
        .with_quantity("ra", value(ra))
        .with_quantity("dec", value(dec))
        .with_quantity("host", value("Field"))
}

fn region_events(query: &str) -> Vec<String> {
    let snapshot = CatalogSnapshot::builder()
        .catalog(Catalog::new(
            layout::SNE,
            vec![
                positioned("Edge", "09:55:42.14", "+69:40:27.0"),
                positioned("Beyond", "09:55:42.14", "+69:40:27.1"),
                positioned("EastEdge", "10:00:01", "+00:00:00"),
                positioned("EastBeyond", "10:00:01.01", "+00:00:00"),
            ],
        ))
        .build();
    let options = EngineOptions::default();
    let request = QueryRequest::parse(
        layout::SNE,
        "catalog/host",
        &parse_query_string(query),
        &options.limits,
    )
    .unwrap();
    let result = QueryEngine::new(&snapshot, &MemoryDetailStore::new(), &options)
        .execute(&request)
        .unwrap();
    events(&result).into_iter().map(str::to_string).collect()
}

#[test]
fn test_cone_includes_point_on_boundary() {
    // `radius=0` falls back to the one-arcsecond default.
    assert_eq!(
        region_events("ra=09:55:42.14&dec=%2B69:40:26.0&radius=0"),
        vec!["Edge"]
    );
    assert_eq!(
        region_events("ra=09:55:42.14&dec=%2B69:40:26.0&radius=1"),
        vec!["Edge"]
    );
    // One second of time is 15 arcseconds on the equator.
    assert_eq!(region_events("ra=10:00:00&dec=0&radius=15"), vec!["EastEdge"]);
}

#[test]
fn test_box_includes_point_on_boundary() {
    assert_eq!(
        region_events("ra=09:55:42.14&dec=%2B69:40:26.0&height=1&width=1"),
        vec!["Edge"]
    );
    assert_eq!(region_events("ra=10:00:00&dec=0&width=15"), vec!["EastEdge"]);
    assert!(region_events("ra=10:00:00&dec=0&width=14.9&height=1").is_empty());
}

// ============================================================================
// Aggregation
// ============================================================================

#[test]
fn test_alias_resolution() {
    let result = run("PTF11kly/host", "");
    assert_eq!(events(&result), vec!["SN2011fe"]);
}

#[test]
fn test_alias_containing_plus() {
    let result = run("PSNJ09554214+6940260/host", "");
    assert_eq!(events(&result), vec!["SN2014J"]);
}

#[test]
fn test_local_catalog_copy_preferred() {
    let result = run_with(
        layout::SNE_GRAVEYARD,
        "SN2014J/host",
        "",
        &EngineOptions::default(),
    );
    assert_eq!(values(&result, "value"), vec!["NGC 3034"]);
}

#[test]
fn test_all_scope_merges_copies() {
    let host = run("all/host", "");
    let sn2014j: Vec<String> = host
        .rows
        .iter()
        .filter(|r| r.event == "SN2014J")
        .map(|r| r.observation.get("value").unwrap().to_string())
        .collect();
    assert_eq!(sn2014j, vec!["M82"]);

    let redshift = run("all/redshift", "");
    let count = redshift.rows.iter().filter(|r| r.event == "SN2014J").count();
    assert_eq!(count, 3);

    let discoverer = run("all/discoverer", "");
    assert_eq!(events(&discoverer), vec!["SN2014J"]);
}

#[test]
fn test_all_scope_sorted_case_insensitively() {
    let result = run("all/claimedtype", "");
    assert_eq!(
        events(&result),
        vec!["ASASSN-14lp", "AT2017gfo", "SN1000A", "SN1987A", "SN2011fe", "SN2014J"]
    );
}

#[test]
fn test_detail_rows_cite_sources() {
    let result = run("SN2014J/photometry/magnitude+source", "full");
    assert_eq!(
        values(&result, "source"),
        vec![
            "2014CoSka..44...67T",
            "2014CoSka..44...67T",
            "ATel 5786",
            "ATel 5786"
        ]
    );

    // Summary rows keep their ids.
    let result = run("SN2014J/claimedtype/value+source", "");
    assert_eq!(values(&result, "source"), vec!["1,2", "3"]);
}

#[test]
fn test_full_request_over_event_guard_rejected() {
    let options = EngineOptions {
        limits: ResourceLimits {
            max_full_events: 1,
            max_expensive_events: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let snapshot = snapshot();
    let details = details();
    let engine = QueryEngine::new(&snapshot, &details, &options);

    let parse = |path: &str, query: &str| {
        QueryRequest::parse(layout::SNE, path, &parse_query_string(query), &options.limits).unwrap()
    };
    let err = engine
        .execute(&parse("SN2014J+SN2011fe/redshift", "full"))
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert!(matches!(
        err,
        QueryError::TooExpensive(ResourceLimitExceeded::FullEvents { limit: 1 })
    ));

    let err = engine.execute(&parse("all/spectra/data", "")).unwrap_err();
    assert!(matches!(
        err,
        QueryError::TooExpensive(ResourceLimitExceeded::ExpensiveEvents { limit: 1 })
    ));

    assert!(engine.execute(&parse("SN2014J/spectra/data", "item=0")).is_ok());
}

#[test]
fn test_unknown_event_is_empty_success() {
    let result = run("SN2999zz/redshift", "");
    assert!(result.is_empty());
}

#[test]
fn test_row_limit_flags_truncation() {
    let options = EngineOptions {
        limits: ResourceLimits {
            max_rows: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    let result = run_with(layout::SNE, "all/claimedtype", "", &options);
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.truncation, Some(ResourceLimitExceeded::Rows { limit: 2 }));
}

// ============================================================================
// Output and errors
// ============================================================================

#[test]
fn test_spectrum_data_table() {
    let result = run("SN2014J/spectra/data", "item=1");
    let table = render(&result, OutputFormat::Csv, None).unwrap();
    assert!(table.starts_with("wavelength,flux,e_flux\n3600.0,2.2e-15,1e-17\n"));
}

#[test]
fn test_csv_sorted_by_magnitude() {
    let result = run("SN2014J/photometry/time+magnitude", "");
    let csv = render(&result, OutputFormat::Csv, Some("magnitude")).unwrap();
    let magnitudes: Vec<&str> = csv
        .lines()
        .skip(1)
        .map(|l| l.rsplit(',').next().unwrap())
        .collect();
    assert_eq!(magnitudes, vec!["10.20", "10.45", "10.61", "13.5"]);
}

#[test]
fn test_malformed_requests_rejected() {
    assert!(matches!(parse_error("SN2014J/redshift/", ""), QueryError::BadPath(_)));
    assert!(matches!(
        parse_error("SN2014J/redshift", "radius=abc&ra=1&dec=1"),
        QueryError::InvalidArgumentValue { .. }
    ));
    assert!(matches!(
        parse_error("catalog/host", "ra=25:00:00&dec=0&radius=5"),
        QueryError::InvalidCoordinate(_)
    ));
}
