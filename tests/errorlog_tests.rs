//! Error log integration tests: append/parse round trip over a real file and
//! the pagination contract (page size cap, append-order concatenation,
//! out-of-range pages).

use std::collections::BTreeMap;

use tempfile::tempdir;

use teamlens::access::AccessMap;
use teamlens::errorlog::{self, ErrorLog, LogFilter, DEFAULT_PAGE_SIZE};

fn mapping() -> AccessMap {
    let mut m = BTreeMap::new();
    m.insert("a@org.com".to_string(), vec!["Agent1".to_string()]);
    m.insert("c@org.com".to_string(), vec!["Agent3".to_string()]);
    AccessMap::from_map(m, &[])
}

#[test]
fn pages_cap_at_page_size_and_concatenate_in_append_order() {
    let tmp = tempdir().unwrap();
    let log = ErrorLog::new(tmp.path().join("error_agent_data.log"));
    for i in 0..53 {
        log.append("ERROR", "E1001", &format!("Login failed: user{i}@org.com")).unwrap();
    }
    let access = mapping();
    let filter = LogFilter::default();

    let mut seen = Vec::new();
    let mut page_no = 0;
    loop {
        let page = errorlog::view(&log, &access, &[], &filter, page_no, DEFAULT_PAGE_SIZE).unwrap();
        if page.is_empty() { break; }
        assert!(page.len() <= DEFAULT_PAGE_SIZE);
        seen.extend(page.into_iter().map(|e| e.message));
        page_no += 1;
    }
    assert_eq!(page_no, 3); // 20 + 20 + 13
    assert_eq!(seen.len(), 53);
    for (i, msg) in seen.iter().enumerate() {
        assert_eq!(msg, &format!("Login failed: user{i}@org.com"), "append order must be preserved");
    }
    // well past the end: empty, not an error
    let far = errorlog::view(&log, &access, &[], &filter, 99, DEFAULT_PAGE_SIZE).unwrap();
    assert!(far.is_empty());
}

#[test]
fn equality_filters_select_the_right_subsequence() {
    let tmp = tempdir().unwrap();
    let log = ErrorLog::new(tmp.path().join("error_agent_data.log"));
    log.append("ERROR", "E1001", "Login failed: a@org.com").unwrap();
    log.append("ERROR", "E2001", "No agents mapped for Agent1").unwrap();
    log.append("ERROR", "E9999", "Report error: Agent3 data missing").unwrap();
    log.append("ERROR", "E1001", "Login failed: x@org.com").unwrap();

    let access = mapping();
    let users = vec!["a@org.com".to_string()];

    let by_code = LogFilter { error_code: Some("E1001".into()), ..Default::default() };
    let hits = errorlog::view(&log, &access, &users, &by_code, 0, DEFAULT_PAGE_SIZE).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|e| e.code == "E1001"));

    let by_agent = LogFilter { agent: Some("Agent3".into()), ..Default::default() };
    let hits = errorlog::view(&log, &access, &users, &by_agent, 0, DEFAULT_PAGE_SIZE).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].supervisor, "c@org.com");

    let by_user = LogFilter { user_email: Some("a@org.com".into()), ..Default::default() };
    let hits = errorlog::view(&log, &access, &users, &by_user, 0, DEFAULT_PAGE_SIZE).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].code, "E1001");

    let by_supervisor = LogFilter { supervisor: Some("a@org.com".into()), ..Default::default() };
    let hits = errorlog::view(&log, &access, &users, &by_supervisor, 0, DEFAULT_PAGE_SIZE).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].agent, "Agent1");
}

#[test]
fn unparseable_lines_are_skipped_not_fatal() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("error_agent_data.log");
    std::fs::write(
        &path,
        "garbage line\n2026-08-07 10:00:00,000 [ERROR] [E1001] Login failed: a@org.com\n\n",
    )
    .unwrap();
    let log = ErrorLog::new(&path);
    let entries = errorlog::view(&log, &mapping(), &[], &LogFilter::default(), 0, DEFAULT_PAGE_SIZE).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].code, "E1001");
}

#[test]
fn appended_lines_parse_back_with_timestamp_and_level() {
    let tmp = tempdir().unwrap();
    let log = ErrorLog::new(tmp.path().join("error_agent_data.log"));
    log.append("ERROR", "E9101", "Tableau sign-in failed").unwrap();
    let lines = log.read_lines().unwrap();
    assert_eq!(lines.len(), 1);
    let (ts, level, rest) = errorlog::parse_line(&lines[0]).expect("own format must parse");
    assert_eq!(level, "ERROR");
    assert!(rest.starts_with("[E9101]"));
    // timestamp carries comma-separated milliseconds
    assert!(ts.contains(','), "timestamp format: {ts}");
}
