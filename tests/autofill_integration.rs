//! End-to-end fills against saved portal markup.
//!
//! Run with: cargo test --test autofill_integration

use std::sync::Arc;
use std::time::Duration;
use url::Url;

use portal_autofill::autofill::{Autofill, FieldStatus, FillOptions, ProfileRegistry, SiteProfile};
use portal_autofill::dom::{parse_html, Document, EventKind};
use portal_autofill::payload::{now_millis, AutofillPayload, Mailbox, PayloadSource};
use portal_autofill::selector::{self, Selector};

const TORRENT_URL: &str = "https://connect.torrentpower.com/tplcp/application/namechangerequest";

fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {}", path, e))
}

fn profile(host: &str) -> Arc<SiteProfile> {
    ProfileRegistry::builtin()
        .unwrap()
        .for_host(host)
        .unwrap_or_else(|| panic!("no builtin profile for {}", host))
}

fn torrent_payload() -> AutofillPayload {
    AutofillPayload::from_pairs([
        ("city", "Ahmedabad"),
        ("service_number", "3012345678"),
        ("t_number", "T-4471"),
        ("mobile", "9876543210"),
        ("email", "citizen@example.com"),
    ])
    .stamped(now_millis())
}

fn value_at(doc: &Document, css: &str) -> String {
    let selector = Selector::parse(css).unwrap();
    let node = selector
        .first_match(doc)
        .unwrap_or_else(|| panic!("nothing matches {}", css));
    doc.value(node).unwrap_or_default().to_string()
}

// ============================================================================
// Torrent Power name change form
// ============================================================================

#[tokio::test]
async fn test_full_payload_fills_every_field() {
    let profile = profile("connect.torrentpower.com");
    let mut doc = parse_html(&fixture("torrent_power_form.html"));

    let report = Autofill::new(&profile, FillOptions::for_profile(&profile))
        .fill(&mut doc, &torrent_payload(), Some(PayloadSource::Mailbox), None)
        .await;

    assert_eq!(report.summary(), "5/5");
    assert!(report.is_success());
    assert_eq!(value_at(&doc, r#"select[name="city"]"#), "Ahmedabad");
    assert_eq!(value_at(&doc, r#"input[name="serviceNo"]"#), "3012345678");
    assert_eq!(value_at(&doc, r#"input[name="tno"]"#), "T-4471");
    assert_eq!(value_at(&doc, r#"input[name="mobileNo"]"#), "9876543210");
    assert_eq!(value_at(&doc, r#"input[name="emailId"]"#), "citizen@example.com");

    // The primary selectors win on real markup; positional fallbacks stay unused
    let service = report.field("service_number").unwrap();
    assert_eq!(
        service.selector.as_deref(),
        Some(r#"input[placeholder*="Service Number"]"#)
    );
}

#[tokio::test]
async fn test_missing_email_reports_four_of_five() {
    let profile = profile("connect.torrentpower.com");
    let mut doc = parse_html(&fixture("torrent_power_form.html"));
    let mut payload = torrent_payload();
    payload.retain_fields(&["city", "service_number", "t_number", "mobile"]);

    let report = Autofill::new(&profile, FillOptions::for_profile(&profile))
        .fill(&mut doc, &payload, None, None)
        .await;

    assert_eq!(report.summary(), "4/5");
    let lines: Vec<String> = report.successes().map(|r| r.status_line()).collect();
    assert_eq!(
        lines,
        vec![
            "✅ City: Ahmedabad",
            "✅ Service Number: 3012345678",
            "✅ T Number: T-4471",
            "✅ Mobile: 9876543210",
        ]
    );
    assert_eq!(report.field("email").unwrap().status, FieldStatus::NoValue);
    assert_eq!(value_at(&doc, r#"input[name="emailId"]"#), "");
}

#[tokio::test]
async fn test_lowercase_city_selects_option() {
    let profile = profile("connect.torrentpower.com");
    let mut doc = parse_html(&fixture("torrent_power_form.html"));
    let mut payload = torrent_payload();
    payload.insert("city", "ahmedabad");

    let report = Autofill::new(&profile, FillOptions::for_profile(&profile))
        .fill(&mut doc, &payload, None, None)
        .await;

    let city = report.field("city").unwrap();
    assert_eq!(city.status, FieldStatus::Filled);
    assert_eq!(city.value.as_deref(), Some("Ahmedabad"));
    assert_eq!(value_at(&doc, r#"select[name="city"]"#), "Ahmedabad");
}

#[tokio::test]
async fn test_events_bubble_in_order() {
    let profile = profile("connect.torrentpower.com");
    let mut doc = parse_html(&fixture("torrent_power_form.html"));

    Autofill::new(&profile, FillOptions::for_profile(&profile))
        .fill(&mut doc, &torrent_payload(), None, None)
        .await;

    let form = Selector::parse("form#name-change")
        .unwrap()
        .first_match(&doc)
        .unwrap();
    let mobile = Selector::parse(r#"input[name="mobileNo"]"#)
        .unwrap()
        .first_match(&doc)
        .unwrap();

    let kinds: Vec<EventKind> = doc
        .events()
        .iter()
        .filter(|e| e.target == mobile)
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds, vec![EventKind::Input, EventKind::Change, EventKind::Blur]);
    assert!(doc
        .events()
        .iter()
        .filter(|e| e.target == mobile)
        .all(|e| e.bubbles && e.path.contains(&form)));
}

#[tokio::test]
async fn test_refill_is_idempotent() {
    let profile = profile("connect.torrentpower.com");
    let mut doc = parse_html(&fixture("torrent_power_form.html"));
    let autofill = Autofill::new(&profile, FillOptions::for_profile(&profile));

    let first = autofill.fill(&mut doc, &torrent_payload(), None, None).await;
    let values: Vec<String> = doc.form_controls().into_iter().map(|c| c.value).collect();
    let second = autofill.fill(&mut doc, &torrent_payload(), None, None).await;
    let again: Vec<String> = doc.form_controls().into_iter().map(|c| c.value).collect();

    assert_eq!(first.summary(), second.summary());
    assert_eq!(values, again);
}

// ============================================================================
// Data sources
// ============================================================================

#[tokio::test]
async fn test_mailbox_payload_consumed_once() {
    let profile = profile("connect.torrentpower.com");
    let mailbox = Mailbox::new();
    mailbox.put(
        &profile.storage_key,
        torrent_payload(),
        profile.freshness_window(),
    );
    let url = Url::parse(TORRENT_URL).unwrap();
    let autofill = Autofill::new(&profile, FillOptions::for_profile(&profile));

    let mut doc = parse_html(&fixture("torrent_power_form.html"));
    let report = autofill
        .run(&mut doc, &url, &mailbox, None, None)
        .await
        .unwrap()
        .expect("first run finds the mailbox payload");
    assert_eq!(report.source, Some(PayloadSource::Mailbox));
    assert_eq!(report.summary(), "5/5");

    let mut reloaded = parse_html(&fixture("torrent_power_form.html"));
    let second = autofill
        .run(&mut reloaded, &url, &mailbox, None, None)
        .await
        .unwrap();
    assert!(second.is_none());
    assert_eq!(value_at(&reloaded, r#"input[name="serviceNo"]"#), "");
}

#[tokio::test]
async fn test_stale_mailbox_payload_is_discarded() {
    let profile = profile("connect.torrentpower.com");
    let mailbox = Mailbox::new();
    let eleven_minutes_ago = now_millis() - Duration::from_secs(11 * 60).as_millis() as i64;
    mailbox.put(
        &profile.storage_key,
        torrent_payload().stamped(eleven_minutes_ago),
        profile.freshness_window(),
    );

    let mut doc = parse_html(&fixture("torrent_power_form.html"));
    let report = Autofill::new(&profile, FillOptions::for_profile(&profile))
        .run(&mut doc, &Url::parse(TORRENT_URL).unwrap(), &mailbox, None, None)
        .await
        .unwrap();

    assert!(report.is_none());
    assert!(!mailbox.contains(&profile.storage_key));
    assert_eq!(value_at(&doc, r#"input[name="mobileNo"]"#), "");
}

#[tokio::test]
async fn test_query_payload_on_guvnl_login() {
    let profile = profile("portal.guvnl.in");
    let mut doc = parse_html(&fixture("guvnl_login.html"));
    let url = Url::parse("https://portal.guvnl.in/login.php?mobile=9876543210&discom=DGVCL").unwrap();

    let report = Autofill::new(&profile, FillOptions::for_profile(&profile))
        .run(&mut doc, &url, &Mailbox::new(), None, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.source, Some(PayloadSource::Query));
    assert_eq!(report.summary(), "2/2");
    assert_eq!(value_at(&doc, "select#discom"), "DGVCL");
    assert_eq!(value_at(&doc, "input#mobile"), "9876543210");
}

#[tokio::test]
async fn test_guvnl_query_needs_both_fields() {
    let profile = profile("portal.guvnl.in");
    let mut doc = parse_html(&fixture("guvnl_login.html"));
    let url = Url::parse("https://portal.guvnl.in/login.php?mobile=9876543210").unwrap();

    let report = Autofill::new(&profile, FillOptions::for_profile(&profile))
        .run(&mut doc, &url, &Mailbox::new(), None, None)
        .await
        .unwrap();
    assert!(report.is_none());
}

#[test]
fn test_positional_fallback_on_bare_inputs() {
    let profile = profile("connect.torrentpower.com");
    let doc = parse_html(
        r#"<body><select></select><input type="text"><input type="text"><input type="text"></body>"#,
    );
    let inputs = Selector::parse(r#"input[type="text"]"#).unwrap().match_all(&doc);

    let t_number = profile.field("t_number").unwrap();
    let resolved = selector::resolve(&doc, &t_number.selectors).unwrap();
    assert_eq!(resolved.node, inputs[1]);
    assert_eq!(resolved.rank, t_number.selectors.len() - 1);
}
