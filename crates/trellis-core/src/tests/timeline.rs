use crate::diagrams::timeline::{self, TimelineModel};
use crate::*;

fn parse(text: &str) -> TimelineModel {
    timeline::parse(text, &Config::default()).unwrap()
}

#[test]
fn timeline_periods_collect_events_and_sections() {
    let text = r#"timeline
    title History of Social Media
    2002 : LinkedIn
    section 2000s
    2004 : Facebook : Google
         : Orkut
    2005
    section 2010s
    2010 : Instagram
"#;
    let model = parse(text);
    assert_eq!(model.title.as_deref(), Some("History of Social Media"));
    assert_eq!(model.sections, vec!["2000s", "2010s"]);
    assert_eq!(model.entity_ids(), vec!["period0", "period1", "period2", "period3"]);

    let first = model.period("period0").unwrap();
    assert_eq!(first.label, "2002");
    assert_eq!(first.section, None);
    assert_eq!(model.period("period1").unwrap().events, vec!["Facebook", "Google", "Orkut"]);
    assert!(model.period("period2").unwrap().events.is_empty());

    let later: Vec<_> = model.periods_in("2010s").map(|p| p.label.as_str()).collect();
    assert_eq!(later, vec!["2010"]);
    assert!(model.is_valid());
}

#[test]
fn timeline_colon_inside_event_is_kept() {
    let model = parse("timeline\nMonday : 10:30 standup : lunch\n");
    assert_eq!(model.periods[0].events, vec!["10:30 standup", "lunch"]);
}

#[test]
fn timeline_continuation_without_period_is_error() {
    let err = timeline::parse("timeline\n: orphan\n", &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Canonicalization { notation: "timeline", .. }));
    assert_eq!(err.position().map(|p| p.line), Some(2));
}
