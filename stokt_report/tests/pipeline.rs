//! End-to-end pass over service-shaped JSON.

use serde_json::json;
use stokt_report::{
    html, most_popular_by_grade, prepare, similarity_report, HoldRole, HoldUsage, NormalizedRoute,
    RoleMode, Route, StoktError, WallConfig,
};

fn wall() -> WallConfig {
    serde_json::from_value(json!({
        "holds": [
            {"id": 1, "polygonStr": "0,0 10,0 10,10", "color": "red"},
            {"id": 2, "polygonStr": "20,0 30,0 30,10"},
            {"id": 3, "polygonStr": "40,0 50,0 50,10"},
            {"id": 4, "polygonStr": "60,0 70,0 70,10"}
        ],
        "picture": {"name": "faces/wall.jpg", "width": 800, "height": 600}
    }))
    .unwrap()
}

fn routes() -> Vec<Route> {
    serde_json::from_value(json!([
        {"id": "a", "name": "Alpha", "crowdGrade": {"hueco": "V2"}, "holdsList": "S1 T2"},
        {"id": "b", "name": "Bravo", "crowdGrade": {"hueco": "V2"}, "holdsList": "S2 F3 T2"},
        {"id": "c", "name": "Charlie", "crowdGrade": {"hueco": "V5"}, "holdsList": "S2"}
    ]))
    .unwrap()
}

#[test]
fn normalizes_and_reports() {
    let (catalog, normalized) = prepare(&wall(), routes(), RoleMode::Strict).unwrap();
    assert_eq!(catalog.len(), 4);
    assert_eq!(normalized.len(), 3);
    assert_eq!(normalized[1].normalized_holds[1].role, HoldRole::Foot);
    assert_eq!(
        normalized[0].normalized_holds[0].hold.extra["color"],
        json!("red")
    );

    let usage = HoldUsage::from_routes(&normalized);
    assert_eq!(usage.ranked(), vec![2, 1, 3]);
    assert_eq!(usage.unused(&catalog), vec![4]);
    assert_eq!(usage.used_exactly_once(), vec![1, 3]);

    let by_grade = most_popular_by_grade(&normalized, &["V2", "V5"], 10);
    assert_eq!(by_grade.len(), 2);
    assert_eq!(by_grade[1].holds, vec![(2, 1)]);

    // a={1,2} b={2,3} c={2}: a->c(1), b->c(1), c->a(1)
    let messages = similarity_report(&normalized);
    let pairs: Vec<(&str, &str)> = messages
        .iter()
        .map(|m| (m.route_id.as_str(), m.neighbor_id.as_str()))
        .collect();
    assert_eq!(pairs, vec![("a", "c"), ("b", "c")]);

    let report = html::append_similarity("<html><body>", &messages).unwrap();
    assert!(report.contains("Alpha (V2) is most hold-similar to Charlie (V5)"));
    assert!(report.ends_with("</ul></body></html>"));
}

#[test]
fn normalized_json_keeps_route_fields() {
    let (_, normalized) = prepare(&wall(), routes(), RoleMode::Strict).unwrap();
    let text = serde_json::to_string_pretty(&normalized).unwrap();
    let back: Vec<NormalizedRoute> = serde_json::from_str(&text).unwrap();
    assert_eq!(back, normalized);
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value[0]["crowdGrade"]["hueco"], json!("V2"));
    assert_eq!(value[0]["normalizedHolds"][1]["type"], json!("T"));
}

#[test]
fn unresolved_hold_aborts() {
    let mut routes = routes();
    routes[2].holds_list = "S2 T99".into();
    let err = prepare(&wall(), routes, RoleMode::Strict).unwrap_err();
    assert_eq!(
        err,
        StoktError::UnresolvedHold {
            route: "c".into(),
            hold_id: 99
        }
    );
}
