//! Hold-inclusion distance between routes and the "most similar route"
//! report built on top of it.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{HoldId, NormalizedRoute, RankedRoute};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimilarityMessage {
    pub distance: usize,
    pub route_id: String,
    pub neighbor_id: String,
    pub text: String,
}

fn hold_set(route: &NormalizedRoute) -> HashSet<HoldId> {
    route.hold_ids().collect()
}

/// Number of hold ids used by exactly one of the two routes.
pub fn distance(a: &NormalizedRoute, b: &NormalizedRoute) -> usize {
    hold_set(a).symmetric_difference(&hold_set(b)).count()
}

/// For each route, every other route ordered by ascending distance. Ties keep
/// collection order.
pub fn rank_routes(routes: &[NormalizedRoute]) -> Vec<RankedRoute> {
    let sets: Vec<HashSet<HoldId>> = routes.iter().map(hold_set).collect();
    routes
        .iter()
        .enumerate()
        .map(|(i, route)| {
            let mut ranking: Vec<(String, usize)> = routes
                .iter()
                .enumerate()
                .filter(|(_, other)| other.id() != route.id())
                .map(|(j, other)| {
                    let d = sets[i].symmetric_difference(&sets[j]).count();
                    (other.id().to_string(), d)
                })
                .collect();
            ranking.sort_by_key(|(_, d)| *d);
            RankedRoute {
                route_id: route.id().to_string(),
                ranking,
            }
        })
        .collect()
}

/// Walk routes in order and report each one's nearest neighbour.
///
/// When the neighbour's own nearest route is the current one, the neighbour
/// is marked as handled and will not produce its own (mirrored) line. This is
/// a greedy pass, not a matching: a route may be the nearest neighbour of
/// several others and appear in several lines.
pub fn mutual_pairs(routes: &[NormalizedRoute], ranked: &[RankedRoute]) -> Vec<SimilarityMessage> {
    let by_id: HashMap<&str, &NormalizedRoute> = routes.iter().map(|r| (r.id(), r)).collect();
    let nearest: HashMap<&str, (&str, usize)> = ranked
        .iter()
        .filter_map(|r| r.nearest().map(|n| (r.route_id.as_str(), n)))
        .collect();

    let mut already_processed: HashSet<&str> = HashSet::new();
    let mut messages = Vec::new();
    for route in routes {
        if already_processed.contains(route.id()) {
            continue;
        }
        let Some(&(neighbor_id, d)) = nearest.get(route.id()) else {
            continue;
        };
        let Some(neighbor) = by_id.get(neighbor_id) else {
            continue;
        };
        if nearest.get(neighbor_id).map(|(id, _)| *id) == Some(route.id()) {
            already_processed.insert(neighbor_id);
        }
        messages.push(SimilarityMessage {
            distance: d,
            route_id: route.id().to_string(),
            neighbor_id: neighbor_id.to_string(),
            text: format!(
                "{} ({}) is most hold-similar to {} ({}) with hold-inclusion distance {}",
                route.name(),
                route.grade(),
                neighbor.name(),
                neighbor.grade(),
                d
            ),
        });
    }
    messages.sort_by_key(|m| m.distance);
    messages
}

pub fn similarity_report(routes: &[NormalizedRoute]) -> Vec<SimilarityMessage> {
    let ranked = rank_routes(routes);
    mutual_pairs(routes, &ranked)
}
