//! Hold usage counts across a route collection.
//!
//! Counts are kept in first-seen order so every ranking below is
//! deterministic: equal counts keep the order in which the holds were first
//! met while walking the routes and their hold lists.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::catalog::HoldCatalog;
use crate::model::{HoldId, NormalizedRoute};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HoldUsage {
    counts: IndexMap<HoldId, usize>,
}

impl HoldUsage {
    pub fn from_routes<'a>(routes: impl IntoIterator<Item = &'a NormalizedRoute>) -> Self {
        let mut counts = IndexMap::new();
        for route in routes {
            for id in route.hold_ids() {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        Self { counts }
    }

    pub fn count(&self, id: HoldId) -> usize {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    /// Hold occurrences across all routes.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HoldId, usize)> + '_ {
        self.counts.iter().map(|(id, n)| (*id, *n))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Used hold ids, most used first.
    pub fn ranked(&self) -> Vec<HoldId> {
        let mut ids: Vec<(HoldId, usize)> = self.iter().collect();
        ids.sort_by(|a, b| b.1.cmp(&a.1));
        ids.into_iter().map(|(id, _)| id).collect()
    }

    pub fn top(&self, n: usize) -> Vec<HoldId> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }

    pub fn used_exactly_once(&self) -> Vec<HoldId> {
        self.iter()
            .filter(|&(_, n)| n == 1)
            .map(|(id, _)| id)
            .collect()
    }

    /// Catalog holds no route uses, in catalog order.
    pub fn unused(&self, catalog: &HoldCatalog) -> Vec<HoldId> {
        catalog
            .ids()
            .filter(|id| !self.counts.contains_key(id))
            .collect()
    }
}

pub fn routes_with_grade<'a>(
    routes: &'a [NormalizedRoute],
    grade: &'a str,
) -> impl Iterator<Item = &'a NormalizedRoute> + 'a {
    routes.iter().filter(move |r| r.grade() == grade)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradePopularity {
    pub grade: String,
    pub route_count: usize,
    pub holds: Vec<(HoldId, usize)>,
}

/// Top `top_n` holds for each grade in `grades`; grades without routes are skipped.
pub fn most_popular_by_grade<S: AsRef<str>>(
    routes: &[NormalizedRoute],
    grades: &[S],
    top_n: usize,
) -> Vec<GradePopularity> {
    grades
        .iter()
        .filter_map(|grade| {
            let grade = grade.as_ref();
            let graded: Vec<&NormalizedRoute> = routes_with_grade(routes, grade).collect();
            if graded.is_empty() {
                return None;
            }
            let usage = HoldUsage::from_routes(graded.iter().copied());
            let holds = usage
                .top(top_n)
                .into_iter()
                .map(|id| (id, usage.count(id)))
                .collect();
            Some(GradePopularity {
                grade: grade.to_string(),
                route_count: graded.len(),
                holds,
            })
        })
        .collect()
}
