//! Core board-climbing report library: hold catalog, route normalization,
//! route similarity and hold popularity.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod catalog;
pub mod geometry;
pub mod html;
pub mod model;
pub mod normalize;
pub mod popularity;
pub mod similarity;

pub use catalog::HoldCatalog;
pub use geometry::{bounding_box, parse_polygon, BoundingBox};
pub use model::{
    CrowdGrade, Hold, HoldId, HoldRole, NormalizedHold, NormalizedRoute, Picture, RankedRoute,
    Route, WallConfig,
};
pub use normalize::{normalize_route, normalize_routes, parse_token, RoleMode};
pub use popularity::{most_popular_by_grade, routes_with_grade, GradePopularity, HoldUsage};
pub use similarity::{distance, mutual_pairs, rank_routes, similarity_report, SimilarityMessage};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoktError {
    #[error("route {route}: malformed hold token '{token}': {reason}")]
    InputFormat {
        route: String,
        token: String,
        reason: String,
    },
    #[error("route {route}: hold {hold_id} is not on the wall")]
    UnresolvedHold { route: String, hold_id: HoldId },
    #[error("route {route}: unknown hold role '{role}' in token '{token}'")]
    UnknownRole {
        route: String,
        token: String,
        role: char,
    },
    #[error("hold {hold_id} has role '{role}' which has no drawing style")]
    UnrenderableRole { hold_id: HoldId, role: char },
    #[error("duplicate hold id {0} in wall configuration")]
    DuplicateHold(HoldId),
    #[error("duplicate route id {0} in route collection")]
    DuplicateRoute(String),
    #[error("invalid polygon for hold {hold_id}: {reason}")]
    InvalidPolygon { hold_id: HoldId, reason: String },
    #[error("report already contains a similarity section; clear it before regenerating")]
    ReportAlreadyContainsSimilarity,
}

/// Grades the per-grade popularity report walks, in display order.
pub const DEFAULT_GRADES: [&str; 20] = [
    "V1", "V2", "V3", "V4", "V5", "V6", "V7", "V8", "V9", "V10", "V11", "V12", "V13", "V14",
    "V15", "V16", "V17", "V18", "V19", "V20",
];

/// Tunables for one reporting run. Every field has a default so a partial
/// JSON override file is enough to change a single knob.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportParams {
    pub routes_file: String,
    pub wall_config_file: String,
    pub wall_image_file: String,
    pub normalized_file: String,
    pub report_file: String,
    pub popularity_csv_file: String,
    pub all_routes_dir: String,
    pub grades: Vec<String>,
    pub top_sizes: Vec<usize>,
    pub grade_top_n: usize,
    pub role_mode: RoleMode,
    pub stroke_width: u32,
    pub background_alpha: f64,
    pub title_size: u32,
}

impl Default for ReportParams {
    fn default() -> Self {
        Self {
            routes_file: "routes.json".to_string(),
            wall_config_file: "wall_config.json".to_string(),
            wall_image_file: "wall.jpg".to_string(),
            normalized_file: "routes_normalized.json".to_string(),
            report_file: "report.html".to_string(),
            popularity_csv_file: "hold_popularity.csv".to_string(),
            all_routes_dir: "all_routes".to_string(),
            grades: DEFAULT_GRADES.iter().map(|g| g.to_string()).collect(),
            top_sizes: vec![1, 5, 10],
            grade_top_n: 10,
            role_mode: RoleMode::Strict,
            stroke_width: 7,
            background_alpha: 0.8,
            title_size: 72,
        }
    }
}

/// Load the catalog and normalize a whole route collection in one step.
pub fn prepare(
    wall: &WallConfig,
    routes: Vec<Route>,
    mode: RoleMode,
) -> Result<(HoldCatalog, Vec<NormalizedRoute>), StoktError> {
    let catalog = HoldCatalog::from_wall(wall)?;
    let normalized = normalize_routes(routes, &catalog, mode)?;
    Ok((catalog, normalized))
}
