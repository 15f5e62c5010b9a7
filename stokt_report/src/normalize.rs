//! Expansion of a route's compact `holdsList` (e.g. `"S12 O40 T7"`) into
//! owned, role-tagged copies of the wall's holds.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::HoldCatalog;
use crate::model::{HoldId, HoldRole, NormalizedHold, NormalizedRoute, Route};
use crate::StoktError;

/// How a role character outside `S`, `F`, `O`, `T` is treated.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoleMode {
    /// Reject the route.
    #[default]
    Strict,
    /// Keep the hold as [`HoldRole::Unknown`]; rendering will refuse it.
    Lenient,
}

/// Split one `<role><id>` token.
pub fn parse_token(
    route_id: &str,
    token: &str,
    mode: RoleMode,
) -> Result<(HoldRole, HoldId), StoktError> {
    let format_err = |reason: &str| StoktError::InputFormat {
        route: route_id.to_string(),
        token: token.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = token.chars();
    let role_char = chars.next().ok_or_else(|| format_err("empty token"))?;
    let digits = chars.as_str();
    if digits.is_empty() {
        return Err(format_err("missing hold id after role"));
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format_err("hold id is not a decimal integer"));
    }
    let id: HoldId = digits
        .parse()
        .map_err(|_| format_err("hold id out of range"))?;

    let role = match (HoldRole::from_char(role_char), mode) {
        (Some(role), _) => role,
        (None, RoleMode::Lenient) => HoldRole::Unknown(role_char),
        (None, RoleMode::Strict) => {
            return Err(StoktError::UnknownRole {
                route: route_id.to_string(),
                token: token.to_string(),
                role: role_char,
            })
        }
    };
    Ok((role, id))
}

pub fn normalize_route(
    route: &Route,
    catalog: &HoldCatalog,
    mode: RoleMode,
) -> Result<NormalizedRoute, StoktError> {
    let tokens: Vec<&str> = route.holds_list.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(StoktError::InputFormat {
            route: route.id.clone(),
            token: route.holds_list.clone(),
            reason: "route has no holds".to_string(),
        });
    }

    let mut normalized_holds = Vec::with_capacity(tokens.len());
    for token in tokens {
        let (role, hold_id) = parse_token(&route.id, token, mode)?;
        let hold = catalog
            .get(hold_id)
            .ok_or_else(|| StoktError::UnresolvedHold {
                route: route.id.clone(),
                hold_id,
            })?;
        let mut hold = hold.clone();
        // The role is written as `type`; a wall-side `type` would duplicate the key.
        hold.extra.remove("type");
        normalized_holds.push(NormalizedHold { hold, role });
    }

    Ok(NormalizedRoute {
        route: route.clone(),
        normalized_holds,
    })
}

/// Normalize a whole face's routes, keeping their order.
pub fn normalize_routes(
    routes: Vec<Route>,
    catalog: &HoldCatalog,
    mode: RoleMode,
) -> Result<Vec<NormalizedRoute>, StoktError> {
    let mut seen = HashSet::with_capacity(routes.len());
    let mut out = Vec::with_capacity(routes.len());
    for route in &routes {
        if !seen.insert(route.id.as_str()) {
            return Err(StoktError::DuplicateRoute(route.id.clone()));
        }
        out.push(normalize_route(route, catalog, mode)?);
    }
    debug!(
        "Normalized {} routes against {} holds",
        out.len(),
        catalog.len()
    );
    Ok(out)
}
