use crate::model::Hold;
use crate::StoktError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Parse a hold's `polygonStr` (`"x,y x,y ..."`, image pixel coordinates).
pub fn parse_polygon(hold: &Hold) -> Result<Vec<(f64, f64)>, StoktError> {
    let invalid = |reason: String| StoktError::InvalidPolygon {
        hold_id: hold.id,
        reason,
    };

    let mut points = Vec::new();
    for pair in hold.polygon_str.split_whitespace() {
        let (x, y) = pair
            .split_once(',')
            .ok_or_else(|| invalid(format!("point '{pair}' is not 'x,y'")))?;
        let x: f64 = x
            .trim()
            .parse()
            .map_err(|_| invalid(format!("bad x coordinate in '{pair}'")))?;
        let y: f64 = y
            .trim()
            .parse()
            .map_err(|_| invalid(format!("bad y coordinate in '{pair}'")))?;
        if !x.is_finite() || !y.is_finite() {
            return Err(invalid(format!("non-finite coordinate in '{pair}'")));
        }
        points.push((x, y));
    }
    if points.len() < 2 {
        return Err(invalid(format!("{} points, need at least 2", points.len())));
    }
    Ok(points)
}

pub fn bounding_box(points: &[(f64, f64)]) -> Option<BoundingBox> {
    let (&(x0, y0), rest) = points.split_first()?;
    Some(rest.iter().fold(
        BoundingBox {
            min_x: x0,
            min_y: y0,
            max_x: x0,
            max_y: y0,
        },
        |b, &(x, y)| BoundingBox {
            min_x: b.min_x.min(x),
            min_y: b.min_y.min(y),
            max_x: b.max_x.max(x),
            max_y: b.max_y.max(y),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_point_pairs() {
        let hold = Hold::new(4, "10,20 30.5,40\n50,60");
        let points = parse_polygon(&hold).unwrap();
        assert_eq!(points, vec![(10.0, 20.0), (30.5, 40.0), (50.0, 60.0)]);
        let bbox = bounding_box(&points).unwrap();
        assert_eq!((bbox.min_x, bbox.max_y), (10.0, 60.0));
    }

    #[test]
    fn rejects_malformed_points() {
        for bad in ["", "10,20", "10;20 1,2", "a,1 2,3", "1,2 3,"] {
            let err = parse_polygon(&Hold::new(9, bad)).unwrap_err();
            assert!(
                matches!(err, StoktError::InvalidPolygon { hold_id: 9, .. }),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn empty_bbox() {
        assert!(bounding_box(&[]).is_none());
    }
}
