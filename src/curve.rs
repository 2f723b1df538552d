//! Waypoint smoothing: polyline → chain of cubic Bezier segments.
//!
//! Optional consumer-side helper. Feed the waypoints of a successful search
//! through [`points_to_curve`] and evaluate the resulting control chain with
//! [`sample`]; [`arc_length_map`] and [`time_for_distance`] support
//! constant-speed playback along each segment.
use glam::Vec3;
use rustc_hash::FxHashSet;

/// Samples per segment for the arc-length table.
const ARC_RESOLUTION: usize = 100;

/// Converts waypoints into groups of four control points, one group per cubic
/// segment. Duplicate waypoints are dropped first. Interior control points
/// lean along the previous/next segment directions, scaled by
/// `curve_intensity`, which pulls the curve smoothly through each corner.
pub fn points_to_curve(points: &[Vec3], curve_intensity: f32) -> Vec<Vec3> {
    let points = dedup(points);
    let mut curve = Vec::new();

    match points.len() {
        0 => return curve,
        1 => {
            curve.extend([points[0]; 4]);
            return curve;
        }
        2 => {
            curve.extend([points[0], points[0], points[1], points[1]]);
            return curve;
        }
        _ => {}
    }

    // Lead-in: a straight-ish ease out of the exact start point.
    {
        let (a, b, c) = (points[0], points[1], points[2]);
        let dir_ab = (b - a).normalize_or_zero();
        let dir_bc = (c - b).normalize_or_zero();
        let e = b - dir_ab * curve_intensity - dir_bc * curve_intensity;
        curve.extend([a, a, e, b]);
    }

    for window in points.windows(4) {
        let (a, b, c, d) = (window[0], window[1], window[2], window[3]);
        let dir_ab = (b - a).normalize_or_zero();
        let dir_bc = (c - b).normalize_or_zero();
        let dir_cd = (d - c).normalize_or_zero();
        let e = b + dir_ab * curve_intensity + dir_bc * curve_intensity;
        let f = c - dir_cd * curve_intensity - dir_bc * curve_intensity;
        curve.extend([b, e, f, c]);
    }

    // Lead-out into the exact end point.
    {
        let n = points.len();
        let (b, c, d) = (points[n - 3], points[n - 2], points[n - 1]);
        let dir_bc = (c - b).normalize_or_zero();
        let dir_cd = (d - c).normalize_or_zero();
        let f = c + dir_cd * curve_intensity + dir_bc * curve_intensity;
        curve.extend([c, f, d, d]);
    }

    curve
}

fn dedup(points: &[Vec3]) -> Vec<Vec3> {
    let mut seen = FxHashSet::default();
    points
        .iter()
        .copied()
        .filter(|p| seen.insert([p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]))
        .collect()
}

/// Cubic Bezier evaluation; `t` is clamped to `[0, 1]`.
pub fn sample(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t = t.clamp(0.0, 1.0);
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

/// Cumulative `(time, arc_length)` samples over one segment, plus the total
/// segment length. Compute once per segment.
pub fn arc_length_map(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> (Vec<(f32, f32)>, f32) {
    let ratio = 1.0 / ARC_RESOLUTION as f32;
    let mut arc_length = 0.0;
    let mut previous = sample(p0, p1, p2, p3, 0.0);

    let mut map = Vec::with_capacity(ARC_RESOLUTION + 1);
    map.push((0.0, 0.0));

    for i in 1..=ARC_RESOLUTION {
        let t = i as f32 * ratio;
        let current = sample(p0, p1, p2, p3, t);
        arc_length += previous.distance(current);
        map.push((t, arc_length));
        previous = current;
    }

    (map, arc_length)
}

/// Inverse lookup into an [`arc_length_map`]: the `t` at which the segment has
/// covered fraction `u` of `arc_length`. Linear between table samples.
pub fn time_for_distance(map: &[(f32, f32)], arc_length: f32, u: f32) -> f32 {
    let target = u * arc_length;
    let mut low = 0;
    let mut high = 1;
    let mut min = 0.0;
    let mut max = 0.0;

    for (i, &(_, length)) in map.iter().enumerate().skip(1) {
        max = length;
        if target > min && target <= max {
            high = i;
            low = i - 1;
            break;
        }
        min = max;
    }

    let p = if max > min { (target - min) / (max - min) } else { 0.0 };
    let (low_time, _) = map[low];
    let (high_time, _) = map[high];
    low_time + (high_time - low_time) * p
}
