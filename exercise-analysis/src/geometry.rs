//! Joint-angle computation and signal smoothing over raw keypoints.

use gym_types::Keypoint;

const VISIBILITY_THRESHOLD: f64 = 0.3;

/// Degree measure of the angle at vertex `b` of triangle `a-b-c`, in `[0, 180]`.
///
/// Computed via the cosine rule on `a-b` and `c-b`; the dot-product ratio is
/// clamped to `[-1, 1]` before `acos` to tolerate floating-point drift. If
/// either vector's magnitude is below `1e-9`, returns `0.0`.
pub fn angle(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    let ba = (a.0 - b.0, a.1 - b.1);
    let bc = (c.0 - b.0, c.1 - b.1);

    let mag_ba = (ba.0 * ba.0 + ba.1 * ba.1).sqrt();
    let mag_bc = (bc.0 * bc.0 + bc.1 * bc.1).sqrt();
    if mag_ba < 1e-9 || mag_bc < 1e-9 {
        return 0.0;
    }

    let dot = ba.0 * bc.0 + ba.1 * bc.1;
    let cos_theta = (dot / (mag_ba * mag_bc)).clamp(-1.0, 1.0);
    cos_theta.acos().to_degrees()
}

/// Angle at keypoint `b_idx` of the triangle `a_idx-b_idx-c_idx`, or `None` if
/// any index is out of range or any referenced keypoint has
/// `visibility < 0.3`.
pub fn joint_angle(keypoints: &[Keypoint], a_idx: usize, b_idx: usize, c_idx: usize) -> Option<f64> {
    let a = keypoints.get(a_idx)?;
    let b = keypoints.get(b_idx)?;
    let c = keypoints.get(c_idx)?;
    if a.visibility < VISIBILITY_THRESHOLD
        || b.visibility < VISIBILITY_THRESHOLD
        || c.visibility < VISIBILITY_THRESHOLD
    {
        return None;
    }
    Some(angle((a.x, a.y), (b.x, b.y), (c.x, c.y)))
}

/// Median of the most recent up to `n` samples in `series` (last element is
/// newest). Even count averages the two middle values; empty input is `0.0`.
pub fn median_of_last_n(series: &[f64], n: usize) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let start = series.len().saturating_sub(n);
    let mut window: Vec<f64> = series[start..].to_vec();
    window.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let len = window.len();
    if len % 2 == 1 {
        window[len / 2]
    } else {
        (window[len / 2 - 1] + window[len / 2]) / 2.0
    }
}
