use ndarray::ArrayView2;

/// Compute the mean point of a set of 2-D vectors given as an `(n, 2)` view.
pub fn centroid(vectors: ArrayView2<f32>) -> [f32; 2] {
    let n_rows = vectors.nrows();
    if n_rows == 0 {
        return [f32::NAN, f32::NAN];
    }
    let mut sum = [0.0f32; 2];
    for row in vectors.outer_iter() {
        sum[0] += row[0];
        sum[1] += row[1];
    }
    [sum[0] / n_rows as f32, sum[1] / n_rows as f32]
}

/// Compute the root-mean-square deviation of a set of 2-D vectors from their centroid.
///
/// Applied to agent positions this measures the spatial spread of the swarm,
/// applied to agent velocities it measures how far the swarm is from a common
/// heading. Returns 0.0 for a single vector.
pub fn dispersion(vectors: ArrayView2<f32>) -> f32 {
    let n_rows = vectors.nrows();
    if n_rows == 0 {
        return f32::NAN;
    }
    let center = centroid(vectors);
    let diff_2_sum: f32 = vectors
        .outer_iter()
        .map(|row| (row[0] - center[0]).powi(2) + (row[1] - center[1]).powi(2))
        .sum();
    (diff_2_sum / n_rows as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn centroid_of_symmetric_points_is_origin() {
        let vectors = array![[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]];
        let center = centroid(vectors.view());
        assert!(center[0].abs() < 1e-6);
        assert!(center[1].abs() < 1e-6);
    }

    #[test]
    fn dispersion_of_unit_circle_points_is_one() {
        let vectors = array![[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]];
        assert!((dispersion(vectors.view()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dispersion_of_single_point_is_zero() {
        let vectors = array![[3.0, -2.0]];
        assert_eq!(dispersion(vectors.view()), 0.0);
    }
}
