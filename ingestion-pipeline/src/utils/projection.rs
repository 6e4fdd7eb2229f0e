//! Two-component principal projection used for the document map.

use common::error::AppError;

pub type Point2D = [f32; 2];

/// Projects every vector onto the two leading principal axes of the set.
///
/// The axes are found by power iteration on the implicit covariance matrix, so
/// memory stays at O(dimension) beyond the input. Output order matches input order.
pub fn principal_projection(vectors: &[Vec<f32>], iterations: usize) -> Result<Vec<Point2D>, AppError> {
    let Some(first) = vectors.first() else {
        return Ok(Vec::new());
    };
    let dimension = first.len();
    if dimension == 0 {
        return Err(AppError::Clustering("cannot project zero-length vectors".into()));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(AppError::Clustering(format!(
            "mixed embedding dimensions: {} and {}",
            dimension,
            bad.len()
        )));
    }

    let mean = mean_vector(vectors, dimension);
    let centered: Vec<Vec<f32>> = vectors
        .iter()
        .map(|v| v.iter().zip(&mean).map(|(x, m)| x - m).collect())
        .collect();

    let first_axis = leading_axis(&centered, dimension, iterations, None);
    let second_axis = leading_axis(&centered, dimension, iterations, first_axis.as_deref());

    Ok(centered
        .iter()
        .map(|row| {
            [
                first_axis.as_deref().map_or(0.0, |axis| dot(row, axis)),
                second_axis.as_deref().map_or(0.0, |axis| dot(row, axis)),
            ]
        })
        .collect())
}

fn mean_vector(vectors: &[Vec<f32>], dimension: usize) -> Vec<f32> {
    let mut mean = vec![0.0f32; dimension];
    for vector in vectors {
        for (acc, value) in mean.iter_mut().zip(vector) {
            *acc += value;
        }
    }
    let count = vectors.len() as f32;
    for value in &mut mean {
        *value /= count;
    }
    mean
}

/// Power iteration for the dominant axis, optionally orthogonal to `exclude`.
/// Returns `None` when the data has no variance left along any remaining axis.
fn leading_axis(
    rows: &[Vec<f32>],
    dimension: usize,
    iterations: usize,
    exclude: Option<&[f32]>,
) -> Option<Vec<f32>> {
    // Deterministic, non-degenerate starting direction.
    let mut axis: Vec<f32> = (0..dimension)
        .map(|j| 1.0 + (j as f32 * 0.618_034).fract())
        .collect();
    if let Some(excluded) = exclude {
        orthogonalize(&mut axis, excluded);
    }
    normalize(&mut axis)?;

    for _ in 0..iterations.max(1) {
        let mut next = vec![0.0f32; dimension];
        for row in rows {
            let weight = dot(row, &axis);
            for (acc, value) in next.iter_mut().zip(row) {
                *acc += weight * value;
            }
        }
        if let Some(excluded) = exclude {
            orthogonalize(&mut next, excluded);
        }
        normalize(&mut next)?;
        axis = next;
    }

    Some(axis)
}

fn orthogonalize(vector: &mut [f32], against: &[f32]) {
    let projection = dot(vector, against);
    for (value, basis) in vector.iter_mut().zip(against) {
        *value -= projection * basis;
    }
}

fn normalize(vector: &mut [f32]) -> Option<()> {
    let norm = dot(vector, vector).sqrt();
    if norm <= f32::EPSILON {
        return None;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
    Some(())
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_projects_to_nothing() {
        assert!(principal_projection(&[], 10).expect("empty ok").is_empty());
    }

    #[test]
    fn output_is_aligned_with_input() {
        let vectors = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![1.0, 1.0, 0.0],
        ];
        let points = principal_projection(&vectors, 32).expect("projection");
        assert_eq!(points.len(), vectors.len());
        assert!(points.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn collinear_points_spread_on_first_axis() {
        let vectors: Vec<Vec<f32>> = (0..5).map(|i| vec![i as f32, 2.0 * i as f32]).collect();
        let points = principal_projection(&vectors, 32).expect("projection");

        let first: Vec<f32> = points.iter().map(|p| p[0].abs()).collect();
        let second: Vec<f32> = points.iter().map(|p| p[1].abs()).collect();
        assert!(first.iter().any(|v| *v > 1.0));
        assert!(second.iter().all(|v| *v < 1e-3));
    }

    #[test]
    fn identical_points_collapse_to_origin() {
        let vectors = vec![vec![0.3, 0.3]; 4];
        let points = principal_projection(&vectors, 8).expect("projection");
        assert!(points.iter().all(|p| p[0].abs() < 1e-6 && p[1].abs() < 1e-6));
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let err = principal_projection(&[vec![1.0, 2.0], vec![1.0]], 8).expect_err("mismatch");
        assert!(matches!(err, AppError::Clustering(_)));
    }
}
