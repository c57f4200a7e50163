/// Helper function for evaluating the dot product between two vectors.
/// This implementation expect f64 slices and does not use any kind
/// of SSE operations. The slices are expected to have the same length.
///
/// ## Example
///
/// ```
/// let costs = vec![350.0, 50.0, 0.0];
/// let dispatch = vec![2.0, 4.0, 8.0];
///
/// let total = gridmix_rs::utils::dot_product(&costs, &dispatch);
/// assert_eq!(total, 900.0);
/// ```
pub fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
