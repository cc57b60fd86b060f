use statrs::statistics::Statistics;

// --------------------------------------------------------
//  Rank and linear correlation
// --------------------------------------------------------

/// Spearman's rho: Pearson correlation of the average ranks.
///
/// `None` when the inputs differ in length, hold fewer than two values,
/// or one side has no variance.
pub fn spearman_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let rx = rank_data(x);
    let ry = rank_data(y);
    pearson_correlation(&rx, &ry)
}

/// 1-based ranks; tied values share the mean of the ranks they span.
pub fn rank_data(vals: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..vals.len()).collect();
    order.sort_by(|&a, &b| vals[a].total_cmp(&vals[b]));

    let mut ranks = vec![0.0; vals.len()];
    let mut below = 0;
    for tie in order.chunk_by(|&a, &b| vals[a] == vals[b]) {
        let rank = below as f64 + (tie.len() as f64 + 1.0) / 2.0;
        for &i in tie {
            ranks[i] = rank;
        }
        below += tie.len();
    }
    ranks
}

/// Sample covariance over the product of sample standard deviations.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() < 2 || x.len() != y.len() {
        return None;
    }
    let (sd_x, sd_y) = (x.std_dev(), y.std_dev());
    if sd_x == 0.0 || sd_y == 0.0 {
        return None;
    }
    Some(x.covariance(y) / (sd_x * sd_y))
}
