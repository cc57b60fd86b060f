use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;

use anyhow::{anyhow, Result};
use plotters::prelude::*;
use tracing::{info, warn};

use crate::analysis::per_residue::CorrPerResidue;
use crate::analysis::stability::StabilityPaths;
use crate::constants::{CONTOUR_BINS, FONT_FAMILY, FONT_SIZE_AXIS, PLOT_HEIGHT, PLOT_WIDTH};
use crate::models::ModelType;

// --------------------------------------------------------
//  Colours
// --------------------------------------------------------
const INDIAN_RED: RGBColor = RGBColor(205, 92, 92);
const MAROON: RGBColor = RGBColor(128, 0, 0);
const LIGHT_SALMON: RGBColor = RGBColor(255, 160, 122);
const REF_GREEN: RGBColor = RGBColor(0, 128, 0);
const DARK_RED: RGBColor = RGBColor(139, 0, 0);

/// Each residue type occupies this many x units: three bars and a gap.
const SLOTS_PER_RESIDUE: i32 = 4;

fn plot_err<E: Display>(e: E) -> anyhow::Error {
    anyhow!("plotting failed: {e}")
}

/// Position on the white → dark blue ramp for `t` in `[0, 1]`.
pub fn blues(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(lerp(247, 8), lerp(251, 48), lerp(255, 107))
}

/// Splits the straight line `from → to` into `n_dashes` dashes with equal gaps.
pub fn dashes(from: (f64, f64), to: (f64, f64), n_dashes: usize) -> Vec<[(f64, f64); 2]> {
    let pieces = (2 * n_dashes).max(1) as f64;
    let at = |k: f64| {
        (
            from.0 + (to.0 - from.0) * k / pieces,
            from.1 + (to.1 - from.1) * k / pieces,
        )
    };
    (0..n_dashes)
        .map(|d| [at(2.0 * d as f64), at(2.0 * d as f64 + 1.0)])
        .collect()
}

// --------------------------------------------------------
//  Per-residue correlation bars
// --------------------------------------------------------

/// Residue types ordered by `model`'s correlation, best first; undefined correlations go last.
pub fn residues_by_correlation(corr: &CorrPerResidue, model: ModelType) -> Vec<char> {
    let Some(per_res) = corr.get(&model) else {
        return Vec::new();
    };
    let mut residues: Vec<(char, f64)> = per_res
        .iter()
        .map(|(&r, c)| (r, c.spearman.unwrap_or(f64::NEG_INFINITY)))
        .collect();
    residues.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    residues.into_iter().map(|(r, _)| r).collect()
}

fn rho_of(corr: &CorrPerResidue, model: ModelType, residue: char) -> Option<f64> {
    corr.get(&model)
        .and_then(|m| m.get(&residue))
        .and_then(|c| c.spearman)
}

/// Grouped bars of Spearman rho per residue type for `model_picked`, the
/// combined model and ODiNPred, with a dashed reference line.
pub fn plot_corr_per_residue(
    corr: &CorrPerResidue,
    model_picked: ModelType,
    reference: f64,
    output_path: &Path,
) -> Result<()> {
    let residues = residues_by_correlation(corr, model_picked);
    if residues.is_empty() {
        warn!("No residue correlations for {}, skipping bar chart", model_picked);
        return Ok(());
    }

    let series = [
        (model_picked, model_picked.as_str().to_string(), INDIAN_RED),
        (ModelType::Combined, "combined-esm".to_string(), MAROON),
        (ModelType::Odin, "odin-pred".to_string(), LIGHT_SALMON),
    ];

    let all_rhos = series
        .iter()
        .flat_map(|(m, _, _)| residues.iter().filter_map(|&r| rho_of(corr, *m, r)));
    let (lo, hi) = all_rhos.fold((0.0f64, reference), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let y_range = (lo - 0.05)..(hi.max(1.0) + 0.05);

    let n_slots = SLOTS_PER_RESIDUE * residues.len() as i32;

    let root = BitMapBackend::new(output_path, (PLOT_WIDTH, PLOT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0..n_slots, y_range)
        .map_err(plot_err)?;

    let label_of = |x: &i32| {
        if x.rem_euclid(SLOTS_PER_RESIDUE) == 1 {
            residues
                .get((x / SLOTS_PER_RESIDUE) as usize)
                .map(|r| r.to_string())
                .unwrap_or_default()
        } else {
            String::new()
        }
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n_slots as usize + 1)
        .x_label_formatter(&label_of)
        .x_desc("Residue type")
        .y_desc("Spearman rho")
        .axis_desc_style((FONT_FAMILY, FONT_SIZE_AXIS))
        .draw()
        .map_err(plot_err)?;

    for (offset, (model, name, colour)) in series.iter().enumerate() {
        let bars: Vec<Rectangle<(i32, f64)>> = residues
            .iter()
            .enumerate()
            .filter_map(|(i, &r)| {
                rho_of(corr, *model, r).map(|v| {
                    let x0 = SLOTS_PER_RESIDUE * i as i32 + offset as i32;
                    Rectangle::new([(x0, 0.0), (x0 + 1, v)], colour.filled())
                })
            })
            .collect();
        let colour = *colour;
        chart
            .draw_series(bars)
            .map_err(plot_err)?
            .label(name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], colour.filled()));
    }

    // dashed reference line, one dash per residue slot pair
    let dash_segments = (0..n_slots)
        .step_by(2)
        .map(|x| PathElement::new(vec![(x, reference), (x + 1, reference)], REF_GREEN.stroke_width(3)));
    chart.draw_series(dash_segments).map_err(plot_err)?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .position(SeriesLabelPosition::UpperRight)
        .label_font((FONT_FAMILY, FONT_SIZE_AXIS))
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    info!("Per-residue correlations saved to {}", output_path.display());
    Ok(())
}

// --------------------------------------------------------
//  Experimental vs predicted density
// --------------------------------------------------------

/// Counts of `(x, y)` pairs on a `bins × bins` grid over the given ranges;
/// indexed `[x_bin][y_bin]`. Points outside the ranges are dropped.
pub fn histogram2d(
    xs: &[f64],
    ys: &[f64],
    x_range: (f64, f64),
    y_range: (f64, f64),
    bins: usize,
) -> Vec<Vec<u32>> {
    let mut grid = vec![vec![0u32; bins]; bins];
    if bins == 0 {
        return grid;
    }
    let bin_of = |v: f64, (lo, hi): (f64, f64)| -> Option<usize> {
        if !(lo..=hi).contains(&v) || hi <= lo {
            return None;
        }
        let idx = ((v - lo) / (hi - lo) * bins as f64).floor() as usize;
        Some(idx.min(bins - 1))
    };
    for (&x, &y) in xs.iter().zip(ys) {
        if let (Some(i), Some(j)) = (bin_of(x, x_range), bin_of(y, y_range)) {
            grid[i][j] += 1;
        }
    }
    grid
}

fn min_max(vals: &[f64]) -> (f64, f64) {
    vals.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Side-by-side density of experimental vs predicted Z-scores for ESM-1b and
/// ODiNPred, each with the identity line for reference.
pub fn plot_gt_vs_pred_contours(
    actual_z_scores: &[f64],
    z_scores_per_model: &BTreeMap<ModelType, Vec<f64>>,
    output_path: &Path,
) -> Result<()> {
    let empty = Vec::new();
    let esm = z_scores_per_model.get(&ModelType::Esm1b).unwrap_or(&empty);
    let odin = z_scores_per_model.get(&ModelType::Odin).unwrap_or(&empty);
    if actual_z_scores.is_empty() || esm.is_empty() {
        warn!("Not enough scores for the contour plot, skipping");
        return Ok(());
    }

    let (a_min, a_max) = min_max(actual_z_scores);
    let (p_min, p_max) = min_max(esm);
    let x_range = (a_min - 1.0, a_max + 1.0);
    let y_range = (p_min - 1.0, p_max + 1.0);

    let root = BitMapBackend::new(output_path, (PLOT_WIDTH, PLOT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let panels = root.split_evenly((1, 2));

    for (panel, (title, preds)) in panels.iter().zip([("(ESM)", esm), ("(ODiNPred)", odin)]) {
        let mut chart = ChartBuilder::on(panel)
            .caption(title, (FONT_FAMILY, FONT_SIZE_AXIS))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
            .map_err(plot_err)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("Experimental Z-scores")
            .y_desc("Predicted Z-scores")
            .draw()
            .map_err(plot_err)?;

        let grid = histogram2d(actual_z_scores, preds, x_range, y_range, CONTOUR_BINS);
        let peak = grid.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;
        let dx = (x_range.1 - x_range.0) / CONTOUR_BINS as f64;
        let dy = (y_range.1 - y_range.0) / CONTOUR_BINS as f64;
        let cells = grid.iter().enumerate().flat_map(|(i, col)| {
            col.iter().enumerate().filter(|&(_, &c)| c > 0).map(move |(j, &c)| {
                let x0 = x_range.0 + i as f64 * dx;
                let y0 = y_range.0 + j as f64 * dy;
                Rectangle::new(
                    [(x0, y0), (x0 + dx, y0 + dy)],
                    blues((c as f64 / peak).sqrt()).filled(),
                )
            })
        });
        chart.draw_series(cells).map_err(plot_err)?;

        // dash-dot: a dot in the middle of every gap
        let diagonal = dashes((a_min, a_min), (a_max, a_max), 25);
        let dots: Vec<(f64, f64)> = diagonal
            .windows(2)
            .map(|w| ((w[0][1].0 + w[1][0].0) / 2.0, (w[0][1].1 + w[1][0].1) / 2.0))
            .collect();
        chart
            .draw_series(
                diagonal
                    .into_iter()
                    .map(|seg| PathElement::new(seg.to_vec(), DARK_RED.stroke_width(2))),
            )
            .map_err(plot_err)?;
        chart
            .draw_series(dots.into_iter().map(|p| Circle::new(p, 2, DARK_RED.filled())))
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    info!("Contour comparison saved to {}", output_path.display());
    Ok(())
}

// --------------------------------------------------------
//  Stability paths
// --------------------------------------------------------

/// Selection probability against lambda for every feature; features in
/// `relevant` are drawn solid red, the rest dashed black.
pub fn plot_stability_paths(paths: &StabilityPaths, relevant: &[usize], output_path: &Path) -> Result<()> {
    let lambdas = paths.reg_params();
    if lambdas.is_empty() {
        warn!("Empty stability grid, nothing to plot");
        return Ok(());
    }
    let (l_min, l_max) = min_max(&lambdas);
    let l_max = if l_max > l_min { l_max } else { l_min + 1e-6 };

    let root = BitMapBackend::new(output_path, (PLOT_WIDTH, PLOT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(l_min..l_max, 0.0..1.0)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc("lambda")
        .y_desc("Pi(lambda)")
        .axis_desc_style((FONT_FAMILY, FONT_SIZE_AXIS))
        .draw()
        .map_err(plot_err)?;

    // background first so the stable features stay visible
    for i in (0..paths.n_features()).filter(|i| !relevant.contains(i)) {
        let path = paths.feature_path(i);
        let segs = path
            .windows(2)
            .flat_map(|w| dashes(w[0], w[1], 3))
            .map(|seg| PathElement::new(seg.to_vec(), BLACK.mix(0.6)));
        chart.draw_series(segs).map_err(plot_err)?;
    }
    for &i in relevant {
        chart
            .draw_series(LineSeries::new(paths.feature_path(i), &RED))
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    info!(
        "Stability paths ({} of {} features stable) saved to {}",
        relevant.len(),
        paths.n_features(),
        output_path.display()
    );
    Ok(())
}
