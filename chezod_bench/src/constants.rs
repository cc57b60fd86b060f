// --------------------------------------------------------
//  Dataset conventions
// --------------------------------------------------------

/// Z-score value marking residues without an experimental measurement.
pub const MISSING_ZSCORE: f64 = 999.0;

/// ODiNPred output files are named `DisorderPredictions<brmid>.txt`.
pub const ODIN_FILE_PREFIX: &str = "DisorderPredictions";
pub const ODIN_FILE_EXTENSION: &str = "txt";
pub const ODIN_ZSCORE_COLUMN: &str = "Zscore";

pub const REPRESENTATION_EXTENSION: &str = "npy";

/// The combined regressor was only exported for this strategy.
pub const COMBINED_STRATEGY: &str = "train_on_cleared_1325_test_on_117_residue_split";

// --------------------------------------------------------
//  Outputs
// --------------------------------------------------------
pub const CORR_PER_RES_PLOT: &str = "correlations_per_res_esm_odin.png";
pub const CONTOUR_PLOT: &str = "esm1b_odinpred_contours_with_ref.png";
pub const CORR_PER_RES_CSV: &str = "correlations_per_residue.csv";

// --------------------------------------------------------
//  Plot styling
// --------------------------------------------------------
pub const PLOT_WIDTH: u32 = 900;
pub const PLOT_HEIGHT: u32 = 450;
pub const FONT_FAMILY: &str = "sans-serif";
pub const FONT_SIZE_AXIS: u32 = 16;
pub const CONTOUR_BINS: usize = 40;
