use std::fs::{self, File};
use std::path::Path;

use polars::prelude::*;
use tracing::{error, info};

use crate::models::polars_err;

/// Creates `dir` (and parents) if it does not exist yet.
pub fn ensure_dir(dir: &Path) -> PolarsResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            error!("Failed to create output directory {}: {}", dir.display(), e);
            polars_err(Box::new(e))
        })?;
    }
    Ok(())
}

pub fn dataframe_to_csv(df: &mut DataFrame, path: &Path, include_header: bool) -> PolarsResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;
    CsvWriter::new(&mut file)
        .include_header(include_header)
        .with_separator(b',')
        .finish(df)?;
    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}
