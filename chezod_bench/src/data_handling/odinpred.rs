use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info};

use crate::constants::{ODIN_FILE_EXTENSION, ODIN_FILE_PREFIX, ODIN_ZSCORE_COLUMN};

/// One ODiNPred output file and the CheZod protein it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct OdinPredFile {
    pub brmid: String,
    pub path: PathBuf,
}

/// `DisorderPredictions4324.txt` → `4324`.
pub fn brmid_from_file_name(file_name: &str) -> String {
    let stem = file_name.split('.').next().unwrap_or(file_name);
    stem.strip_prefix(ODIN_FILE_PREFIX).unwrap_or(stem).to_string()
}

/// All `.txt` files directly inside `dir`, sorted by file name.
pub fn list_prediction_files(dir: &Path) -> Result<Vec<OdinPredFile>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_txt = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e == ODIN_FILE_EXTENSION);
        if !is_txt {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        files.push(OdinPredFile {
            brmid: brmid_from_file_name(&file_name),
            path,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    info!("Found {} ODiNPred prediction files in {}", files.len(), dir.display());
    Ok(files)
}

/// Reads the `Zscore` column of a whitespace-delimited ODiNPred file.
pub fn read_odinpred_zscores(path: &Path) -> Result<Vec<f64>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let header = lines
        .next()
        .ok_or_else(|| anyhow!("{} is empty", path.display()))??;
    let col = header
        .split_whitespace()
        .position(|h| h == ODIN_ZSCORE_COLUMN)
        .ok_or_else(|| anyhow!("{} has no `{}` column", path.display(), ODIN_ZSCORE_COLUMN))?;

    let mut zscores = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let field = match line.split_whitespace().nth(col) {
            Some(f) => f,
            None => bail!("{}: line {} has no `{}` field", path.display(), i + 2, ODIN_ZSCORE_COLUMN),
        };
        let z: f64 = field.parse().with_context(|| {
            format!("{}: line {}: bad Z-score `{}`", path.display(), i + 2, field)
        })?;
        zscores.push(z);
    }
    debug!("{}: {} residues", path.display(), zscores.len());
    Ok(zscores)
}
