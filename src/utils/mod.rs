use std::cmp::Ordering;
use std::path::{Path, PathBuf};

pub mod validation;

/// Sorts `(id, score)` pairs by descending score. Stable, so equal scores keep
/// their incoming order; NaN compares equal to everything.
pub fn sort_scored_desc<T>(scored: &mut [(T, f64)]) {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
}

/// Median of the values, averaging the middle pair for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// `dir/stem<suffix>.ext` next to `path`.
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    path.with_file_name(file_name)
}

/// `path` with `suffix` removed from the end of its stem, if it is there.
pub fn strip_stem_suffix(path: &Path, suffix: &str) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_string_lossy().into_owned();
    let stripped = stem.strip_suffix(suffix)?;
    let file_name = match path.extension() {
        Some(ext) => format!("{}.{}", stripped, ext.to_string_lossy()),
        None => stripped.to_string(),
    };
    Some(path.with_file_name(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_scored_desc_keeps_ties_in_order() {
        let mut scored = vec![("a", 0.2), ("b", 0.9), ("c", 0.2), ("d", f64::NAN)];
        sort_scored_desc(&mut scored[..3]);
        assert_eq!(scored[0].0, "b");
        assert_eq!(scored[1].0, "a");
        assert_eq!(scored[2].0, "c");
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[2012.0, 2010.0, 2015.0]), Some(2012.0));
        assert_eq!(median(&[1.0, 4.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn test_sibling_paths() {
        let path = Path::new("models/content_based_model_optimized.bin");
        assert_eq!(
            sibling_with_suffix(path, "_features"),
            PathBuf::from("models/content_based_model_optimized_features.bin")
        );
        assert_eq!(
            strip_stem_suffix(path, "_optimized"),
            Some(PathBuf::from("models/content_based_model.bin"))
        );
        assert_eq!(strip_stem_suffix(Path::new("a/b.bin"), "_optimized"), None);
        assert_eq!(
            sibling_with_suffix(Path::new("data/ratings.csv"), "_enhanced"),
            PathBuf::from("data/ratings_enhanced.csv")
        );
    }
}
