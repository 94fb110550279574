use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Prediction for one input example, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct KcatPrediction {
    pub index: usize,
    pub predicted: f32,
    /// NaN when the input carried no target.
    pub observed: f32,
}

/// Writes predictions as CSV, or TSV when the path ends in `.tsv`.
pub fn write_predictions<P: AsRef<Path>>(predictions: &[KcatPrediction], output_path: P) -> Result<()> {
    let path = output_path.as_ref();
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("csv");
    let delimiter = match extension {
        "tsv" => b'\t',
        _ => b',',
    };

    let file = File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(BufWriter::new(file));

    writer.write_record(["index", "predicted_kcat", "observed_kcat"])?;
    for entry in predictions {
        let observed = if entry.observed.is_nan() {
            String::new()
        } else {
            entry.observed.to_string()
        };
        writer.write_record([
            entry.index.to_string(),
            entry.predicted.to_string(),
            observed,
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_targets_are_left_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        let predictions = vec![
            KcatPrediction {
                index: 0,
                predicted: 1.25,
                observed: 1.0,
            },
            KcatPrediction {
                index: 1,
                predicted: -0.5,
                observed: f32::NAN,
            },
        ];
        write_predictions(&predictions, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["index,predicted_kcat,observed_kcat", "0,1.25,1", "1,-0.5,"]);
    }
}
