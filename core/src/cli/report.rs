use crate::api::{PredictSummary, PrepareSummary, RunSummary};
use crate::labels::PrepareOutcome;
use crate::training::TrainingReport;
use std::fmt;

/// Text report formatter for pipeline stage results
pub struct TextReport<'a> {
    prepare: Option<&'a PrepareSummary>,
    training: Option<&'a TrainingReport>,
    predict: Option<&'a PredictSummary>,
}

impl<'a> TextReport<'a> {
    pub fn prepare(summary: &'a PrepareSummary) -> Self {
        Self {
            prepare: Some(summary),
            training: None,
            predict: None,
        }
    }

    pub fn training(report: &'a TrainingReport) -> Self {
        Self {
            prepare: None,
            training: Some(report),
            predict: None,
        }
    }

    pub fn predict(summary: &'a PredictSummary) -> Self {
        Self {
            prepare: None,
            training: None,
            predict: Some(summary),
        }
    }

    pub fn run(summary: &'a RunSummary) -> Self {
        Self {
            prepare: Some(&summary.prepare),
            training: Some(&summary.training),
            predict: Some(&summary.predict),
        }
    }
}

fn outcome(o: &PrepareOutcome) -> String {
    match o {
        PrepareOutcome::Cached => "cached".to_string(),
        PrepareOutcome::Built { rows, dropped: 0 } => format!("built, {} rows", rows),
        PrepareOutcome::Built { rows, dropped } => {
            format!("built, {} rows ({} without image)", rows, dropped)
        }
    }
}

impl<'a> fmt::Display for TextReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prepare) = self.prepare {
            writeln!(f, "Label Preparation")?;
            writeln!(f, "=================")?;
            writeln!(f, "Train table:    {}", outcome(&prepare.train))?;
            writeln!(f, "Test table:     {}", outcome(&prepare.test))?;
            writeln!(f)?;
        }

        if let Some(training) = self.training {
            writeln!(f, "Training")?;
            writeln!(f, "========")?;
            writeln!(f, "Head:           {}", training.head_variant)?;
            writeln!(f, "Steps:          {}", training.steps)?;
            for (i, loss) in training.epoch_losses.iter().enumerate() {
                writeln!(f, "Epoch {:<9} {:.5}", format!("{}:", i + 1), loss)?;
            }
            writeln!(f, "Model:          {}", training.model_path.display())?;
            writeln!(f)?;
        }

        if let Some(predict) = self.predict {
            writeln!(f, "Inference")?;
            writeln!(f, "=========")?;
            writeln!(f, "Scored:         {} / {}", predict.scored, predict.total)?;
            match &predict.submission {
                Some(path) => writeln!(
                    f,
                    "Submission:     {} ({} rows)",
                    path.display(),
                    predict.rows
                )?,
                None => writeln!(f, "Submission:     skipped (inference capped)")?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HeadVariant;
    use std::path::PathBuf;

    #[test]
    fn test_prepare_report() {
        let summary = PrepareSummary {
            train: PrepareOutcome::Built {
                rows: 10,
                dropped: 2,
            },
            test: PrepareOutcome::Cached,
        };
        let output = TextReport::prepare(&summary).to_string();
        assert!(output.contains("Train table:    built, 10 rows (2 without image)"));
        assert!(output.contains("Test table:     cached"));
        assert!(!output.contains("Training"));
    }

    #[test]
    fn test_run_report() {
        let summary = RunSummary {
            prepare: PrepareSummary {
                train: PrepareOutcome::Cached,
                test: PrepareOutcome::Built {
                    rows: 4,
                    dropped: 0,
                },
            },
            training: TrainingReport {
                head_variant: HeadVariant::Shared,
                epoch_losses: vec![0.69, 0.5],
                steps: 8,
                checkpoints: vec![],
                model_path: PathBuf::from("out/model"),
            },
            predict: PredictSummary {
                scored: 4,
                total: 4,
                submission: Some(PathBuf::from("out/shared_sub.csv")),
                rows: 24,
            },
        };

        let output = TextReport::run(&summary).to_string();
        assert!(output.contains("Test table:     built, 4 rows\n"));
        assert!(output.contains("Head:           shared"));
        assert!(output.contains("Epoch 2:        0.50000"));
        assert!(output.contains("Submission:     out/shared_sub.csv (24 rows)"));
    }

    #[test]
    fn test_capped_predict_report() {
        let summary = PredictSummary {
            scored: 2,
            total: 9,
            submission: None,
            rows: 0,
        };
        let output = TextReport::predict(&summary).to_string();
        assert!(output.contains("Scored:         2 / 9"));
        assert!(output.contains("skipped"));
    }
}
