//! The `status` subcommand.

use std::path::PathBuf;

use clap::Args;
use enrich_pipeline::checkpoint::{CheckpointStore, CheckpointSummary};
use enrich_pipeline::report::format_rate;
use enrich_pipeline::table::read_table;
use enrich_pipeline::{OutcomeKind, PipelineError};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Input CSV of the interrupted run
    #[arg(long, default_value = "data/data_fnb_karawang_comprehensive.csv")]
    pub input: PathBuf,
    /// Progress file of the interrupted run
    #[arg(long, default_value = "data/data_fnb_backup_progress.csv")]
    pub checkpoint: PathBuf,
    /// Status column written by the run
    #[arg(long, default_value = "Geocoding_Status")]
    pub status_column: String,
}

fn render(summary: Option<&CheckpointSummary>, input_rows: Option<usize>) -> String {
    let Some(summary) = summary else {
        return "No checkpoint: the last run finished or none was started.\n".to_string();
    };

    let position = match input_rows {
        Some(total) => format!("Resume position: {}/{total}", summary.rows),
        None => format!("Resume position: {} (input not found)", summary.rows),
    };
    let mut lines = vec![position];
    lines.extend(
        OutcomeKind::ALL
            .iter()
            .map(|kind| format!("  {kind}: {}", summary.counts.get(*kind))),
    );
    if summary.unreadable > 0 {
        lines.push(format!("  unreadable: {}", summary.unreadable));
    }
    lines.push(format!("  success rate: {}", format_rate(&summary.counts)));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Prints the resume position and outcome counts of an interrupted run.
///
/// # Errors
///
/// Returns [`PipelineError`] if the checkpoint exists but cannot be read.
pub fn run(args: &StatusArgs) -> Result<(), PipelineError> {
    let summary = CheckpointStore::new(&args.checkpoint).summary(&args.status_column)?;
    let input_rows = if args.input.exists() {
        Some(read_table(&args.input)?.rows.len())
    } else {
        None
    };
    print!("{}", render(summary.as_ref(), input_rows));
    Ok(())
}

#[cfg(test)]
mod tests {
    use enrich_pipeline::OutcomeCounts;

    use super::*;

    #[test]
    fn reports_missing_checkpoint() {
        assert!(render(None, Some(10)).starts_with("No checkpoint"));
    }

    #[test]
    fn reports_position_and_counts() {
        let summary = CheckpointSummary {
            rows: 20,
            counts: OutcomeCounts {
                success: 12,
                skip: 4,
                no_data: 3,
                error: 1,
            },
            unreadable: 0,
        };
        let text = render(Some(&summary), Some(25));
        assert!(text.starts_with("Resume position: 20/25\n"));
        assert!(text.contains("  no_data: 3\n"));
        assert!(text.contains("success rate: 75.00%"));
        assert!(!text.contains("unreadable"));
    }
}
