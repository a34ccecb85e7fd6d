//! Markdown report generation
//!
//! This module renders the analysis as a question-and-answer markdown
//! document, the same content the dashboard page shows.

use crate::output::analysis::{format_average, format_percentage, Analysis};
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the analysis as markdown
///
/// # Arguments
///
/// * `analysis` - The answers to render
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn generate_markdown_report(analysis: &Analysis, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_report(analysis);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

fn question(md: &mut String, text: &str, answer: &str) {
    md.push_str(&format!("### {}\n\n", text));
    md.push_str(&format!("Answer: {}\n\n", answer));
}

/// Formats the analysis as markdown
pub fn format_markdown_report(analysis: &Analysis) -> String {
    let mut md = String::new();
    let term = &analysis.term;

    md.push_str("# Graduate Admissions Analysis\n\n");

    if let Some(run) = &analysis.latest_run {
        md.push_str("## Latest Ingest Run\n\n");
        md.push_str(&format!("- **Run ID**: {}\n", run.id));
        md.push_str(&format!("- **Status**: {}\n", run.status.to_db_string()));
        md.push_str(&format!("- **Started**: {}\n", run.started_at));
        if let Some(finished) = &run.finished_at {
            md.push_str(&format!("- **Finished**: {}\n", finished));
        }
        md.push_str(&format!(
            "- **Records Inserted**: {}\n",
            run.counts.records_inserted
        ));
        md.push_str(&format!("- **Config Hash**: {}\n\n", run.config_hash));
    }

    md.push_str("## Questions\n\n");
    md.push_str(&format!(
        "Total entries in the database: {}\n\n",
        analysis.total_applicants
    ));

    question(
        &mut md,
        &format!("How many entries applied for {}?", term),
        &analysis.term_applications.to_string(),
    );
    question(
        &mut md,
        "What percentage of entries are from international students?",
        &format_percentage(analysis.international_percentage),
    );

    let averages = analysis
        .metric_averages
        .iter()
        .map(|m| format!("{} {}", m.metric, format_average(m.average)))
        .collect::<Vec<_>>()
        .join(", ");
    question(
        &mut md,
        "What is the average GPA, GRE, GRE V and GRE AW of applicants who provide these metrics?",
        &averages,
    );
    question(
        &mut md,
        &format!("What is the average GPA of American students in {}?", term),
        &format_average(analysis.american_term_gpa),
    );
    question(
        &mut md,
        &format!("What percent of entries for {} are acceptances?", term),
        &format_percentage(analysis.term_acceptance_percentage),
    );
    question(
        &mut md,
        &format!(
            "What is the average GPA of applicants for {} who are acceptances?",
            term
        ),
        &format_average(analysis.accepted_term_gpa),
    );
    question(
        &mut md,
        "How many entries applied to JHU for a masters degree?",
        &analysis.jhu_masters_entries.to_string(),
    );
    question(
        &mut md,
        "How many acceptances applied to Georgetown University for a PhD this year?",
        &analysis.georgetown_phd_acceptances.to_string(),
    );

    md.push_str("### Which universities accept international students at a higher rate than American students?\n\n");
    if analysis.university_acceptance.is_empty() {
        md.push_str("Answer: not enough data\n\n");
    } else {
        md.push_str("| University | American | International | Difference |\n");
        md.push_str("|------------|----------|---------------|------------|\n");
        for row in &analysis.university_acceptance {
            md.push_str(&format!(
                "| {} | {} | {} | {:+.2} |\n",
                row.university,
                format_percentage(Some(row.american_rate)),
                format_percentage(Some(row.international_rate)),
                row.rate_difference
            ));
        }
        md.push('\n');
    }

    md.push_str("### What is the average GPA of accepted vs rejected students by degree?\n\n");
    if analysis.gpa_by_degree.is_empty() {
        md.push_str("Answer: not enough data\n\n");
    } else {
        md.push_str("| Degree | Outcome | Entries | Average GPA |\n");
        md.push_str("|--------|---------|---------|-------------|\n");
        for row in &analysis.gpa_by_degree {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                row.degree,
                row.outcome,
                row.count,
                format_average(row.average_gpa)
            ));
        }
        md.push('\n');
    }

    md
}
