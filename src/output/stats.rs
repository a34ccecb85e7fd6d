//! Console rendering of the analysis
//!
//! This module prints the dashboard answers to stdout in a formatted manner.

use crate::output::analysis::{format_average, format_percentage, Analysis};

/// Prints the analysis to stdout
///
/// # Arguments
///
/// * `analysis` - The answers to display
pub fn print_analysis(analysis: &Analysis) {
    println!("=== Applicant Analysis ===\n");

    if let Some(run) = &analysis.latest_run {
        println!("Latest ingest run:");
        println!("  Run {} ({})", run.id, run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!(
            "  Pages with new data: {}, records inserted: {}",
            run.counts.pages_with_new_data, run.counts.records_inserted
        );
        if let Some(error) = &run.error_message {
            println!("  Error: {}", error);
        }
        println!();
    }

    println!("Overview:");
    println!("  Total entries: {}", analysis.total_applicants);
    println!(
        "  Entries for {}: {}",
        analysis.term, analysis.term_applications
    );
    println!(
        "  International entries: {}",
        format_percentage(analysis.international_percentage)
    );
    println!();

    println!("Averages (entries reporting the metric):");
    for metric in &analysis.metric_averages {
        println!(
            "  {}: {} ({} entries)",
            metric.metric,
            format_average(metric.average),
            metric.count_with_data
        );
    }
    println!();

    println!("{}:", analysis.term);
    println!(
        "  Average GPA of American applicants: {}",
        format_average(analysis.american_term_gpa)
    );
    println!(
        "  Acceptances: {}",
        format_percentage(analysis.term_acceptance_percentage)
    );
    println!(
        "  Average GPA of accepted applicants: {}",
        format_average(analysis.accepted_term_gpa)
    );
    println!();

    println!("Programs:");
    println!(
        "  JHU masters entries: {}",
        analysis.jhu_masters_entries
    );
    println!(
        "  Georgetown PhD acceptances: {}",
        analysis.georgetown_phd_acceptances
    );
    println!();

    if !analysis.university_acceptance.is_empty() {
        println!("Acceptance rate by university (American vs International):");
        for row in &analysis.university_acceptance {
            println!(
                "  {}: {} vs {} ({:+.2})",
                row.university,
                format_percentage(Some(row.american_rate)),
                format_percentage(Some(row.international_rate)),
                row.rate_difference
            );
        }
        println!();
    }

    if !analysis.gpa_by_degree.is_empty() {
        println!("Average GPA by degree and outcome:");
        for row in &analysis.gpa_by_degree {
            println!(
                "  {} / {}: {} ({} entries)",
                row.degree,
                row.outcome,
                format_average(row.average_gpa),
                row.count
            );
        }
    }
}
