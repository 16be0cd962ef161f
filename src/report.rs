use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::grouping::{derive_groups, excluded_count};
use crate::models::{DestinationGroup, MajorFilter, PathType, StudentRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTypeSummary {
    pub path_type: PathType,
    pub count: usize,
}

/// Counts grouped students per path type, largest first.
pub fn summarize_by_type(groups: &[DestinationGroup]) -> Vec<PathTypeSummary> {
    let mut summaries: Vec<PathTypeSummary> = PathType::ALL
        .into_iter()
        .map(|path_type| PathTypeSummary {
            path_type,
            count: groups
                .iter()
                .flat_map(|group| &group.students)
                .filter(|student| student.path_type == path_type)
                .count(),
        })
        .filter(|summary| summary.count > 0)
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

/// One line per student as shown in a destination's detail view.
pub fn student_line(student: &StudentRecord) -> String {
    let mut line = format!(
        "{} · {} · {}届 · {}",
        student.display_name(),
        student.major,
        student.year,
        student.path_type
    );
    if let Some(contact) = &student.contact {
        let _ = write!(line, " · 联系方式: {contact}");
    }
    line
}

pub fn build_report(
    records: &[StudentRecord],
    filter: &MajorFilter,
    generated_at: DateTime<Utc>,
) -> String {
    let groups = derive_groups(records, filter);
    let summaries = summarize_by_type(&groups);
    let undecided = excluded_count(records, filter);
    let scope = match filter {
        MajorFilter::All => "all majors",
        MajorFilter::Major(major) => major.as_str(),
    };

    let mut output = String::new();

    let _ = writeln!(output, "# Graduate Destination Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        scope,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Path Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No destinations recorded yet.");
    } else {
        for summary in &summaries {
            let _ = writeln!(
                output,
                "- {} ({}): {} students",
                summary.path_type,
                summary.path_type.as_str(),
                summary.count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Destinations");

    if groups.is_empty() {
        let _ = writeln!(output, "No destinations recorded yet.");
    } else {
        for group in &groups {
            let _ = writeln!(output, "### {} ({})", group.destination, group.count);
            for student in &group.students {
                let _ = writeln!(output, "- {}", student_line(student));
            }
        }
    }

    if undecided > 0 {
        let _ = writeln!(output);
        let _ = writeln!(output, "{undecided} students have not decided yet.");
    }

    output
}
