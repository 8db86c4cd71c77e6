use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::analysis::OverallAnalysis;
use crate::change::{round2, ChangeLabel, SubjectChange};
use crate::cohort::Bucket;
use crate::config::Population;
use crate::crosstab::{CrossTab, Share};
use crate::models::{PerformanceRecord, Student, Subject};

fn yes_no(flag: bool, yes: &'static str, no: &'static str) -> &'static str {
    if flag {
        yes
    } else {
        no
    }
}

pub fn student_sheet(student: &Student, records: &[PerformanceRecord]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Student Info:");
    let _ = writeln!(output, "\tId: {}", student.id);
    let _ = writeln!(output, "\t{}", student.school.label());
    let _ = writeln!(output, "\tGrade Level: {}", student.grade_level);
    let _ = writeln!(output, "\t{}", student.gender.label());
    let _ = writeln!(
        output,
        "\t{}",
        yes_no(student.covid_positive, "Has had COVID", "Has never had COVID")
    );
    let _ = writeln!(output, "\tHousehold Income: ${}", student.household_income);
    let _ = writeln!(
        output,
        "\tFree or Reduced Lunch: {}",
        yes_no(student.free_lunch, "Yes", "No")
    );
    let _ = writeln!(output, "\tNumber of Computers: {}", student.num_computers);
    let _ = writeln!(output, "\tFamily Size: {}", student.family_size);
    let _ = writeln!(output, "\tFather's Education: {}", student.father_education.label());
    let _ = writeln!(output, "\tMother's Education: {}", student.mother_education.label());

    let _ = writeln!(output);
    let _ = writeln!(output, "Performance:");
    if records.is_empty() {
        let _ = writeln!(output, "\tNo performance records.");
    }
    for record in records {
        let _ = writeln!(output, "\tSemester: {}", record.time_period);
        for subject in Subject::ALL {
            let _ = writeln!(output, "\t\t{}: {}", subject, subject.score(record));
        }
    }

    output
}

fn change_text(change: &SubjectChange) -> String {
    match change.label {
        ChangeLabel::Increase => format!("{}% increase", change.percent_change.abs()),
        ChangeLabel::Decrease(percent) => format!("{percent}% decrease"),
    }
}

pub fn change_summary(changes: &BTreeMap<Subject, SubjectChange>) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Performance Analysis (pre: semesters 0 - 2, post: semesters 3 - 5)"
    );
    for (subject, change) in changes {
        let _ = writeln!(
            output,
            "\t{}: {} ({})",
            subject,
            change_text(change),
            change.label
        );
    }
    output
}

pub fn overall_summary(overall: &OverallAnalysis) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Performance across {} records", overall.records);
    let _ = writeln!(output, "  Percent Change");
    for (subject, summary) in &overall.subjects {
        let _ = writeln!(output, "\t{}: {}", subject, change_text(&summary.change));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "  Standard Deviation");
    for (subject, summary) in &overall.subjects {
        let _ = writeln!(output, "\t{subject}");
        let _ = writeln!(output, "\t\tPre mean: {:.2}", summary.change.pre_mean);
        let _ = writeln!(output, "\t\tPost mean: {:.2}", summary.change.post_mean);
        let _ = writeln!(output, "\t\tPre std dev: {:.3}", summary.pre_std_dev);
        let _ = writeln!(output, "\t\tPost std dev: {:.3}", summary.post_std_dev);
    }

    output
}

pub fn distribution_summary(shares: &[Share], field: &str) -> String {
    let mut output = String::new();
    if shares.is_empty() {
        let _ = writeln!(output, "No students recorded.");
    }
    for share in shares {
        let _ = writeln!(
            output,
            "\t{}% of students have a {} of {}",
            share.percent, field, share.label
        );
    }
    output
}

pub fn breakdown_summary(subject: Subject, table: &CrossTab, population: Population) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "{} Change ({} students):", subject, table.population());
    for bucket in Bucket::ALL {
        if !table.totals.contains_key(&bucket) {
            continue;
        }
        let _ = writeln!(
            output,
            "\tThe {} percent change of {}% of students {}",
            subject,
            table.bucket_share(bucket, population),
            bucket
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Of these students");
    for (bucket, cells) in &table.cells {
        let _ = writeln!(output);
        let _ = writeln!(output, "{bucket}");
        for (value, cell) in cells {
            let _ = writeln!(
                output,
                "\t{}% of students have a {} of {}",
                round2(cell.proportion * 100.0),
                table.demographic,
                table.demographic.label(*value)
            );
        }
    }

    output
}

pub fn build_report(
    generated_at: DateTime<Utc>,
    population: Population,
    overall: &OverallAnalysis,
    subject: Subject,
    table: &CrossTab,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Cohort Performance Shift Report");
    let _ = writeln!(
        output,
        "Generated {} for {} students ({} performance records)",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        population.size(),
        overall.records
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall Change");
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "| Subject | Pre mean | Post mean | Change | Pre std dev | Post std dev |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|");
    for (subject, summary) in &overall.subjects {
        let _ = writeln!(
            output,
            "| {} | {:.2} | {:.2} | {} | {:.3} | {:.3} |",
            subject,
            summary.change.pre_mean,
            summary.change.post_mean,
            summary.change.label,
            summary.pre_std_dev,
            summary.post_std_dev
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## {} Change by {}", subject, table.demographic);

    if table.cells.is_empty() {
        let _ = writeln!(output, "No students with records for this subject.");
        return output;
    }

    for (bucket, cells) in &table.cells {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "### {} ({}% of students)",
            bucket,
            table.bucket_share(*bucket, population)
        );
        for (value, cell) in cells {
            let _ = writeln!(
                output,
                "- {}: {} students ({:.2}%)",
                table.demographic.label(*value),
                cell.count,
                cell.proportion * 100.0
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_breakdown, analyze_overall};
    use crate::approx::SqrtOptions;
    use crate::change::compute_epoch_change;
    use crate::crosstab::Demographic;
    use crate::models::fixtures::{student, student_records};
    use chrono::TimeZone;

    fn sample() -> (Vec<Student>, Vec<PerformanceRecord>) {
        let mut students = vec![student(1), student(2)];
        students[1].free_lunch = true;
        let records = [
            student_records(1, 50.0, 70.0),
            student_records(2, 80.0, 60.0),
        ]
        .concat();
        (students, records)
    }

    #[test]
    fn student_sheet_lists_labels_and_semesters() {
        let (students, records) = sample();
        let sheet = student_sheet(&students[0], &records[..6]);
        assert!(sheet.contains("School: A (Wealthy)"));
        assert!(sheet.contains("Father's Education: BS"));
        assert!(sheet.contains("Mother's Education: MS"));
        assert!(sheet.contains("Semester: 5"));
        assert!(sheet.contains("MathSL: 70"));
    }

    #[test]
    fn change_summary_phrases_direction() {
        let (_, records) = sample();
        let changes = compute_epoch_change(&records[..6], &[Subject::Reading]).unwrap();
        let text = change_summary(&changes);
        assert!(text.contains("Reading: 40% increase (increase)"));
    }

    #[test]
    fn unchanged_subject_reads_as_increase() {
        let records = student_records(1, 64.0, 64.0);
        let changes = compute_epoch_change(&records, &[Subject::Reading]).unwrap();
        let text = change_summary(&changes);
        assert!(text.contains("\tReading: 0% increase (increase)"));
        assert!(!text.contains("decrease"));

        let population = Population::new(1).unwrap();
        let overall = analyze_overall(&records, population, SqrtOptions::default()).unwrap();
        let text = overall_summary(&overall);
        assert!(text.contains("\tMath: 0% increase"));
        assert!(!text.contains("decrease"));
    }

    #[test]
    fn decline_reads_as_decrease() {
        let records = student_records(1, 80.0, 60.0);
        let changes = compute_epoch_change(&records, &[Subject::Writing]).unwrap();
        let text = change_summary(&changes);
        assert!(text.contains("\tWriting: 25% decrease (decrease by 25%)"));
    }

    #[test]
    fn breakdown_lists_buckets_in_classifier_order() {
        let (students, records) = sample();
        let table =
            analyze_breakdown(&records, &students, Subject::Reading, Demographic::FreeLunch)
                .unwrap();
        let text = breakdown_summary(Subject::Reading, &table, Population::new(2).unwrap());
        assert!(text.starts_with("Reading Change (2 students):"));
        let increased = text.find("\nincreased").unwrap();
        let declined = text.find("\ndecreased by 20-29%").unwrap();
        assert!(increased < declined);
        assert!(text.contains("100% of students have a free or reduced lunch of Free or Reduced Lunch: Yes"));
    }

    #[test]
    fn report_has_overall_table_and_breakdown() {
        let (students, records) = sample();
        let population = Population::new(2).unwrap();
        let overall = analyze_overall(&records, population, SqrtOptions::default()).unwrap();
        let table =
            analyze_breakdown(&records, &students, Subject::Reading, Demographic::FreeLunch)
                .unwrap();
        let generated_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let report = build_report(generated_at, population, &overall, Subject::Reading, &table);

        assert!(report.starts_with("# Cohort Performance Shift Report"));
        assert!(report.contains("Generated 2026-03-01 09:30 UTC for 2 students (12 performance records)"));
        assert!(report.contains("| Reading | 65.00 | 65.00 | increase |"));
        assert!(report.contains("### increased (50% of students)"));
        assert!(report.contains("### decreased by 20-29% (50% of students)"));
    }
}
