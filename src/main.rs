use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod analysis;
mod approx;
mod change;
mod cohort;
mod config;
mod crosstab;
mod db;
mod dispersion;
mod epoch;
mod error;
mod models;
mod report;

use config::{AnalysisConfig, Population};
use crosstab::Demographic;
use db::{PerformanceFilter, StudentFilter};
use error::AnalysisError;
use models::Subject;

#[derive(Parser)]
#[command(name = "cohort-shift")]
#[command(about = "Pre/post performance shift analysis across a student cohort", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: AnalysisConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a synthetic cohort
    Seed {
        #[arg(long, default_value_t = 1400)]
        students: i32,
        #[arg(long, default_value_t = 42)]
        rng_seed: u64,
    },
    /// Import students and performance records from CSV files
    #[command(group(
        ArgGroup::new("source")
            .args(["students", "performances"])
            .required(true)
            .multiple(true)
    ))]
    Import {
        #[arg(long)]
        students: Option<PathBuf>,
        #[arg(long)]
        performances: Option<PathBuf>,
    },
    /// Show one student's demographics and scores
    Student {
        #[arg(long)]
        id: i64,
        #[arg(long, default_value_t = 0)]
        from_period: i32,
        #[arg(long, default_value_t = 5)]
        to_period: i32,
    },
    /// Show one student's pre/post change per subject
    StudentChange {
        #[arg(long)]
        id: i64,
    },
    /// Percent change and standard deviation across all students
    Overall {
        #[arg(long)]
        json: bool,
    },
    /// Share of students per value of a demographic field
    Demographics {
        #[arg(long)]
        field: Demographic,
        #[arg(long)]
        json: bool,
    },
    /// Bucket per-student change in a subject and cross-tabulate a demographic
    Breakdown {
        #[arg(long)]
        subject: Subject,
        #[arg(long)]
        by: Demographic,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "reading")]
        subject: Subject,
        #[arg(long, default_value = "household-income")]
        by: Demographic,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cohort_shift=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    if let Err(err) = run(cli.command, &cli.config, &pool).await {
        if let Some(analysis) = err.downcast_ref::<AnalysisError>() {
            tracing::warn!(error = %analysis, "analysis failed");
            eprintln!("Could not complete the analysis: {analysis}");
            return Ok(());
        }
        return Err(err);
    }

    Ok(())
}

async fn resolve_population(pool: &PgPool, config: &AnalysisConfig) -> anyhow::Result<Population> {
    let size = match config.population {
        Some(size) => size,
        None => db::count_students(pool).await?,
    };
    Ok(Population::new(size)?)
}

async fn run(command: Commands, config: &AnalysisConfig, pool: &PgPool) -> anyhow::Result<()> {
    match command {
        Commands::InitDb => {
            db::init_db(pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed { students, rng_seed } => {
            let inserted = db::seed(pool, students, rng_seed).await?;
            println!("Seeded {inserted} students with six semesters each.");
        }
        Commands::Import {
            students,
            performances,
        } => {
            let summary =
                db::import_csv(pool, students.as_deref(), performances.as_deref()).await?;
            println!(
                "Imported {} students and {} performance records.",
                summary.students, summary.performances
            );
        }
        Commands::Student {
            id,
            from_period,
            to_period,
        } => {
            let id = resolve_population(pool, config).await?.check_id(id)?;
            let filter = PerformanceFilter::for_student(id).with_periods(from_period, to_period)?;
            let student = db::fetch_students(pool, &StudentFilter { id: Some(id) })
                .await?
                .into_iter()
                .next()
                .with_context(|| format!("student {id} is not stored"))?;
            let records = db::fetch_performances(pool, &filter).await?;
            print!("{}", report::student_sheet(&student, &records));
        }
        Commands::StudentChange { id } => {
            let id = resolve_population(pool, config).await?.check_id(id)?;
            let records =
                db::fetch_performances(pool, &PerformanceFilter::for_student(id)).await?;
            let changes = change::compute_epoch_change(&records, &Subject::ALL)?;
            print!("{}", report::change_summary(&changes));
        }
        Commands::Overall { json } => {
            let population = resolve_population(pool, config).await?;
            let records = db::fetch_performances(pool, &PerformanceFilter::default()).await?;
            let overall = analysis::analyze_overall(&records, population, config.sqrt_options())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&overall)?);
            } else {
                print!("{}", report::overall_summary(&overall));
            }
        }
        Commands::Demographics { field, json } => {
            let population = resolve_population(pool, config).await?;
            let students = db::fetch_students(pool, &StudentFilter::default()).await?;
            let shares = crosstab::distribution(&students, field, population);
            if json {
                println!("{}", serde_json::to_string_pretty(&shares)?);
            } else {
                print!("{}", report::distribution_summary(&shares, field.name()));
            }
        }
        Commands::Breakdown { subject, by, json } => {
            let population = resolve_population(pool, config).await?;
            let students = db::fetch_students(pool, &StudentFilter::default()).await?;
            let records = db::fetch_performances(pool, &PerformanceFilter::default()).await?;
            let table = analysis::analyze_breakdown(&records, &students, subject, by)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                print!("{}", report::breakdown_summary(subject, &table, population));
            }
        }
        Commands::Report { subject, by, out } => {
            let population = resolve_population(pool, config).await?;
            let students = db::fetch_students(pool, &StudentFilter::default()).await?;
            let records = db::fetch_performances(pool, &PerformanceFilter::default()).await?;
            let overall = analysis::analyze_overall(&records, population, config.sqrt_options())?;
            let table = analysis::analyze_breakdown(&records, &students, subject, by)?;
            let report =
                report::build_report(chrono::Utc::now(), population, &overall, subject, &table);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn breakdown_accepts_column_style_names() {
        let cli = Cli::try_parse_from([
            "cohort-shift",
            "breakdown",
            "--subject",
            "reading-sl",
            "--by",
            "father_educ",
        ])
        .unwrap();
        match cli.command {
            Commands::Breakdown { subject, by, json } => {
                assert_eq!(subject, Subject::ReadingSl);
                assert_eq!(by, Demographic::FatherEducation);
                assert!(!json);
            }
            _ => panic!("expected the breakdown command"),
        }
    }

    #[test]
    fn unknown_subject_is_rejected_on_the_command_line() {
        let err = match Cli::try_parse_from([
            "cohort-shift",
            "breakdown",
            "--subject",
            "science",
            "--by",
            "gender",
        ]) {
            Ok(_) => panic!("science is not a measured subject"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.to_string().contains("unknown subject: science"));
    }

    #[test]
    fn unknown_demographic_is_rejected_on_the_command_line() {
        let err = match Cli::try_parse_from(["cohort-shift", "demographics", "--field", "zodiac"]) {
            Ok(_) => panic!("zodiac is not a student attribute"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.to_string().contains("unknown demographic field: zodiac"));
    }

    #[test]
    fn report_defaults_parse() {
        let cli = Cli::try_parse_from(["cohort-shift", "report"]).unwrap();
        match cli.command {
            Commands::Report { subject, by, out } => {
                assert_eq!(subject, Subject::Reading);
                assert_eq!(by, Demographic::HouseholdIncome);
                assert_eq!(out, PathBuf::from("report.md"));
            }
            _ => panic!("expected the report command"),
        }
    }

    #[test]
    fn student_period_window_defaults_to_every_period() {
        let cli = Cli::try_parse_from(["cohort-shift", "student", "--id", "7"]).unwrap();
        match cli.command {
            Commands::Student {
                id,
                from_period,
                to_period,
            } => {
                assert_eq!(id, 7);
                assert_eq!((from_period, to_period), (0, 5));
            }
            _ => panic!("expected the student command"),
        }
    }
}
