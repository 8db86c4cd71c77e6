use std::ops::RangeInclusive;
use std::path::Path;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::epoch::Epoch;
use crate::error::{AnalysisError, Result};
use crate::models::{
    EducationLevel, Gender, PerformanceRecord, SchoolTier, Student, PERIODS_PER_STUDENT,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub id: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct PerformanceFilter {
    pub student_id: Option<i32>,
    pub periods: Option<RangeInclusive<i32>>,
}

impl PerformanceFilter {
    pub fn for_student(student_id: i32) -> Self {
        PerformanceFilter {
            student_id: Some(student_id),
            periods: None,
        }
    }

    /// Restricts the fetch to `from..=to`; both ends must be recorded periods.
    pub fn with_periods(mut self, from: i32, to: i32) -> Result<Self> {
        Epoch::of_period(from)?;
        Epoch::of_period(to)?;
        if from > to {
            return Err(AnalysisError::InvalidInput(format!(
                "period range {from}..={to} is empty"
            )));
        }
        self.periods = Some(from..=to);
        Ok(self)
    }
}

/// Same `(count, seed)` always yields the same cohort.
pub fn generate_population(count: i32, seed: u64) -> (Vec<Student>, Vec<PerformanceRecord>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut students = Vec::with_capacity(count.max(0) as usize);
    let mut performances = Vec::with_capacity(count.max(0) as usize * PERIODS_PER_STUDENT as usize);

    for id in 1..=count {
        let school = SchoolTier::from_flag(rng.gen_bool(0.5));
        let household_income: i64 = match school {
            SchoolTier::Wealthy => rng.gen_range(60_000..=140_000),
            SchoolTier::Poor => rng.gen_range(25_000..=85_000),
        };
        let student = Student {
            id,
            school,
            gender: Gender::from_flag(rng.gen_bool(0.5)),
            grade_level: rng.gen_range(3..=8),
            household_income,
            free_lunch: household_income < 55_000 && rng.gen_bool(0.85),
            num_computers: rng.gen_range(0..=4),
            family_size: rng.gen_range(2..=8),
            father_education: EducationLevel::ALL[rng.gen_range(0..EducationLevel::ALL.len())],
            mother_education: EducationLevel::ALL[rng.gen_range(0..EducationLevel::ALL.len())],
            covid_positive: rng.gen_bool(0.3),
        };

        // Post-epoch scores shrink more for students with fewer resources.
        let mut decline: f64 = rng.gen_range(-0.10..0.15);
        if student.school == SchoolTier::Poor {
            decline += 0.08;
        }
        if student.num_computers == 0 {
            decline += 0.10;
        }
        if student.covid_positive {
            decline += 0.05;
        }

        let baselines: [f64; 6] = std::array::from_fn(|_| rng.gen_range(55.0..95.0));
        for time_period in 0..PERIODS_PER_STUDENT {
            let factor = if time_period < 3 { 1.0 } else { 1.0 - decline };
            let record_id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
            let mut score =
                |base: f64| (base * factor + rng.gen_range(-3.0..3.0)).clamp(0.0, 100.0).round();
            performances.push(PerformanceRecord {
                id: record_id,
                student_id: id,
                time_period,
                reading: score(baselines[0]),
                writing: score(baselines[1]),
                math: score(baselines[2]),
                reading_sl: score(baselines[3]),
                writing_sl: score(baselines[4]),
                math_sl: score(baselines[5]),
            });
        }
        students.push(student);
    }

    (students, performances)
}

pub async fn seed(pool: &PgPool, count: i32, rng_seed: u64) -> anyhow::Result<usize> {
    let (students, performances) = generate_population(count, rng_seed);
    let mut tx = pool.begin().await?;

    for student in &students {
        upsert_student(&mut tx, student).await?;
    }
    for record in &performances {
        upsert_performance(&mut tx, record).await?;
    }

    tx.commit().await?;
    tracing::info!(
        students = students.len(),
        performances = performances.len(),
        "seeded synthetic cohort"
    );
    Ok(students.len())
}

async fn upsert_student(conn: &mut PgConnection, student: &Student) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO cohort_shift.students
        (id, school, gender, grade_level, household_income, free_lunch,
         num_computers, family_size, father_educ, mother_educ, covid_positive)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO UPDATE
        SET school = EXCLUDED.school,
            gender = EXCLUDED.gender,
            grade_level = EXCLUDED.grade_level,
            household_income = EXCLUDED.household_income,
            free_lunch = EXCLUDED.free_lunch,
            num_computers = EXCLUDED.num_computers,
            family_size = EXCLUDED.family_size,
            father_educ = EXCLUDED.father_educ,
            mother_educ = EXCLUDED.mother_educ,
            covid_positive = EXCLUDED.covid_positive
        "#,
    )
    .bind(student.id)
    .bind(student.school.is_school_b())
    .bind(student.gender.is_female())
    .bind(student.grade_level)
    .bind(student.household_income)
    .bind(student.free_lunch)
    .bind(student.num_computers)
    .bind(student.family_size)
    .bind(student.father_education.code())
    .bind(student.mother_education.code())
    .bind(student.covid_positive)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

async fn upsert_performance(
    conn: &mut PgConnection,
    record: &PerformanceRecord,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO cohort_shift.performances
        (id, student_id, time_period, reading, writing, math, reading_sl, writing_sl, math_sl)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (student_id, time_period) DO UPDATE
        SET reading = EXCLUDED.reading,
            writing = EXCLUDED.writing,
            math = EXCLUDED.math,
            reading_sl = EXCLUDED.reading_sl,
            writing_sl = EXCLUDED.writing_sl,
            math_sl = EXCLUDED.math_sl
        "#,
    )
    .bind(record.id)
    .bind(record.student_id)
    .bind(record.time_period)
    .bind(record.reading)
    .bind(record.writing)
    .bind(record.math)
    .bind(record.reading_sl)
    .bind(record.writing_sl)
    .bind(record.math_sl)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn count_students(pool: &PgPool) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query("SELECT COUNT(*) AS total FROM cohort_shift.students")
        .fetch_one(pool)
        .await?
        .get("total");
    Ok(count)
}

fn student_from_row(row: &PgRow) -> anyhow::Result<Student> {
    Ok(Student {
        id: row.get("id"),
        school: SchoolTier::from_flag(row.get("school")),
        gender: Gender::from_flag(row.get("gender")),
        grade_level: row.get("grade_level"),
        household_income: row.get("household_income"),
        free_lunch: row.get("free_lunch"),
        num_computers: row.get("num_computers"),
        family_size: row.get("family_size"),
        father_education: EducationLevel::from_code(row.get("father_educ"))?,
        mother_education: EducationLevel::from_code(row.get("mother_educ"))?,
        covid_positive: row.get("covid_positive"),
    })
}

pub async fn fetch_students(pool: &PgPool, filter: &StudentFilter) -> anyhow::Result<Vec<Student>> {
    let mut query = String::from(
        "SELECT id, school, gender, grade_level, household_income, free_lunch, \
         num_computers, family_size, father_educ, mother_educ, covid_positive \
         FROM cohort_shift.students",
    );
    if filter.id.is_some() {
        query.push_str(" WHERE id = $1");
    }
    query.push_str(" ORDER BY id");

    let mut rows = sqlx::query(&query);
    if let Some(id) = filter.id {
        rows = rows.bind(id);
    }

    let records = rows.fetch_all(pool).await?;
    records.iter().map(student_from_row).collect()
}

/// Performance records ordered by `(student_id, time_period)`.
pub async fn fetch_performances(
    pool: &PgPool,
    filter: &PerformanceFilter,
) -> anyhow::Result<Vec<PerformanceRecord>> {
    let mut query = String::from(
        "SELECT id, student_id, time_period, reading, writing, math, \
         reading_sl, writing_sl, math_sl \
         FROM cohort_shift.performances WHERE TRUE",
    );
    let mut placeholder = 0;
    if filter.student_id.is_some() {
        placeholder += 1;
        query.push_str(&format!(" AND student_id = ${placeholder}"));
    }
    if filter.periods.is_some() {
        query.push_str(&format!(
            " AND time_period BETWEEN ${} AND ${}",
            placeholder + 1,
            placeholder + 2
        ));
    }
    query.push_str(" ORDER BY student_id, time_period");

    let mut rows = sqlx::query(&query);
    if let Some(student_id) = filter.student_id {
        rows = rows.bind(student_id);
    }
    if let Some(periods) = &filter.periods {
        rows = rows.bind(*periods.start()).bind(*periods.end());
    }

    let records = rows.fetch_all(pool).await?;
    let mut performances = Vec::with_capacity(records.len());

    for row in records {
        performances.push(PerformanceRecord {
            id: row.get("id"),
            student_id: row.get("student_id"),
            time_period: row.get("time_period"),
            reading: row.get("reading"),
            writing: row.get("writing"),
            math: row.get("math"),
            reading_sl: row.get("reading_sl"),
            writing_sl: row.get("writing_sl"),
            math_sl: row.get("math_sl"),
        });
    }

    tracing::debug!(rows = performances.len(), "fetched performance records");
    Ok(performances)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub students: usize,
    pub performances: usize,
}

#[derive(Debug, serde::Deserialize)]
struct StudentCsvRow {
    id: i32,
    school: bool,
    gender: bool,
    grade_level: i32,
    household_income: i64,
    free_lunch: bool,
    num_computers: i32,
    family_size: i32,
    father_educ: i32,
    mother_educ: i32,
    covid_positive: bool,
}

#[derive(Debug, serde::Deserialize)]
struct PerformanceCsvRow {
    student_id: i32,
    time_period: i32,
    reading: f64,
    writing: f64,
    math: f64,
    reading_sl: f64,
    writing_sl: f64,
    math_sl: f64,
}

pub async fn import_csv(
    pool: &PgPool,
    students_csv: Option<&Path>,
    performances_csv: Option<&Path>,
) -> anyhow::Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    let mut tx = pool.begin().await?;

    if let Some(path) = students_csv {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        for result in reader.deserialize::<StudentCsvRow>() {
            let row = result?;
            let student = Student {
                id: row.id,
                school: SchoolTier::from_flag(row.school),
                gender: Gender::from_flag(row.gender),
                grade_level: row.grade_level,
                household_income: row.household_income,
                free_lunch: row.free_lunch,
                num_computers: row.num_computers,
                family_size: row.family_size,
                father_education: EducationLevel::from_code(row.father_educ)?,
                mother_education: EducationLevel::from_code(row.mother_educ)?,
                covid_positive: row.covid_positive,
            };
            if upsert_student(&mut tx, &student).await? > 0 {
                summary.students += 1;
            }
        }
    }

    if let Some(path) = performances_csv {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        for result in reader.deserialize::<PerformanceCsvRow>() {
            let row = result?;
            Epoch::of_period(row.time_period)
                .with_context(|| format!("student {} has a bad time period", row.student_id))?;
            let record = PerformanceRecord {
                id: Uuid::new_v4(),
                student_id: row.student_id,
                time_period: row.time_period,
                reading: row.reading,
                writing: row.writing,
                math: row.math,
                reading_sl: row.reading_sl,
                writing_sl: row.writing_sl,
                math_sl: row.math_sl,
            };
            if upsert_performance(&mut tx, &record).await? > 0 {
                summary.performances += 1;
            }
        }
    }

    tx.commit().await?;
    tracing::info!(
        students = summary.students,
        performances = summary.performances,
        "imported csv rows"
    );
    Ok(summary)
}
