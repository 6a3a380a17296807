use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{Course, Student, StudentPatch};

const STUDENT_COLUMNS: &str = "id, reg_no, full_name, certificate_number, contact_number, \
    course_name, file, created_at, updated_at";

/// Takes the write lock up front. A deferred transaction that reads before
/// writing fails with SQLITE_BUSY instead of waiting when another writer overlaps.
const WRITE_TRANSACTION: &str = "BEGIN IMMEDIATE";

/// Result of a write against a student key.
#[derive(Debug, Clone)]
pub struct Upserted {
    pub student: Student,
    pub created: bool,
    /// File reference held before the write, if any.
    pub previous_file: Option<String>,
}

/// Escapes `%`, `_` and `\` so user input is matched literally by `LIKE ... ESCAPE '\'`.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub async fn find_student_by_reg_no(
    db: &SqlitePool,
    reg_no: &str,
) -> Result<Option<Student>, sqlx::Error> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE reg_no = ?");
    sqlx::query_as::<_, Student>(&sql)
        .bind(reg_no)
        .fetch_optional(db)
        .await
}

/// First student (insertion order) whose reg_no, full_name or certificate_number
/// contains `query`, ignoring ASCII case.
pub async fn search_student(db: &SqlitePool, query: &str) -> Result<Option<Student>, sqlx::Error> {
    let pattern = format!("%{}%", escape_like(query));
    let sql = format!(
        r#"
        SELECT {STUDENT_COLUMNS}
        FROM students
        WHERE reg_no LIKE ? ESCAPE '\'
           OR full_name LIKE ? ESCAPE '\'
           OR certificate_number LIKE ? ESCAPE '\'
        ORDER BY rowid
        LIMIT 1
        "#
    );

    sqlx::query_as::<_, Student>(&sql)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_optional(db)
        .await
}

pub async fn student_exists(db: &SqlitePool, reg_no: &str) -> Result<bool, sqlx::Error> {
    let found: i64 =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM students WHERE reg_no = ?)")
            .bind(reg_no)
            .fetch_one(db)
            .await?;
    Ok(found != 0)
}

pub async fn count_students(db: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM students")
        .fetch_one(db)
        .await
}

/// Creates the student or merges `patch` into the existing row in one
/// conflict-resolving statement. `file`, when given, replaces the stored reference.
pub async fn upsert_student(
    db: &SqlitePool,
    reg_no: &str,
    patch: &StudentPatch,
    file: Option<&str>,
) -> Result<Upserted, sqlx::Error> {
    let mut tx = db.begin_with(WRITE_TRANSACTION).await?;

    let previous: Option<Option<String>> =
        sqlx::query_scalar("SELECT file FROM students WHERE reg_no = ?")
            .bind(reg_no)
            .fetch_optional(&mut *tx)
            .await?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    let sql = format!(
        r#"
        INSERT INTO students
            (id, reg_no, full_name, certificate_number, contact_number,
            course_name, file, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(reg_no) DO UPDATE SET
            full_name = COALESCE(excluded.full_name, students.full_name),
            certificate_number = COALESCE(excluded.certificate_number, students.certificate_number),
            contact_number = COALESCE(excluded.contact_number, students.contact_number),
            course_name = COALESCE(excluded.course_name, students.course_name),
            file = COALESCE(excluded.file, students.file),
            updated_at = excluded.updated_at
        RETURNING {STUDENT_COLUMNS}
        "#
    );

    let student = sqlx::query_as::<_, Student>(&sql)
        .bind(&id)
        .bind(reg_no)
        .bind(&patch.full_name)
        .bind(&patch.certificate_number)
        .bind(&patch.contact_number)
        .bind(&patch.course_name)
        .bind(file)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Upserted {
        student,
        created: previous.is_none(),
        previous_file: previous.flatten(),
    })
}

/// Merges `patch` into an existing student. Returns `None` if the key is unknown.
/// The key itself is never changed.
pub async fn update_student(
    db: &SqlitePool,
    reg_no: &str,
    patch: &StudentPatch,
    file: Option<&str>,
) -> Result<Option<Upserted>, sqlx::Error> {
    let mut tx = db.begin_with(WRITE_TRANSACTION).await?;

    let previous = match sqlx::query_scalar::<_, Option<String>>(
        "SELECT file FROM students WHERE reg_no = ?",
    )
    .bind(reg_no)
    .fetch_optional(&mut *tx)
    .await?
    {
        Some(file) => file,
        None => return Ok(None),
    };

    let now = Utc::now().to_rfc3339();
    let sql = format!(
        r#"
        UPDATE students
        SET full_name = COALESCE(?, full_name),
            certificate_number = COALESCE(?, certificate_number),
            contact_number = COALESCE(?, contact_number),
            course_name = COALESCE(?, course_name),
            file = COALESCE(?, file),
            updated_at = ?
        WHERE reg_no = ?
        RETURNING {STUDENT_COLUMNS}
        "#
    );

    let student = sqlx::query_as::<_, Student>(&sql)
        .bind(&patch.full_name)
        .bind(&patch.certificate_number)
        .bind(&patch.contact_number)
        .bind(&patch.course_name)
        .bind(file)
        .bind(&now)
        .bind(reg_no)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Some(Upserted {
        student,
        created: false,
        previous_file: previous,
    }))
}

pub async fn delete_student(db: &SqlitePool, reg_no: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM students WHERE reg_no = ?")
        .bind(reg_no)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

/// Distinct course names starting with `prefix` (ASCII case-insensitive),
/// in order of first appearance.
pub async fn suggest_course_names(
    db: &SqlitePool,
    prefix: &str,
    limit: i64,
) -> Result<Vec<String>, sqlx::Error> {
    let pattern = format!("{}%", escape_like(prefix));
    sqlx::query_scalar(
        r#"
        SELECT name
        FROM courses
        WHERE name LIKE ? ESCAPE '\'
        GROUP BY name
        ORDER BY MIN(id)
        LIMIT ?
        "#,
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(db)
    .await
}

pub async fn insert_course(db: &SqlitePool, name: &str) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>("INSERT INTO courses (name) VALUES (?) RETURNING id, name")
        .bind(name)
        .fetch_one(db)
        .await
}

pub async fn course_exists(db: &SqlitePool, name: &str) -> Result<bool, sqlx::Error> {
    let found: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM courses WHERE name = ?)")
        .bind(name)
        .fetch_one(db)
        .await?;
    Ok(found != 0)
}
