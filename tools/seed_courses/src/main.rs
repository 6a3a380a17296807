use std::collections::HashSet;
use std::env;

use certificate_backend::db::{self, repository};
use dotenvy::dotenv;

fn is_dry_run() -> bool {
    !env::args().any(|a| a == "--apply")
}

fn source_path() -> Option<String> {
    env::args().skip(1).find(|a| !a.starts_with("--"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let path = source_path().ok_or("usage: seed_courses <names.txt> [--apply]")?;
    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://students.db".to_string());

    let contents = tokio::fs::read_to_string(&path).await?;
    let names = unique_names(&contents);

    let pool = db::connect(&database_url).await?;
    let dry_run = is_dry_run();

    let mut inserted = 0;

    for name in &names {
        if repository::course_exists(&pool, name).await? {
            continue;
        }

        if dry_run {
            println!("[DRY RUN] Would insert course {:?}", name);
        } else {
            let course = repository::insert_course(&pool, name).await?;
            println!("Inserted course {} -> {:?}", course.id, course.name);
        }

        inserted += 1;
    }

    println!("Courses inserted: {} / {}", inserted, names.len());

    pool.close().await;
    Ok(())
}

/// Non-blank lines, trimmed, first occurrence wins.
fn unique_names(contents: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect()
}
