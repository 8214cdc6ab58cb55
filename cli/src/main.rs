//! articheck - headless articulation lookup.
//!
//! One-shot driver over the engine: resolve a university and course from
//! free-text queries, then print every community-college path that
//! satisfies the course's transfer requirement.
//!
//! ```text
//! articheck "uc davis" "math 21"
//! ```
//!
//! The interactive autocomplete surface lives elsewhere; this binary
//! exists to exercise the full stack (config -> HTTP source -> controller
//! -> resolver) from a terminal.

use anyhow::{Context, Result, bail};

use articheck_config::Config;
use articheck_engine::{SelectionController, shorten_university_name};
use articheck_providers::HttpSource;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_else(|_| EnvFilter::new("error"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let (Some(university_query), Some(course_query)) = (args.next(), args.next()) else {
        bail!("usage: articheck <university> <course>");
    };

    let config = Config::load().context("loading configuration")?;
    let source = HttpSource::new(config.endpoints);
    let mut controller = SelectionController::new(source);

    controller.start();
    controller.process_until_idle().await;

    controller.set_university_search(university_query.as_str());
    let Some((name, id)) = controller
        .search_institutions()
        .first()
        .map(|entry| (entry.name.clone(), entry.id.clone()))
    else {
        bail!("no university matches {university_query:?}");
    };
    controller.select_university(&name, id);
    controller.process_until_idle().await;
    if let Some(error) = controller.last_error() {
        bail!("failed to load courses for {name}: {error}");
    }

    controller.set_course_search(course_query.as_str());
    let Some((code, course_id)) = controller
        .search_courses()
        .first()
        .map(|course| (course.code.clone(), course.id.clone()))
    else {
        bail!("no course at {name} matches {course_query:?}");
    };
    controller.select_course(&code, course_id);
    controller.process_until_idle().await;
    if let Some(error) = controller.last_error() {
        bail!("failed to load articulations for {code}: {error}");
    }

    println!("{} - {code}", shorten_university_name(&name));

    let Some(matrix) = controller.matrix() else {
        bail!("no articulation data for {code}");
    };
    if matrix.is_empty() {
        println!("  no community college articulates this course");
        return Ok(());
    }

    for entry in &matrix.colleges {
        println!("\n{}", controller.college_name(&entry.college));
        if entry.groups.is_empty() {
            println!("  (no articulation)");
            continue;
        }
        for (i, group) in entry.groups.iter().enumerate() {
            if i > 0 {
                println!("  -- or --");
            }
            for course in group {
                println!("  {} ({})", course.code, course.name);
            }
        }
    }

    Ok(())
}
