//! Database seeding with fake reference data.
//!
//! Fills the lookup tables a fresh install needs before records can be
//! entered: countries, states and cities, then classes with their sections
//! and subjects. Users and students are left to the API.
//!
//! # Module Structure
//!
//! - [`geography`] - Countries, states and cities
//! - [`academics`] - Classes, sections and subjects
//! - [`models`] - Seed rows and [`SeedConfig`]
//!
//! # Performance
//!
//! - Parallel data generation using Rayon
//! - Multi-row inserts in batches of [`BATCH_SIZE`]
//! - `ON CONFLICT DO NOTHING`, so re-running only adds what is missing

pub mod academics;
pub mod geography;
pub mod models;

pub use models::SeedConfig;

use std::collections::HashSet;
use std::time::Instant;

use sqlx::PgPool;

pub const BATCH_SIZE: usize = 500;

/// Draws from `generate` until `count` case-insensitively distinct names are
/// collected, giving up after a bounded number of attempts.
pub(crate) fn distinct_names<F>(count: usize, mut generate: F) -> Vec<String>
where
    F: FnMut() -> String,
{
    let mut seen = HashSet::with_capacity(count);
    let mut names = Vec::with_capacity(count);

    for _ in 0..count.saturating_mul(10) {
        if names.len() == count {
            break;
        }
        let name = generate();
        if seen.insert(name.to_lowercase()) {
            names.push(name);
        }
    }

    names
}

/// Seeds geography and academics according to `config`.
pub async fn seed_all(db: &PgPool, config: SeedConfig) -> anyhow::Result<()> {
    let start_time = Instant::now();

    println!("🌱 Starting database seeding...");
    println!(
        "   - Countries: {}, states per country: {}, cities per state: {}",
        config.countries, config.states_per_country, config.cities_per_state
    );
    println!(
        "   - Classes: {}, sections per class: {}, subjects per class: {}",
        config.classes, config.sections_per_class, config.subjects_per_class
    );

    let country_ids = geography::seed_countries(db, config.countries).await?;
    let states = geography::seed_states(db, &country_ids, config.states_per_country).await?;
    let cities = geography::seed_cities(db, &states, config.cities_per_state).await?;

    let class_ids = academics::seed_classes(db, config.classes).await?;
    let sections = academics::seed_sections(db, &class_ids, config.sections_per_class).await?;
    let subjects = academics::seed_subjects(db, &class_ids, config.subjects_per_class).await?;

    println!(
        "\n✅ Seeding complete! {} countries, {} states, {} cities, {} classes, {} sections, {} subjects in {:?}",
        country_ids.len(),
        states.len(),
        cities,
        class_ids.len(),
        sections,
        subjects,
        start_time.elapsed()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_names_ignores_case_duplicates() {
        let mut pool = ["Lagos", "lagos", "Abuja", "LAGOS", "Kano"].into_iter();
        let names = distinct_names(3, || pool.next().unwrap_or("Lagos").to_string());
        assert_eq!(names, vec!["Lagos", "Abuja", "Kano"]);
    }

    #[test]
    fn test_distinct_names_gives_up() {
        let names = distinct_names(3, || "Same".to_string());
        assert_eq!(names, vec!["Same"]);
    }
}
