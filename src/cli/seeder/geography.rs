use std::time::Instant;

use fake::Fake;
use fake::faker::address::en::{CityName, CountryName, StateName};
use rayon::prelude::*;
use schoolyard_core::EntityKind;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::models::{CitySeed, CountrySeed, StateSeed};
use super::{BATCH_SIZE, distinct_names};

/// Three-letter code derived from the position, `AAA`, `AAB`, ...
pub fn iso_code(index: usize) -> String {
    let mut n = index % (26 * 26 * 26);
    let mut letters = [b'A'; 3];
    for slot in letters.iter_mut().rev() {
        *slot = b'A' + (n % 26) as u8;
        n /= 26;
    }
    letters.iter().map(|&b| b as char).collect()
}

pub fn generate_countries(count: usize) -> Vec<CountrySeed> {
    distinct_names(count, || CountryName().fake())
        .into_iter()
        .enumerate()
        .map(|(i, name)| CountrySeed {
            name,
            iso_code: iso_code(i),
        })
        .collect()
}

pub fn generate_states(country_ids: &[Uuid], per_country: usize) -> Vec<StateSeed> {
    country_ids
        .par_iter()
        .flat_map(|&country_id| {
            distinct_names(per_country, || StateName().fake())
                .into_iter()
                .map(|name| StateSeed { name, country_id })
                .collect::<Vec<_>>()
        })
        .collect()
}

pub fn generate_cities(states: &[(Uuid, Uuid)], per_state: usize) -> Vec<CitySeed> {
    states
        .par_iter()
        .flat_map(|&(state_id, country_id)| {
            distinct_names(per_state, || CityName().fake())
                .into_iter()
                .map(|name| CitySeed {
                    name,
                    state_id,
                    country_id,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Inserts countries, skipping names or ISO codes that already exist.
pub async fn seed_countries(db: &PgPool, count: usize) -> anyhow::Result<Vec<Uuid>> {
    let start_time = Instant::now();
    println!("🌍 Seeding {} countries...", count);

    let countries = generate_countries(count);
    let mut tx = db.begin().await?;
    let mut ids = Vec::with_capacity(countries.len());

    for chunk in countries.chunks(BATCH_SIZE) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO countries (code, name, iso_code) ");
        builder.push_values(chunk, |mut row, country| {
            row.push_bind(EntityKind::Country.new_code())
                .push_bind(&country.name)
                .push_bind(&country.iso_code);
        });
        builder.push(" ON CONFLICT DO NOTHING RETURNING id");
        ids.extend(builder.build_query_scalar::<Uuid>().fetch_all(&mut *tx).await?);
    }

    tx.commit().await?;
    println!("   ✓ Inserted {} countries in {:?}", ids.len(), start_time.elapsed());
    Ok(ids)
}

/// Inserts states and returns `(state_id, country_id)` pairs.
pub async fn seed_states(
    db: &PgPool,
    country_ids: &[Uuid],
    per_country: usize,
) -> anyhow::Result<Vec<(Uuid, Uuid)>> {
    let start_time = Instant::now();
    println!(
        "🗺️  Seeding {} states ({} per country)...",
        country_ids.len() * per_country,
        per_country
    );

    let states = generate_states(country_ids, per_country);
    let mut tx = db.begin().await?;
    let mut rows = Vec::with_capacity(states.len());

    for chunk in states.chunks(BATCH_SIZE) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO states (code, name, country_id) ");
        builder.push_values(chunk, |mut row, state| {
            row.push_bind(EntityKind::State.new_code())
                .push_bind(&state.name)
                .push_bind(state.country_id);
        });
        builder.push(" ON CONFLICT DO NOTHING RETURNING id, country_id");
        rows.extend(
            builder
                .build_query_as::<(Uuid, Uuid)>()
                .fetch_all(&mut *tx)
                .await?,
        );
    }

    tx.commit().await?;
    println!("   ✓ Inserted {} states in {:?}", rows.len(), start_time.elapsed());
    Ok(rows)
}

pub async fn seed_cities(
    db: &PgPool,
    states: &[(Uuid, Uuid)],
    per_state: usize,
) -> anyhow::Result<usize> {
    let start_time = Instant::now();
    println!(
        "🏙️  Seeding {} cities ({} per state)...",
        states.len() * per_state,
        per_state
    );

    let cities = generate_cities(states, per_state);
    let mut tx = db.begin().await?;
    let mut inserted = 0;

    for chunk in cities.chunks(BATCH_SIZE) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO cities (code, name, state_id, country_id) ");
        builder.push_values(chunk, |mut row, city| {
            row.push_bind(EntityKind::City.new_code())
                .push_bind(&city.name)
                .push_bind(city.state_id)
                .push_bind(city.country_id);
        });
        builder.push(" ON CONFLICT DO NOTHING");
        inserted += builder.build().execute(&mut *tx).await?.rows_affected() as usize;
    }

    tx.commit().await?;
    println!("   ✓ Inserted {} cities in {:?}", inserted, start_time.elapsed());
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_iso_codes_are_distinct_letters() {
        assert_eq!(iso_code(0), "AAA");
        assert_eq!(iso_code(1), "AAB");
        assert_eq!(iso_code(27), "ABB");

        let codes: HashSet<String> = (0..500).map(iso_code).collect();
        assert_eq!(codes.len(), 500);
    }

    #[test]
    fn test_cities_keep_their_state_and_country() {
        let state = (Uuid::new_v4(), Uuid::new_v4());
        let cities = generate_cities(&[state], 3);
        assert!(!cities.is_empty());
        assert!(cities.len() <= 3);
        assert!(
            cities
                .iter()
                .all(|c| c.state_id == state.0 && c.country_id == state.1)
        );
    }
}
