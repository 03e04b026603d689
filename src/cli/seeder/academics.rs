use std::time::Instant;

use rayon::prelude::*;
use schoolyard_core::EntityKind;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::BATCH_SIZE;
use super::models::{ClassSeed, SectionSeed, SubjectSeed};

const SECTION_NAMES: [&str; 10] = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"];

const SUBJECTS: [(&str, &str); 10] = [
    ("Mathematics", "MATH"),
    ("English", "ENG"),
    ("Science", "SCI"),
    ("Social Studies", "SOC"),
    ("Art", "ART"),
    ("Music", "MUS"),
    ("Physical Education", "PE"),
    ("Computer Studies", "CS"),
    ("French", "FRE"),
    ("Religious Studies", "RS"),
];

pub fn generate_classes(count: usize) -> Vec<ClassSeed> {
    (1..=count)
        .map(|grade| ClassSeed {
            name: format!("Grade {}", grade),
            description: Some(format!("Pupils in their year {}", grade)),
        })
        .collect()
}

pub fn generate_sections(class_ids: &[Uuid], per_class: usize) -> Vec<SectionSeed> {
    class_ids
        .par_iter()
        .flat_map(|&class_id| {
            (0..per_class)
                .map(|i| SectionSeed {
                    name: SECTION_NAMES
                        .get(i)
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| format!("Section {}", i + 1)),
                    class_id,
                    capacity: Some(30),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

pub fn generate_subjects(class_ids: &[Uuid], per_class: usize) -> Vec<SubjectSeed> {
    class_ids
        .par_iter()
        .enumerate()
        .flat_map(|(grade, &class_id)| {
            SUBJECTS
                .iter()
                .take(per_class)
                .map(|(name, prefix)| SubjectSeed {
                    name: name.to_string(),
                    subject_code: format!("{}-{}", prefix, grade + 1),
                    class_id,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Inserts classes and returns the ids of the ones that were new.
pub async fn seed_classes(db: &PgPool, count: usize) -> anyhow::Result<Vec<Uuid>> {
    let start_time = Instant::now();
    println!("🏫 Seeding {} classes...", count);

    let classes = generate_classes(count);
    if classes.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO classes (code, name, description) ");
    builder.push_values(&classes, |mut row, class| {
        row.push_bind(EntityKind::Class.new_code())
            .push_bind(&class.name)
            .push_bind(&class.description);
    });
    builder.push(" ON CONFLICT DO NOTHING RETURNING id");
    let ids = builder.build_query_scalar::<Uuid>().fetch_all(db).await?;

    println!("   ✓ Inserted {} classes in {:?}", ids.len(), start_time.elapsed());
    Ok(ids)
}

pub async fn seed_sections(
    db: &PgPool,
    class_ids: &[Uuid],
    per_class: usize,
) -> anyhow::Result<usize> {
    let start_time = Instant::now();
    println!(
        "🌿 Seeding {} sections ({} per class)...",
        class_ids.len() * per_class,
        per_class
    );

    let sections = generate_sections(class_ids, per_class);
    let mut tx = db.begin().await?;
    let mut inserted = 0;

    for chunk in sections.chunks(BATCH_SIZE) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO sections (code, name, class_id, capacity) ");
        builder.push_values(chunk, |mut row, section| {
            row.push_bind(EntityKind::Section.new_code())
                .push_bind(&section.name)
                .push_bind(section.class_id)
                .push_bind(section.capacity);
        });
        builder.push(" ON CONFLICT DO NOTHING");
        inserted += builder.build().execute(&mut *tx).await?.rows_affected() as usize;
    }

    tx.commit().await?;
    println!("   ✓ Inserted {} sections in {:?}", inserted, start_time.elapsed());
    Ok(inserted)
}

pub async fn seed_subjects(
    db: &PgPool,
    class_ids: &[Uuid],
    per_class: usize,
) -> anyhow::Result<usize> {
    let start_time = Instant::now();
    let per_class = per_class.min(SUBJECTS.len());
    println!(
        "📚 Seeding {} subjects ({} per class)...",
        class_ids.len() * per_class,
        per_class
    );

    let subjects = generate_subjects(class_ids, per_class);
    let mut tx = db.begin().await?;
    let mut inserted = 0;

    for chunk in subjects.chunks(BATCH_SIZE) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO subjects (code, name, subject_code, class_id) ");
        builder.push_values(chunk, |mut row, subject| {
            row.push_bind(EntityKind::Subject.new_code())
                .push_bind(&subject.name)
                .push_bind(&subject.subject_code)
                .push_bind(subject.class_id);
        });
        builder.push(" ON CONFLICT DO NOTHING");
        inserted += builder.build().execute(&mut *tx).await?.rows_affected() as usize;
    }

    tx.commit().await?;
    println!("   ✓ Inserted {} subjects in {:?}", inserted, start_time.elapsed());
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_fall_back_to_numbered_names() {
        let class_id = Uuid::new_v4();
        let sections = generate_sections(&[class_id], 12);
        assert_eq!(sections.len(), 12);
        assert_eq!(sections[0].name, "A");
        assert_eq!(sections[9].name, "J");
        assert_eq!(sections[10].name, "Section 11");
    }

    #[test]
    fn test_subject_codes_carry_the_grade() {
        let classes = [Uuid::new_v4(), Uuid::new_v4()];
        let subjects = generate_subjects(&classes, 2);
        assert_eq!(subjects.len(), 4);

        let second_grade: Vec<_> = subjects
            .iter()
            .filter(|s| s.class_id == classes[1])
            .map(|s| s.subject_code.as_str())
            .collect();
        assert_eq!(second_grade, vec!["MATH-2", "ENG-2"]);
    }
}
