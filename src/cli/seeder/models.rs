use uuid::Uuid;

pub struct CountrySeed {
    pub name: String,
    pub iso_code: String,
}

pub struct StateSeed {
    pub name: String,
    pub country_id: Uuid,
}

pub struct CitySeed {
    pub name: String,
    pub state_id: Uuid,
    pub country_id: Uuid,
}

pub struct ClassSeed {
    pub name: String,
    pub description: Option<String>,
}

pub struct SectionSeed {
    pub name: String,
    pub class_id: Uuid,
    pub capacity: Option<i32>,
}

pub struct SubjectSeed {
    pub name: String,
    pub subject_code: String,
    pub class_id: Uuid,
}

#[derive(Clone, Debug)]
pub struct SeedConfig {
    pub countries: usize,
    pub states_per_country: usize,
    pub cities_per_state: usize,
    pub classes: usize,
    pub sections_per_class: usize,
    pub subjects_per_class: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            countries: 3,
            states_per_country: 4,
            cities_per_state: 5,
            classes: 6,            // e.g., Grade 1-6
            sections_per_class: 3, // e.g., A, B, C
            subjects_per_class: 5,
        }
    }
}
