//! Generic listing pipeline.
//!
//! Each entity describes itself once with a static [`ListSpec`]: which
//! columns it exposes, which ones a keyword searches, which ones it can be
//! sorted by and which related records `populate` embeds. [`ListQuery`]
//! validates the caller's [`ListParams`] against that description and
//! renders two statements from it:
//!
//! - the page query, returning one `jsonb` document per row
//! - the count query, mirroring the filters and keyword without joins or window
//!
//! ```text
//! SELECT jsonb_build_object('id', sc.id, ...) AS doc
//! FROM sections sc
//! LEFT JOIN classes cl ON cl.id = sc.class_id      -- populate only
//! WHERE TRUE AND sc.class_id = $1 AND (sc.name ILIKE $2 ESCAPE '\')
//! ORDER BY sc.created_at DESC, sc.id DESC
//! LIMIT $3 OFFSET $4
//! ```
//!
//! Identifiers are never taken from the request: sort keys and projected
//! fields are looked up in the static description and only values are bound.

use anyhow::anyhow;
use schoolyard_core::codes::EntityKey;
use schoolyard_core::pagination::{ListParams, Page, SortOrder, Window};
use schoolyard_core::{AppError, EntityKind};
use serde_json::Value;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

/// A projected column: the JSON key and the SQL expression producing it.
#[derive(Debug)]
pub struct Field {
    pub key: &'static str,
    pub expr: &'static str,
}

pub const fn field(key: &'static str, expr: &'static str) -> Field {
    Field { key, expr }
}

/// A related record embedded when `populate=true`.
///
/// `expr` must evaluate to a JSON value (or NULL) and may reference the
/// base alias and the alias introduced by `join`.
#[derive(Debug)]
pub struct Relation {
    pub key: &'static str,
    pub join: Option<&'static str>,
    pub expr: &'static str,
}

/// Static description of a listable entity.
#[derive(Debug)]
pub struct ListSpec {
    pub kind: EntityKind,
    pub table: &'static str,
    pub alias: &'static str,
    pub fields: &'static [Field],
    pub search: &'static [&'static str],
    pub sortable: &'static [Field],
    pub default_sort: &'static str,
    pub relations: &'static [Relation],
}

impl ListSpec {
    fn sort_expr(&self, key: &str) -> Option<&'static str> {
        self.sortable.iter().find(|f| f.key == key).map(|f| f.expr)
    }

    fn allowed_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .map(|f| f.key)
            .chain(self.relations.iter().map(|r| r.key))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Uuid(Uuid),
    Text(String),
    Bool(bool),
    Int(i64),
}

/// Exact-match condition on a column of the base table.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(column: &'static str, value: FilterValue) -> Self {
        Self { column, value }
    }
}

/// Collects the filters that were actually supplied.
#[derive(Debug, Default)]
pub struct Filters(Vec<Filter>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(mut self, column: &'static str, value: Option<Uuid>) -> Self {
        if let Some(v) = value {
            self.0.push(Filter::new(column, FilterValue::Uuid(v)));
        }
        self
    }

    pub fn text(mut self, column: &'static str, value: Option<&str>) -> Self {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.0.push(Filter::new(column, FilterValue::Text(v.to_string())));
        }
        self
    }

    pub fn boolean(mut self, column: &'static str, value: Option<bool>) -> Self {
        if let Some(v) = value {
            self.0.push(Filter::new(column, FilterValue::Bool(v)));
        }
        self
    }

    pub fn int(mut self, column: &'static str, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.0.push(Filter::new(column, FilterValue::Int(v)));
        }
        self
    }

    pub fn into_vec(self) -> Vec<Filter> {
        self.0
    }
}

/// Escapes `%`, `_` and `\` so the keyword matches literally inside `ILIKE`.
pub fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Validated listing request for one entity.
#[derive(Debug)]
pub struct ListQuery {
    spec: &'static ListSpec,
    filters: Vec<Filter>,
    keyword: Option<String>,
    sort_expr: &'static str,
    sort_order: SortOrder,
    window: Window,
    columns: Vec<&'static Field>,
    relations: Vec<&'static Relation>,
}

impl ListQuery {
    /// Checks the raw parameters against `spec`; anything outside its
    /// whitelists is a 400.
    pub fn new(
        spec: &'static ListSpec,
        params: &ListParams,
        filters: Vec<Filter>,
    ) -> Result<Self, AppError> {
        let window = params.window().map_err(|e| AppError::bad_request(anyhow!(e)))?;
        let sort_order = params.sort_order().map_err(|e| AppError::bad_request(anyhow!(e)))?;

        let sort_key = params
            .sort_by
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(spec.default_sort);
        let sort_expr = spec.sort_expr(sort_key).ok_or_else(|| {
            let allowed: Vec<&str> = spec.sortable.iter().map(|f| f.key).collect();
            AppError::bad_request(anyhow!(
                "Cannot sort by '{}'. Allowed: {}",
                sort_key,
                allowed.join(", ")
            ))
        })?;

        let requested = params.fields();
        if let Some(requested) = &requested {
            let allowed = spec.allowed_fields();
            if let Some(unknown) = requested.iter().find(|f| !allowed.contains(&f.as_str())) {
                return Err(AppError::bad_request(anyhow!(
                    "Unknown field '{}'. Allowed: {}",
                    unknown,
                    allowed.join(", ")
                )));
            }
        }

        let wanted = |key: &str| {
            requested
                .as_ref()
                .is_none_or(|fields| fields.iter().any(|f| f == key))
        };

        let columns = spec
            .fields
            .iter()
            .filter(|f| f.key == "id" || f.key == "code" || wanted(f.key))
            .collect();

        let relations = if params.populate() {
            spec.relations.iter().filter(|r| wanted(r.key)).collect()
        } else {
            Vec::new()
        };

        Ok(Self {
            spec,
            filters,
            keyword: params.keyword().map(str::to_string),
            sort_expr,
            sort_order,
            window,
            columns,
            relations,
        })
    }

    pub fn window(&self) -> Window {
        self.window
    }

    fn push_document(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        push_document(qb, &self.columns, &self.relations);
    }

    fn push_conditions(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push(" WHERE TRUE");

        for filter in &self.filters {
            qb.push(format!(" AND {}.{} = ", self.spec.alias, filter.column));
            match &filter.value {
                FilterValue::Uuid(v) => qb.push_bind(*v),
                FilterValue::Text(v) => qb.push_bind(v.clone()),
                FilterValue::Bool(v) => qb.push_bind(*v),
                FilterValue::Int(v) => qb.push_bind(*v),
            };
        }

        if let Some(keyword) = self.keyword.as_ref().filter(|_| !self.spec.search.is_empty()) {
            let pattern = like_pattern(keyword);
            qb.push(" AND (");
            for (i, column) in self.spec.search.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(format!("{} ILIKE ", column));
                qb.push_bind(pattern.clone());
                qb.push(" ESCAPE '\\'");
            }
            qb.push(")");
        }
    }

    /// The page query: one `doc` column per row.
    pub fn select_builder(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        self.push_document(&mut qb);
        qb.push(format!(" AS doc FROM {} {}", self.spec.table, self.spec.alias));

        for relation in &self.relations {
            if let Some(join) = relation.join {
                qb.push(" ").push(join);
            }
        }

        self.push_conditions(&mut qb);

        let order = self.sort_order.as_sql();
        qb.push(format!(
            " ORDER BY {} {}, {}.id {}",
            self.sort_expr, order, self.spec.alias, order
        ));

        if let (Some(limit), Some(offset)) = (self.window.limit(), self.window.offset()) {
            qb.push(" LIMIT ").push_bind(limit);
            qb.push(" OFFSET ").push_bind(offset);
        }

        qb
    }

    /// The count query: same filters and keyword, no joins, no window.
    pub fn count_builder(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT COUNT(*) FROM {} {}",
            self.spec.table, self.spec.alias
        ));
        self.push_conditions(&mut qb);
        qb
    }
}

fn push_document(
    qb: &mut QueryBuilder<'static, Postgres>,
    columns: &[&'static Field],
    relations: &[&'static Relation],
) {
    qb.push("jsonb_build_object(");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(format!("'{}', {}", column.key, column.expr));
    }
    qb.push(")");

    if !relations.is_empty() {
        qb.push(" || jsonb_build_object(");
        for (i, relation) in relations.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(format!("'{}', {}", relation.key, relation.expr));
        }
        qb.push(")");
    }
}

/// Runs the page and count queries and assembles a [`Page`].
#[instrument(skip(db, query), fields(db.table = %query.spec.table, db.operation = "SELECT"))]
pub async fn fetch_page(db: &PgPool, query: &ListQuery) -> Result<Page<Value>, AppError> {
    let mut select = query.select_builder();
    let items: Vec<Value> = select
        .build_query_scalar::<Value>()
        .fetch_all(db)
        .await?;

    let mut count = query.count_builder();
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(db).await?;

    debug!(returned = items.len(), total = total, "Listing fetched");

    Ok(Page::new(items, total, query.window()))
}

/// Builds the single-record document query for `key`, sharing the listing's
/// projection and relations.
pub fn document_builder(
    spec: &'static ListSpec,
    key: &EntityKey,
    populate: bool,
) -> QueryBuilder<'static, Postgres> {
    let columns: Vec<&'static Field> = spec.fields.iter().collect();
    let relations: Vec<&'static Relation> = if populate {
        spec.relations.iter().collect()
    } else {
        Vec::new()
    };

    let mut qb = QueryBuilder::new("SELECT ");
    push_document(&mut qb, &columns, &relations);
    qb.push(format!(" AS doc FROM {} {}", spec.table, spec.alias));
    for relation in &relations {
        if let Some(join) = relation.join {
            qb.push(" ").push(join);
        }
    }

    match key {
        EntityKey::Id(id) => {
            qb.push(format!(" WHERE {}.id = ", spec.alias)).push_bind(*id);
        }
        EntityKey::Code(code) => {
            qb.push(format!(" WHERE {}.code = ", spec.alias))
                .push_bind(code.clone());
        }
    }

    qb
}

/// Fetches one record as a JSON document, 404 when it does not exist.
pub async fn fetch_document<'e, E>(
    executor: E,
    spec: &'static ListSpec,
    key: &EntityKey,
    populate: bool,
) -> Result<Value, AppError>
where
    E: PgExecutor<'e>,
{
    let mut qb = document_builder(spec, key, populate);
    qb.build_query_scalar::<Value>()
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("{} not found", spec.kind.label())))
}

#[cfg(test)]
mod tests {
    use super::*;

    static SECTIONS: ListSpec = ListSpec {
        kind: EntityKind::Section,
        table: "sections",
        alias: "sc",
        fields: &[
            field("id", "sc.id"),
            field("code", "sc.code"),
            field("name", "sc.name"),
            field("class_id", "sc.class_id"),
            field("capacity", "sc.capacity"),
            field("created_at", "sc.created_at"),
        ],
        search: &["sc.name", "sc.code"],
        sortable: &[
            field("name", "sc.name"),
            field("capacity", "sc.capacity"),
            field("created_at", "sc.created_at"),
        ],
        default_sort: "created_at",
        relations: &[Relation {
            key: "class",
            join: Some("LEFT JOIN classes cl ON cl.id = sc.class_id"),
            expr: "CASE WHEN cl.id IS NULL THEN NULL ELSE jsonb_build_object('id', cl.id, 'code', cl.code, 'name', cl.name) END",
        }],
    };

    fn params() -> ListParams {
        ListParams::default()
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("blue"), "%blue%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_default_select() {
        let query = ListQuery::new(&SECTIONS, &params(), Vec::new()).unwrap();
        let sql = query.select_builder().sql().to_string();

        assert!(sql.starts_with("SELECT jsonb_build_object('id', sc.id, 'code', sc.code"));
        assert!(sql.contains(" AS doc FROM sections sc WHERE TRUE"));
        assert!(sql.contains("ORDER BY sc.created_at DESC, sc.id DESC"));
        assert!(sql.ends_with("LIMIT $1 OFFSET $2"));
        assert!(!sql.contains("LEFT JOIN"));
    }

    #[test]
    fn test_filters_and_keyword_are_bound() {
        let mut p = params();
        p.keyword = Some("blue".into());
        let filters = Filters::new()
            .uuid("class_id", Some(Uuid::nil()))
            .text("name", None)
            .into_vec();
        let query = ListQuery::new(&SECTIONS, &p, filters).unwrap();
        let sql = query.select_builder().sql().to_string();

        assert!(sql.contains("WHERE TRUE AND sc.class_id = $1 AND (sc.name ILIKE $2 ESCAPE '\\' OR sc.code ILIKE $3 ESCAPE '\\')"));
        assert!(sql.ends_with("LIMIT $4 OFFSET $5"));
    }

    #[test]
    fn test_count_mirrors_conditions_without_window_or_joins() {
        let mut p = params();
        p.keyword = Some("blue".into());
        p.populate = Some(true);
        let filters = Filters::new().int("capacity", Some(30)).into_vec();
        let query = ListQuery::new(&SECTIONS, &p, filters).unwrap();
        let sql = query.count_builder().sql().to_string();

        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM sections sc WHERE TRUE AND sc.capacity = $1 AND (sc.name ILIKE $2 ESCAPE '\\' OR sc.code ILIKE $3 ESCAPE '\\')"
        );
    }

    #[test]
    fn test_sort_whitelist() {
        let mut p = params();
        p.sort_by = Some("capacity".into());
        p.sort_order = Some("asc".into());
        let sql = ListQuery::new(&SECTIONS, &p, Vec::new())
            .unwrap()
            .select_builder()
            .sql()
            .to_string();
        assert!(sql.contains("ORDER BY sc.capacity ASC, sc.id ASC"));

        p.sort_by = Some("name; DROP TABLE sections".into());
        let err = ListQuery::new(&SECTIONS, &p, Vec::new()).unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
        assert!(err.to_string().contains("Cannot sort by"));
    }

    #[test]
    fn test_limit_all_has_no_window() {
        let mut p = params();
        p.limit = Some("all".into());
        let query = ListQuery::new(&SECTIONS, &p, Vec::new()).unwrap();
        assert_eq!(query.window(), Window::All);
        assert!(!query.select_builder().sql().to_string().contains("LIMIT"));
    }

    #[test]
    fn test_populate_embeds_relation() {
        let mut p = params();
        p.populate = Some(true);
        let sql = ListQuery::new(&SECTIONS, &p, Vec::new())
            .unwrap()
            .select_builder()
            .sql()
            .to_string();
        assert!(sql.contains(" || jsonb_build_object('class', CASE WHEN cl.id IS NULL"));
        assert!(sql.contains("FROM sections sc LEFT JOIN classes cl ON cl.id = sc.class_id WHERE"));
    }

    #[test]
    fn test_projection_keeps_id_and_code() {
        let mut p = params();
        p.fields = Some("name".into());
        let sql = ListQuery::new(&SECTIONS, &p, Vec::new())
            .unwrap()
            .select_builder()
            .sql()
            .to_string();
        assert!(sql.starts_with(
            "SELECT jsonb_build_object('id', sc.id, 'code', sc.code, 'name', sc.name) AS doc"
        ));
    }

    #[test]
    fn test_projection_with_populate_only_embeds_requested_relations() {
        let mut p = params();
        p.populate = Some(true);
        p.fields = Some("name".into());
        let sql = ListQuery::new(&SECTIONS, &p, Vec::new())
            .unwrap()
            .select_builder()
            .sql()
            .to_string();
        assert!(!sql.contains("LEFT JOIN"));

        p.fields = Some("name,class".into());
        let sql = ListQuery::new(&SECTIONS, &p, Vec::new())
            .unwrap()
            .select_builder()
            .sql()
            .to_string();
        assert!(sql.contains("LEFT JOIN classes cl"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut p = params();
        p.fields = Some("name,password_hash".into());
        let err = ListQuery::new(&SECTIONS, &p, Vec::new()).unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
        assert!(err.to_string().contains("password_hash"));
    }

    #[test]
    fn test_bad_window_rejected() {
        let mut p = params();
        p.limit = Some("many".into());
        assert!(ListQuery::new(&SECTIONS, &p, Vec::new()).is_err());
    }

    #[test]
    fn test_page_beyond_offset_range_rejected() {
        let mut p = params();
        p.page = Some(i64::MAX);
        p.limit = Some("100".into());
        let err = ListQuery::new(&SECTIONS, &p, Vec::new()).unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_document_builder_by_key() {
        let key = EntityKey::Code("SECTION-x".into());
        let sql = document_builder(&SECTIONS, &key, false).sql().to_string();
        assert!(sql.ends_with("FROM sections sc WHERE sc.code = $1"));

        let key = EntityKey::Id(Uuid::nil());
        let sql = document_builder(&SECTIONS, &key, true).sql().to_string();
        assert!(sql.contains("LEFT JOIN classes cl"));
        assert!(sql.ends_with("WHERE sc.id = $1"));
    }
}
