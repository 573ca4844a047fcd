//! SQLite schema introspection.
//!
//! [`DatabaseIntrospector`] reads `sqlite_schema` and the table-valued
//! pragmas (`pragma_table_xinfo`, `pragma_index_list`, `pragma_index_info`,
//! `pragma_foreign_key_list`) through any [`Executor`] and writes what it
//! finds into a [`Catalog`]. Each query is scoped by a [`Filter`], whose SQL
//! fragments are pure functions of its fields.
//!
//! SQLite has no schemas in the catalog sense; everything is written to the
//! `main` schema.

use std::collections::HashSet;

use schemata_catalog::model::{Catalog, Column, Constraint, ConstraintType, Index, Table, Trigger, View};
use schemata_catalog::naming::{compare_version_nums, is_literal, wrap_brackets};
use schemata_catalog::CatalogCache;
use schemata_core::settings::IntrospectionSettings;
use schemata_core::SchemaResult;
use schemata_sql::row::Row;
use schemata_sql::value::Value;
use schemata_sql::Executor;
use tracing::{debug, info, warn};

/// The schema every SQLite object is written to.
pub const MAIN_SCHEMA: &str = "main";

/// `object_types` entries.
pub const VIEWS: &str = "VIEWS";
pub const TABLES: &str = "TABLES";

const GENERATED_SUFFIX: &str = " GENERATED ALWAYS";

/// Scopes what the introspector reads.
///
/// Inclusive lists win over their `exclude_*` counterparts; empty sets mean
/// "everything".
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub version: String,
    pub version_nums: Vec<i64>,
    pub include_system_catalogs: bool,
    /// `PRIMARY KEY`, `UNIQUE`, `FOREIGN KEY`.
    pub constraint_types: HashSet<String>,
    /// `VIEWS`, `TABLES`.
    pub object_types: HashSet<String>,
    pub tables: Vec<String>,
    pub exclude_tables: Vec<String>,
    pub schemas: Vec<String>,
    pub exclude_schemas: Vec<String>,
    pub views: Vec<String>,
    pub exclude_views: Vec<String>,
}

impl Filter {
    /// Builds a filter from the `[introspection]` settings table.
    pub fn from_settings(settings: &IntrospectionSettings) -> Self {
        let upper = |items: &[String]| -> HashSet<String> {
            items.iter().map(|s| s.trim().to_uppercase()).collect()
        };
        Self {
            include_system_catalogs: settings.include_system_catalogs,
            constraint_types: upper(&settings.constraint_types),
            object_types: upper(&settings.object_types),
            tables: settings.tables.clone(),
            exclude_tables: settings.exclude_tables.clone(),
            views: settings.views.clone(),
            exclude_views: settings.exclude_views.clone(),
            ..Self::default()
        }
    }

    fn wants_object(&self, object_type: &str) -> bool {
        self.object_types.is_empty() || self.object_types.contains(object_type)
    }

    fn wants_constraint(&self, constraint_type: ConstraintType) -> bool {
        self.constraint_types.is_empty() || self.constraint_types.contains(constraint_type.as_str())
    }

    // ── Filter fragments ────────────────────────────────────────────

    /// Excludes SQLite's internal objects unless system catalogs are wanted.
    pub fn system_catalog_filter(&self) -> Value {
        if self.include_system_catalogs {
            return Value::expression("1 = 1", vec![]);
        }
        Value::expression(
            "tbl_name NOT LIKE 'sqlite_%' AND sql NOT LIKE 'CREATE TABLE ''%'",
            vec![],
        )
    }

    /// The table-listing variant of [`Filter::system_catalog_filter`].
    ///
    /// From SQLite 3.37 `pragma_table_list` is used, which also excludes the
    /// shadow tables behind virtual tables.
    pub fn table_system_catalog_filter(&self) -> Value {
        if self.include_system_catalogs {
            return Value::expression("1 = 1", vec![]);
        }
        if compare_version_nums(&self.version_nums, &[3, 37]).is_lt() {
            return Value::expression(
                "m.tbl_name NOT LIKE 'sqlite_%' AND m.sql NOT LIKE 'CREATE TABLE ''%'",
                vec![],
            );
        }
        Value::expression(
            "m.tbl_name NOT LIKE 'sqlite_%' AND EXISTS (
                SELECT 1
                FROM pragma_table_list AS tl
                WHERE tl.\"type\" IN ('table', 'virtual') AND tl.schema = 'main' AND tl.name = m.tbl_name
            )",
            vec![],
        )
    }

    /// Restricts `column` to the included (or not excluded) tables.
    pub fn table_filter(&self, column: &str) -> Value {
        name_filter(column, &self.tables, &self.exclude_tables)
    }

    /// Restricts `tbl_name` to the included (or not excluded) views.
    pub fn view_filter(&self) -> Value {
        name_filter("tbl_name", &self.views, &self.exclude_views)
    }

    fn scoped(&self, sql: &str) -> Value {
        Value::expression(
            sql,
            vec![
                Value::parameter("systemCatalogFilter", self.system_catalog_filter()),
                Value::parameter("tableFilter", self.table_filter("tbl_name")),
            ],
        )
    }

    /// The `UNION ALL` arm listing primary keys, or nothing if excluded.
    pub fn union_primary_key(&self) -> Value {
        if !self.wants_constraint(ConstraintType::PrimaryKey) {
            return Value::expression("", vec![]);
        }
        self.scoped(
            "UNION ALL
            SELECT
            table_name
            ,'PRIMARY KEY' AS constraint_type
            ,COALESCE(group_concat(column_name), 'ROWID') AS columns
            ,'' AS references_table
            ,'' AS references_columns
            ,'' AS update_rule
            ,'' AS delete_rule
            FROM (
                SELECT tables.tbl_name AS table_name, columns.name AS column_name
                FROM (
                    SELECT tbl_name
                    FROM sqlite_schema
                    WHERE type = 'table' AND {systemCatalogFilter} AND {tableFilter}
                ) AS tables
                CROSS JOIN pragma_table_info(tables.tbl_name) AS columns
                WHERE columns.pk > 0
                ORDER BY tables.tbl_name, columns.pk
            ) AS primary_key_columns
            GROUP BY table_name",
        )
    }

    /// The `UNION ALL` arm listing UNIQUE constraints, or nothing if excluded.
    pub fn union_unique(&self) -> Value {
        if !self.wants_constraint(ConstraintType::Unique) {
            return Value::expression("", vec![]);
        }
        self.scoped(
            "UNION ALL
            SELECT
            table_name
            ,'UNIQUE' AS constraint_type
            ,COALESCE(group_concat(column_name), '') AS columns
            ,'' AS references_table
            ,'' AS references_columns
            ,'' AS update_rule
            ,'' AS delete_rule
            FROM (
                SELECT tables.tbl_name AS table_name, indexes.name AS index_name, columns.name AS column_name
                FROM (
                    SELECT tbl_name
                    FROM sqlite_schema
                    WHERE type = 'table' AND {systemCatalogFilter} AND {tableFilter}
                ) AS tables
                CROSS JOIN pragma_index_list(tables.tbl_name) AS indexes
                CROSS JOIN pragma_index_info(indexes.name) AS columns
                WHERE indexes.\"unique\" AND indexes.origin = 'u'
                ORDER BY columns.seqno
            ) AS unique_columns
            GROUP BY table_name, index_name",
        )
    }

    /// The `UNION ALL` arm listing foreign keys, or nothing if excluded.
    pub fn union_foreign_key(&self) -> Value {
        if !self.wants_constraint(ConstraintType::ForeignKey) {
            return Value::expression("", vec![]);
        }
        self.scoped(
            "UNION ALL
            SELECT
            table_name
            ,'FOREIGN KEY' AS constraint_type
            ,COALESCE(group_concat(column_name), '') AS columns
            ,references_table
            ,COALESCE(group_concat(references_column), '') AS references_columns
            ,update_rule
            ,delete_rule
            FROM (
                SELECT
                tables.tbl_name AS table_name
                ,columns.id AS foreign_key_id
                ,columns.\"from\" AS column_name
                ,columns.\"table\" AS references_table
                ,columns.\"to\" AS references_column
                ,columns.on_update AS update_rule
                ,columns.on_delete AS delete_rule
                FROM (
                    SELECT tbl_name
                    FROM sqlite_schema
                    WHERE type = 'table' AND {systemCatalogFilter} AND {tableFilter}
                ) AS tables
                CROSS JOIN pragma_foreign_key_list(tables.tbl_name) AS columns
                ORDER BY columns.seq
            ) AS foreign_key_columns
            GROUP BY table_name, foreign_key_id, references_table, update_rule, delete_rule",
        )
    }
}

fn name_filter(column: &str, include: &[String], exclude: &[String]) -> Value {
    if !include.is_empty() {
        return Value::expression(format!("{column} IN ({})", mklist(include)), vec![]);
    }
    if !exclude.is_empty() {
        return Value::expression(format!("{column} NOT IN ({})", mklist(exclude)), vec![]);
    }
    Value::expression("1 = 1", vec![])
}

/// Quotes each non-empty name as a SQL string literal and joins them.
pub fn mklist(names: &[String]) -> String {
    names
        .iter()
        .filter(|name| !name.is_empty())
        .map(|name| format!("'{}'", name.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ")
}

fn split_list(list: &str, separator: char) -> Vec<String> {
    if list.is_empty() {
        return Vec::new();
    }
    list.split(separator).map(str::to_string).collect()
}

fn normalize_sql(sql: &str) -> String {
    sql.replace("\r\n", "\n")
}

/// Reads a SQLite database's schema into a [`Catalog`].
#[derive(Debug)]
pub struct DatabaseIntrospector<E> {
    pub executor: E,
    pub filter: Filter,
}

impl<E: Executor> DatabaseIntrospector<E> {
    pub fn new(executor: E, filter: Filter) -> Self {
        Self { executor, filter }
    }

    /// Fills `catalog` with every object the filter admits.
    ///
    /// Existing entries with the same keys are replaced; columns and
    /// constraints whose table was filtered out are skipped.
    pub async fn write_catalog(&mut self, catalog: &mut Catalog) -> SchemaResult<()> {
        let mut cache = CatalogCache::new(catalog);
        self.filter.version = self.get_version().await?;
        self.filter.version_nums = parse_version(&self.filter.version);
        catalog.version_nums.clone_from(&self.filter.version_nums);
        if catalog.current_schema.is_empty() {
            catalog.current_schema = MAIN_SCHEMA.to_string();
        }
        cache.get_or_create_schema(catalog, MAIN_SCHEMA);

        if self.filter.wants_object(VIEWS) {
            for view in self.get_views().await? {
                let schema = cache.get_or_create_schema(catalog, &view.view_schema);
                schema.views_valid = true;
                cache.add_or_update_view(schema, view);
            }
        }

        if !self.filter.wants_object(TABLES) {
            info!(version = %self.filter.version, "catalog written (views only)");
            return Ok(());
        }

        let tables = self.get_tables().await?;
        let table_count = tables.len();
        for table in tables {
            let schema = cache.get_or_create_schema(catalog, &table.table_schema);
            cache.add_or_update_table(schema, table);
        }

        for column in self.get_columns().await? {
            let Some(table) = table_mut(&cache, catalog, &column.table_schema, &column.table_name) else {
                warn!(table = %column.table_name, column = %column.column_name, "column of unknown table skipped");
                continue;
            };
            cache.add_or_update_column(table, column);
        }

        for constraint in self.get_constraints().await? {
            let Some(table) =
                table_mut(&cache, catalog, &constraint.table_schema, &constraint.table_name)
            else {
                warn!(table = %constraint.table_name, "constraint of unknown table skipped");
                continue;
            };
            cache.add_or_update_constraint(table, constraint);
        }

        for index in self.get_indexes().await? {
            let Some(table) = table_mut(&cache, catalog, &index.table_schema, &index.table_name) else {
                warn!(table = %index.table_name, index = %index.index_name, "index of unknown table skipped");
                continue;
            };
            cache.add_or_update_index(table, index);
        }

        for trigger in self.get_triggers().await? {
            let Some(table) = table_mut(&cache, catalog, &trigger.table_schema, &trigger.table_name)
            else {
                warn!(table = %trigger.table_name, trigger = %trigger.trigger_name, "trigger of unknown table skipped");
                continue;
            };
            cache.add_or_update_trigger(table, trigger);
        }

        apply_column_constraints(&cache, catalog);

        info!(
            version = %self.filter.version,
            tables = table_count,
            "catalog written"
        );
        Ok(())
    }

    pub async fn get_version(&self) -> SchemaResult<String> {
        let version = self
            .executor
            .fetch_one("SELECT {*}", vec![], |row| row.get_or_default::<String>("sqlite_version()"))
            .await?;
        Ok(version.unwrap_or_default())
    }

    /// The version split on `.`; unparsable components become -1.
    pub async fn get_version_nums(&self) -> SchemaResult<Vec<i64>> {
        Ok(parse_version(&self.get_version().await?))
    }

    pub async fn get_views(&self) -> SchemaResult<Vec<View>> {
        debug!("reading views");
        self.executor
            .fetch_all(
                "SELECT {*}
                FROM (
                    SELECT tbl_name, sql
                    FROM sqlite_schema
                    WHERE type = 'view' AND {systemCatalogFilter} AND {tableFilter}
                ) AS views
                CROSS JOIN pragma_table_xinfo(views.tbl_name) AS columns
                GROUP BY views.tbl_name, views.sql
                ORDER BY views.tbl_name",
                vec![
                    Value::parameter("systemCatalogFilter", self.filter.system_catalog_filter()),
                    Value::parameter("tableFilter", self.filter.view_filter()),
                ],
                decode_view,
            )
            .await
    }

    pub async fn get_tables(&self) -> SchemaResult<Vec<Table>> {
        debug!("reading tables");
        self.executor
            .fetch_all(
                "SELECT {*}
                FROM sqlite_schema AS m
                WHERE m.type = 'table' AND {systemCatalogFilter} AND {tableFilter}
                ORDER BY m.tbl_name",
                vec![
                    Value::parameter("systemCatalogFilter", self.filter.table_system_catalog_filter()),
                    Value::parameter("tableFilter", self.filter.table_filter("m.tbl_name")),
                ],
                decode_table,
            )
            .await
    }

    pub async fn get_columns(&self) -> SchemaResult<Vec<Column>> {
        debug!("reading columns");
        self.executor
            .fetch_all(
                "SELECT {*}
                FROM (
                    SELECT tbl_name
                    FROM sqlite_schema
                    WHERE type = 'table' AND {systemCatalogFilter} AND {tableFilter}
                ) AS tables
                CROSS JOIN pragma_table_xinfo(tables.tbl_name) AS columns
                ORDER BY tables.tbl_name, columns.cid",
                vec![
                    Value::parameter("systemCatalogFilter", self.filter.system_catalog_filter()),
                    Value::parameter("tableFilter", self.filter.table_filter("tbl_name")),
                ],
                decode_column,
            )
            .await
    }

    pub async fn get_constraints(&self) -> SchemaResult<Vec<Constraint>> {
        debug!("reading constraints");
        self.executor
            .fetch_all(
                "SELECT {*} FROM (
                SELECT
                '' AS table_name
                ,'' AS constraint_type
                ,'' AS columns
                ,'' AS references_table
                ,'' AS references_columns
                ,'' AS update_rule
                ,'' AS delete_rule
                WHERE 1 <> 1
                {unionPrimaryKey}
                {unionUnique}
                {unionForeignKey}
                ) ORDER BY table_name, columns, constraint_type",
                vec![
                    Value::parameter("unionPrimaryKey", self.filter.union_primary_key()),
                    Value::parameter("unionUnique", self.filter.union_unique()),
                    Value::parameter("unionForeignKey", self.filter.union_foreign_key()),
                ],
                decode_constraint,
            )
            .await
    }

    pub async fn get_indexes(&self) -> SchemaResult<Vec<Index>> {
        debug!("reading indexes");
        self.executor
            .fetch_all(
                "SELECT {*}
                FROM (
                    SELECT
                    tables.tbl_name AS table_name
                    ,indexes.name AS index_name
                    ,indexes.\"unique\" AS is_unique
                    ,CASE columns.cid WHEN -1 THEN '' WHEN -2 THEN '' ELSE columns.name END AS column_name
                    ,columns.seqno
                    ,m.sql
                    FROM (
                        SELECT tbl_name
                        FROM sqlite_schema
                        WHERE type = 'table' AND {systemCatalogFilter} AND {tableFilter}
                    ) AS tables
                    CROSS JOIN pragma_index_list(tables.tbl_name) AS indexes
                    CROSS JOIN pragma_index_info(indexes.name) AS columns
                    JOIN sqlite_schema AS m ON m.type = 'index' AND m.tbl_name = tables.tbl_name AND m.name = indexes.name
                    WHERE indexes.origin = 'c'
                    ORDER BY indexes.name, columns.seqno
                ) AS index_columns
                GROUP BY table_name, index_name, is_unique, sql
                ORDER BY table_name, index_name",
                vec![
                    Value::parameter("systemCatalogFilter", self.filter.system_catalog_filter()),
                    Value::parameter("tableFilter", self.filter.table_filter("tbl_name")),
                ],
                decode_index,
            )
            .await
    }

    pub async fn get_triggers(&self) -> SchemaResult<Vec<Trigger>> {
        debug!("reading triggers");
        self.executor
            .fetch_all(
                "SELECT {*}
                FROM sqlite_schema
                WHERE type = 'trigger' AND {systemCatalogFilter} AND {tableFilter}
                ORDER BY tbl_name, name",
                vec![
                    Value::parameter("systemCatalogFilter", self.filter.system_catalog_filter()),
                    Value::parameter("tableFilter", self.filter.table_filter("tbl_name")),
                ],
                decode_trigger,
            )
            .await
    }
}

fn parse_version(version: &str) -> Vec<i64> {
    if version.is_empty() {
        return Vec::new();
    }
    version
        .split('.')
        .map(|part| part.trim().parse().unwrap_or(-1))
        .collect()
}

fn table_mut<'a>(
    cache: &CatalogCache,
    catalog: &'a mut Catalog,
    schema_name: &str,
    table_name: &str,
) -> Option<&'a mut Table> {
    let schema = cache.get_schema_mut(catalog, schema_name)?;
    cache.get_table_mut(schema, table_name)
}

/// Copies single-column constraints onto their column: primary key and
/// unique flags, and foreign key references.
fn apply_column_constraints(cache: &CatalogCache, catalog: &mut Catalog) {
    for schema in &mut catalog.schemas {
        for table in &mut schema.tables {
            let constraints: Vec<Constraint> = table
                .constraints
                .iter()
                .filter(|c| !c.ignore && c.columns.len() == 1)
                .cloned()
                .collect();
            for constraint in constraints {
                let Some(column) = cache.get_column_mut(table, &constraint.columns[0]) else {
                    continue;
                };
                match constraint.constraint_type {
                    Some(ConstraintType::PrimaryKey) => column.is_primary_key = true,
                    Some(ConstraintType::Unique) => column.is_unique = true,
                    Some(ConstraintType::ForeignKey) => {
                        column.references_schema = constraint.references_schema;
                        column.references_table = constraint.references_table;
                        column.references_column =
                            constraint.references_columns.into_iter().next().unwrap_or_default();
                        column.update_rule = constraint.update_rule;
                        column.delete_rule = constraint.delete_rule;
                    }
                    Some(ConstraintType::Check) | None => {}
                }
            }
        }
    }
}

// ── Row decoders ────────────────────────────────────────────────────────

fn decode_view(row: &mut Row) -> SchemaResult<View> {
    let mut view = View::new(MAIN_SCHEMA, row.get_or_default::<String>("views.tbl_name AS view_name")?);
    view.sql = normalize_sql(&row.get_or_default::<String>("views.sql || ';' AS sql")?);
    view.columns = split_list(
        &row.get_or_default::<String>("group_concat(columns.name, '|') AS column_names")?,
        '|',
    );
    view.column_types = split_list(
        &row.get_or_default::<String>("group_concat(columns.type, '|') AS column_types")?,
        '|',
    );
    Ok(view)
}

fn decode_table(row: &mut Row) -> SchemaResult<Table> {
    let mut table = Table::new(MAIN_SCHEMA, row.get_or_default::<String>("m.tbl_name AS table_name")?);
    table.sql = normalize_sql(&row.get_or_default::<String>("m.sql || ';' AS sql")?);
    table.is_virtual = table.is_virtual_table();
    Ok(table)
}

fn decode_column(row: &mut Row) -> SchemaResult<Column> {
    let mut column = Column::new(
        MAIN_SCHEMA,
        row.get_or_default::<String>("tables.tbl_name AS table_name")?,
        row.get_or_default::<String>("columns.name AS column_name")?,
    );
    column.column_type = row.get_or_default("columns.type AS column_type")?;
    column.is_not_null = row.get_or_default("columns.\"notnull\" AS is_notnull")?;
    column.is_generated = row.get_or_default("columns.hidden IN (2, 3) AS is_generated")?;
    column.generated_expr_stored = row.get_or_default("columns.hidden = 3 AS is_stored")?;
    column.column_default = row.get_or_default("COALESCE(columns.dflt_value, '') AS column_default")?;

    if let Some(column_type) = column.column_type.strip_suffix(GENERATED_SUFFIX) {
        column.column_type = column_type.to_string();
        column.is_generated = true;
    }
    if !column.column_default.is_empty() && !is_literal(&column.column_default) {
        column.column_default = wrap_brackets(&column.column_default);
    }
    Ok(column)
}

fn decode_constraint(row: &mut Row) -> SchemaResult<Constraint> {
    let mut constraint = Constraint::new(MAIN_SCHEMA, row.get_or_default::<String>("table_name")?, "");
    constraint.constraint_type = row
        .get_or_default::<String>("constraint_type")?
        .parse()
        .ok();
    constraint.columns = split_list(&row.get_or_default::<String>("columns")?, ',');
    constraint.references_table = row.get_or_default("references_table")?;
    constraint.references_columns = split_list(&row.get_or_default::<String>("references_columns")?, ',');
    constraint.update_rule = row.get_or_default("update_rule")?;
    constraint.delete_rule = row.get_or_default("delete_rule")?;
    Ok(constraint)
}

fn decode_index(row: &mut Row) -> SchemaResult<Index> {
    let mut index = Index::new(
        MAIN_SCHEMA,
        row.get_or_default::<String>("table_name")?,
        row.get_or_default::<String>("index_name")?,
    );
    index.is_unique = row.get_or_default("is_unique")?;
    index.columns = split_list(&row.get_or_default::<String>("group_concat(column_name) AS columns")?, ',');
    index.sql = normalize_sql(&row.get_or_default::<String>("sql || ';' AS sql")?);
    Ok(index)
}

fn decode_trigger(row: &mut Row) -> SchemaResult<Trigger> {
    let mut trigger = Trigger::new(
        MAIN_SCHEMA,
        row.get_or_default::<String>("tbl_name AS table_name")?,
        row.get_or_default::<String>("name AS trigger_name")?,
    );
    trigger.sql = normalize_sql(&row.get_or_default::<String>("sql || ';' AS sql")?);
    Ok(trigger)
}
