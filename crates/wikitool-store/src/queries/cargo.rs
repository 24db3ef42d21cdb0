//! Cargo schema introspection: declared tables, stores, queries, and
//! declaration/store drift.

use crate::{Database, Result};
use rusqlite::OptionalExtension;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize)]
pub struct CargoStoreRow {
    pub page_title: String,
    pub values: BTreeMap<String, String>,
    pub raw: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CargoQueryRow {
    pub page_title: String,
    pub query_type: String,
    pub tables: Vec<String>,
    pub raw: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CargoTableContext {
    pub table_name: String,
    pub declared_by: Option<String>,
    pub columns: Vec<ColumnDef>,
    pub stores: Vec<CargoStoreRow>,
    pub queries: Vec<CargoQueryRow>,
    /// How often each field occurs across this table's stores.
    pub field_usage: BTreeMap<String, i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub col_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CargoMismatch {
    pub table_name: String,
    pub page_title: String,
    pub field: String,
}

fn parse_columns(json: &str) -> Vec<ColumnDef> {
    let value: Vec<serde_json::Value> = serde_json::from_str(json).unwrap_or_default();
    value
        .into_iter()
        .filter_map(|col| {
            let name = col.get("name")?.as_str()?.to_string();
            let col_type = col
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("String")
                .to_string();
            Some(ColumnDef { name, col_type })
        })
        .collect()
}

fn parse_values(json: &str) -> BTreeMap<String, String> {
    let value: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).unwrap_or_default();
    value
        .into_iter()
        .map(|(k, v)| {
            let text = match v {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            };
            (k, text)
        })
        .collect()
}

/// Everything known about one Cargo table: its declaration, every store
/// writing into it, queries reading it, and a field-usage histogram.
pub fn get_cargo_table_context(db: &Database, table_name: &str) -> Result<CargoTableContext> {
    let conn = db.conn()?;

    let declaration: Option<(String, String)> = conn
        .prepare_cached(
            "SELECT p.title, t.columns FROM cargo_tables t \
             JOIN pages p ON p.id = t.page_id WHERE t.table_name = ?1",
        )?
        .query_row([table_name], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;

    let (declared_by, columns) = match declaration {
        Some((title, columns_json)) => (Some(title), parse_columns(&columns_json)),
        None => (None, Vec::new()),
    };

    let mut stores = Vec::new();
    let mut field_usage: BTreeMap<String, i64> = BTreeMap::new();
    {
        let mut statement = conn.prepare_cached(
            "SELECT p.title, s.values_json, s.store_raw FROM cargo_stores s \
             JOIN pages p ON p.id = s.page_id \
             WHERE s.table_name = ?1 ORDER BY p.title, s.id",
        )?;
        let rows = statement.query_map([table_name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (page_title, values_json, raw) = row?;
            let values = parse_values(&values_json);
            for field in values.keys() {
                *field_usage.entry(field.clone()).or_insert(0) += 1;
            }
            stores.push(CargoStoreRow {
                page_title,
                values,
                raw,
            });
        }
    }

    let mut queries = Vec::new();
    {
        let mut statement = conn.prepare_cached(
            "SELECT p.title, q.query_type, q.tables_json, q.query_raw FROM cargo_queries q \
             JOIN pages p ON p.id = q.page_id ORDER BY p.title, q.id",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        for row in rows {
            let (page_title, query_type, tables_json, raw) = row?;
            let tables: Vec<String> = serde_json::from_str(&tables_json).unwrap_or_default();
            if tables.iter().any(|t| t == table_name) {
                queries.push(CargoQueryRow {
                    page_title,
                    query_type,
                    tables,
                    raw,
                });
            }
        }
    }

    Ok(CargoTableContext {
        table_name: table_name.to_string(),
        declared_by,
        columns,
        stores,
        queries,
        field_usage,
    })
}

/// Store fields that the owning table's declaration does not know about.
pub fn get_cargo_schema_mismatches(db: &Database) -> Result<Vec<CargoMismatch>> {
    let declarations: BTreeMap<String, Vec<String>> = {
        let conn = db.conn()?;
        let mut statement =
            conn.prepare_cached("SELECT table_name, columns FROM cargo_tables")?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = BTreeMap::new();
        for row in rows {
            let (table, columns_json) = row?;
            let names = parse_columns(&columns_json)
                .into_iter()
                .map(|c| c.name)
                .collect();
            out.insert(table, names);
        }
        out
    };

    let mut mismatches = Vec::new();
    let conn = db.conn()?;
    let mut statement = conn.prepare_cached(
        "SELECT s.table_name, p.title, s.values_json FROM cargo_stores s \
         JOIN pages p ON p.id = s.page_id ORDER BY s.table_name, p.title",
    )?;
    let rows = statement.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    for row in rows {
        let (table, page_title, values_json) = row?;
        let Some(declared) = declarations.get(&table) else {
            continue;
        };
        for field in parse_values(&values_json).keys() {
            if !declared.contains(field) {
                mismatches.push(CargoMismatch {
                    table_name: table.clone(),
                    page_title: page_title.clone(),
                    field: field.clone(),
                });
            }
        }
    }
    Ok(mismatches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        indexer::{rebuild_index, RebuildOptions},
        migrate::run_migrations,
        pages, PageUpsert,
    };
    use wikitool_core::settings::default_site;

    fn seeded_db(entries: &[(&str, &str)]) -> Database {
        let db = Database::open_in_memory().expect("open");
        run_migrations(&db).expect("migrate");
        let site = default_site();
        for (title, content) in entries {
            pages::upsert_page(
                &db,
                &PageUpsert {
                    namespace: Some(0),
                    content: Some(content.to_string()),
                    ..PageUpsert::new(*title)
                },
            )
            .expect("insert");
        }
        rebuild_index(&db, &site, &RebuildOptions::default()).expect("rebuild");
        db
    }

    #[test]
    fn table_context_aggregates_everything() {
        let db = seeded_db(&[
            ("Decl", "{{#cargo_declare:_table=T|name=String|qty=Integer}}"),
            ("Row", "{{#cargo_store:_table=T|name=foo|qty=3}}"),
            ("Report", "{{#cargo_query:tables=T|fields=name}}"),
            ("Other", "{{#cargo_query:tables=Unrelated|fields=x}}"),
        ]);

        let context = get_cargo_table_context(&db, "T").expect("context");
        assert_eq!(context.declared_by.as_deref(), Some("Decl"));
        assert_eq!(context.columns.len(), 2);
        assert_eq!(context.columns[0].name, "name");
        assert_eq!(context.columns[0].col_type, "String");
        assert_eq!(context.stores.len(), 1);
        assert_eq!(context.stores[0].values.get("name").map(String::as_str), Some("foo"));
        assert_eq!(context.queries.len(), 1);
        assert_eq!(context.queries[0].page_title, "Report");
        assert_eq!(context.field_usage.get("qty"), Some(&1));
    }

    #[test]
    fn mismatch_detection() {
        let db = seeded_db(&[
            ("Decl", "{{#cargo_declare:_table=T|name=String|qty=Integer}}"),
            ("Row", "{{#cargo_store:_table=T|name=foo|qty=3}}"),
        ]);
        assert!(get_cargo_schema_mismatches(&db).expect("clean").is_empty());

        // A store with a field the declaration does not know.
        let site = default_site();
        pages::upsert_page(
            &db,
            &PageUpsert {
                namespace: Some(0),
                content: Some("{{#cargo_store:_table=T|name=bar|extra=1}}".to_string()),
                ..PageUpsert::new("Row2")
            },
        )
        .expect("insert");
        rebuild_index(&db, &site, &RebuildOptions::default()).expect("rebuild");

        let mismatches = get_cargo_schema_mismatches(&db).expect("mismatches");
        assert_eq!(
            mismatches,
            vec![CargoMismatch {
                table_name: "T".to_string(),
                page_title: "Row2".to_string(),
                field: "extra".to_string(),
            }]
        );
    }
}
