//! Template usage aggregation and schema inference.

use crate::{Database, Result};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct NamedParamStat {
    pub name: String,
    pub usage_count: i64,
    pub page_count: i64,
    pub example_values: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PositionalParamStat {
    pub index: i64,
    pub usage_count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TemplateUsageStats {
    pub template_name: String,
    pub total_calls: i64,
    pub total_pages: i64,
    pub named_params: Vec<NamedParamStat>,
    pub positional_params: Vec<PositionalParamStat>,
}

#[derive(Clone, Copy, Debug)]
pub struct UsageStatsOptions {
    /// Maximum number of ranked named parameters returned.
    pub sample_limit: u64,
    /// Maximum example values per parameter.
    pub value_limit: u64,
}

impl Default for UsageStatsOptions {
    fn default() -> Self {
        UsageStatsOptions {
            sample_limit: 50,
            value_limit: 5,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaSource {
    Templatedata,
    Observed,
    Merged,
}

#[derive(Clone, Debug, Serialize)]
pub struct SchemaParam {
    pub name: String,
    pub source: SchemaSource,
    /// Raw definition from TemplateData, when available.
    pub definition: Option<serde_json::Value>,
    pub usage_count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TemplateSchema {
    pub template_name: String,
    pub description: Option<String>,
    pub has_templatedata: bool,
    pub params: Vec<SchemaParam>,
}

/// Aggregates observed usage of one template: call and page totals, ranked
/// named parameters with example values, and positional parameters.
pub fn get_template_usage_stats(
    db: &Database,
    template_name: &str,
    opts: &UsageStatsOptions,
) -> Result<TemplateUsageStats> {
    let conn = db.conn()?;

    let (total_calls, total_pages): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT page_id) FROM template_calls \
         WHERE template_name = ?1",
        [template_name],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let mut named_params = Vec::new();
    {
        let mut statement = conn.prepare_cached(
            "SELECT tp.param_name, COUNT(*), COUNT(DISTINCT tc.page_id) \
             FROM template_params tp \
             JOIN template_calls tc ON tc.id = tp.call_id \
             WHERE tc.template_name = ?1 AND tp.is_named = 1 \
             GROUP BY tp.param_name \
             ORDER BY COUNT(*) DESC, tp.param_name LIMIT ?2",
        )?;
        let rows = statement.query_map(
            params![template_name, opts.sample_limit as i64],
            |row| {
                Ok(NamedParamStat {
                    name: row.get(0)?,
                    usage_count: row.get(1)?,
                    page_count: row.get(2)?,
                    example_values: Vec::new(),
                })
            },
        )?;
        for row in rows {
            named_params.push(row?);
        }
    }
    {
        let mut values_statement = conn.prepare_cached(
            "SELECT DISTINCT tp.param_value FROM template_params tp \
             JOIN template_calls tc ON tc.id = tp.call_id \
             WHERE tc.template_name = ?1 AND tp.param_name = ?2 \
               AND tp.param_value <> '' \
             ORDER BY tp.param_value LIMIT ?3",
        )?;
        for param in &mut named_params {
            let rows = values_statement.query_map(
                params![template_name, param.name, opts.value_limit as i64],
                |row| row.get::<_, String>(0),
            )?;
            for row in rows {
                param.example_values.push(row?);
            }
        }
    }

    let mut positional_params = Vec::new();
    {
        let mut statement = conn.prepare_cached(
            "SELECT tp.param_index, COUNT(*) FROM template_params tp \
             JOIN template_calls tc ON tc.id = tp.call_id \
             WHERE tc.template_name = ?1 AND tp.is_named = 0 \
             GROUP BY tp.param_index ORDER BY tp.param_index",
        )?;
        let rows = statement.query_map([template_name], |row| {
            Ok(PositionalParamStat {
                index: row.get(0)?,
                usage_count: row.get(1)?,
            })
        })?;
        for row in rows {
            positional_params.push(row?);
        }
    }

    Ok(TemplateUsageStats {
        template_name: template_name.to_string(),
        total_calls,
        total_pages,
        named_params,
        positional_params,
    })
}

/// Merges the TemplateData definition (when one was indexed) with observed
/// usage. Each parameter is tagged with where it was seen.
pub fn get_template_schema(db: &Database, template_name: &str) -> Result<TemplateSchema> {
    let metadata: Option<(Option<String>, Option<String>)> = {
        let conn = db.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT param_defs, description FROM template_metadata WHERE template_name = ?1",
        )?;
        stmt.query_row([template_name], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?
    };

    let (param_defs, description) = match &metadata {
        Some((defs, description)) => (defs.clone(), description.clone()),
        None => (None, None),
    };

    let defined: serde_json::Map<String, serde_json::Value> = param_defs
        .as_deref()
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default();

    let usage = get_template_usage_stats(db, template_name, &UsageStatsOptions::default())?;

    let mut params = Vec::new();
    for (name, definition) in &defined {
        let observed = usage
            .named_params
            .iter()
            .find(|p| p.name == *name);
        params.push(SchemaParam {
            name: name.clone(),
            source: if observed.is_some() {
                SchemaSource::Merged
            } else {
                SchemaSource::Templatedata
            },
            definition: Some(definition.clone()),
            usage_count: observed.map(|p| p.usage_count).unwrap_or(0),
        });
    }
    for param in &usage.named_params {
        if defined.contains_key(&param.name) {
            continue;
        }
        params.push(SchemaParam {
            name: param.name.clone(),
            source: SchemaSource::Observed,
            definition: None,
            usage_count: param.usage_count,
        });
    }

    Ok(TemplateSchema {
        template_name: template_name.to_string(),
        description,
        has_templatedata: metadata.is_some(),
        params,
    })
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

    fn seeded_db(entries: &[(&str, i64, &str)]) -> Database {
        let db = Database::open_in_memory().expect("open");
        run_migrations(&db).expect("migrate");
        let site = default_site();
        for (title, ns, content) in entries {
            pages::upsert_page(
                &db,
                &PageUpsert {
                    namespace: Some(*ns),
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
    fn usage_aggregation_across_pages() {
        let db = seeded_db(&[
            ("A", 0, "{{Infobox person|name=X|age=30}}"),
            ("B", 0, "{{Infobox person|name=X|age=30}}"),
        ]);

        let stats = get_template_usage_stats(
            &db,
            "Infobox person",
            &UsageStatsOptions::default(),
        )
        .expect("stats");
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.total_pages, 2);
        assert_eq!(stats.named_params.len(), 2);

        let age = stats.named_params.iter().find(|p| p.name == "age").expect("age");
        assert_eq!(age.usage_count, 2);
        assert_eq!(age.page_count, 2);
        assert_eq!(age.example_values, vec!["30"]);

        let name = stats.named_params.iter().find(|p| p.name == "name").expect("name");
        assert_eq!(name.example_values, vec!["X"]);
    }

    #[test]
    fn positional_params_are_tracked() {
        let db = seeded_db(&[("A", 0, "{{Coord|1.5|2.5}}{{Coord|3.5|4.5}}")]);
        let stats =
            get_template_usage_stats(&db, "Coord", &UsageStatsOptions::default()).expect("stats");
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.positional_params.len(), 2);
        assert_eq!(stats.positional_params[0].index, 0);
        assert_eq!(stats.positional_params[0].usage_count, 2);
    }

    #[test]
    fn schema_merges_templatedata_and_observed() {
        let db = seeded_db(&[
            (
                "Template:Infobox person",
                10,
                "{{Infobox person|name={{{name|}}}}}\n<templatedata>\
                 {\"description\":\"People\",\"params\":{\
                 \"name\":{\"required\":true},\"birth\":{}}}</templatedata>",
            ),
            ("A", 0, "{{Infobox person|name=X|nickname=Y}}"),
        ]);

        let schema = get_template_schema(&db, "Infobox person").expect("schema");
        assert!(schema.has_templatedata);
        assert_eq!(schema.description.as_deref(), Some("People"));

        let by_name = |name: &str| {
            schema
                .params
                .iter()
                .find(|p| p.name == name)
                .unwrap_or_else(|| panic!("param {name}"))
        };
        assert_eq!(by_name("name").source, SchemaSource::Merged);
        assert_eq!(by_name("birth").source, SchemaSource::Templatedata);
        assert_eq!(by_name("nickname").source, SchemaSource::Observed);
    }

    #[test]
    fn schema_without_templatedata_is_observed_only() {
        let db = seeded_db(&[("A", 0, "{{Mystery|k=v}}")]);
        let schema = get_template_schema(&db, "Mystery").expect("schema");
        assert!(!schema.has_templatedata);
        assert_eq!(schema.params.len(), 1);
        assert_eq!(schema.params[0].source, SchemaSource::Observed);
    }
}
