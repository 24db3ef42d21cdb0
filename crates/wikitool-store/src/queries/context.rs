//! Context bundle: a single aggregated view of one page for AI-oriented
//! consumers.

use super::{
    cargo::{get_cargo_table_context, CargoTableContext},
    templates::{
        get_template_schema, get_template_usage_stats, TemplateSchema, TemplateUsageStats,
        UsageStatsOptions,
    },
};
use crate::{pages, Database, Result};
use rusqlite::params;
use serde::Serialize;
use std::collections::BTreeMap;
use wikitool_core::{
    site::{Site, NS_TEMPLATE},
    types::PageRecord,
    wikitext::Section,
    Error,
};

#[derive(Clone, Copy, Debug)]
pub struct ContextOptions {
    pub include_content: bool,
    pub max_sections: usize,
    pub include_cargo: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions {
            include_content: false,
            max_sections: 10,
            include_cargo: false,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct InfoboxEntry {
    pub infobox_name: String,
    pub param_name: String,
    pub param_value: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TemplateCallEntry {
    pub template_name: String,
    pub call_index: i64,
    pub params: Vec<(Option<String>, String)>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ModuleDepEntry {
    pub dependency: String,
    pub dep_type: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ContextBundle {
    pub page: PageRecord,
    pub sections: Vec<Section>,
    pub categories: Vec<String>,
    pub templates: Vec<String>,
    pub links: Vec<String>,
    pub infobox: Vec<InfoboxEntry>,
    pub template_calls: Vec<TemplateCallEntry>,
    /// Present when the page is a template.
    pub template_usage: Option<TemplateUsageStats>,
    pub template_schema: Option<TemplateSchema>,
    /// Present when the page is a module.
    pub module_deps: Vec<ModuleDepEntry>,
    /// Cargo stores on this page plus the context of each touched table.
    pub cargo_tables: BTreeMap<String, CargoTableContext>,
}

/// Aggregates the page row with its derived context. Errors with
/// `MissingPage` when the title is unknown.
pub fn get_context_bundle(
    db: &Database,
    site: &Site,
    title: &str,
    opts: &ContextOptions,
) -> Result<ContextBundle> {
    let mut page = pages::get_page(db, title)?
        .ok_or_else(|| Error::MissingPage(title.to_string()))?;
    if !opts.include_content {
        page.content = String::new();
    }

    let conn = db.conn()?;

    let mut sections = Vec::new();
    {
        let mut statement = conn.prepare_cached(
            "SELECT section_index, heading, level, anchor, content, is_lead \
             FROM page_sections WHERE page_id = ?1 ORDER BY section_index LIMIT ?2",
        )?;
        let rows = statement.query_map(params![page.id, opts.max_sections as i64], |row| {
            Ok(Section {
                index: row.get(0)?,
                heading: row.get(1)?,
                level: row.get(2)?,
                anchor: row.get(3)?,
                content: row.get(4)?,
                is_lead: row.get::<_, i64>(5)? != 0,
            })
        })?;
        for row in rows {
            sections.push(row?);
        }
    }

    let categories: Vec<String> = {
        let mut statement = conn.prepare_cached(
            "SELECT c.name FROM categories c \
             JOIN page_categories pc ON pc.category_id = c.id \
             WHERE pc.page_id = ?1 ORDER BY c.name",
        )?;
        let rows = statement.query_map([page.id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let templates: Vec<String> = {
        let mut statement = conn.prepare_cached(
            "SELECT DISTINCT template_name FROM template_usage \
             WHERE page_id = ?1 ORDER BY template_name",
        )?;
        let rows = statement.query_map([page.id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let links: Vec<String> = {
        let mut statement = conn.prepare_cached(
            "SELECT target_title FROM page_links WHERE source_page_id = ?1 \
             ORDER BY target_title",
        )?;
        let rows = statement.query_map([page.id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let infobox: Vec<InfoboxEntry> = {
        let mut statement = conn.prepare_cached(
            "SELECT infobox_name, param_name, param_value FROM infobox_kv \
             WHERE page_id = ?1 ORDER BY call_index, param_name",
        )?;
        let rows = statement.query_map([page.id], |row| {
            Ok(InfoboxEntry {
                infobox_name: row.get(0)?,
                param_name: row.get(1)?,
                param_value: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let template_calls: Vec<TemplateCallEntry> = {
        let mut calls_statement = conn.prepare_cached(
            "SELECT id, template_name, call_index FROM template_calls \
             WHERE page_id = ?1 ORDER BY call_index",
        )?;
        let mut params_statement = conn.prepare_cached(
            "SELECT param_name, param_value FROM template_params \
             WHERE call_id = ?1 ORDER BY param_index",
        )?;
        let calls: Vec<(i64, String, i64)> = calls_statement
            .query_map([page.id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<rusqlite::Result<_>>()?;
        let mut out = Vec::new();
        for (call_id, template_name, call_index) in calls {
            let params: Vec<(Option<String>, String)> = params_statement
                .query_map([call_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<_>>()?;
            out.push(TemplateCallEntry {
                template_name,
                call_index,
                params,
            });
        }
        out
    };

    let module_deps: Vec<ModuleDepEntry> = {
        let mut statement = conn.prepare_cached(
            "SELECT dependency, dep_type FROM module_deps WHERE module_title = ?1 \
             ORDER BY dependency",
        )?;
        let rows = statement.query_map([&page.title], |row| {
            Ok(ModuleDepEntry {
                dependency: row.get(0)?,
                dep_type: row.get(1)?,
            })
        })?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let store_tables: Vec<String> = if opts.include_cargo {
        let mut statement = conn.prepare_cached(
            "SELECT DISTINCT table_name FROM cargo_stores WHERE page_id = ?1 \
             UNION SELECT table_name FROM cargo_tables WHERE page_id = ?1 \
             ORDER BY table_name",
        )?;
        let rows = statement.query_map([page.id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    } else {
        Vec::new()
    };

    // The shared connection guard must be released before the nested
    // aggregations below re-acquire it.
    drop(conn);

    let (template_usage, template_schema) = if page.namespace == NS_TEMPLATE {
        let (_, bare) = site.split_title(&page.title);
        (
            Some(get_template_usage_stats(
                db,
                bare,
                &UsageStatsOptions::default(),
            )?),
            Some(get_template_schema(db, bare)?),
        )
    } else {
        (None, None)
    };

    let mut cargo_tables = BTreeMap::new();
    for table in store_tables {
        let context = get_cargo_table_context(db, &table)?;
        cargo_tables.insert(table, context);
    }

    Ok(ContextBundle {
        page,
        sections,
        categories,
        templates,
        links,
        infobox,
        template_calls,
        template_usage,
        template_schema,
        module_deps,
        cargo_tables,
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

    fn seeded_db() -> (Database, Site) {
        let db = Database::open_in_memory().expect("open");
        run_migrations(&db).expect("migrate");
        let site = default_site();
        for (title, ns, content) in [
            (
                "Alpha",
                0i64,
                "{{SHORTDESC:A page}}{{Infobox person|name=X}}\n\
                 Links to [[Beta]].\n== History ==\nPast.\n\
                 {{#cargo_store:_table=T|name=foo}}\n[[Category:People]]",
            ),
            ("Decl", 0, "{{#cargo_declare:_table=T|name=String}}"),
            ("Template:Infobox person", 10, "{{Infobox person|name={{{name|}}}}}"),
            (
                "Module:Navbar",
                828,
                "local cfg = require('Module:Arguments')\nreturn {}",
            ),
        ] {
            pages::upsert_page(
                &db,
                &PageUpsert {
                    namespace: Some(ns),
                    content: Some(content.to_string()),
                    page_type: Some(site.page_type(ns, false)),
                    ..PageUpsert::new(title)
                },
            )
            .expect("insert");
        }
        rebuild_index(&db, &site, &RebuildOptions::default()).expect("rebuild");
        (db, site)
    }

    #[test]
    fn article_bundle() {
        let (db, site) = seeded_db();
        let bundle = get_context_bundle(
            &db,
            &site,
            "Alpha",
            &ContextOptions {
                include_cargo: true,
                ..ContextOptions::default()
            },
        )
        .expect("bundle");

        assert_eq!(bundle.page.title, "Alpha");
        // Content omitted by default.
        assert!(bundle.page.content.is_empty());
        assert_eq!(bundle.page.shortdesc.as_deref(), Some("A page"));
        assert_eq!(bundle.sections.len(), 2);
        assert_eq!(bundle.categories, vec!["People"]);
        assert_eq!(bundle.templates, vec!["Infobox person"]);
        assert_eq!(bundle.links, vec!["Beta"]);
        assert_eq!(bundle.infobox.len(), 1);
        assert_eq!(bundle.template_calls.len(), 1);
        assert!(bundle.template_usage.is_none());
        assert!(bundle.cargo_tables.contains_key("T"));
        assert_eq!(
            bundle.cargo_tables["T"].declared_by.as_deref(),
            Some("Decl")
        );
    }

    #[test]
    fn template_bundle_includes_usage_and_schema() {
        let (db, site) = seeded_db();
        let bundle = get_context_bundle(
            &db,
            &site,
            "Template:Infobox person",
            &ContextOptions::default(),
        )
        .expect("bundle");
        let usage = bundle.template_usage.expect("usage");
        assert!(usage.total_calls >= 1);
        assert!(bundle.template_schema.is_some());
    }

    #[test]
    fn module_bundle_includes_deps() {
        let (db, site) = seeded_db();
        let bundle =
            get_context_bundle(&db, &site, "Module:Navbar", &ContextOptions::default())
                .expect("bundle");
        assert_eq!(bundle.module_deps.len(), 1);
        assert_eq!(bundle.module_deps[0].dependency, "Module:Arguments");
    }

    #[test]
    fn unknown_title_is_missing_page() {
        let (db, site) = seeded_db();
        let err = get_context_bundle(&db, &site, "Nope", &ContextOptions::default())
            .expect_err("must fail");
        assert!(matches!(err, Error::MissingPage(_)));
    }

    #[test]
    fn section_limit_applies() {
        let (db, site) = seeded_db();
        let bundle = get_context_bundle(
            &db,
            &site,
            "Alpha",
            &ContextOptions {
                max_sections: 1,
                ..ContextOptions::default()
            },
        )
        .expect("bundle");
        assert_eq!(bundle.sections.len(), 1);
        assert!(bundle.sections[0].is_lead);
    }
}
