//! Index builder: rewrites every derived row owned by a page from its
//! current content. After any commit the derived tables are a pure function
//! of the `pages.content` snapshot the transaction observed.

use crate::{schema::DERIVED_TABLES, Database, Result};
use rusqlite::{params, Connection};
use wikitool_core::{
    site::{Site, NS_MEDIAWIKI, NS_MODULE, NS_TEMPLATE},
    types::{now_iso, PageError, PageRecord, ProgressEvent, ProgressFn, RebuildReport},
    wikitext::{self, ParsedPage},
};

#[derive(Default)]
pub struct RebuildOptions {
    pub namespaces: Option<Vec<i64>>,
    pub on_progress: Option<ProgressFn>,
}

enum PageOutputs {
    Redirect(Option<String>),
    Lua(Vec<wikitext::ModuleDep>),
    Wikitext(Box<ParsedPage>),
    /// CSS/JS sources carry no derived rows.
    Opaque,
}

fn parse_page(site: &Site, page: &PageRecord) -> PageOutputs {
    if page.is_redirect {
        let target = page.redirect_target.clone().or_else(|| {
            wikitext::parse_redirect(&page.content).1
        });
        return PageOutputs::Redirect(target);
    }
    let (_, bare) = site.split_title(&page.title);
    match page.namespace {
        NS_MODULE => {
            if bare.ends_with("/styles.css") {
                PageOutputs::Opaque
            } else {
                PageOutputs::Lua(wikitext::lua::scan_module_deps(&page.content))
            }
        }
        NS_MEDIAWIKI if bare.ends_with(".css") || bare.ends_with(".js") => PageOutputs::Opaque,
        _ => PageOutputs::Wikitext(Box::new(wikitext::parse(&page.content, site))),
    }
}

/// Reindexes a single page inside its own transaction: all derived rows are
/// deleted and rebuilt from the page's content. Running it twice with the
/// same input is a no-op.
pub fn update_page_index(db: &Database, site: &Site, page: &PageRecord) -> Result<()> {
    let outputs = parse_page(site, page);
    let mut conn = db.conn()?;
    let txn = conn.transaction()?;
    clear_page_derived(&txn, page.id, &page.title)?;
    write_page_outputs(&txn, site, page, &outputs, &mut RebuildReport::default())?;
    txn.commit()?;
    Ok(())
}

/// Drops every derived table once, then reindexes the selected pages inside
/// one enclosing transaction. Per-page failures are collected, not fatal.
pub fn rebuild_index(
    db: &Database,
    site: &Site,
    opts: &RebuildOptions,
) -> Result<RebuildReport> {
    let mut conn = db.conn()?;
    let txn = conn.transaction()?;

    for table in DERIVED_TABLES {
        txn.execute(&format!("DELETE FROM {table}"), [])?;
    }

    // Materialize the id list up front; no read cursor is held across the
    // derived-row writes.
    let pages: Vec<PageRecord> = {
        let sql = match &opts.namespaces {
            Some(list) if !list.is_empty() => {
                let ids = list
                    .iter()
                    .map(|ns| ns.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("WHERE namespace IN ({ids})")
            }
            _ => String::new(),
        };
        let full = format!(
            "SELECT id, title, namespace, page_type, filename, filepath, \
             template_category, content, content_hash, file_mtime, wiki_modified_at, \
             last_synced_at, sync_status, is_redirect, redirect_target, content_model, \
             page_id, revision_id, shortdesc, display_title, word_count \
             FROM pages {sql} ORDER BY title"
        );
        let mut statement = txn.prepare(&full)?;
        let rows = statement.query_map([], crate::pages::row_to_page)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    let total = pages.len() as u64;
    let mut report = RebuildReport::default();
    for (done, page) in pages.iter().enumerate() {
        let outputs = parse_page(site, page);
        match write_page_outputs(&txn, site, page, &outputs, &mut report) {
            Ok(()) => report.pages += 1,
            Err(err) => report.errors.push(PageError::new(&page.title, err)),
        }
        if let Some(on_progress) = &opts.on_progress {
            on_progress(ProgressEvent {
                done: done as u64 + 1,
                total: Some(total),
                title: page.title.clone(),
            });
        }
    }

    txn.commit()?;
    Ok(report)
}

/// Deletes every derived row keyed by this page.
pub(crate) fn clear_page_derived(conn: &Connection, page_id: i64, title: &str) -> Result<()> {
    conn.execute("DELETE FROM page_links WHERE source_page_id = ?1", [page_id])?;
    conn.execute("DELETE FROM template_usage WHERE page_id = ?1", [page_id])?;
    conn.execute(
        "DELETE FROM template_params WHERE call_id IN \
         (SELECT id FROM template_calls WHERE page_id = ?1)",
        [page_id],
    )?;
    conn.execute("DELETE FROM template_calls WHERE page_id = ?1", [page_id])?;
    conn.execute("DELETE FROM infobox_kv WHERE page_id = ?1", [page_id])?;
    conn.execute("DELETE FROM page_sections WHERE page_id = ?1", [page_id])?;
    conn.execute("DELETE FROM page_sections_fts WHERE page_id = ?1", [page_id])?;
    conn.execute("DELETE FROM page_categories WHERE page_id = ?1", [page_id])?;
    conn.execute("DELETE FROM redirects WHERE source_title = ?1", [title])?;
    conn.execute("DELETE FROM module_deps WHERE module_title = ?1", [title])?;
    conn.execute("DELETE FROM cargo_tables WHERE page_id = ?1", [page_id])?;
    conn.execute("DELETE FROM cargo_stores WHERE page_id = ?1", [page_id])?;
    conn.execute("DELETE FROM cargo_queries WHERE page_id = ?1", [page_id])?;
    Ok(())
}

fn write_page_outputs(
    conn: &Connection,
    site: &Site,
    page: &PageRecord,
    outputs: &PageOutputs,
    report: &mut RebuildReport,
) -> Result<()> {
    match outputs {
        PageOutputs::Redirect(target) => {
            if let Some(target) = target {
                conn.prepare_cached(
                    "INSERT OR REPLACE INTO redirects (source_title, target_title) \
                     VALUES (?1, ?2)",
                )?
                .execute(params![page.title, target])?;
                report.redirects += 1;
            }
        }
        PageOutputs::Lua(deps) => {
            let mut statement = conn.prepare_cached(
                "INSERT OR IGNORE INTO module_deps (module_title, dependency, dep_type) \
                 VALUES (?1, ?2, ?3)",
            )?;
            for dep in deps {
                statement.execute(params![page.title, dep.dependency, dep.dep_type.as_str()])?;
                report.module_deps += 1;
            }
        }
        PageOutputs::Wikitext(parsed) => {
            write_wikitext_outputs(conn, site, page, parsed, report)?;
        }
        PageOutputs::Opaque => {}
    }
    Ok(())
}

fn write_wikitext_outputs(
    conn: &Connection,
    site: &Site,
    page: &PageRecord,
    parsed: &ParsedPage,
    report: &mut RebuildReport,
) -> Result<()> {
    // Links: set semantics on (source, target, type).
    {
        let mut statement = conn.prepare_cached(
            "INSERT OR IGNORE INTO page_links \
             (source_page_id, target_title, link_type, target_namespace) \
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for link in &parsed.links {
            statement.execute(params![
                page.id,
                link.target,
                link.link_type.as_str(),
                link.namespace
            ])?;
            report.links += 1;
        }
    }

    // Categories are shared entities; membership rows belong to the page.
    {
        let mut insert_category =
            conn.prepare_cached("INSERT OR IGNORE INTO categories (name) VALUES (?1)")?;
        let mut select_category =
            conn.prepare_cached("SELECT id FROM categories WHERE name = ?1")?;
        let mut insert_membership = conn.prepare_cached(
            "INSERT OR IGNORE INTO page_categories (page_id, category_id) VALUES (?1, ?2)",
        )?;
        for category in &parsed.categories {
            insert_category.execute([category])?;
            let category_id: i64 = select_category.query_row([category], |row| row.get(0))?;
            insert_membership.execute(params![page.id, category_id])?;
            report.categories += 1;
        }
    }

    // Template usage is a bag; calls carry their parameters.
    {
        let mut insert_usage = conn.prepare_cached(
            "INSERT INTO template_usage (page_id, template_name) VALUES (?1, ?2)",
        )?;
        let mut insert_call = conn.prepare_cached(
            "INSERT INTO template_calls (page_id, template_name, call_index) \
             VALUES (?1, ?2, ?3)",
        )?;
        let mut insert_param = conn.prepare_cached(
            "INSERT INTO template_params \
             (call_id, param_index, param_name, param_value, is_named) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut insert_infobox = conn.prepare_cached(
            "INSERT INTO infobox_kv (page_id, infobox_name, param_name, param_value, call_index) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (call_index, call) in parsed.templates.iter().enumerate() {
            insert_usage.execute(params![page.id, call.name])?;
            insert_call.execute(params![page.id, call.name, call_index as i64])?;
            let call_id = conn.last_insert_rowid();
            for param in &call.params {
                insert_param.execute(params![
                    call_id,
                    param.index,
                    param.name,
                    param.value,
                    param.is_named as i64
                ])?;
            }
            if call.name.starts_with("Infobox") {
                for param in call.params.iter().filter(|p| p.is_named) {
                    insert_infobox.execute(params![
                        page.id,
                        call.name,
                        param.name,
                        param.value,
                        call_index as i64
                    ])?;
                }
            }
            report.templates += 1;
        }
    }

    // Sections plus their FTS mirror.
    {
        let mut insert_section = conn.prepare_cached(
            "INSERT INTO page_sections \
             (page_id, section_index, heading, level, anchor, content, is_lead) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        let mut insert_fts = conn.prepare_cached(
            "INSERT INTO page_sections_fts (title, heading, content, page_id, section_index) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for section in &parsed.sections {
            insert_section.execute(params![
                page.id,
                section.index,
                section.heading,
                section.level,
                section.anchor,
                section.content,
                section.is_lead as i64
            ])?;
            insert_fts.execute(params![
                page.title,
                section.heading,
                section.content,
                page.id,
                section.index
            ])?;
            report.sections += 1;
        }
    }

    // Cargo constructs, with raw sources preserved.
    {
        let mut insert_table = conn.prepare_cached(
            "INSERT OR REPLACE INTO cargo_tables (page_id, table_name, columns, declare_raw) \
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for declare in &parsed.cargo_declares {
            insert_table.execute(params![
                page.id,
                declare.table_name,
                serde_json::to_string(&declare.columns)?,
                declare.raw
            ])?;
            report.cargo_rows += 1;
        }

        let mut insert_store = conn.prepare_cached(
            "INSERT INTO cargo_stores (page_id, table_name, values_json, store_raw) \
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for store in &parsed.cargo_stores {
            let values: serde_json::Map<String, serde_json::Value> = store
                .values
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            insert_store.execute(params![
                page.id,
                store.table_name,
                serde_json::to_string(&values)?,
                store.raw
            ])?;
            report.cargo_rows += 1;
        }

        let mut insert_query = conn.prepare_cached(
            "INSERT INTO cargo_queries \
             (page_id, query_type, tables_json, fields_json, params_json, query_raw) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for query in &parsed.cargo_queries {
            let params_map: serde_json::Map<String, serde_json::Value> = query
                .params
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            let fields_json = if query.fields.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&query.fields)?)
            };
            insert_query.execute(params![
                page.id,
                query.query_type,
                serde_json::to_string(&query.tables)?,
                fields_json,
                serde_json::to_string(&params_map)?,
                query.raw
            ])?;
            report.cargo_rows += 1;
        }
    }

    // Page-level metadata recomputed from content.
    conn.prepare_cached(
        "UPDATE pages SET shortdesc = ?1, display_title = ?2, word_count = ?3 WHERE id = ?4",
    )?
    .execute(params![
        parsed.shortdesc,
        parsed.display_title,
        parsed.word_count,
        page.id
    ])?;

    // TemplateData schema for Template pages.
    if page.namespace == NS_TEMPLATE {
        if let Some(json) = &parsed.template_data {
            let (_, bare) = site.split_title(&page.title);
            let value: serde_json::Value = serde_json::from_str(json)?;
            let description = match value.get("description") {
                Some(serde_json::Value::String(text)) => Some(text.clone()),
                _ => None,
            };
            let param_defs = value.get("params").map(|params| params.to_string());
            conn.prepare_cached(
                "INSERT OR REPLACE INTO template_metadata \
                 (template_name, source, param_defs, description, example, updated_at) \
                 VALUES (?1, 'templatedata', ?2, ?3, NULL, ?4)",
            )?
            .execute(params![bare, param_defs, description, now_iso()])?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{migrate::run_migrations, pages, Database, PageUpsert};
    use wikitool_core::settings::default_site;
    use wikitool_core::types::SyncStatus;

    fn test_db() -> Database {
        let db = Database::open_in_memory().expect("open");
        run_migrations(&db).expect("migrate");
        db
    }

    fn insert(db: &Database, title: &str, namespace: i64, content: &str) -> i64 {
        let site = default_site();
        let (is_redirect, target) = wikitext::parse_redirect(content);
        pages::upsert_page(
            db,
            &PageUpsert {
                namespace: Some(namespace),
                content: Some(content.to_string()),
                sync_status: Some(SyncStatus::Synced),
                is_redirect: Some(is_redirect),
                redirect_target: Some(target),
                page_type: Some(site.page_type(namespace, is_redirect)),
                ..PageUpsert::new(title)
            },
        )
        .expect("insert page")
    }

    fn reindex(db: &Database, title: &str) {
        let site = default_site();
        let page = pages::get_page(db, title).expect("get").expect("exists");
        update_page_index(db, &site, &page).expect("index");
    }

    fn count(db: &Database, sql: &str) -> i64 {
        let conn = db.conn().expect("conn");
        conn.query_row(sql, [], |row| row.get(0)).expect("count")
    }

    #[test]
    fn index_writes_all_derived_rows() {
        let db = test_db();
        insert(
            &db,
            "Alpha",
            0,
            "{{SHORTDESC:Test page}}{{Infobox person|name=X|age=30}}\n\
             Prose with [[Beta]] and [[Target|text]].\n\
             == History ==\nMore prose.\n[[Category:People]]",
        );
        reindex(&db, "Alpha");

        assert_eq!(count(&db, "SELECT COUNT(*) FROM page_links"), 2);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM page_categories"), 1);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM template_usage"), 1);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM template_calls"), 1);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM template_params"), 2);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM infobox_kv"), 2);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM page_sections"), 2);

        let page = pages::get_page(&db, "Alpha").expect("get").expect("exists");
        assert_eq!(page.shortdesc.as_deref(), Some("Test page"));
        assert!(page.word_count > 0);
    }

    #[test]
    fn update_twice_equals_once() {
        let db = test_db();
        insert(&db, "Alpha", 0, "[[Beta]] {{T|1}} [[Category:C]]\n== S ==\nx");
        reindex(&db, "Alpha");
        let before = [
            count(&db, "SELECT COUNT(*) FROM page_links"),
            count(&db, "SELECT COUNT(*) FROM template_usage"),
            count(&db, "SELECT COUNT(*) FROM page_sections"),
            count(&db, "SELECT COUNT(*) FROM page_sections_fts"),
            count(&db, "SELECT COUNT(*) FROM page_categories"),
        ];
        reindex(&db, "Alpha");
        let after = [
            count(&db, "SELECT COUNT(*) FROM page_links"),
            count(&db, "SELECT COUNT(*) FROM template_usage"),
            count(&db, "SELECT COUNT(*) FROM page_sections"),
            count(&db, "SELECT COUNT(*) FROM page_sections_fts"),
            count(&db, "SELECT COUNT(*) FROM page_categories"),
        ];
        assert_eq!(before, after);
    }

    #[test]
    fn redirect_pages_write_only_the_redirect_row() {
        let db = test_db();
        insert(&db, "Old", 0, "#REDIRECT [[New]]\n[[Category:X]]");
        reindex(&db, "Old");

        assert_eq!(count(&db, "SELECT COUNT(*) FROM redirects"), 1);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM page_links"), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM page_categories"), 0);
    }

    #[test]
    fn module_pages_write_dependencies() {
        let db = test_db();
        insert(
            &db,
            "Module:Navbar",
            828,
            "local cfg = mw.loadData('Module:Navbar/configuration')\nreturn {}",
        );
        reindex(&db, "Module:Navbar");

        let conn = db.conn().expect("conn");
        let (dependency, dep_type): (String, String) = conn
            .query_row(
                "SELECT dependency, dep_type FROM module_deps WHERE module_title = 'Module:Navbar'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .expect("dep row");
        assert_eq!(dependency, "Module:Navbar/configuration");
        assert_eq!(dep_type, "loadData");
    }

    #[test]
    fn template_metadata_from_templatedata() {
        let db = test_db();
        insert(
            &db,
            "Template:Infobox person",
            10,
            "{{Infobox person|name={{{name|}}}}}\n<templatedata>\
             {\"description\":\"People infobox\",\"params\":{\"name\":{\"required\":true}}}\
             </templatedata>",
        );
        reindex(&db, "Template:Infobox person");

        let conn = db.conn().expect("conn");
        let (source, description): (String, Option<String>) = conn
            .query_row(
                "SELECT source, description FROM template_metadata \
                 WHERE template_name = 'Infobox person'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .expect("metadata row");
        assert_eq!(source, "templatedata");
        assert_eq!(description.as_deref(), Some("People infobox"));
    }

    #[test]
    fn rebuild_is_a_pure_function_of_content() {
        let db = test_db();
        let site = default_site();
        insert(&db, "Alpha", 0, "[[Beta]] {{T|x=1}} [[Category:C]]");
        insert(&db, "Beta", 0, "[[Alpha]]");
        insert(&db, "Old", 0, "#REDIRECT [[Alpha]]");

        let first = rebuild_index(&db, &site, &RebuildOptions::default()).expect("first");
        assert_eq!(first.pages, 3);
        assert!(first.errors.is_empty());
        let links_first = count(&db, "SELECT COUNT(*) FROM page_links");
        let redirects_first = count(&db, "SELECT COUNT(*) FROM redirects");

        let second = rebuild_index(&db, &site, &RebuildOptions::default()).expect("second");
        assert_eq!(second.pages, 3);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM page_links"), links_first);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM redirects"), redirects_first);
    }

    #[test]
    fn rebuild_reports_progress() {
        let db = test_db();
        let site = default_site();
        insert(&db, "Alpha", 0, "text");
        insert(&db, "Beta", 0, "text");

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let opts = RebuildOptions {
            namespaces: None,
            on_progress: Some(Box::new(move |event| {
                sink.lock().expect("lock").push((event.done, event.title));
            })),
        };
        rebuild_index(&db, &site, &opts).expect("rebuild");
        let events = seen.lock().expect("lock");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, 1);
        assert_eq!(events[1].1, "Beta");
    }
}
