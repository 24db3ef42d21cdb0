//! Link graph, redirect and category health reports.

use crate::{Database, Result};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct Backlink {
    pub title: String,
    pub link_type: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct BrokenLink {
    pub source_title: String,
    pub target_title: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DoubleRedirect {
    pub title: String,
    pub first_target: String,
    pub final_target: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TitleCount {
    pub title: String,
    pub count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub members: i64,
}

/// Pages linking to `title`, ordered by source title.
pub fn get_backlinks(db: &Database, title: &str) -> Result<Vec<Backlink>> {
    let conn = db.conn()?;
    let mut statement = conn.prepare_cached(
        "SELECT p.title, l.link_type FROM page_links l \
         JOIN pages p ON p.id = l.source_page_id \
         WHERE l.target_title = ?1 ORDER BY p.title",
    )?;
    let rows = statement.query_map([title], |row| {
        Ok(Backlink {
            title: row.get(0)?,
            link_type: row.get(1)?,
        })
    })?;
    rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
}

/// Main-namespace, non-redirect pages with no incoming internal link.
pub fn get_orphan_pages(db: &Database) -> Result<Vec<String>> {
    let conn = db.conn()?;
    let mut statement = conn.prepare_cached(
        "SELECT title FROM pages \
         WHERE namespace = 0 AND is_redirect = 0 \
           AND title NOT IN (SELECT target_title FROM page_links) \
         ORDER BY title",
    )?;
    let rows = statement.query_map([], |row| row.get(0))?;
    rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
}

/// Internal link targets that do not exist as pages. `File:` and
/// `Category:` targets are excluded by policy.
pub fn get_broken_links(db: &Database) -> Result<Vec<BrokenLink>> {
    let conn = db.conn()?;
    let mut statement = conn.prepare_cached(
        "SELECT DISTINCT p.title, l.target_title FROM page_links l \
         JOIN pages p ON p.id = l.source_page_id \
         WHERE l.link_type = 'internal' \
           AND l.target_title NOT LIKE 'File:%' \
           AND l.target_title NOT LIKE 'Image:%' \
           AND l.target_title NOT LIKE 'Category:%' \
           AND l.target_title NOT IN (SELECT title FROM pages) \
         ORDER BY l.target_title, p.title",
    )?;
    let rows = statement.query_map([], |row| {
        Ok(BrokenLink {
            source_title: row.get(0)?,
            target_title: row.get(1)?,
        })
    })?;
    rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
}

/// Redirects whose target is itself a redirect: `(A→B, B→C)` pairs.
pub fn get_double_redirects(db: &Database) -> Result<Vec<DoubleRedirect>> {
    let conn = db.conn()?;
    let mut statement = conn.prepare_cached(
        "SELECT a.source_title, a.target_title, b.target_title \
         FROM redirects a JOIN redirects b ON a.target_title = b.source_title \
         ORDER BY a.source_title",
    )?;
    let rows = statement.query_map([], |row| {
        Ok(DoubleRedirect {
            title: row.get(0)?,
            first_target: row.get(1)?,
            final_target: row.get(2)?,
        })
    })?;
    rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
}

/// Follows the redirect chain from `title`, up to 5 hops.
pub fn resolve_redirect(db: &Database, title: &str) -> Result<String> {
    let conn = db.conn()?;
    let mut statement =
        conn.prepare_cached("SELECT target_title FROM redirects WHERE source_title = ?1")?;
    let mut current = title.to_string();
    for _ in 0..5 {
        let next: Option<String> = statement
            .query_row([current.as_str()], |row| row.get(0))
            .optional()?;
        match next {
            Some(target) if target != current => current = target,
            _ => break,
        }
    }
    Ok(current)
}

/// Main-namespace pages with no category membership.
pub fn get_uncategorized_pages(db: &Database) -> Result<Vec<String>> {
    let conn = db.conn()?;
    let mut statement = conn.prepare_cached(
        "SELECT title FROM pages \
         WHERE namespace = 0 AND is_redirect = 0 \
           AND id NOT IN (SELECT page_id FROM page_categories) \
         ORDER BY title",
    )?;
    let rows = statement.query_map([], |row| row.get(0))?;
    rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
}

/// Main-namespace pages without a `{{SHORTDESC:}}`.
pub fn get_missing_shortdesc(db: &Database) -> Result<Vec<String>> {
    let conn = db.conn()?;
    let mut statement = conn.prepare_cached(
        "SELECT title FROM pages \
         WHERE namespace = 0 AND is_redirect = 0 AND shortdesc IS NULL \
         ORDER BY title",
    )?;
    let rows = statement.query_map([], |row| row.get(0))?;
    rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
}

pub fn get_top_templates(db: &Database, limit: u64) -> Result<Vec<TitleCount>> {
    let conn = db.conn()?;
    let mut statement = conn.prepare_cached(
        "SELECT template_name, COUNT(*) FROM template_usage \
         GROUP BY template_name ORDER BY COUNT(*) DESC, template_name LIMIT ?1",
    )?;
    let rows = statement.query_map([limit as i64], |row| {
        Ok(TitleCount {
            title: row.get(0)?,
            count: row.get(1)?,
        })
    })?;
    rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
}

pub fn get_top_categories(db: &Database, limit: u64) -> Result<Vec<CategoryCount>> {
    let conn = db.conn()?;
    let mut statement = conn.prepare_cached(
        "SELECT c.name, COUNT(pc.page_id) FROM categories c \
         JOIN page_categories pc ON pc.category_id = c.id \
         GROUP BY c.id ORDER BY COUNT(pc.page_id) DESC, c.name LIMIT ?1",
    )?;
    let rows = statement.query_map([limit as i64], |row| {
        Ok(CategoryCount {
            name: row.get(0)?,
            members: row.get(1)?,
        })
    })?;
    rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
}

pub fn get_top_linked_pages(db: &Database, limit: u64) -> Result<Vec<TitleCount>> {
    let conn = db.conn()?;
    let mut statement = conn.prepare_cached(
        "SELECT target_title, COUNT(*) FROM page_links \
         GROUP BY target_title ORDER BY COUNT(*) DESC, target_title LIMIT ?1",
    )?;
    let rows = statement.query_map([limit as i64], |row| {
        Ok(TitleCount {
            title: row.get(0)?,
            count: row.get(1)?,
        })
    })?;
    rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
}

/// Categories with fewer than `min_members` member pages.
pub fn get_empty_categories(db: &Database, min_members: i64) -> Result<Vec<CategoryCount>> {
    let conn = db.conn()?;
    let mut statement = conn.prepare_cached(
        "SELECT c.name, COUNT(pc.page_id) AS members FROM categories c \
         LEFT JOIN page_categories pc ON pc.category_id = c.id \
         GROUP BY c.id HAVING members < ?1 ORDER BY c.name",
    )?;
    let rows = statement.query_map([min_members], |row| {
        Ok(CategoryCount {
            name: row.get(0)?,
            members: row.get(1)?,
        })
    })?;
    rows.collect::<rusqlite::Result<_>>().map_err(Into::into)
}

/// Removes memberless category entities. With `apply = false` only reports
/// what would be removed. Immediately rerunning with `apply = true` removes
/// nothing further.
pub fn prune_empty_categories(db: &Database, apply: bool) -> Result<Vec<String>> {
    let empty: Vec<String> = get_empty_categories(db, 1)?
        .into_iter()
        .map(|c| c.name)
        .collect();
    if apply && !empty.is_empty() {
        let conn = db.conn()?;
        let mut statement = conn.prepare_cached("DELETE FROM categories WHERE name = ?1")?;
        for name in &empty {
            statement.execute(params![name])?;
        }
    }
    Ok(empty)
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
    use wikitool_core::wikitext::parse_redirect;

    fn seeded_db(entries: &[(&str, i64, &str)]) -> Database {
        let db = Database::open_in_memory().expect("open");
        run_migrations(&db).expect("migrate");
        let site = default_site();
        for (title, ns, content) in entries {
            let (is_redirect, target) = parse_redirect(content);
            pages::upsert_page(
                &db,
                &PageUpsert {
                    namespace: Some(*ns),
                    content: Some(content.to_string()),
                    is_redirect: Some(is_redirect),
                    redirect_target: Some(target),
                    page_type: Some(site.page_type(*ns, is_redirect)),
                    ..PageUpsert::new(*title)
                },
            )
            .expect("insert");
        }
        rebuild_index(&db, &site, &RebuildOptions::default()).expect("rebuild");
        db
    }

    #[test]
    fn backlinks_orphans_broken() {
        let db = seeded_db(&[
            ("Alpha", 0, "links to [[Beta]] and [[Missing]] and [[File:X.png]]"),
            ("Beta", 0, "links back to [[Alpha]] and [[Category:Nope|sort]]"),
            ("Gamma", 0, "nobody links here"),
        ]);

        let backlinks = get_backlinks(&db, "Beta").expect("backlinks");
        assert_eq!(backlinks.len(), 1);
        assert_eq!(backlinks[0].title, "Alpha");

        let orphans = get_orphan_pages(&db).expect("orphans");
        assert_eq!(orphans, vec!["Gamma"]);

        let broken = get_broken_links(&db).expect("broken");
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].target_title, "Missing");
        assert_eq!(broken[0].source_title, "Alpha");
    }

    #[test]
    fn double_redirects_and_resolution() {
        let db = seeded_db(&[
            ("Old", 0, "#REDIRECT [[New]]"),
            ("New", 0, "#REDIRECT [[Final]]"),
            ("Final", 0, "the destination"),
        ]);

        let doubles = get_double_redirects(&db).expect("doubles");
        assert_eq!(
            doubles,
            vec![DoubleRedirect {
                title: "Old".to_string(),
                first_target: "New".to_string(),
                final_target: "Final".to_string(),
            }]
        );

        assert_eq!(resolve_redirect(&db, "Old").expect("resolve"), "Final");
        assert_eq!(resolve_redirect(&db, "Final").expect("resolve"), "Final");
    }

    #[test]
    fn single_redirect_is_not_double() {
        let db = seeded_db(&[
            ("Old", 0, "#REDIRECT [[New]]"),
            ("New", 0, "actual content"),
        ]);
        assert!(get_double_redirects(&db).expect("doubles").is_empty());
    }

    #[test]
    fn uncategorized_and_missing_shortdesc() {
        let db = seeded_db(&[
            ("Tagged", 0, "{{SHORTDESC:desc}} [[Category:People]]"),
            ("Bare", 0, "no metadata at all"),
        ]);
        assert_eq!(get_uncategorized_pages(&db).expect("uncat"), vec!["Bare"]);
        assert_eq!(get_missing_shortdesc(&db).expect("missing"), vec!["Bare"]);
    }

    #[test]
    fn top_lists() {
        let db = seeded_db(&[
            ("A", 0, "{{Stub}}{{Stub}}[[X]]"),
            ("B", 0, "{{Stub}}{{Other}}[[X]] [[Y]]"),
        ]);
        let top = get_top_templates(&db, 5).expect("top templates");
        assert_eq!(top[0].title, "Stub");
        assert_eq!(top[0].count, 3);

        let linked = get_top_linked_pages(&db, 1).expect("top linked");
        assert_eq!(linked[0].title, "X");
        assert_eq!(linked[0].count, 2);
    }

    #[test]
    fn empty_category_prune_is_idempotent() {
        let db = seeded_db(&[("A", 0, "[[Category:Used]]")]);
        // A category entity with no members.
        {
            let conn = db.conn().expect("conn");
            conn.execute("INSERT INTO categories (name) VALUES ('Ghost')", [])
                .expect("insert");
        }

        let reported = prune_empty_categories(&db, false).expect("dry run");
        assert_eq!(reported, vec!["Ghost"]);
        // Dry run removed nothing.
        assert_eq!(prune_empty_categories(&db, true).expect("apply"), vec!["Ghost"]);
        // Second apply removes nothing further.
        assert!(prune_empty_categories(&db, true).expect("rerun").is_empty());
    }
}
