//! Schema migrations, ordered by zero-padded version string. Each entry is
//! applied inside its own transaction by the runner in [`crate::migrate`].
//!
//! Timestamps are TEXT in ISO 8601 UTC, booleans INTEGER 0/1, opaque JSON
//! payloads TEXT.

/// `(version, sql)` pairs, lexicographically ordered.
pub const MIGRATIONS: &[(&str, &str)] = &[
    // -- 001: authoritative state -------------------------------------------
    (
        "001",
        r#"
        CREATE TABLE pages (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            title             TEXT NOT NULL UNIQUE,
            namespace         INTEGER NOT NULL DEFAULT 0,
            page_type         TEXT NOT NULL DEFAULT 'article',
            filename          TEXT NOT NULL DEFAULT '',
            filepath          TEXT NOT NULL DEFAULT '',
            template_category TEXT,
            content           TEXT NOT NULL DEFAULT '',
            content_hash      TEXT NOT NULL DEFAULT '',
            file_mtime        INTEGER,
            wiki_modified_at  TEXT,
            last_synced_at    TEXT,
            sync_status       TEXT NOT NULL DEFAULT 'new',
            is_redirect       INTEGER NOT NULL DEFAULT 0,
            redirect_target   TEXT,
            content_model     TEXT,
            page_id           INTEGER,
            revision_id       INTEGER,
            shortdesc         TEXT,
            display_title     TEXT,
            word_count        INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX idx_pages_namespace ON pages(namespace);
        CREATE INDEX idx_pages_sync_status ON pages(sync_status);
        CREATE INDEX idx_pages_filepath ON pages(filepath);

        CREATE TABLE categories (
            id   INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE page_categories (
            page_id     INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            PRIMARY KEY (page_id, category_id)
        );

        CREATE TABLE config (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE sync_log (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            operation     TEXT NOT NULL,
            page_title    TEXT,
            status        TEXT NOT NULL,
            revision_id   INTEGER,
            error_message TEXT,
            details       TEXT,
            timestamp     TEXT NOT NULL
        );
        "#,
    ),
    // -- 002: links, redirects, sections ------------------------------------
    (
        "002",
        r#"
        CREATE TABLE page_links (
            source_page_id   INTEGER NOT NULL,
            target_title     TEXT NOT NULL,
            link_type        TEXT NOT NULL DEFAULT 'internal',
            target_namespace INTEGER,
            UNIQUE (source_page_id, target_title, link_type)
        );
        CREATE INDEX idx_page_links_target ON page_links(target_title);

        CREATE TABLE redirects (
            source_title TEXT PRIMARY KEY,
            target_title TEXT NOT NULL
        );
        CREATE INDEX idx_redirects_target ON redirects(target_title);

        CREATE TABLE template_usage (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            page_id       INTEGER NOT NULL,
            template_name TEXT NOT NULL
        );
        CREATE INDEX idx_template_usage_name ON template_usage(template_name);
        CREATE INDEX idx_template_usage_page ON template_usage(page_id);

        CREATE TABLE page_sections (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            page_id       INTEGER NOT NULL,
            section_index INTEGER NOT NULL,
            heading       TEXT,
            level         INTEGER,
            anchor        TEXT,
            content       TEXT NOT NULL DEFAULT '',
            is_lead       INTEGER NOT NULL DEFAULT 0,
            UNIQUE (page_id, section_index)
        );

        CREATE VIRTUAL TABLE page_sections_fts USING fts5(
            title,
            heading,
            content,
            page_id UNINDEXED,
            section_index UNINDEXED,
            tokenize = 'porter unicode61'
        );
        "#,
    ),
    // -- 003: template calls, metadata, module deps --------------------------
    (
        "003",
        r#"
        CREATE TABLE template_calls (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            page_id       INTEGER NOT NULL,
            template_name TEXT NOT NULL,
            call_index    INTEGER NOT NULL
        );
        CREATE INDEX idx_template_calls_name ON template_calls(template_name);
        CREATE INDEX idx_template_calls_page ON template_calls(page_id);

        CREATE TABLE template_params (
            call_id     INTEGER NOT NULL,
            param_index INTEGER NOT NULL,
            param_name  TEXT,
            param_value TEXT NOT NULL DEFAULT '',
            is_named    INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX idx_template_params_call ON template_params(call_id);

        CREATE TABLE infobox_kv (
            page_id      INTEGER NOT NULL,
            infobox_name TEXT NOT NULL,
            param_name   TEXT NOT NULL,
            param_value  TEXT NOT NULL DEFAULT '',
            call_index   INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX idx_infobox_kv_page ON infobox_kv(page_id);
        CREATE INDEX idx_infobox_kv_name ON infobox_kv(infobox_name);

        CREATE TABLE template_metadata (
            template_name TEXT PRIMARY KEY,
            source        TEXT NOT NULL,
            param_defs    TEXT,
            description   TEXT,
            example       TEXT,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE module_deps (
            module_title TEXT NOT NULL,
            dependency   TEXT NOT NULL,
            dep_type     TEXT NOT NULL DEFAULT 'require',
            UNIQUE (module_title, dependency, dep_type)
        );
        "#,
    ),
    // -- 004: Cargo extension constructs ------------------------------------
    (
        "004",
        r#"
        CREATE TABLE cargo_tables (
            page_id     INTEGER NOT NULL,
            table_name  TEXT NOT NULL,
            columns     TEXT NOT NULL DEFAULT '[]',
            declare_raw TEXT NOT NULL DEFAULT '',
            UNIQUE (page_id, table_name)
        );

        CREATE TABLE cargo_stores (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            page_id     INTEGER NOT NULL,
            table_name  TEXT NOT NULL,
            values_json TEXT NOT NULL DEFAULT '{}',
            store_raw   TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX idx_cargo_stores_table ON cargo_stores(table_name);

        CREATE TABLE cargo_queries (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            page_id     INTEGER NOT NULL,
            query_type  TEXT NOT NULL,
            tables_json TEXT NOT NULL DEFAULT '[]',
            fields_json TEXT,
            params_json TEXT NOT NULL DEFAULT '{}',
            query_raw   TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX idx_cargo_queries_page ON cargo_queries(page_id);
        "#,
    ),
    // -- 005: tiered documentation FTS + late indexes ------------------------
    (
        "005",
        r#"
        CREATE VIRTUAL TABLE docs_fts USING fts5(
            tier UNINDEXED,
            title,
            content,
            tokenize = 'porter unicode61'
        );

        CREATE INDEX idx_pages_page_type ON pages(page_type);
        CREATE INDEX idx_page_categories_category ON page_categories(category_id);
        "#,
    ),
];

/// Tables that must exist for the schema to be considered valid.
pub const REQUIRED_TABLES: &[&str] = &[
    "pages",
    "categories",
    "page_categories",
    "config",
    "sync_log",
    "schema_migrations",
    "page_links",
    "redirects",
    "template_usage",
    "page_sections",
    "page_sections_fts",
    "template_calls",
    "template_params",
    "infobox_kv",
    "template_metadata",
    "module_deps",
    "cargo_tables",
    "cargo_stores",
    "cargo_queries",
    "docs_fts",
];

/// Derived tables: safe to drop and rebuild from `pages.content`.
pub const DERIVED_TABLES: &[&str] = &[
    "page_links",
    "redirects",
    "template_usage",
    "page_sections",
    "page_sections_fts",
    "template_calls",
    "template_params",
    "infobox_kv",
    "module_deps",
    "cargo_tables",
    "cargo_stores",
    "cargo_queries",
    "page_categories",
];

pub fn latest_version() -> &'static str {
    MIGRATIONS
        .last()
        .map(|(version, _)| *version)
        .expect("at least one migration")
}
