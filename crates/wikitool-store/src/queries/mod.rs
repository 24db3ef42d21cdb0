//! Read-only aggregations over the derived tables. Nothing in this module
//! mutates state except [`links::prune_empty_categories`] when explicitly
//! asked to apply.

mod cargo;
mod context;
mod links;
mod templates;

pub use cargo::{
    get_cargo_schema_mismatches, get_cargo_table_context, CargoMismatch, CargoQueryRow,
    CargoStoreRow, CargoTableContext, ColumnDef,
};
pub use context::{get_context_bundle, ContextBundle, ContextOptions};
pub use links::{
    get_backlinks, get_broken_links, get_double_redirects, get_empty_categories,
    get_missing_shortdesc, get_orphan_pages, get_top_categories, get_top_linked_pages,
    get_top_templates, get_uncategorized_pages, prune_empty_categories, resolve_redirect,
    Backlink, BrokenLink, CategoryCount, DoubleRedirect, TitleCount,
};
pub use templates::{
    get_template_schema, get_template_usage_stats, NamedParamStat, PositionalParamStat,
    SchemaParam, SchemaSource, TemplateSchema, TemplateUsageStats, UsageStatsOptions,
};
