//! Cargo extension parser functions: `#cargo_declare`, `#cargo_store`,
//! `#cargo_query`, `#cargo_attach`. The raw source of every construct is
//! preserved alongside the structured form.

use super::{
    template::{split_named, ParserFunction},
    ParsedPage,
};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CargoColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub col_type: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CargoDeclare {
    pub table_name: String,
    pub columns: Vec<CargoColumn>,
    pub raw: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CargoStore {
    pub table_name: String,
    /// Named values in source order.
    pub values: Vec<(String, String)>,
    pub raw: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CargoQuery {
    /// `query` or `attach`.
    pub query_type: String,
    pub tables: Vec<String>,
    pub fields: Vec<String>,
    /// Remaining named parameters (where, order by, limit, format, ...).
    pub params: Vec<(String, String)>,
    pub raw: String,
}

/// Routes one parser-function call into the page's cargo collections.
/// Unknown functions are ignored.
pub(crate) fn route(func: &ParserFunction, raw: &str, page: &mut ParsedPage) {
    let named = named_params(&func.parts);
    match func.name.as_str() {
        "#cargo_declare" => {
            let Some(table) = take(&named, "_table") else {
                return;
            };
            let columns = named
                .iter()
                .filter(|(name, _)| !name.starts_with('_'))
                .map(|(name, value)| CargoColumn {
                    name: name.clone(),
                    col_type: value.clone(),
                })
                .collect();
            page.cargo_declares.push(CargoDeclare {
                table_name: table,
                columns,
                raw: raw.to_string(),
            });
        }
        "#cargo_store" => {
            let Some(table) = take(&named, "_table") else {
                return;
            };
            let values = named
                .iter()
                .filter(|(name, _)| !name.starts_with('_'))
                .cloned()
                .collect();
            page.cargo_stores.push(CargoStore {
                table_name: table,
                values,
                raw: raw.to_string(),
            });
        }
        "#cargo_query" => {
            let tables = take(&named, "tables")
                .or_else(|| take(&named, "table"))
                .map(|list| split_list(&list))
                .unwrap_or_default();
            let fields = take(&named, "fields")
                .map(|list| split_list(&list))
                .unwrap_or_default();
            let params = named
                .iter()
                .filter(|(name, _)| {
                    !matches!(name.as_str(), "tables" | "table" | "fields")
                })
                .cloned()
                .collect();
            page.cargo_queries.push(CargoQuery {
                query_type: "query".to_string(),
                tables,
                fields,
                params,
                raw: raw.to_string(),
            });
        }
        "#cargo_attach" => {
            let Some(table) = take(&named, "_table") else {
                return;
            };
            let params = named
                .iter()
                .filter(|(name, _)| !name.starts_with('_'))
                .cloned()
                .collect();
            page.cargo_queries.push(CargoQuery {
                query_type: "attach".to_string(),
                tables: vec![table],
                fields: Vec::new(),
                params,
                raw: raw.to_string(),
            });
        }
        _ => {}
    }
}

fn named_params(parts: &[String]) -> Vec<(String, String)> {
    parts.iter().filter_map(|part| split_named(part)).collect()
}

fn take(named: &[(String, String)], key: &str) -> Option<String> {
    named
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.clone())
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::settings::default_site;
    use crate::wikitext::parse;

    #[test]
    fn declare_store_query_attach() {
        let site = default_site();
        let text = "\
{{#cargo_declare:_table=Releases|name=String|qty=Integer|date=Date}}
{{#cargo_store:_table=Releases|name=foo|qty=3}}
{{#cargo_query:tables=Releases|fields=name,qty|where=qty>1|limit=10}}
{{#cargo_attach:_table=Releases}}
";
        let page = parse(text, &site);

        assert_eq!(page.cargo_declares.len(), 1);
        let decl = &page.cargo_declares[0];
        assert_eq!(decl.table_name, "Releases");
        assert_eq!(decl.columns.len(), 3);
        assert_eq!(decl.columns[0].name, "name");
        assert_eq!(decl.columns[0].col_type, "String");
        assert!(decl.raw.starts_with("{{#cargo_declare:"));

        assert_eq!(page.cargo_stores.len(), 1);
        let store = &page.cargo_stores[0];
        assert_eq!(store.table_name, "Releases");
        assert_eq!(
            store.values,
            vec![
                ("name".to_string(), "foo".to_string()),
                ("qty".to_string(), "3".to_string())
            ]
        );

        assert_eq!(page.cargo_queries.len(), 2);
        let query = &page.cargo_queries[0];
        assert_eq!(query.query_type, "query");
        assert_eq!(query.tables, vec!["Releases"]);
        assert_eq!(query.fields, vec!["name", "qty"]);
        assert!(query
            .params
            .iter()
            .any(|(k, v)| k == "where" && v == "qty>1"));

        let attach = &page.cargo_queries[1];
        assert_eq!(attach.query_type, "attach");
        assert_eq!(attach.tables, vec!["Releases"]);
    }

    #[test]
    fn declare_without_table_is_skipped() {
        let site = default_site();
        let page = parse("{{#cargo_declare:name=String}}", &site);
        assert!(page.cargo_declares.is_empty());
    }
}
