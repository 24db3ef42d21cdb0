//! Dependency extraction from Scribunto (Lua) module source.

use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleDepType {
    Require,
    LoadData,
    Other,
}

impl ModuleDepType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Require => "require",
            Self::LoadData => "loadData",
            Self::Other => "other",
        }
    }

    pub fn from_str(value: &str) -> Option<ModuleDepType> {
        Some(match value {
            "require" => Self::Require,
            "loadData" => Self::LoadData,
            "other" => Self::Other,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModuleDep {
    pub dependency: String,
    pub dep_type: ModuleDepType,
}

/// Scans Lua source for `require("Module:X")`, `mw.loadData("Module:X")`
/// and `mw.loadJsonData(...)` calls. Duplicates collapse on
/// `(dependency, kind)`, first occurrence wins.
pub fn scan_module_deps(lua: &str) -> Vec<ModuleDep> {
    let re = lazy_regex!(
        r#"\b(require|mw\.loadData|mw\.loadJsonData)\s*\(?\s*["']([^"']+)["']"#
    );
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for captures in re.captures_iter(lua) {
        let dep_type = match &captures[1] {
            "require" => ModuleDepType::Require,
            "mw.loadData" => ModuleDepType::LoadData,
            _ => ModuleDepType::Other,
        };
        let dependency = captures[2].trim().to_string();
        if dependency.is_empty() {
            continue;
        }
        if seen.insert((dependency.clone(), dep_type)) {
            out.push(ModuleDep {
                dependency,
                dep_type,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_and_load_data() {
        let lua = r#"
local navbar = require('Module:Navbar')
local cfg = mw.loadData("Module:Navbar/configuration")
local extra = mw.loadJsonData("Module:Stats/data.json")
local again = require('Module:Navbar')
"#;
        let deps = scan_module_deps(lua);
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].dependency, "Module:Navbar");
        assert_eq!(deps[0].dep_type, ModuleDepType::Require);
        assert_eq!(deps[1].dependency, "Module:Navbar/configuration");
        assert_eq!(deps[1].dep_type, ModuleDepType::LoadData);
        assert_eq!(deps[2].dep_type, ModuleDepType::Other);
    }

    #[test]
    fn paren_free_require() {
        let deps = scan_module_deps(r#"local m = require "Module:Thing""#);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].dependency, "Module:Thing");
    }

    #[test]
    fn no_deps() {
        assert!(scan_module_deps("return {}").is_empty());
    }
}
