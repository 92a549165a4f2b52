//! Query builders for config searches
//!
//! Translates search filters into SeaORM conditions over `config_info`. Wildcards
//! are written by callers as `*`; literal `%` and `_` are escaped so they only
//! match themselves.

use sea_orm::sea_query::LikeExpr;
use sea_orm::{ColumnTrait, Condition};
use serde::{Deserialize, Serialize};

use crate::entity::config_info;

const LIKE_ESCAPE: char = '\\';

/// How the string filters of a search are matched
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Data id, group and app name must be equal
    #[default]
    Exact,
    /// Data id, group and app name are LIKE patterns, `*` is the wildcard
    Fuzzy,
}

/// Filters for a paginated config search
///
/// Empty strings and empty lists mean "no constraint". The tenant always applies.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSearchFilter {
    pub tenant: String,
    pub data_id: String,
    pub group: String,
    pub app_name: String,
    /// Configs must carry every listed tag
    pub tags: Vec<String>,
    pub types: Vec<String>,
    /// Substring of the content
    pub content: String,
    pub mode: SearchMode,
}

/// One entry of a key-set search
///
/// `data_id` and `group` are patterns with `*` wildcards, `app_name` is exact.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigKeyFilter {
    pub data_id: String,
    pub group: String,
    pub app_name: String,
}

impl ConfigKeyFilter {
    pub fn new(data_id: &str, group: &str, app_name: &str) -> Self {
        Self {
            data_id: data_id.to_string(),
            group: group.to_string(),
            app_name: app_name.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.data_id.trim().is_empty()
            && self.group.trim().is_empty()
            && self.app_name.trim().is_empty()
    }
}

/// Escape SQL wildcard characters and convert user wildcards to SQL LIKE pattern.
#[inline]
pub fn escape_sql_like_pattern(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
        .replace('*', "%")
}

/// LIKE expression for a `*` pattern
pub fn like_expr(pattern: &str) -> LikeExpr {
    LikeExpr::new(escape_sql_like_pattern(pattern)).escape(LIKE_ESCAPE)
}

/// LIKE expression matching `value` anywhere, taken literally
fn contains_expr(value: &str) -> LikeExpr {
    let escaped = escape_sql_like_pattern(&value.replace('*', ""));
    LikeExpr::new(format!("%{}%", escaped)).escape(LIKE_ESCAPE)
}

/// Normalize config tags by filtering empty entries.
#[inline]
pub fn normalize_tags(config_tags: &str) -> Vec<&str> {
    config_tags
        .split(',')
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .collect()
}

fn fuzzy_filter(column: config_info::Column, value: &str) -> Condition {
    let cond = Condition::all();
    if value.contains('*') {
        cond.add(column.like(like_expr(value)))
    } else {
        cond.add(column.like(contains_expr(value)))
    }
}

/// Condition for the string and list filters of a search
///
/// Tag membership is applied by the caller since it needs a sub-query.
pub fn search_condition(filter: &ConfigSearchFilter) -> Condition {
    let mut cond = Condition::all().add(config_info::Column::TenantId.eq(filter.tenant.as_str()));

    let string_filters = [
        (config_info::Column::DataId, filter.data_id.as_str()),
        (config_info::Column::GroupId, filter.group.as_str()),
        (config_info::Column::AppName, filter.app_name.as_str()),
    ];
    for (column, value) in string_filters {
        if value.is_empty() {
            continue;
        }
        cond = match filter.mode {
            SearchMode::Exact => cond.add(column.eq(value)),
            SearchMode::Fuzzy => cond.add(fuzzy_filter(column, value)),
        };
    }

    if !filter.content.is_empty() {
        cond = cond.add(config_info::Column::Content.like(contains_expr(&filter.content)));
    }
    if !filter.types.is_empty() {
        cond = cond.add(config_info::Column::Type.is_in(filter.types.iter().map(String::as_str)));
    }

    cond
}

/// Condition for a key-set search
///
/// Whitelist mode matches any key: the OR of per-key ANDs. Blacklist mode
/// excludes every key: the AND of per-key negated ORs. Returns `None` when no
/// key carries a constraint, which callers treat as an empty result.
pub fn key_set_condition(keys: &[ConfigKeyFilter], blacklist: bool) -> Option<Condition> {
    let mut outer = if blacklist {
        Condition::all()
    } else {
        Condition::any()
    };
    let mut effective = 0;

    for key in keys.iter().filter(|k| !k.is_blank()) {
        let mut inner = if blacklist {
            Condition::any()
        } else {
            Condition::all()
        };
        if !key.data_id.trim().is_empty() {
            let expr = like_expr(&key.data_id);
            inner = inner.add(if blacklist {
                config_info::Column::DataId.not_like(expr)
            } else {
                config_info::Column::DataId.like(expr)
            });
        }
        if !key.group.trim().is_empty() {
            let expr = like_expr(&key.group);
            inner = inner.add(if blacklist {
                config_info::Column::GroupId.not_like(expr)
            } else {
                config_info::Column::GroupId.like(expr)
            });
        }
        if !key.app_name.trim().is_empty() {
            let app_name = key.app_name.as_str();
            inner = inner.add(if blacklist {
                config_info::Column::AppName.ne(app_name)
            } else {
                config_info::Column::AppName.eq(app_name)
            });
        }
        outer = outer.add(inner);
        effective += 1;
    }

    (effective > 0).then_some(outer)
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use sea_orm::{DbBackend, EntityTrait, QueryFilter, QueryTrait};

    fn sql_for(cond: Condition) -> String {
        config_info::Entity::find()
            .filter(cond)
            .build(DbBackend::MySql)
            .to_string()
    }

    #[test]
    fn test_escape_sql_like_pattern() {
        assert_eq!(escape_sql_like_pattern("app*"), "app%");
        assert_eq!(escape_sql_like_pattern("a_b%c"), "a\\_b\\%c");
        assert_eq!(escape_sql_like_pattern("plain"), "plain");
    }

    #[test]
    fn test_normalize_tags() {
        assert_eq!(normalize_tags("a, b,,c ,"), vec!["a", "b", "c"]);
        assert!(normalize_tags("").is_empty());
        assert!(normalize_tags(" , ").is_empty());
    }

    #[test]
    fn test_config_key_filter_is_blank() {
        assert!(ConfigKeyFilter::new("", " ", "").is_blank());
        assert!(!ConfigKeyFilter::new("a*", "", "").is_blank());
    }

    #[test]
    fn test_key_set_condition_empty() {
        assert!(key_set_condition(&[], false).is_none());
        assert!(key_set_condition(&[], true).is_none());
        assert!(key_set_condition(&[ConfigKeyFilter::default()], true).is_none());
    }

    #[test]
    fn test_key_set_condition_whitelist_sql() {
        let keys = vec![
            ConfigKeyFilter::new("app*", "DEFAULT_GROUP", ""),
            ConfigKeyFilter::new("", "", "billing"),
        ];
        let sql = sql_for(key_set_condition(&keys, false).unwrap());

        assert!(sql.contains("`data_id` LIKE 'app%'"), "{}", sql);
        assert!(sql.contains("`group_id` LIKE 'DEFAULT\\\\_GROUP'"), "{}", sql);
        assert!(sql.contains("`app_name` = 'billing'"), "{}", sql);
        assert!(sql.contains(" OR "), "{}", sql);
    }

    #[test]
    fn test_key_set_condition_blacklist_sql() {
        let keys = vec![ConfigKeyFilter::new("app*", "", "billing")];
        let sql = sql_for(key_set_condition(&keys, true).unwrap());

        assert!(sql.contains("`data_id` NOT LIKE 'app%'"), "{}", sql);
        assert!(sql.contains("`app_name` <> 'billing'"), "{}", sql);
    }

    #[test]
    fn test_search_condition_exact() {
        let filter = ConfigSearchFilter {
            tenant: "dev".to_string(),
            data_id: "app.yaml".to_string(),
            group: "DEFAULT_GROUP".to_string(),
            ..Default::default()
        };
        let sql = sql_for(search_condition(&filter));

        assert!(sql.contains("`tenant_id` = 'dev'"), "{}", sql);
        assert!(sql.contains("`data_id` = 'app.yaml'"), "{}", sql);
        assert!(!sql.contains("LIKE"), "{}", sql);
    }

    #[test]
    fn test_search_condition_fuzzy() {
        let filter = ConfigSearchFilter {
            data_id: "app*".to_string(),
            group: "GROUP".to_string(),
            content: "timeout".to_string(),
            types: vec!["yaml".to_string()],
            mode: SearchMode::Fuzzy,
            ..Default::default()
        };
        let sql = sql_for(search_condition(&filter));

        assert!(sql.contains("`data_id` LIKE 'app%'"), "{}", sql);
        assert!(sql.contains("`group_id` LIKE '%GROUP%'"), "{}", sql);
        assert!(sql.contains("`content` LIKE '%timeout%'"), "{}", sql);
        assert!(sql.contains("`type` IN ('yaml')"), "{}", sql);
    }

    proptest! {
        #[test]
        fn escaped_pattern_has_no_bare_wildcards(s in "[a-z_%*.]{0,24}") {
            let escaped = escape_sql_like_pattern(&s);
            prop_assert!(!escaped.contains('*'));
            prop_assert_eq!(escaped.matches('%').count(), s.matches('%').count() + s.matches('*').count());
        }
    }
}
