//! Canonical query for a report listing.

use std::collections::BTreeMap;

use crate::query::QueryParams;

/// Query key holding the 1-based page number.
pub const PAGE_PARAM: &str = "page";
/// Query key holding the ordering field, `-` prefixed for descending.
pub const ORDER_PARAM: &str = "order";

/// Page, ordering, and filters that fully determine a report fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    /// 1-based page number.
    pub page: u32,
    /// Ordering field, `-` prefixed for descending.
    pub order: Option<String>,
    /// Every other search key.
    pub filters: BTreeMap<String, String>,
}

impl Default for ReportQuery {
    fn default() -> Self {
        Self {
            page: 1,
            order: None,
            filters: BTreeMap::new(),
        }
    }
}

impl ReportQuery {
    /// Derive a query from location search parameters.
    ///
    /// A missing or malformed page becomes page 1.
    #[must_use]
    pub fn from_search(search: &QueryParams) -> Self {
        let page = search.get(PAGE_PARAM).and_then(parse_page).unwrap_or(1);
        let order = search.get(ORDER_PARAM).map(str::to_string);
        let filters = search
            .iter()
            .filter(|(key, _)| *key != PAGE_PARAM && *key != ORDER_PARAM)
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self {
            page,
            order,
            filters,
        }
    }

    /// Parameters as they appear in the location and on the wire.
    #[must_use]
    pub fn to_params(&self) -> QueryParams {
        let mut params: QueryParams = self
            .filters
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if let Some(order) = &self.order {
            params.insert(ORDER_PARAM, order.clone());
        }
        params.insert(PAGE_PARAM, self.page.to_string());
        params
    }

    /// Encoded query string with its leading `?`.
    #[must_use]
    pub fn query_string(&self) -> String {
        format!("?{}", self.to_params().encode())
    }

    /// Ordering field and direction (`true` for ascending).
    #[must_use]
    pub fn order_field(&self) -> Option<(&str, bool)> {
        let order = self.order.as_deref().filter(|order| !order.is_empty())?;
        Some(
            order
                .strip_prefix('-')
                .map_or((order, true), |field| (field, false)),
        )
    }
}

fn parse_page(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|page| *page >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_splits_into_page_order_and_filters() {
        let search = QueryParams::parse("page=3&order=-created&status=open&q=acme");
        let query = ReportQuery::from_search(&search);
        assert_eq!(query.page, 3);
        assert_eq!(query.order.as_deref(), Some("-created"));
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.order_field(), Some(("created", false)));
    }

    #[test]
    fn malformed_page_defaults_to_first() {
        for raw in ["page=abc", "page=0", "page=-2", ""] {
            assert_eq!(ReportQuery::from_search(&QueryParams::parse(raw)).page, 1);
        }
    }

    #[test]
    fn query_string_is_deterministic() {
        let query = ReportQuery {
            page: 2,
            order: Some("name".into()),
            filters: BTreeMap::from([("status".into(), "on hold".into())]),
        };
        assert_eq!(query.query_string(), "?order=name&page=2&status=on+hold");
        assert_eq!(ReportQuery::from_search(&query.to_params()), query);
    }
}
