//! Data table component types.
//!
//! List pages describe their columns and filters once with
//! [`DataTableConfig`]; the shared `partials/data_table_*.html` templates
//! render the filter bar, header row and pager from it.

use tienda_core::models::{Category, Page};
use tienda_core::OrderStatus;

/// Column definition for a data table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    /// Unique key for the column.
    pub key: String,
    /// Display label for the column header.
    pub label: String,
    /// Right-aligned numeric column.
    pub numeric: bool,
}

impl TableColumn {
    #[must_use]
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            numeric: false,
        }
    }

    /// Create a right-aligned numeric column.
    #[must_use]
    pub fn numeric(key: &str, label: &str) -> Self {
        Self {
            numeric: true,
            ..Self::new(key, label)
        }
    }
}

/// Filter type for data tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Text input filter.
    Text,
    /// Single-select dropdown.
    Select,
}

/// Option for select filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
}

impl FilterOption {
    #[must_use]
    pub fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

/// Filter definition for a data table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFilter {
    /// Query parameter key.
    pub key: String,
    pub label: String,
    pub filter_type: FilterType,
    pub placeholder: Option<String>,
    pub options: Vec<FilterOption>,
    /// Current value from the request query.
    pub value: String,
}

impl TableFilter {
    /// Create a text filter.
    #[must_use]
    pub fn text(key: &str, label: &str, placeholder: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            filter_type: FilterType::Text,
            placeholder: Some(placeholder.to_string()),
            options: vec![],
            value: String::new(),
        }
    }

    /// Create a select filter. An empty value means "all".
    #[must_use]
    pub fn select(key: &str, label: &str, options: Vec<FilterOption>) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            filter_type: FilterType::Select,
            placeholder: None,
            options,
            value: String::new(),
        }
    }

    #[must_use]
    pub fn is_select(&self) -> bool {
        self.filter_type == FilterType::Select
    }
}

/// Previous/next links for a paginated table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

/// Configuration for a data table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTableConfig {
    /// Unique table identifier.
    pub table_id: String,
    /// Path the filter form submits to.
    pub base_path: String,
    pub columns: Vec<TableColumn>,
    pub filters: Vec<TableFilter>,
    /// Whether the last column holds row actions.
    pub has_actions: bool,
    pub empty_title: String,
    pub empty_description: Option<String>,
}

impl DataTableConfig {
    /// Create a new data table configuration.
    #[must_use]
    pub fn new(table_id: &str, base_path: &str) -> Self {
        Self {
            table_id: table_id.to_string(),
            base_path: base_path.to_string(),
            columns: vec![],
            filters: vec![],
            has_actions: false,
            empty_title: "No items found".to_string(),
            empty_description: None,
        }
    }

    #[must_use]
    pub fn column(mut self, column: TableColumn) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: TableFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Reserve a trailing column for row actions.
    #[must_use]
    pub const fn with_actions(mut self) -> Self {
        self.has_actions = true;
        self
    }

    /// Set empty state configuration.
    #[must_use]
    pub fn empty_state(mut self, title: &str, description: Option<&str>) -> Self {
        self.empty_title = title.to_string();
        self.empty_description = description.map(ToString::to_string);
        self
    }

    /// Fill filter values from the current request.
    #[must_use]
    pub fn with_values(mut self, values: &[(&str, Option<&str>)]) -> Self {
        for filter in &mut self.filters {
            if let Some((_, Some(value))) = values.iter().find(|(k, _)| *k == filter.key) {
                value.trim().clone_into(&mut filter.value);
            }
        }
        self
    }

    #[must_use]
    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Number of header cells, for empty-state colspans.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len() + usize::from(self.has_actions)
    }

    /// Link to `page` keeping the active filters.
    #[must_use]
    pub fn page_href(&self, page: u32) -> String {
        let mut query: Vec<String> = self
            .filters
            .iter()
            .filter(|f| !f.value.is_empty())
            .map(|f| format!("{}={}", f.key, urlencoding::encode(&f.value)))
            .collect();
        query.push(format!("page={page}"));
        format!("{}?{}", self.base_path, query.join("&"))
    }

    /// Pager links for a backend page.
    #[must_use]
    pub fn pagination<T>(&self, page: &Page<T>) -> Pagination {
        Pagination {
            page: page.page,
            total_pages: page.total_pages(),
            total: page.total,
            prev_href: page.has_prev().then(|| self.page_href(page.page - 1)),
            next_href: page.has_next().then(|| self.page_href(page.page + 1)),
        }
    }
}

/// Products table, filterable by search text and category.
#[must_use]
pub fn products_table_config(categories: &[Category]) -> DataTableConfig {
    let category_options = categories
        .iter()
        .map(|c| FilterOption::new(&c.id.to_string(), &c.name))
        .collect();

    DataTableConfig::new("products", "/products")
        .column(TableColumn::new("name", "Product"))
        .column(TableColumn::new("category", "Category"))
        .column(TableColumn::numeric("price", "Price"))
        .column(TableColumn::numeric("stock", "Stock"))
        .column(TableColumn::new("status", "Status"))
        .with_actions()
        .filter(TableFilter::text("q", "Search", "Search products by name..."))
        .filter(TableFilter::select("category", "Category", category_options))
        .empty_state(
            "No products found",
            Some("Try adjusting your search or filters"),
        )
}

/// Categories table.
#[must_use]
pub fn categories_table_config() -> DataTableConfig {
    DataTableConfig::new("categories", "/categories")
        .column(TableColumn::new("name", "Category"))
        .column(TableColumn::new("description", "Description"))
        .column(TableColumn::numeric("products", "Products"))
        .with_actions()
        .empty_state("No categories yet", Some("Create the first one below"))
}

/// Users table.
#[must_use]
pub fn users_table_config() -> DataTableConfig {
    DataTableConfig::new("users", "/users")
        .column(TableColumn::new("name", "Name"))
        .column(TableColumn::new("email", "Email"))
        .column(TableColumn::new("role", "Role"))
        .column(TableColumn::new("active", "Status"))
        .column(TableColumn::new("created", "Joined"))
        .with_actions()
        .empty_state("No users found", None)
}

/// Orders table, filterable by status.
#[must_use]
pub fn orders_table_config() -> DataTableConfig {
    let status_options = OrderStatus::ALL
        .iter()
        .map(|s| FilterOption::new(s.as_str(), s.label()))
        .collect();

    DataTableConfig::new("orders", "/orders")
        .column(TableColumn::new("id", "Order"))
        .column(TableColumn::new("customer", "Customer"))
        .column(TableColumn::new("date", "Date"))
        .column(TableColumn::new("status", "Status"))
        .column(TableColumn::new("payment", "Payment"))
        .column(TableColumn::numeric("total", "Total"))
        .filter(TableFilter::select("status", "Status", status_options))
        .empty_state("No orders found", Some("Try a different status filter"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tienda_core::CategoryId;

    #[test]
    fn test_with_values_fills_known_filters() {
        let config = orders_table_config().with_values(&[
            ("status", Some(" paid ")),
            ("unknown", Some("x")),
        ]);
        assert_eq!(config.filters[0].value, "paid");
        assert_eq!(config.page_href(2), "/orders?status=paid&page=2");
    }

    #[test]
    fn test_page_href_encodes_search() {
        let config = products_table_config(&[]).with_values(&[("q", Some("café molido"))]);
        assert_eq!(config.page_href(1), "/products?q=caf%C3%A9%20molido&page=1");
    }

    #[test]
    fn test_pagination_links() {
        let config = users_table_config();
        let page: Page<u8> = Page {
            items: vec![],
            page: 2,
            per_page: 20,
            total: 45,
        };
        let pagination = config.pagination(&page);
        assert_eq!(pagination.total_pages, 3);
        assert_eq!(pagination.prev_href.as_deref(), Some("/users?page=1"));
        assert_eq!(pagination.next_href.as_deref(), Some("/users?page=3"));

        let last = Page::<u8> { page: 3, ..page };
        assert!(config.pagination(&last).next_href.is_none());
    }

    #[test]
    fn test_products_config_lists_categories() {
        let categories = vec![Category {
            id: CategoryId::new(4),
            name: "Coffee".to_string(),
            description: None,
            product_count: Some(3),
        }];
        let config = products_table_config(&categories);
        let select = config.filters.iter().find(|f| f.is_select()).unwrap();
        assert_eq!(select.options, vec![FilterOption::new("4", "Coffee")]);
        assert_eq!(config.column_count(), 6);
    }
}
