//! Catalog query builder
//!
//! Turns the loosely-typed search parameters of the storefront into a
//! store-agnostic [`Predicate`], a deterministic [`SortOrder`] and a page
//! window. Resolution is pure: the same criteria always resolve to the same
//! [`ResolvedQuery`], and the predicate is shared between the page fetch and
//! the total count so `pages` always agrees with `countProducts`.

use std::cmp::Ordering;

use serde::Deserialize;
use strum::{Display, EnumString};
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};

use crate::models::Product;

/// Sentinel accepted by every filter field meaning "do not filter".
pub const MATCH_ALL: &str = "all";

/// Page size used when the request does not carry one.
pub const DEFAULT_PAGE_SIZE: u64 = 3;

/// A search parameter that could not be turned into a filter or page window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {field}: {message}")]
pub struct ValidationError {
    /// Name of the offending request parameter
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Raw search/listing parameters as they arrive on the query string.
///
/// Every field is optional. An empty value or `"all"` never produces a
/// filter clause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SearchCriteria {
    /// Case-insensitive substring of the product name
    pub query: Option<String>,
    /// Exact category name
    pub category: Option<String>,
    /// Inclusive price range written as `low-high`, e.g. `10-20`
    pub price: Option<String>,
    /// Minimum average rating
    pub rating: Option<String>,
    /// One of `featured`, `lowest`, `highest`, `toprated`, `newest`
    pub order: Option<String>,
    /// 1-based page number
    pub page: Option<String>,
    /// Number of products per page
    pub page_size: Option<String>,
}

/// Paging-only parameters used by the admin listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number
    pub page: Option<String>,
    /// Number of products per page
    pub page_size: Option<String>,
}

impl From<PageParams> for SearchCriteria {
    fn from(params: PageParams) -> Self {
        Self {
            page: params.page,
            page_size: params.page_size,
            ..Default::default()
        }
    }
}

/// A single field constraint. A [`Predicate`] is the conjunction of its clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Case-insensitive substring match on the product name
    NameContains(String),
    /// Exact category match
    CategoryEquals(String),
    /// `min <= price <= max`
    PriceBetween { min: f64, max: f64 },
    /// `rating >= min`
    RatingAtLeast(f64),
}

impl Clause {
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Clause::NameContains(text) => product
                .name
                .to_lowercase()
                .contains(&text.to_lowercase()),
            Clause::CategoryEquals(category) => &product.category == category,
            Clause::PriceBetween { min, max } => *min <= product.price && product.price <= *max,
            Clause::RatingAtLeast(min) => product.rating >= *min,
        }
    }
}

/// Conjunction of zero or more clauses. The empty predicate matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    /// Predicate without clauses
    pub fn all() -> Self {
        Self::default()
    }

    pub fn and(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.clauses.iter().all(|clause| clause.matches(product))
    }
}

/// Sort keys understood by the storefront search page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, ToSchema)]
#[strum(serialize_all = "lowercase")]
pub enum SortKey {
    Featured,
    Lowest,
    Highest,
    TopRated,
    Newest,
    #[default]
    Default,
}

impl SortKey {
    /// Unknown or empty keys fall back to [`SortKey::Default`].
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        raw.and_then(|value| value.parse().ok()).unwrap_or_default()
    }

    pub fn order(self) -> SortOrder {
        match self {
            SortKey::Featured => SortOrder::descending(SortField::Featured),
            SortKey::Lowest => SortOrder::ascending(SortField::Price),
            SortKey::Highest => SortOrder::descending(SortField::Price),
            SortKey::TopRated => SortOrder::descending(SortField::Rating),
            SortKey::Newest => SortOrder::descending(SortField::CreatedAt),
            SortKey::Default => SortOrder::descending(SortField::Id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Featured,
    Price,
    Rating,
    CreatedAt,
    /// The UUIDv7 identifier, monotonically increasing with creation
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Primary sort field and direction.
///
/// Ties on the primary field are always broken by identifier, newest first,
/// so two runs over the same data return the same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn ascending(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
        }
    }

    /// Total order over products consistent with the store's sort document.
    pub fn compare(&self, a: &Product, b: &Product) -> Ordering {
        let primary = match self.field {
            SortField::Featured => a.featured.cmp(&b.featured),
            SortField::Price => a.price.total_cmp(&b.price),
            SortField::Rating => a.rating.total_cmp(&b.rating),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Id => a.id.cmp(&b.id),
        };
        let primary = match self.direction {
            SortDirection::Ascending => primary,
            SortDirection::Descending => primary.reverse(),
        };
        primary.then_with(|| b.id.cmp(&a.id))
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortKey::Default.order()
    }
}

/// Output of [`QueryBuilder::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    pub predicate: Predicate,
    pub order: SortOrder,
    pub page: u64,
    pub offset: u64,
    pub limit: u64,
}

impl ResolvedQuery {
    /// Number of pages needed to show `total` matching products.
    pub fn pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

/// Tunables for query resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    pub default_page_size: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder {
    config: QueryConfig,
}

impl QueryBuilder {
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    pub fn resolve(&self, criteria: &SearchCriteria) -> Result<ResolvedQuery, ValidationError> {
        let mut predicate = Predicate::all();

        if let Some(text) = filter_value(criteria.query.as_deref()) {
            predicate = predicate.and(Clause::NameContains(text.to_string()));
        }
        if let Some(category) = filter_value(criteria.category.as_deref()) {
            predicate = predicate.and(Clause::CategoryEquals(category.to_string()));
        }
        if let Some(token) = filter_value(criteria.price.as_deref()) {
            let (min, max) = parse_price_range(token)?;
            predicate = predicate.and(Clause::PriceBetween { min, max });
        }
        if let Some(token) = filter_value(criteria.rating.as_deref()) {
            predicate = predicate.and(Clause::RatingAtLeast(parse_min_rating(token)?));
        }

        let order = SortKey::parse_or_default(criteria.order.as_deref()).order();

        let page = parse_positive("page", criteria.page.as_deref(), 1)?;
        let limit = parse_positive(
            "pageSize",
            criteria.page_size.as_deref(),
            self.config.default_page_size,
        )?;
        let offset = limit
            .checked_mul(page - 1)
            .ok_or_else(|| ValidationError::new("page", "is out of range"))?;

        Ok(ResolvedQuery {
            predicate,
            order,
            page,
            offset,
            limit,
        })
    }
}

/// Resolves criteria with the default configuration.
pub fn resolve(criteria: &SearchCriteria) -> Result<ResolvedQuery, ValidationError> {
    QueryBuilder::default().resolve(criteria)
}

fn filter_value(raw: Option<&str>) -> Option<&str> {
    raw.filter(|value| !value.is_empty() && *value != MATCH_ALL)
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, ValidationError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ValidationError::new(field, format!("'{}' is not a number", raw)))
}

fn parse_price_range(token: &str) -> Result<(f64, f64), ValidationError> {
    let (low, high) = token
        .split_once('-')
        .ok_or_else(|| ValidationError::new("price", format!("'{}' is not a low-high range", token)))?;
    let min = parse_number("price", low)?;
    let max = parse_number("price", high)?;
    if min > max {
        return Err(ValidationError::new(
            "price",
            format!("lower bound {} exceeds upper bound {}", min, max),
        ));
    }
    Ok((min, max))
}

fn parse_min_rating(token: &str) -> Result<f64, ValidationError> {
    parse_number("rating", token)
}

fn parse_positive(field: &'static str, raw: Option<&str>, default: u64) -> Result<u64, ValidationError> {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ValidationError::new(field, format!("'{}' is not a positive integer", raw)))?;
    if value < 1 {
        return Err(ValidationError::new(field, "must be at least 1"));
    }
    Ok(value)
}
