use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CatalogResult;
use crate::models::Product;
use crate::query::{Predicate, SortOrder};

/// Repository trait for Product persistence
///
/// The same [`Predicate`] is accepted by [`find`](Self::find) and
/// [`count_matching`](Self::count_matching) so a page and its total always
/// describe the same population.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Insert a new product. Fails with `DuplicateSlug` if the slug is taken.
    async fn insert(&self, product: Product) -> CatalogResult<Product>;

    /// Get a product by ID
    async fn get_by_id(&self, id: Uuid) -> CatalogResult<Option<Product>>;

    /// Get a product by slug
    async fn get_by_slug(&self, slug: &str) -> CatalogResult<Option<Product>>;

    /// Check if a slug is already used by another product
    async fn exists_by_slug(&self, slug: &str) -> CatalogResult<bool>;

    /// Products matching `predicate` in `order`, skipping `offset`, at most `limit`
    async fn find(
        &self,
        predicate: &Predicate,
        order: SortOrder,
        offset: u64,
        limit: Option<u64>,
    ) -> CatalogResult<Vec<Product>>;

    /// Number of products matching `predicate`
    async fn count_matching(&self, predicate: &Predicate) -> CatalogResult<u64>;

    /// Distinct category names, sorted
    async fn categories(&self) -> CatalogResult<Vec<String>>;

    /// Compare-and-swap save.
    ///
    /// Succeeds only if the stored document still carries `product.version`;
    /// the stored copy gets `version + 1` and is returned. A mismatch yields
    /// `Conflict`, a missing document `NotFound`.
    async fn save(&self, product: Product) -> CatalogResult<Product>;

    /// Delete a product by ID, returning whether it existed
    async fn delete(&self, id: Uuid) -> CatalogResult<bool>;
}
