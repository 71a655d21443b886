//! Catalog Service - Business logic layer

use database::common::{RetryConfig, retry_when};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    CreateProduct, Product, ReviewInput, ReviewReceipt, Reviewer, SearchPage, UpdateProduct,
    sample_name, slugify,
};
use crate::query::{
    PageParams, Predicate, QueryBuilder, QueryConfig, SearchCriteria, SortOrder, ValidationError,
};
use crate::repository::ProductRepository;
use crate::reviews::{self, NewReview};

const REVIEW_CREATED: &str = "Review Created";

/// Tunables for [`CatalogService`]
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub query: QueryConfig,
    /// Backoff for review submissions that lose a version race
    pub review_retry: RetryConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            query: QueryConfig::default(),
            review_retry: RetryConfig::new()
                .with_max_retries(5)
                .with_initial_delay(10)
                .with_max_delay(500),
        }
    }
}

/// Catalog service: search, product maintenance and review submission
///
/// Search goes through the [`QueryBuilder`] so the page and its total are
/// computed from the same predicate. Review submission is a
/// load / aggregate / compare-and-swap cycle retried on version conflicts.
pub struct CatalogService<R: ProductRepository> {
    repository: Arc<R>,
    queries: QueryBuilder,
    review_retry: RetryConfig,
}

impl<R: ProductRepository> CatalogService<R> {
    /// Create a new CatalogService with the default configuration
    pub fn new(repository: R) -> Self {
        Self::with_config(repository, CatalogConfig::default())
    }

    pub fn with_config(repository: R, config: CatalogConfig) -> Self {
        Self {
            repository: Arc::new(repository),
            queries: QueryBuilder::new(config.query),
            review_retry: config.review_retry,
        }
    }

    /// Filtered, sorted, paged product search
    #[instrument(skip(self))]
    pub async fn search(&self, criteria: &SearchCriteria) -> CatalogResult<SearchPage> {
        let resolved = self.queries.resolve(criteria)?;

        let (products, count_products) = tokio::try_join!(
            self.repository.find(
                &resolved.predicate,
                resolved.order,
                resolved.offset,
                Some(resolved.limit),
            ),
            self.repository.count_matching(&resolved.predicate),
        )?;

        Ok(SearchPage {
            products,
            count_products,
            page: resolved.page,
            pages: resolved.pages(count_products),
        })
    }

    /// Unfiltered listing in default order, paged like search
    #[instrument(skip(self))]
    pub async fn admin_list(&self, params: PageParams) -> CatalogResult<SearchPage> {
        self.search(&SearchCriteria::from(params)).await
    }

    /// Every product, newest first
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> CatalogResult<Vec<Product>> {
        self.repository
            .find(&Predicate::all(), SortOrder::default(), 0, None)
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> CatalogResult<Product> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(CatalogError::NotFound(id))
    }

    #[instrument(skip(self))]
    pub async fn get_by_slug(&self, slug: &str) -> CatalogResult<Product> {
        self.repository
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| CatalogError::SlugNotFound(slug.to_string()))
    }

    /// Distinct category names, sorted
    #[instrument(skip(self))]
    pub async fn categories(&self) -> CatalogResult<Vec<String>> {
        self.repository.categories().await
    }

    /// Create a new product
    #[instrument(skip(self, input), fields(product_name = ?input.name))]
    pub async fn create_product(&self, mut input: CreateProduct) -> CatalogResult<Product> {
        input.validate()?;

        let name = input.name.get_or_insert_with(sample_name);
        let slug = input.slug.take().unwrap_or_else(|| slugify(name));
        if slug.is_empty() {
            return Err(ValidationError::new("slug", "must contain a letter or digit").into());
        }
        if self.repository.exists_by_slug(&slug).await? {
            return Err(CatalogError::DuplicateSlug(slug));
        }
        input.slug = Some(slug);

        let product = self.repository.insert(Product::new(input)).await?;
        info!(product_id = %product.id, slug = %product.slug, "Product created");
        Ok(product)
    }

    /// Update an existing product. A concurrent change surfaces as `Conflict`.
    #[instrument(skip(self, input))]
    pub async fn update_product(&self, id: Uuid, input: UpdateProduct) -> CatalogResult<Product> {
        input.validate()?;

        let mut existing = self.get_product(id).await?;

        if let Some(ref new_slug) = input.slug {
            if new_slug != &existing.slug && self.repository.exists_by_slug(new_slug).await? {
                return Err(CatalogError::DuplicateSlug(new_slug.clone()));
            }
        }

        existing.apply_update(input);
        self.repository.save(existing).await
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> CatalogResult<()> {
        if !self.repository.delete(id).await? {
            return Err(CatalogError::NotFound(id));
        }
        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Add a review from `reviewer` and recompute the product rating.
    ///
    /// Retries the whole read-aggregate-save cycle while the save loses a
    /// version race. A conflict that outlasts the retries becomes
    /// `ConcurrentUpdate`. A second review from the same reviewer is rejected
    /// whichever attempt observes the first one.
    #[instrument(skip(self, input), fields(reviewer = %reviewer.0))]
    pub async fn submit_review(
        &self,
        id: Uuid,
        reviewer: &Reviewer,
        input: ReviewInput,
    ) -> CatalogResult<ReviewReceipt> {
        input.validate()?;

        let candidate = NewReview {
            reviewer_identity: reviewer.0.clone(),
            rating: input.rating,
            comment: input.comment,
        };

        let result = retry_when(
            || self.try_submit_review(id, candidate.clone()),
            self.review_retry.clone(),
            |e| matches!(e, CatalogError::Conflict { .. }),
        )
        .await;

        match result {
            Err(CatalogError::Conflict { .. }) => {
                warn!(product_id = %id, "Review submission kept conflicting, giving up");
                Err(CatalogError::ConcurrentUpdate(id))
            }
            other => other,
        }
    }

    async fn try_submit_review(
        &self,
        id: Uuid,
        candidate: NewReview,
    ) -> CatalogResult<ReviewReceipt> {
        let mut product = self.get_product(id).await?;

        let submission = reviews::submit(&product.reviews, candidate)
            .map_err(|e| CatalogError::from_review(id, e))?;
        product.record_reviews(&submission);

        let saved = self.repository.save(product).await?;
        info!(
            product_id = %id,
            num_reviews = saved.num_reviews,
            rating = saved.rating,
            "Review recorded"
        );

        Ok(ReviewReceipt {
            message: REVIEW_CREATED.to_string(),
            review: submission.inserted,
            num_reviews: saved.num_reviews,
            rating: saved.rating,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Clause, SortField};
    use crate::repository::MockProductRepository;
    use mockall::predicate::eq;

    fn product(name: &str) -> Product {
        Product::new(CreateProduct {
            name: Some(name.to_string()),
            ..Default::default()
        })
    }

    fn fast_retry(max_retries: u32) -> CatalogConfig {
        CatalogConfig {
            query: QueryConfig::default(),
            review_retry: RetryConfig::new()
                .with_max_retries(max_retries)
                .with_initial_delay(1)
                .without_jitter(),
        }
    }

    fn bumped(mut product: Product) -> Product {
        product.version += 1;
        product
    }

    #[tokio::test]
    async fn test_search_pages_with_same_predicate() {
        let mut mock = MockProductRepository::new();
        mock.expect_find()
            .withf(|predicate, order, offset, limit| {
                predicate.clauses() == [Clause::RatingAtLeast(3.0)]
                    && *order == SortOrder::descending(SortField::Price)
                    && *offset == 3
                    && *limit == Some(3)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(vec![product("a"), product("b")]));
        mock.expect_count_matching()
            .withf(|predicate| predicate.clauses() == [Clause::RatingAtLeast(3.0)])
            .times(1)
            .returning(|_| Ok(7));

        let service = CatalogService::new(mock);
        let page = service
            .search(&SearchCriteria {
                rating: Some("3".to_string()),
                order: Some("highest".to_string()),
                page: Some("2".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.products.len(), 2);
        assert_eq!(page.count_products, 7);
        assert_eq!(page.page, 2);
        assert_eq!(page.pages, 3);
    }

    #[tokio::test]
    async fn test_search_rejects_bad_price_without_querying() {
        let service = CatalogService::new(MockProductRepository::new());
        let result = service
            .search(&SearchCriteria {
                price: Some("abc".to_string()),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(CatalogError::Validation(e)) if e.field == "price"));
    }

    #[tokio::test]
    async fn test_admin_list_uses_configured_page_size() {
        let mut mock = MockProductRepository::new();
        mock.expect_find()
            .withf(|predicate, order, offset, limit| {
                predicate.is_empty()
                    && *order == SortOrder::default()
                    && *offset == 0
                    && *limit == Some(10)
            })
            .returning(|_, _, _, _| Ok(vec![]));
        mock.expect_count_matching().returning(|_| Ok(0));

        let config = CatalogConfig {
            query: QueryConfig {
                default_page_size: 10,
            },
            ..CatalogConfig::default()
        };
        let service = CatalogService::with_config(mock, config);
        let page = service.admin_list(PageParams::default()).await.unwrap();

        assert_eq!(page.page, 1);
        assert_eq!(page.pages, 0);
    }

    #[tokio::test]
    async fn test_create_product_rejects_duplicate_slug() {
        let mut mock = MockProductRepository::new();
        mock.expect_exists_by_slug()
            .withf(|slug| slug == "nike-slim-shirt")
            .times(1)
            .returning(|_| Ok(true));
        mock.expect_insert().never();

        let service = CatalogService::new(mock);
        let result = service
            .create_product(CreateProduct {
                name: Some("Nike Slim Shirt".to_string()),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(CatalogError::DuplicateSlug(slug)) if slug == "nike-slim-shirt"));
    }

    #[tokio::test]
    async fn test_create_product_requires_sluggable_name() {
        let service = CatalogService::new(MockProductRepository::new());
        let result = service
            .create_product(CreateProduct {
                name: Some("!!!".to_string()),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(CatalogError::Validation(e)) if e.field == "slug"));
    }

    #[tokio::test]
    async fn test_create_product_inserts_with_defaults() {
        let mut mock = MockProductRepository::new();
        mock.expect_exists_by_slug().returning(|_| Ok(false));
        mock.expect_insert().times(1).returning(Ok);

        let service = CatalogService::new(mock);
        let created = service
            .create_product(CreateProduct {
                name: Some("Sample Name".to_string()),
                price: Some(9.99),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(created.slug, "sample-name");
        assert_eq!(created.price, 9.99);
        assert_eq!(created.category, "sample category");
    }

    #[tokio::test]
    async fn test_update_product_not_found() {
        let mut mock = MockProductRepository::new();
        mock.expect_get_by_id().returning(|_| Ok(None));

        let service = CatalogService::new(mock);
        let id = Uuid::now_v7();
        let result = service.update_product(id, UpdateProduct::default()).await;

        assert!(matches!(result, Err(CatalogError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_update_product_surfaces_conflict() {
        let existing = product("Shirt");
        let id = existing.id;
        let mut mock = MockProductRepository::new();
        mock.expect_get_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        mock.expect_save()
            .times(1)
            .returning(|p| Err(CatalogError::Conflict { id: p.id, expected: p.version }));

        let service = CatalogService::new(mock);
        let result = service
            .update_product(
                id,
                UpdateProduct {
                    price: Some(5.0),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(CatalogError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_delete_missing_product() {
        let mut mock = MockProductRepository::new();
        mock.expect_delete().returning(|_| Ok(false));

        let service = CatalogService::new(mock);
        let result = service.delete_product(Uuid::now_v7()).await;
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_submit_review_updates_aggregate() {
        let existing = product("Shirt");
        let id = existing.id;
        let mut mock = MockProductRepository::new();
        mock.expect_get_by_id()
            .with(eq(id))
            .returning(move |_| Ok(Some(existing.clone())));
        mock.expect_save().times(1).returning(|p| Ok(bumped(p)));

        let service = CatalogService::new(mock);
        let receipt = service
            .submit_review(
                id,
                &Reviewer("u1".to_string()),
                ReviewInput {
                    rating: 4,
                    comment: "Nice".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(receipt.message, "Review Created");
        assert_eq!(receipt.num_reviews, 1);
        assert_eq!(receipt.rating, 4.0);
        assert_eq!(receipt.review.reviewer_identity, "u1");
    }

    #[tokio::test]
    async fn test_submit_review_retries_after_conflict() {
        let existing = product("Shirt");
        let id = existing.id;
        let mut mock = MockProductRepository::new();
        mock.expect_get_by_id()
            .times(2)
            .returning(move |_| Ok(Some(existing.clone())));
        let mut calls = 0;
        mock.expect_save().times(2).returning(move |p| {
            calls += 1;
            if calls == 1 {
                Err(CatalogError::Conflict { id: p.id, expected: p.version })
            } else {
                Ok(bumped(p))
            }
        });

        let service = CatalogService::with_config(mock, fast_retry(3));
        let receipt = service
            .submit_review(
                id,
                &Reviewer("u1".to_string()),
                ReviewInput {
                    rating: 5,
                    comment: String::new(),
                },
            )
            .await
            .unwrap();

        assert_eq!(receipt.num_reviews, 1);
    }

    #[tokio::test]
    async fn test_submit_review_gives_up_after_bounded_retries() {
        let existing = product("Shirt");
        let id = existing.id;
        let mut mock = MockProductRepository::new();
        mock.expect_get_by_id()
            .times(3)
            .returning(move |_| Ok(Some(existing.clone())));
        mock.expect_save()
            .times(3)
            .returning(|p| Err(CatalogError::Conflict { id: p.id, expected: p.version }));

        let service = CatalogService::with_config(mock, fast_retry(2));
        let result = service
            .submit_review(
                id,
                &Reviewer("u1".to_string()),
                ReviewInput {
                    rating: 3,
                    comment: String::new(),
                },
            )
            .await;

        assert!(matches!(result, Err(CatalogError::ConcurrentUpdate(failed)) if failed == id));
    }

    #[tokio::test]
    async fn test_submit_review_duplicate_does_not_save() {
        let mut existing = product("Shirt");
        let first = reviews::submit(
            &existing.reviews,
            NewReview {
                reviewer_identity: "u1".to_string(),
                rating: 5,
                comment: String::new(),
            },
        )
        .unwrap();
        existing.record_reviews(&first);
        let id = existing.id;

        let mut mock = MockProductRepository::new();
        mock.expect_get_by_id()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        mock.expect_save().never();

        let service = CatalogService::new(mock);
        let result = service
            .submit_review(
                id,
                &Reviewer("u1".to_string()),
                ReviewInput {
                    rating: 1,
                    comment: String::new(),
                },
            )
            .await;

        match result {
            Err(err @ CatalogError::DuplicateReview { .. }) => {
                assert_eq!(err.to_string(), "You already submitted a review");
            }
            other => panic!("expected duplicate review, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_review_rejects_out_of_range_rating() {
        let service = CatalogService::new(MockProductRepository::new());
        let result = service
            .submit_review(
                Uuid::now_v7(),
                &Reviewer("u1".to_string()),
                ReviewInput {
                    rating: 6,
                    comment: String::new(),
                },
            )
            .await;

        assert!(matches!(result, Err(CatalogError::InvalidInput(_))));
    }
}
