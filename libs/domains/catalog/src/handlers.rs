//! HTTP handlers for the Catalog API

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_helpers::{
    AUTHENTICATED_USER_HEADER, AppError, UuidPath, ValidatedJson,
    errors::responses::{
        BadRequestParameterResponse, BadRequestUuidResponse, BadRequestValidationResponse,
        ConflictResponse, InternalServerErrorResponse, NotFoundResponse,
        ServiceUnavailableResponse, UnauthorizedResponse,
    },
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::CatalogResult;
use crate::models::{
    CreateProduct, Product, ReviewInput, ReviewReceipt, Reviewer, SearchPage, UpdateProduct,
};
use crate::query::{PageParams, SearchCriteria, SortKey};
use crate::repository::ProductRepository;
use crate::reviews::Review;
use crate::service::CatalogService;

/// OpenAPI documentation for the Catalog API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_products,
        create_product,
        search_products,
        admin_list,
        list_categories,
        get_by_slug,
        get_product,
        update_product,
        delete_product,
        submit_review,
    ),
    components(
        schemas(
            Product, CreateProduct, UpdateProduct, Review, ReviewInput,
            ReviewReceipt, SearchPage, SortKey
        ),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            BadRequestParameterResponse,
            BadRequestUuidResponse,
            UnauthorizedResponse,
            ConflictResponse,
            ServiceUnavailableResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Catalog", description = "Product search, maintenance and reviews")
    )
)]
pub struct ApiDoc;

/// Create the catalog router with all HTTP endpoints
///
/// Review submission needs a [`Reviewer`] request extension; layer
/// [`gateway_identity`] in front of this router to populate it.
pub fn router<R: ProductRepository + 'static>(service: CatalogService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/search", get(search_products))
        .route("/admin", get(admin_list))
        .route("/categories", get(list_categories))
        .route("/slug/{slug}", get(get_by_slug))
        .route(
            "/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/{id}/reviews", post(submit_review))
        .with_state(shared_service)
}

/// Middleware copying the gateway's authenticated user header into a
/// [`Reviewer`] extension. Blank values are ignored.
pub async fn gateway_identity(mut request: Request, next: Next) -> Response {
    let reviewer = request
        .headers()
        .get(AUTHENTICATED_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| Reviewer(value.to_string()));

    if let Some(reviewer) = reviewer {
        request.extensions_mut().insert(reviewer);
    }

    next.run(request).await
}

impl<S> FromRequestParts<S> for Reviewer
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Reviewer>().cloned().ok_or_else(|| {
            AppError::Unauthorized("Not authorized, no reviewer identity".to_string())
                .into_response()
        })
    }
}

/// List every product, newest first
#[utoipa::path(
    get,
    path = "",
    tag = "Catalog",
    responses(
        (status = 200, description = "All products", body = Vec<Product>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_products<R: ProductRepository>(
    State(service): State<Arc<CatalogService<R>>>,
) -> CatalogResult<Json<Vec<Product>>> {
    let products = service.list_products().await?;
    Ok(Json(products))
}

/// Create a new product
#[utoipa::path(
    post,
    path = "",
    tag = "Catalog",
    request_body = CreateProduct,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_product<R: ProductRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    ValidatedJson(input): ValidatedJson<CreateProduct>,
) -> CatalogResult<impl IntoResponse> {
    let product = service.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Search products with filters, sorting and paging
///
/// `category`, `price` and `rating` accept `all` to disable the filter.
/// `price` is a `low-high` range. Unknown `order` values fall back to newest first.
#[utoipa::path(
    get,
    path = "/search",
    tag = "Catalog",
    params(SearchCriteria),
    responses(
        (status = 200, description = "One page of matching products", body = SearchPage),
        (status = 400, response = BadRequestParameterResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn search_products<R: ProductRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    Query(criteria): Query<SearchCriteria>,
) -> CatalogResult<Json<SearchPage>> {
    let page = service.search(&criteria).await?;
    Ok(Json(page))
}

/// Paged listing of all products for back-office screens
#[utoipa::path(
    get,
    path = "/admin",
    tag = "Catalog",
    params(PageParams),
    responses(
        (status = 200, description = "One page of products", body = SearchPage),
        (status = 400, response = BadRequestParameterResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn admin_list<R: ProductRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    Query(params): Query<PageParams>,
) -> CatalogResult<Json<SearchPage>> {
    let page = service.admin_list(params).await?;
    Ok(Json(page))
}

/// Distinct product categories
#[utoipa::path(
    get,
    path = "/categories",
    tag = "Catalog",
    responses(
        (status = 200, description = "Sorted category names", body = Vec<String>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_categories<R: ProductRepository>(
    State(service): State<Arc<CatalogService<R>>>,
) -> CatalogResult<Json<Vec<String>>> {
    let categories = service.categories().await?;
    Ok(Json(categories))
}

/// Get a product by slug
#[utoipa::path(
    get,
    path = "/slug/{slug}",
    tag = "Catalog",
    params(
        ("slug" = String, Path, description = "Product slug")
    ),
    responses(
        (status = 200, description = "Product found", body = Product),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_by_slug<R: ProductRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    Path(slug): Path<String>,
) -> CatalogResult<Json<Product>> {
    let product = service.get_by_slug(&slug).await?;
    Ok(Json(product))
}

/// Get a product by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Catalog",
    params(
        ("id" = String, Path, description = "Product ID (UUID)")
    ),
    responses(
        (status = 200, description = "Product found", body = Product),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_product<R: ProductRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
) -> CatalogResult<Json<Product>> {
    let product = service.get_product(id).await?;
    Ok(Json(product))
}

/// Update a product
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Catalog",
    params(
        ("id" = String, Path, description = "Product ID (UUID)")
    ),
    request_body = UpdateProduct,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_product<R: ProductRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateProduct>,
) -> CatalogResult<Json<Product>> {
    let product = service.update_product(id, input).await?;
    Ok(Json(product))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Catalog",
    params(
        ("id" = String, Path, description = "Product ID (UUID)")
    ),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_product<R: ProductRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
) -> CatalogResult<StatusCode> {
    service.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Review a product as the authenticated reviewer
#[utoipa::path(
    post,
    path = "/{id}/reviews",
    tag = "Catalog",
    params(
        ("id" = String, Path, description = "Product ID (UUID)")
    ),
    request_body = ReviewInput,
    responses(
        (status = 201, description = "Review recorded", body = ReviewReceipt),
        (status = 400, description = "Invalid review or already reviewed by this reviewer"),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 503, response = ServiceUnavailableResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn submit_review<R: ProductRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
    reviewer: Reviewer,
    ValidatedJson(input): ValidatedJson<ReviewInput>,
) -> CatalogResult<impl IntoResponse> {
    let receipt = service.submit_review(id, &reviewer, input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
