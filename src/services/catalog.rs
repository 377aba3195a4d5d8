use crate::{
    entities::{
        category, product, product_image, Category, CategoryModel, CategorySection, Product,
        ProductImage, ProductModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Catalog service: products, categories and images.
///
/// Stock is owned by this store but mutated exclusively through the order
/// service's conditional updates; the catalog only sets initial quantities.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Lists products with optional filters, newest first.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let mut query = Product::find();

        if let Some(category_id) = filter.category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }
        if let Some(section) = filter.section {
            query = query
                .inner_join(Category)
                .filter(category::Column::Section.eq(section));
        }
        if let Some(search) = filter.search.filter(|s| !s.trim().is_empty()) {
            query = query.filter(product::Column::Name.contains(search.trim()));
        }

        let paginator = query
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((products, total))
    }

    /// Fetches a product together with its images.
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductWithImages, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let images = ProductImage::find()
            .filter(product_image::Column::ProductId.eq(product_id))
            .order_by_asc(product_image::Column::SortOrder)
            .all(&*self.db)
            .await?;

        Ok(ProductWithImages { product, images })
    }

    /// Creates a product under an existing category.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        input.validate()?;
        validate_pricing(input.price, input.discount_price)?;

        Category::find_by_id(input.category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Category {} not found", input.category_id))
            })?;

        let product_id = Uuid::new_v4();
        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(product_id),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            discount_price: Set(input.discount_price),
            stock_quantity: Set(input.stock_quantity),
            category_id: Set(input.category_id),
            average_rating: Set(0.0),
            sizes: Set(input.sizes),
            colors: Set(input.colors),
            material: Set(input.material),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let product = product.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;

        info!("Created product: {}", product_id);
        Ok(product)
    }

    /// Applies a partial update to a product.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let price = input.price.unwrap_or(product.price);
        let discount_price = match input.discount_price {
            Some(value) => value,
            None => product.discount_price,
        };
        validate_pricing(price, discount_price)?;

        if let Some(stock) = input.stock_quantity {
            if stock < 0 {
                return Err(ServiceError::ValidationError(
                    "Stock quantity cannot be negative".to_string(),
                ));
            }
        }

        let mut active: product::ActiveModel = product.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if input.price.is_some() {
            active.price = Set(price);
        }
        if input.discount_price.is_some() {
            active.discount_price = Set(discount_price);
        }
        if let Some(stock) = input.stock_quantity {
            active.stock_quantity = Set(stock);
        }
        if let Some(sizes) = input.sizes {
            active.sizes = Set(Some(sizes));
        }
        if let Some(colors) = input.colors {
            active.colors = Set(Some(colors));
        }
        if let Some(material) = input.material {
            active.material = Set(Some(material));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;

        Ok(updated)
    }

    /// Deletes a product and its images.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        ProductImage::delete_many()
            .filter(product_image::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;
        product::Entity::delete_by_id(product.id)
            .exec(&*self.db)
            .await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;

        info!("Deleted product: {}", product_id);
        Ok(())
    }

    /// Attaches an image to a product.
    pub async fn add_product_image(
        &self,
        product_id: Uuid,
        input: AddImageInput,
    ) -> Result<product_image::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let image = product_image::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            url: Set(input.url),
            alt_text: Set(input.alt_text),
            sort_order: Set(input.sort_order.unwrap_or(0)),
            is_primary: Set(input.is_primary.unwrap_or(false)),
        };

        Ok(image.insert(&*self.db).await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        Ok(Category::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// Creates a category; (name, section) pairs are unique.
    #[instrument(skip(self))]
    pub async fn create_category(
        &self,
        input: CreateCategoryInput,
    ) -> Result<CategoryModel, ServiceError> {
        input.validate()?;

        let existing = Category::find()
            .filter(category::Column::Name.eq(&input.name))
            .filter(category::Column::Section.eq(input.section))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "Category '{}' already exists in that section",
                input.name
            )));
        }

        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            section: Set(input.section),
        };

        Ok(model.insert(&*self.db).await?)
    }
}

/// Rejects negative prices and discount prices above the list price.
fn validate_pricing(
    price: Decimal,
    discount_price: Option<Decimal>,
) -> Result<(), ServiceError> {
    if price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Price cannot be negative".to_string(),
        ));
    }
    if let Some(discount) = discount_price {
        if discount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Discount price cannot be negative".to_string(),
            ));
        }
        if discount > price {
            return Err(ServiceError::ValidationError(
                "Discount price cannot exceed the list price".to_string(),
            ));
        }
    }
    Ok(())
}

/// Filters accepted by `list_products`
#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub section: Option<CategorySection>,
    pub search: Option<String>,
}

/// Input for creating a product
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    #[validate(range(min = 0, message = "Stock quantity cannot be negative"))]
    pub stock_quantity: i32,
    pub category_id: Uuid,
    pub sizes: Option<String>,
    pub colors: Option<String>,
    pub material: Option<String>,
}

/// Input for updating a product; `discount_price` uses a double Option so a
/// request can clear the discount explicitly.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[serde(default, with = "double_option")]
    pub discount_price: Option<Option<Decimal>>,
    pub stock_quantity: Option<i32>,
    pub sizes: Option<String>,
    pub colors: Option<String>,
    pub material: Option<String>,
}

mod double_option {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(de: D) -> Result<Option<Option<Decimal>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Decimal>::deserialize(de).map(Some)
    }
}

/// Input for attaching an image
#[derive(Debug, Deserialize)]
pub struct AddImageInput {
    pub url: String,
    pub alt_text: Option<String>,
    pub sort_order: Option<i32>,
    pub is_primary: Option<bool>,
}

/// Input for creating a category
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 255, message = "Category name is required"))]
    pub name: String,
    pub section: CategorySection,
}

/// Product with its images
#[derive(Debug, Serialize)]
pub struct ProductWithImages {
    #[serde(flatten)]
    pub product: ProductModel,
    pub images: Vec<product_image::Model>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn negative_price_is_rejected() {
        assert!(validate_pricing(dec!(-1.00), None).is_err());
    }

    #[test]
    fn discount_above_list_price_is_rejected() {
        assert!(validate_pricing(dec!(10.00), Some(dec!(12.00))).is_err());
    }

    #[test]
    fn sensible_pricing_passes() {
        assert!(validate_pricing(dec!(10.00), Some(dec!(8.00))).is_ok());
        assert!(validate_pricing(dec!(10.00), None).is_ok());
        assert!(validate_pricing(Decimal::ZERO, None).is_ok());
    }

    #[test]
    fn update_input_distinguishes_absent_from_null_discount() {
        let absent: UpdateProductInput = serde_json::from_str(r#"{"price": "12.00"}"#).unwrap();
        assert!(absent.discount_price.is_none());

        let cleared: UpdateProductInput =
            serde_json::from_str(r#"{"discount_price": null}"#).unwrap();
        assert_eq!(cleared.discount_price, Some(None));

        let set: UpdateProductInput =
            serde_json::from_str(r#"{"discount_price": "9.99"}"#).unwrap();
        assert_eq!(set.discount_price, Some(Some(dec!(9.99))));
    }

    #[test]
    fn create_product_input_validates() {
        let input = CreateProductInput {
            name: String::new(),
            description: "desc".into(),
            price: dec!(10.00),
            discount_price: None,
            stock_quantity: 5,
            category_id: Uuid::new_v4(),
            sizes: None,
            colors: None,
            material: None,
        };
        assert!(input.validate().is_err());

        let input = CreateProductInput {
            name: "Leather Boot".into(),
            description: "desc".into(),
            price: dec!(10.00),
            discount_price: None,
            stock_quantity: -1,
            category_id: Uuid::new_v4(),
            sizes: None,
            colors: None,
            material: None,
        };
        assert!(input.validate().is_err());
    }
}
