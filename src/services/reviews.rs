use crate::{
    entities::{
        product, rating, report, review, review_reply, Product, Rating, Report, ReportModel,
        ReportTargetType, Review, ReviewModel, ReviewReply,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

const MIN_SCORE: i32 = 1;
const MAX_SCORE: i32 = 5;

/// Review and rating service.
///
/// Each (user, product) pair may hold at most one rating and one review.
/// Every write synchronously refreshes the product's average rating; there is
/// no background recomputation to drift out of date.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Records a standalone score for a product.
    #[instrument(skip(self))]
    pub async fn rate_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        score: i32,
    ) -> Result<rating::Model, ServiceError> {
        validate_score(score)?;

        let txn = self.db.begin().await?;

        Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = Rating::find()
            .filter(rating::Column::UserId.eq(user_id))
            .filter(rating::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::AlreadyReviewed(
                "You have already rated this product".to_string(),
            ));
        }

        let model = rating::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            score: Set(score),
        };
        let model = model.insert(&txn).await?;

        refresh_average_rating(&txn, product_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductRated { product_id, score })
            .await;

        Ok(model)
    }

    /// Creates a review; one per (user, product).
    #[instrument(skip(self, input), fields(product_id = %product_id))]
    pub async fn create_review(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        input: CreateReviewInput,
    ) -> Result<ReviewModel, ServiceError> {
        validate_score(input.rating)?;

        let txn = self.db.begin().await?;

        Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = Review::find()
            .filter(review::Column::UserId.eq(user_id))
            .filter(review::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::AlreadyReviewed(
                "You have already reviewed this product".to_string(),
            ));
        }

        let model = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            rating: Set(input.rating),
            comment: Set(input.comment),
            created_at: Set(Utc::now()),
        };
        let model = model.insert(&txn).await?;

        refresh_average_rating(&txn, product_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ReviewCreated {
                product_id,
                review_id: model.id,
            })
            .await;

        info!("Review {} created for product {}", model.id, product_id);
        Ok(model)
    }

    /// Lists a product's reviews, newest first.
    pub async fn list_reviews(&self, product_id: Uuid) -> Result<Vec<ReviewModel>, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        Ok(Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_desc(review::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Deletes a review. Allowed to the author or to staff.
    #[instrument(skip(self))]
    pub async fn delete_review(
        &self,
        user_id: Uuid,
        is_staff: bool,
        review_id: Uuid,
    ) -> Result<(), ServiceError> {
        let review_row = Review::find_by_id(review_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Review not found".to_string()))?;

        if review_row.user_id != user_id && !is_staff {
            return Err(ServiceError::Forbidden(
                "You do not have permission to delete this review".to_string(),
            ));
        }

        let product_id = review_row.product_id;

        let txn = self.db.begin().await?;
        ReviewReply::delete_many()
            .filter(review_reply::Column::ReviewId.eq(review_id))
            .exec(&txn)
            .await?;
        review::Entity::delete_by_id(review_id).exec(&txn).await?;
        refresh_average_rating(&txn, product_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ReviewDeleted {
                product_id,
                review_id,
            })
            .await;

        Ok(())
    }

    /// Attaches a reply to a review.
    #[instrument(skip(self, body))]
    pub async fn reply_to_review(
        &self,
        user_id: Uuid,
        review_id: Uuid,
        body: String,
    ) -> Result<review_reply::Model, ServiceError> {
        if body.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Reply text is required".to_string(),
            ));
        }

        Review::find_by_id(review_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Review not found".to_string()))?;

        let model = review_reply::ActiveModel {
            id: Set(Uuid::new_v4()),
            review_id: Set(review_id),
            user_id: Set(user_id),
            body: Set(body.trim().to_string()),
            created_at: Set(Utc::now()),
        };

        Ok(model.insert(&*self.db).await?)
    }

    /// Files a report against a product, review or reply.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn report(
        &self,
        user_id: Uuid,
        input: CreateReportInput,
    ) -> Result<ReportModel, ServiceError> {
        if input.reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "A reason is required".to_string(),
            ));
        }

        // The target must exist; which table to consult follows the variant.
        let (target_type, target_id) = match input.target {
            ReportTarget::Product(id) => {
                Product::find_by_id(id).one(&*self.db).await?.ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", id))
                })?;
                (ReportTargetType::Product, id)
            }
            ReportTarget::Review(id) => {
                Review::find_by_id(id).one(&*self.db).await?.ok_or_else(|| {
                    ServiceError::NotFound(format!("Review {} not found", id))
                })?;
                (ReportTargetType::Review, id)
            }
            ReportTarget::ReviewReply(id) => {
                ReviewReply::find_by_id(id)
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Review reply {} not found", id))
                    })?;
                (ReportTargetType::ReviewReply, id)
            }
        };

        let model = report::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            target_type: Set(target_type),
            target_id: Set(target_id),
            reason: Set(input.reason.trim().to_string()),
            created_at: Set(Utc::now()),
        };
        let model = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::TargetReported {
                report_id: model.id,
            })
            .await;

        Ok(model)
    }

    /// Lists all reports, newest first. The handler restricts this to staff.
    pub async fn list_reports(&self) -> Result<Vec<ReportModel>, ServiceError> {
        Ok(Report::find()
            .order_by_desc(report::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}

fn validate_score(score: i32) -> Result<(), ServiceError> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(ServiceError::ValidationError(format!(
            "Rating must be between {} and {}",
            MIN_SCORE, MAX_SCORE
        )));
    }
    Ok(())
}

/// Mean of the given review scores, zero scores excluded; 0.0 when empty.
fn average_rating(scores: &[i32]) -> f64 {
    let counted: Vec<i32> = scores.iter().copied().filter(|s| *s != 0).collect();
    if counted.is_empty() {
        return 0.0;
    }
    counted.iter().map(|s| *s as f64).sum::<f64>() / counted.len() as f64
}

/// Recomputes and stores a product's average rating from its reviews.
async fn refresh_average_rating(
    conn: &impl ConnectionTrait,
    product_id: Uuid,
) -> Result<(), ServiceError> {
    let scores: Vec<i32> = Review::find()
        .filter(review::Column::ProductId.eq(product_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|r| r.rating)
        .collect();

    let average = average_rating(&scores);

    let product_row = Product::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

    let mut active: product::ActiveModel = product_row.into();
    active.average_rating = Set(average);
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;

    Ok(())
}

/// What a report points at: exactly one of these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ReportTarget {
    Product(Uuid),
    Review(Uuid),
    ReviewReply(Uuid),
}

/// Input for creating a review
#[derive(Debug, Deserialize)]
pub struct CreateReviewInput {
    pub rating: i32,
    pub comment: Option<String>,
}

/// Input for filing a report
#[derive(Debug, Deserialize)]
pub struct CreateReportInput {
    #[serde(flatten)]
    pub target: ReportTarget,
    pub reason: String,
}
