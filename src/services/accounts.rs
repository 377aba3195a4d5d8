use crate::{
    auth::{
        hash_password, verify_password, AuthService, TokenPurpose, TokenSigner,
    },
    config::AppConfig,
    entities::{
        address, cart, cart_item, order, order_item, rating, report, review, review_reply, user,
        Address, AddressModel, Cart, CartItem, Order, OrderItem, Rating, Report, Review,
        ReviewReply, User, UserModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::Mailer,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Account lifecycle service: registration, activation, password reset,
/// profile, addresses and deletion.
///
/// Activation and reset links carry signed, time-boxed tokens bound to
/// mutable account state, so consuming a link invalidates it.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    mailer: Arc<dyn Mailer>,
    auth: Arc<AuthService>,
    signer: TokenSigner,
    config: Arc<AppConfig>,
}

impl AccountService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        mailer: Arc<dyn Mailer>,
        auth: Arc<AuthService>,
        config: Arc<AppConfig>,
    ) -> Self {
        let signer = TokenSigner::new(config.jwt_secret.as_bytes().to_vec());
        Self {
            db,
            event_sender,
            mailer,
            auth,
            signer,
            config,
        }
    }

    /// Registers a new, inactive account and emails the activation link.
    ///
    /// The account and token exist regardless of mail delivery: a failed
    /// send surfaces as `EmailDeliveryError` but nothing is rolled back.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<AccountProfile, ServiceError> {
        input.validate()?;

        let existing = User::find()
            .filter(user::Column::Email.eq(&input.email))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::ValidationError(
                "Email already registered".to_string(),
            ));
        }

        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(user_id),
            email: Set(input.email.clone()),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            password_hash: Set(hash_password(&input.password)
                .map_err(|e| ServiceError::InternalError(e.to_string()))?),
            is_active: Set(false),
            is_staff: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::AccountRegistered(user_id))
            .await;
        info!("Account {} registered (inactive)", user_id);

        let token = self.signer.issue(
            user_id,
            TokenPurpose::Activation,
            &created.is_active.to_string(),
        );
        let activation_url = format!(
            "{}/activate/{}/{}",
            self.config.frontend_base_url.trim_end_matches('/'),
            encode_uid(user_id),
            token
        );

        if let Err(e) = self
            .mailer
            .send_activation_email(&created.email, &activation_url)
            .await
        {
            warn!(error = %e, "Activation email delivery failed");
            return Err(ServiceError::EmailDeliveryError(
                "Failed to send email. Please check your email configuration.".to_string(),
            ));
        }

        Ok(created.into())
    }

    /// Activates an account from an emailed link.
    ///
    /// The token binds the account's active flag, so a second use after
    /// activation fails verification.
    #[instrument(skip(self, token))]
    pub async fn activate(&self, uid_b64: &str, token: &str) -> Result<AccountProfile, ServiceError> {
        let user_id = decode_uid(uid_b64)?;

        let account = User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::ValidationError("Invalid user or UID".to_string()))?;

        self.signer
            .verify(
                token,
                user_id,
                TokenPurpose::Activation,
                &account.is_active.to_string(),
                Duration::seconds(self.config.activation_token_ttl_secs),
            )
            .map_err(|_| ServiceError::ValidationError("Invalid or expired token".to_string()))?;

        let mut active: user::ActiveModel = account.into();
        active.is_active = Set(true);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::AccountActivated(user_id))
            .await;
        info!("Account {} activated", user_id);

        Ok(updated.into())
    }

    /// Authenticates a user and issues an access token.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: LoginInput) -> Result<LoginResponse, ServiceError> {
        let account = User::find()
            .filter(user::Column::Email.eq(&credentials.email))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid credentials".to_string()))?;

        if !account.is_active {
            return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
        }

        let valid = verify_password(&account.password_hash, &credentials.password)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        if !valid {
            return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
        }

        let token = self
            .auth
            .issue_token(&account)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        Ok(LoginResponse {
            access_token: token,
            user: account.into(),
        })
    }

    /// Requests a password reset.
    ///
    /// Answers with the same generic message whether or not the email is
    /// known, so accounts cannot be enumerated. Outside production the reset
    /// URL is included in the response for convenience.
    #[instrument(skip(self))]
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<ResetRequested, ServiceError> {
        let generic = ResetRequested {
            message: "Password reset email sent if the email exists.".to_string(),
            reset_url: None,
        };

        let account = match User::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?
        {
            Some(account) => account,
            None => return Ok(generic),
        };

        // Binding the current password hash makes the token single-use: the
        // reset itself changes the hash and invalidates the link.
        let token = self.signer.issue(
            account.id,
            TokenPurpose::PasswordReset,
            &account.password_hash,
        );
        let reset_url = format!(
            "{}/reset-password?uid={}&token={}",
            self.config.frontend_base_url.trim_end_matches('/'),
            encode_uid(account.id),
            token
        );

        if let Err(e) = self
            .mailer
            .send_password_reset_email(&account.email, &reset_url)
            .await
        {
            warn!(error = %e, "Password reset email delivery failed");
            return Err(ServiceError::EmailDeliveryError(
                "Failed to send email. Please check your email configuration.".to_string(),
            ));
        }

        self.event_sender
            .send_or_log(Event::PasswordResetRequested(account.id))
            .await;

        Ok(ResetRequested {
            message: "Password reset email sent successfully.".to_string(),
            reset_url: (!self.config.is_production()).then_some(reset_url),
        })
    }

    /// Completes a password reset from an emailed link.
    #[instrument(skip(self, token, new_password))]
    pub async fn confirm_password_reset(
        &self,
        uid_b64: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        if new_password.len() < 8 {
            return Err(ServiceError::ValidationError(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let user_id = decode_uid(uid_b64)?;
        let account = User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError("Invalid UID or user does not exist".to_string())
            })?;

        self.signer
            .verify(
                token,
                user_id,
                TokenPurpose::PasswordReset,
                &account.password_hash,
                Duration::seconds(self.config.reset_token_ttl_secs),
            )
            .map_err(|_| ServiceError::ValidationError("Invalid or expired token".to_string()))?;

        let mut active: user::ActiveModel = account.into();
        active.password_hash = Set(hash_password(new_password)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PasswordChanged(user_id))
            .await;
        info!("Password reset for account {}", user_id);

        Ok(())
    }

    /// Returns the caller's profile.
    pub async fn profile(&self, user_id: Uuid) -> Result<AccountProfile, ServiceError> {
        Ok(self.load_user(user_id).await?.into())
    }

    /// Updates the caller's name fields.
    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> Result<AccountProfile, ServiceError> {
        let account = self.load_user(user_id).await?;

        let mut active: user::ActiveModel = account.into();
        if let Some(first_name) = input.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = input.last_name {
            active.last_name = Set(last_name);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db).await?.into())
    }

    /// Deletes the caller's account after re-verifying the password.
    ///
    /// Everything hanging off the account is removed in one transaction.
    /// Order deletion here does not restore stock: the goods were sold, the
    /// customer is merely leaving.
    #[instrument(skip(self, password))]
    pub async fn delete_account(&self, user_id: Uuid, password: &str) -> Result<(), ServiceError> {
        let account = self.load_user(user_id).await?;

        let valid = verify_password(&account.password_hash, password)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;
        if !valid {
            return Err(ServiceError::ValidationError(
                "Incorrect password.".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        // Replies cascade from the user's reviews as well as from the user.
        let review_ids: Vec<Uuid> = Review::find()
            .filter(review::Column::UserId.eq(user_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        if !review_ids.is_empty() {
            ReviewReply::delete_many()
                .filter(review_reply::Column::ReviewId.is_in(review_ids))
                .exec(&txn)
                .await?;
        }
        ReviewReply::delete_many()
            .filter(review_reply::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        Review::delete_many()
            .filter(review::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        Rating::delete_many()
            .filter(rating::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        Report::delete_many()
            .filter(report::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        if let Some(cart_row) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
        {
            CartItem::delete_many()
                .filter(cart_item::Column::CartId.eq(cart_row.id))
                .exec(&txn)
                .await?;
            cart::Entity::delete_by_id(cart_row.id).exec(&txn).await?;
        }

        let order_ids: Vec<Uuid> = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|o| o.id)
            .collect();
        if !order_ids.is_empty() {
            OrderItem::delete_many()
                .filter(order_item::Column::OrderId.is_in(order_ids))
                .exec(&txn)
                .await?;
            Order::delete_many()
                .filter(order::Column::UserId.eq(user_id))
                .exec(&txn)
                .await?;
        }

        Address::delete_many()
            .filter(address::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        user::Entity::delete_by_id(user_id).exec(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::AccountDeleted(user_id))
            .await;
        info!("Account {} deleted", user_id);

        Ok(())
    }

    /// Returns the caller's address.
    pub async fn my_address(&self, user_id: Uuid) -> Result<AddressModel, ServiceError> {
        Address::find()
            .filter(address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No address found.".to_string()))
    }

    /// Creates or replaces the caller's address.
    #[instrument(skip(self, input))]
    pub async fn upsert_address(
        &self,
        user_id: Uuid,
        input: AddressInput,
    ) -> Result<AddressModel, ServiceError> {
        input.validate()?;

        let existing = Address::find()
            .filter(address::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;

        let now = Utc::now();
        let saved = match existing {
            Some(existing) => {
                let mut active: address::ActiveModel = existing.into();
                active.address_line_1 = Set(input.address_line_1);
                active.address_line_2 = Set(input.address_line_2);
                active.city = Set(input.city);
                active.province = Set(input.province);
                active.postal_code = Set(input.postal_code);
                active.country_code = Set(input.country_code);
                active.phone = Set(input.phone);
                active.updated_at = Set(now);
                active.update(&*self.db).await?
            }
            None => {
                let model = address::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    address_line_1: Set(input.address_line_1),
                    address_line_2: Set(input.address_line_2),
                    city: Set(input.city),
                    province: Set(input.province),
                    postal_code: Set(input.postal_code),
                    country_code: Set(input.country_code),
                    phone: Set(input.phone),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                model.insert(&*self.db).await?
            }
        };

        Ok(saved)
    }

    async fn load_user(&self, user_id: Uuid) -> Result<UserModel, ServiceError> {
        User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found.".to_string()))
    }
}

/// Base64url encoding of a user id, as embedded in emailed links.
pub fn encode_uid(user_id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string())
}

/// Decodes the uid segment of an emailed link.
pub fn decode_uid(uid_b64: &str) -> Result<Uuid, ServiceError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(uid_b64)
        .map_err(|_| ServiceError::ValidationError("Invalid user or UID".to_string()))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| ServiceError::ValidationError("Invalid user or UID".to_string()))?;
    Uuid::parse_str(&text)
        .map_err(|_| ServiceError::ValidationError("Invalid user or UID".to_string()))
}

/// Input for registration
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 150))]
    pub first_name: String,
    #[validate(length(min = 1, max = 150))]
    pub last_name: String,
}

/// Login credentials
#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Successful login payload
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: AccountProfile,
}

/// Outcome of a reset request
#[derive(Debug, Serialize)]
pub struct ResetRequested {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_url: Option<String>,
}

/// Profile name updates
#[derive(Debug, Deserialize)]
pub struct UpdateProfileInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Input for the single primary address
#[derive(Debug, Deserialize, Validate)]
pub struct AddressInput {
    #[validate(length(min = 1, max = 255))]
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub province: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 2, message = "Country code must be ISO 3166 alpha-2"))]
    pub country_code: String,
    pub phone: Option<String>,
}

/// Account as exposed to clients; the credential hash never leaves the
/// service layer.
#[derive(Debug, Serialize)]
pub struct AccountProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserModel> for AccountProfile {
    fn from(model: UserModel) -> Self {
        Self {
            id: model.id,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            is_active: model.is_active,
            is_staff: model.is_staff,
            created_at: model.created_at,
        }
    }
}
