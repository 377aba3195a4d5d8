// Core storefront services
pub mod accounts;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod payments;
pub mod reviews;

pub use accounts::AccountService;
pub use cart::CartService;
pub use catalog::CatalogService;
pub use orders::OrderService;
pub use payments::{HttpPaymentGateway, PaymentGateway};
pub use reviews::ReviewService;
