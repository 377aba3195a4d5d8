/// Storefront entities module
pub mod address;
pub mod cart;
pub mod cart_item;
pub mod category;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_image;
pub mod rating;
pub mod report;
pub mod review;
pub mod review_reply;
pub mod user;

// Re-export entities
pub use address::{Entity as Address, Model as AddressModel};
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use category::{CategorySection, Entity as Category, Model as CategoryModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentMethod};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_image::{Entity as ProductImage, Model as ProductImageModel};
pub use rating::{Entity as Rating, Model as RatingModel};
pub use report::{Entity as Report, Model as ReportModel, ReportTargetType};
pub use review::{Entity as Review, Model as ReviewModel};
pub use review_reply::{Entity as ReviewReply, Model as ReviewReplyModel};
pub use user::{Entity as User, Model as UserModel};
