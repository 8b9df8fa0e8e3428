//! Repository Implementations
//!
//! PostgreSQL implementations of the domain repository traits.

mod chat_message_repository;
mod chat_room_repository;
mod shipping_address_repository;
mod shipping_method_repository;
mod shipping_order_repository;
mod user_repository;

pub use chat_message_repository::PgChatMessageRepository;
pub use chat_room_repository::PgChatRoomRepository;
pub use shipping_address_repository::PgShippingAddressRepository;
pub use shipping_method_repository::PgShippingMethodRepository;
pub use shipping_order_repository::PgShippingOrderRepository;
pub use user_repository::PgUserRepository;
