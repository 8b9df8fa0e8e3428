//! # Domain Entities
//!
//! Core domain entities for the support platform. All entities map
//! directly to their corresponding database tables.
//!
//! ## Core Entities
//!
//! - **User**: The acting account loaded during authentication
//! - **ChatRoom**: A support session with participants and a lifecycle
//! - **ChatMessage**: A message in a room with read receipts
//! - **ShippingAddress**: A user's saved postal address
//! - **ShippingMethod**: Priced, restricted delivery options
//! - **ShippingOrder**: The shipping leg of an order with a status log
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access
//! operations. These traits are implemented in the infrastructure
//! layer, following the dependency inversion principle.

mod chat_message;
mod chat_room;
mod shipping_address;
mod shipping_method;
mod shipping_order;
mod user;

// Re-export User entity and related types
pub use user::{User, UserRepository, UserRole};

// Re-export ChatRoom entity and related types
pub use chat_room::{
    ChatRoom, ChatRoomRepository, Participant, ParticipantRole, RoomCategory, RoomMetadata,
    RoomPriority, RoomStatus, MAX_SUBJECT_LENGTH,
};

// Re-export ChatMessage entity and related types
pub use chat_message::{
    Attachment, AttachmentKind, ChatMessage, ChatMessageRepository, MessageStatus, MessageType,
    ReadReceipt, MAX_TEXT_LENGTH,
};

// Re-export shipping entities and related types
pub use shipping_address::{ShippingAddress, ShippingAddressRepository};
pub use shipping_method::{
    EstimatedDays, MethodRestrictions, ShippingMethod, ShippingMethodRepository,
};
pub use shipping_order::{
    PackageDetails, ShippingOrder, ShippingOrderRepository, ShippingStatus, StatusHistoryEntry,
    MAX_NOTES_LENGTH,
};

// Mock repositories for service-level tests
#[cfg(test)]
pub use chat_message::MockChatMessageRepository;
#[cfg(test)]
pub use chat_room::MockChatRoomRepository;
#[cfg(test)]
pub use shipping_address::MockShippingAddressRepository;
#[cfg(test)]
pub use shipping_method::MockShippingMethodRepository;
#[cfg(test)]
pub use shipping_order::MockShippingOrderRepository;
#[cfg(test)]
pub use user::MockUserRepository;
