//! Application Services
//!
//! Business logic orchestration over the domain repository traits.

mod chat_service;
mod shipping_service;

pub use chat_service::{
    ChatService, ChatServiceImpl, CreateRoomDto, MarkReadResult, MessageWithSender, SendMessageDto,
};
pub use shipping_service::{
    CreateAddressDto, CreateOrderDto, ShippingService, ShippingServiceImpl,
};
