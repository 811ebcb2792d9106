//! Orders and their lines.

mod observed;
mod records;
mod service;

pub use observed::ObserveCreated;
pub use records::{
    CreateOrder, NewOrderLine, Order, OrderCreated, OrderLine, OrderState, OrderStatus, UpdateOrder,
};
pub use service::OrderService;
