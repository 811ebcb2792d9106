//! Broadcast topics, one fixed string per kind of fact.

/// A product was created. Payload: the full product record.
pub const PRODUCT_CREATED: &str = "product.created";

/// A customer was created. Payload: the full customer record.
pub const CUSTOMER_CREATED: &str = "customer.created";

/// An order was created. Payload: `{id, customer_pk}`.
pub const ORDER_CREATED: &str = "order.created";

/// An order line was created. Payload: the order line record.
pub const ORDERLINE_CREATED: &str = "orderline.created";
