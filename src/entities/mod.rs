pub mod manifest;
pub mod order;
pub mod order_line;
pub mod packing_lease;
pub mod picking_lease;
pub mod product;
