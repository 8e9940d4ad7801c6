pub mod book;
pub mod cart_line;
pub mod favorite;
pub mod order;
pub mod order_item;
pub mod review;
pub mod user;
