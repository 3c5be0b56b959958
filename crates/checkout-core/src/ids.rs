//! Identifier aliases shared with the Cravt API (integer primary keys).

/// Restaurant primary key
pub type RestaurantId = u64;

/// Menu item primary key (doubles as the cart entry id)
pub type MenuItemId = u64;

/// Internal order primary key returned by `POST /orders`
pub type OrderId = u64;
