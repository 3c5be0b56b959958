//! # Cart Store
//!
//! The session-wide cart. It holds items from exactly one restaurant and is
//! mutated only through four entry points: `add_item`, `update_quantity`,
//! `remove_item` and `clear`. Every mutation is written to durable storage
//! before it becomes visible to readers or subscribers.

use crate::error::{CheckoutError, CheckoutResult};
use crate::ids::{MenuItemId, RestaurantId};
use crate::money::{Currency, Price};
use crate::storage::{SharedKeyValueStore, StorageScope};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const CART_KEY: &str = "cart";
const CART_RESTAURANT_KEY: &str = "cart_restaurant_id";

/// A menu item as offered by a restaurant page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub price: Price,
}

impl MenuItem {
    pub fn new(id: MenuItemId, name: impl Into<String>, price: Price) -> Self {
        Self {
            id,
            name: name.into(),
            price,
        }
    }
}

/// A line in the cart. `quantity` is never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartEntry {
    pub id: MenuItemId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub restaurant_id: RestaurantId,
}

impl CartEntry {
    /// Calculate the total price for this line
    pub fn line_total(&self) -> Price {
        self.unit_price * self.quantity
    }
}

/// Snapshot of the cart contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    entries: Vec<CartEntry>,
    restaurant_id: Option<RestaurantId>,
}

impl Cart {
    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    pub fn restaurant_id(&self) -> Option<RestaurantId> {
        self.restaurant_id
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: MenuItemId) -> Option<&CartEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Sum of `unit_price * quantity` over all lines
    pub fn subtotal(&self, currency: Currency) -> Price {
        self.entries
            .iter()
            .fold(Price::zero(currency), |acc, e| acc + e.line_total())
    }

    /// Total number of units across all lines
    pub fn item_count(&self) -> u32 {
        self.entries.iter().map(|e| e.quantity).sum()
    }

    /// Single-restaurant and positive-quantity invariants
    pub fn is_consistent(&self) -> bool {
        match self.restaurant_id {
            None => self.entries.is_empty(),
            Some(rid) => {
                !self.entries.is_empty()
                    && self
                        .entries
                        .iter()
                        .all(|e| e.restaurant_id == rid && e.quantity >= 1)
            }
        }
    }

    /// Repair data restored from storage so that the invariants hold.
    fn sanitized(entries: Vec<CartEntry>, restaurant_id: Option<RestaurantId>) -> Self {
        let restaurant_id = restaurant_id.or_else(|| entries.first().map(|e| e.restaurant_id));
        let entries: Vec<CartEntry> = entries
            .into_iter()
            .filter(|e| e.quantity >= 1 && Some(e.restaurant_id) == restaurant_id)
            .collect();
        let restaurant_id = if entries.is_empty() {
            None
        } else {
            restaurant_id
        };
        Self {
            entries,
            restaurant_id,
        }
    }
}

/// Durable, observable cart with a single-restaurant invariant.
///
/// Shared by reference (`Arc<CartStore>`) across all checkout components;
/// readers take snapshots, writers go through the four mutation methods.
pub struct CartStore {
    storage: SharedKeyValueStore,
    scope: StorageScope,
    currency: Currency,
    state: watch::Sender<Cart>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("scope", &self.scope)
            .field("cart", &*self.state.borrow())
            .finish()
    }
}

impl CartStore {
    /// Restore the cart persisted under `scope`, or start empty.
    ///
    /// Unreadable or inconsistent persisted data is discarded with a warning.
    pub fn load(
        storage: SharedKeyValueStore,
        scope: StorageScope,
        currency: Currency,
    ) -> CheckoutResult<Self> {
        let cart = Self::read_persisted(&storage, &scope)?;
        info!(
            items = cart.entries.len(),
            restaurant_id = ?cart.restaurant_id,
            "cart restored"
        );
        let (state, _) = watch::channel(cart);
        Ok(Self {
            storage,
            scope,
            currency,
            state,
            write_lock: Mutex::new(()),
        })
    }

    fn read_persisted(storage: &SharedKeyValueStore, scope: &StorageScope) -> CheckoutResult<Cart> {
        let raw_entries = storage.get(&scope.key(CART_KEY))?;
        let raw_restaurant = storage.get(&scope.key(CART_RESTAURANT_KEY))?;

        let entries: Vec<CartEntry> = match raw_entries {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, "discarding unreadable persisted cart");
                    Vec::new()
                }
            },
        };
        let restaurant_id = raw_restaurant.and_then(|raw| raw.trim().parse().ok());

        let cart = Cart::sanitized(entries, restaurant_id);
        Ok(cart)
    }

    /// Write both keys. If the restaurant key cannot be written the previous
    /// entries value is put back, so storage never holds a half-applied cart.
    fn persist(&self, cart: &Cart) -> CheckoutResult<()> {
        let entries_key = self.scope.key(CART_KEY);
        let restaurant_key = self.scope.key(CART_RESTAURANT_KEY);
        let previous = self.storage.get(&entries_key)?;

        let body = serde_json::to_string(&cart.entries)?;
        self.storage.set(&entries_key, &body)?;
        let written = match cart.restaurant_id {
            Some(rid) => self.storage.set(&restaurant_key, &rid.to_string()),
            None => self.storage.remove(&restaurant_key),
        };

        if let Err(e) = written {
            let restored = match previous {
                Some(raw) => self.storage.set(&entries_key, &raw),
                None => self.storage.remove(&entries_key),
            };
            if let Err(restore_err) = restored {
                warn!(error = %restore_err, "could not roll back persisted cart entries");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Apply `mutate` to a copy of the cart, persist it, then publish it.
    /// `mutate` returns `false` when nothing changed.
    fn commit<F>(&self, op: &'static str, mutate: F) -> CheckoutResult<()>
    where
        F: FnOnce(&mut Cart) -> CheckoutResult<bool>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| CheckoutError::Internal("cart write lock poisoned".to_string()))?;

        let mut next = self.state.borrow().clone();
        if !mutate(&mut next)? {
            debug!(op, "cart unchanged");
            return Ok(());
        }
        debug_assert!(next.is_consistent());
        self.persist(&next)?;
        debug!(op, items = next.entries.len(), restaurant_id = ?next.restaurant_id, "cart updated");
        self.state.send_replace(next);
        Ok(())
    }

    /// Add one unit of `item` from `restaurant_id`.
    ///
    /// Fails with `CartConflict` (and changes nothing) if the cart already
    /// holds items from another restaurant.
    pub fn add_item(&self, item: MenuItem, restaurant_id: RestaurantId) -> CheckoutResult<()> {
        if !item.price.is_valid_unit_price() {
            return Err(CheckoutError::validation(format!(
                "Price of '{}' is out of range",
                item.name
            )));
        }
        self.commit("add_item", |cart| {
            match cart.restaurant_id {
                Some(current) if !cart.entries.is_empty() && current != restaurant_id => {
                    warn!(
                        current,
                        requested = restaurant_id,
                        "rejected item from a second restaurant"
                    );
                    return Err(CheckoutError::CartConflict {
                        current,
                        requested: restaurant_id,
                    });
                }
                _ => {}
            }

            cart.restaurant_id = Some(restaurant_id);
            match cart.entries.iter_mut().find(|e| e.id == item.id) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(1),
                None => cart.entries.push(CartEntry {
                    id: item.id,
                    name: item.name,
                    unit_price: item.price,
                    quantity: 1,
                    restaurant_id,
                }),
            }
            Ok(true)
        })
    }

    /// Set the quantity of an existing line. Zero is rejected: callers that
    /// would go below one must call `remove_item` instead.
    pub fn update_quantity(&self, id: MenuItemId, quantity: u32) -> CheckoutResult<()> {
        if quantity < 1 {
            return Err(CheckoutError::validation(
                "Quantity must be at least 1. Remove the item instead.",
            ));
        }
        self.commit("update_quantity", |cart| {
            match cart.entries.iter_mut().find(|e| e.id == id) {
                Some(entry) if entry.quantity != quantity => {
                    entry.quantity = quantity;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    /// Remove a line; an emptied cart forgets its restaurant.
    pub fn remove_item(&self, id: MenuItemId) -> CheckoutResult<()> {
        self.commit("remove_item", |cart| {
            let before = cart.entries.len();
            cart.entries.retain(|e| e.id != id);
            if cart.entries.is_empty() {
                cart.restaurant_id = None;
            }
            Ok(cart.entries.len() != before)
        })
    }

    /// Empty the cart (successful payment, logout)
    pub fn clear(&self) -> CheckoutResult<()> {
        self.commit("clear", |cart| {
            let changed = !cart.entries.is_empty() || cart.restaurant_id.is_some();
            cart.entries.clear();
            cart.restaurant_id = None;
            Ok(changed)
        })
    }

    // -- reads ---------------------------------------------------------------

    pub fn snapshot(&self) -> Cart {
        self.state.borrow().clone()
    }

    pub fn items(&self) -> Vec<CartEntry> {
        self.state.borrow().entries.clone()
    }

    pub fn restaurant_id(&self) -> Option<RestaurantId> {
        self.state.borrow().restaurant_id
    }

    pub fn subtotal(&self) -> Price {
        self.state.borrow().subtotal(self.currency)
    }

    pub fn item_count(&self) -> u32 {
        self.state.borrow().item_count()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn scope(&self) -> &StorageScope {
        &self.scope
    }

    /// Receive a notification for every committed change
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryKeyValueStore};
    use std::sync::Arc;

    fn inr(amount: f64) -> Price {
        Price::new(amount, Currency::INR)
    }

    fn dish(id: MenuItemId, price: f64) -> MenuItem {
        MenuItem::new(id, format!("Dish {}", id), inr(price))
    }

    fn store_with(storage: Arc<dyn KeyValueStore>) -> CartStore {
        CartStore::load(storage, StorageScope::Global, Currency::INR).unwrap()
    }

    fn memory_store() -> (CartStore, MemoryKeyValueStore) {
        let storage = MemoryKeyValueStore::new();
        (store_with(Arc::new(storage.clone())), storage)
    }

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> CheckoutResult<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> CheckoutResult<()> {
            Err(CheckoutError::Storage("quota exceeded".to_string()))
        }

        fn remove(&self, _key: &str) -> CheckoutResult<()> {
            Err(CheckoutError::Storage("quota exceeded".to_string()))
        }
    }

    #[test]
    fn test_add_merges_quantity() {
        let (cart, _) = memory_store();
        cart.add_item(dish(1, 100.0), 7).unwrap();
        cart.add_item(dish(1, 100.0), 7).unwrap();
        cart.add_item(dish(2, 40.0), 7).unwrap();

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.snapshot().get(1).unwrap().quantity, 2);
        assert_eq!(cart.restaurant_id(), Some(7));
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.subtotal(), inr(240.0));
    }

    #[test]
    fn test_subtotal_scenario() {
        let (cart, _) = memory_store();
        cart.add_item(dish(1, 100.0), 3).unwrap();
        cart.update_quantity(1, 2).unwrap();
        assert_eq!(cart.subtotal(), inr(200.0));
    }

    #[test]
    fn test_cross_restaurant_add_is_rejected_without_change() {
        let (cart, _) = memory_store();
        cart.add_item(dish(1, 100.0), 7).unwrap();
        let before = cart.snapshot();

        let err = cart.add_item(dish(9, 10.0), 8).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::CartConflict {
                current: 7,
                requested: 8
            }
        ));
        assert_eq!(cart.snapshot(), before);
    }

    #[test]
    fn test_removing_last_entry_resets_restaurant() {
        let (cart, storage) = memory_store();
        cart.add_item(dish(1, 100.0), 7).unwrap();
        cart.remove_item(1).unwrap();

        assert!(cart.is_empty());
        assert_eq!(cart.restaurant_id(), None);
        assert_eq!(storage.get("cart_restaurant_id").unwrap(), None);

        // a fresh restaurant is accepted again
        cart.add_item(dish(5, 10.0), 8).unwrap();
        assert_eq!(cart.restaurant_id(), Some(8));
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let (cart, _) = memory_store();
        cart.add_item(dish(1, 100.0), 7).unwrap();

        assert!(matches!(
            cart.update_quantity(1, 0),
            Err(CheckoutError::Validation(_))
        ));
        assert_eq!(cart.snapshot().get(1).unwrap().quantity, 1);
    }

    #[test]
    fn test_update_unknown_item_is_noop() {
        let (cart, _) = memory_store();
        cart.add_item(dish(1, 100.0), 7).unwrap();
        cart.update_quantity(99, 4).unwrap();
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn test_clear() {
        let (cart, _) = memory_store();
        cart.add_item(dish(1, 100.0), 7).unwrap();
        cart.clear().unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.restaurant_id(), None);
    }

    #[test]
    fn test_cart_survives_reload() {
        let storage = MemoryKeyValueStore::new();
        {
            let cart = store_with(Arc::new(storage.clone()));
            cart.add_item(dish(1, 100.0), 7).unwrap();
            cart.add_item(dish(1, 100.0), 7).unwrap();
        }

        let reloaded = store_with(Arc::new(storage));
        assert_eq!(reloaded.restaurant_id(), Some(7));
        assert_eq!(reloaded.snapshot().get(1).unwrap().quantity, 2);
    }

    #[test]
    fn test_scopes_do_not_share_carts() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let alice =
            CartStore::load(storage.clone(), StorageScope::for_user("alice"), Currency::INR)
                .unwrap();
        alice.add_item(dish(1, 100.0), 7).unwrap();

        let bob = CartStore::load(storage, StorageScope::for_user("bob"), Currency::INR).unwrap();
        assert!(bob.is_empty());
    }

    #[test]
    fn test_corrupt_persisted_cart_starts_empty() {
        let storage = MemoryKeyValueStore::new();
        storage.set("cart", "definitely not json").unwrap();
        storage.set("cart_restaurant_id", "null").unwrap();

        let cart = store_with(Arc::new(storage));
        assert!(cart.is_empty());
        assert_eq!(cart.restaurant_id(), None);
    }

    #[test]
    fn test_inconsistent_persisted_rows_are_dropped() {
        let storage = MemoryKeyValueStore::new();
        let rows = vec![
            CartEntry {
                id: 1,
                name: "Dosa".into(),
                unit_price: inr(80.0),
                quantity: 1,
                restaurant_id: 7,
            },
            CartEntry {
                id: 2,
                name: "Stray".into(),
                unit_price: inr(10.0),
                quantity: 1,
                restaurant_id: 8,
            },
            CartEntry {
                id: 3,
                name: "Zero".into(),
                unit_price: inr(10.0),
                quantity: 0,
                restaurant_id: 7,
            },
        ];
        storage
            .set("cart", &serde_json::to_string(&rows).unwrap())
            .unwrap();
        storage.set("cart_restaurant_id", "7").unwrap();

        let cart = store_with(Arc::new(storage));
        assert_eq!(cart.items().len(), 1);
        assert!(cart.snapshot().is_consistent());
    }

    #[test]
    fn test_failed_persist_leaves_cart_unchanged() {
        let cart = store_with(Arc::new(ReadOnlyStore));
        let err = cart.add_item(dish(1, 100.0), 7).unwrap_err();

        assert!(matches!(err, CheckoutError::Storage(_)));
        assert!(cart.is_empty());
        assert_eq!(cart.restaurant_id(), None);
    }

    #[test]
    fn test_out_of_range_price_is_rejected() {
        let (cart, storage) = memory_store();
        let err = cart
            .add_item(MenuItem::new(1, "Gold leaf", inr(1e17)), 7)
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
        assert!(cart.is_empty());
        assert_eq!(storage.get("cart").unwrap(), None);

        let limit = Price::from_minor(crate::money::MAX_UNIT_PRICE_MINOR, Currency::INR);
        cart.add_item(MenuItem::new(2, "Banquet", limit), 7).unwrap();
        cart.add_item(MenuItem::new(2, "Banquet", limit), 7).unwrap();
        assert_eq!(cart.subtotal().amount, 2 * crate::money::MAX_UNIT_PRICE_MINOR);
    }

    /// Memory store that refuses writes to one key.
    struct FailingKeyStore {
        inner: MemoryKeyValueStore,
        failing_key: &'static str,
    }

    impl KeyValueStore for FailingKeyStore {
        fn get(&self, key: &str) -> CheckoutResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> CheckoutResult<()> {
            if key == self.failing_key {
                return Err(CheckoutError::Storage("disk full".to_string()));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> CheckoutResult<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_failed_restaurant_write_rolls_back_entries() {
        let memory = MemoryKeyValueStore::new();
        let cart = store_with(Arc::new(FailingKeyStore {
            inner: memory.clone(),
            failing_key: "cart_restaurant_id",
        }));

        let err = cart.add_item(dish(1, 100.0), 7).unwrap_err();
        assert!(matches!(err, CheckoutError::Storage(_)));
        assert!(cart.is_empty());
        assert_eq!(memory.get("cart").unwrap(), None);

        let reloaded = store_with(Arc::new(memory));
        assert!(reloaded.is_empty());
        assert_eq!(reloaded.restaurant_id(), None);
    }

    #[test]
    fn test_failed_restaurant_write_keeps_previous_entries() {
        let memory = MemoryKeyValueStore::new();
        {
            let cart = store_with(Arc::new(memory.clone()));
            cart.add_item(dish(1, 100.0), 7).unwrap();
        }
        let before = memory.get("cart").unwrap();

        let cart = store_with(Arc::new(FailingKeyStore {
            inner: memory.clone(),
            failing_key: "cart_restaurant_id",
        }));
        cart.add_item(dish(2, 40.0), 7).unwrap_err();

        assert_eq!(memory.get("cart").unwrap(), before);
        let reloaded = store_with(Arc::new(memory));
        assert_eq!(reloaded.items().len(), 1);
        assert_eq!(reloaded.snapshot().get(1).unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let (cart, _) = memory_store();
        let mut rx = cart.subscribe();

        cart.add_item(dish(1, 100.0), 7).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().item_count(), 1);

        cart.clear().unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_empty());
    }

    #[test]
    fn test_invariant_holds_over_mixed_operations() {
        let (cart, _) = memory_store();
        // small LCG so the sequence is deterministic
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = || {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            seed >> 33
        };

        for _ in 0..500 {
            let item = next() % 6;
            let restaurant = 1 + next() % 3;
            let before = cart.snapshot();
            match next() % 4 {
                0 | 1 => {
                    let result = cart.add_item(dish(item, 10.0), restaurant);
                    if let Some(current) = before.restaurant_id() {
                        if current != restaurant {
                            assert!(result.is_err());
                            assert_eq!(cart.snapshot(), before);
                        }
                    }
                }
                2 => {
                    let _ = cart.update_quantity(item, (next() % 4) as u32);
                }
                _ => cart.remove_item(item).unwrap(),
            }

            let snapshot = cart.snapshot();
            assert!(snapshot.is_consistent(), "broken cart: {:?}", snapshot);
            if let Some(rid) = snapshot.restaurant_id() {
                assert!(snapshot.entries().iter().all(|e| e.restaurant_id == rid));
            }
        }
    }
}
