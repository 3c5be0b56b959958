//! # Command Handlers
//!
//! One function per CLI command. Human output goes to stdout; diagnostics
//! go through `tracing`.

use crate::context::AppContext;
use crate::terminal;
use checkout_core::{
    Cart, CartStore, CheckoutController, CheckoutError, CheckoutOutcome, CustomerContact,
    MenuItem, MenuItemId, Navigation, OrderType, Price, RestaurantId, ScheduleChoice,
    SchedulingResolver,
};
use checkout_http::{ChannelGateway, ScriptProbe};
use chrono::NaiveDate;
use std::io::Write;
use std::sync::Arc;
use tracing::info;

/// Inputs for `checkout`
#[derive(Debug, Clone, Default)]
pub struct CheckoutRequest {
    pub order_type: OrderType,
    pub later: bool,
    pub date: Option<String>,
    pub time: Option<String>,
    pub coupon: Option<String>,
    pub contact: CustomerContact,
}

pub fn cart_show<W: Write>(cart: &CartStore, out: &mut W) -> anyhow::Result<()> {
    render_cart(&cart.snapshot(), cart, out)
}

pub fn cart_add<W: Write>(
    cart: &CartStore,
    item: MenuItem,
    restaurant_id: RestaurantId,
    out: &mut W,
) -> anyhow::Result<()> {
    let name = item.name.clone();
    cart.add_item(item, restaurant_id)?;
    writeln!(out, "Added {} to cart.", name)?;
    cart_show(cart, out)
}

pub fn cart_update<W: Write>(
    cart: &CartStore,
    id: MenuItemId,
    quantity: u32,
    out: &mut W,
) -> anyhow::Result<()> {
    cart.update_quantity(id, quantity)?;
    cart_show(cart, out)
}

pub fn cart_remove<W: Write>(cart: &CartStore, id: MenuItemId, out: &mut W) -> anyhow::Result<()> {
    cart.remove_item(id)?;
    cart_show(cart, out)
}

pub fn cart_clear<W: Write>(cart: &CartStore, out: &mut W) -> anyhow::Result<()> {
    cart.clear()?;
    writeln!(out, "Cart cleared.")?;
    Ok(())
}

fn render_cart<W: Write>(snapshot: &Cart, cart: &CartStore, out: &mut W) -> anyhow::Result<()> {
    if snapshot.is_empty() {
        writeln!(out, "Your cart is empty.")?;
        return Ok(());
    }
    if let Some(restaurant_id) = snapshot.restaurant_id() {
        writeln!(out, "Restaurant #{}", restaurant_id)?;
    }
    for entry in snapshot.entries() {
        writeln!(
            out,
            "  [{}] {} x{} @ {} = {}",
            entry.id,
            entry.name,
            entry.quantity,
            entry.unit_price,
            entry.line_total()
        )?;
    }
    writeln!(out, "Subtotal: {}", snapshot.subtotal(cart.currency()))?;
    Ok(())
}

/// Print availability for a restaurant
pub async fn slots<W: Write>(
    ctx: &AppContext,
    restaurant_id: RestaurantId,
    date: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut resolver = SchedulingResolver::new(OrderType::DineIn);
    resolver
        .fetch_availability(ctx.backend.as_ref(), restaurant_id, date)
        .await?;
    render_slots(&resolver, out)
}

fn render_slots<W: Write>(resolver: &SchedulingResolver, out: &mut W) -> anyhow::Result<()> {
    if !resolver.has_slots() {
        writeln!(out, "No time slots available.")?;
        return Ok(());
    }
    for day in resolver.days() {
        writeln!(out, "{} ({})", day.date_display, day.date_value)?;
        for slot in &day.slots {
            writeln!(out, "  {}  [{}]", slot.display, slot.value)?;
        }
    }
    Ok(())
}

/// Print coupon suggestions for a restaurant
pub async fn coupons<W: Write>(
    ctx: &AppContext,
    restaurant_id: RestaurantId,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut engine = checkout_core::CouponEngine::new();
    let suggestions = engine
        .list_applicable(ctx.backend.as_ref(), restaurant_id)
        .await;
    if suggestions.is_empty() {
        writeln!(out, "No coupons available.")?;
    }
    let symbol = ctx.settings.currency.symbol();
    for coupon in suggestions {
        writeln!(out, "  {:<12} {}", coupon.code, coupon.deal_label(symbol))?;
    }
    Ok(())
}

/// Run a full checkout with the terminal gateway UI
pub async fn checkout<W: Write>(
    ctx: &AppContext,
    request: CheckoutRequest,
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    let probe = ScriptProbe::new(&ctx.client_config)?;
    let (gateway, requests) = ChannelGateway::channel(Some(probe));
    let ui = tokio::spawn(terminal::run(
        requests,
        tokio::io::BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
    ));

    let mut controller = CheckoutController::new(
        ctx.cart.clone(),
        ctx.backend.clone(),
        Arc::new(gateway),
        ctx.settings.clone(),
        request.order_type,
    );
    let result = run_checkout(&mut controller, request, today, out).await;
    drop(controller);
    ui.abort();
    result
}

/// Drive `controller` through one checkout attempt
pub async fn run_checkout<W: Write>(
    controller: &mut CheckoutController,
    request: CheckoutRequest,
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    controller.initialize(today).await;
    if request.later {
        controller
            .set_schedule_choice(ScheduleChoice::Later)
            .await;
    }

    if controller.scheduling().is_scheduling() {
        if let Some(error) = controller.scheduling().slots_error() {
            writeln!(out, "{}", error)?;
        }
        if let Some(date) = &request.date {
            controller.select_date(date)?;
        }
        match &request.time {
            Some(time) => controller.select_time(time)?,
            None => {
                writeln!(out, "Pick a time with --time:")?;
                render_slots(controller.scheduling(), out)?;
            }
        }
    }

    if let Some(code) = &request.coupon {
        match controller.apply_coupon(code).await {
            Ok(discount) => writeln!(out, "Coupon {} applied: -{}", code, discount)?,
            Err(e) => writeln!(out, "{}", e.user_message())?,
        }
    }

    let summary = controller.summary();
    writeln!(out, "Subtotal:     {}", summary.subtotal)?;
    writeln!(out, "Delivery fee: {}", summary.delivery_fee)?;
    if summary.discount.amount > 0 {
        writeln!(out, "Discount:     -{}", summary.discount)?;
    }
    writeln!(out, "Total:        {}", summary.total)?;

    match controller.place_order(request.contact).await {
        Ok(outcome) => render_outcome(&outcome, out),
        Err(e @ CheckoutError::Validation(_)) => {
            writeln!(out, "{}", e)?;
            Err(e.into())
        }
        Err(e) => {
            writeln!(out, "Could not place your order: {}", e.user_message())?;
            Err(e.into())
        }
    }
}

fn render_outcome<W: Write>(outcome: &CheckoutOutcome, out: &mut W) -> anyhow::Result<()> {
    info!(order_id = outcome.order_id(), state = %outcome.state(), "checkout outcome");
    if let Some(notice) = &outcome.notice {
        writeln!(out, "{}", notice)?;
    }
    match outcome.navigation {
        Navigation::OrderDetail(order_id) => writeln!(out, "View your order: /orders/{}", order_id)?,
        Navigation::Stay => writeln!(out, "Your cart is unchanged. You can try again.")?,
    }
    Ok(())
}

/// Clear the session's cart
pub fn logout<W: Write>(cart: &CartStore, out: &mut W) -> anyhow::Result<()> {
    cart.clear()?;
    writeln!(out, "Logged out. Cart cleared.")?;
    Ok(())
}

/// Parse a decimal price argument
pub fn parse_price(raw: &str, currency: checkout_core::Currency) -> anyhow::Result<Price> {
    let amount: f64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid price: {}", raw))?;
    if !amount.is_finite() || amount < 0.0 {
        anyhow::bail!("price must be a non-negative amount");
    }
    let price = Price::new(amount, currency);
    if !price.is_valid_unit_price() {
        anyhow::bail!(
            "price must not exceed {}",
            Price::from_minor(checkout_core::MAX_UNIT_PRICE_MINOR, currency)
        );
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::{Currency, MemoryKeyValueStore, StorageScope, CART_CONFLICT_MESSAGE};

    fn cart() -> CartStore {
        CartStore::load(
            Arc::new(MemoryKeyValueStore::new()),
            StorageScope::Global,
            Currency::INR,
        )
        .unwrap()
    }

    fn item(id: MenuItemId, price: f64) -> MenuItem {
        MenuItem::new(id, format!("Item {}", id), Price::new(price, Currency::INR))
    }

    #[test]
    fn test_cart_commands_render() {
        let cart = cart();
        let mut out = Vec::new();
        cart_add(&cart, item(1, 100.0), 7, &mut out).unwrap();
        cart_update(&cart, 1, 2, &mut out).unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Restaurant #7"));
        assert!(printed.contains("Item 1 x2 @ ₹100.00 = ₹200.00"));
        assert!(printed.contains("Subtotal: ₹200.00"));
    }

    #[test]
    fn test_cross_restaurant_add_surfaces_conflict() {
        let cart = cart();
        let mut out = Vec::new();
        cart_add(&cart, item(1, 100.0), 7, &mut out).unwrap();
        let err = cart_add(&cart, item(2, 50.0), 8, &mut out).unwrap_err();
        assert_eq!(err.to_string(), CART_CONFLICT_MESSAGE);
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn test_remove_last_item_and_logout() {
        let cart = cart();
        let mut out = Vec::new();
        cart_add(&cart, item(1, 100.0), 7, &mut out).unwrap();
        cart_remove(&cart, 1, &mut out).unwrap();
        assert_eq!(cart.restaurant_id(), None);

        cart_add(&cart, item(1, 100.0), 7, &mut out).unwrap();
        logout(&cart, &mut out).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("120.5", Currency::INR).unwrap().amount, 12_050);
        assert!(parse_price("-1", Currency::INR).is_err());
        assert!(parse_price("abc", Currency::INR).is_err());
        assert!(parse_price("1e17", Currency::INR).is_err());
        assert_eq!(
            parse_price("1000000", Currency::INR).unwrap().amount,
            checkout_core::MAX_UNIT_PRICE_MINOR
        );
    }

    #[tokio::test]
    async fn test_run_checkout_against_api() {
        use checkout_core::CheckoutSettings;
        use checkout_http::{ClientConfig, HttpBackend};
        use serde_json::json;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let routes = [
            ("GET", "/api/restaurants/7", json!({"id": 7, "deliveryFee": 50.0})),
            ("GET", "/api/coupons/applicable/7", json!([])),
            ("POST", "/api/orders", json!({"order_id": 501})),
            (
                "POST",
                "/api/payments/create",
                json!({"razorpay_order_id": "order_Nx1", "razorpay_key": "rzp_test_abc", "amount": 25000}),
            ),
            ("POST", "/api/payments/verify", json!({"message": "Payment verified"})),
        ];
        for (verb, route, body) in routes {
            Mock::given(method(verb))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;
        }

        let cart = Arc::new(cart());
        cart.add_item(item(1, 100.0), 7).unwrap();
        cart.add_item(item(1, 100.0), 7).unwrap();

        let backend =
            HttpBackend::new(ClientConfig::new(format!("{}/api", server.uri()))).unwrap();
        let (gateway, requests) = ChannelGateway::channel(None);
        let input: &'static [u8] = b"pay pay_1 sig_1\n";
        let ui = tokio::spawn(terminal::run(requests, input, Vec::new()));

        let mut controller = CheckoutController::new(
            cart.clone(),
            Arc::new(backend),
            Arc::new(gateway),
            CheckoutSettings::default(),
            OrderType::Takeaway,
        );
        let mut out = Vec::new();
        let today = NaiveDate::from_ymd_opt(2025, 10, 14).unwrap();
        run_checkout(&mut controller, CheckoutRequest::default(), today, &mut out)
            .await
            .unwrap();
        drop(controller);
        ui.await.unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Total:        ₹250.00"));
        assert!(printed.contains("Payment verified"));
        assert!(printed.contains("View your order: /orders/501"));
        assert!(cart.is_empty());
    }
}
