//! Bill document for an order.

use crate::domain::aggregates::Order;

/// Artifact name every order's bill is stored under.
pub const BILL_FILE_NAME: &str = "payment.html";

/// Storage key of the bill for `order`. Stable, so regenerating overwrites.
pub fn bill_key(order: &Order) -> String {
    format!("orders/{}/{}", order.id(), BILL_FILE_NAME)
}

/// Render the bill as a standalone HTML page.
pub fn render_bill(order: &Order) -> String {
    let shipping = order.shipping();
    let rows: String = order
        .lines()
        .iter()
        .map(|line| {
            format!(
                "      <tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
                escape(&line.product_name),
                line.quantity,
                line.unit_price,
                line.line_total(),
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Bill for order {id}</title>
  <style>
    body {{ font-family: sans-serif; margin: 2em; }}
    table {{ border-collapse: collapse; width: 100%; }}
    th, td {{ border-bottom: 1px solid #ccc; padding: 4px 8px; text-align: left; }}
    .num {{ text-align: right; }}
  </style>
</head>
<body>
  <h1>Bill</h1>
  <dl>
    <dt>Order</dt><dd>{id}</dd>
    <dt>Customer</dt><dd>{customer}</dd>
    <dt>Placed</dt><dd>{placed}</dd>
    <dt>Status</dt><dd>{status}</dd>
    <dt>Paid</dt><dd>{paid}</dd>
  </dl>
  <h2>Ship to</h2>
  <p>{address}, unit {unit}<br>{postal_code}<br>Phone: {phone}</p>
  <table>
    <thead>
      <tr><th>Product</th><th class="num">Qty</th><th class="num">Unit price</th><th class="num">Amount</th></tr>
    </thead>
    <tbody>
{rows}    </tbody>
    <tfoot>
      <tr><th colspan="3">Total</th><th class="num">{total}</th></tr>
    </tfoot>
  </table>
</body>
</html>
"#,
        id = order.id(),
        customer = order.customer_id(),
        placed = order.created_at().format("%Y-%m-%d %H:%M UTC"),
        status = order.status(),
        paid = if order.is_paid() { "yes" } else { "no" },
        address = escape(&shipping.address),
        unit = escape(&shipping.unit),
        postal_code = escape(&shipping.postal_code),
        phone = escape(&shipping.phone),
        rows = rows,
        total = order.total_price(),
    )
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CartLine, ProductSnapshot};
    use crate::domain::value_objects::{CartId, CartLineId, Money, ProductId, Quantity, ShippingInfo, UserId};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    fn order_with(name: &str, address: &str) -> Order {
        let product = ProductSnapshot { id: ProductId::generate(), name: name.into(), price: Money::new(Decimal::new(1250, 2)), discounted_price: None };
        let line = CartLine { id: CartLineId::generate(), cart_id: CartId::generate(), product_id: product.id, quantity: Quantity::new(2), subtotal: Money::ZERO };
        let shipping = ShippingInfo { address: address.into(), postal_code: "12345".into(), unit: "3".into(), phone: "5550001111".into() };
        Order::place(UserId::generate(), shipping, &[line], &HashMap::from([(product.id, product)]), Utc::now()).unwrap()
    }

    #[test]
    fn test_bill_lists_lines_and_total() {
        let order = order_with("Teapot", "9 Oak Ave");
        let html = render_bill(&order);
        assert!(html.contains("Teapot"));
        assert!(html.contains("12.50"));
        assert!(html.contains("25.00"));
        assert!(html.contains(&order.id().to_string()));
    }

    #[test]
    fn test_bill_has_one_row_per_line() {
        let products: Vec<ProductSnapshot> = ["Cup", "Saucer", "Spoon"]
            .into_iter()
            .map(|name| ProductSnapshot { id: ProductId::generate(), name: name.into(), price: Money::new(Decimal::new(300, 2)), discounted_price: None })
            .collect();
        let lines: Vec<CartLine> = products
            .iter()
            .map(|p| CartLine { id: CartLineId::generate(), cart_id: CartId::generate(), product_id: p.id, quantity: Quantity::new(1), subtotal: Money::ZERO })
            .collect();
        let catalog: HashMap<_, _> = products.into_iter().map(|p| (p.id, p)).collect();
        let shipping = ShippingInfo { address: "2 Elm".into(), postal_code: "12345".into(), unit: "1".into(), phone: "5550001111".into() };
        let order = Order::place(UserId::generate(), shipping, &lines, &catalog, Utc::now()).unwrap();

        let html = render_bill(&order);
        let rows: Vec<&str> = html.lines().filter(|l| l.trim_start().starts_with("<tr><td>")).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].contains("Saucer"));
        assert!(html.contains("9.00"));
    }

    #[test]
    fn test_bill_escapes_user_input() {
        let html = render_bill(&order_with("<script>", "A & B"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("A &amp; B"));
    }

    #[test]
    fn test_bill_key_is_stable() {
        let order = order_with("Cup", "1 St");
        assert_eq!(bill_key(&order), bill_key(&order));
        assert!(bill_key(&order).ends_with("/payment.html"));
    }
}
