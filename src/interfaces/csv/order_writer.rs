use crate::domain::order::Order;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct OrderRow<'a> {
    order_id: &'a str,
    user: &'a str,
    workshop: &'a str,
    amount: String,
    currency: &'a str,
    status: &'a str,
    history: String,
    artifact: bool,
}

impl<'a> From<&'a Order> for OrderRow<'a> {
    fn from(order: &'a Order) -> Self {
        let history = order
            .status_history
            .iter()
            .map(|entry| entry.status.as_str())
            .collect::<Vec<_>>()
            .join(">");
        Self {
            order_id: order.order_id.as_str(),
            user: order.user_id.as_str(),
            workshop: order.workshop.as_str(),
            amount: order.amount.to_string(),
            currency: order.currency.as_str(),
            status: order.status.as_str(),
            history,
            artifact: order.has_artifact(),
        }
    }
}

/// Writes order summaries as CSV
/// (`order_id, user, workshop, amount, currency, status, history, artifact`).
///
/// `history` lists the applied statuses oldest first, joined by `>`. The
/// artifact itself is never written, only whether one has been issued.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_orders<'a>(&mut self, orders: impl IntoIterator<Item = &'a Order>) -> Result<()> {
        for order in orders {
            self.writer.serialize(OrderRow::from(order))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
