use super::csv::journal_reader::JournalEntry;
use crate::application::lifecycle::{OrderLifecycleService, WebhookNotification};
use crate::domain::order::{Order, OrderId};
use crate::error::{BookingError, Result};
use std::collections::HashMap;
use tracing::debug;

/// Drives an [`OrderLifecycleService`] from journal entries.
///
/// Journal references are bound to generated order ids as bookings are applied;
/// webhooks are routed through that binding.
pub struct JournalReplayer<'a> {
    lifecycle: &'a OrderLifecycleService,
    labels: HashMap<String, OrderId>,
    touched: Vec<OrderId>,
}

impl<'a> JournalReplayer<'a> {
    pub fn new(lifecycle: &'a OrderLifecycleService) -> Self {
        Self {
            lifecycle,
            labels: HashMap::new(),
            touched: Vec::new(),
        }
    }

    pub async fn apply(&mut self, entry: JournalEntry) -> Result<Order> {
        match entry {
            JournalEntry::Book {
                reference,
                workshop,
                user,
                contact,
            } => {
                if self.labels.contains_key(&reference) {
                    return Err(BookingError::ValidationError(format!(
                        "Journal reference '{}' is already bound",
                        reference
                    )));
                }
                let (order, _) = self
                    .lifecycle
                    .create_payment_link(&workshop, &user, contact)
                    .await?;
                debug!(reference = %reference, order_id = %order.order_id, "Bound journal reference");
                self.labels.insert(reference, order.order_id.clone());
                self.touched.push(order.order_id.clone());
                Ok(order)
            }
            JournalEntry::Webhook {
                reference,
                status,
                note,
            } => {
                let order_id = self
                    .labels
                    .get(&reference)
                    .cloned()
                    .ok_or_else(|| BookingError::not_found("journal reference", &reference))?;
                self.lifecycle
                    .handle_notification(WebhookNotification {
                        order_id,
                        status,
                        note,
                    })
                    .await
            }
        }
    }

    /// Orders created by this replay, in journal order.
    pub fn touched(&self) -> &[OrderId] {
        &self.touched
    }
}
