use crate::domain::order::{UserId, WorkshopRef};
use crate::domain::payment::UserContact;
use crate::error::{BookingError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum JournalKind {
    Book,
    Webhook,
}

#[derive(Debug, Deserialize)]
struct JournalRecord {
    kind: JournalKind,
    reference: String,
    workshop: Option<String>,
    user: Option<String>,
    contact: Option<String>,
    status: Option<String>,
    note: Option<String>,
}

/// One line of a booking journal.
///
/// `reference` is a label local to the journal. A `Book` entry binds it to the
/// order id the service generates; later `Webhook` entries address the order
/// through the same label.
#[derive(Debug, Clone, PartialEq)]
pub enum JournalEntry {
    Book {
        reference: String,
        workshop: WorkshopRef,
        user: UserId,
        contact: UserContact,
    },
    Webhook {
        reference: String,
        status: String,
        note: Option<String>,
    },
}

impl TryFrom<JournalRecord> for JournalEntry {
    type Error = BookingError;

    fn try_from(record: JournalRecord) -> Result<Self> {
        let missing = |field: &str| {
            BookingError::ValidationError(format!("{} requires `{}`", record.reference, field))
        };

        match record.kind {
            JournalKind::Book => {
                let user = record.user.ok_or_else(|| missing("user"))?;
                let workshop = record.workshop.ok_or_else(|| missing("workshop"))?;
                let channel = record.contact.ok_or_else(|| missing("contact"))?;
                // A contact with an '@' is an email, anything else a phone number.
                let contact = if channel.contains('@') {
                    UserContact::new(user.clone(), Some(channel), None)?
                } else {
                    UserContact::new(user.clone(), None, Some(channel))?
                };
                Ok(JournalEntry::Book {
                    reference: record.reference,
                    workshop: WorkshopRef::from(workshop),
                    user: UserId::from(user),
                    contact,
                })
            }
            JournalKind::Webhook => {
                let status = record.status.ok_or_else(|| missing("status"))?;
                Ok(JournalEntry::Webhook {
                    reference: record.reference,
                    status,
                    note: record.note,
                })
            }
        }
    }
}

/// Reads journal rows (`kind, reference, workshop, user, contact, status, note`).
pub struct JournalReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> JournalReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn entries(self) -> impl Iterator<Item = Result<JournalEntry>> {
        self.reader.into_deserialize::<JournalRecord>().map(|result| {
            let record = result?;
            JournalEntry::try_from(record)
        })
    }
}
